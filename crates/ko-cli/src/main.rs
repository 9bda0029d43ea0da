mod server;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use uuid::Uuid;

use ko_core::time::{millis_to_iso8601, now_unix_millis};
use ko_core::{
    CollisionOutcome, Embedder, EventKind, KnowledgeObject, KoType, SeededEncoder,
    SimilarityIndex, Simulator, Vocabulary,
};
use ko_store::Store;

#[derive(Parser)]
#[command(name = "ko", about = "Knowledge-object corpus with behavioral physics")]
struct Cli {
    /// Database path (env: KO_DB_PATH)
    #[arg(long, global = true, env = "KO_DB_PATH", default_value = "ko.db")]
    db: PathBuf,

    /// WordPiece vocab file enabling embeddings and semantic gravity
    #[arg(long, global = true, env = "KO_VOCAB_PATH")]
    vocab: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:4040")]
        addr: String,
    },

    /// Show corpus statistics
    Stats,

    /// Create a knowledge object
    Add {
        /// Title of the note
        title: String,
        /// Body content
        content: String,
        /// Object type: fragment, synthesis, or observation
        #[arg(long, default_value = "fragment")]
        ko_type: String,
        /// Tags, repeatable
        #[arg(long)]
        tag: Vec<String>,
    },

    /// Record an observation of a KO
    Observe {
        /// KO id
        id: Uuid,
        /// Observation duration in milliseconds
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Print a KO's evolution history
    History {
        /// KO id
        id: Uuid,
    },

    /// Record a collision resolution between two KOs
    Collide {
        a: Uuid,
        b: Uuid,
        /// Outcome: synthesis, dismiss, or ignore
        outcome: String,
    },

    /// Run the force-field simulation offline and persist positions
    Simulate {
        /// Number of ticks
        #[arg(long, default_value_t = 1000)]
        ticks: usize,
        /// Tick duration in milliseconds
        #[arg(long, default_value_t = 16.0)]
        dt: f64,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn open_store(cli: &Cli) -> Result<Store> {
    Store::open(&cli.db)
        .with_context(|| format!("failed to open store at {}", cli.db.display()))
}

fn load_embedder(path: Option<&Path>) -> Result<Option<Embedder<SeededEncoder>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read vocab {}", path.display()))?;
    let vocab = Vocabulary::from_lines(text.lines());
    tracing::info!("loaded vocab with {} pieces", vocab.len());
    Ok(Some(Embedder::new(vocab, SeededEncoder::default())))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve { addr } => cmd_serve(&cli, addr).await,
        Commands::Stats => cmd_stats(&cli),
        Commands::Add { title, content, ko_type, tag } => {
            cmd_add(&cli, title, content, ko_type, tag.clone())
        }
        Commands::Observe { id, duration } => cmd_observe(&cli, *id, *duration),
        Commands::History { id } => cmd_history(&cli, *id),
        Commands::Collide { a, b, outcome } => cmd_collide(&cli, *a, *b, outcome),
        Commands::Simulate { ticks, dt } => cmd_simulate(&cli, *ticks, *dt),
    }
}

async fn cmd_serve(cli: &Cli, addr: &str) -> Result<()> {
    let store = open_store(cli)?;
    let embedder = load_embedder(cli.vocab.as_deref())?;
    if embedder.is_none() {
        tracing::warn!("no vocab configured; similarity endpoints return zeros");
    }

    let state = server::AppState::new(store, embedder)?;
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let kos = store.count_kos()?;
    let links = store.count_links()?;

    let mut observations = 0u64;
    let mut collisions = 0u64;
    let mut trait_counts: [(&str, u64); 6] = [
        ("restless", 0),
        ("stable", 0),
        ("magnetic", 0),
        ("volatile", 0),
        ("forgotten", 0),
        ("ancient", 0),
    ];
    for (_, memory) in store.all_memory()? {
        observations += memory.observation_count;
        collisions += memory.collision_count;
        for name in memory.traits.active() {
            if let Some(entry) = trait_counts.iter_mut().find(|(n, _)| *n == name) {
                entry.1 += 1;
            }
        }
    }

    println!("kos:          {kos}");
    println!("links:        {links}");
    println!("observations: {observations}");
    println!("collisions:   {collisions}");
    for (name, count) in trait_counts {
        println!("{name:<13} {count}");
    }
    Ok(())
}

fn cmd_add(cli: &Cli, title: &str, content: &str, ko_type: &str, tags: Vec<String>) -> Result<()> {
    let store = open_store(cli)?;
    let ko = KnowledgeObject::new(
        title,
        content,
        KoType::from_str_lossy(ko_type),
        tags,
        now_unix_millis(),
    );
    store.save_ko(&ko)?;
    println!("created {} ({})", ko.id, ko.ko_type.as_str());
    Ok(())
}

fn cmd_observe(cli: &Cli, id: Uuid, duration: u64) -> Result<()> {
    let store = open_store(cli)?;
    match store.record_observation(id, duration, now_unix_millis())? {
        Some(memory) => {
            println!(
                "observed {id}: count={}, traits={:?}",
                memory.observation_count,
                memory.traits.active()
            );
            Ok(())
        }
        None => anyhow::bail!("no such KO: {id}"),
    }
}

fn cmd_history(cli: &Cli, id: Uuid) -> Result<()> {
    let store = open_store(cli)?;
    let memory = match store.get_memory(id)? {
        Some(memory) => memory,
        None => anyhow::bail!("no such KO: {id}"),
    };
    if memory.history.is_empty() {
        println!("no events recorded for {id}");
        return Ok(());
    }
    for event in &memory.history {
        let when = millis_to_iso8601(event.timestamp);
        match &event.kind {
            EventKind::Observed { duration_ms } => {
                println!("{when}  observed ({duration_ms}ms)");
            }
            EventKind::Collision { with, outcome } => {
                println!("{when}  collision with {with} ({})", outcome.as_str());
            }
            EventKind::Synthesis { with } => {
                println!("{when}  synthesis with {with}");
            }
        }
    }
    Ok(())
}

fn cmd_collide(cli: &Cli, a: Uuid, b: Uuid, outcome: &str) -> Result<()> {
    let store = open_store(cli)?;
    let outcome = CollisionOutcome::from_str_lossy(outcome);
    let applied = store.record_collision(a, b, outcome, now_unix_millis())?;
    if !applied {
        anyhow::bail!("one or both KOs not found");
    }
    println!("recorded {} collision between {a} and {b}", outcome.as_str());
    Ok(())
}

fn cmd_simulate(cli: &Cli, ticks: usize, dt: f64) -> Result<()> {
    let store = open_store(cli)?;
    let embedder = load_embedder(cli.vocab.as_deref())?;

    let mut similarity = SimilarityIndex::new();
    if let Some(embedder) = &embedder {
        for ko in store.all_kos()? {
            match embedder.embed(&ko.embedding_text()) {
                Ok(embedding) => similarity.insert(ko.id, embedding),
                Err(e) => tracing::warn!("failed to embed {}: {e}", ko.id),
            }
        }
    }

    let mut sim = Simulator::new();
    for (id, stored) in store.all_physics()? {
        sim.insert_body(id, stored.physics);
        if stored.anchored {
            sim.anchor(id, stored.physics.position);
        }
    }
    for (id, memory) in store.all_memory()? {
        sim.set_traits(id, memory.traits);
        sim.set_relationships(id, memory.affinity, memory.rivalry);
    }

    let bodies = sim.len();
    let mut rng = SmallRng::from_os_rng();
    for _ in 0..ticks {
        sim.tick(dt, &mut similarity, &mut rng);
    }

    let now = now_unix_millis();
    for snap in sim.snapshot() {
        if let Some(mut stored) = store.get_physics(snap.id)? {
            stored.physics.position = snap.position;
            stored.physics.velocity = snap.velocity;
            store.put_physics(snap.id, &stored)?;
        }
        // The snapshot reports travel for this run only; memory keeps
        // the lifetime total.
        store.record_drift(snap.id, snap.drift_distance, now)?;
    }

    println!("simulated {ticks} ticks ({dt}ms each) over {bodies} bodies");
    Ok(())
}
