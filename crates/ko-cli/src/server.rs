//! HTTP surface: KO CRUD, discovery queries, behavior recording,
//! similarity lookups, and a server-sent event feed of corpus changes.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use ko_core::time::now_unix_millis;
use ko_core::{
    CollisionOutcome, Embedder, KnowledgeObject, KoType, Memory, SeededEncoder, SimilarityIndex,
};
use ko_store::{Link, LinkType, Store, StoreError, StoredPhysics};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<ServerState>>,
    events: broadcast::Sender<Notification>,
}

struct ServerState {
    store: Store,
    embedder: Option<Embedder<SeededEncoder>>,
    similarity: SimilarityIndex,
}

impl AppState {
    pub fn new(store: Store, embedder: Option<Embedder<SeededEncoder>>) -> anyhow::Result<Self> {
        let mut similarity = SimilarityIndex::new();
        if let Some(embedder) = &embedder {
            for ko in store.all_kos()? {
                match embedder.embed(&ko.embedding_text()) {
                    Ok(embedding) => similarity.insert(ko.id, embedding),
                    Err(e) => tracing::warn!("failed to embed {}: {e}", ko.id),
                }
            }
            tracing::info!("indexed {} embeddings", similarity.len());
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(Mutex::new(ServerState {
                store,
                embedder,
                similarity,
            })),
            events,
        })
    }

    fn notify(&self, notification: Notification) {
        // Nobody listening is fine.
        let _ = self.events.send(notification);
    }
}

impl ServerState {
    fn index_embedding(&mut self, ko: &KnowledgeObject) {
        if let Some(embedder) = &self.embedder {
            match embedder.embed(&ko.embedding_text()) {
                Ok(embedding) => self.similarity.insert(ko.id, embedding),
                Err(e) => tracing::warn!("failed to embed {}: {e}", ko.id),
            }
        }
    }
}

/// Change feed payloads, tagged for the websocket-style consumers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    KoCreated { ko: KnowledgeObject },
    KoUpdated { ko: KnowledgeObject },
    KoDeleted { id: Uuid },
    Observed { id: Uuid, duration_ms: u64 },
    Collided { a: Uuid, b: Uuid, outcome: CollisionOutcome },
    SynthesisCreated { synthesis_id: Uuid, a: Uuid, b: Uuid },
    LinkCreated { source: Uuid, target: Uuid, link_type: LinkType },
    LinkDeleted { source: Uuid, target: Uuid },
}

pub enum ApiError {
    NotFound,
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!("request failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/kos", get(list_kos).post(create_ko))
        .route("/api/kos/{id}", get(get_ko).put(update_ko).delete(delete_ko))
        .route("/api/random", get(random_kos))
        .route("/api/orphans", get(orphans))
        .route("/api/forgotten", get(forgotten))
        .route("/api/strangers/{id}", get(strangers))
        .route("/api/relatives/{id}", get(relatives))
        .route("/api/search", get(search))
        .route("/api/accelerator/{id}", get(accelerator))
        .route("/api/physics", get(all_physics).put(update_physics_batch))
        .route("/api/physics/{id}", get(get_physics).put(update_physics))
        .route("/api/memory", get(all_memory))
        .route("/api/memory/{id}", get(get_memory))
        .route("/api/observe/{id}", post(observe))
        .route("/api/collision", post(collision))
        .route("/api/synthesis", post(synthesis))
        .route("/api/links", get(all_links).post(create_link))
        .route("/api/links/{source}/{target}", delete(delete_link))
        .route("/api/similar/{id}", get(similar))
        .route("/api/similarity/{a}/{b}", get(similarity_pair))
        .route("/api/similarities", get(all_similarities))
        .route("/api/events", get(events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "ko bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

// --- KO CRUD ---

async fn list_kos(State(state): State<AppState>) -> ApiResult<Json<Vec<KnowledgeObject>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.all_kos()?))
}

async fn get_ko(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    let ko = guard.store.get_ko(id)?.ok_or(ApiError::NotFound)?;
    let memory = guard.store.get_memory(id)?;
    let physics = guard.store.get_physics(id)?;

    let mut body = serde_json::to_value(&ko).map_err(|e| ApiError::Internal(e.to_string()))?;
    body["memory"] = serde_json::to_value(&memory).map_err(|e| ApiError::Internal(e.to_string()))?;
    body["physics"] = match physics {
        Some(stored) => physics_json(stored),
        None => serde_json::Value::Null,
    };
    Ok(Json(body))
}

#[derive(Deserialize)]
struct CreateKo {
    title: String,
    content: String,
    #[serde(default)]
    ko_type: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

async fn create_ko(
    State(state): State<AppState>,
    Json(req): Json<CreateKo>,
) -> ApiResult<(StatusCode, Json<KnowledgeObject>)> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let ko_type = req
        .ko_type
        .as_deref()
        .map(KoType::from_str_lossy)
        .unwrap_or_default();
    let ko = KnowledgeObject::new(&req.title, &req.content, ko_type, req.tags, now_unix_millis());

    let mut guard = state.inner.lock().await;
    guard.store.save_ko(&ko)?;
    guard.index_embedding(&ko);
    drop(guard);

    state.notify(Notification::KoCreated { ko: ko.clone() });
    Ok((StatusCode::CREATED, Json(ko)))
}

#[derive(Deserialize)]
struct UpdateKo {
    title: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
}

async fn update_ko(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateKo>,
) -> ApiResult<Json<KnowledgeObject>> {
    let mut guard = state.inner.lock().await;
    let mut ko = guard.store.get_ko(id)?.ok_or(ApiError::NotFound)?;

    let title = req.title.unwrap_or_else(|| ko.title.clone());
    let content = req.content.unwrap_or_else(|| ko.content.clone());
    let tags = req.tags.unwrap_or_else(|| ko.tags.clone());
    let changed = ko.update_content(&title, &content, tags, now_unix_millis());

    if changed {
        guard.store.save_ko(&ko)?;
        guard.index_embedding(&ko);
    }
    drop(guard);

    if changed {
        state.notify(Notification::KoUpdated { ko: ko.clone() });
    }
    Ok(Json(ko))
}

async fn delete_ko(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut guard = state.inner.lock().await;
    if !guard.store.delete_ko(id)? {
        return Err(ApiError::NotFound);
    }
    guard.similarity.remove(id);
    drop(guard);

    state.notify(Notification::KoDeleted { id });
    Ok(Json(json!({ "deleted": id })))
}

// --- Discovery ---

#[derive(Deserialize)]
struct CountParam {
    #[serde(default = "default_count")]
    n: usize,
}

fn default_count() -> usize {
    5
}

async fn random_kos(
    State(state): State<AppState>,
    Query(params): Query<CountParam>,
) -> ApiResult<Json<Vec<KnowledgeObject>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.random_kos(params.n)?))
}

async fn orphans(State(state): State<AppState>) -> ApiResult<Json<Vec<KnowledgeObject>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.orphans()?))
}

#[derive(Deserialize)]
struct ForgottenParams {
    #[serde(default = "default_forgotten_days")]
    days: f64,
}

fn default_forgotten_days() -> f64 {
    30.0
}

async fn forgotten(
    State(state): State<AppState>,
    Query(params): Query<ForgottenParams>,
) -> ApiResult<Json<Vec<KnowledgeObject>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.forgotten(params.days, now_unix_millis())?))
}

async fn strangers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CountParam>,
) -> ApiResult<Json<Vec<KnowledgeObject>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.strangers(id, params.n)?))
}

async fn relatives(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CountParam>,
) -> ApiResult<Json<Vec<KnowledgeObject>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.relatives(id, params.n)?))
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    20
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<KnowledgeObject>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.search(&params.q, params.limit)?))
}

/// Anchor KO plus a handful of linked and unlinked companions: the
/// seed set for a serendipity session.
async fn accelerator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    let anchor = guard.store.get_ko(id)?.ok_or(ApiError::NotFound)?;
    let relatives = guard.store.relatives(id, 3)?;
    let strangers = guard.store.strangers(id, 3)?;
    Ok(Json(json!({
        "anchor": anchor,
        "relatives": relatives,
        "strangers": strangers,
    })))
}

// --- Physics ---

fn physics_json(stored: StoredPhysics) -> serde_json::Value {
    json!({
        "position": stored.physics.position,
        "velocity": stored.physics.velocity,
        "entropy": stored.physics.entropy,
        "mass": stored.physics.mass,
        "anchored": stored.anchored,
    })
}

async fn all_physics(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    let map: serde_json::Map<String, serde_json::Value> = guard
        .store
        .all_physics()?
        .into_iter()
        .map(|(id, stored)| (id.to_string(), physics_json(stored)))
        .collect();
    Ok(Json(serde_json::Value::Object(map)))
}

async fn get_physics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    let stored = guard.store.get_physics(id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(physics_json(stored)))
}

#[derive(Deserialize)]
struct UpdatePhysics {
    x: Option<f64>,
    y: Option<f64>,
    vx: Option<f64>,
    vy: Option<f64>,
    anchored: Option<bool>,
}

async fn update_physics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePhysics>,
) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    let mut stored = guard.store.get_physics(id)?.ok_or(ApiError::NotFound)?;

    if let Some(x) = req.x {
        stored.physics.position.x = x;
    }
    if let Some(y) = req.y {
        stored.physics.position.y = y;
    }
    if let Some(vx) = req.vx {
        stored.physics.velocity.x = vx;
    }
    if let Some(vy) = req.vy {
        stored.physics.velocity.y = vy;
    }
    if let Some(anchored) = req.anchored {
        stored.anchored = anchored;
    }
    guard.store.put_physics(id, &stored)?;
    Ok(Json(physics_json(stored)))
}

async fn update_physics_batch(
    State(state): State<AppState>,
    Json(req): Json<std::collections::HashMap<Uuid, UpdatePhysics>>,
) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    let mut updated = serde_json::Map::new();
    for (id, patch) in req {
        // Ids deleted since the client snapshot are skipped, not errors.
        let Some(mut stored) = guard.store.get_physics(id)? else {
            continue;
        };
        if let Some(x) = patch.x {
            stored.physics.position.x = x;
        }
        if let Some(y) = patch.y {
            stored.physics.position.y = y;
        }
        if let Some(vx) = patch.vx {
            stored.physics.velocity.x = vx;
        }
        if let Some(vy) = patch.vy {
            stored.physics.velocity.y = vy;
        }
        if let Some(anchored) = patch.anchored {
            stored.anchored = anchored;
        }
        guard.store.put_physics(id, &stored)?;
        updated.insert(id.to_string(), physics_json(stored));
    }
    Ok(Json(serde_json::Value::Object(updated)))
}

// --- Memory ---

async fn all_memory(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    let map: serde_json::Map<String, serde_json::Value> = guard
        .store
        .all_memory()?
        .into_iter()
        .map(|(id, memory)| {
            serde_json::to_value(&memory)
                .map(|v| (id.to_string(), v))
                .map_err(|e| ApiError::Internal(e.to_string()))
        })
        .collect::<ApiResult<_>>()?;
    Ok(Json(serde_json::Value::Object(map)))
}

async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Memory>> {
    let guard = state.inner.lock().await;
    let memory = guard.store.get_memory(id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(memory))
}

// --- Behavior ---

#[derive(Deserialize, Default)]
struct ObserveReq {
    #[serde(default)]
    duration_ms: u64,
}

async fn observe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ObserveReq>>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(req) = body.unwrap_or_default();
    let guard = state.inner.lock().await;
    let memory = guard
        .store
        .record_observation(id, req.duration_ms, now_unix_millis())?
        .ok_or(ApiError::NotFound)?;
    let physics = guard.store.get_physics(id)?;
    drop(guard);

    state.notify(Notification::Observed { id, duration_ms: req.duration_ms });
    Ok(Json(json!({
        "memory": memory,
        "physics": physics.map(physics_json),
    })))
}

#[derive(Deserialize)]
struct CollisionReq {
    a: Uuid,
    b: Uuid,
    outcome: CollisionOutcome,
}

async fn collision(
    State(state): State<AppState>,
    Json(req): Json<CollisionReq>,
) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    if !guard
        .store
        .record_collision(req.a, req.b, req.outcome, now_unix_millis())?
    {
        return Err(ApiError::NotFound);
    }
    drop(guard);

    state.notify(Notification::Collided { a: req.a, b: req.b, outcome: req.outcome });
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct SynthesisReq {
    a: Uuid,
    b: Uuid,
    /// The insight connecting the two KOs; becomes the bridge note body.
    connection: String,
}

async fn synthesis(
    State(state): State<AppState>,
    Json(req): Json<SynthesisReq>,
) -> ApiResult<(StatusCode, Json<KnowledgeObject>)> {
    if req.connection.trim().is_empty() {
        return Err(ApiError::BadRequest("connection is required".to_string()));
    }

    let mut guard = state.inner.lock().await;
    let ko_a = guard.store.get_ko(req.a)?.ok_or(ApiError::NotFound)?;
    let ko_b = guard.store.get_ko(req.b)?.ok_or(ApiError::NotFound)?;

    let now = now_unix_millis();
    let title = format!("{} × {}", ko_a.title, ko_b.title);
    let bridge = KnowledgeObject::new(&title, &req.connection, KoType::Synthesis, vec![], now);

    guard.store.save_ko(&bridge)?;
    guard.index_embedding(&bridge);
    guard.store.record_collision(req.a, req.b, CollisionOutcome::Synthesis, now)?;
    guard.store.create_link(req.a, bridge.id, LinkType::Collision, now)?;
    guard.store.create_link(req.b, bridge.id, LinkType::Collision, now)?;
    drop(guard);

    state.notify(Notification::SynthesisCreated {
        synthesis_id: bridge.id,
        a: req.a,
        b: req.b,
    });
    Ok((StatusCode::CREATED, Json(bridge)))
}

// --- Links ---

async fn all_links(State(state): State<AppState>) -> ApiResult<Json<Vec<Link>>> {
    let guard = state.inner.lock().await;
    Ok(Json(guard.store.all_links()?))
}

#[derive(Deserialize)]
struct CreateLinkReq {
    source: Uuid,
    target: Uuid,
    #[serde(default)]
    link_type: Option<String>,
}

async fn create_link(
    State(state): State<AppState>,
    Json(req): Json<CreateLinkReq>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let link_type = req
        .link_type
        .as_deref()
        .map(LinkType::from_str_lossy)
        .unwrap_or(LinkType::Explicit);

    let guard = state.inner.lock().await;
    if guard.store.get_ko(req.source)?.is_none() || guard.store.get_ko(req.target)?.is_none() {
        return Err(ApiError::NotFound);
    }
    guard.store.create_link(req.source, req.target, link_type, now_unix_millis())?;
    drop(guard);

    state.notify(Notification::LinkCreated {
        source: req.source,
        target: req.target,
        link_type,
    });
    Ok((StatusCode::CREATED, Json(json!({ "ok": true }))))
}

async fn delete_link(
    State(state): State<AppState>,
    Path((source, target)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let guard = state.inner.lock().await;
    if !guard.store.delete_link(source, target)? {
        return Err(ApiError::NotFound);
    }
    drop(guard);

    state.notify(Notification::LinkDeleted { source, target });
    Ok(Json(json!({ "ok": true })))
}

// --- Similarity ---

async fn similar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CountParam>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let mut guard = state.inner.lock().await;
    let results = guard
        .similarity
        .top_similar(id, params.n)
        .into_iter()
        .map(|(other, score)| json!({ "id": other, "similarity": score }))
        .collect();
    Ok(Json(results))
}

async fn similarity_pair(
    State(state): State<AppState>,
    Path((a, b)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut guard = state.inner.lock().await;
    let score = guard.similarity.similarity(a, b);
    Ok(Json(json!({ "a": a, "b": b, "similarity": score })))
}

async fn all_similarities(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let mut guard = state.inner.lock().await;
    let pairs = guard
        .similarity
        .all_pairs()
        .into_iter()
        .map(|(a, b, score)| json!({ "a": a, "b": b, "similarity": score }))
        .collect();
    Ok(Json(pairs))
}

// --- Events ---

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    if let Ok(event) = Event::default().json_data(&notification) {
                        yield Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("event stream lagged, skipped {skipped}");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
