use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ko_core::time::MILLIS_PER_DAY;
use ko_core::{CollisionOutcome, KnowledgeObject, KoType, Memory, Physics, Vec2};

use crate::error::{Result, StoreError};
use crate::schema;

/// How a link came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Written by hand.
    Explicit,
    /// Created when a collision was resolved as synthesis.
    Collision,
    /// Created by an automated process.
    Agent,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Collision => "collision",
            Self::Agent => "agent",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "collision" => Self::Collision,
            "agent" => Self::Agent,
            _ => Self::Explicit,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Link {
    pub source: Uuid,
    pub target: Uuid,
    pub link_type: LinkType,
    pub created_at: u64,
}

/// Physics record plus the persisted anchor flag.
#[derive(Clone, Copy, Debug)]
pub struct StoredPhysics {
    pub physics: Physics,
    pub anchored: bool,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- KOs ---

    /// Upsert a KO. New KOs get fresh memory and physics rows; the
    /// physics row spawns at a random position.
    pub fn save_ko(&self, ko: &KnowledgeObject) -> Result<()> {
        let mut rng = rand::rng();
        self.save_ko_with(ko, Physics::spawn(&mut rng))
    }

    /// Upsert a KO with an explicit spawn position for the physics row.
    pub fn save_ko_at(&self, ko: &KnowledgeObject, position: Vec2) -> Result<()> {
        self.save_ko_with(ko, Physics::at(position))
    }

    fn save_ko_with(&self, ko: &KnowledgeObject, spawn: Physics) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO kos (id, title, content, content_hash, ko_type, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                title = ?2,
                content = ?3,
                content_hash = ?4,
                ko_type = ?5,
                tags = ?6,
                updated_at = ?8",
            params![
                ko.id.to_string(),
                ko.title,
                ko.content,
                ko.content_hash,
                ko.ko_type.as_str(),
                serde_json::to_string(&ko.tags)?,
                ko.created_at,
                ko.updated_at,
            ],
        )?;

        // Memory and physics rows only spring into existence once;
        // re-saving a KO never resets them.
        tx.execute(
            "INSERT OR IGNORE INTO ko_memory (ko_id) VALUES (?1)",
            [ko.id.to_string()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO ko_physics (ko_id, position_x, position_y, entropy, mass)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ko.id.to_string(),
                spawn.position.x,
                spawn.position.y,
                spawn.entropy,
                spawn.mass,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn get_ko(&self, id: Uuid) -> Result<Option<KnowledgeObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, content, content_hash, ko_type, tags, created_at, updated_at
             FROM kos WHERE id = ?1",
        )?;
        let row = stmt
            .query_row([id.to_string()], ko_row_tuple)
            .optional()?;
        row.map(ko_from_tuple).transpose()
    }

    pub fn all_kos(&self) -> Result<Vec<KnowledgeObject>> {
        self.query_kos(
            "SELECT id, title, content, content_hash, ko_type, tags, created_at, updated_at
             FROM kos ORDER BY updated_at DESC",
            params![],
        )
    }

    pub fn delete_ko(&self, id: Uuid) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM kos WHERE id = ?1", [id.to_string()])?;
        Ok(changed > 0)
    }

    pub fn count_kos(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM kos", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_links(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM links", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // --- Discovery queries ---

    pub fn random_kos(&self, n: usize) -> Result<Vec<KnowledgeObject>> {
        self.query_kos(
            "SELECT id, title, content, content_hash, ko_type, tags, created_at, updated_at
             FROM kos ORDER BY RANDOM() LIMIT ?1",
            params![n as i64],
        )
    }

    /// KOs with no links in either direction.
    pub fn orphans(&self) -> Result<Vec<KnowledgeObject>> {
        self.query_kos(
            "SELECT k.id, k.title, k.content, k.content_hash, k.ko_type, k.tags, k.created_at, k.updated_at
             FROM kos k
             LEFT JOIN links l ON k.id = l.source_id OR k.id = l.target_id
             WHERE l.source_id IS NULL",
            params![],
        )
    }

    /// KOs not observed within the last `days`, least recent first.
    /// Never-observed KOs always qualify.
    pub fn forgotten(&self, days: f64, now_ms: u64) -> Result<Vec<KnowledgeObject>> {
        let cutoff = now_ms.saturating_sub((days * MILLIS_PER_DAY as f64) as u64);
        self.query_kos(
            "SELECT k.id, k.title, k.content, k.content_hash, k.ko_type, k.tags, k.created_at, k.updated_at
             FROM kos k
             JOIN ko_memory m ON k.id = m.ko_id
             WHERE m.last_observed IS NULL OR m.last_observed < ?1
             ORDER BY m.last_observed ASC",
            params![cutoff],
        )
    }

    /// Random KOs with no link to the anchor.
    pub fn strangers(&self, anchor: Uuid, n: usize) -> Result<Vec<KnowledgeObject>> {
        self.query_kos(
            "SELECT k.id, k.title, k.content, k.content_hash, k.ko_type, k.tags, k.created_at, k.updated_at
             FROM kos k
             LEFT JOIN links l ON (l.source_id = ?1 AND l.target_id = k.id)
                               OR (l.target_id = ?1 AND l.source_id = k.id)
             WHERE k.id != ?1 AND l.source_id IS NULL
             ORDER BY RANDOM()
             LIMIT ?2",
            params![anchor.to_string(), n as i64],
        )
    }

    /// Random KOs linked to the anchor.
    pub fn relatives(&self, anchor: Uuid, n: usize) -> Result<Vec<KnowledgeObject>> {
        self.query_kos(
            "SELECT k.id, k.title, k.content, k.content_hash, k.ko_type, k.tags, k.created_at, k.updated_at
             FROM kos k
             JOIN links l ON (l.source_id = ?1 AND l.target_id = k.id)
                          OR (l.target_id = ?1 AND l.source_id = k.id)
             WHERE k.id != ?1
             ORDER BY RANDOM()
             LIMIT ?2",
            params![anchor.to_string(), n as i64],
        )
    }

    /// LIKE-based search over titles and content, newest first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeObject>> {
        let pattern = format!("%{query}%");
        self.query_kos(
            "SELECT id, title, content, content_hash, ko_type, tags, created_at, updated_at
             FROM kos
             WHERE title LIKE ?1 OR content LIKE ?1
             ORDER BY updated_at DESC
             LIMIT ?2",
            params![pattern, limit as i64],
        )
    }

    fn query_kos(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<KnowledgeObject>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows: Vec<KoRowTuple> = stmt
            .query_map(params, ko_row_tuple)?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter().map(ko_from_tuple).collect()
    }

    // --- Memory ---

    pub fn get_memory(&self, id: Uuid) -> Result<Option<Memory>> {
        let mut stmt = self.conn.prepare(
            "SELECT observation_count, collision_count, last_observed, total_observation_ms,
                    drift_distance, affinity, rivalry, traits, history
             FROM ko_memory WHERE ko_id = ?1",
        )?;
        let row = stmt
            .query_row([id.to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })
            .optional()?;

        let Some((obs, coll, last, total, drift, affinity, rivalry, traits, history)) = row else {
            return Ok(None);
        };
        Ok(Some(Memory {
            observation_count: obs as u64,
            collision_count: coll as u64,
            last_observed: last.map(|v| v as u64),
            total_observation_ms: total as u64,
            drift_distance: drift,
            affinity: serde_json::from_str(&affinity)?,
            rivalry: serde_json::from_str(&rivalry)?,
            traits: serde_json::from_str(&traits)?,
            history: serde_json::from_str(&history)?,
        }))
    }

    pub fn all_memory(&self) -> Result<Vec<(Uuid, Memory)>> {
        let mut stmt = self.conn.prepare("SELECT ko_id FROM ko_memory")?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        let mut out = Vec::with_capacity(ids.len());
        for id_str in ids {
            let id = parse_uuid(&id_str)?;
            if let Some(memory) = self.get_memory(id)? {
                out.push((id, memory));
            }
        }
        Ok(out)
    }

    fn put_memory_on(&self, conn: &Connection, id: Uuid, memory: &Memory) -> Result<()> {
        conn.execute(
            "UPDATE ko_memory SET
                observation_count = ?2,
                collision_count = ?3,
                last_observed = ?4,
                total_observation_ms = ?5,
                drift_distance = ?6,
                affinity = ?7,
                rivalry = ?8,
                traits = ?9,
                history = ?10
             WHERE ko_id = ?1",
            params![
                id.to_string(),
                memory.observation_count as i64,
                memory.collision_count as i64,
                memory.last_observed.map(|v| v as i64),
                memory.total_observation_ms as i64,
                memory.drift_distance,
                serde_json::to_string(&memory.affinity)?,
                serde_json::to_string(&memory.rivalry)?,
                serde_json::to_string(&memory.traits)?,
                serde_json::to_string(&memory.history)?,
            ],
        )?;
        Ok(())
    }

    // --- Physics ---

    pub fn get_physics(&self, id: Uuid) -> Result<Option<StoredPhysics>> {
        let mut stmt = self.conn.prepare(
            "SELECT position_x, position_y, velocity_x, velocity_y, entropy, mass, is_anchored
             FROM ko_physics WHERE ko_id = ?1",
        )?;
        let row = stmt
            .query_row([id.to_string()], physics_row)
            .optional()?;
        Ok(row)
    }

    pub fn all_physics(&self) -> Result<Vec<(Uuid, StoredPhysics)>> {
        let mut stmt = self.conn.prepare(
            "SELECT ko_id, position_x, position_y, velocity_x, velocity_y, entropy, mass,
                    is_anchored
             FROM ko_physics",
        )?;
        let rows: Vec<(String, StoredPhysics)> = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let stored = StoredPhysics {
                    physics: Physics {
                        position: Vec2::new(row.get(1)?, row.get(2)?),
                        velocity: Vec2::new(row.get(3)?, row.get(4)?),
                        entropy: row.get(5)?,
                        mass: row.get(6)?,
                    },
                    anchored: row.get::<_, i64>(7)? != 0,
                };
                Ok((id, stored))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(id_str, stored)| Ok((parse_uuid(&id_str)?, stored)))
            .collect()
    }

    pub fn put_physics(&self, id: Uuid, stored: &StoredPhysics) -> Result<()> {
        self.put_physics_on(&self.conn, id, stored)
    }

    fn put_physics_on(&self, conn: &Connection, id: Uuid, stored: &StoredPhysics) -> Result<()> {
        conn.execute(
            "UPDATE ko_physics SET
                position_x = ?2,
                position_y = ?3,
                velocity_x = ?4,
                velocity_y = ?5,
                entropy = ?6,
                mass = ?7,
                is_anchored = ?8
             WHERE ko_id = ?1",
            params![
                id.to_string(),
                stored.physics.position.x,
                stored.physics.position.y,
                stored.physics.velocity.x,
                stored.physics.velocity.y,
                stored.physics.entropy,
                stored.physics.mass,
                stored.anchored as i64,
            ],
        )?;
        Ok(())
    }

    // --- Behavior ---

    /// Record an observation. Returns the updated memory, or None when
    /// the KO has no memory/physics rows (unknown id is a no-op).
    pub fn record_observation(
        &self,
        id: Uuid,
        duration_ms: u64,
        now_ms: u64,
    ) -> Result<Option<Memory>> {
        let (Some(mut memory), Some(mut stored)) = (self.get_memory(id)?, self.get_physics(id)?)
        else {
            return Ok(None);
        };

        ko_core::record_observation(&mut memory, &mut stored.physics, duration_ms, now_ms);

        let tx = self.conn.unchecked_transaction()?;
        self.put_memory_on(&tx, id, &memory)?;
        self.put_physics_on(&tx, id, &stored)?;
        tx.commit()?;

        Ok(Some(memory))
    }

    /// Fold simulated travel into a KO's memory. Returns the updated
    /// memory, or None when the KO is unknown (no-op).
    pub fn record_drift(&self, id: Uuid, distance: f64, now_ms: u64) -> Result<Option<Memory>> {
        let (Some(mut memory), Some(stored)) = (self.get_memory(id)?, self.get_physics(id)?)
        else {
            return Ok(None);
        };

        ko_core::record_drift(&mut memory, &stored.physics, distance, now_ms);
        self.put_memory_on(&self.conn, id, &memory)?;
        Ok(Some(memory))
    }

    /// Record a collision resolution for both KOs. Returns false when
    /// either side is missing (no-op).
    pub fn record_collision(
        &self,
        a: Uuid,
        b: Uuid,
        outcome: CollisionOutcome,
        now_ms: u64,
    ) -> Result<bool> {
        let (Some(mut ma), Some(pa)) = (self.get_memory(a)?, self.get_physics(a)?) else {
            return Ok(false);
        };
        let (Some(mut mb), Some(pb)) = (self.get_memory(b)?, self.get_physics(b)?) else {
            return Ok(false);
        };

        ko_core::record_collision(
            a,
            &mut ma,
            &pa.physics,
            b,
            &mut mb,
            &pb.physics,
            outcome,
            now_ms,
        );

        let tx = self.conn.unchecked_transaction()?;
        self.put_memory_on(&tx, a, &ma)?;
        self.put_memory_on(&tx, b, &mb)?;
        tx.commit()?;

        Ok(true)
    }

    // --- Links ---

    pub fn create_link(
        &self,
        source: Uuid,
        target: Uuid,
        link_type: LinkType,
        now_ms: u64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO links (source_id, target_id, link_type, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![source.to_string(), target.to_string(), link_type.as_str(), now_ms],
        )?;
        Ok(())
    }

    pub fn delete_link(&self, source: Uuid, target: Uuid) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM links WHERE source_id = ?1 AND target_id = ?2",
            params![source.to_string(), target.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// All links touching a KO, in either direction.
    pub fn links_for(&self, id: Uuid) -> Result<Vec<Link>> {
        self.query_links(
            "SELECT source_id, target_id, link_type, created_at
             FROM links WHERE source_id = ?1 OR target_id = ?1",
            params![id.to_string()],
        )
    }

    pub fn all_links(&self) -> Result<Vec<Link>> {
        self.query_links(
            "SELECT source_id, target_id, link_type, created_at FROM links",
            params![],
        )
    }

    fn query_links(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Link>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows: Vec<(String, String, String, i64)> = stmt
            .query_map(params, |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(source, target, link_type, created_at)| {
                Ok(Link {
                    source: parse_uuid(&source)?,
                    target: parse_uuid(&target)?,
                    link_type: LinkType::from_str_lossy(&link_type),
                    created_at: created_at as u64,
                })
            })
            .collect()
    }
}

type KoRowTuple = (String, String, String, String, String, String, i64, i64);

fn ko_row_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<KoRowTuple> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn ko_from_tuple(row: KoRowTuple) -> Result<KnowledgeObject> {
    let (id, title, content, content_hash, ko_type, tags, created_at, updated_at) = row;
    Ok(KnowledgeObject {
        id: parse_uuid(&id)?,
        title,
        content,
        content_hash,
        ko_type: KoType::from_str_lossy(&ko_type),
        tags: serde_json::from_str(&tags)?,
        created_at: created_at as u64,
        updated_at: updated_at as u64,
    })
}

fn physics_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredPhysics> {
    Ok(StoredPhysics {
        physics: Physics {
            position: Vec2::new(row.get(0)?, row.get(1)?),
            velocity: Vec2::new(row.get(2)?, row.get(3)?),
            entropy: row.get(4)?,
            mass: row.get(5)?,
        },
        anchored: row.get::<_, i64>(6)? != 0,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("bad uuid {s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ko(title: &str, content: &str, now: u64) -> KnowledgeObject {
        KnowledgeObject::new(title, content, KoType::Fragment, vec![], now)
    }

    #[test]
    fn test_save_and_get_ko() {
        let store = Store::open_in_memory().unwrap();
        let original = ko("alpha", "first note", 1000);
        store.save_ko(&original).unwrap();

        let loaded = store.get_ko(original.id).unwrap().unwrap();
        assert_eq!(loaded.title, "alpha");
        assert_eq!(loaded.content_hash, original.content_hash);
        assert_eq!(loaded.ko_type, KoType::Fragment);
    }

    #[test]
    fn test_save_creates_memory_and_physics() {
        let store = Store::open_in_memory().unwrap();
        let k = ko("alpha", "note", 1000);
        store.save_ko(&k).unwrap();

        let memory = store.get_memory(k.id).unwrap().unwrap();
        assert_eq!(memory.observation_count, 0);
        assert!(memory.affinity.is_empty());

        let stored = store.get_physics(k.id).unwrap().unwrap();
        assert_eq!(stored.physics.entropy, 1.0);
        assert_eq!(stored.physics.mass, 1.0);
        assert!(!stored.anchored);
    }

    #[test]
    fn test_resave_preserves_memory() {
        let store = Store::open_in_memory().unwrap();
        let mut k = ko("alpha", "note", 1000);
        store.save_ko(&k).unwrap();
        store.record_observation(k.id, 500, 2000).unwrap();

        k.update_content("alpha", "revised note", vec![], 3000);
        store.save_ko(&k).unwrap();

        let memory = store.get_memory(k.id).unwrap().unwrap();
        assert_eq!(memory.observation_count, 1, "re-save must not reset memory");
        let loaded = store.get_ko(k.id).unwrap().unwrap();
        assert_eq!(loaded.content, "revised note");
    }

    #[test]
    fn test_delete_cascades() {
        let store = Store::open_in_memory().unwrap();
        let a = ko("a", "1", 0);
        let b = ko("b", "2", 0);
        store.save_ko(&a).unwrap();
        store.save_ko(&b).unwrap();
        store.create_link(a.id, b.id, LinkType::Explicit, 0).unwrap();

        assert!(store.delete_ko(a.id).unwrap());
        assert!(store.get_ko(a.id).unwrap().is_none());
        assert!(store.get_memory(a.id).unwrap().is_none());
        assert!(store.get_physics(a.id).unwrap().is_none());
        assert!(store.all_links().unwrap().is_empty());
    }

    #[test]
    fn test_record_observation_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let k = ko("a", "note", 0);
        store.save_ko(&k).unwrap();

        let memory = store.record_observation(k.id, 1200, 5000).unwrap().unwrap();
        assert_eq!(memory.observation_count, 1);
        assert_eq!(memory.last_observed, Some(5000));

        let reloaded = store.get_memory(k.id).unwrap().unwrap();
        assert_eq!(reloaded.observation_count, 1);
        assert_eq!(reloaded.history.len(), 1);

        let stored = store.get_physics(k.id).unwrap().unwrap();
        assert!(stored.physics.entropy < 1.0);
    }

    #[test]
    fn test_record_observation_unknown_id_is_noop() {
        let store = Store::open_in_memory().unwrap();
        let result = store.record_observation(Uuid::new_v4(), 100, 0).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_record_collision_updates_both_sides() {
        let store = Store::open_in_memory().unwrap();
        let a = ko("a", "1", 0);
        let b = ko("b", "2", 0);
        store.save_ko(&a).unwrap();
        store.save_ko(&b).unwrap();

        assert!(store
            .record_collision(a.id, b.id, CollisionOutcome::Synthesis, 1000)
            .unwrap());

        let ma = store.get_memory(a.id).unwrap().unwrap();
        let mb = store.get_memory(b.id).unwrap().unwrap();
        assert_eq!(ma.collision_count, 1);
        assert_eq!(mb.collision_count, 1);
        assert_eq!(ma.affinity.get(&b.id), mb.affinity.get(&a.id));
    }

    #[test]
    fn test_record_collision_missing_side_is_noop() {
        let store = Store::open_in_memory().unwrap();
        let a = ko("a", "1", 0);
        store.save_ko(&a).unwrap();

        let applied = store
            .record_collision(a.id, Uuid::new_v4(), CollisionOutcome::Dismiss, 0)
            .unwrap();
        assert!(!applied);
        let ma = store.get_memory(a.id).unwrap().unwrap();
        assert_eq!(ma.collision_count, 0);
    }

    #[test]
    fn test_orphans_and_relatives() {
        let store = Store::open_in_memory().unwrap();
        let a = ko("a", "1", 0);
        let b = ko("b", "2", 0);
        let c = ko("c", "3", 0);
        for k in [&a, &b, &c] {
            store.save_ko(k).unwrap();
        }
        store.create_link(a.id, b.id, LinkType::Explicit, 0).unwrap();

        let orphans = store.orphans().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, c.id);

        let relatives = store.relatives(a.id, 10).unwrap();
        assert_eq!(relatives.len(), 1);
        assert_eq!(relatives[0].id, b.id);

        let strangers = store.strangers(a.id, 10).unwrap();
        assert_eq!(strangers.len(), 1);
        assert_eq!(strangers[0].id, c.id);
    }

    #[test]
    fn test_forgotten_query() {
        let store = Store::open_in_memory().unwrap();
        let old = ko("old", "1", 0);
        let fresh = ko("fresh", "2", 0);
        store.save_ko(&old).unwrap();
        store.save_ko(&fresh).unwrap();

        let now = 40 * MILLIS_PER_DAY;
        store.record_observation(old.id, 100, 5 * MILLIS_PER_DAY).unwrap();
        store.record_observation(fresh.id, 100, now - 1000).unwrap();

        let forgotten = store.forgotten(30.0, now).unwrap();
        assert_eq!(forgotten.len(), 1);
        assert_eq!(forgotten[0].id, old.id);
    }

    #[test]
    fn test_forgotten_includes_never_observed() {
        let store = Store::open_in_memory().unwrap();
        let k = ko("never", "1", 0);
        store.save_ko(&k).unwrap();

        let forgotten = store.forgotten(30.0, 100 * MILLIS_PER_DAY).unwrap();
        assert_eq!(forgotten.len(), 1);
    }

    #[test]
    fn test_search() {
        let store = Store::open_in_memory().unwrap();
        store.save_ko(&ko("borrow checker", "rust ownership", 1)).unwrap();
        store.save_ko(&ko("sourdough", "bread starter", 2)).unwrap();

        let hits = store.search("rust", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "borrow checker");

        assert!(store.search("quantum", 10).unwrap().is_empty());
    }

    #[test]
    fn test_links_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let a = ko("a", "1", 0);
        let b = ko("b", "2", 0);
        store.save_ko(&a).unwrap();
        store.save_ko(&b).unwrap();

        store.create_link(a.id, b.id, LinkType::Collision, 99).unwrap();
        // Duplicate inserts are ignored.
        store.create_link(a.id, b.id, LinkType::Explicit, 100).unwrap();

        let links = store.links_for(a.id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Collision);
        assert_eq!(links[0].created_at, 99);

        assert!(store.delete_link(a.id, b.id).unwrap());
        assert!(!store.delete_link(a.id, b.id).unwrap());
    }

    #[test]
    fn test_physics_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let k = ko("a", "1", 0);
        store.save_ko_at(&k, Vec2::new(10.0, -20.0)).unwrap();

        let mut stored = store.get_physics(k.id).unwrap().unwrap();
        assert_eq!(stored.physics.position, Vec2::new(10.0, -20.0));

        stored.physics.velocity = Vec2::new(0.5, 0.25);
        stored.anchored = true;
        store.put_physics(k.id, &stored).unwrap();

        let back = store.get_physics(k.id).unwrap().unwrap();
        assert_eq!(back.physics.velocity, Vec2::new(0.5, 0.25));
        assert!(back.anchored);
    }

    #[test]
    fn test_record_drift_accumulates() {
        let store = Store::open_in_memory().unwrap();
        let k = ko("a", "1", 0);
        store.save_ko(&k).unwrap();

        store.record_drift(k.id, 300.0, 1000).unwrap().unwrap();
        let memory = store.record_drift(k.id, 250.0, 2000).unwrap().unwrap();
        assert_eq!(memory.drift_distance, 550.0);
        assert!(memory.traits.restless, "unobserved KO with 550 units of travel");

        let reloaded = store.get_memory(k.id).unwrap().unwrap();
        assert_eq!(reloaded.drift_distance, 550.0);

        assert!(store.record_drift(Uuid::new_v4(), 10.0, 0).unwrap().is_none());
    }

    #[test]
    fn test_random_kos_bounded() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..5 {
            store.save_ko(&ko(&format!("k{i}"), "x", i)).unwrap();
        }
        assert_eq!(store.random_kos(3).unwrap().len(), 3);
        assert_eq!(store.random_kos(50).unwrap().len(), 5);
    }
}
