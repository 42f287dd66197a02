//! SQLite implementation of the Store trait.
//!
//! The primary storage backend. Uses rusqlite with bundled SQLite, wrapped
//! in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use sealkit_core::{AccessEvent, Identity, Outcome, Policy, PolicyId, ResourcePolicyId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{EventFilter, RegisterResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex; all operations run on the blocking pool
/// to avoid stalling the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::InvalidData(format!("connection mutex poisoned: {}", e))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn policy_to_json(policy: &Policy) -> Result<String> {
    serde_json::to_string(policy).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn policy_from_json(json: &str) -> Result<Policy> {
    serde_json::from_str(json).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessEvent> {
    let policy_id_hex: String = row.get("policy_id")?;
    let actor: String = row.get("actor")?;
    let outcome: i64 = row.get("outcome")?;
    Ok(AccessEvent {
        policy_id: PolicyId::from_hex(&policy_id_hex).map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "policy_id".into(), rusqlite::types::Type::Text)
        })?,
        actor: Identity::parse(&actor).map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "actor".into(), rusqlite::types::Type::Text)
        })?,
        timestamp: row.get("timestamp")?,
        outcome: if outcome != 0 {
            Outcome::Allowed
        } else {
            Outcome::Denied
        },
        reason: row.get("reason")?,
        source_location: row.get("source_location")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn register_policy(
        &self,
        policy: &Policy,
        initial_event: &AccessEvent,
    ) -> Result<RegisterResult> {
        let id_hex = policy.id().to_hex();
        let author = policy.author().to_string();
        let rpid = policy.rpid().map(|r| r.as_str().to_string());
        let doc = policy_to_json(policy)?;
        let event_policy = initial_event.policy_id.to_hex();
        let actor = initial_event.actor.to_string();
        let timestamp = initial_event.timestamp;
        let outcome = matches!(initial_event.outcome, Outcome::Allowed) as i64;
        let reason = initial_event.reason.clone();
        let source = initial_event.source_location.clone();

        self.with_conn(move |conn| {
            // Policy row, shared publication, and initial event commit as one
            // transaction; AlreadyExists rolls back having written nothing.
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "INSERT INTO policies (id, author, rpid, doc, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO NOTHING",
                params![id_hex, author, rpid, doc, now_millis()],
            )?;
            if changed == 0 {
                debug!(policy_id = %id_hex, "policy id already registered");
                return Ok(RegisterResult::AlreadyExists);
            }
            if let Some(rpid) = rpid {
                tx.execute(
                    "INSERT INTO shared_policies (rpid, doc, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(rpid) DO NOTHING",
                    params![rpid, doc, now_millis()],
                )?;
            }
            tx.execute(
                "INSERT INTO events (policy_id, actor, timestamp, outcome, reason, source_location)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![event_policy, actor, timestamp, outcome, reason, source],
            )?;
            tx.commit()?;
            Ok(RegisterResult::Registered)
        })
        .await
    }

    async fn get_policy(&self, id: &PolicyId) -> Result<Option<Policy>> {
        let id_hex = id.to_hex();
        self.with_conn(move |conn| {
            let doc: Option<String> = conn
                .query_row(
                    "SELECT doc FROM policies WHERE id = ?1",
                    params![id_hex],
                    |row| row.get(0),
                )
                .optional()?;
            doc.map(|d| policy_from_json(&d)).transpose()
        })
        .await
    }

    async fn replace_policy(&self, policy: &Policy) -> Result<()> {
        let id_hex = policy.id().to_hex();
        let rpid = policy.rpid().map(|r| r.as_str().to_string());
        let doc = policy_to_json(policy)?;

        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE policies SET rpid = ?2, doc = ?3, updated_at = ?4 WHERE id = ?1",
                params![id_hex, rpid, doc, now_millis()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id_hex));
            }
            Ok(())
        })
        .await
    }

    async fn list_policies_by_author(&self, author: &Identity) -> Result<Vec<PolicyId>> {
        let author = author.to_string();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM policies WHERE author = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![author], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            ids.iter()
                .map(|hex| {
                    PolicyId::from_hex(hex)
                        .map_err(|e| StoreError::InvalidData(e.to_string()))
                })
                .collect()
        })
        .await
    }

    async fn publish_shared_policy(
        &self,
        rpid: &ResourcePolicyId,
        policy: &Policy,
    ) -> Result<()> {
        let rpid = rpid.as_str().to_string();
        let doc = policy_to_json(policy)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO shared_policies (rpid, doc, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(rpid) DO UPDATE SET doc = ?2, updated_at = ?3",
                params![rpid, doc, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_shared_policy(&self, rpid: &ResourcePolicyId) -> Result<Option<Policy>> {
        let rpid = rpid.as_str().to_string();
        self.with_conn(move |conn| {
            let doc: Option<String> = conn
                .query_row(
                    "SELECT doc FROM shared_policies WHERE rpid = ?1",
                    params![rpid],
                    |row| row.get(0),
                )
                .optional()?;
            doc.map(|d| policy_from_json(&d)).transpose()
        })
        .await
    }

    async fn append_event(&self, event: &AccessEvent) -> Result<()> {
        let policy_id = event.policy_id.to_hex();
        let actor = event.actor.to_string();
        let timestamp = event.timestamp;
        let outcome = matches!(event.outcome, Outcome::Allowed) as i64;
        let reason = event.reason.clone();
        let source = event.source_location.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO events (policy_id, actor, timestamp, outcome, reason, source_location)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![policy_id, actor, timestamp, outcome, reason, source],
            )?;
            Ok(())
        })
        .await
    }

    async fn events_for_author(
        &self,
        author: &Identity,
        filter: &EventFilter,
    ) -> Result<Vec<AccessEvent>> {
        let author = author.to_string();
        let policy_filter = filter.policy_id.map(|id| id.to_hex());
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT e.policy_id, e.actor, e.timestamp, e.outcome, e.reason, e.source_location
                 FROM events e
                 JOIN policies p ON p.id = e.policy_id
                 WHERE p.author = ?1
                   AND (?2 IS NULL OR e.policy_id = ?2)
                 ORDER BY e.seq DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![author, policy_filter, limit], row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::{DenialReason, PolicyBuilder, Role};

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn creation_event(policy: &Policy) -> AccessEvent {
        AccessEvent::allowed(policy.id(), policy.author().clone(), 0, Role::Owner)
    }

    #[tokio::test]
    async fn test_register_and_fetch() {
        let store = SqliteStore::open_memory().unwrap();
        let policy = PolicyBuilder::new(identity("sara@example.com"))
            .member(identity("jon@example.com"), Role::Editor)
            .label("report")
            .build()
            .unwrap();

        assert_eq!(
            store
                .register_policy(&policy, &creation_event(&policy))
                .await
                .unwrap(),
            RegisterResult::Registered
        );
        assert_eq!(
            store
                .register_policy(&policy, &creation_event(&policy))
                .await
                .unwrap(),
            RegisterResult::AlreadyExists
        );

        let stored = store.get_policy(&policy.id()).await.unwrap().unwrap();
        assert_eq!(stored, policy);

        // The duplicate registration must not have appended a second event.
        let events = store
            .events_for_author(&identity("sara@example.com"), &EventFilter::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_register_with_rpid_publishes_shared() {
        let store = SqliteStore::open_memory().unwrap();
        let rpid = ResourcePolicyId::new("folder-7").unwrap();
        let first = PolicyBuilder::new(identity("sara@example.com"))
            .rpid(rpid.clone())
            .build()
            .unwrap();
        store
            .register_policy(&first, &creation_event(&first))
            .await
            .unwrap();
        let shared = store.get_shared_policy(&rpid).await.unwrap().unwrap();
        assert_eq!(shared.id(), first.id());

        // A second unit under the same rpid keeps the existing shared policy.
        let second = PolicyBuilder::new(identity("sara@example.com"))
            .rpid(rpid.clone())
            .build()
            .unwrap();
        store
            .register_policy(&second, &creation_event(&second))
            .await
            .unwrap();
        let shared = store.get_shared_policy(&rpid).await.unwrap().unwrap();
        assert_eq!(shared.id(), first.id());
    }

    #[tokio::test]
    async fn test_replace_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let author = identity("sara@example.com");
        let policy = PolicyBuilder::new(author.clone()).build().unwrap();

        assert!(matches!(
            store.replace_policy(&policy).await,
            Err(StoreError::NotFound(_))
        ));

        store
            .register_policy(&policy, &creation_event(&policy))
            .await
            .unwrap();
        let mut updated = policy.clone();
        updated.set_blocked(true, &author);
        store.replace_policy(&updated).await.unwrap();

        let stored = store.get_policy(&policy.id()).await.unwrap().unwrap();
        assert!(stored.blocked());
        assert_eq!(stored.id(), policy.id());
    }

    #[tokio::test]
    async fn test_shared_policy_publish() {
        let store = SqliteStore::open_memory().unwrap();
        let rpid = ResourcePolicyId::new("folder-7").unwrap();
        let policy = PolicyBuilder::new(identity("sara@example.com"))
            .rpid(rpid.clone())
            .build()
            .unwrap();

        assert!(store.get_shared_policy(&rpid).await.unwrap().is_none());
        store.publish_shared_policy(&rpid, &policy).await.unwrap();
        let stored = store.get_shared_policy(&rpid).await.unwrap().unwrap();
        assert_eq!(stored, policy);
    }

    #[tokio::test]
    async fn test_events_query_scoping_and_order() {
        let store = SqliteStore::open_memory().unwrap();
        let sara = identity("sara@example.com");
        let policy = PolicyBuilder::new(sara.clone()).build().unwrap();
        let other = PolicyBuilder::new(identity("jon@example.com"))
            .build()
            .unwrap();
        store
            .register_policy(&policy, &creation_event(&policy))
            .await
            .unwrap();
        store
            .register_policy(&other, &creation_event(&other))
            .await
            .unwrap();

        store
            .append_event(&AccessEvent::allowed(
                policy.id(),
                identity("jon@example.com"),
                100,
                Role::Editor,
            ))
            .await
            .unwrap();
        store
            .append_event(&AccessEvent::denied(
                policy.id(),
                identity("eve@example.com"),
                200,
                DenialReason::NotAuthorized,
            ))
            .await
            .unwrap();
        store
            .append_event(&AccessEvent::allowed(
                other.id(),
                identity("jon@example.com"),
                300,
                Role::Owner,
            ))
            .await
            .unwrap();

        let events = store
            .events_for_author(&sara, &EventFilter::default())
            .await
            .unwrap();
        // Registration wrote the creation event at ts 0.
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].timestamp, 200);
        assert_eq!(events[0].outcome, Outcome::Denied);
        assert_eq!(events[1].timestamp, 100);
        assert_eq!(events[2].timestamp, 0);

        let limited = store
            .events_for_author(
                &sara,
                &EventFilter {
                    policy_id: Some(policy.id()),
                    limit: Some(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].timestamp, 200);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sealkit.db");
        let policy = PolicyBuilder::new(identity("sara@example.com"))
            .build()
            .unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .register_policy(&policy, &creation_event(&policy))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let stored = store.get_policy(&policy.id()).await.unwrap().unwrap();
        assert_eq!(stored, policy);
    }
}
