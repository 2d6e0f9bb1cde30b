//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for opsdeck. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use opsdeck_core::{
    now_millis, ActorId, AuditDraft, AuditLogEntry, AuditQuery, ChainHash, CreatorRef, Credential,
    CredentialId, CredentialSummary, SealedSecret, Server, ServerId, ServerStatus,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, Store};

const CREDENTIAL_COLUMNS: &str =
    "id, title, username, secret, url, notes, creator_id, creator_name, created_at";

const SUMMARY_COLUMNS: &str =
    "id, title, username, url, notes, creator_id, creator_name, created_at";

const AUDIT_COLUMNS: &str = "seq, timestamp, actor_id, actor_name, actor_role, action, \
     resource_type, resource_id, origin, outcome, detail, prev_hash, entry_hash";

const SERVER_COLUMNS: &str = "id, name, address, status, last_probe_at, created_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())?;
        migration::migrate(&mut conn)?;
        tracing::info!(path = %path.as_ref().display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row conversion
// ─────────────────────────────────────────────────────────────────────────────

fn fixed<const N: usize>(bytes: Vec<u8>, column: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|b: Vec<u8>| {
        StoreError::InvalidData(format!("{}: expected {} bytes, got {}", column, N, b.len()))
    })
}

fn parse_column<T>(text: &str) -> Result<T>
where
    T: std::str::FromStr<Err = opsdeck_core::CoreError>,
{
    Ok(text.parse::<T>()?)
}

struct SummaryRow {
    id: Vec<u8>,
    title: String,
    username: Option<String>,
    url: Option<String>,
    notes: Option<String>,
    creator_id: Vec<u8>,
    creator_name: String,
    created_at: i64,
}

impl SummaryRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            username: row.get("username")?,
            url: row.get("url")?,
            notes: row.get("notes")?,
            creator_id: row.get("creator_id")?,
            creator_name: row.get("creator_name")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_summary(self) -> Result<CredentialSummary> {
        Ok(CredentialSummary {
            id: CredentialId::from_bytes(fixed(self.id, "credentials.id")?),
            title: self.title,
            username: self.username,
            url: self.url,
            notes: self.notes,
            creator: CreatorRef {
                id: ActorId::from_bytes(fixed(self.creator_id, "credentials.creator_id")?),
                name: self.creator_name,
            },
            created_at: self.created_at,
        })
    }
}

fn read_credential_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(SummaryRow, String)> {
    Ok((SummaryRow::read(row)?, row.get("secret")?))
}

fn into_credential((summary, secret): (SummaryRow, String)) -> Result<Credential> {
    let summary = summary.into_summary()?;
    Ok(Credential {
        id: summary.id,
        title: summary.title,
        username: summary.username,
        secret: SealedSecret::from_hex(secret),
        url: summary.url,
        notes: summary.notes,
        creator: summary.creator,
        created_at: summary.created_at,
    })
}

struct AuditRow {
    seq: i64,
    timestamp: i64,
    actor_id: Vec<u8>,
    actor_name: String,
    actor_role: String,
    action: String,
    resource_type: String,
    resource_id: String,
    origin: Option<String>,
    outcome: String,
    detail: String,
    prev_hash: Vec<u8>,
    entry_hash: Vec<u8>,
}

impl AuditRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get("seq")?,
            timestamp: row.get("timestamp")?,
            actor_id: row.get("actor_id")?,
            actor_name: row.get("actor_name")?,
            actor_role: row.get("actor_role")?,
            action: row.get("action")?,
            resource_type: row.get("resource_type")?,
            resource_id: row.get("resource_id")?,
            origin: row.get("origin")?,
            outcome: row.get("outcome")?,
            detail: row.get("detail")?,
            prev_hash: row.get("prev_hash")?,
            entry_hash: row.get("entry_hash")?,
        })
    }

    fn into_entry(self) -> Result<AuditLogEntry> {
        Ok(AuditLogEntry {
            seq: self.seq as u64,
            timestamp: self.timestamp,
            actor_id: ActorId::from_bytes(fixed(self.actor_id, "audit_log.actor_id")?),
            actor_name: self.actor_name,
            actor_role: parse_column(&self.actor_role)?,
            action: parse_column(&self.action)?,
            resource_type: parse_column(&self.resource_type)?,
            resource_id: self.resource_id,
            origin: self.origin,
            outcome: parse_column(&self.outcome)?,
            detail: serde_json::from_str(&self.detail)
                .map_err(|e| StoreError::Serialization(format!("audit detail: {}", e)))?,
            prev_hash: ChainHash(fixed(self.prev_hash, "audit_log.prev_hash")?),
            entry_hash: ChainHash(fixed(self.entry_hash, "audit_log.entry_hash")?),
        })
    }
}

fn read_server_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(Vec<u8>, String, String, String, Option<i64>, i64)> {
    Ok((
        row.get("id")?,
        row.get("name")?,
        row.get("address")?,
        row.get("status")?,
        row.get("last_probe_at")?,
        row.get("created_at")?,
    ))
}

fn into_server(
    (id, name, address, status, last_probe_at, created_at): (
        Vec<u8>,
        String,
        String,
        String,
        Option<i64>,
        i64,
    ),
) -> Result<Server> {
    Ok(Server {
        id: ServerId::from_bytes(fixed(id, "servers.id")?),
        name,
        address,
        status: parse_column(&status)?,
        last_probe_at,
        created_at,
    })
}

fn insert_credential_row(conn: &Connection, c: &Credential) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO credentials ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            CREDENTIAL_COLUMNS
        ),
        params![
            c.id.as_bytes().as_slice(),
            c.title,
            c.username,
            c.secret.as_hex(),
            c.url,
            c.notes,
            c.creator.id.as_bytes().as_slice(),
            c.creator.name,
            c.created_at,
        ],
    )?;
    Ok(())
}

fn select_credential(conn: &Connection, id: &CredentialId) -> Result<Option<Credential>> {
    conn.query_row(
        &format!("SELECT {} FROM credentials WHERE id = ?1", CREDENTIAL_COLUMNS),
        params![id.as_bytes().as_slice()],
        read_credential_row,
    )
    .optional()?
    .map(into_credential)
    .transpose()
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult> {
        let credential = credential.clone();
        self.run_blocking(move |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM credentials WHERE id = ?1",
                    params![credential.id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Ok(InsertResult::AlreadyExists);
            }
            insert_credential_row(conn, &credential)?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        let id = *id;
        self.run_blocking(move |conn| select_credential(conn, &id))
            .await
    }

    async fn list_credential_summaries(&self) -> Result<Vec<CredentialSummary>> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM credentials ORDER BY created_at, id",
                SUMMARY_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], SummaryRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(SummaryRow::into_summary).collect()
        })
        .await
    }

    async fn delete_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        let id = *id;
        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            let existing = select_credential(&tx, &id)?;
            if existing.is_some() {
                tx.execute(
                    "DELETE FROM credentials WHERE id = ?1",
                    params![id.as_bytes().as_slice()],
                )?;
            }
            tx.commit()?;
            Ok(existing)
        })
        .await
    }

    async fn append_audit(&self, draft: AuditDraft) -> Result<AuditLogEntry> {
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let head: Option<(i64, Vec<u8>)> = tx
                .query_row(
                    "SELECT seq, entry_hash FROM audit_log ORDER BY seq DESC LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let (seq, prev_hash) = match head {
                Some((seq, hash)) => (seq as u64 + 1, ChainHash(fixed(hash, "audit_log.entry_hash")?)),
                None => (1, ChainHash::GENESIS),
            };

            let entry = draft.seal(seq, now_millis(), prev_hash)?;
            let detail = serde_json::to_string(&entry.detail)
                .map_err(|e| StoreError::Serialization(format!("audit detail: {}", e)))?;

            tx.execute(
                &format!(
                    "INSERT INTO audit_log ({}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    AUDIT_COLUMNS
                ),
                params![
                    entry.seq as i64,
                    entry.timestamp,
                    entry.actor_id.as_bytes().as_slice(),
                    entry.actor_name,
                    entry.actor_role.as_str(),
                    entry.action.as_str(),
                    entry.resource_type.as_str(),
                    entry.resource_id,
                    entry.origin,
                    entry.outcome.as_str(),
                    detail,
                    entry.prev_hash.0.as_slice(),
                    entry.entry_hash.0.as_slice(),
                ],
            )?;
            tx.commit()?;

            Ok(entry)
        })
        .await
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>> {
        let query = query.clone();
        self.run_blocking(move |conn| {
            let mut sql = format!("SELECT {} FROM audit_log WHERE 1 = 1", AUDIT_COLUMNS);
            let mut args: Vec<Value> = Vec::new();

            if let Some(actor_id) = query.actor_id {
                sql.push_str(" AND actor_id = ?");
                args.push(Value::Blob(actor_id.as_bytes().to_vec()));
            }
            if let Some(action) = query.action {
                sql.push_str(" AND action = ?");
                args.push(Value::Text(action.as_str().to_string()));
            }
            if let Some(resource_type) = query.resource_type {
                sql.push_str(" AND resource_type = ?");
                args.push(Value::Text(resource_type.as_str().to_string()));
            }
            if let Some(resource_id) = &query.resource_id {
                sql.push_str(" AND resource_id = ?");
                args.push(Value::Text(resource_id.clone()));
            }
            if let Some(since) = query.since {
                sql.push_str(" AND timestamp >= ?");
                args.push(Value::Integer(since));
            }
            if let Some(until) = query.until {
                sql.push_str(" AND timestamp < ?");
                args.push(Value::Integer(until));
            }
            sql.push_str(" ORDER BY seq");
            if let Some(limit) = query.limit {
                sql.push_str(" LIMIT ?");
                args.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args), AuditRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(AuditRow::into_entry).collect()
        })
        .await
    }

    async fn audit_trail(&self) -> Result<Vec<AuditLogEntry>> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM audit_log ORDER BY seq",
                AUDIT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], AuditRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(AuditRow::into_entry).collect()
        })
        .await
    }

    async fn insert_server(&self, server: &Server) -> Result<InsertResult> {
        let server = server.clone();
        self.run_blocking(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO servers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    SERVER_COLUMNS
                ),
                params![
                    server.id.as_bytes().as_slice(),
                    server.name,
                    server.address,
                    server.status.as_str(),
                    server.last_probe_at,
                    server.created_at,
                ],
            )?;
            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get_server(&self, id: &ServerId) -> Result<Option<Server>> {
        let id = *id;
        self.run_blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM servers WHERE id = ?1", SERVER_COLUMNS),
                params![id.as_bytes().as_slice()],
                read_server_row,
            )
            .optional()?
            .map(into_server)
            .transpose()
        })
        .await
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM servers ORDER BY created_at, id",
                SERVER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], read_server_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(into_server).collect()
        })
        .await
    }

    async fn update_server_status(
        &self,
        id: &ServerId,
        status: ServerStatus,
        probed_at: Option<i64>,
    ) -> Result<bool> {
        let id = *id;
        self.run_blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE servers SET status = ?1, last_probe_at = ?2 WHERE id = ?3",
                params![status.as_str(), probed_at, id.as_bytes().as_slice()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_server(&self, id: &ServerId) -> Result<bool> {
        let id = *id;
        self.run_blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM servers WHERE id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}
