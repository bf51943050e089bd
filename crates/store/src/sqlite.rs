//! SQLite graph backend.
//!
//! A single database file with three tables:
//! - `entities` — message/tool-call/chunk records
//! - `edges`    — typed relationships
//! - `topics`   — background-computed clusters
//!
//! `apply` runs every op of a batch inside one transaction, which is what
//! makes chunk-set creation and replacement all-or-nothing. Nearest-neighbor
//! search scans non-deleted embedded rows and ranks by cosine similarity in
//! process; a deployment with a real ANN engine swaps this backend out
//! behind the `GraphStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use engram_core::vector::cosine_similarity;
use engram_core::{
    Edge, EdgeKind, Entity, EntityKind, GraphOp, GraphStore, Role, SearchFilter, SearchHit,
    StoreError, Topic, VersionRecord,
};

/// A durable SQLite graph store.
pub struct SqliteGraph {
    pool: SqlitePool,
}

impl SqliteGraph {
    /// Create a new SQLite backend from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Backend(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        info!("SQLite graph backend initialized at {path}");
        Ok(backend)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                role            TEXT,
                content         TEXT NOT NULL,
                snippet         TEXT NOT NULL DEFAULT '',
                created_at      TEXT NOT NULL,
                parent_id       TEXT,
                tool_name       TEXT,
                tool_args       TEXT,
                embedding       BLOB,
                token_count     INTEGER NOT NULL DEFAULT 0,
                metadata        TEXT NOT NULL DEFAULT '{}',
                edited          INTEGER NOT NULL DEFAULT 0,
                deleted         INTEGER NOT NULL DEFAULT 0,
                versions        TEXT NOT NULL DEFAULT '[]',
                is_chunk        INTEGER NOT NULL DEFAULT 0,
                chunk_index     INTEGER,
                chunk_parent_id TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("entities table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entities_created_at ON entities(created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entities_chunk_parent ON entities(chunk_parent_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chunk_parent index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS edges (
                from_id TEXT NOT NULL,
                to_id   TEXT NOT NULL,
                kind    TEXT NOT NULL,
                PRIMARY KEY (from_id, to_id, kind)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("edges table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id, kind)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("edges index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS topics (
                id         TEXT PRIMARY KEY,
                summary    TEXT NOT NULL,
                member_ids TEXT NOT NULL DEFAULT '[]',
                from_ts    TEXT NOT NULL,
                to_ts      TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("topics table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn ts(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn kind_str(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Message => "message",
            EntityKind::ToolCall => "tool_call",
        }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Serialize an embedding vector to little-endian bytes.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn row_to_entity(row: &sqlx::sqlite::SqliteRow) -> Result<Entity, StoreError> {
        let col = |e: sqlx::Error, name: &str| StoreError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| col(e, "id"))?;
        let kind_s: String = row.try_get("kind").map_err(|e| col(e, "kind"))?;
        let role_s: Option<String> = row.try_get("role").map_err(|e| col(e, "role"))?;
        let content: String = row.try_get("content").map_err(|e| col(e, "content"))?;
        let snippet: String = row.try_get("snippet").map_err(|e| col(e, "snippet"))?;
        let created_at_s: String = row.try_get("created_at").map_err(|e| col(e, "created_at"))?;
        let parent_id: Option<String> = row.try_get("parent_id").map_err(|e| col(e, "parent_id"))?;
        let tool_name: Option<String> = row.try_get("tool_name").map_err(|e| col(e, "tool_name"))?;
        let tool_args: Option<String> = row.try_get("tool_args").map_err(|e| col(e, "tool_args"))?;
        let token_count: i64 = row.try_get("token_count").map_err(|e| col(e, "token_count"))?;
        let metadata_s: String = row.try_get("metadata").map_err(|e| col(e, "metadata"))?;
        let edited: bool = row.try_get("edited").map_err(|e| col(e, "edited"))?;
        let deleted: bool = row.try_get("deleted").map_err(|e| col(e, "deleted"))?;
        let versions_s: String = row.try_get("versions").map_err(|e| col(e, "versions"))?;
        let is_chunk: bool = row.try_get("is_chunk").map_err(|e| col(e, "is_chunk"))?;
        let chunk_index: Option<i64> = row.try_get("chunk_index").map_err(|e| col(e, "chunk_index"))?;
        let chunk_parent_id: Option<String> = row
            .try_get("chunk_parent_id")
            .map_err(|e| col(e, "chunk_parent_id"))?;

        let kind = match kind_s.as_str() {
            "tool_call" => EntityKind::ToolCall,
            _ => EntityKind::Message,
        };
        let role = role_s.as_deref().and_then(|r| match r {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        });

        let embedding: Option<Vec<u8>> = row.try_get("embedding").ok();
        let embedding = embedding.map(|blob| {
            blob.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        });

        let metadata = serde_json::from_str(&metadata_s).unwrap_or_default();
        let versions: Vec<VersionRecord> = serde_json::from_str(&versions_s).unwrap_or_default();

        Ok(Entity {
            id,
            kind,
            role,
            content,
            snippet,
            created_at: Self::parse_ts(&created_at_s),
            parent_id,
            tool_name,
            tool_args,
            embedding,
            token_count: token_count.max(0) as usize,
            metadata,
            edited,
            deleted,
            versions,
            is_chunk,
            chunk_index: chunk_index.map(|i| i.max(0) as u32),
            chunk_parent_id,
        })
    }

    async fn exec_op<'t>(
        tx: &mut sqlx::Transaction<'t, sqlx::Sqlite>,
        op: GraphOp,
    ) -> Result<(), StoreError> {
        match op {
            GraphOp::PutNode(e) => {
                let metadata = serde_json::to_string(&e.metadata)
                    .map_err(|err| StoreError::Backend(format!("metadata serialization: {err}")))?;
                let versions = serde_json::to_string(&e.versions)
                    .map_err(|err| StoreError::Backend(format!("versions serialization: {err}")))?;
                let blob = e.embedding.as_deref().map(Self::embedding_to_blob);

                sqlx::query(
                    r#"
                    INSERT INTO entities (
                        id, kind, role, content, snippet, created_at, parent_id,
                        tool_name, tool_args, embedding, token_count, metadata,
                        edited, deleted, versions, is_chunk, chunk_index, chunk_parent_id
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                    ON CONFLICT(id) DO UPDATE SET
                        content = excluded.content,
                        snippet = excluded.snippet,
                        parent_id = excluded.parent_id,
                        embedding = excluded.embedding,
                        token_count = excluded.token_count,
                        metadata = excluded.metadata,
                        edited = excluded.edited,
                        deleted = excluded.deleted,
                        versions = excluded.versions,
                        is_chunk = excluded.is_chunk,
                        chunk_index = excluded.chunk_index,
                        chunk_parent_id = excluded.chunk_parent_id
                    "#,
                )
                .bind(&e.id)
                .bind(Self::kind_str(e.kind))
                .bind(e.role.map(Self::role_str))
                .bind(&e.content)
                .bind(&e.snippet)
                .bind(Self::ts(&e.created_at))
                .bind(&e.parent_id)
                .bind(&e.tool_name)
                .bind(&e.tool_args)
                .bind(blob.as_deref())
                .bind(e.token_count as i64)
                .bind(metadata)
                .bind(e.edited)
                .bind(e.deleted)
                .bind(versions)
                .bind(e.is_chunk)
                .bind(e.chunk_index.map(|i| i as i64))
                .bind(&e.chunk_parent_id)
                .execute(&mut **tx)
                .await
                .map_err(|err| StoreError::Backend(format!("INSERT entity failed: {err}")))?;
            }
            GraphOp::DeleteNode(id) => {
                sqlx::query("DELETE FROM entities WHERE id = ?1")
                    .bind(&id)
                    .execute(&mut **tx)
                    .await
                    .map_err(|err| StoreError::Backend(format!("DELETE entity failed: {err}")))?;
            }
            GraphOp::PutEdge(edge) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO edges (from_id, to_id, kind) VALUES (?1, ?2, ?3)",
                )
                .bind(&edge.from)
                .bind(&edge.to)
                .bind(edge_kind_str(edge.kind))
                .execute(&mut **tx)
                .await
                .map_err(|err| StoreError::Backend(format!("INSERT edge failed: {err}")))?;
            }
            GraphOp::DeleteEdge(edge) => {
                sqlx::query("DELETE FROM edges WHERE from_id = ?1 AND to_id = ?2 AND kind = ?3")
                    .bind(&edge.from)
                    .bind(&edge.to)
                    .bind(edge_kind_str(edge.kind))
                    .execute(&mut **tx)
                    .await
                    .map_err(|err| StoreError::Backend(format!("DELETE edge failed: {err}")))?;
            }
            GraphOp::PutTopic(topic) => {
                let member_ids = serde_json::to_string(&topic.member_ids)
                    .map_err(|err| StoreError::Backend(format!("member_ids serialization: {err}")))?;
                sqlx::query(
                    r#"
                    INSERT INTO topics (id, summary, member_ids, from_ts, to_ts, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(id) DO UPDATE SET
                        summary = excluded.summary,
                        member_ids = excluded.member_ids,
                        from_ts = excluded.from_ts,
                        to_ts = excluded.to_ts
                    "#,
                )
                .bind(&topic.id)
                .bind(&topic.summary)
                .bind(member_ids)
                .bind(Self::ts(&topic.from))
                .bind(Self::ts(&topic.to))
                .bind(Self::ts(&topic.created_at))
                .execute(&mut **tx)
                .await
                .map_err(|err| StoreError::Backend(format!("INSERT topic failed: {err}")))?;
            }
            GraphOp::DeleteTopic(id) => {
                sqlx::query("DELETE FROM topics WHERE id = ?1")
                    .bind(&id)
                    .execute(&mut **tx)
                    .await
                    .map_err(|err| StoreError::Backend(format!("DELETE topic failed: {err}")))?;
            }
        }
        Ok(())
    }

    fn row_to_topic(row: &sqlx::sqlite::SqliteRow) -> Result<Topic, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("topic id column: {e}")))?;
        let summary: String = row
            .try_get("summary")
            .map_err(|e| StoreError::QueryFailed(format!("summary column: {e}")))?;
        let member_ids_s: String = row
            .try_get("member_ids")
            .map_err(|e| StoreError::QueryFailed(format!("member_ids column: {e}")))?;
        let from_s: String = row
            .try_get("from_ts")
            .map_err(|e| StoreError::QueryFailed(format!("from_ts column: {e}")))?;
        let to_s: String = row
            .try_get("to_ts")
            .map_err(|e| StoreError::QueryFailed(format!("to_ts column: {e}")))?;
        let created_s: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(Topic {
            id,
            summary,
            member_ids: serde_json::from_str(&member_ids_s).unwrap_or_default(),
            from: Self::parse_ts(&from_s),
            to: Self::parse_ts(&to_s),
            created_at: Self::parse_ts(&created_s),
        })
    }
}

fn edge_kind_str(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::ReplyTo => "reply_to",
        EdgeKind::ChunkOf => "chunk_of",
        EdgeKind::CalledBy => "called_by",
        EdgeKind::BelongsTo => "belongs_to",
    }
}

fn parse_edge_kind(s: &str) -> EdgeKind {
    match s {
        "chunk_of" => EdgeKind::ChunkOf,
        "called_by" => EdgeKind::CalledBy,
        "belongs_to" => EdgeKind::BelongsTo,
        _ => EdgeKind::ReplyTo,
    }
}

#[async_trait]
impl GraphStore for SqliteGraph {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn apply(&self, ops: Vec<GraphOp>) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(format!("BEGIN failed: {e}")))?;

        for op in ops {
            Self::exec_op(&mut tx, op).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(format!("COMMIT failed: {e}")))?;
        Ok(())
    }

    async fn node(&self, id: &str) -> Result<Option<Entity>, StoreError> {
        let row = sqlx::query("SELECT * FROM entities WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET by id: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_entity(r)?)),
            None => Ok(None),
        }
    }

    async fn nodes(&self, ids: &[String]) -> Result<Vec<Entity>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT * FROM entities WHERE id IN ({})",
            placeholders.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET many: {e}")))?;

        let mut by_id: std::collections::HashMap<String, Entity> = rows
            .iter()
            .filter_map(|r| Self::row_to_entity(r).ok())
            .map(|e| (e.id.clone(), e))
            .collect();

        // Preserve request order; skip misses.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn logical(&self, id: &str) -> Result<Option<Vec<Entity>>, StoreError> {
        // One transaction so the chunk-set read is a consistent snapshot
        // with the node read even under a concurrent re-chunking edit.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(format!("BEGIN failed: {e}")))?;

        let row = sqlx::query("SELECT * FROM entities WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("logical head: {e}")))?;

        let Some(ref row) = row else {
            return Ok(None);
        };
        let head = Self::row_to_entity(row)?;

        let result = match &head.chunk_parent_id {
            Some(key) => {
                let rows = sqlx::query(
                    "SELECT * FROM entities WHERE chunk_parent_id = ?1 ORDER BY chunk_index ASC",
                )
                .bind(key)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("logical chunk set: {e}")))?;
                rows.iter().map(Self::row_to_entity).collect::<Result<Vec<_>, _>>()?
            }
            None => vec![head],
        };

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(format!("COMMIT failed: {e}")))?;
        Ok(Some(result))
    }

    async fn chunks_of(&self, parent_key: &str) -> Result<Vec<Entity>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM entities WHERE chunk_parent_id = ?1 ORDER BY chunk_index ASC",
        )
        .bind(parent_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("chunks_of: {e}")))?;

        rows.iter().map(Self::row_to_entity).collect()
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Entity>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM entities
            WHERE deleted = 0 AND is_chunk = 0
            ORDER BY created_at DESC, id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent: {e}")))?;

        rows.iter().map(Self::row_to_entity).collect()
    }

    async fn in_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM entities
            WHERE deleted = 0 AND is_chunk = 0
              AND created_at >= ?1 AND created_at < ?2
            ORDER BY created_at DESC, id ASC
            LIMIT ?3
            "#,
        )
        .bind(Self::ts(&from))
        .bind(Self::ts(&to))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("in_period: {e}")))?;

        rows.iter().map(Self::row_to_entity).collect()
    }

    async fn edges_to(&self, to: &str, kind: EdgeKind) -> Result<Vec<Edge>, StoreError> {
        let rows = sqlx::query(
            "SELECT from_id, to_id, kind FROM edges WHERE to_id = ?1 AND kind = ?2 ORDER BY from_id",
        )
        .bind(to)
        .bind(edge_kind_str(kind))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("edges_to: {e}")))?;

        rows.iter()
            .map(|row| {
                let from: String = row
                    .try_get("from_id")
                    .map_err(|e| StoreError::QueryFailed(format!("from_id column: {e}")))?;
                let to: String = row
                    .try_get("to_id")
                    .map_err(|e| StoreError::QueryFailed(format!("to_id column: {e}")))?;
                let kind_s: String = row
                    .try_get("kind")
                    .map_err(|e| StoreError::QueryFailed(format!("kind column: {e}")))?;
                Ok(Edge::new(from, to, parse_edge_kind(&kind_s)))
            })
            .collect()
    }

    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: SearchFilter,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let sql = if filter.include_tool_calls {
            "SELECT * FROM entities WHERE deleted = 0 AND embedding IS NOT NULL"
        } else {
            "SELECT * FROM entities WHERE deleted = 0 AND embedding IS NOT NULL AND kind != 'tool_call'"
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("vector scan: {e}")))?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| Self::row_to_entity(row).ok())
            .filter_map(|e| {
                let emb = e.embedding.as_ref()?;
                Some(SearchHit {
                    score: cosine_similarity(emb, query),
                    entity: e,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn topic(&self, id: &str) -> Result<Option<Topic>, StoreError> {
        let row = sqlx::query("SELECT * FROM topics WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("topic: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_topic(r)?)),
            None => Ok(None),
        }
    }

    async fn topics(&self) -> Result<Vec<Topic>, StoreError> {
        let rows = sqlx::query("SELECT * FROM topics ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("topics: {e}")))?;

        rows.iter().map(Self::row_to_topic).collect()
    }

    async fn chunk_records(&self) -> Result<Vec<Entity>, StoreError> {
        let rows = sqlx::query("SELECT * FROM entities WHERE is_chunk = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("chunk_records: {e}")))?;

        rows.iter().map(Self::row_to_entity).collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM entities")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;
        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteGraph {
        SqliteGraph::new("sqlite::memory:").await.unwrap()
    }

    fn message(content: &str) -> Entity {
        Entity::message(Role::User, content)
    }

    #[tokio::test]
    async fn store_and_retrieve() {
        let store = test_store().await;
        let e = message("Rust is a systems programming language");
        let id = e.id.clone();
        store.apply(vec![GraphOp::PutNode(e)]).await.unwrap();

        let fetched = store.node(&id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "Rust is a systems programming language");
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn upsert_on_conflict() {
        let store = test_store().await;
        let mut e1 = message("Version 1");
        e1.id = "upsert_test".into();
        store.apply(vec![GraphOp::PutNode(e1)]).await.unwrap();

        let mut e2 = message("Version 2");
        e2.id = "upsert_test".into();
        store.apply(vec![GraphOp::PutNode(e2)]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let fetched = store.node("upsert_test").await.unwrap().unwrap();
        assert_eq!(fetched.content, "Version 2");
    }

    #[tokio::test]
    async fn embedding_round_trip() {
        let store = test_store().await;
        let mut e = message("Has an embedding");
        e.embedding = Some(vec![0.1, 0.2, 0.3, 0.4]);
        let id = e.id.clone();
        store.apply(vec![GraphOp::PutNode(e)]).await.unwrap();

        let fetched = store.node(&id).await.unwrap().unwrap();
        let emb = fetched.embedding.unwrap();
        assert_eq!(emb.len(), 4);
        assert!((emb[0] - 0.1).abs() < 1e-6);
        assert!((emb[3] - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn versions_round_trip() {
        let store = test_store().await;
        let mut e = message("current");
        e.edited = true;
        e.versions = vec![VersionRecord {
            content: "previous".into(),
            edited_at: Utc::now(),
        }];
        let id = e.id.clone();
        store.apply(vec![GraphOp::PutNode(e)]).await.unwrap();

        let fetched = store.node(&id).await.unwrap().unwrap();
        assert!(fetched.edited);
        assert_eq!(fetched.versions.len(), 1);
        assert_eq!(fetched.versions[0].content, "previous");
    }

    #[tokio::test]
    async fn batch_is_atomic_over_chunk_sets() {
        let store = test_store().await;
        let mut ops = Vec::new();
        let mut head_id = String::new();
        for i in 0..3u32 {
            let mut e = Entity::message(Role::Assistant, format!("slice {i}"));
            e.chunk_parent_id = Some("group_x".into());
            e.chunk_index = Some(i);
            e.is_chunk = i > 0;
            if i == 0 {
                head_id = e.id.clone();
            }
            ops.push(GraphOp::PutNode(e));
        }
        store.apply(ops).await.unwrap();

        let set = store.logical(&head_id).await.unwrap().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set[1].chunk_index, Some(1));
    }

    #[tokio::test]
    async fn recent_filters_and_orders() {
        let store = test_store().await;
        let mut old = message("old");
        old.created_at = Utc::now() - chrono::Duration::hours(2);
        let new = message("new");
        let mut gone = message("gone");
        gone.deleted = true;
        store
            .apply(vec![
                GraphOp::PutNode(old),
                GraphOp::PutNode(new),
                GraphOp::PutNode(gone),
            ])
            .await
            .unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "new");
        assert_eq!(recent[1].content, "old");
    }

    #[tokio::test]
    async fn in_period_bounds() {
        let store = test_store().await;
        let now = Utc::now();
        let mut yesterday = message("yesterday");
        yesterday.created_at = now - chrono::Duration::days(1);
        let today = message("today");
        store
            .apply(vec![GraphOp::PutNode(yesterday), GraphOp::PutNode(today)])
            .await
            .unwrap();

        let hits = store
            .in_period(now - chrono::Duration::hours(1), now + chrono::Duration::hours(1), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "today");
    }

    #[tokio::test]
    async fn vector_search_excludes_tool_calls_when_asked() {
        let store = test_store().await;
        let mut msg = message("a message");
        msg.embedding = Some(vec![1.0, 0.0]);
        let mut tc = Entity::tool_call("calc", "{}", "42", "m");
        tc.embedding = Some(vec![1.0, 0.0]);
        store
            .apply(vec![GraphOp::PutNode(msg), GraphOp::PutNode(tc)])
            .await
            .unwrap();

        let all = store
            .vector_search(&[1.0, 0.0], 10, SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let messages_only = store
            .vector_search(
                &[1.0, 0.0],
                10,
                SearchFilter {
                    include_tool_calls: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(messages_only.len(), 1);
        assert_eq!(messages_only[0].entity.kind, EntityKind::Message);
    }

    #[tokio::test]
    async fn edges_and_topics_round_trip() {
        let store = test_store().await;
        let edge = Edge::new("tc_9", "msg_9", EdgeKind::CalledBy);
        let topic = Topic::new("release planning", vec!["msg_9".into()], Utc::now(), Utc::now());
        let topic_id = topic.id.clone();
        store
            .apply(vec![GraphOp::PutEdge(edge.clone()), GraphOp::PutTopic(topic)])
            .await
            .unwrap();

        assert_eq!(store.edges_to("msg_9", EdgeKind::CalledBy).await.unwrap(), vec![edge]);
        let stored = store.topic(&topic_id).await.unwrap().unwrap();
        assert_eq!(stored.summary, "release planning");
        assert_eq!(stored.member_ids, vec!["msg_9".to_string()]);
    }

    #[tokio::test]
    async fn nodes_skips_missing_ids() {
        let store = test_store().await;
        let e = message("present");
        let id = e.id.clone();
        store.apply(vec![GraphOp::PutNode(e)]).await.unwrap();

        let found = store
            .nodes(&[id.clone(), "absent".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }
}
