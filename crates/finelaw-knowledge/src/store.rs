//! Persistent vector index backed by SQLite.
//!
//! Vectors live as little-endian `f32` blobs next to the embedded document
//! (the article title) and its JSON metadata (the article text). Queries are
//! an exhaustive cosine scan over one collection.

use std::path::Path;
use std::sync::Mutex;

use finelaw_core::error::{FineLawError, Result};
use finelaw_core::traits::Embedder;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};

use crate::parser::Article;
use crate::search::{Candidate, SearchResult, rank, render_context};

/// SQLite file created inside the storage location.
pub const DB_FILE: &str = "finelaw.sqlite3";
/// Titles sent to the embedder per request during the first build.
pub const EMBED_BATCH_SIZE: usize = 64;
const METRIC: &str = "cosine";

pub struct KnowledgeStore {
    conn: Mutex<Connection>,
    collection: String,
    embedder: Box<dyn Embedder>,
}

impl KnowledgeStore {
    /// Open (or create) the index at `storage_location` and seed
    /// `collection_name` from `records` if it is empty.
    ///
    /// A non-empty collection is left untouched: no re-embedding and no
    /// check against `records` beyond a logged warning.
    pub async fn build(
        records: &[Article],
        storage_location: &Path,
        collection_name: &str,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        std::fs::create_dir_all(storage_location)?;
        let conn = Connection::open(storage_location.join(DB_FILE))?;
        init_schema(&conn)?;

        let fingerprint = fingerprint(records);
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, metric, embedding_model, fingerprint)
             VALUES (?1, ?2, ?3, ?4)",
            params![collection_name, METRIC, embedder.model(), fingerprint],
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            collection: collection_name.to_string(),
            embedder,
        };

        let existing = store.count()?;
        if existing == 0 {
            store.populate(records, &fingerprint).await?;
        } else {
            store.warn_if_diverged(&fingerprint)?;
            tracing::info!(
                "📚 Collection '{}' already holds {} entries, skipping build",
                store.collection,
                existing
            );
        }
        Ok(store)
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    /// Number of entries in the collection.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1",
            params![self.collection],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// Top `top_k` entries by ascending cosine distance to `query`.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed_one(query).await?;
        let candidates = self.load_candidates()?;
        let results = rank(&query_vector, candidates, top_k)?;
        tracing::debug!(
            "🔎 '{}' → {:?}",
            query,
            results.iter().map(|r| (r.id.as_str(), r.distance)).collect::<Vec<_>>()
        );
        Ok(results)
    }

    /// Search and render the hits into a single context string.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<String> {
        let results = self.search(query, top_k).await?;
        Ok(render_context(&results))
    }

    async fn populate(&self, records: &[Article], fingerprint: &str) -> Result<()> {
        if records.is_empty() {
            tracing::warn!("⚠️ No articles to index in '{}'", self.collection);
            return Ok(());
        }

        let mut vectors = Vec::with_capacity(records.len());
        for batch in records.chunks(EMBED_BATCH_SIZE) {
            let titles: Vec<String> = batch.iter().map(|a| a.title.clone()).collect();
            let embedded = self.embedder.embed(&titles).await?;
            if embedded.len() != titles.len() {
                return Err(FineLawError::Embedding(format!(
                    "requested {} embeddings, got {}",
                    titles.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries (collection, id, seq, document, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (i, (article, vector)) in records.iter().zip(&vectors).enumerate() {
                let metadata = serde_json::json!({ "text": article.text }).to_string();
                stmt.execute(params![
                    self.collection,
                    format!("id{i}"),
                    i as i64,
                    article.title,
                    metadata,
                    encode_vector(vector),
                ])?;
            }
        }
        tx.execute(
            "UPDATE collections SET fingerprint = ?1, embedding_model = ?2 WHERE name = ?3",
            params![fingerprint, self.embedder.model(), self.collection],
        )?;
        tx.commit()?;

        tracing::info!(
            "📚 Indexed {} articles into '{}' with {}",
            records.len(),
            self.collection,
            self.embedder.model()
        );
        Ok(())
    }

    fn warn_if_diverged(&self, fingerprint: &str) -> Result<()> {
        let conn = self.lock()?;
        let stored: Option<(String, String)> = conn
            .query_row(
                "SELECT embedding_model, fingerprint FROM collections WHERE name = ?1",
                params![self.collection],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        if let Some((model, stored_fingerprint)) = stored {
            if model != self.embedder.model() {
                tracing::warn!(
                    "⚠️ Collection '{}' was built with '{}' but queries use '{}'",
                    self.collection,
                    model,
                    self.embedder.model()
                );
            }
            if stored_fingerprint != fingerprint {
                tracing::warn!(
                    "⚠️ Source text differs from the one '{}' was built from; the index is not refreshed",
                    self.collection
                );
            }
        }
        Ok(())
    }

    fn load_candidates(&self) -> Result<Vec<Candidate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, document, metadata, embedding FROM entries
             WHERE collection = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![self.collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (id, title, metadata, blob) = row?;
            let metadata: serde_json::Value = serde_json::from_str(&metadata)?;
            let text = metadata["text"].as_str().unwrap_or_default().to_string();
            candidates.push(Candidate { id, title, text, vector: decode_vector(&blob)? });
        }
        Ok(candidates)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FineLawError::Store(format!("Lock poisoned: {e}")))
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            metric TEXT NOT NULL,
            embedding_model TEXT NOT NULL,
            fingerprint TEXT NOT NULL DEFAULT '',
            created_at TEXT DEFAULT (datetime('now'))
        );
        CREATE TABLE IF NOT EXISTS entries (
            collection TEXT NOT NULL REFERENCES collections(name),
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            document TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, id)
        );",
    )?;
    Ok(())
}

/// SHA-256 over every title and text, used only to warn about stale indexes.
fn fingerprint(records: &[Article]) -> String {
    let mut hasher = Sha256::new();
    for article in records {
        hasher.update(article.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(article.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(FineLawError::Store(format!(
            "corrupt embedding blob of {} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
