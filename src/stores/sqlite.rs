//! Sqlite-backed chunk store with vector search via the sqlite-vec
//! extension.
//!
//! The persisted layout is a single database file inside the index
//! directory: a `chunks` table for text and provenance plus a
//! `chunks_embeddings` vec0 virtual table, both managed through
//! rig-sqlite. A subsequent open on the same path reconstructs an
//! equivalent queryable index with no extra transformation.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use rig::embeddings::{Embedding, EmbeddingModel};
use rig_sqlite::{Column, ColumnValue, SqliteVectorStore, SqliteVectorStoreTable};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{Connection, ffi};

use super::{Backend, ChunkRecord};
use crate::types::SolaceError;
use async_trait::async_trait;

/// Row representation of a chunk in the sqlite store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkDocument {
    pub id: String,
    pub source: String,
    pub chunk_index: usize,
    pub start_offset: usize,
    pub content: String,
    pub metadata: serde_json::Value,
}

impl SqliteVectorStoreTable for ChunkDocument {
    fn name() -> &'static str {
        "chunks"
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", "TEXT PRIMARY KEY"),
            Column::new("source", "TEXT").indexed(),
            Column::new("chunk_index", "TEXT"),
            Column::new("start_offset", "TEXT"),
            Column::new("metadata", "TEXT"),
            Column::new("content", "TEXT"),
        ]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn column_values(&self) -> Vec<(&'static str, Box<dyn ColumnValue>)> {
        vec![
            ("id", Box::new(self.id.clone())),
            ("source", Box::new(self.source.clone())),
            ("chunk_index", Box::new(self.chunk_index.to_string())),
            ("start_offset", Box::new(self.start_offset.to_string())),
            ("metadata", Box::new(self.metadata.to_string())),
            ("content", Box::new(self.content.clone())),
        ]
    }
}

impl From<ChunkRecord> for ChunkDocument {
    fn from(record: ChunkRecord) -> Self {
        ChunkDocument {
            id: record.id,
            source: record.source,
            chunk_index: record.chunk_index,
            start_offset: record.start_offset,
            content: record.content,
            metadata: record.metadata,
        }
    }
}

impl From<ChunkDocument> for ChunkRecord {
    fn from(doc: ChunkDocument) -> Self {
        ChunkRecord {
            id: doc.id,
            source: doc.source,
            chunk_index: doc.chunk_index,
            start_offset: doc.start_offset,
            content: doc.content,
            metadata: doc.metadata,
            embedding: None,
        }
    }
}

/// Chunk store over sqlite + sqlite-vec.
#[derive(Clone)]
pub struct SqliteChunkStore<E>
where
    E: EmbeddingModel + 'static,
{
    inner: SqliteVectorStore<E, ChunkDocument>,
    /// Separate handle for direct SQL not covered by rig-sqlite.
    conn: Connection,
}

impl<E> std::fmt::Debug for SqliteChunkStore<E>
where
    E: EmbeddingModel + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteChunkStore").finish_non_exhaustive()
    }
}

impl<E> SqliteChunkStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Opens (creating if needed) the store at `path`.
    ///
    /// Used by the indexing phase; parent directories are created.
    pub async fn create(path: impl AsRef<Path>, model: &E) -> Result<Self, SolaceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Self::open(path, model).await
    }

    /// Loads an existing index for serving.
    ///
    /// # Errors
    ///
    /// [`SolaceError::IndexNotFound`] when `path` does not exist or the
    /// store holds zero entries; the server must fail fast on this.
    pub async fn open_existing(path: impl AsRef<Path>, model: &E) -> Result<Self, SolaceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SolaceError::IndexNotFound {
                path: path.to_path_buf(),
            });
        }
        let store = Self::open(path, model).await?;
        if store.count().await? == 0 {
            return Err(SolaceError::IndexNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(store)
    }

    async fn open(path: &Path, model: &E) -> Result<Self, SolaceError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| SolaceError::Storage(err.to_string()))?;
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await
        .map_err(|err| SolaceError::Storage(err.to_string()))?;
        // Clone the handle for direct SQL before moving it into the store.
        let conn_for_queries = conn.clone();
        let store = SqliteVectorStore::new(conn, model)
            .await
            .map_err(|err| SolaceError::Storage(err.to_string()))?;
        Ok(Self {
            inner: store,
            conn: conn_for_queries,
        })
    }

    /// Persists documents paired with their embeddings.
    pub async fn add_chunks(
        &self,
        documents: Vec<(ChunkDocument, Vec<f32>)>,
    ) -> Result<(), SolaceError> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(documents.len());
        for (doc, embedding) in documents {
            let converted: Vec<f64> = embedding.into_iter().map(f64::from).collect();
            let embed = Embedding {
                document: doc.content.clone(),
                vec: converted,
            };
            rows.push((doc, rig::OneOrMany::one(embed)));
        }
        self.inner
            .add_rows(rows)
            .await
            .map_err(|err| SolaceError::Storage(err.to_string()))?;
        Ok(())
    }

    fn register_sqlite_vec() -> Result<(), SolaceError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(SolaceError::Storage)
    }

    /// Direct connection for SQL outside the [`Backend`] surface.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl<E> Backend for SqliteChunkStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), SolaceError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let documents: Vec<(ChunkDocument, Vec<f32>)> = chunks
            .into_iter()
            .filter_map(|record| {
                let embedding = record.embedding.clone()?;
                Some((ChunkDocument::from(record), embedding))
            })
            .collect();

        self.add_chunks(documents).await
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, SolaceError> {
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| SolaceError::Storage(err.to_string()))?;
        let conn = self.connection();

        conn.call(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT c.id, c.source, c.chunk_index, c.start_offset, c.content, c.metadata, \
                     vec_distance_cosine(e.embedding, vec_f32(?)) as distance \
                     FROM chunks c \
                     JOIN chunks_embeddings e ON c.id = e.id \
                     ORDER BY distance ASC \
                     LIMIT {}",
                    top_k
                ))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let rows = stmt
                .query_map([&embedding_json], |row| {
                    let doc = ChunkDocument {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        chunk_index: row.get::<_, String>(2)?.parse().unwrap_or(0),
                        start_offset: row.get::<_, String>(3)?.parse().unwrap_or(0),
                        content: row.get(4)?,
                        metadata: row
                            .get::<_, String>(5)
                            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                            .unwrap_or_default(),
                    };
                    let distance: f32 = row.get(6)?;
                    // Cosine distance to similarity.
                    Ok((ChunkRecord::from(doc), 1.0 - distance))
                })
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
            }
            Ok(results)
        })
        .await
        .map_err(|err| SolaceError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, SolaceError> {
        let conn = self.connection();

        conn.call(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(count as usize)
        })
        .await
        .map_err(|err| SolaceError::Storage(err.to_string()))
    }

    async fn clear(&self) -> Result<(), SolaceError> {
        let conn = self.connection();

        conn.call(|conn| {
            conn.execute("DELETE FROM chunks", [])
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute("DELETE FROM chunks_embeddings", [])
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| SolaceError::Storage(err.to_string()))
    }
}
