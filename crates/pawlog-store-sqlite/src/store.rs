//! [`SqliteStore`] — the SQLite implementation of [`EntityStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use serde_json::{Map, Value};

use pawlog_core::store::{DocRef, Document, EntityStore};

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Insert or replace a document, rewriting its reference index.
  pub async fn put_document(&self, doc: &Document) -> Result<()> {
    let collection = doc.reference.collection.clone();
    let doc_id     = doc.reference.id.clone();
    let body       = serde_json::to_string(&doc.fields)?;
    let refs       = collect_refs(&doc.fields);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM document_refs WHERE collection = ?1 AND doc_id = ?2",
          rusqlite::params![collection, doc_id],
        )?;
        tx.execute(
          "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)
           ON CONFLICT (collection, doc_id) DO UPDATE SET body = excluded.body",
          rusqlite::params![collection, doc_id, body],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO document_refs (collection, doc_id, field, target)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (field, target) in &refs {
            stmt.execute(rusqlite::params![collection, doc_id, field, target])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Store `fields` as a new document in `collection` under a fresh id.
  pub async fn insert(
    &self,
    collection: &str,
    fields: Map<String, Value>,
  ) -> Result<Document> {
    let id  = uuid::Uuid::new_v4().simple().to_string();
    let doc = Document::new(DocRef::new(collection, id), fields);
    self.put_document(&doc).await?;
    Ok(doc)
  }

  /// Import newline-delimited JSON, one serialised [`Document`] per line.
  /// Blank lines are skipped. Returns the number of documents written.
  pub async fn import_jsonl(&self, jsonl: &str) -> Result<usize> {
    let mut count = 0;
    for (index, line) in jsonl.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let doc: Document = serde_json::from_str(line)
        .map_err(|source| Error::Import { line: index + 1, source })?;
      self.put_document(&doc).await?;
      count += 1;
    }
    tracing::info!(count, "imported documents");
    Ok(count)
  }

  /// Import a JSONL file from disk; see [`SqliteStore::import_jsonl`].
  pub async fn import_jsonl_file(&self, path: impl AsRef<Path>) -> Result<usize> {
    let raw = tokio::fs::read_to_string(path).await?;
    self.import_jsonl(&raw).await
  }
}

/// Top-level fields holding a reference, or an array of references.
fn collect_refs(fields: &Map<String, Value>) -> Vec<(String, String)> {
  let mut refs = Vec::new();
  for (field, value) in fields {
    let candidates: Vec<&Value> = match value {
      Value::Array(items) => items.iter().collect(),
      other => vec![other],
    };
    for candidate in candidates {
      if let Ok(target) = DocRef::from_value(candidate) {
        refs.push((field.clone(), target.path()));
      }
    }
  }
  refs
}

fn decode_body(reference: DocRef, body: &str) -> Result<Document> {
  match serde_json::from_str(body)? {
    Value::Object(fields) => Ok(Document::new(reference, fields)),
    _ => Err(Error::CorruptBody(reference.path())),
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  async fn query_by_reference(
    &self,
    collection: &str,
    field: &str,
    reference: &DocRef,
  ) -> Result<Vec<Document>> {
    let collection_owned = collection.to_owned();
    let field            = field.to_owned();
    let target           = reference.path();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT d.doc_id, d.body
             FROM document_refs r
             JOIN documents d ON d.collection = r.collection AND d.doc_id = r.doc_id
            WHERE r.collection = ?1 AND r.field = ?2 AND r.target = ?3
            ORDER BY d.doc_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![collection_owned, field, target], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, body)| decode_body(DocRef::new(collection, id), &body))
      .collect()
  }

  async fn dereference(&self, reference: &DocRef) -> Result<Option<Document>> {
    let collection = reference.collection.clone();
    let doc_id     = reference.id.clone();

    let body: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2",
              rusqlite::params![collection, doc_id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    body
      .map(|b| decode_body(reference.clone(), &b))
      .transpose()
  }
}
