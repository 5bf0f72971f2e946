//! SQL schema for the Pawlog SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per document; the body is the JSON field map.
CREATE TABLE IF NOT EXISTS documents (
    collection  TEXT NOT NULL,
    doc_id      TEXT NOT NULL,
    body        TEXT NOT NULL,
    PRIMARY KEY (collection, doc_id)
);

-- Every top-level reference held by a document, so that
-- \"documents in C whose field F equals R\" is an index lookup.
-- Rewritten whenever the owning document is written.
CREATE TABLE IF NOT EXISTS document_refs (
    collection  TEXT NOT NULL,
    doc_id      TEXT NOT NULL,
    field       TEXT NOT NULL,
    target      TEXT NOT NULL,     -- 'collection/id' of the referenced document
    FOREIGN KEY (collection, doc_id)
      REFERENCES documents(collection, doc_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS document_refs_lookup_idx
  ON document_refs(collection, field, target);
CREATE INDEX IF NOT EXISTS document_refs_owner_idx
  ON document_refs(collection, doc_id);

PRAGMA user_version = 1;
";
