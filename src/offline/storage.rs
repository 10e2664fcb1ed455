//! Partitioned response storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::http::{Request, Response};

/// Size and population of one stored partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStats {
  pub name: String,
  pub entries: usize,
  pub bytes: usize,
}

/// Trait for offline cache storage backends.
///
/// A backend holds named partitions of request -> response pairs. Entries are
/// addressed by the request's method and URL and replaced wholesale on write.
pub trait ResourceStore: Send + Sync + 'static {
  /// Create the partition if it does not exist yet.
  fn open_partition(&self, name: &str) -> Result<()>;

  /// All partition names, oldest first.
  fn partition_names(&self) -> Result<Vec<String>>;

  /// Drop a partition and everything in it. Returns false if it did not exist.
  fn delete_partition(&self, name: &str) -> Result<bool>;

  /// Look up a request in one partition.
  fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>>;

  /// Look up a request across all partitions, oldest partition first.
  fn lookup_any(&self, request: &Request) -> Result<Option<Response>>;

  /// Store a response, creating the partition if needed.
  fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<()>;

  /// Store several responses in one step: either all land or none do.
  fn put_all(&self, partition: &str, entries: &[(Request, Response)]) -> Result<()>;

  /// Remove a single entry. Returns false if there was nothing to remove.
  fn remove(&self, partition: &str, request: &Request) -> Result<bool>;

  /// Per-partition entry counts and body sizes.
  fn stats(&self) -> Result<Vec<PartitionStats>>;
}

/// Storage implementation that doesn't cache anything.
/// Used when offline caching is disabled - all operations are no-ops.
pub struct NoopStore;

impl ResourceStore for NoopStore {
  fn open_partition(&self, _name: &str) -> Result<()> {
    Ok(())
  }

  fn partition_names(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn delete_partition(&self, _name: &str) -> Result<bool> {
    Ok(false)
  }

  fn lookup(&self, _partition: &str, _request: &Request) -> Result<Option<Response>> {
    Ok(None) // Always miss
  }

  fn lookup_any(&self, _request: &Request) -> Result<Option<Response>> {
    Ok(None) // Always miss
  }

  fn put(&self, _partition: &str, _request: &Request, _response: &Response) -> Result<()> {
    Ok(()) // Discard
  }

  fn put_all(&self, _partition: &str, _entries: &[(Request, Response)]) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove(&self, _partition: &str, _request: &Request) -> Result<bool> {
    Ok(false)
  }

  fn stats(&self) -> Result<Vec<PartitionStats>> {
    Ok(Vec::new())
  }
}

/// SQLite-based offline cache storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a throwaway store that lives only as long as this value.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per named partition; rowid gives creation order
CREATE TABLE IF NOT EXISTS partitions (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses keyed by request identity
CREATE TABLE IF NOT EXISTS responses (
    partition TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (partition, method, url)
);

CREATE INDEX IF NOT EXISTS idx_responses_request ON responses(method, url);
"#;

const INSERT_PARTITION: &str = "INSERT OR IGNORE INTO partitions (name) VALUES (?)";

const INSERT_RESPONSE: &str =
  "INSERT OR REPLACE INTO responses (partition, method, url, status, headers, body, stored_at)
   VALUES (?, ?, ?, ?, ?, ?, datetime('now'))";

fn row_to_response(status: u16, headers: String, body: Vec<u8>) -> Result<Response> {
  let headers: Vec<(String, String)> = serde_json::from_str(&headers)
    .map_err(|e| eyre!("Failed to deserialize stored headers: {}", e))?;
  Ok(Response {
    status,
    headers,
    body,
  })
}

fn insert_response(
  conn: &Connection,
  partition: &str,
  request: &Request,
  response: &Response,
) -> Result<()> {
  let (method, url) = request.cache_key();
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      INSERT_RESPONSE,
      params![partition, method, url, response.status, headers, response.body],
    )
    .map_err(|e| eyre!("Failed to store response for {} {}: {}", method, url, e))?;

  Ok(())
}

impl ResourceStore for SqliteStore {
  fn open_partition(&self, name: &str) -> Result<()> {
    self
      .lock()?
      .execute(INSERT_PARTITION, params![name])
      .map_err(|e| eyre!("Failed to open partition {}: {}", name, e))?;
    Ok(())
  }

  fn partition_names(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM partitions ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list partitions: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read partition name: {}", e))?;

    Ok(names)
  }

  fn delete_partition(&self, name: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM responses WHERE partition = ?", params![name])
      .map_err(|e| eyre!("Failed to delete responses of {}: {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM partitions WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete partition {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>> {
    let conn = self.lock()?;
    let (method, url) = request.cache_key();

    let row: Option<(u16, String, Vec<u8>)> = conn
      .query_row(
        "SELECT status, headers, body FROM responses
         WHERE partition = ? AND method = ? AND url = ?",
        params![partition, method, url],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} {}: {}", method, url, e))?;

    row
      .map(|(status, headers, body)| row_to_response(status, headers, body))
      .transpose()
  }

  fn lookup_any(&self, request: &Request) -> Result<Option<Response>> {
    let conn = self.lock()?;
    let (method, url) = request.cache_key();

    let row: Option<(u16, String, Vec<u8>)> = conn
      .query_row(
        "SELECT r.status, r.headers, r.body FROM responses r
         INNER JOIN partitions p ON p.name = r.partition
         WHERE r.method = ? AND r.url = ?
         ORDER BY p.rowid
         LIMIT 1",
        params![method, url],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} {}: {}", method, url, e))?;

    row
      .map(|(status, headers, body)| row_to_response(status, headers, body))
      .transpose()
  }

  fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(INSERT_PARTITION, params![partition])
      .map_err(|e| eyre!("Failed to open partition {}: {}", partition, e))?;
    insert_response(&tx, partition, request, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))
  }

  fn put_all(&self, partition: &str, entries: &[(Request, Response)]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(INSERT_PARTITION, params![partition])
      .map_err(|e| eyre!("Failed to open partition {}: {}", partition, e))?;
    for (request, response) in entries {
      insert_response(&tx, partition, request, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))
  }

  fn remove(&self, partition: &str, request: &Request) -> Result<bool> {
    let conn = self.lock()?;
    let (method, url) = request.cache_key();

    let removed = conn
      .execute(
        "DELETE FROM responses WHERE partition = ? AND method = ? AND url = ?",
        params![partition, method, url],
      )
      .map_err(|e| eyre!("Failed to remove {} {}: {}", method, url, e))?;

    Ok(removed > 0)
  }

  fn stats(&self) -> Result<Vec<PartitionStats>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT p.name, COUNT(r.url), COALESCE(SUM(LENGTH(r.body)), 0)
         FROM partitions p
         LEFT JOIN responses r ON r.partition = p.name
         GROUP BY p.name
         ORDER BY p.rowid",
      )
      .map_err(|e| eyre!("Failed to prepare stats query: {}", e))?;

    let stats = stmt
      .query_map([], |row| {
        Ok(PartitionStats {
          name: row.get(0)?,
          entries: row.get::<_, i64>(1)? as usize,
          bytes: row.get::<_, i64>(2)? as usize,
        })
      })
      .map_err(|e| eyre!("Failed to query stats: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read stats row: {}", e))?;

    Ok(stats)
  }
}
