//! Record store backends.
//!
//! The renderer only reads: [`RecordStore`] looks a registration up by id,
//! with or without its photo references.  [`SqliteRecordStore`] is the
//! persistent backend; [`MemoryRecordStore`] serves tests and demos.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ReportError, Result};
use crate::model::{PhotoRef, Record};

/// Read access to registrations.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short tag used in log lines.
    fn store_tag(&self) -> &'static str;

    /// Loads the registration without its photo references.
    async fn find_by_id(&self, id: i64) -> Result<Option<Record>>;

    /// Loads the registration together with its photo references, in stored order.
    async fn find_by_id_with_photos(&self, id: i64) -> Result<Option<Record>>;
}

/// Records kept in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: tokio::sync::Mutex<HashMap<i64, Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let records = records.into_iter().map(|r| (r.id(), r)).collect();
        Self {
            records: tokio::sync::Mutex::new(records),
        }
    }

    /// Adds or replaces a record.
    pub async fn put(&self, record: Record) {
        self.records.lock().await.insert(record.id(), record);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn store_tag(&self) -> &'static str {
        "memory"
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Record>> {
        Ok(self
            .records
            .lock()
            .await
            .get(&id)
            .map(Record::without_photos))
    }

    async fn find_by_id_with_photos(&self, id: i64) -> Result<Option<Record>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }
}

const SCHEMA_STATEMENTS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS registrations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        carrier TEXT,
        plate TEXT,
        destination TEXT,
        registered_on TEXT
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS photos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        registration_id INTEGER NOT NULL REFERENCES registrations(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        url TEXT NOT NULL,
        name TEXT
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_photos_registration ON photos(registration_id, position)",
];

fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    Ok(())
}

/// SQLite-backed registrations.
///
/// The connection sits behind a mutex; queries run on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Opens or creates the database at `path` and initialises the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    ReportError::internal(format!(
                        "failed to create database directory {}: {}",
                        parent.display(),
                        err
                    ))
                })?;
            }
        }

        debug!("opening record store at {}", path.display());
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        initialize_schema(&conn)?;

        info!("record store ready at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an empty in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores a registration and its photos, returning the assigned id.
    ///
    /// A positive record id is kept; otherwise SQLite assigns one.
    pub fn insert(&self, record: &Record) -> Result<i64> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        let explicit_id = (record.id() > 0).then_some(record.id());
        tx.execute(
            r"
            INSERT INTO registrations (id, name, carrier, plate, destination, registered_on)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                explicit_id,
                record.name(),
                record.carrier(),
                record.plate(),
                record.destination(),
                record.registered_on(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        for (position, photo) in record.photos().iter().enumerate() {
            tx.execute(
                "INSERT INTO photos (registration_id, position, url, name) VALUES (?1, ?2, ?3, ?4)",
                params![id, position as i64, photo.url(), photo.name()],
            )?;
        }
        tx.commit()?;

        debug!(
            "inserted registration {} with {} photo(s)",
            id,
            record.photos().len()
        );
        Ok(id)
    }

    async fn query<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await
        .map_err(|err| ReportError::internal(format!("record store worker failed: {}", err)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| ReportError::internal("record store connection lock poisoned"))
}

fn load_registration(conn: &Connection, id: i64) -> Result<Option<Record>> {
    let record = conn
        .query_row(
            r"
            SELECT name, carrier, plate, destination, registered_on
            FROM registrations WHERE id = ?1
            ",
            [id],
            |row| {
                let text = |idx: usize| -> rusqlite::Result<String> {
                    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
                };
                Ok(Record::new(id)
                    .with_name(text(0)?)
                    .with_carrier(text(1)?)
                    .with_plate(text(2)?)
                    .with_destination(text(3)?)
                    .with_registered_on(text(4)?))
            },
        )
        .optional()?;
    Ok(record)
}

fn load_photos(conn: &Connection, id: i64) -> Result<Vec<PhotoRef>> {
    let mut stmt = conn.prepare(
        "SELECT url, name FROM photos WHERE registration_id = ?1 ORDER BY position, id",
    )?;
    let photos = stmt
        .query_map([id], |row| {
            Ok(PhotoRef::new(
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(photos)
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn store_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Record>> {
        self.query(move |conn| load_registration(conn, id)).await
    }

    async fn find_by_id_with_photos(&self, id: i64) -> Result<Option<Record>> {
        self.query(move |conn| {
            let Some(record) = load_registration(conn, id)? else {
                return Ok(None);
            };
            let photos = load_photos(conn, id)?;
            Ok(Some(record.with_photos(photos)))
        })
        .await
    }
}
