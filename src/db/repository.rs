//! Scan result persistence.
//!
//! `ScanStore` is the seam the pipeline hands finished records to. Records
//! are immutable once created: there is create, paginated listing and
//! delete, but no update.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::sqlite::open_database;
use super::DatabaseError;
use crate::models::{ScanPage, ScanRecord, ScanSummary, SensitiveData};

/// Page size used when a caller asks for a zero limit.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Persistence collaborator for completed scans.
pub trait ScanStore {
    fn create(&self, record: &ScanRecord) -> Result<Uuid, DatabaseError>;

    /// Newest first. `page` is 1-based; 0 is treated as 1.
    fn list(&self, page: u32, limit: u32) -> Result<ScanPage, DatabaseError>;

    /// Returns whether a record with that id existed.
    fn delete_by_id(&self, id: &Uuid) -> Result<bool, DatabaseError>;
}

/// Normalize 1-based page/limit and compute the row offset.
fn page_window(page: u32, limit: u32) -> (u32, u32, u64) {
    let page = page.max(1);
    let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };
    let offset = u64::from(page - 1) * u64::from(limit);
    (page, limit, offset)
}

fn total_pages(total: u64, limit: u32) -> u32 {
    total.div_ceil(u64::from(limit)) as u32
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn insert_scan(conn: &Connection, id: &Uuid, record: &ScanRecord) -> Result<(), DatabaseError> {
    let sensitive_data = serde_json::to_string(&record.sensitive_data)?;
    conn.execute(
        "INSERT INTO scan_results (id, file_name, media_type, sensitive_data, encoded_content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            record.file_name,
            record.media_type,
            sensitive_data,
            record.encoded_content,
            format_timestamp(&record.created_at),
        ],
    )?;
    Ok(())
}

pub fn count_scans(conn: &Connection) -> Result<u64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM scan_results", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count.max(0) as u64)
}

struct ScanRow {
    id: String,
    file_name: String,
    media_type: String,
    sensitive_data: String,
    created_at: String,
}

fn summary_from_row(row: ScanRow) -> Result<ScanSummary, DatabaseError> {
    let invalid = |reason: String| DatabaseError::InvalidRecord {
        id: row.id.clone(),
        reason,
    };
    let id = Uuid::parse_str(&row.id).map_err(|e| invalid(e.to_string()))?;
    let sensitive_data: SensitiveData = serde_json::from_str(&row.sensitive_data)?;
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map_err(|e| invalid(e.to_string()))?
        .with_timezone(&Utc);

    Ok(ScanSummary {
        id,
        file_name: row.file_name,
        media_type: row.media_type,
        sensitive_data,
        created_at,
    })
}

/// Page through scan summaries, newest first. Raw content is never read.
pub fn list_scans(conn: &Connection, page: u32, limit: u32) -> Result<ScanPage, DatabaseError> {
    let (page, limit, offset) = page_window(page, limit);
    let total = count_scans(conn)?;

    let mut stmt = conn.prepare(
        "SELECT id, file_name, media_type, sensitive_data, created_at
         FROM scan_results
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?1 OFFSET ?2",
    )?;

    // Offsets past i64::MAX cannot address a row anyway.
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![i64::from(limit), offset], |row| {
        Ok(ScanRow {
            id: row.get(0)?,
            file_name: row.get(1)?,
            media_type: row.get(2)?,
            sensitive_data: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(summary_from_row(row?)?);
    }

    Ok(ScanPage {
        results,
        current_page: page,
        total_pages: total_pages(total, limit),
        total_results: total,
    })
}

pub fn delete_scan(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM scan_results WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(affected > 0)
}

/// SQLite-backed store. The connection is shared behind a mutex so one
/// store can serve concurrent scans.
pub struct SqliteScanStore {
    conn: Mutex<Connection>,
}

impl SqliteScanStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

impl ScanStore for SqliteScanStore {
    fn create(&self, record: &ScanRecord) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| insert_scan(conn, &id, record))?;
        tracing::info!(scan_id = %id, file_name = %record.file_name, "Scan result stored");
        Ok(id)
    }

    fn list(&self, page: u32, limit: u32) -> Result<ScanPage, DatabaseError> {
        self.with_conn(|conn| list_scans(conn, page, limit))
    }

    fn delete_by_id(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let found = self.with_conn(|conn| delete_scan(conn, id))?;
        if found {
            tracing::info!(scan_id = %id, "Scan result deleted");
        }
        Ok(found)
    }
}

/// Process-local store, used by tests and dry runs.
#[derive(Default)]
pub struct InMemoryScanStore {
    records: Mutex<Vec<(Uuid, ScanRecord)>>,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full record including encoded content.
    pub fn get(&self, id: &Uuid) -> Option<ScanRecord> {
        let records = self.records.lock().ok()?;
        records
            .iter()
            .find(|(rid, _)| rid == id)
            .map(|(_, record)| record.clone())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScanStore for InMemoryScanStore {
    fn create(&self, record: &ScanRecord) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let mut records = self.records.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        records.push((id, record.clone()));
        Ok(id)
    }

    fn list(&self, page: u32, limit: u32) -> Result<ScanPage, DatabaseError> {
        let (page, limit, offset) = page_window(page, limit);
        let records = self.records.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let total = records.len() as u64;

        // Insertion order breaks ties between equal timestamps, newest first.
        let mut ordered: Vec<(usize, &(Uuid, ScanRecord))> = records.iter().enumerate().collect();
        ordered.sort_by(|(ia, (_, a)), (ib, (_, b))| {
            b.created_at.cmp(&a.created_at).then(ib.cmp(ia))
        });

        let results = ordered
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .map(|(_, (id, record))| record.summary(*id))
            .collect();

        Ok(ScanPage {
            results,
            current_page: page,
            total_pages: total_pages(total, limit),
            total_results: total,
        })
    }

    fn delete_by_id(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let mut records = self.records.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let before = records.len();
        records.retain(|(rid, _)| rid != id);
        Ok(records.len() < before)
    }
}
