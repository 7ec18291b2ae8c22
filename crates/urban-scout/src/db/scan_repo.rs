//! Scan repository: CRUD operations for the `scans` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{Detection, NewScan, Report, Scan};

use super::{Database, DatabaseError};

/// The datastore seam used by the persistence adapter.
pub trait ScanStore: Send + Sync {
    fn insert(&self, scan: &NewScan) -> Result<Scan, DatabaseError>;

    /// All scans, newest first.
    fn list(&self) -> Result<Vec<Scan>, DatabaseError>;

    fn find_by_id(&self, id: i64) -> Result<Option<Scan>, DatabaseError>;

    /// Replaces the stored report. Returns `false` when no row has `id`.
    fn update_report(&self, id: i64, report: &Report) -> Result<bool, DatabaseError>;

    /// Returns `false` when no row has `id`.
    fn delete(&self, id: i64) -> Result<bool, DatabaseError>;
}

/// A raw scan row; JSON columns are still text.
#[derive(Debug, Clone)]
pub struct ScanRow {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub annotated_image_url: Option<String>,
    pub detection_results: String,
    pub llm_report: String,
    pub llm_report_structured: String,
    pub created_at: String,
}

impl ScanRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            image_url: row.get("image_url")?,
            annotated_image_url: row.get("annotated_image_url")?,
            detection_results: row.get("detection_results")?,
            llm_report: row.get("llm_report")?,
            llm_report_structured: row.get("llm_report_structured")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn into_scan(self) -> Result<Scan, DatabaseError> {
        let id = self.id;
        let corrupt = |reason: String| DatabaseError::CorruptRow { id, reason };
        let detection_results: Vec<Detection> = serde_json::from_str(&self.detection_results)
            .map_err(|e| corrupt(format!("detection_results: {}", e)))?;
        let llm_report_structured: Report = serde_json::from_str(&self.llm_report_structured)
            .map_err(|e| corrupt(format!("llm_report_structured: {}", e)))?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| corrupt(format!("created_at: '{}'", self.created_at)))?;

        Ok(Scan {
            id: self.id,
            latitude: self.latitude,
            longitude: self.longitude,
            image_url: self.image_url,
            annotated_image_url: self.annotated_image_url,
            detection_results,
            llm_report: self.llm_report,
            llm_report_structured,
            created_at,
        })
    }
}

/// Accepts RFC 3339 as well as SQLite's `YYYY-MM-DD HH:MM:SS` form.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn select_by_id(conn: &Connection, id: i64) -> Result<Option<ScanRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM scans WHERE id = ?1",
            params![id],
            ScanRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Inserts a scan and returns the stored row with its assigned id and timestamp.
pub fn insert(db: &Database, scan: &NewScan) -> Result<Scan, DatabaseError> {
    let detections =
        serde_json::to_string(&scan.detection_results).map_err(|e| DatabaseError::Encode {
            column: "detection_results",
            source: e,
        })?;
    let structured =
        serde_json::to_string(&scan.llm_report_structured).map_err(|e| DatabaseError::Encode {
            column: "llm_report_structured",
            source: e,
        })?;

    let row = db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO scans (latitude, longitude, image_url, annotated_image_url,
             detection_results, llm_report, llm_report_structured)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                scan.latitude,
                scan.longitude,
                scan.image_url,
                scan.annotated_image_url,
                detections,
                scan.llm_report,
                structured,
            ],
        )?;
        let id = conn.last_insert_rowid();
        select_by_id(conn, id)?.ok_or(DatabaseError::CorruptRow {
            id,
            reason: "row missing after insert".to_string(),
        })
    })?;

    log::debug!("Inserted scan {}", row.id);
    row.into_scan()
}

/// Lists scans, newest first. Rows inserted in the same millisecond are
/// ordered by id. A row that cannot be decoded is logged and skipped so one
/// bad record does not hide the rest.
pub fn list(db: &Database) -> Result<Vec<Scan>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM scans ORDER BY created_at DESC, id DESC")?;
        let rows: Vec<Result<ScanRow, rusqlite::Error>> =
            stmt.query_map([], ScanRow::from_row)?.collect();
        Ok(rows)
    })?;

    let mut scans = Vec::with_capacity(rows.len());
    for row in rows {
        match row.map_err(DatabaseError::from).and_then(ScanRow::into_scan) {
            Ok(scan) => scans.push(scan),
            Err(e) => log::warn!("Skipping unreadable scan row: {}", e),
        }
    }
    Ok(scans)
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<Scan>, DatabaseError> {
    db.with_conn(|conn| select_by_id(conn, id))?
        .map(ScanRow::into_scan)
        .transpose()
}

pub fn update_report(db: &Database, id: i64, report: &Report) -> Result<bool, DatabaseError> {
    let structured = serde_json::to_string(report).map_err(|e| DatabaseError::Encode {
        column: "llm_report_structured",
        source: e,
    })?;
    let changed = db.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE scans SET llm_report = ?2, llm_report_structured = ?3 WHERE id = ?1",
            params![id, report.to_json(), structured],
        )?)
    })?;
    Ok(changed > 0)
}

pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    let changed =
        db.with_conn(|conn| Ok(conn.execute("DELETE FROM scans WHERE id = ?1", params![id])?))?;
    Ok(changed > 0)
}

impl ScanStore for Database {
    fn insert(&self, scan: &NewScan) -> Result<Scan, DatabaseError> {
        insert(self, scan)
    }

    fn list(&self) -> Result<Vec<Scan>, DatabaseError> {
        list(self)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Scan>, DatabaseError> {
        find_by_id(self, id)
    }

    fn update_report(&self, id: i64, report: &Report) -> Result<bool, DatabaseError> {
        update_report(self, id, report)
    }

    fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        delete(self, id)
    }
}
