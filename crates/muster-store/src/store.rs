//! SQLite store.
//!
//! All SQL lives in small synchronous helpers that take a plain rusqlite
//! connection, wrapped for async callers through `tokio_rusqlite`. Writes
//! that depend on the alternation sequence run inside immediate
//! transactions and re-derive the expected kind before inserting, so a
//! competing writer fails with a conflict instead of corrupting the
//! sequence.

use crate::schema;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use muster_core::alternation;
use muster_core::types::{
    AttendanceEvent, AttendanceKind, Disposition, EventId, EventQuery, NewAttendanceEvent,
    NewAuditEntry, NewPendingEntry, Page, PendingId, PendingReviewEntry, PersonnelId,
    ReviewStatus, Source, StationId, UserId, DEFAULT_PAGE, DEFAULT_PAGE_LIMIT,
};
use muster_core::{
    AuditLog, PersonnelDirectory, RecordStore, WorkflowError, WorkflowResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tokio_rusqlite::Connection;

const EVENT_COLUMNS: &str = "id, personnel_id, kind, disposition, confidence, source, \
     captured_at, created_by, modified_by, modified_at";

const PENDING_COLUMNS: &str =
    "id, personnel_id, confidence, captured_at, review_status, reviewed_by, reviewed_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn open(path: impl AsRef<Path>) -> WorkflowResult<Self> {
        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        let store = Self { conn };
        store
            .with_conn(|c| schema::ensure_schema(c).map_err(db_err))
            .await?;
        tracing::debug!(path = %path.as_ref().display(), "attendance database ready");
        Ok(store)
    }

    pub async fn open_in_memory() -> WorkflowResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        let store = Self { conn };
        store
            .with_conn(|c| schema::ensure_schema(c).map_err(db_err))
            .await?;
        Ok(store)
    }

    /// Register a personnel member. The directory is normally maintained
    /// by the personnel system; this exists for seeding and tests.
    pub async fn insert_personnel(
        &self,
        first_name: &str,
        last_name: &str,
        station_id: StationId,
    ) -> WorkflowResult<PersonnelId> {
        let first = first_name.to_string();
        let last = last_name.to_string();
        self.with_conn(move |c| {
            c.execute(
                "INSERT INTO personnel (first_name, last_name, station_id) VALUES (?1, ?2, ?3)",
                params![first, last, station_id],
            )
            .map_err(db_err)?;
            Ok(c.last_insert_rowid())
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> WorkflowResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> WorkflowResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let result = self
            .conn
            .call(move |conn| Ok(f(conn)))
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        result
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn last_confirmed(
        &self,
        personnel_id: PersonnelId,
    ) -> WorkflowResult<Option<AttendanceEvent>> {
        self.with_conn(move |c| last_confirmed_sync(c, personnel_id))
            .await
    }

    async fn save_confirmed(&self, event: NewAttendanceEvent) -> WorkflowResult<AttendanceEvent> {
        self.with_conn(move |c| insert_confirmed_sync(c, &event))
            .await
    }

    async fn save_pending(&self, entry: NewPendingEntry) -> WorkflowResult<PendingReviewEntry> {
        self.with_conn(move |c| {
            c.execute(
                "INSERT INTO pending_review (personnel_id, confidence, captured_at) \
                 VALUES (?1, ?2, ?3)",
                params![entry.personnel_id, entry.confidence, ts_to_db(entry.captured_at)],
            )
            .map_err(db_err)?;
            let id = c.last_insert_rowid();
            Ok(PendingReviewEntry {
                id,
                personnel_id: entry.personnel_id,
                confidence: entry.confidence,
                captured_at: entry.captured_at,
                review_status: ReviewStatus::Pending,
                reviewed_by: None,
                reviewed_at: None,
            })
        })
        .await
    }

    async fn find_pending(&self, id: PendingId) -> WorkflowResult<Option<PendingReviewEntry>> {
        self.with_conn(move |c| find_pending_sync(c, id)).await
    }

    async fn list_pending(&self) -> WorkflowResult<Vec<PendingReviewEntry>> {
        self.with_conn(|c| {
            let sql = format!(
                "SELECT {PENDING_COLUMNS} FROM pending_review \
                 WHERE review_status = 'pending' \
                 ORDER BY captured_at DESC, id DESC"
            );
            let mut stmt = c.prepare(&sql).map_err(db_err)?;
            let rows = stmt.query_map([], map_pending_row).map_err(db_err)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(db_err)?);
            }
            Ok(out)
        })
        .await
    }

    async fn pending_count(&self) -> WorkflowResult<u64> {
        self.with_conn(|c| {
            c.query_row(
                "SELECT COUNT(*) FROM pending_review WHERE review_status = 'pending'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
            .map_err(db_err)
        })
        .await
    }

    async fn transition_pending(
        &self,
        id: PendingId,
        status: ReviewStatus,
        reviewer: UserId,
        at: DateTime<Utc>,
    ) -> WorkflowResult<PendingReviewEntry> {
        self.with_conn(move |c| transition_pending_sync(c, id, status, reviewer, at))
            .await
    }

    async fn approve_pending(
        &self,
        id: PendingId,
        event: NewAttendanceEvent,
        reviewer: UserId,
        at: DateTime<Utc>,
    ) -> WorkflowResult<(AttendanceEvent, PendingReviewEntry)> {
        self.with_conn(move |c| approve_pending_sync(c, id, &event, reviewer, at))
            .await
    }

    async fn find_event(&self, id: EventId) -> WorkflowResult<Option<AttendanceEvent>> {
        self.with_conn(move |c| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM attendance_event WHERE id = ?1");
            c.query_row(&sql, params![id], map_event_row)
                .optional()
                .map_err(db_err)
        })
        .await
    }

    async fn list_events(&self, query: &EventQuery) -> WorkflowResult<Page<AttendanceEvent>> {
        let query = query.clone();
        self.with_conn(move |c| list_events_sync(c, &query)).await
    }

    async fn update_event(&self, event: &AttendanceEvent) -> WorkflowResult<AttendanceEvent> {
        let event = event.clone();
        self.with_conn(move |c| {
            let changed = c
                .execute(
                    "UPDATE attendance_event \
                     SET personnel_id = ?1, kind = ?2, disposition = ?3, confidence = ?4, \
                         source = ?5, captured_at = ?6, created_by = ?7, \
                         modified_by = ?8, modified_at = ?9 \
                     WHERE id = ?10",
                    params![
                        event.personnel_id,
                        event.kind.as_str(),
                        event.disposition.as_str(),
                        event.confidence,
                        event.source.as_str(),
                        ts_to_db(event.captured_at),
                        event.created_by,
                        event.modified_by,
                        event.modified_at.map(ts_to_db),
                        event.id,
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(WorkflowError::NotFound {
                    entity: "attendance event",
                    id: event.id,
                });
            }
            Ok(event)
        })
        .await
    }

    async fn delete_event(&self, id: EventId) -> WorkflowResult<()> {
        self.with_conn(move |c| {
            let changed = c
                .execute("DELETE FROM attendance_event WHERE id = ?1", params![id])
                .map_err(db_err)?;
            if changed == 0 {
                return Err(WorkflowError::NotFound {
                    entity: "attendance event",
                    id,
                });
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl PersonnelDirectory for SqliteStore {
    async fn station_of(&self, personnel_id: PersonnelId) -> WorkflowResult<Option<StationId>> {
        self.with_conn(move |c| {
            c.query_row(
                "SELECT station_id FROM personnel WHERE id = ?1",
                params![personnel_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
        })
        .await
    }
}

#[async_trait]
impl AuditLog for SqliteStore {
    async fn append(&self, entry: NewAuditEntry) -> WorkflowResult<()> {
        self.with_conn(move |c| {
            c.execute(
                "INSERT INTO activity_log (actor_id, action, detail, at) VALUES (?1, ?2, ?3, ?4)",
                params![entry.actor_id, entry.action, entry.detail, ts_to_db(entry.at)],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }
}

fn db_err(err: rusqlite::Error) -> WorkflowError {
    WorkflowError::Storage(err.to_string())
}

/// Stored with fixed microsecond precision so lexicographic TEXT ordering
/// matches chronological ordering.
fn ts_to_db(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_db(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn bad_enum(idx: usize, what: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(WorkflowError::Storage(format!("invalid {what}: {raw}"))),
    )
}

fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceEvent> {
    let kind_raw: String = row.get("kind")?;
    let kind = AttendanceKind::parse(&kind_raw).ok_or_else(|| bad_enum(2, "kind", &kind_raw))?;
    let disposition_raw: String = row.get("disposition")?;
    let disposition = Disposition::parse(&disposition_raw)
        .ok_or_else(|| bad_enum(3, "disposition", &disposition_raw))?;
    let source_raw: String = row.get("source")?;
    let source = Source::parse(&source_raw).ok_or_else(|| bad_enum(5, "source", &source_raw))?;
    let captured_raw: String = row.get("captured_at")?;
    let modified_raw: Option<String> = row.get("modified_at")?;
    let modified_at = match modified_raw {
        Some(raw) => Some(ts_from_db(9, &raw)?),
        None => None,
    };

    Ok(AttendanceEvent {
        id: row.get("id")?,
        personnel_id: row.get("personnel_id")?,
        kind,
        disposition,
        confidence: row.get("confidence")?,
        captured_at: ts_from_db(6, &captured_raw)?,
        created_by: row.get("created_by")?,
        modified_by: row.get("modified_by")?,
        modified_at,
        source,
    })
}

fn map_pending_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingReviewEntry> {
    let status_raw: String = row.get("review_status")?;
    let review_status =
        ReviewStatus::parse(&status_raw).ok_or_else(|| bad_enum(4, "review status", &status_raw))?;
    let captured_raw: String = row.get("captured_at")?;
    let reviewed_raw: Option<String> = row.get("reviewed_at")?;
    let reviewed_at = match reviewed_raw {
        Some(raw) => Some(ts_from_db(6, &raw)?),
        None => None,
    };

    Ok(PendingReviewEntry {
        id: row.get("id")?,
        personnel_id: row.get("personnel_id")?,
        confidence: row.get("confidence")?,
        captured_at: ts_from_db(3, &captured_raw)?,
        review_status,
        reviewed_by: row.get("reviewed_by")?,
        reviewed_at,
    })
}

fn last_confirmed_sync(
    conn: &rusqlite::Connection,
    personnel_id: PersonnelId,
) -> WorkflowResult<Option<AttendanceEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM attendance_event \
         WHERE personnel_id = ?1 AND disposition = 'confirmed' \
         ORDER BY captured_at DESC, id DESC LIMIT 1"
    );
    conn.query_row(&sql, params![personnel_id], map_event_row)
        .optional()
        .map_err(db_err)
}

/// Conditional confirmed-event insert. The expected kind is derived again
/// inside the transaction; a mismatch means another writer confirmed for
/// this person since the caller's alternator read.
fn insert_confirmed_sync(
    conn: &mut rusqlite::Connection,
    new: &NewAttendanceEvent,
) -> WorkflowResult<AttendanceEvent> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(db_err)?;

    let last = last_confirmed_sync(&tx, new.personnel_id)?;
    let expected = alternation::next_kind(last.map(|e| e.kind));
    if new.kind != expected {
        return Err(WorkflowError::AlternationConflict {
            personnel_id: new.personnel_id,
        });
    }

    tx.execute(
        "INSERT INTO attendance_event \
         (personnel_id, kind, disposition, confidence, source, captured_at, created_by) \
         VALUES (?1, ?2, 'confirmed', ?3, ?4, ?5, ?6)",
        params![
            new.personnel_id,
            new.kind.as_str(),
            new.confidence,
            new.source.as_str(),
            ts_to_db(new.captured_at),
            new.created_by,
        ],
    )
    .map_err(db_err)?;
    let id = tx.last_insert_rowid();
    tx.commit().map_err(db_err)?;

    Ok(AttendanceEvent {
        id,
        personnel_id: new.personnel_id,
        kind: new.kind,
        disposition: Disposition::Confirmed,
        confidence: new.confidence,
        captured_at: new.captured_at,
        created_by: new.created_by,
        modified_by: None,
        modified_at: None,
        source: new.source,
    })
}

fn find_pending_sync(
    conn: &rusqlite::Connection,
    id: PendingId,
) -> WorkflowResult<Option<PendingReviewEntry>> {
    let sql = format!("SELECT {PENDING_COLUMNS} FROM pending_review WHERE id = ?1");
    conn.query_row(&sql, params![id], map_pending_row)
        .optional()
        .map_err(db_err)
}

/// One-way status transition. The `review_status = 'pending'` guard in
/// the UPDATE is what makes a second review fail rather than overwrite.
fn transition_pending_sync(
    conn: &mut rusqlite::Connection,
    id: PendingId,
    status: ReviewStatus,
    reviewer: UserId,
    at: DateTime<Utc>,
) -> WorkflowResult<PendingReviewEntry> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(db_err)?;

    let changed = tx
        .execute(
            "UPDATE pending_review \
             SET review_status = ?1, reviewed_by = ?2, reviewed_at = ?3 \
             WHERE id = ?4 AND review_status = 'pending'",
            params![status.as_str(), reviewer, ts_to_db(at), id],
        )
        .map_err(db_err)?;

    if changed == 0 {
        return match find_pending_sync(&tx, id)? {
            None => Err(WorkflowError::NotFound {
                entity: "pending entry",
                id,
            }),
            Some(entry) => Err(WorkflowError::AlreadyReviewed {
                id,
                status: entry.review_status,
            }),
        };
    }

    let entry = find_pending_sync(&tx, id)?.ok_or_else(|| {
        WorkflowError::Storage("pending entry vanished mid-transaction".into())
    })?;
    tx.commit().map_err(db_err)?;
    Ok(entry)
}

/// Approval is one transaction: confirmed-event insert (with the same
/// conditional alternation check as a direct confirmation) plus the
/// guarded status transition. Either both commit or neither does.
fn approve_pending_sync(
    conn: &mut rusqlite::Connection,
    id: PendingId,
    new: &NewAttendanceEvent,
    reviewer: UserId,
    at: DateTime<Utc>,
) -> WorkflowResult<(AttendanceEvent, PendingReviewEntry)> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(db_err)?;

    let entry = find_pending_sync(&tx, id)?.ok_or(WorkflowError::NotFound {
        entity: "pending entry",
        id,
    })?;
    if entry.review_status.is_terminal() {
        return Err(WorkflowError::AlreadyReviewed {
            id,
            status: entry.review_status,
        });
    }

    let last = last_confirmed_sync(&tx, new.personnel_id)?;
    let expected = alternation::next_kind(last.map(|e| e.kind));
    if new.kind != expected {
        return Err(WorkflowError::AlternationConflict {
            personnel_id: new.personnel_id,
        });
    }

    tx.execute(
        "INSERT INTO attendance_event \
         (personnel_id, kind, disposition, confidence, source, captured_at, created_by) \
         VALUES (?1, ?2, 'confirmed', ?3, ?4, ?5, ?6)",
        params![
            new.personnel_id,
            new.kind.as_str(),
            new.confidence,
            new.source.as_str(),
            ts_to_db(new.captured_at),
            new.created_by,
        ],
    )
    .map_err(db_err)?;
    let event_id = tx.last_insert_rowid();

    tx.execute(
        "UPDATE pending_review \
         SET review_status = 'approved', reviewed_by = ?1, reviewed_at = ?2 \
         WHERE id = ?3 AND review_status = 'pending'",
        params![reviewer, ts_to_db(at), id],
    )
    .map_err(db_err)?;

    let entry = find_pending_sync(&tx, id)?.ok_or_else(|| {
        WorkflowError::Storage("pending entry vanished mid-transaction".into())
    })?;
    tx.commit().map_err(db_err)?;

    let event = AttendanceEvent {
        id: event_id,
        personnel_id: new.personnel_id,
        kind: new.kind,
        disposition: Disposition::Confirmed,
        confidence: new.confidence,
        captured_at: new.captured_at,
        created_by: new.created_by,
        modified_by: None,
        modified_at: None,
        source: new.source,
    };
    Ok((event, entry))
}

fn list_events_sync(
    conn: &rusqlite::Connection,
    query: &EventQuery,
) -> WorkflowResult<Page<AttendanceEvent>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(personnel_id) = query.personnel_id {
        clauses.push("ae.personnel_id = ?");
        values.push(Value::Integer(personnel_id));
    }
    if let Some(station_id) = query.station_id {
        clauses.push("p.station_id = ?");
        values.push(Value::Integer(station_id));
    }
    if let Some(kind) = query.kind {
        clauses.push("ae.kind = ?");
        values.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(from) = query.from {
        clauses.push("ae.captured_at >= ?");
        values.push(Value::Text(ts_to_db(from)));
    }
    if let Some(to) = query.to {
        clauses.push("ae.captured_at <= ?");
        values.push(Value::Text(ts_to_db(to)));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM attendance_event ae \
         JOIN personnel p ON p.id = ae.personnel_id{where_sql}"
    );
    let total: i64 = conn
        .query_row(&count_sql, params_from_iter(values.iter()), |row| row.get(0))
        .map_err(db_err)?;

    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
    let offset = (page - 1) * limit;

    let select_cols = "ae.id, ae.personnel_id, ae.kind, ae.disposition, ae.confidence, \
         ae.source, ae.captured_at, ae.created_by, ae.modified_by, ae.modified_at";
    let page_sql = format!(
        "SELECT {select_cols} FROM attendance_event ae \
         JOIN personnel p ON p.id = ae.personnel_id{where_sql} \
         ORDER BY ae.captured_at DESC, ae.id DESC LIMIT ? OFFSET ?"
    );
    let mut page_values = values;
    page_values.push(Value::Integer(limit as i64));
    page_values.push(Value::Integer(offset as i64));

    let mut stmt = conn.prepare(&page_sql).map_err(db_err)?;
    let rows = stmt
        .query_map(params_from_iter(page_values.iter()), map_event_row)
        .map_err(db_err)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row.map_err(db_err)?);
    }

    Ok(Page {
        items,
        total: total as u64,
        page,
        limit,
    })
}
