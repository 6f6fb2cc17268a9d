use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::status::{self, DateError};

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn parse_kind(raw: &str) -> Result<&'static str, HandlerErr> {
    match raw.to_ascii_lowercase().as_str() {
        "report" => Ok("report"),
        "exam" => Ok("exam"),
        "quiz" => Ok("quiz"),
        _ => Err(HandlerErr::bad_params(
            "kind must be report, exam or quiz",
        )),
    }
}

fn parse_due(raw: &str) -> Result<NaiveDate, HandlerErr> {
    status::parse_date(raw).map_err(|e: DateError| HandlerErr::new("invalid_date", e.to_string()))
}

fn student_exists(conn: &Connection, student_id: i64) -> Result<bool, HandlerErr> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

#[derive(Debug)]
struct AssessmentRow {
    id: String,
    student_id: i64,
    title: String,
    subject: String,
    due_date: String,
    kind: String,
    status: String,
}

impl AssessmentRow {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "studentId": self.student_id,
            "title": self.title,
            "subject": self.subject,
            "dueDate": self.due_date,
            "kind": self.kind,
            "status": self.status
        })
    }
}

fn row_from_db(row: &rusqlite::Row) -> rusqlite::Result<AssessmentRow> {
    Ok(AssessmentRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        title: row.get(2)?,
        subject: row.get(3)?,
        due_date: row.get(4)?,
        kind: row.get(5)?,
        status: row.get(6)?,
    })
}

const ASSESSMENT_COLUMNS: &str = "id, student_id, title, subject, due_date, kind, status";

fn assessments_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let title = required_str(params, "title")?.trim().to_string();
    if title.is_empty() {
        return Err(HandlerErr::bad_params("title must not be empty"));
    }
    let subject = required_str(params, "subject")?.trim().to_string();
    if subject.is_empty() {
        return Err(HandlerErr::bad_params("subject must not be empty"));
    }
    let kind = parse_kind(&required_str(params, "kind")?)?;
    let due_raw = required_str(params, "dueDate")?;
    let due = parse_due(&due_raw)?;

    if !student_exists(conn, student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    // Status is computed from today's date at write time and stored; it is
    // not kept current afterwards (see assessments.refreshStatuses).
    let row = AssessmentRow {
        id: Uuid::new_v4().to_string(),
        student_id,
        title,
        subject,
        due_date: due.format("%Y-%m-%d").to_string(),
        kind: kind.to_string(),
        status: status::classify(due, today()).as_str().to_string(),
    };

    conn.execute(
        "INSERT INTO assessments(id, student_id, title, subject, due_date, kind, status)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &row.id,
            row.student_id,
            &row.title,
            &row.subject,
            &row.due_date,
            &row.kind,
            &row.status,
        ),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string())
            .with_details(json!({ "table": "assessments" }))
    })?;

    Ok(json!({ "assessment": row.to_json() }))
}

fn assessments_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assessment_id = required_str(params, "assessmentId")?;
    let patch = params
        .get("patch")
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;

    let mut row = conn
        .query_row(
            &format!("SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = ?"),
            [&assessment_id],
            row_from_db,
        )
        .optional()?
        .ok_or_else(|| HandlerErr::not_found("assessment not found"))?;

    if let Some(v) = patch.get("title").and_then(|v| v.as_str()) {
        if v.trim().is_empty() {
            return Err(HandlerErr::bad_params("title must not be empty"));
        }
        row.title = v.trim().to_string();
    }
    if let Some(v) = patch.get("subject").and_then(|v| v.as_str()) {
        if v.trim().is_empty() {
            return Err(HandlerErr::bad_params("subject must not be empty"));
        }
        row.subject = v.trim().to_string();
    }
    if let Some(v) = patch.get("kind").and_then(|v| v.as_str()) {
        row.kind = parse_kind(v)?.to_string();
    }
    if let Some(v) = patch.get("dueDate").and_then(|v| v.as_str()) {
        row.due_date = parse_due(v)?.format("%Y-%m-%d").to_string();
    }

    // Every write recomputes status from the (possibly new) due date.
    let due = parse_due(&row.due_date)?;
    row.status = status::classify(due, today()).as_str().to_string();

    conn.execute(
        "UPDATE assessments
         SET title = ?, subject = ?, due_date = ?, kind = ?, status = ?
         WHERE id = ?",
        (
            &row.title,
            &row.subject,
            &row.due_date,
            &row.kind,
            &row.status,
            &row.id,
        ),
    )
    .map_err(|e| {
        HandlerErr::new("db_update_failed", e.to_string())
            .with_details(json!({ "table": "assessments" }))
    })?;

    Ok(json!({ "assessment": row.to_json() }))
}

/// Returns stored rows as-is; statuses reflect the last write, not the
/// current date.
fn assessments_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let rows = match params.get("studentId").and_then(|v| v.as_i64()) {
        Some(student_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ASSESSMENT_COLUMNS} FROM assessments
                 WHERE student_id = ? ORDER BY due_date, title"
            ))?;
            let rows = stmt.query_map([student_id], row_from_db)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ASSESSMENT_COLUMNS} FROM assessments ORDER BY due_date, title"
            ))?;
            let rows = stmt.query_map([], row_from_db)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    let out: Vec<serde_json::Value> = rows.iter().map(AssessmentRow::to_json).collect();
    Ok(json!({ "assessments": out }))
}

fn assessments_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assessment_id = required_str(params, "assessmentId")?;
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM assessments WHERE id = ?",
            [&assessment_id],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(HandlerErr::not_found("assessment not found"));
    }
    conn.execute("DELETE FROM assessments WHERE id = ?", [&assessment_id])?;
    Ok(json!({ "ok": true }))
}

/// The sanctioned recompute path for callers that need current statuses.
fn assessments_refresh_statuses(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = params.get("studentId").and_then(|v| v.as_i64());

    let rows = match student_id {
        Some(sid) => {
            let mut stmt = conn.prepare(
                "SELECT id, due_date, status FROM assessments WHERE student_id = ?",
            )?;
            let rows = stmt.query_map([sid], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare("SELECT id, due_date, status FROM assessments")?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    let now = today();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let mut updated = 0usize;
    for (id, due_raw, stored) in rows {
        // Due dates are validated at write time; a bad one here means the
        // row was edited out-of-band.
        let Ok(due) = status::parse_date(&due_raw) else {
            log::warn!("assessment {} has unparsable due date {:?}; skipped", id, due_raw);
            continue;
        };
        let fresh = status::classify(due, now).as_str();
        if fresh != stored {
            tx.execute(
                "UPDATE assessments SET status = ? WHERE id = ?",
                (fresh, &id),
            )
            .map_err(|e| {
                HandlerErr::new("db_update_failed", e.to_string())
                    .with_details(json!({ "table": "assessments" }))
            })?;
            updated += 1;
        }
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "updated": updated }))
}

fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.create" => Some(with_conn(state, req, assessments_create)),
        "assessments.update" => Some(with_conn(state, req, assessments_update)),
        "assessments.list" => Some(with_conn(state, req, assessments_list)),
        "assessments.delete" => Some(with_conn(state, req, assessments_delete)),
        "assessments.refreshStatuses" => Some(with_conn(state, req, assessments_refresh_statuses)),
        _ => None,
    }
}
