use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{required_bool, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::status::{AttendanceFlags, Flag};

#[derive(Debug, Clone)]
struct BasicStudent {
    id: i64,
    display_name: String,
}

fn parse_day(raw: &str) -> Result<String, HandlerErr> {
    let day = crate::status::parse_date(raw)
        .map_err(|e| HandlerErr::new("invalid_date", e.to_string()))?;
    Ok(day.format("%Y-%m-%d").to_string())
}

fn student_exists(conn: &Connection, student_id: i64) -> Result<bool, HandlerErr> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn list_students(conn: &Connection) -> Result<Vec<BasicStudent>, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name
         FROM users
         WHERE role = 'student'
         ORDER BY last_name, first_name",
    )?;
    let rows = stmt.query_map([], |r| {
        let last: String = r.get(1)?;
        let first: String = r.get(2)?;
        Ok(BasicStudent {
            id: r.get(0)?,
            display_name: format!("{}, {}", last, first),
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(HandlerErr::db)
}

fn load_record(
    conn: &Connection,
    student_id: i64,
    day: &str,
) -> Result<Option<(AttendanceFlags, Option<String>)>, HandlerErr> {
    conn.query_row(
        "SELECT present, absent, late, excused, notes
         FROM attendance
         WHERE student_id = ? AND day = ?",
        (student_id, day),
        |r| {
            Ok((
                AttendanceFlags {
                    present: r.get::<_, i64>(0)? != 0,
                    absent: r.get::<_, i64>(1)? != 0,
                    late: r.get::<_, i64>(2)? != 0,
                    excused: r.get::<_, i64>(3)? != 0,
                },
                r.get::<_, Option<String>>(4)?,
            ))
        },
    )
    .optional()
    .map_err(HandlerErr::db)
}

fn store_record(
    conn: &Connection,
    student_id: i64,
    day: &str,
    flags: AttendanceFlags,
    notes: &Option<String>,
) -> Result<(), HandlerErr> {
    conn.execute(
        "INSERT INTO attendance(id, student_id, day, present, absent, late, excused, notes)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, day) DO UPDATE SET
           present = excluded.present,
           absent = excluded.absent,
           late = excluded.late,
           excused = excluded.excused,
           notes = excluded.notes",
        (
            Uuid::new_v4().to_string(),
            student_id,
            day,
            flags.present as i64,
            flags.absent as i64,
            flags.late as i64,
            flags.excused as i64,
            notes,
        ),
    )
    .map_err(|e| {
        HandlerErr::new("db_update_failed", e.to_string())
            .with_details(json!({ "table": "attendance" }))
    })?;
    Ok(())
}

fn record_json(
    student_id: i64,
    day: &str,
    flags: AttendanceFlags,
    notes: &Option<String>,
) -> serde_json::Value {
    json!({
        "studentId": student_id,
        "day": day,
        "present": flags.present,
        "absent": flags.absent,
        "late": flags.late,
        "excused": flags.excused,
        "notes": notes
    })
}

fn attendance_day_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let day = parse_day(&required_str(params, "day")?)?;
    let students = list_students(conn)?;

    let students_json: Vec<serde_json::Value> = students
        .iter()
        .map(|s| json!({ "id": s.id, "displayName": s.display_name }))
        .collect();

    let mut rows_json: Vec<serde_json::Value> = Vec::with_capacity(students.len());
    for s in &students {
        let (flags, notes) = load_record(conn, s.id, &day)?.unwrap_or_default();
        rows_json.push(record_json(s.id, &day, flags, &notes));
    }

    Ok(json!({
        "day": day,
        "students": students_json,
        "rows": rows_json
    }))
}

fn attendance_set_flag(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let day = parse_day(&required_str(params, "day")?)?;
    let flag_raw = required_str(params, "flag")?;
    let Some(flag) = Flag::parse(&flag_raw) else {
        return Err(HandlerErr::bad_params(
            "flag must be present, absent, late or excused",
        ));
    };
    let value = required_bool(params, "value")?;

    if !student_exists(conn, student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    let (flags, notes) = load_record(conn, student_id, &day)?.unwrap_or_default();
    let flags = flags.apply(flag, value);
    store_record(conn, student_id, &day, flags, &notes)?;

    Ok(json!({ "record": record_json(student_id, &day, flags, &notes) }))
}

fn attendance_set_note(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let day = parse_day(&required_str(params, "day")?)?;
    let note = params
        .get("note")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    if !student_exists(conn, student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    let (flags, _) = load_record(conn, student_id, &day)?.unwrap_or_default();
    store_record(conn, student_id, &day, flags, &note)?;

    Ok(json!({ "record": record_json(student_id, &day, flags, &note) }))
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
        "attendance.dayOpen" => Some(with_conn(state, req, attendance_day_open)),
        "attendance.setFlag" => Some(with_conn(state, req, attendance_set_flag)),
        "attendance.setNote" => Some(with_conn(state, req, attendance_set_note)),
        _ => None,
    }
}
