use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{optional_str, required_str};
use crate::ipc::types::{AppState, Request};

fn classes_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    // Students reference their class by name, so the roster count is a
    // correlated subquery rather than a join.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.subject,
           (SELECT COUNT(*) FROM users u
            WHERE u.class_name = c.name AND u.role = 'student') AS student_count
         FROM classes c
         ORDER BY c.name",
    )?;

    let classes = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let subject: Option<String> = row.get(2)?;
            let student_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "subject": subject,
                "studentCount": student_count
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({ "classes": classes }))
}

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let subject = optional_str(params, "subject");

    let class_id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO classes(id, name, subject) VALUES(?, ?, ?)",
        (&class_id, &name, &subject),
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(HandlerErr::new(
                "duplicate_name",
                format!("a class named {:?} already exists", name),
            ));
        }
        Err(e) => {
            return Err(HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "classes" })));
        }
    }

    Ok(json!({ "classId": class_id, "name": name, "subject": subject }))
}

fn classes_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [&class_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(HandlerErr::not_found("class not found"));
    }

    // Students keep their class_name string; the roster simply no longer
    // resolves to a class row.
    conn.execute("DELETE FROM classes WHERE id = ?", [&class_id])?;
    Ok(json!({ "ok": true }))
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
        "classes.list" => Some(with_conn(state, req, |c, _| classes_list(c))),
        "classes.create" => Some(with_conn(state, req, classes_create)),
        "classes.delete" => Some(with_conn(state, req, classes_delete)),
        _ => None,
    }
}
