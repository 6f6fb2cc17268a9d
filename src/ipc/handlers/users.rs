use rusqlite::Connection;
use serde_json::json;

use crate::auth::{self, Role};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{auth_err, required_i64, user_json};
use crate::ipc::types::{AppState, Request};

fn users_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let users = auth::list(conn)?;
    let rows: Vec<serde_json::Value> = users.iter().map(user_json).collect();
    Ok(json!({ "users": rows }))
}

/// Applies a partial patch to an existing record, then overwrites the row.
/// A `password` entry in the patch re-hashes; the old hash is otherwise
/// kept as-is.
fn users_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = required_i64(params, "userId")?;
    let patch = params
        .get("patch")
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;

    let mut record = auth::find_by_id(conn, user_id)?
        .ok_or_else(|| HandlerErr::not_found("user not found"))?;

    if let Some(v) = patch.get("firstName").and_then(|v| v.as_str()) {
        record.first_name = v.to_string();
    }
    if let Some(v) = patch.get("lastName").and_then(|v| v.as_str()) {
        record.last_name = v.to_string();
    }
    if let Some(v) = patch.get("email").and_then(|v| v.as_str()) {
        record.email = v.to_string();
    }
    if let Some(v) = patch.get("mobile").and_then(|v| v.as_str()) {
        record.mobile = v.to_string();
    }
    if let Some(v) = patch.get("role").and_then(|v| v.as_str()) {
        record.role =
            Role::parse(v).ok_or_else(|| HandlerErr::bad_params("role must be student or teacher"))?;
    }
    if let Some(v) = patch.get("grade") {
        record.grade = v.as_str().map(|s| s.to_string());
    }
    if let Some(v) = patch.get("className") {
        record.class_name = v.as_str().map(|s| s.to_string());
    }
    if let Some(v) = patch.get("password").and_then(|v| v.as_str()) {
        record.password_hash = auth::rehash_password(v).map_err(auth_err)?;
    }

    auth::update(conn, &record).map_err(auth_err)?;
    Ok(json!({ "user": user_json(&record) }))
}

fn users_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = required_i64(params, "userId")?;
    // Deleting an unknown id is deliberately not an error.
    auth::delete(conn, user_id).map_err(auth_err)?;
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
        "users.list" => Some(with_conn(state, req, |c, _| users_list(c))),
        "users.update" => Some(with_conn(state, req, users_update)),
        "users.delete" => Some(with_conn(state, req, users_delete)),
        _ => None,
    }
}
