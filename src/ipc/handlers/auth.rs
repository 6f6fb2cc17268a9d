use serde_json::json;

use crate::auth::{self, NewUser, Role};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{auth_err, optional_str, required_str, user_json};
use crate::ipc::types::{AppState, Request};

fn parse_new_user(params: &serde_json::Value) -> Result<NewUser, HandlerErr> {
    let role_str = required_str(params, "role")?;
    let Some(role) = Role::parse(&role_str) else {
        return Err(HandlerErr::bad_params("role must be student or teacher"));
    };
    Ok(NewUser {
        first_name: required_str(params, "firstName")?,
        last_name: required_str(params, "lastName")?,
        email: required_str(params, "email")?,
        mobile: required_str(params, "mobile")?,
        password: required_str(params, "password")?,
        role,
        grade: optional_str(params, "grade"),
        class_name: optional_str(params, "className"),
    })
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let new = match parse_new_user(&req.params) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };
    match auth::register(conn, &new) {
        Ok(user) => {
            log::info!("registered user {} ({})", user.id, user.role.as_str());
            ok(&req.id, json!({ "user": user_json(&user) }))
        }
        Err(e) => auth_err(e).response(&req.id),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let email = match required_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let password = match required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let user = match auth::authenticate(conn, &email, &password) {
        Ok(u) => u,
        Err(e) => return auth_err(e).response(&req.id),
    };

    // First login wins: if a session is already active this init is a
    // no-op, and the response reports the identity that actually holds
    // the session.
    state.session.init(user);
    let active = state
        .session
        .current()
        .map(user_json)
        .unwrap_or(serde_json::Value::Null);
    ok(&req.id, json!({ "user": active }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.clear();
    ok(&req.id, json!({ "ok": true }))
}

fn handle_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let active = state
        .session
        .current()
        .map(user_json)
        .unwrap_or(serde_json::Value::Null);
    ok(&req.id, json!({ "user": active }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(handle_register(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.current" => Some(handle_current(state, req)),
        _ => None,
    }
}
