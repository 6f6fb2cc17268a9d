use serde_json::json;

use crate::auth::{AuthError, UserRecord};
use crate::ipc::error::HandlerErr;

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn required_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Wire shape of a user. The stored hash never crosses the IPC boundary.
pub fn user_json(user: &UserRecord) -> serde_json::Value {
    json!({
        "id": user.id,
        "firstName": user.first_name,
        "lastName": user.last_name,
        "email": user.email,
        "mobile": user.mobile,
        "role": user.role.as_str(),
        "grade": user.grade,
        "className": user.class_name
    })
}

pub fn auth_err(e: AuthError) -> HandlerErr {
    match e {
        AuthError::Validation { field, message } => {
            HandlerErr::new("validation_error", format!("{}: {}", field, message))
                .with_details(json!({ "field": field }))
        }
        AuthError::DuplicateEmail => {
            HandlerErr::new("duplicate_email", "an account with that email already exists")
        }
        AuthError::InvalidCredentials => {
            HandlerErr::new("invalid_credentials", "invalid email or password")
        }
        AuthError::NotFound => HandlerErr::not_found("no user with that id"),
        AuthError::Hash(hash) => HandlerErr::new("hash_failed", hash.to_string()),
        AuthError::Db(db) => HandlerErr::db(db),
    }
}
