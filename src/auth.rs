//! Credential store: user records, password hashing and verification.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rusqlite::{Connection, OptionalExtension};

use crate::validate::{
    validate_email, validate_mobile, validate_name, validate_password, FieldError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

/// A persisted identity. `id` 0 means not yet stored.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
    pub role: Role,
    pub grade: Option<String>,
    pub class_name: Option<String>,
}

// Identity equality lives in the identifier alone, and an unsaved record
// (id 0) equals nothing, itself included. Irreflexive at 0, so no Eq.
impl PartialEq for UserRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id != 0 && self.id == other.id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("an account with that email already exists")]
    DuplicateEmail,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("no user with that id")]
    NotFound,
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl From<FieldError> for AuthError {
    fn from(e: FieldError) -> Self {
        AuthError::Validation {
            field: e.field,
            message: e.message,
        }
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AuthError::Hash(e)
    }
}

/// Signup input. The plaintext password lives only long enough to be hashed.
#[derive(Debug)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub role: Role,
    pub grade: Option<String>,
    pub class_name: Option<String>,
}

/// Fresh salt per call, so hashing the same plaintext twice yields two
/// distinct stored strings that both verify.
fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default().hash_password(plaintext.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Comparison is delegated to the primitive's verifier; stored hashes are
/// never compared with string equality.
fn verify_password(plaintext: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

fn validate_profile(
    first_name: &str,
    last_name: &str,
    email: &str,
    mobile: &str,
) -> Result<(), AuthError> {
    validate_name("firstName", first_name)?;
    validate_name("lastName", last_name)?;
    validate_email(email)?;
    validate_mobile(mobile)?;
    Ok(())
}

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserRecord> {
    let role_str: String = row.get(6)?;
    Ok(UserRecord {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        mobile: row.get(4)?,
        password_hash: row.get(5)?,
        // Roles are written by this store; an unknown value means the row
        // was edited out-of-band. Treat it as a student, the weaker role.
        role: Role::parse(&role_str).unwrap_or(Role::Student),
        grade: row.get(7)?,
        class_name: row.get(8)?,
    })
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, mobile, password_hash, role, grade, class_name";

pub fn register(conn: &Connection, new: &NewUser) -> Result<UserRecord, AuthError> {
    validate_profile(&new.first_name, &new.last_name, &new.email, &new.mobile)?;
    validate_password(&new.password)?;

    let password_hash = hash_password(&new.password)?;

    // The NOCASE unique index on email is the duplicate check; a
    // check-then-insert here would race under concurrent registration.
    let inserted = conn.execute(
        "INSERT INTO users(first_name, last_name, email, mobile, password_hash, role, grade, class_name)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            new.first_name.trim(),
            new.last_name.trim(),
            &new.email,
            &new.mobile,
            &password_hash,
            new.role.as_str(),
            &new.grade,
            &new.class_name,
        ),
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AuthError::DuplicateEmail);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(UserRecord {
        id: conn.last_insert_rowid(),
        first_name: new.first_name.trim().to_string(),
        last_name: new.last_name.trim().to_string(),
        email: new.email.clone(),
        mobile: new.mobile.clone(),
        password_hash,
        role: new.role,
        grade: new.grade.clone(),
        class_name: new.class_name.clone(),
    })
}

/// Unknown email and wrong password collapse into the same error on
/// purpose; callers must not learn which one happened.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> Result<UserRecord, AuthError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
            [email],
            user_from_row,
        )
        .optional()?;

    let Some(user) = user else {
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user)
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<UserRecord>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
        [id],
        user_from_row,
    )
    .optional()
}

pub fn list(conn: &Connection) -> Result<Vec<UserRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY last_name, first_name"
    ))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect()
}

/// Overwrites every mutable field of the row located by `record.id`.
pub fn update(conn: &Connection, record: &UserRecord) -> Result<(), AuthError> {
    validate_profile(
        &record.first_name,
        &record.last_name,
        &record.email,
        &record.mobile,
    )?;
    if record.password_hash.is_empty() {
        return Err(AuthError::Validation {
            field: "password",
            message: "stored hash must not be empty".to_string(),
        });
    }

    let changed = conn.execute(
        "UPDATE users
         SET first_name = ?, last_name = ?, email = ?, mobile = ?,
             password_hash = ?, role = ?, grade = ?, class_name = ?
         WHERE id = ?",
        (
            record.first_name.trim(),
            record.last_name.trim(),
            &record.email,
            &record.mobile,
            &record.password_hash,
            record.role.as_str(),
            &record.grade,
            &record.class_name,
            record.id,
        ),
    );
    match changed {
        Ok(0) => Err(AuthError::NotFound),
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(AuthError::DuplicateEmail)
        }
        Err(e) => Err(e.into()),
    }
}

/// Deleting an id that does not exist is a no-op, not an error.
/// Dependent rows go first, in dependency order (no ON DELETE CASCADE).
pub fn delete(conn: &Connection, id: i64) -> Result<(), AuthError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM attendance WHERE student_id = ?", [id])?;
    tx.execute("DELETE FROM assessments WHERE student_id = ?", [id])?;
    tx.execute("DELETE FROM users WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(())
}

/// Re-hash for a password change; goes through the same policy check as
/// signup.
pub fn rehash_password(plaintext: &str) -> Result<String, AuthError> {
    validate_password(plaintext)?;
    hash_password(plaintext)
}
