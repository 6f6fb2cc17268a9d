//! Who is using the application right now.
//!
//! One `Session` lives in the daemon's `AppState` and is handed to the
//! handlers that need it; there is no process-global.

use crate::auth::UserRecord;

/// Two states: unauthenticated and authenticated. `init` moves forward,
/// `clear` moves back; there is no authenticated-to-authenticated edge.
#[derive(Debug, Default)]
pub struct Session {
    active: Option<UserRecord>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// First login wins: while an identity is active, further `init` calls
    /// are ignored until an explicit `clear`.
    pub fn init(&mut self, user: UserRecord) {
        if let Some(active) = &self.active {
            log::warn!(
                "login for user {} ignored; user {} already holds the session",
                user.id,
                active.id
            );
            return;
        }
        self.active = Some(user);
    }

    pub fn current(&self) -> Option<&UserRecord> {
        self.active.as_ref()
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}
