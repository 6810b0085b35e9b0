//! User types.

use chrono::{DateTime, Utc};

use super::UserId;

/// User record.
#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Ed25519 verifying key for request authentication.
    pub public_key: Vec<u8>,
    pub picture: Option<String>,
    pub bio: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Parameters for creating a user.
#[derive(Clone, Debug)]
pub struct CreateUserParams {
    pub username: String,
    pub email: String,
    pub public_key: Vec<u8>,
    pub picture: Option<String>,
}

/// Parameters for a profile update. `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct UpdateProfileParams {
    pub username: Option<String>,
    pub bio: Option<String>,
}
