//! Flock types.

use chrono::{DateTime, Utc};

use super::FlockId;

/// Flock record. Owned collectively by its members; description/picture are
/// mutated only through resolved consensus actions.
#[derive(Clone, Debug)]
pub struct Flock {
    pub id: FlockId,
    pub name: String,
    pub description: String,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a flock.
#[derive(Clone, Debug)]
pub struct CreateFlockParams {
    pub name: String,
    pub description: String,
    /// Seeded from the creator's profile picture, if any.
    pub picture: Option<String>,
}
