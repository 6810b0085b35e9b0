//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use uuid::Uuid;

/// User identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

/// Flock identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlockId(pub Uuid);

/// Action (proposal) identifier. Internal; the wire uses the public id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(pub Uuid);

/// Post identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PostId(pub Uuid);
