//! Post types.

use chrono::{DateTime, Utc};

use super::{FlockId, PostId};

/// Post record, materialized by an accepted CREATE_POST action.
#[derive(Clone, Debug)]
pub struct Post {
    pub id: PostId,
    pub public_id: String,
    pub flock_id: FlockId,
    pub description: Option<String>,
    pub pictures: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a post.
#[derive(Clone, Debug)]
pub struct CreatePostParams {
    pub flock_id: FlockId,
    pub public_id: String,
    pub description: Option<String>,
    pub pictures: Vec<String>,
}
