//! Action (proposal) and vote types.

use chrono::{DateTime, Utc};

use super::{ActionId, FlockId, PostId, UserId};

/// Discriminator for the six proposal kinds. Stored as its `as_str` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Invite,
    Kick,
    UpdatePicture,
    UpdateDescription,
    CreatePost,
    DeletePost,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Invite => "INVITE",
            ActionKind::Kick => "KICK",
            ActionKind::UpdatePicture => "UPDATE_PICTURE",
            ActionKind::UpdateDescription => "UPDATE_DESCRIPTION",
            ActionKind::CreatePost => "CREATE_POST",
            ActionKind::DeletePost => "DELETE_POST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INVITE" => Some(ActionKind::Invite),
            "KICK" => Some(ActionKind::Kick),
            "UPDATE_PICTURE" => Some(ActionKind::UpdatePicture),
            "UPDATE_DESCRIPTION" => Some(ActionKind::UpdateDescription),
            "CREATE_POST" => Some(ActionKind::CreatePost),
            "DELETE_POST" => Some(ActionKind::DeletePost),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of an action. Each variant carries only the fields
/// that kind uses.
#[derive(Clone, Debug)]
pub enum ActionDetail {
    Invite {
        target: UserId,
        /// An accepted invite the target has not yet answered.
        outstanding: bool,
    },
    Kick {
        target: UserId,
    },
    UpdatePicture {
        /// Staged candidate URLs, appended as uploads complete.
        pictures: Vec<String>,
    },
    UpdateDescription {
        description: String,
    },
    CreatePost {
        description: Option<String>,
        pictures: Vec<String>,
    },
    DeletePost {
        post: PostId,
    },
}

impl ActionDetail {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionDetail::Invite { .. } => ActionKind::Invite,
            ActionDetail::Kick { .. } => ActionKind::Kick,
            ActionDetail::UpdatePicture { .. } => ActionKind::UpdatePicture,
            ActionDetail::UpdateDescription { .. } => ActionKind::UpdateDescription,
            ActionDetail::CreatePost { .. } => ActionKind::CreatePost,
            ActionDetail::DeletePost { .. } => ActionKind::DeletePost,
        }
    }

    /// Target member for `Invite`/`Kick`, `None` for the content kinds.
    pub fn target(&self) -> Option<&UserId> {
        match self {
            ActionDetail::Invite { target, .. } | ActionDetail::Kick { target } => Some(target),
            _ => None,
        }
    }
}

/// Action record.
#[derive(Clone, Debug)]
pub struct Action {
    pub id: ActionId,
    /// Public-facing identifier used on the wire.
    pub public_id: String,
    pub flock_id: FlockId,
    pub creator: UserId,
    /// Voting still active.
    pub open: bool,
    /// Set once resolved with a "yes" outcome.
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub detail: ActionDetail,
}

/// Payload for creating an action. Staged picture lists always start empty
/// and are filled by `append_staged_picture` as uploads complete.
#[derive(Clone, Debug)]
pub enum ActionPayload {
    Invite { target: UserId },
    Kick { target: UserId },
    UpdatePicture,
    UpdateDescription { description: String },
    CreatePost { description: Option<String> },
    DeletePost { post: PostId },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Invite { .. } => ActionKind::Invite,
            ActionPayload::Kick { .. } => ActionKind::Kick,
            ActionPayload::UpdatePicture => ActionKind::UpdatePicture,
            ActionPayload::UpdateDescription { .. } => ActionKind::UpdateDescription,
            ActionPayload::CreatePost { .. } => ActionKind::CreatePost,
            ActionPayload::DeletePost { .. } => ActionKind::DeletePost,
        }
    }
}

/// Parameters for creating an action.
#[derive(Clone, Debug)]
pub struct CreateActionParams {
    pub flock_id: FlockId,
    pub creator: UserId,
    pub public_id: String,
    pub payload: ActionPayload,
    /// Quorum-of-one proposals are created already closed and accepted.
    pub open: bool,
    pub accepted: bool,
}

/// Result of a vote upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteUpsert {
    /// Same member, same value: nothing written.
    Unchanged,
    /// Inserted or overwritten.
    Recorded,
}

/// Yes/no counts for one action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub yes: u32,
    pub no: u32,
}

/// Open INVITE/KICK vote board row.
#[derive(Clone, Debug)]
pub struct MemberVoteRow {
    pub kind: ActionKind,
    /// Username of the member the action concerns.
    pub involving: String,
    pub creator: String,
    pub yes: u32,
    pub no: u32,
    pub public_id: String,
}

/// Open content-action vote board row.
#[derive(Clone, Debug)]
pub struct DetailVoteRow {
    pub kind: ActionKind,
    pub creator: String,
    pub yes: u32,
    pub no: u32,
    pub public_id: String,
    pub description: Option<String>,
    pub pictures: Vec<String>,
}

/// An accepted invite awaiting the target's answer, as shown to the target.
#[derive(Clone, Debug)]
pub struct OutstandingInvite {
    pub flock_name: String,
}
