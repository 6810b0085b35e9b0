//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait `flock-consensus` depends on.
///
/// Methods that act on actions/votes/members are **scoped by flock** where a
/// `FlockId` is taken; callers are expected to have resolved the caller's
/// flock first.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a new user (returns generated ID).
    async fn create_user(&self, params: &CreateUserParams) -> Result<UserId, StoreError>;

    /// Get user by ID.
    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError>;

    /// Get user by username.
    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError>;

    /// Apply a profile update. Fails with `AlreadyExists` on username clash.
    async fn update_profile(
        &self,
        user_id: &UserId,
        params: &UpdateProfileParams,
    ) -> Result<(), StoreError>;

    // ───────────────────────────────────── Flocks ─────────────────────────────────────────

    /// Create a new flock (returns generated ID).
    async fn create_flock(&self, params: &CreateFlockParams) -> Result<FlockId, StoreError>;

    /// Get flock by ID.
    async fn get_flock(&self, flock_id: &FlockId) -> Result<Flock, StoreError>;

    /// Get flock by its unique name.
    async fn get_flock_by_name(&self, name: &str) -> Result<Flock, StoreError>;

    /// Apply an accepted description update.
    async fn set_flock_description(
        &self,
        flock_id: &FlockId,
        description: &str,
    ) -> Result<(), StoreError>;

    /// Apply an accepted picture update.
    async fn set_flock_picture(&self, flock_id: &FlockId, url: &str) -> Result<(), StoreError>;

    // ───────────────────────────────────── Membership ─────────────────────────────────────

    /// Add a user to a flock. Fails with `AlreadyExists` if the user already
    /// belongs to any flock.
    async fn add_member(&self, flock_id: &FlockId, user_id: &UserId) -> Result<(), StoreError>;

    /// Remove a user from whatever flock they belong to (kick or leave).
    async fn remove_member(&self, user_id: &UserId) -> Result<(), StoreError>;

    /// Move a user into `flock_id`, leaving any previous flock, in one
    /// transaction (invite acceptance).
    async fn transfer_member(&self, flock_id: &FlockId, user_id: &UserId)
        -> Result<(), StoreError>;

    /// The flock the user currently belongs to, if any.
    async fn flock_for_user(&self, user_id: &UserId) -> Result<Option<Flock>, StoreError>;

    /// Current member count of a flock.
    async fn count_members(&self, flock_id: &FlockId) -> Result<u32, StoreError>;

    /// Members of a flock ordered by username.
    async fn list_members(&self, flock_id: &FlockId) -> Result<Vec<User>, StoreError>;

    // ───────────────────────────────────── Actions ────────────────────────────────────────

    /// Persist a new action (and its kind-specific payload row).
    async fn create_action(&self, params: &CreateActionParams) -> Result<ActionId, StoreError>;

    /// Look up an **open** action by public id within a flock.
    async fn find_open_action(
        &self,
        flock_id: &FlockId,
        public_id: &str,
    ) -> Result<Action, StoreError>;

    /// Whether an open INVITE, or an accepted-but-unanswered one, already
    /// exists against this target in this flock.
    async fn has_pending_invite(
        &self,
        flock_id: &FlockId,
        target: &UserId,
    ) -> Result<bool, StoreError>;

    /// Whether an open KICK already exists against this target in this flock.
    async fn has_open_kick(&self, flock_id: &FlockId, target: &UserId)
        -> Result<bool, StoreError>;

    /// Whether the creator already has an open action of this kind in this
    /// flock (one session per creator for the content kinds).
    async fn has_open_action_by_creator(
        &self,
        flock_id: &FlockId,
        creator: &UserId,
        kind: ActionKind,
    ) -> Result<bool, StoreError>;

    /// Whether an open DELETE_POST already exists for this post.
    async fn has_open_post_deletion(&self, post_id: &PostId) -> Result<bool, StoreError>;

    /// Flip `open` to false iff it is still true. Returns whether this call
    /// performed the flip — exactly one concurrent resolver wins, and only
    /// the winner dispatches side effects.
    async fn close_action(&self, action_id: &ActionId) -> Result<bool, StoreError>;

    /// Mark a closed action as accepted.
    async fn mark_accepted(&self, action_id: &ActionId) -> Result<(), StoreError>;

    /// Clear the target's outstanding flag (INVITE/KICK).
    async fn clear_outstanding(&self, action_id: &ActionId) -> Result<(), StoreError>;

    /// Append an uploaded asset URL to the action's staged payload.
    async fn append_staged_picture(
        &self,
        action_id: &ActionId,
        url: &str,
    ) -> Result<(), StoreError>;

    // ───────────────────────────────────── Votes ──────────────────────────────────────────

    /// Upsert the member's vote in one transaction. Same value → `Unchanged`
    /// with nothing written; different value → overwrite; absent → insert.
    async fn upsert_vote(
        &self,
        action_id: &ActionId,
        user_id: &UserId,
        vote: bool,
    ) -> Result<VoteUpsert, StoreError>;

    /// Yes/no counts for an action.
    async fn tally_votes(&self, action_id: &ActionId) -> Result<VoteTally, StoreError>;

    /// Open INVITE/KICK actions of a flock with counts, ordered by the
    /// username of the member involved.
    async fn list_member_vote_rows(
        &self,
        flock_id: &FlockId,
    ) -> Result<Vec<MemberVoteRow>, StoreError>;

    /// Open content actions of a flock with counts and staged payload,
    /// newest first.
    async fn list_detail_vote_rows(
        &self,
        flock_id: &FlockId,
    ) -> Result<Vec<DetailVoteRow>, StoreError>;

    // ───────────────────────────────────── Invites (target side) ──────────────────────────

    /// Flocks holding an accepted, unanswered invite for this user.
    async fn list_outstanding_invites(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<OutstandingInvite>, StoreError>;

    /// The accepted, unanswered invite for this user from the named flock.
    async fn find_outstanding_invite(
        &self,
        user_id: &UserId,
        flock_name: &str,
    ) -> Result<(ActionId, FlockId), StoreError>;

    /// Record the target's answer: clears outstanding, and marks the target's
    /// acceptance when `joined`.
    async fn resolve_outstanding_invite(
        &self,
        action_id: &ActionId,
        joined: bool,
    ) -> Result<(), StoreError>;

    // ───────────────────────────────────── Posts ──────────────────────────────────────────

    /// Materialize a post (returns generated ID).
    async fn create_post(&self, params: &CreatePostParams) -> Result<PostId, StoreError>;

    /// Get a post by public id within a flock.
    async fn get_post_by_public_id(
        &self,
        flock_id: &FlockId,
        public_id: &str,
    ) -> Result<Post, StoreError>;

    /// Get a post by ID.
    async fn get_post(&self, post_id: &PostId) -> Result<Post, StoreError>;

    /// Remove a post.
    async fn delete_post(&self, post_id: &PostId) -> Result<(), StoreError>;

    /// Append an uploaded asset URL to an already-materialized post
    /// (quorum-of-one post creation).
    async fn append_post_picture(&self, post_id: &PostId, url: &str) -> Result<(), StoreError>;

    /// Posts of the named flock, newest first.
    async fn list_posts(&self, flock_name: &str) -> Result<Vec<Post>, StoreError>;
}
