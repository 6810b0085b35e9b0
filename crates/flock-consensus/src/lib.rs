//! The flock consensus engine.
//!
//! Owns the lifecycle of a proposed group action from creation through vote
//! tallying to resolution and side-effect dispatch. Storage-agnostic: all
//! persistence goes through the [`Store`] trait, asset cleanup through the
//! [`AssetStore`] collaborator. Every call takes an explicit [`AuthContext`]
//! for the authenticated caller; there is no ambient request state.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use flock_assets::AssetStore;
use flock_storage::{
    ActionDetail, ActionId, ActionKind, ActionPayload, CreateActionParams, CreatePostParams,
    DetailVoteRow, Flock, FlockId, MemberVoteRow, OutstandingInvite, PostId, Store, StoreError,
    User, VoteTally, VoteUpsert,
};

/// Engine error taxonomy. The server maps these onto transport status codes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Validation/precondition failure.
    #[error("{0}")]
    BadRequest(String),
    /// Caller is not allowed to see or mutate the referenced action.
    #[error("{0}")]
    Unauthorized(String),
    /// A competing session already exists.
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn bad_request(msg: &str) -> EngineError {
    EngineError::BadRequest(msg.to_string())
}

fn unauthorized(msg: &str) -> EngineError {
    EngineError::Unauthorized(msg.to_string())
}

/// Resolved outcome of a vote session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consensus {
    Yes,
    No,
}

impl std::fmt::Display for Consensus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Consensus::Yes => "Yes",
            Consensus::No => "No",
        })
    }
}

/// The authenticated caller, resolved once per request.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user: User,
    /// The flock the caller currently belongs to, if any.
    pub flock: Option<Flock>,
}

impl AuthContext {
    fn require_flock(&self) -> Result<&Flock, EngineError> {
        self.flock
            .as_ref()
            .ok_or_else(|| bad_request("You're not in a Flock"))
    }
}

/// Handle returned by the upload-authorization step of picture/post
/// proposals. The caller stores each asset with the collaborator and feeds
/// the resulting URL back through the matching `complete_*` call.
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub action_id: ActionId,
    pub flock_id: FlockId,
    /// Quorum-of-one: the action was created already closed and accepted,
    /// and side effects apply as uploads complete.
    pub solo: bool,
    /// Set for solo post creation, where the post is materialized up front.
    pub post_id: Option<PostId>,
}

/// Open vote sessions of a flock, grouped the way clients consume them.
#[derive(Clone, Debug, Default)]
pub struct VoteBoard {
    pub member_votes: Vec<MemberVoteRow>,
    pub detail_votes: Vec<DetailVoteRow>,
}

/// Majority threshold for a flock of `member_count` members.
fn majority(member_count: u32) -> u32 {
    member_count / 2 + 1
}

/// Resolution test: `None` means no consensus yet.
///
/// A session resolves when either side reaches majority, when everyone has
/// voted (larger side wins, exact tie rejects), or when all but one member
/// have voted and the counts are tied — the last vote cannot change the
/// outcome, so the session rejects early.
fn resolution(tally: VoteTally, member_count: u32) -> Option<Consensus> {
    let majority = majority(member_count);
    if tally.yes >= majority {
        return Some(Consensus::Yes);
    }
    if tally.no >= majority {
        return Some(Consensus::No);
    }
    let cast = tally.yes + tally.no;
    if cast == member_count {
        // Everyone voted without a majority: only possible as an exact tie.
        return Some(Consensus::No);
    }
    if member_count > 0 && cast == member_count - 1 && tally.yes == tally.no {
        return Some(Consensus::No);
    }
    None
}

fn new_public_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub struct ConsensusEngine {
    store: Arc<dyn Store>,
    assets: Arc<dyn AssetStore>,
}

impl ConsensusEngine {
    pub fn new(store: Arc<dyn Store>, assets: Arc<dyn AssetStore>) -> Self {
        Self { store, assets }
    }

    // ───────────────────────────── Proposal creation ─────────────────────────────

    /// Propose inviting `username` into the caller's flock.
    ///
    /// In a one-member flock the target joins immediately and no vote session
    /// is created.
    pub async fn create_invite(
        &self,
        ctx: &AuthContext,
        username: &str,
    ) -> Result<(), EngineError> {
        let flock = ctx.require_flock()?;

        if ctx.user.username == username {
            return Err(bad_request("You cannot invite yourself"));
        }

        let target = match self.store.get_user_by_username(username).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(bad_request("User not found")),
            Err(e) => return Err(e.into()),
        };

        if self.store.flock_for_user(&target.id).await?.is_some() {
            return Err(bad_request("User already in a Flock"));
        }

        // A lone member needs no vote
        let members = self.store.count_members(&flock.id).await?;
        if members == 1 {
            self.store.add_member(&flock.id, &target.id).await?;
            tracing::info!(flock = %flock.name, user = %target.username, "solo invite, member added");
            return Ok(());
        }

        if self.store.has_pending_invite(&flock.id, &target.id).await? {
            return Err(bad_request("Outstanding Vote Session or Invite"));
        }

        let action_id = self
            .store
            .create_action(&CreateActionParams {
                flock_id: flock.id.clone(),
                creator: ctx.user.id.clone(),
                public_id: new_public_id(),
                payload: ActionPayload::Invite {
                    target: target.id.clone(),
                },
                open: true,
                accepted: false,
            })
            .await?;
        self.store.upsert_vote(&action_id, &ctx.user.id, true).await?;
        Ok(())
    }

    /// Propose kicking `username` from the caller's flock.
    pub async fn create_kick(&self, ctx: &AuthContext, username: &str) -> Result<(), EngineError> {
        let flock = ctx.require_flock()?;

        if ctx.user.username == username {
            return Err(bad_request("You cannot kick yourself"));
        }

        // A two-member flock can't reach a kick majority without the target
        let members = self.store.count_members(&flock.id).await?;
        if members == 2 {
            return Err(bad_request(
                "Cannot create a kick session with only two members",
            ));
        }

        let target = match self.store.get_user_by_username(username).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(bad_request("User not found")),
            Err(e) => return Err(e.into()),
        };
        match self.store.flock_for_user(&target.id).await? {
            Some(f) if f.id == flock.id => {}
            _ => return Err(bad_request("User not found")),
        }

        if self.store.has_open_kick(&flock.id, &target.id).await? {
            return Err(bad_request("Outstanding Vote Session or Invite"));
        }

        let action_id = self
            .store
            .create_action(&CreateActionParams {
                flock_id: flock.id.clone(),
                creator: ctx.user.id.clone(),
                public_id: new_public_id(),
                payload: ActionPayload::Kick {
                    target: target.id.clone(),
                },
                open: true,
                accepted: false,
            })
            .await?;
        self.store.upsert_vote(&action_id, &ctx.user.id, true).await?;
        Ok(())
    }

    /// Propose replacing the flock description with `description`.
    pub async fn create_description_update(
        &self,
        ctx: &AuthContext,
        description: &str,
    ) -> Result<(), EngineError> {
        let flock = ctx.require_flock()?;

        if description.trim().is_empty() {
            return Err(bad_request("No description"));
        }
        if self
            .store
            .has_open_action_by_creator(&flock.id, &ctx.user.id, ActionKind::UpdateDescription)
            .await?
        {
            return Err(EngineError::Conflict(
                "You already created a session".to_string(),
            ));
        }

        let members = self.store.count_members(&flock.id).await?;
        let solo = members == 1;
        let action_id = self
            .store
            .create_action(&CreateActionParams {
                flock_id: flock.id.clone(),
                creator: ctx.user.id.clone(),
                public_id: new_public_id(),
                payload: ActionPayload::UpdateDescription {
                    description: description.to_string(),
                },
                open: !solo,
                accepted: solo,
            })
            .await?;
        self.store.upsert_vote(&action_id, &ctx.user.id, true).await?;

        if solo {
            self.store
                .set_flock_description(&flock.id, description)
                .await?;
        }
        Ok(())
    }

    /// Authorize a picture-update upload: runs the preconditions and creates
    /// the action (already closed and accepted for a lone member).
    pub async fn begin_picture_update(
        &self,
        ctx: &AuthContext,
    ) -> Result<UploadSession, EngineError> {
        let flock = ctx.require_flock()?;

        if self
            .store
            .has_open_action_by_creator(&flock.id, &ctx.user.id, ActionKind::UpdatePicture)
            .await?
        {
            return Err(EngineError::Conflict(
                "You already created an active session".to_string(),
            ));
        }

        let members = self.store.count_members(&flock.id).await?;
        let solo = members == 1;
        let action_id = self
            .store
            .create_action(&CreateActionParams {
                flock_id: flock.id.clone(),
                creator: ctx.user.id.clone(),
                public_id: new_public_id(),
                payload: ActionPayload::UpdatePicture,
                open: !solo,
                accepted: solo,
            })
            .await?;
        self.store.upsert_vote(&action_id, &ctx.user.id, true).await?;

        Ok(UploadSession {
            action_id,
            flock_id: flock.id.clone(),
            solo,
            post_id: None,
        })
    }

    /// Record a completed picture upload against its session. For a lone
    /// member the new picture applies immediately.
    pub async fn complete_picture_upload(
        &self,
        session: &UploadSession,
        url: &str,
    ) -> Result<(), EngineError> {
        self.store
            .append_staged_picture(&session.action_id, url)
            .await?;
        if session.solo {
            self.store.set_flock_picture(&session.flock_id, url).await?;
        }
        Ok(())
    }

    /// Authorize a post-creation upload. For a lone member the post is
    /// materialized up front and pictures attach as uploads complete.
    pub async fn begin_post(
        &self,
        ctx: &AuthContext,
        description: Option<&str>,
    ) -> Result<UploadSession, EngineError> {
        let flock = ctx.require_flock()?;

        let members = self.store.count_members(&flock.id).await?;
        let solo = members == 1;
        let action_id = self
            .store
            .create_action(&CreateActionParams {
                flock_id: flock.id.clone(),
                creator: ctx.user.id.clone(),
                public_id: new_public_id(),
                payload: ActionPayload::CreatePost {
                    description: description.map(str::to_string),
                },
                open: !solo,
                accepted: solo,
            })
            .await?;
        self.store.upsert_vote(&action_id, &ctx.user.id, true).await?;

        let post_id = if solo {
            Some(
                self.store
                    .create_post(&CreatePostParams {
                        flock_id: flock.id.clone(),
                        public_id: new_public_id(),
                        description: description.map(str::to_string),
                        pictures: vec![],
                    })
                    .await?,
            )
        } else {
            None
        };

        Ok(UploadSession {
            action_id,
            flock_id: flock.id.clone(),
            solo,
            post_id,
        })
    }

    /// Record a completed post-image upload against its session.
    pub async fn complete_post_upload(
        &self,
        session: &UploadSession,
        url: &str,
    ) -> Result<(), EngineError> {
        self.store
            .append_staged_picture(&session.action_id, url)
            .await?;
        if let Some(post_id) = &session.post_id {
            self.store.append_post_picture(post_id, url).await?;
        }
        Ok(())
    }

    /// Propose deleting the post with `post_public_id`. Symmetric to post
    /// creation; no client flow constructs it today.
    pub async fn create_post_deletion(
        &self,
        ctx: &AuthContext,
        post_public_id: &str,
    ) -> Result<(), EngineError> {
        let flock = ctx.require_flock()?;

        let post = match self
            .store
            .get_post_by_public_id(&flock.id, post_public_id)
            .await
        {
            Ok(post) => post,
            Err(StoreError::NotFound) => return Err(bad_request("Post not found")),
            Err(e) => return Err(e.into()),
        };
        if self.store.has_open_post_deletion(&post.id).await? {
            return Err(bad_request("Outstanding Vote Session"));
        }

        let members = self.store.count_members(&flock.id).await?;
        let solo = members == 1;
        let action_id = self
            .store
            .create_action(&CreateActionParams {
                flock_id: flock.id.clone(),
                creator: ctx.user.id.clone(),
                public_id: new_public_id(),
                payload: ActionPayload::DeletePost {
                    post: post.id.clone(),
                },
                open: !solo,
                accepted: solo,
            })
            .await?;
        self.store.upsert_vote(&action_id, &ctx.user.id, true).await?;

        if solo {
            self.store.delete_post(&post.id).await?;
            self.discard_assets(&post.pictures).await;
        }
        Ok(())
    }

    // ───────────────────────────── Vote casting ─────────────────────────────

    /// Cast or change the caller's vote on the session with `public_id`.
    ///
    /// Returns the resolved consensus, or `None` while the session stays
    /// open (including the same-value no-op case).
    pub async fn cast_vote(
        &self,
        ctx: &AuthContext,
        public_id: &str,
        vote: bool,
    ) -> Result<Option<Consensus>, EngineError> {
        let flock = ctx
            .flock
            .as_ref()
            .ok_or_else(|| unauthorized("User not in Flock"))?;

        let action = match self.store.find_open_action(&flock.id, public_id).await {
            Ok(action) => action,
            Err(StoreError::NotFound) => return Err(unauthorized("Vote Session Not Found")),
            Err(e) => return Err(e.into()),
        };

        if action.detail.target() == Some(&ctx.user.id) {
            return Err(unauthorized("Cannot vote for yourself"));
        }

        // Lone-member sessions are resolved at creation and never voted on
        let members = self.store.count_members(&flock.id).await?;
        if members == 1 {
            return Err(bad_request("A lone member does not vote"));
        }

        if self.store.upsert_vote(&action.id, &ctx.user.id, vote).await? == VoteUpsert::Unchanged {
            return Ok(None);
        }

        let tally = self.store.tally_votes(&action.id).await?;
        let Some(outcome) = resolution(tally, members) else {
            return Ok(None);
        };

        // Claim the resolution; a concurrent voter may have beaten us to it,
        // in which case they dispatch the side effects.
        if !self.store.close_action(&action.id).await? {
            return Ok(None);
        }

        tracing::info!(
            kind = %action.detail.kind(),
            public_id = %action.public_id,
            yes = tally.yes,
            no = tally.no,
            members,
            outcome = %outcome,
            "vote session resolved",
        );
        self.dispatch(&action, outcome).await.map(Some)
    }

    /// Apply the kind-specific resolution side effects. The action is
    /// already closed; its open flag stays the durable source of truth even
    /// if a downstream effect fails.
    async fn dispatch(
        &self,
        action: &flock_storage::Action,
        outcome: Consensus,
    ) -> Result<Consensus, EngineError> {
        match &action.detail {
            ActionDetail::Invite { .. } => {
                if outcome == Consensus::No {
                    self.store.clear_outstanding(&action.id).await?;
                    return Ok(Consensus::No);
                }
                self.store.mark_accepted(&action.id).await?;
                // Membership changes only once the target accepts
                Ok(Consensus::Yes)
            }
            ActionDetail::Kick { target } => {
                if outcome == Consensus::No {
                    self.store.clear_outstanding(&action.id).await?;
                    return Ok(Consensus::No);
                }
                self.store.mark_accepted(&action.id).await?;
                self.store.remove_member(target).await?;
                self.store.clear_outstanding(&action.id).await?;
                Ok(Consensus::Yes)
            }
            ActionDetail::UpdatePicture { pictures } => {
                let url = pictures.first().ok_or_else(|| bad_request("No image"))?;
                if outcome == Consensus::No {
                    self.discard_assets(pictures).await;
                    return Ok(Consensus::No);
                }
                self.store.mark_accepted(&action.id).await?;
                self.store.set_flock_picture(&action.flock_id, url).await?;
                Ok(Consensus::Yes)
            }
            ActionDetail::UpdateDescription { description } => {
                if description.is_empty() {
                    return Err(bad_request("No description"));
                }
                if outcome == Consensus::No {
                    return Ok(Consensus::No);
                }
                self.store.mark_accepted(&action.id).await?;
                self.store
                    .set_flock_description(&action.flock_id, description)
                    .await?;
                Ok(Consensus::Yes)
            }
            ActionDetail::CreatePost {
                description,
                pictures,
            } => {
                if pictures.is_empty() {
                    return Err(bad_request("No Pictures"));
                }
                if outcome == Consensus::No {
                    self.discard_assets(pictures).await;
                    return Ok(Consensus::No);
                }
                self.store.mark_accepted(&action.id).await?;
                self.store
                    .create_post(&CreatePostParams {
                        flock_id: action.flock_id.clone(),
                        public_id: new_public_id(),
                        description: description.clone(),
                        pictures: pictures.clone(),
                    })
                    .await?;
                Ok(Consensus::Yes)
            }
            ActionDetail::DeletePost { post } => {
                if outcome == Consensus::No {
                    return Ok(Consensus::No);
                }
                self.store.mark_accepted(&action.id).await?;
                let post = self.store.get_post(post).await?;
                self.store.delete_post(&post.id).await?;
                self.discard_assets(&post.pictures).await;
                Ok(Consensus::Yes)
            }
        }
    }

    /// Best-effort asset cleanup. Failures are logged, never surfaced: the
    /// committed resolution stays valid even if the collaborator is down.
    async fn discard_assets(&self, urls: &[String]) {
        for url in urls {
            if let Err(e) = self.assets.delete(url).await {
                tracing::warn!(url = %url, error = %e, "failed to discard staged asset");
            }
        }
    }

    // ───────────────────────────── Queries ─────────────────────────────

    /// Open vote sessions of the caller's flock.
    pub async fn vote_board(&self, ctx: &AuthContext) -> Result<VoteBoard, EngineError> {
        let flock = ctx.require_flock()?;
        Ok(VoteBoard {
            member_votes: self.store.list_member_vote_rows(&flock.id).await?,
            detail_votes: self.store.list_detail_vote_rows(&flock.id).await?,
        })
    }

    /// Accepted invites awaiting the caller's answer, regardless of their
    /// current flock.
    pub async fn outstanding_invites(
        &self,
        ctx: &AuthContext,
    ) -> Result<Vec<OutstandingInvite>, EngineError> {
        Ok(self.store.list_outstanding_invites(&ctx.user.id).await?)
    }

    // ───────────────────────────── Invite accept/decline ─────────────────────────────

    /// Accept the outstanding invite from the named flock: leave any current
    /// flock, join the inviting one, clear the outstanding flag.
    pub async fn accept_invite(
        &self,
        ctx: &AuthContext,
        flock_name: &str,
    ) -> Result<(), EngineError> {
        let (action_id, flock_id) = self.find_invite(ctx, flock_name).await?;
        self.store.transfer_member(&flock_id, &ctx.user.id).await?;
        self.store
            .resolve_outstanding_invite(&action_id, true)
            .await?;
        tracing::info!(flock = %flock_name, user = %ctx.user.username, "invite accepted");
        Ok(())
    }

    /// Decline the outstanding invite from the named flock. No membership
    /// change.
    pub async fn decline_invite(
        &self,
        ctx: &AuthContext,
        flock_name: &str,
    ) -> Result<(), EngineError> {
        let (action_id, _) = self.find_invite(ctx, flock_name).await?;
        self.store
            .resolve_outstanding_invite(&action_id, false)
            .await?;
        Ok(())
    }

    async fn find_invite(
        &self,
        ctx: &AuthContext,
        flock_name: &str,
    ) -> Result<(ActionId, FlockId), EngineError> {
        match self
            .store
            .find_outstanding_invite(&ctx.user.id, flock_name)
            .await
        {
            Ok(found) => Ok(found),
            Err(StoreError::NotFound) => Err(bad_request("No invite found")),
            Err(e) => Err(e.into()),
        }
    }
}
