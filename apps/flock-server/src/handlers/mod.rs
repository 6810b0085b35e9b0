//! Handler modules for gRPC service implementation
//!
//! This module contains handler functions organized by domain:
//! - users: registration, profile, leaving, invite accept/decline
//! - flocks: flock CRUD-adjacent glue (create, info, members, posts)
//! - votes: proposal creation, vote casting, vote boards

pub mod flocks;
pub mod users;
pub mod votes;

use tonic::{Request, Response, Status};

use crate::server::FlockServer;
use flock_proto::flock_service_server::FlockService;
use flock_proto::*;

#[tonic::async_trait]
impl FlockService for FlockServer {
    // ───────────────────────────────────── Users ─────────────────────────────────────

    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        users::register(self, request).await
    }

    async fn get_user_info(&self, request: Request<Empty>) -> Result<Response<UserInfo>, Status> {
        users::get_user_info(self, request).await
    }

    async fn update_profile(
        &self,
        request: Request<UpdateProfileRequest>,
    ) -> Result<Response<Empty>, Status> {
        users::update_profile(self, request).await
    }

    async fn leave_flock(&self, request: Request<Empty>) -> Result<Response<Empty>, Status> {
        users::leave_flock(self, request).await
    }

    // ───────────────────────────────────── Invites (target side) ─────────────────────

    async fn get_outstanding_invites(
        &self,
        request: Request<Empty>,
    ) -> Result<Response<OutstandingInviteList>, Status> {
        users::get_outstanding_invites(self, request).await
    }

    async fn accept_invite(
        &self,
        request: Request<InviteDecisionRequest>,
    ) -> Result<Response<Empty>, Status> {
        users::accept_invite(self, request).await
    }

    async fn decline_invite(
        &self,
        request: Request<InviteDecisionRequest>,
    ) -> Result<Response<Empty>, Status> {
        users::decline_invite(self, request).await
    }

    // ───────────────────────────────────── Flocks ────────────────────────────────────

    async fn create_flock(
        &self,
        request: Request<CreateFlockRequest>,
    ) -> Result<Response<Empty>, Status> {
        flocks::create_flock(self, request).await
    }

    async fn get_flock_info(
        &self,
        request: Request<FlockByNameRequest>,
    ) -> Result<Response<FlockInfo>, Status> {
        flocks::get_flock_info(self, request).await
    }

    async fn get_flock_members(
        &self,
        request: Request<FlockByNameRequest>,
    ) -> Result<Response<MemberList>, Status> {
        flocks::get_flock_members(self, request).await
    }

    async fn get_posts(
        &self,
        request: Request<FlockByNameRequest>,
    ) -> Result<Response<PostList>, Status> {
        flocks::get_posts(self, request).await
    }

    // ───────────────────────────────────── Consensus ─────────────────────────────────

    async fn create_invite(
        &self,
        request: Request<MemberActionRequest>,
    ) -> Result<Response<Empty>, Status> {
        votes::create_invite(self, request).await
    }

    async fn create_kick(
        &self,
        request: Request<MemberActionRequest>,
    ) -> Result<Response<Empty>, Status> {
        votes::create_kick(self, request).await
    }

    async fn create_description_update(
        &self,
        request: Request<CreateDescriptionUpdateRequest>,
    ) -> Result<Response<Empty>, Status> {
        votes::create_description_update(self, request).await
    }

    async fn create_picture_update(
        &self,
        request: Request<CreatePictureUpdateRequest>,
    ) -> Result<Response<Empty>, Status> {
        votes::create_picture_update(self, request).await
    }

    async fn create_post(
        &self,
        request: Request<CreatePostRequest>,
    ) -> Result<Response<Empty>, Status> {
        votes::create_post(self, request).await
    }

    async fn create_post_deletion(
        &self,
        request: Request<CreatePostDeletionRequest>,
    ) -> Result<Response<Empty>, Status> {
        votes::create_post_deletion(self, request).await
    }

    async fn cast_vote(
        &self,
        request: Request<CastVoteRequest>,
    ) -> Result<Response<CastVoteResponse>, Status> {
        votes::cast_vote(self, request).await
    }

    async fn get_votes(&self, request: Request<Empty>) -> Result<Response<VoteBoard>, Status> {
        votes::get_votes(self, request).await
    }
}
