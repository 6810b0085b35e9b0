//! User handlers: registration, profile, leaving, invite decisions

use tonic::{Request, Response, Status};

use flock_proto::Empty;
use flock_storage::{CreateUserParams, Store, StoreError, UpdateProfileParams};

use crate::server::{status_from_engine, FlockServer};

pub async fn register(
    server: &FlockServer,
    request: Request<flock_proto::RegisterRequest>,
) -> Result<Response<flock_proto::RegisterResponse>, Status> {
    // No authentication required - the keypair being registered is the credential
    let req = request.into_inner();

    if req.username.trim().is_empty() || req.email.trim().is_empty() {
        return Err(Status::invalid_argument("Name or Email Empty"));
    }

    let public_key = hex::decode(&req.public_key)
        .map_err(|_| Status::invalid_argument("Invalid public key format"))?;
    if public_key.len() != 32 {
        return Err(Status::invalid_argument("Invalid public key length"));
    }

    let user_id = server
        .store
        .create_user(&CreateUserParams {
            username: req.username,
            email: req.email,
            public_key,
            picture: None,
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => Status::already_exists("Duplicate username or email"),
            _ => Status::internal(format!("Failed to create user: {}", e)),
        })?;

    Ok(Response::new(flock_proto::RegisterResponse {
        user_id: user_id.0.to_string(),
    }))
}

pub async fn get_user_info(
    server: &FlockServer,
    request: Request<Empty>,
) -> Result<Response<flock_proto::UserInfo>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/GetUserInfo")
        .await?;

    Ok(Response::new(flock_proto::UserInfo {
        username: ctx.user.username,
        email: ctx.user.email,
        picture: ctx.user.picture.unwrap_or_default(),
        bio: ctx.user.bio.unwrap_or_default(),
        flock_name: ctx.flock.map(|f| f.name).unwrap_or_default(),
    }))
}

pub async fn update_profile(
    server: &FlockServer,
    request: Request<flock_proto::UpdateProfileRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/UpdateProfile")
        .await?;
    let req = request.into_inner();

    if req.username.is_empty() && req.bio.is_empty() {
        return Err(Status::invalid_argument("No Content"));
    }

    let username = if req.username.is_empty() {
        None
    } else {
        Some(req.username)
    };
    let bio = if req.bio.is_empty() {
        None
    } else {
        Some(req.bio)
    };

    server
        .store
        .update_profile(&ctx.user.id, &UpdateProfileParams { username, bio })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => Status::already_exists("Duplicate username"),
            _ => Status::internal(format!("Failed to update profile: {}", e)),
        })?;

    Ok(Response::new(Empty {}))
}

pub async fn leave_flock(
    server: &FlockServer,
    request: Request<Empty>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/LeaveFlock")
        .await?;

    server
        .store
        .remove_member(&ctx.user.id)
        .await
        .map_err(|e| Status::internal(format!("Failed to leave flock: {}", e)))?;

    Ok(Response::new(Empty {}))
}

pub async fn get_outstanding_invites(
    server: &FlockServer,
    request: Request<Empty>,
) -> Result<Response<flock_proto::OutstandingInviteList>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/GetOutstandingInvites")
        .await?;

    let invites = server
        .engine
        .outstanding_invites(&ctx)
        .await
        .map_err(status_from_engine)?;

    Ok(Response::new(flock_proto::OutstandingInviteList {
        invites: invites
            .into_iter()
            .map(|invite| flock_proto::OutstandingInvite {
                name: invite.flock_name,
            })
            .collect(),
    }))
}

pub async fn accept_invite(
    server: &FlockServer,
    request: Request<flock_proto::InviteDecisionRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/AcceptInvite")
        .await?;
    let req = request.into_inner();

    server
        .engine
        .accept_invite(&ctx, &req.name)
        .await
        .map_err(status_from_engine)?;
    Ok(Response::new(Empty {}))
}

pub async fn decline_invite(
    server: &FlockServer,
    request: Request<flock_proto::InviteDecisionRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/DeclineInvite")
        .await?;
    let req = request.into_inner();

    server
        .engine
        .decline_invite(&ctx, &req.name)
        .await
        .map_err(status_from_engine)?;
    Ok(Response::new(Empty {}))
}
