//! Consensus handlers: proposals, vote casting, vote boards
//!
//! Picture and post proposals run the upload pipeline inline: the engine
//! authorizes the session, each image is handed to the asset collaborator,
//! and the resulting URLs are staged on the action.

use tonic::{Request, Response, Status};

use flock_assets::AssetStore;
use flock_proto::Empty;

use crate::server::{status_from_engine, FlockServer};

pub async fn create_invite(
    server: &FlockServer,
    request: Request<flock_proto::MemberActionRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CreateInvite")
        .await?;
    let req = request.into_inner();

    server
        .engine
        .create_invite(&ctx, &req.username)
        .await
        .map_err(status_from_engine)?;
    Ok(Response::new(Empty {}))
}

pub async fn create_kick(
    server: &FlockServer,
    request: Request<flock_proto::MemberActionRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CreateKick")
        .await?;
    let req = request.into_inner();

    server
        .engine
        .create_kick(&ctx, &req.username)
        .await
        .map_err(status_from_engine)?;
    Ok(Response::new(Empty {}))
}

pub async fn create_description_update(
    server: &FlockServer,
    request: Request<flock_proto::CreateDescriptionUpdateRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CreateDescriptionUpdate")
        .await?;
    let req = request.into_inner();

    server
        .engine
        .create_description_update(&ctx, &req.description)
        .await
        .map_err(status_from_engine)?;
    Ok(Response::new(Empty {}))
}

pub async fn create_picture_update(
    server: &FlockServer,
    request: Request<flock_proto::CreatePictureUpdateRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CreatePictureUpdate")
        .await?;
    let req = request.into_inner();

    if req.image.is_empty() {
        return Err(Status::invalid_argument("No image"));
    }

    let session = server
        .engine
        .begin_picture_update(&ctx)
        .await
        .map_err(status_from_engine)?;

    let url = server
        .assets
        .store(&req.image)
        .await
        .map_err(|e| Status::internal(format!("Failed to store asset: {}", e)))?;
    server
        .engine
        .complete_picture_upload(&session, &url)
        .await
        .map_err(status_from_engine)?;

    Ok(Response::new(Empty {}))
}

pub async fn create_post(
    server: &FlockServer,
    request: Request<flock_proto::CreatePostRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CreatePost")
        .await?;
    let req = request.into_inner();

    if req.images.is_empty() {
        return Err(Status::invalid_argument("No Pictures"));
    }
    if req.images.len() > server.config.max_post_images {
        return Err(Status::invalid_argument("Too many images"));
    }

    let description = if req.description.is_empty() {
        None
    } else {
        Some(req.description.as_str())
    };
    let session = server
        .engine
        .begin_post(&ctx, description)
        .await
        .map_err(status_from_engine)?;

    for image in &req.images {
        let url = server
            .assets
            .store(image)
            .await
            .map_err(|e| Status::internal(format!("Failed to store asset: {}", e)))?;
        server
            .engine
            .complete_post_upload(&session, &url)
            .await
            .map_err(status_from_engine)?;
    }

    Ok(Response::new(Empty {}))
}

pub async fn create_post_deletion(
    server: &FlockServer,
    request: Request<flock_proto::CreatePostDeletionRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CreatePostDeletion")
        .await?;
    let req = request.into_inner();

    server
        .engine
        .create_post_deletion(&ctx, &req.public_id)
        .await
        .map_err(status_from_engine)?;
    Ok(Response::new(Empty {}))
}

pub async fn cast_vote(
    server: &FlockServer,
    request: Request<flock_proto::CastVoteRequest>,
) -> Result<Response<flock_proto::CastVoteResponse>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CastVote")
        .await?;
    let req = request.into_inner();

    let outcome = server
        .engine
        .cast_vote(&ctx, &req.public_id, req.vote)
        .await
        .map_err(status_from_engine)?;

    crate::metrics::record_vote_cast();
    if let Some(consensus) = outcome {
        crate::metrics::record_consensus(match consensus {
            flock_consensus::Consensus::Yes => "yes",
            flock_consensus::Consensus::No => "no",
        });
    }

    Ok(Response::new(flock_proto::CastVoteResponse {
        consensus: outcome.map(|c| c.to_string()),
    }))
}

pub async fn get_votes(
    server: &FlockServer,
    request: Request<Empty>,
) -> Result<Response<flock_proto::VoteBoard>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/GetVotes")
        .await?;

    let board = server
        .engine
        .vote_board(&ctx)
        .await
        .map_err(status_from_engine)?;

    Ok(Response::new(flock_proto::VoteBoard {
        member_votes: board
            .member_votes
            .into_iter()
            .map(|row| flock_proto::MemberVote {
                kind: row.kind.as_str().to_string(),
                involving: row.involving,
                creator: row.creator,
                yes: row.yes,
                no: row.no,
                public_id: row.public_id,
            })
            .collect(),
        detail_votes: board
            .detail_votes
            .into_iter()
            .map(|row| flock_proto::DetailVote {
                kind: row.kind.as_str().to_string(),
                creator: row.creator,
                yes: row.yes,
                no: row.no,
                public_id: row.public_id,
                description: row.description.unwrap_or_default(),
                pictures: row.pictures,
            })
            .collect(),
    }))
}
