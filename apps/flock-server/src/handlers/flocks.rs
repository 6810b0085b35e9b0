//! Flock handlers: create, info, members, posts

use tonic::{Request, Response, Status};

use flock_proto::Empty;
use flock_storage::{CreateFlockParams, Store, StoreError};

use crate::server::FlockServer;

pub async fn create_flock(
    server: &FlockServer,
    request: Request<flock_proto::CreateFlockRequest>,
) -> Result<Response<Empty>, Status> {
    let ctx = server
        .authenticate(&request, "/flock.FlockService/CreateFlock")
        .await?;
    let req = request.into_inner();

    if ctx.flock.is_some() {
        return Err(Status::invalid_argument("User already has flock"));
    }
    if req.name.trim().is_empty() || req.description.trim().is_empty() {
        return Err(Status::invalid_argument("Name or Description Empty"));
    }

    let flock_id = server
        .store
        .create_flock(&CreateFlockParams {
            name: req.name,
            description: req.description,
            picture: ctx.user.picture.clone(),
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => Status::invalid_argument("Duplicate Flock Name"),
            _ => Status::internal(format!("Failed to create flock: {}", e)),
        })?;

    // creator becomes the sole member
    server
        .store
        .add_member(&flock_id, &ctx.user.id)
        .await
        .map_err(|e| Status::internal(format!("Failed to add creator: {}", e)))?;

    Ok(Response::new(Empty {}))
}

pub async fn get_flock_info(
    server: &FlockServer,
    request: Request<flock_proto::FlockByNameRequest>,
) -> Result<Response<flock_proto::FlockInfo>, Status> {
    server
        .authenticate(&request, "/flock.FlockService/GetFlockInfo")
        .await?;
    let req = request.into_inner();

    let flock = server
        .store
        .get_flock_by_name(&req.name)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => Status::permission_denied("Flock not found"),
            _ => Status::internal(format!("Failed to get flock: {}", e)),
        })?;

    Ok(Response::new(flock_proto::FlockInfo {
        name: flock.name,
        description: flock.description,
        picture: flock.picture.unwrap_or_default(),
    }))
}

pub async fn get_flock_members(
    server: &FlockServer,
    request: Request<flock_proto::FlockByNameRequest>,
) -> Result<Response<flock_proto::MemberList>, Status> {
    server
        .authenticate(&request, "/flock.FlockService/GetFlockMembers")
        .await?;
    let req = request.into_inner();

    let flock = server
        .store
        .get_flock_by_name(&req.name)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => Status::permission_denied("Flock not found"),
            _ => Status::internal(format!("Failed to get flock: {}", e)),
        })?;

    let members = server
        .store
        .list_members(&flock.id)
        .await
        .map_err(|e| Status::internal(format!("Failed to list members: {}", e)))?;

    Ok(Response::new(flock_proto::MemberList {
        members: members
            .into_iter()
            .map(|member| flock_proto::Member {
                username: member.username,
                picture: member.picture.unwrap_or_default(),
            })
            .collect(),
    }))
}

pub async fn get_posts(
    server: &FlockServer,
    request: Request<flock_proto::FlockByNameRequest>,
) -> Result<Response<flock_proto::PostList>, Status> {
    server
        .authenticate(&request, "/flock.FlockService/GetPosts")
        .await?;
    let req = request.into_inner();

    let posts = server
        .store
        .list_posts(&req.name)
        .await
        .map_err(|e| Status::internal(format!("Failed to list posts: {}", e)))?;

    Ok(Response::new(flock_proto::PostList {
        posts: posts
            .into_iter()
            .map(|post| flock_proto::Post {
                public_id: post.public_id,
                description: post.description.unwrap_or_default(),
                pictures: post.pictures,
                created_at: post.created_at.timestamp(),
            })
            .collect(),
    }))
}
