//! Common test helpers and utilities for server tests.
//!
//! This module provides shared test infrastructure including:
//! - Test server creation over in-memory SQLite
//! - User and flock creation helpers
//! - Signed request creation for authenticated tests

use std::sync::Arc;

use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use prost::Message;
use sha2::{Digest, Sha256};
use tonic::metadata::MetadataValue;
use tonic::Request;

use flock_assets_memory::MemoryAssetStore;
use flock_storage::{CreateFlockParams, CreateUserParams, FlockId, Store, UserId};
use flock_store_sqlite::SqliteStore;

use crate::config::ServerConfig;
use crate::server::FlockServer;

/// Test helper: Create a FlockServer with in-memory SQLite and memory assets
pub async fn create_test_server() -> FlockServer {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let assets = Arc::new(MemoryAssetStore::default());
    FlockServer::new(store, assets, ServerConfig::default())
}

/// Test helper: Generate a random Ed25519 keypair and return (public_key, private_key)
pub fn generate_keypair() -> (Vec<u8>, SigningKey) {
    let signing_key = SigningKey::generate(&mut rand_core::OsRng);
    let public_key = signing_key.verifying_key().to_bytes().to_vec();
    (public_key, signing_key)
}

/// Test helper: Create a user with a fresh keypair.
pub async fn create_test_user(server: &FlockServer, username: &str) -> (UserId, SigningKey) {
    let (public_key, signing_key) = generate_keypair();
    let user_id = server
        .store
        .create_user(&CreateUserParams {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            public_key,
            picture: None,
        })
        .await
        .unwrap();
    (user_id, signing_key)
}

/// Test helper: Create a flock with the given members.
pub async fn create_test_flock(
    server: &FlockServer,
    name: &str,
    member_ids: &[&UserId],
) -> FlockId {
    let flock_id = server
        .store
        .create_flock(&CreateFlockParams {
            name: name.to_string(),
            description: "a flock".to_string(),
            picture: None,
        })
        .await
        .unwrap();
    for user_id in member_ids {
        server.store.add_member(&flock_id, user_id).await.unwrap();
    }
    flock_id
}

/// Test helper: Create a signed request with proper authentication metadata
pub fn create_signed_request<T: Message + Default>(
    user_id: &UserId,
    signing_key: &SigningKey,
    method: &str,
    request_body: T,
) -> Request<T> {
    let body_bytes = request_body.encode_to_vec();
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(&body_bytes);
    let request_hash = hasher.finalize().to_vec();

    let timestamp = Utc::now().timestamp();

    // Build message: method + hash + timestamp
    let mut message = Vec::new();
    message.extend_from_slice(method.as_bytes());
    message.extend_from_slice(&request_hash);
    message.extend_from_slice(&timestamp.to_le_bytes());

    let signature = signing_key.sign(&message);

    let mut request = Request::new(request_body);
    request.metadata_mut().insert(
        "user-id",
        MetadataValue::try_from(user_id.0.to_string()).unwrap(),
    );
    request.metadata_mut().insert(
        "timestamp",
        MetadataValue::try_from(timestamp.to_string()).unwrap(),
    );
    request.metadata_mut().insert(
        "signature",
        MetadataValue::try_from(hex::encode(signature.to_bytes())).unwrap(),
    );
    request.metadata_mut().insert(
        "request-hash",
        MetadataValue::try_from(hex::encode(&request_hash)).unwrap(),
    );

    request
}
