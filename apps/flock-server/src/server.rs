use std::sync::Arc;

use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use prost::Message;
use sha2::{Digest, Sha256};
use tonic::Status;

use flock_assets::AssetStore;
use flock_consensus::{AuthContext, ConsensusEngine, EngineError};
use flock_storage::{Store, StoreError, User, UserId};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct FlockServer {
    pub store: Arc<dyn Store>,
    pub assets: Arc<dyn AssetStore>,
    pub engine: Arc<ConsensusEngine>,
    pub config: ServerConfig,
}

impl FlockServer {
    pub fn new(
        store: Arc<dyn Store>,
        assets: Arc<dyn AssetStore>,
        config: ServerConfig,
    ) -> Self {
        let engine = Arc::new(ConsensusEngine::new(store.clone(), assets.clone()));
        Self {
            store,
            assets,
            engine,
            config,
        }
    }

    /// Authenticate a request end-to-end: extract the signature metadata,
    /// verify it against the user's stored key, and resolve the caller's
    /// flock membership into an [`AuthContext`].
    pub async fn authenticate<T: Message + Clone>(
        &self,
        request: &tonic::Request<T>,
        method: &str,
    ) -> Result<AuthContext, Status> {
        let (user_id, timestamp, signature, request_hash) = extract_signature(request)?;
        let req_for_verify = request.get_ref().clone();
        let user = self
            .verify_signature_and_get_user(
                &user_id,
                timestamp,
                &signature,
                method,
                &req_for_verify,
                &request_hash,
            )
            .await?;
        crate::metrics::record_grpc_request(method);

        let flock = self
            .store
            .flock_for_user(&user.id)
            .await
            .map_err(|e| Status::internal(format!("Failed to resolve flock: {}", e)))?;
        Ok(AuthContext { user, flock })
    }

    /// Verify the signature and return the user.
    /// The signature must cover: method_name + request_hash + timestamp
    /// This prevents replay attacks across different methods or with different request bodies.
    pub async fn verify_signature_and_get_user<T: Message>(
        &self,
        user_id: &UserId,
        timestamp: i64,
        signature: &[u8],
        method: &str,
        request: &T,
        provided_hash: &[u8],
    ) -> Result<User, Status> {
        // Check timestamp freshness (replay protection)
        let now = Utc::now().timestamp();
        let age = now - timestamp;

        if age > 60 {
            return Err(Status::unauthenticated(
                "Request timestamp too old (>60s), possible replay attack",
            ));
        }
        if age < -30 {
            return Err(Status::unauthenticated(
                "Request timestamp too far in future (>30s), check clock sync",
            ));
        }

        // Compute expected hash and verify it matches provided hash
        let body_bytes = request.encode_to_vec();
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(&body_bytes);
        let expected_hash = hasher.finalize();

        if &expected_hash[..] != provided_hash {
            return Err(Status::unauthenticated(
                "Request hash mismatch - body may have been tampered",
            ));
        }

        let user = self
            .store
            .get_user(user_id)
            .await
            .map_err(|_| Status::unauthenticated("Invalid user"))?;

        let verifying_key = VerifyingKey::from_bytes(
            user.public_key
                .as_slice()
                .try_into()
                .map_err(|_| Status::unauthenticated("Invalid public key length"))?,
        )
        .map_err(|_| Status::unauthenticated("Invalid public key"))?;

        let sig = Signature::from_bytes(
            signature
                .try_into()
                .map_err(|_| Status::unauthenticated("Invalid signature length"))?,
        );

        // Build the expected signed message: method + hash + timestamp
        let mut message = Vec::new();
        message.extend_from_slice(method.as_bytes());
        message.extend_from_slice(provided_hash);
        message.extend_from_slice(&timestamp.to_le_bytes());

        verifying_key
            .verify(&message, &sig)
            .map_err(|_| Status::unauthenticated("Invalid signature"))?;

        Ok(user)
    }
}

/// Map engine errors onto gRPC status codes.
pub fn status_from_engine(e: EngineError) -> Status {
    match e {
        EngineError::BadRequest(msg) => Status::invalid_argument(msg),
        EngineError::Unauthorized(msg) => Status::permission_denied(msg),
        EngineError::Conflict(msg) => Status::already_exists(msg),
        EngineError::Store(StoreError::NotFound) => Status::not_found("not found"),
        EngineError::Store(e) => Status::internal(format!("storage failure: {}", e)),
    }
}

/// Helper function to extract signature metadata from gRPC request headers.
/// Returns (user_id, timestamp, signature, request_hash).
pub fn extract_signature<T>(
    request: &tonic::Request<T>,
) -> Result<(UserId, i64, Vec<u8>, Vec<u8>), Status> {
    let metadata = request.metadata();

    let user_id_str = metadata
        .get("user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Status::unauthenticated("Missing user-id metadata"))?;

    let user_id = uuid::Uuid::parse_str(user_id_str)
        .map(UserId)
        .map_err(|_| Status::unauthenticated("Invalid user-id format"))?;

    let timestamp_str = metadata
        .get("timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Status::unauthenticated("Missing timestamp metadata"))?;

    let timestamp = timestamp_str
        .parse::<i64>()
        .map_err(|_| Status::unauthenticated("Invalid timestamp format"))?;

    let signature_str = metadata
        .get("signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Status::unauthenticated("Missing signature metadata"))?;

    let signature = hex::decode(signature_str)
        .map_err(|_| Status::unauthenticated("Invalid signature format"))?;

    let request_hash_str = metadata
        .get("request-hash")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Status::unauthenticated("Missing request-hash metadata"))?;

    let request_hash = hex::decode(request_hash_str)
        .map_err(|_| Status::unauthenticated("Invalid request-hash format"))?;

    Ok((user_id, timestamp, signature, request_hash))
}
