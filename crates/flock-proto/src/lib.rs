//! Generated gRPC types for the flock service.
//!
//! All authentication is handled via request metadata (Ed25519 signatures);
//! see the server crate for the verification scheme.

// Include the generated proto code
tonic::include_proto!("flock");
