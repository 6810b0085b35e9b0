//! gRPC handler integration tests, organized by domain.

mod flocks;
mod invites;
mod votes;
