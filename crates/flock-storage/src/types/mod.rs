//! Row and parameter types shared by storage backends and the engine.

mod actions;
mod flocks;
mod ids;
mod posts;
mod users;

pub use actions::*;
pub use flocks::*;
pub use ids::*;
pub use posts::*;
pub use users::*;
