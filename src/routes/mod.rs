pub mod collaborators;
mod dispatch;
pub mod health;
mod router;

pub use collaborators::{Collaborator, Collaborators, Domain};
pub use dispatch::{strip_mount, MountedAt, RouteTable};
pub use router::create_router;

// Re-export AppState for convenience
pub use crate::state::AppState;
