//! Services shared by the client and the session context.

pub mod refresh_coordinator;

pub use refresh_coordinator::RefreshCoordinator;
