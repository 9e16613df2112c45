//! Per-connection session state

pub mod context;
pub mod state;

pub use context::SessionContext;
pub use state::{BindingConflict, SessionPhase, SessionState};
