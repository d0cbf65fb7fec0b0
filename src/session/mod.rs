//! Recording sessions: one start→stop cycle of fragments and its final clip.

pub mod session_controller;
pub mod status;

pub use session_controller::{SessionController, SessionOptions, StartOutcome, StopOutcome};
pub use status::{SessionPhase, SessionStatus, SessionStatusHandle};
