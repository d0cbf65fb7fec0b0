//! API route modules.

pub mod clips;
pub mod recording;
