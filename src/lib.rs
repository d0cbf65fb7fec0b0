pub mod api;
pub mod app;
pub mod capture;
pub mod cli;
pub mod config;
pub mod global;
pub mod hooks;
pub mod preview;
pub mod recorder;
pub mod session;
