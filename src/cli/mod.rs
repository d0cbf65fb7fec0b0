pub mod args;
pub mod config;
pub mod record;

pub use args::{Cli, CliCommand, RecordCliArgs};
pub use config::handle_config_command;
pub use record::handle_record_command;
