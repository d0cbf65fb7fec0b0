use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "clipcam")]
#[command(about = "Record camera clips from the command line or a local API", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the recording service and its HTTP API (default)
    Serve,
    /// Record one clip and write it to stdout
    Record(RecordCliArgs),
    /// Show the config file location and effective settings
    Config,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct RecordCliArgs {
    /// Stop after this many seconds (default: wait for Ctrl-C)
    #[arg(short, long)]
    pub seconds: Option<u64>,
    /// Override the configured MIME type (e.g. video/mp4)
    #[arg(long)]
    pub mime_type: Option<String>,
}
