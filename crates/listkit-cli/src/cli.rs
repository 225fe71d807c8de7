use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "listkit",
    about = "Diff list snapshots and replay them through a coalescing updater",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the edit script between two snapshots
    Diff(DiffArgs),
    /// Submit consecutive snapshots to an updater and show what the view received
    Simulate(SimulateArgs),
}

#[derive(Args)]
pub struct DiffArgs {
    pub before: PathBuf,
    pub after: PathBuf,
    /// Treat both files as sectioned snapshots
    #[arg(long)]
    pub sections: bool,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Snapshots in submission order; the first is the initial state
    #[arg(required = true, num_args = 2..)]
    pub snapshots: Vec<PathBuf>,
    /// Updater configuration (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
