use clap::Parser;
use std::path::PathBuf;

/// Run a Weave script.
#[derive(Clone, Parser)]
#[clap(name = "weave", bin_name = "weave", version)]
pub struct WeaveArgs {
    /// Path to the script to run.
    pub script: PathBuf,

    /// Override the executor's safety counter.
    #[clap(long)]
    pub max_steps: Option<u64>,

    /// Raise the log filter to `trace` regardless of `RUST_LOG`.
    #[clap(long)]
    pub trace: bool,

    /// Drop into a line-oriented REPL after the script finishes.
    #[clap(short, long)]
    pub interactive: bool,
}
