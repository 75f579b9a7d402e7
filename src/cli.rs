use crate::backend::DEFAULT_SERVER;
use clap::Parser;
use std::path::PathBuf;

/// repopick – pick repository files and copy their merged contents to the clipboard
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the repository server
    #[arg(long, env = "REPOPICK_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Branch to pull when updating the repository
    #[arg(long, env = "REPOPICK_BRANCH")]
    pub branch: Option<String>,

    /// Directory to scan for the file tree (ignored when --tree is given)
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Read the file tree from a JSON file instead of scanning
    #[arg(long, value_name = "FILE")]
    pub tree: Option<PathBuf>,

    /// Include files ignored by .gitignore when scanning
    #[arg(long)]
    pub include_ignored: bool,

    /// Where usage counters and saved groups are kept
    #[arg(long, env = "REPOPICK_STATE_DIR", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Keep counters and groups in memory only
    #[arg(long)]
    pub no_persist: bool,

    /// Paths to start with selected. Can be given multiple times.
    #[arg(long, value_name = "PATH")]
    pub select: Vec<String>,

    /// Run without the TUI: copy the --select paths (or --group) and exit.
    #[arg(long)]
    pub headless: bool,

    /// Saved group to select (headless mode)
    #[arg(long, value_name = "NAME", requires = "headless")]
    pub group: Option<String>,

    /// Update the repository instead of copying (headless mode)
    #[arg(long, requires = "headless")]
    pub update: bool,
}
