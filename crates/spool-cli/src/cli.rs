use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "spool",
    about = "Spool: inspect and maintain offline envelope storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage directory to operate on
    #[arg(long, global = true, conflicts_with = "config")]
    pub dir: Option<PathBuf>,

    /// Transport config file naming the storage directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

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
    /// Show record count and size of the storage directory
    Status,
    /// List staged envelopes, oldest first
    List(ListArgs),
    /// Show headers and items of one staged envelope
    Show(ShowArgs),
    /// Load every record, deleting the ones that cannot be read
    Verify,
    /// Delete one staged envelope
    Remove(RemoveArgs),
    /// Delete every staged envelope
    Purge(PurgeArgs),
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub address: String,
}

#[derive(Args)]
pub struct RemoveArgs {
    pub address: String,
}

#[derive(Args)]
pub struct PurgeArgs {
    /// Confirm deletion
    #[arg(long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["spool", "list", "--dir", "/tmp/s", "--format", "json", "-n", "3"])
            .unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/s")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::List(ListArgs { limit: Some(3) })));
    }

    #[test]
    fn dir_and_config_conflict() {
        let result = Cli::try_parse_from(["spool", "status", "--dir", "a", "--config", "b.toml"]);
        assert!(result.is_err());
    }
}
