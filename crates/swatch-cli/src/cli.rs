use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use swatch_core::models::SnapshotKind;

#[derive(Parser, Debug)]
#[command(
    name = "swatch",
    version,
    about = "Design-system console: live tokens, surface policy, smoke QA and safety boot"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "More log output (-v debug, -vv trace); RUST_LOG overrides"
    )]
    pub verbose: u8,
    #[arg(long, global = true, help = "Config file to use instead of the user config")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read and write design tokens.
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Check which tokens components consume.
    Surface {
        #[command(subcommand)]
        command: SurfaceCommands,
    },
    /// Run the smoke suite.
    Qa {
        #[command(subcommand)]
        command: QaCommands,
    },
    /// Save, publish and inspect snapshots.
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Run the safety boot: smoke suite, then recovery from published
    /// snapshots if it fails.
    Boot {
        #[arg(long, help = "Wait for the post-recovery re-check and print it")]
        wait_recheck: bool,
    },
    /// Configuration, remote store and project summary.
    Status,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    List,
    Get {
        #[arg(allow_hyphen_values = true, help = "Token name, with or without the leading --")]
        name: String,
    },
    Set {
        #[arg(allow_hyphen_values = true)]
        name: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Restore the default token map.
    Reset,
    /// Print the rendered token values.
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Css)]
        format: ExportFormat,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Css,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum SurfaceCommands {
    /// Analyze one component source file.
    Check { component: String, file: PathBuf },
    /// Analyze every component source under a directory.
    Scan { dir: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum QaCommands {
    Run,
    /// Recent smoke audits (SQLite store only).
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Capture the current state of `kind`.
    Save {
        kind: SnapshotKind,
        #[arg(long)]
        label: Option<String>,
    },
    /// Mark a snapshot as the known-good state of `kind`.
    Publish { kind: SnapshotKind, id: String },
    /// Show the published snapshot id of `kind`.
    Published { kind: SnapshotKind },
    /// Show the most recent snapshot of `kind`.
    Latest { kind: SnapshotKind },
    /// List recent snapshots of `kind`, newest first.
    List {
        kind: SnapshotKind,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

/// `color-bg` and `--color-bg` name the same token.
pub fn token_name(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("--") {
        raw.to_string()
    } else {
        format!("--{}", raw.trim_start_matches('-'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_token_name_adds_prefix() {
        assert_eq!(token_name("color-bg"), "--color-bg");
        assert_eq!(token_name("--color-bg"), "--color-bg");
        assert_eq!(token_name(" -space-md "), "--space-md");
    }

    #[test]
    fn test_parse_snapshot_kind() {
        let cli = Cli::try_parse_from(["swatch", "snapshot", "save", "app-state", "--label", "v1"])
            .unwrap();
        match cli.command {
            Commands::Snapshot {
                command: SnapshotCommands::Save { kind, label },
            } => {
                assert_eq!(kind, SnapshotKind::AppState);
                assert_eq!(label.as_deref(), Some("v1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_negative_dimension() {
        let cli = Cli::try_parse_from(["swatch", "tokens", "set", "space-md", "-4px"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tokens {
                command: TokenCommands::Set { ref value, .. }
            } if value == "-4px"
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["swatch", "qa", "run", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }
}
