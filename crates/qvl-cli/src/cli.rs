use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "qvl",
    about = "Quorum Validation Layer: validation admission and fork analysis",
    version,
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
    /// Find where two ancestry views diverge
    Mismatch(MismatchArgs),
    /// Validate and summarize a node configuration
    Config(ConfigArgs),
    /// Feed a scenario of validations through a local node
    Replay(ReplayArgs),
}

#[derive(Args)]
pub struct MismatchArgs {
    /// JSON file holding the first view
    pub a: PathBuf,
    /// JSON file holding the second view
    pub b: PathBuf,
}

#[derive(Args)]
pub struct ConfigArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Node configuration (TOML); defaults are used when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Scenario file (JSON)
    pub scenario: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mismatch() {
        let cli = Cli::try_parse_from(["qvl", "mismatch", "a.json", "b.json"]).unwrap();
        if let Command::Mismatch(args) = cli.command {
            assert_eq!(args.a, PathBuf::from("a.json"));
            assert_eq!(args.b, PathBuf::from("b.json"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_config_json() {
        let cli = Cli::try_parse_from(["qvl", "--format", "json", "config", "node.toml"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Config(_)));
    }

    #[test]
    fn parse_replay() {
        let cli =
            Cli::try_parse_from(["qvl", "replay", "-c", "node.toml", "run.json", "-v"]).unwrap();
        assert!(cli.verbose);
        if let Command::Replay(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("node.toml")));
            assert_eq!(args.scenario, PathBuf::from("run.json"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn replay_needs_scenario() {
        assert!(Cli::try_parse_from(["qvl", "replay"]).is_err());
    }
}
