use clap::{Args, Parser, Subcommand};
use clap_complete::aot::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "stackctl",
    version,
    about = "Start, stop, health-check and redeploy a local service stack"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Use a specific config file
    #[arg(short = 'f', long = "file", global = true, env = "STACKCTL_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start every service, database first
    Start,
    /// Stop every service in reverse order
    Stop,
    /// Stop, then start
    Restart,
    /// Follow logs of one service or the whole stack
    Logs {
        /// Service to follow (all when omitted)
        service: Option<String>,
    },
    /// Show running/stopped state per service
    #[command(alias = "ps")]
    Status,
    /// Probe every service once and report
    Health,
    /// Open a shell inside a running container service
    Shell {
        /// Container service name
        service: String,
    },
    /// Build images and redeploy the stack
    Build,
    /// Remove containers, volumes, processes and logs
    Clean {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Run each service's install command
    Install,
    /// Validate the configuration file
    Validate,
    /// Check that docker, docker compose and curl are installed
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ps_is_an_alias_for_status() {
        let cli = Cli::try_parse_from(["stackctl", "ps"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn shell_requires_a_service() {
        assert!(Cli::try_parse_from(["stackctl", "shell"]).is_err());
        let cli = Cli::try_parse_from(["stackctl", "shell", "database"]).unwrap();
        assert!(matches!(cli.command, Commands::Shell { service } if service == "database"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stackctl", "clean", "--yes", "-f", "stack.toml", "-v"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Clean { yes: true }));
        assert_eq!(cli.global.config_file, Some(PathBuf::from("stack.toml")));
        assert!(cli.global.verbose);
    }
}
