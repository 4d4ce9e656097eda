use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use stackctl::cli::{Cli, Commands};
use stackctl::commands;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// 128 + SIGINT, as shells report it.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    // Initialize tracing subscriber with env-filter support.
    let default_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(interrupt) => interrupt,
        Err(e) => {
            eprintln!("Error: installing Ctrl+C handler: {}", e);
            std::process::exit(1);
        }
    };
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if interrupt.recv().await.is_some() {
                tracing::info!("interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    // start, restart and build wind down on the token themselves and shell
    // leaves Ctrl+C to the interactive session. Everything else is dropped as
    // soon as Ctrl+C arrives.
    let Cli { global, command } = cli;
    let interruptible = !matches!(
        command,
        Commands::Start | Commands::Restart | Commands::Build | Commands::Shell { .. }
    );
    let config_file = global.config_file.as_deref();
    let dispatch = async {
        match command {
            Commands::Start => commands::lifecycle::start(config_file, cancel.clone()).await,
            Commands::Stop => commands::lifecycle::stop(config_file).await,
            Commands::Restart => commands::lifecycle::restart(config_file, cancel.clone()).await,
            Commands::Logs { service } => {
                commands::logs::run(config_file, service.as_deref()).await
            }
            Commands::Status => commands::status::run(config_file).await,
            Commands::Health => commands::health::run(config_file).await,
            Commands::Shell { service } => commands::shell::run(config_file, &service).await,
            Commands::Build => commands::build::run(config_file, cancel.clone()).await,
            Commands::Clean { yes } => commands::clean::run(config_file, yes).await,
            Commands::Install => commands::install::run(config_file).await,
            Commands::Validate => commands::validate::run(config_file),
            Commands::Doctor => commands::doctor::run(config_file),
            Commands::Completions { shell } => {
                generate(shell, &mut Cli::command(), "stackctl", &mut std::io::stdout());
                Ok(())
            }
        }
    };

    let result = if !interruptible {
        dispatch.await
    } else {
        let interrupted = tokio::select! {
            result = dispatch => Some(result),
            _ = cancel.cancelled() => None,
        };
        match interrupted {
            Some(result) => result,
            None => {
                eprintln!("Interrupted");
                std::process::exit(EXIT_INTERRUPTED);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
