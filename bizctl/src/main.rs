use clap::Parser;
use bizctl::{
    Application, Config,
    config::{Args, Command},
    diagnostics, telemetry,
};

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before anything that might build a TLS client
    bizctl::install_crypto_provider();

    let args = Args::parse();

    // check-env inspects the raw environment and must work even when the config would not load
    if args.command == Some(Command::CheckEnv) {
        std::process::exit(diagnostics::env::run_check_env());
    }

    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            telemetry::init_telemetry(config.enable_otel_export)?;
            tracing::debug!("{:?}", args.config);

            Application::new(config).await?.serve(shutdown_signal()).await
        }
        Command::Db { command } => {
            let code = diagnostics::run_db(&config, &command).await?;
            std::process::exit(code);
        }
        Command::SmtpTest { to } => {
            let code = diagnostics::run_smtp_test(&config, &to).await?;
            std::process::exit(code);
        }
        Command::CheckEnv => std::process::exit(diagnostics::env::run_check_env()),
    }
}
