use clap::Parser;
use idawatch::config::env_loader::load_config;
use idawatch::config::model::Config;
use idawatch::email::smtp::SmtpNotifier;
use idawatch::ida::api::IdaSearchAPI;
use idawatch::logging::{setup_loki, shutdown_loki};
use idawatch::seen_store::SeenStore;
use idawatch::watcher::{send_now, Watcher};
use std::process::ExitCode;
use tracing::{error, info};

/// Watches IDA events in København and emails new ones
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Email every current event once and exit, without touching the seen events
    #[arg(long)]
    send_now: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    let loki = setup_loki().await;

    let exit_code = match load_config() {
        Ok(config) => run(args, &config).await,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            ExitCode::FAILURE
        }
    };

    shutdown_loki(loki).await;

    exit_code
}

async fn run(args: Args, config: &Config) -> ExitCode {
    let api = match IdaSearchAPI::new(&config.search) {
        Ok(api) => api,
        Err(err) => {
            error!("Could not create the search client: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let notifier = match SmtpNotifier::new(&config.smtp, &config.mail) {
        Ok(notifier) => notifier,
        Err(err) => {
            error!("Could not create the mail transport: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if args.send_now {
        return match send_now(&api, &notifier).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                error!("Sending current events failed: {}", err);
                ExitCode::FAILURE
            }
        };
    }

    let store = SeenStore::new(config.state_file.clone());
    let handle = Watcher::new(api, notifier, store, config.poll_interval).start();

    shutdown_signal().await;
    info!("Shutdown requested");

    match handle.stop().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Watcher did not stop cleanly: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed listening for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed listening for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
