use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todo_client::services::SessionController;
use todo_client::services::rollover::DEFAULT_INTERVAL_SECS;
use todo_client::shell::{Flow, Shell};
use todo_client::state::AppState;
use todo_client::supabase::{MemoryBackend, SupabaseConfig, SupabaseHttpClient};

#[derive(Parser, Debug)]
#[command(version, about = "Terminal to-do list backed by Supabase")]
struct Cli {
    /// Keep accounts and tasks in memory instead of talking to Supabase
    #[arg(long)]
    offline: bool,

    /// Seconds between checks for a new calendar day
    #[arg(long, env = "ROLLOVER_INTERVAL_SECS", default_value_t = DEFAULT_INTERVAL_SECS)]
    rollover_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "todo_client=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let state = if cli.offline {
        info!("Running offline; nothing will be saved");
        AppState::memory(Arc::new(MemoryBackend::new()))
    } else {
        let client = SupabaseConfig::new_from_env().and_then(SupabaseHttpClient::new);
        match client {
            Ok(client) => AppState::supabase(client),
            Err(e) => {
                println!("{}", e.notification().message);
                return Err(e.into());
            }
        }
    };

    let mut sessions = state.auth.subscribe();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut shell = Shell::new(SessionController::new(state, events_tx), cli.rollover_secs);

    if let Err(e) = shell.start().await {
        println!("{}", e.notification().message);
        if e.is_fatal() {
            error!("Backend not reachable, exiting");
            return Err(e.into());
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    shell.prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if shell.handle_line(&line).await == Flow::Quit {
                    break;
                }
                shell.prompt();
            }
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                let session = sessions.borrow_and_update().clone();
                shell.handle_session(session).await;
                shell.prompt();
            }
            Some(event) = events_rx.recv() => {
                shell.handle_event(event);
                shell.prompt();
            }
        }
    }

    info!("Goodbye");
    Ok(())
}
