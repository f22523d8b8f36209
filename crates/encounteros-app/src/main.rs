//! EncounterOS entry point.
//!
//! `encounteros controller` runs the GM side; `encounteros display` runs the
//! player-facing side. Both read input lines from stdin: a key chord such
//! as `F5`, or a forwarded-input JSON object. The display also accepts a
//! `{"preferences": {...}}` line.

use std::error::Error;

use encounteros_app::config::AppConfig;
use encounteros_app::controller::Controller;
use encounteros_app::display::Display;
use encounteros_app::error::AppError;
use encounteros_app::input_line::InputReader;
use encounteros_app::state::AppState;
use encounteros_core::rng::SystemRng;
use encounteros_input::application::router::Role;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let role = std::env::args()
        .nth(1)
        .ok_or_else(|| AppError::Config("usage: encounteros <controller|display>".into()))?
        .parse::<Role>()
        .map_err(|e| AppError::Config(e.to_string()))?;
    let config = AppConfig::from_env(role)?;

    tracing::info!(
        %role,
        data_dir = %config.data_dir.display(),
        process_name = %config.process_name,
        "Starting EncounterOS"
    );

    let app = AppState::from_config(config)?;
    match role {
        Role::Controller => run_controller(app).await?,
        Role::Display => run_display(app).await?,
    }

    tracing::info!("EncounterOS stopped");
    Ok(())
}

async fn run_controller(app: AppState) -> Result<(), AppError> {
    let mut interval = tokio::time::interval(app.config.poll_interval);
    let mut controller = Controller::start(app, Box::new(SystemRng::new())).await?;
    let mut lines = InputReader::new(tokio::io::stdin());
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = controller.drain_commands().await {
                    tracing::warn!(error = %e, "command queue drain failed");
                }
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = read_or_close(line, &mut stdin_open) else {
                    continue;
                };
                match controller.handle_input_line(&line).await {
                    Ok(Some(committed)) => {
                        tracing::info!(revision = committed.revision, "input applied");
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "input rejected"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn run_display(app: AppState) -> Result<(), AppError> {
    let mut interval = tokio::time::interval(app.config.poll_interval);
    let mut display = Display::start(app).await?;
    let mut lines = InputReader::new(tokio::io::stdin());
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if display.tick().await {
                    println!("{}", display.render());
                }
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = read_or_close(line, &mut stdin_open) else {
                    continue;
                };
                if let Err(e) = display.handle_input_line(&line).await {
                    tracing::warn!(error = %e, "input not relayed");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Unwraps a read; end of input or a read error stops reading stdin
/// without stopping the process.
fn read_or_close(line: std::io::Result<Option<String>>, stdin_open: &mut bool) -> Option<String> {
    match line {
        Ok(Some(line)) => Some(line),
        Ok(None) => {
            *stdin_open = false;
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "stdin unreadable, input disabled");
            *stdin_open = false;
            None
        }
    }
}
