mod calc;
mod config;
mod db;
mod ipc;

use std::io::{self, BufRead, Write};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GRADESYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let config = config::Config::from_env()?;
    info!(
        max_achievable = config.max_achievable,
        default_target = config.default_target_grade,
        "gradesyncd starting"
    );

    let workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    if let Some(path) = workspace {
        if let Err(e) = ipc::select_workspace(&mut state, &path) {
            error!(workspace = %path.display(), error = ?e, "startup workspace could not be opened");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                writeln!(stdout, "{}", resp)?;
                stdout.flush()?;
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        writeln!(stdout, "{}", resp)?;
        stdout.flush()?;
    }

    info!("stdin closed; exiting");
    Ok(())
}
