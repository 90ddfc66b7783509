use anyhow::{Context, Result};
use termdeck::app::App;
use termdeck::cli::{self, Commands};
use termdeck::config::Config;

fn main() -> Result<()> {
    // Process CLI arguments first (before logging init for cleaner output)
    let options = cli::process_cli();

    // CLI --log-level flag takes highest precedence, then RUST_LOG, then config
    termdeck::debug::init_log_bridge(options.log_level);

    let config = match &options.config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    termdeck::debug::apply_config_level(&config.log_level);

    log::info!("Starting termdeck {}", termdeck::VERSION);

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(async move {
        let app = App::new(config);
        match options.command {
            Commands::Serve { socket } => app.serve(socket).await,
            Commands::List => {
                let sessions = app.list_sessions().await?;
                if sessions.is_empty() {
                    println!("No sessions");
                }
                for (backend, info) in sessions {
                    println!(
                        "{}\t{}\t{}\t{}",
                        backend,
                        info.key,
                        info.pane_id,
                        if info.attached { "attached" } else { "detached" }
                    );
                }
                Ok(())
            }
            Commands::KillOrphans => {
                let report = app.kill_orphans().await;
                for key in &report.orphans_killed {
                    println!("killed {}", key);
                }
                for key in &report.failed {
                    eprintln!("failed {}", key);
                }
                if report.failed.is_empty() {
                    Ok(())
                } else {
                    anyhow::bail!("{} session(s) could not be killed", report.failed.len())
                }
            }
        }
    });

    // Don't wait forever on a stuck backend task
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    if let Err(ref e) = result {
        eprintln!("termdeck: error: {e:#}");
    }
    result
}
