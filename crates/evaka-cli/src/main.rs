//! evaka-calendar - daycare calendar from the eVaka citizen portal.
//!
//! Commands:
//! - `setup [municipality] [username]`: verify the account and store it
//! - `run`: keep the calendar fresh, printing a status line per refresh
//! - `events`, `today`, `week`: refresh once and print

mod cache;
mod config;
mod keychain;
mod render;

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use evaka_core::calendar::local_today;
use evaka_core::{CalendarFetcher, CalendarSnapshot, PollState, PollingScheduler};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cache::CacheManager;
use config::{env_password, Config};
use keychain::CredentialStore;

/// Default log filter: quiet dependencies, informative own crates
const DEFAULT_LOG_FILTER: &str = "warn,evaka_core=info,evaka_calendar=info";

/// Returns the guard that flushes the log file, when file logging is on.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match std::env::var_os("EVAKA_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "evaka-calendar.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("week");
    let rest = args.get(2..).unwrap_or_default();

    match command {
        "setup" => setup(rest).await,
        "run" => run().await,
        "events" => {
            let snapshot = refresh_once().await?;
            println!("{}", render::events_listing(&snapshot));
            Ok(())
        }
        "today" => {
            let snapshot = refresh_once().await?;
            println!("{}", render::today_text(&snapshot, local_today()));
            Ok(())
        }
        "week" => {
            let snapshot = refresh_once().await?;
            print!("{}", render::week_text(&snapshot, local_today()));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}")
        }
    }
}

fn print_usage() {
    println!("Usage: evaka-calendar <command>");
    println!();
    println!("  setup [municipality] [username]  Verify and store the eVaka account");
    println!("  run                              Refresh hourly until Ctrl-C");
    println!("  events                           List fetched events");
    println!("  today                            Today's schedule");
    println!("  week                             Next daycare day and two-week overview");
    println!();
    println!("Municipalities: espoo, oulu, tampere, turku");
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn setup(args: &[String]) -> Result<()> {
    let mut config = Config::load()?;
    let previous = config.account().ok();

    let municipality = match args.first().or(config.municipality.as_ref()) {
        Some(m) => m.clone(),
        None => prompt("Municipality (espoo/oulu/tampere/turku)")?,
    };
    let username = match args.get(1) {
        Some(u) => u.clone(),
        None => prompt("Username (email)")?,
    };
    let password = match env_password() {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let fetcher = match evaka_core::connect(&municipality, &username, &password, config.base_url.as_deref()).await {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("Setup failed ({}): {}", e.key(), e);
            return Err(e).context("Account could not be verified");
        }
    };

    let municipality = fetcher.municipality();
    let username = fetcher.guard().credentials().username.clone();

    if let Err(e) = CredentialStore::store(municipality.id(), &username, &password) {
        warn!(error = %e, "Password not stored; set EVAKA_PASSWORD for later runs");
    }
    if let Some(old) = previous.filter(|old| !old.is_same_account(municipality.id(), &username)) {
        if let Err(e) = CredentialStore::delete(&old.municipality, &old.username) {
            debug!(error = %e, "No stored password for the previous account");
        }
    }

    config.municipality = Some(municipality.id().to_string());
    config.username = Some(username);
    config.save().context("Failed to save config")?;
    println!("Account verified for {}", municipality.display_name());

    let snapshot = poll_once(fetcher).await?;
    println!("{}", render::status_line(&snapshot, Utc::now()));
    Ok(())
}

/// Build a client from the stored configuration. The first fetch logs in.
fn open_client() -> Result<CalendarFetcher> {
    let account = Config::load()?.account()?;
    let password = match env_password() {
        Some(p) => p,
        None => CredentialStore::get_password(&account.municipality, &account.username)
            .context("No stored password, run setup again")?,
    };
    evaka_core::from_stored(
        &account.municipality,
        &account.username,
        &password,
        account.base_url.as_deref(),
    )
    .context("Invalid account configuration")
}

fn cache_manager() -> Result<CacheManager> {
    CacheManager::new(Config::cache_dir()?)
}

async fn refresh_once() -> Result<CalendarSnapshot> {
    let snapshot = poll_once(open_client()?).await?;
    if snapshot.is_stale() || !snapshot.has_data() {
        eprintln!("{}", render::status_line(&snapshot, Utc::now()));
    }
    Ok(snapshot)
}

/// Run exactly one cycle on a poller seeded from the cache, then stop it.
async fn poll_once(fetcher: CalendarFetcher) -> Result<CalendarSnapshot> {
    let cache = cache_manager()?;
    let username = fetcher.guard().credentials().username.clone();
    let initial = cache.restore_snapshot(fetcher.municipality(), &username);
    let handle = PollingScheduler::spawn(fetcher, initial);

    let mut rx = handle.subscribe();
    let snapshot = rx
        .wait_for(|s| matches!(s.state, PollState::Published | PollState::Failed))
        .await
        .context("Calendar poller stopped unexpectedly")?
        .clone();
    handle.shutdown().await?;

    if snapshot.state == PollState::Published {
        if let Err(e) = cache.save_snapshot(&snapshot, &username) {
            warn!(error = %e, "Failed to write event cache");
        }
    }
    Ok(snapshot)
}

async fn run() -> Result<()> {
    let fetcher = open_client()?;
    let cache = cache_manager()?;
    let username = fetcher.guard().credentials().username.clone();
    let initial = cache.restore_snapshot(fetcher.municipality(), &username);
    if initial.has_data() {
        println!("{}", render::status_line(&initial, Utc::now()));
    }

    info!(municipality = %fetcher.municipality(), "Starting calendar refresh loop");
    let handle = PollingScheduler::spawn(fetcher, initial);
    let mut rx = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                match snapshot.state {
                    PollState::Published => {
                        if let Err(e) = cache.save_snapshot(&snapshot, &username) {
                            warn!(error = %e, "Failed to write event cache");
                        }
                        println!("{}", render::status_line(&snapshot, Utc::now()));
                    }
                    PollState::Failed => println!("{}", render::status_line(&snapshot, Utc::now())),
                    PollState::Idle | PollState::Fetching => {}
                }
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}
