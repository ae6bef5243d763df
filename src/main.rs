use std::sync::Arc;

use clap::{Parser, Subcommand};

use pumpmon_service::client::StatusClient;
use pumpmon_service::config::{Config, DEFAULT_CONFIG_PATH};
use pumpmon_service::db::Database;
use pumpmon_service::dev_mode::FixtureSource;
use pumpmon_service::logging::{self, DataSource};
use pumpmon_service::model::{LiveReading, StatusError, StatusSummary};
use pumpmon_service::pipeline::StatusPipeline;
use pumpmon_service::poller::{ConsumerView, PollSettings, spawn_poller};
use pumpmon_service::server::{self, AppState};
use pumpmon_service::source::TelemetrySource;
use pumpmon_service::source::pg::PgTelemetrySource;
use pumpmon_service::verify;

#[derive(Parser)]
#[command(name = "pumpmon")]
#[command(about = "Pump-station fleet status service", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the status API
    Serve,

    /// Poll a running service and print what a dashboard would show
    Watch {
        /// Service root, e.g. http://localhost:8080
        #[arg(long, default_value = "http://localhost:8080")]
        base_url: String,

        /// Also follow one station's live row
        #[arg(long)]
        station: Option<String>,
    },

    /// Check roster coverage of the configured telemetry source
    Verify,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    logging::init_logger(config.logging.level, config.logging.file.as_deref(), config.logging.json)?;

    match cli.command {
        Commands::Serve => {
            let pipeline = build_pipeline(&config)?;
            let state = Arc::new(AppState::new(pipeline));
            server::serve(&config.server.bind, state).await?;
        }
        Commands::Watch { base_url, station } => watch(&config, &base_url, station).await?,
        Commands::Verify => {
            let (source, origin) = build_source(&config)?;
            let keys = config.parameters.clone();
            let report = tokio::task::spawn_blocking(move || {
                verify::run_verification(source.as_ref(), &keys, origin)
            })
            .await??;
            verify::print_summary(&report);
        }
    }
    Ok(())
}

fn build_source(config: &Config) -> Result<(Arc<dyn TelemetrySource>, DataSource), StatusError> {
    match &config.dev_mode {
        Some(dev) => {
            logging::info(
                DataSource::Fixture,
                None,
                &format!("dev mode: serving fixture {}", dev.fixture),
            );
            let source = FixtureSource::load(&dev.fixture, dev.rebase_to_now)?;
            Ok((Arc::new(source), DataSource::Fixture))
        }
        None => {
            let db = Database::new(config.database.clone());
            // Startup check only; the service still starts and reports 500s until the schema exists.
            match db.connect_and_verify(&["telemetry"]) {
                Ok(session) => session.release()?,
                Err(e) => logging::log_source_failure(DataSource::Database, None, "schema check", &e),
            }
            Ok((Arc::new(PgTelemetrySource::new(db)), DataSource::Database))
        }
    }
}

fn build_pipeline(config: &Config) -> Result<StatusPipeline, StatusError> {
    let (source, origin) = build_source(config)?;
    Ok(StatusPipeline::new(
        source,
        origin,
        config.parameters.clone(),
        config.freshness,
    ))
}

async fn watch(config: &Config, base_url: &str, station: Option<String>) -> Result<(), StatusError> {
    let client = StatusClient::new(base_url, config.polling.fetch_timeout())?;

    let summary_client = client.clone();
    let mut summary = spawn_poller(
        "summary",
        PollSettings {
            interval: config.polling.summary_interval(),
            fetch_timeout: config.polling.fetch_timeout(),
        },
        move || {
            let client = summary_client.clone();
            async move { client.fetch_status().await }
        },
    );

    let mut live = station.map(|id| {
        let client = client.clone();
        spawn_poller(
            format!("live {}", id),
            PollSettings {
                interval: config.polling.live_interval(),
                fetch_timeout: config.polling.fetch_timeout(),
            },
            move || {
                let client = client.clone();
                let id = id.clone();
                async move { client.fetch_live(&id).await }
            },
        )
    });

    loop {
        tokio::select! {
            changed = summary.changed() => {
                changed?;
                print_summary_view(&summary.view());
            }
            Some(changed) = async {
                match live.as_mut() {
                    Some(handle) => Some(handle.changed().await),
                    None => None,
                }
            } => {
                changed?;
                if let Some(handle) = live.as_ref() {
                    print_live_view(&handle.view());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                logging::info(DataSource::Poller, None, "stopping watch");
                break;
            }
        }
    }

    summary.shutdown();
    if let Some(handle) = live {
        handle.shutdown();
    }
    Ok(())
}

fn print_summary_view(view: &ConsumerView<StatusSummary>) {
    let marker = if view.stale { " (stale)" } else { "" };
    match &view.latest {
        Some(s) => println!(
            "[#{}]{} total {} | active {} inactive {} | power ok {} fail {} | auto {} manual {} | pump on {} off {} | trip {}",
            view.applied_seq,
            marker,
            s.total_stations,
            s.active_stations,
            s.inactive_stations,
            s.power_available,
            s.power_failed,
            s.auto_mode,
            s.manual_mode,
            s.pumps_on,
            s.pumps_off,
            s.trip_sites,
        ),
        None => println!("[summary] no data yet{}", marker),
    }
}

fn print_live_view(view: &ConsumerView<Vec<LiveReading>>) {
    let marker = if view.stale { " (stale)" } else { "" };
    match view.latest.as_ref().and_then(|rows| rows.first()) {
        Some(reading) => {
            let params: Vec<String> = reading
                .parameters
                .iter()
                .map(|(code, value)| format!("{}={}", code, value))
                .collect();
            println!(
                "[{} @ {}]{} {}",
                reading.station_id,
                reading.timestamp.to_rfc3339(),
                marker,
                params.join(" ")
            );
        }
        None => println!("[live] no reading{}", marker),
    }
}
