use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use log::{error, info};
use polars::prelude::DataFrame;
use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;
use watertemp::{write_csv, ClientConfig, ErrorKind, LatLon, WaterTemp, WaterTempError};

/// Water temperature readings, reconciled to one per station and day, with weather features.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Folder for cached weather responses. Defaults to the system cache folder.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Override the water temperature endpoint.
    #[arg(long, global = true)]
    water_temp_url: Option<String>,

    /// Timezone the weather APIs report hours in.
    #[arg(long, global = true)]
    timezone: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, reconcile and write readings as CSV.
    Readings {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Drop readings outside 10:00-15:59 before reconciling.
        #[arg(long)]
        midday_window: bool,
        /// Skip writing every validated reading before reconciliation.
        #[arg(long)]
        no_raw: bool,
    },
    /// Reconciled readings joined with archive weather at the nearest hour.
    Features {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        midday_window: bool,
    },
    /// Hourly weather forecast for a location.
    Forecast {
        #[arg(long, requires = "lon", conflicts_with = "place", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Place name to geocode instead of --lat/--lon.
        #[arg(long)]
        place: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the rounded coordinates of a place.
    Locate { place: String },
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Processing => 1,
        ErrorKind::DataUnavailable => 2,
        ErrorKind::Parse => 3,
        ErrorKind::Io => 4,
    }
}

async fn client(cli: &Cli) -> Result<WaterTemp, WaterTempError> {
    let mut config = ClientConfig::default();
    if let Some(url) = &cli.water_temp_url {
        config.water_temp_url = url.clone();
    }
    if let Some(timezone) = &cli.timezone {
        config.timezone = timezone.clone();
    }
    match &cli.cache_dir {
        Some(dir) => WaterTemp::with_cache_folder(dir.clone(), config).await,
        None => WaterTemp::with_config(config).await,
    }
}

async fn run(cli: Cli) -> Result<(), WaterTempError> {
    let client = client(&cli).await?;

    match cli.command {
        Commands::Readings {
            start,
            end,
            out_dir,
            midday_window,
            no_raw,
        } => {
            let written = client
                .export_readings()
                .out_dir(&out_dir)
                .maybe_start(start)
                .maybe_end(end)
                .midday_window(midday_window)
                .include_raw(!no_raw)
                .call()
                .await?;
            for path in written {
                info!("Wrote {}", path.display());
            }
        }
        Commands::Features {
            start,
            end,
            out,
            midday_window,
        } => {
            let features: DataFrame = client
                .historical_features()
                .maybe_start(start)
                .maybe_end(end)
                .midday_window(midday_window)
                .call()
                .await?;
            write_csv(features, &out).await?;
        }
        Commands::Forecast {
            lat,
            lon,
            place,
            out,
        } => {
            let location = match (lat, lon, place) {
                (Some(lat), Some(lon), _) => LatLon(lat, lon),
                (_, _, Some(place)) => client.locate().place(&place).call().await?,
                _ => Cli::command()
                    .error(
                        clap::error::ErrorKind::MissingRequiredArgument,
                        "either --lat and --lon or --place is required",
                    )
                    .exit(),
            };
            let forecast = client
                .weather_forecast()
                .location(location)
                .call()
                .await?
                .collect()?;
            write_csv(forecast, &out).await?;
        }
        Commands::Locate { place } => {
            let location = client.locate().place(&place).call().await?;
            println!("{}", location);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} ({:?})", e, e.kind());
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::from(exit_code(e.kind()))
        }
    }
}
