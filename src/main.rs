mod history;
mod playback;
mod web;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::history::FileHistorySource;
use crate::playback::{parse_instant, resolve, WindowData};
use crate::web::Config;

#[derive(Parser)]
#[command(name = "boatwatch")]
#[command(about = "Live and historical fleet position playback")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the playback engine and HTTP API
    Serve {
        #[arg(short, long, default_value = "boatwatch.yaml")]
        config: String,
    },
    /// Validate an exported sample log
    Validate { samples: PathBuf },
    /// Print every unit's position at one instant of a sample log
    Replay {
        samples: PathBuf,
        /// RFC3339, T+<duration> from the first sample or T-<duration> from the last
        #[arg(long)]
        at: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(&config).await,
        Commands::Validate { samples } => validate(samples),
        Commands::Replay { samples, at } => replay(samples, &at),
    }
}

async fn serve(path: &str) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match web::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: PathBuf) -> Option<WindowData> {
    let source = FileHistorySource::new(path);
    match source.load_all().and_then(WindowData::from_log) {
        Ok(data) => Some(data),
        Err(e) => {
            eprintln!("Error loading {}: {}", source.path().display(), e);
            None
        }
    }
}

fn validate(path: PathBuf) -> ExitCode {
    let Some(data) = load(path) else {
        return ExitCode::FAILURE;
    };

    println!(
        "Sample log is valid ({} samples, {} units)",
        data.sample_count(),
        data.series.len()
    );
    for (unit, series) in &data.series {
        match series.span() {
            Some(span) => println!(
                "  {}: {} samples, {} .. {}",
                unit,
                series.len(),
                span.start.to_rfc3339(),
                span.end.to_rfc3339()
            ),
            None => println!("  {}: no samples", unit),
        }
    }
    ExitCode::SUCCESS
}

fn replay(path: PathBuf, at: &str) -> ExitCode {
    let Some(data) = load(path) else {
        return ExitCode::FAILURE;
    };
    let Some(span) = data.window else {
        eprintln!("Sample log is empty");
        return ExitCode::FAILURE;
    };
    let instant = match parse_instant(at, span) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Positions at {}", instant.to_rfc3339());
    for (unit, series) in &data.series {
        match resolve(series, instant) {
            Some(snapshot) => println!(
                "  {}: {:.6}, {:.6} heading {:.0} speed {:.1} ({})",
                unit,
                snapshot.position.lat,
                snapshot.position.lon,
                snapshot.heading,
                snapshot.speed,
                snapshot.source
            ),
            None => println!("  {}: not recorded", unit),
        }
    }
    ExitCode::SUCCESS
}
