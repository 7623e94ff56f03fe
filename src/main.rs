use anyhow::{Context, Result};
use clap::Parser;
use speedprobe::app::{format_speed, run_speed_test, RunState, TestUpdate};
use speedprobe::{HttpTransport, Settings, SpeedTestEngine, TestPhase};
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[clap(version, about = "Measure latency, jitter and throughput of your connection")]
struct Cli {
    /// TOML file overriding the default endpoints and sizes
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the final result as JSON
    #[arg(long)]
    json: bool,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let transport = HttpTransport::new(&settings).context("building HTTP client")?;
    let engine = SpeedTestEngine::new(transport, settings);

    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel(32);
    let runner = tokio::spawn(async move { run_speed_test(&engine, tx).await });

    let mut state = RunState::default();
    while let Some(update) = rx.recv().await {
        state.apply(&update);
        if !cli.json {
            print_update(&update, &state);
        }
    }

    match runner.await? {
        Some(result) if cli.json => println!("{}", serde_json::to_string_pretty(&result)?),
        Some(_) => {
            if let Some(error) = &state.error {
                eprintln!("warning: {}", error);
            }
        }
        None => {
            eprintln!("Speed test cancelled");
            std::process::exit(130);
        }
    }
    Ok(())
}

fn print_update(update: &TestUpdate, state: &RunState) {
    match update {
        TestUpdate::Phase { phase, .. } => match phase {
            TestPhase::Ping => println!("Measuring ping..."),
            TestPhase::Jitter => println!("Measuring jitter..."),
            TestPhase::Download => println!("Measuring download speed..."),
            TestPhase::Upload => println!("Measuring upload speed..."),
            TestPhase::Idle | TestPhase::Complete => {}
        },
        TestUpdate::PingComplete { ping_ms } => println!("  Ping:     {:.1} ms", ping_ms),
        TestUpdate::JitterComplete { jitter_ms } => println!("  Jitter:   {:.1} ms", jitter_ms),
        TestUpdate::DownloadProgress { speed_mbps } | TestUpdate::UploadProgress { speed_mbps } => {
            println!(
                "  {:>3.0}%  {}",
                state.progress * 100.0,
                format_speed(*speed_mbps)
            )
        }
        TestUpdate::DownloadComplete { speed_mbps } => {
            println!("  Download: {}", format_speed(*speed_mbps))
        }
        TestUpdate::UploadComplete { speed_mbps } => {
            println!("  Upload:   {}", format_speed(*speed_mbps))
        }
        TestUpdate::PhaseFailed { phase, reason } => eprintln!("  {:?} failed: {}", phase, reason),
        TestUpdate::Cancelled => {}
        TestUpdate::Finished(result) => println!(
            "Done: ping {:.1} ms, jitter {:.1} ms, down {}, up {}",
            result.ping_ms,
            result.jitter_ms,
            format_speed(result.download_mbps),
            format_speed(result.upload_mbps)
        ),
    }
}
