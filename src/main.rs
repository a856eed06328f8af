use anyhow::{Context, Result};
use clap::Parser;
use neo::config::{NeoConfig, TtsBackendKind};
use neo::coordinator::Assistant;
use neo::setup::build_collaborators;
use neo::ui::spawn_stdin_reader;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Neo voice assistant
#[derive(Parser, Debug)]
#[command(name = "neo", version, about)]
struct Args {
    /// Configuration file (defaults to <config dir>/neo/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Typed input only; do not open the microphone
    #[arg(long)]
    no_voice: bool,

    /// Do not listen for the SIGUSR1 hotkey
    #[arg(long)]
    no_hotkey: bool,

    /// Override the generation deadline
    #[arg(long, value_name = "SECS")]
    generation_timeout_secs: Option<u64>,

    /// Print replies instead of speaking them
    #[arg(long)]
    console_tts: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neo=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = NeoConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    if args.no_voice {
        config = config.without_voice_input();
    }
    if args.no_hotkey {
        config = config.without_hotkey();
    }
    if let Some(secs) = args.generation_timeout_secs {
        anyhow::ensure!(secs > 0, "--generation-timeout-secs must be greater than 0");
        config = config.with_generation_timeout(Duration::from_secs(secs));
    }
    if args.console_tts {
        config.speech.backends = vec![TtsBackendKind::Console];
    }

    info!("Starting {} voice assistant", config.assistant_name);

    let collaborators = build_collaborators(&config);
    let (assistant, handle) = Assistant::new(&config, collaborators);
    let coordinator = assistant.start()?;

    // Detached: a blocking stdin read cannot be interrupted
    spawn_stdin_reader(handle.event_sender()).context("Failed to start input reader")?;

    let ctrl_c = handle.clone();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;
    std::thread::Builder::new()
        .name("neo-ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted");
                    ctrl_c.shutdown();
                }
            })
        })
        .context("Failed to start signal thread")?;

    if coordinator.join().is_err() {
        warn!("Coordinator thread panicked");
    }

    let session = handle.snapshot();
    info!("Goodbye after {} turns", session.turns_completed);
    Ok(())
}
