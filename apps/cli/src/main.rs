mod store;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use camfile_core::{
    ChunkedTransferEngine, FileAccessDevice, TransferConfig, TransferObserver, UserSetControl,
    UserSetSession,
};
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Camera user set file access tool", long_about = None)]
struct Args {
    /// Directory holding the simulated camera's file slots
    #[arg(long, default_value = "camera-store")]
    store: PathBuf,

    /// Buffer register capacity of the simulated camera, in bytes
    #[arg(long, default_value_t = 1024)]
    window: usize,

    /// Path to a TOML transfer configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// File selector entry to transfer (overrides the configuration)
    #[arg(long)]
    selector: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a saved settings file and load it as the user set
    Upload { file: PathBuf },
    /// Save the active settings to the user set and download it
    Download {
        file: PathBuf,
        /// Fail when the downloaded file is not exactly this many bytes
        #[arg(long)]
        expected_size: Option<u64>,
    },
    /// Upload a file, download it back and compare
    Roundtrip { file: PathBuf },
    /// Write the default configuration to a TOML file
    InitConfig { path: PathBuf },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TransferConfig::load_from_file(path)
            .with_context(|| format!("Loading configuration {}", path.display()))?,
        None => TransferConfig::default(),
    };
    if let Some(selector) = args.selector {
        config.file_selector = selector;
    }

    if let Command::InitConfig { path } = &args.command {
        config.save_to_file(path)?;
        info!(path = %path.display(), "Wrote configuration");
        return Ok(());
    }

    if args.window == 0 || args.window % 4 != 0 {
        bail!("--window must be a non-zero multiple of 4, got {}", args.window);
    }
    let device = store::load(&args.store, args.window)?;
    let engine = ChunkedTransferEngine::new(device).with_config(config);
    let mut session = UserSetSession::new(engine);
    let mut progress = |percent: u8| eprintln!("Progress : {} %", percent);

    let result = match &args.command {
        Command::Upload { file } => session
            .upload_from_file(file, &mut progress)
            .map(|bytes| info!(bytes, "Writing complete")),
        Command::Download {
            file,
            expected_size: None,
        } => session
            .download_to_file(file, &mut progress)
            .map(|bytes| info!(bytes, path = %file.display(), "Reading complete")),
        Command::Download {
            file,
            expected_size: Some(expected),
        } => download_checked(&mut session, file, *expected, &mut progress),
        Command::Roundtrip { file } => roundtrip(&mut session, file, &mut progress),
        Command::InitConfig { .. } => Ok(()),
    };

    // The simulated camera keeps whatever state the run left behind
    store::save(&args.store, session.engine().device())?;
    result
}

fn download_checked<D, O>(
    session: &mut UserSetSession<D, O>,
    file: &Path,
    expected: u64,
    progress: &mut impl FnMut(u8),
) -> Result<()>
where
    D: FileAccessDevice + UserSetControl,
    O: TransferObserver,
{
    let data = session.download_user_set(progress)?;
    // Keep what was read even when the size is off
    std::fs::write(file, &data).with_context(|| format!("Writing {}", file.display()))?;
    if data.len() as u64 != expected {
        bail!(
            "Size mismatch: expected {} bytes, downloaded {} bytes (saved to {})",
            expected,
            data.len(),
            file.display()
        );
    }
    info!(bytes = data.len(), path = %file.display(), "Reading complete");
    Ok(())
}

fn roundtrip<D, O>(
    session: &mut UserSetSession<D, O>,
    file: &Path,
    progress: &mut impl FnMut(u8),
) -> Result<()>
where
    D: FileAccessDevice + UserSetControl,
    O: TransferObserver,
{
    let data = std::fs::read(file).with_context(|| format!("Reading {}", file.display()))?;
    session.upload_user_set(&data, progress)?;
    let read = session.download_user_set(progress)?;
    if read != data {
        bail!(
            "Round trip mismatch: uploaded {} bytes, downloaded {} bytes",
            data.len(),
            read.len()
        );
    }
    info!(bytes = data.len(), "Round trip verified");
    Ok(())
}
