//! nullfs - mount a null flat filesystem.
//!
//! Usage: nullfs <MOUNTPOINT> [-o OPTIONS]... [-f] [-s] [--debug]
//!
//! Every path under the mountpoint is an empty file (or, for the root, an
//! empty directory). Writes succeed and are discarded.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use nullfs_core::NullFs;
use nullfs_fuse::{
    join_session, wait_for_shutdown, FuseBridge, MountArgs, MountConfig, Shutdown,
    SESSION_POLL_INTERVAL,
};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nullfs")]
#[command(about = "Mount a filesystem that stores nothing")]
#[command(version)]
struct Cli {
    /// Mountpoint for the filesystem
    mountpoint: PathBuf,

    /// Mount options, comma separated (e.g. -o ro,allow_other,attr_timeout=0)
    #[arg(short = 'o', value_name = "OPTIONS")]
    options: Vec<String>,

    /// Stay in the foreground (accepted for libfuse compatibility; always on)
    #[arg(short = 'f')]
    foreground: bool,

    /// Single-threaded dispatch (accepted for libfuse compatibility; always on)
    #[arg(short = 's')]
    single_threaded: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Captured before anything else so directory timestamps reflect startup
    let fs = NullFs::new();

    if !cli.mountpoint.exists() {
        anyhow::bail!("Mountpoint does not exist: {}", cli.mountpoint.display());
    }

    if cli.foreground || cli.single_threaded {
        debug!(
            foreground = cli.foreground,
            single_threaded = cli.single_threaded,
            "Ignoring libfuse flags, nullfs always runs in the foreground on one thread"
        );
    }

    let args = MountArgs::parse(&cli.options, MountConfig::default())
        .context("Invalid mount options")?;

    info!(
        mount = %cli.mountpoint.display(),
        options = ?args.options,
        "Mounting null filesystem"
    );

    mount_and_wait(&cli, fs, args)
}

/// Mount the filesystem and wait for Ctrl+C or an external unmount.
fn mount_and_wait(cli: &Cli, fs: NullFs, args: MountArgs) -> Result<()> {
    let bridge = FuseBridge::new(fs, args.config);

    // Set up channel for signal handling
    let (tx, rx) = mpsc::channel::<()>();

    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    let session = fuser::spawn_mount2(bridge, &cli.mountpoint, &args.options).map_err(|e| {
        error!(error = %e, "Mount failed");
        anyhow::anyhow!("Failed to mount filesystem: {e}")
    })?;

    info!(
        "Filesystem mounted at {} (press Ctrl+C to unmount)",
        cli.mountpoint.display()
    );

    match wait_for_shutdown(&rx, || session.guard.is_finished(), SESSION_POLL_INTERVAL) {
        Shutdown::Signal => {
            info!("Received interrupt signal, unmounting...");
        }
        Shutdown::ChannelClosed => {
            warn!("Signal channel closed unexpectedly");
        }
        Shutdown::Unmounted => {
            info!("Filesystem was unmounted externally");
            return join_session(session.guard).context("FUSE session failed");
        }
    }

    drop(session);
    info!("Filesystem unmounted");
    Ok(())
}
