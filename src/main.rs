// CLASSIFICATION: COMMUNITY
// Filename: main.rs v0.1
// Date Modified: 2026-10-17
// Author: Lukas Bower

//! Entry point for the osboot loader.

use std::convert::Infallible;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use log::info;

use osboot::autoboot::{AutobootController, AutobootState};
use osboot::bootloader::{BootLauncher, DefaultBoot, KexecHandoff, SysMount};
use osboot::config::{BootConfig, DISK_CONFIG_LOCATION};
use osboot::flash::{alloc_scratch, console, FlashService, SCRATCH_SIZE};
use osboot::input::CancellationWatcher;
use osboot::osip::{ImageTableStore, SysfsEraseSize};
use osboot::{BootError, BootResult};

#[derive(Debug, Parser)]
#[command(name = "osboot", version, about = "Autoboot arbiter and OSIP flasher")]
struct Args {
    /// Loader configuration and partition layout.
    #[arg(value_name = "CONFIG", default_value = DISK_CONFIG_LOCATION)]
    config: PathBuf,
    /// Start in flashing mode with autoboot disabled.
    #[arg(long)]
    no_autoboot: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(never) => match never {},
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}

fn run(args: Args) -> BootResult<Infallible> {
    info!("OSBOOT {} START", env!("CARGO_PKG_VERSION"));
    info!("Reading disk layout from {}", args.config.display());
    let cfg = BootConfig::load(&args.config)?;
    let layout = Arc::new(cfg.layout());
    layout.dump();

    let state = Arc::new(if args.no_autoboot || !cfg.autoboot.enabled {
        AutobootState::disarmed()
    } else {
        AutobootState::armed(cfg.autoboot.delay_secs)
    });
    let launcher: Arc<dyn DefaultBoot> = Arc::new(BootLauncher::new(
        layout,
        SysMount::new(&cfg.mount_root),
        KexecHandoff::new(&cfg.kexec_bin),
    ));

    AutobootController::new(state.clone(), launcher.clone()).spawn()?;
    // Held for the life of the process; dropping it stops the watcher.
    let (watcher, _watcher_shutdown) =
        CancellationWatcher::from_dir(&cfg.input_dir, state.clone())?;
    watcher.spawn()?;

    let mut scratch = alloc_scratch(SCRATCH_SIZE)?;
    let store = ImageTableStore::new(&cfg.device, SysfsEraseSize::new(&cfg.erase_size_attr));
    let svc = FlashService::new(store, state, launcher);

    info!("Listening for flashing commands on stdin");
    console::serve(&svc, io::stdin().lock(), &mut io::stdout(), &mut scratch)
        .map_err(|e| BootError::io("command console", e))?;

    info!("command input closed; staying in flashing mode");
    loop {
        thread::park();
    }
}
