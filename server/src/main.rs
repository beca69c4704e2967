#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

mod config;
mod console;
mod dbnet;
mod errors;
mod interpreter;
mod pause;
mod registry;
mod store;
mod supervisor;
mod worker;

use std::sync::Arc;

use libbst::TResult;

use console::ConsoleEvent;
use pause::PauseBarrier;
use registry::WorkerRegistry;
use store::Store;
use supervisor::Supervisor;

fn init_logger() {
    let filter = std::env::var("BST_LOG").unwrap_or_else(|_| "info".to_owned());
    env_logger::Builder::new().parse_filters(&filter).init();
}

fn run() -> TResult<()> {
    init_logger();
    let cfg = config::Config::from_args(std::env::args())?;

    let store = Arc::new(Store::new());
    let pause = Arc::new(PauseBarrier::new());
    let supervisor = Arc::new(Supervisor::new());
    let registry = Arc::new(WorkerRegistry::new());

    let shutdown_supervisor = Arc::clone(&supervisor);
    let shutdown_registry = Arc::clone(&registry);
    let signal_handle = supervisor::spawn_signal_thread(move || {
        log::info!("received interrupt, shutting down");
        shutdown_supervisor.shutdown(&shutdown_registry);
    })?;

    dbnet::listener::spawn(
        cfg.port,
        Arc::clone(&store),
        Arc::clone(&pause),
        Arc::clone(&supervisor),
        Arc::clone(&registry),
    )?;

    if libbst::util::terminal::write_info("bstored ready\n").is_err() {
        log::warn!("failed to write startup banner");
    }

    let stdin = std::io::stdin();
    match console::run(stdin.lock(), &store, &pause) {
        ConsoleEvent::Shutdown => {
            log::info!("stdin closed, shutting down");
            supervisor.shutdown(&registry);
        }
    }

    signal_handle.close();
    store.cleanup();
    log::info!("shutdown complete");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("bstored: {e}");
        std::process::exit(1);
    }
}
