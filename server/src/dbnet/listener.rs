//! The accept loop: a single dedicated thread that blocks on
//! `TcpListener::accept` and hands every admitted connection off to a
//! freshly spawned worker thread.

use std::net::TcpListener;
use std::sync::Arc;

use crate::pause::PauseBarrier;
use crate::registry::WorkerRegistry;
use crate::store::Store;
use crate::supervisor::Supervisor;
use crate::worker;

/// Binds `port` and spawns the accept-loop thread. The thread runs for
/// the lifetime of the process — once shutdown stops admission, it keeps
/// accepting (so the OS backlog doesn't fill up) but immediately drops
/// every connection it can no longer hand to a worker; the process exit
/// at the end of `main` is what ultimately stops it.
pub fn spawn(
    port: u16,
    store: Arc<Store>,
    pause: Arc<PauseBarrier>,
    supervisor: Arc<Supervisor>,
    registry: Arc<WorkerRegistry>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    log::info!("listening on port {port}");

    let handle = std::thread::spawn(move || loop {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };

        // A cheap early filter only — the authoritative admission check
        // happens inside `WorkerRegistry::register`, under its own mutex,
        // once the worker thread is running.
        if !registry.is_admitting() {
            log::debug!("refusing connection from {peer}: shutting down");
            let _ = stream.shutdown(std::net::Shutdown::Both);
            continue;
        }

        log::debug!("accepted connection from {peer}");
        let store = Arc::clone(&store);
        let pause = Arc::clone(&pause);
        let supervisor = Arc::clone(&supervisor);
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || worker::run(store, pause, supervisor, registry, stream));
    });

    Ok(handle)
}
