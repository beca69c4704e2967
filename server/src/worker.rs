//! The per-connection command loop: register, install cleanup, then
//! repeatedly wait-on-pause / receive / interpret / reply until the
//! connection closes or is cancelled.

use std::net::TcpStream;
use std::sync::Arc;

use crate::dbnet::{Connection, TcpConnection};
use crate::interpreter;
use crate::pause::PauseBarrier;
use crate::registry::{WorkerId, WorkerRegistry};
use crate::store::Store;
use crate::supervisor::Supervisor;

struct RegistryGuard<'a> {
    registry: &'a WorkerRegistry,
    id: WorkerId,
}

impl Drop for RegistryGuard<'_> {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

pub fn run(
    store: Arc<Store>,
    pause: Arc<PauseBarrier>,
    supervisor: Arc<Supervisor>,
    registry: Arc<WorkerRegistry>,
    stream: TcpStream,
) {
    let cancel_handle = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("could not clone client stream, dropping connection: {e}");
            return;
        }
    };

    // `register` admits and inserts under the registry's own mutex, so
    // there is no window between "may this worker register" and "is it
    // now visible to the registry" for a concurrent shutdown to slip
    // through (see `WorkerRegistry::register`).
    let (id, cancelled) = match registry.register(cancel_handle) {
        Some(registered) => registered,
        None => {
            log::debug!("refusing to register worker: shutting down");
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return;
        }
    };
    let _registry_guard = RegistryGuard {
        registry: &registry,
        id,
    };
    let _worker_guard = supervisor.admit();

    let mut conn = match TcpConnection::new(stream) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("worker {id:?} failed to wrap connection: {e}");
            return;
        }
    };

    loop {
        pause.wait();
        let line = match conn.receive_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::debug!("worker {id:?} read error, closing: {e}");
                break;
            }
        };
        if let Err(e) = interpreter::execute(&store, &line, &cancelled, &mut conn) {
            log::debug!("worker {id:?} command failed, closing: {e}");
            break;
        }
    }
    log::debug!("worker {id:?} done");
}
