//! The operator console: a loop on stdin implementing `s`/`g`/`p`/`p
//! <path>`, with EOF driving the shutdown sequence in `main`.

use std::io::{BufRead, Write};

use crate::pause::PauseBarrier;
use crate::store::Store;

pub enum ConsoleEvent {
    /// The operator asked for shutdown (stdin hit EOF).
    Shutdown,
}

/// Runs the console loop until EOF, returning `ConsoleEvent::Shutdown`.
/// Everything else (`s`, `g`, `p`) is handled in place and the loop
/// continues.
pub fn run(stdin: impl BufRead, store: &Store, pause: &PauseBarrier) -> ConsoleEvent {
    for line in stdin.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("console read error: {e}");
                break;
            }
        };
        let tokens = libbst::split_into_args(&line);
        match (tokens.first().map(String::as_str), tokens.len()) {
            (Some("s"), 1) => pause.stop(),
            (Some("g"), 1) => pause.release(),
            (Some("p"), 1) => {
                if let Err(e) = store.print(&mut std::io::stdout()) {
                    log::warn!("console print failed: {e}");
                }
            }
            (Some("p"), 2) => print_to_path(store, &tokens[1]),
            _ => eprintln!("Invalid Command!"),
        }
    }
    ConsoleEvent::Shutdown
}

fn print_to_path(store: &Store, path: &str) {
    match std::fs::File::create(path) {
        Ok(mut file) => {
            if let Err(e) = store.print(&mut file) {
                log::warn!("console print to {path} failed: {e}");
            }
        }
        Err(e) => log::warn!("console could not open {path} for writing: {e}"),
    }
}
