//! Parses a single command line and drives the store, producing exactly
//! one line of response text per call (the `f` verb is the exception in
//! spirit only: its own response is one line, even though it recursively
//! runs every line of the file it names).

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::ServerError;
use crate::store::{AddOutcome, RemoveOutcome, Store};

/// Executes one command line against `store`, writing its response
/// (including the trailing newline) to `out`. `cancelled` is polled
/// between the lines of an `f` file replay, the one place a single
/// command can run long enough that cancellation matters mid-command.
pub fn execute(
    store: &Store,
    line: &str,
    cancelled: &AtomicBool,
    out: &mut dyn Write,
) -> Result<(), ServerError> {
    // The first non-whitespace character selects the verb; everything
    // after *that single character* — not after the next separator — is
    // the argument scanner's input, matching `original_source/db.c`'s
    // `command[0]` / `sscanf(&command[1], ...)` split. `sscanf`'s `%s`
    // skips leading whitespace on its own, which `split_into_args` does
    // too, so `d key` and `dkey` both parse `key` as the argument.
    let trimmed = line.trim_end().trim_start();
    let mut chars = trimmed.char_indices();
    let verb = match chars.next() {
        Some((_, c)) => c,
        None => return respond(out, "ill-formed command"),
    };
    let rest = &trimmed[verb.len_utf8()..];
    let mut tokens = libbst::split_into_args(rest).into_iter();

    match verb {
        'q' => {
            let Some(key) = tokens.next() else {
                return respond(out, "ill-formed command");
            };
            if key.is_empty() {
                return respond(out, "ill-formed command");
            }
            match store.query(key.as_bytes()) {
                Some(value) => respond(out, &String::from_utf8_lossy(&value)),
                None => respond(out, "not found"),
            }
        }
        'a' => {
            let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
                return respond(out, "ill-formed command");
            };
            if key.is_empty() {
                return respond(out, "ill-formed command");
            }
            match store.add(key.as_bytes(), value.as_bytes()) {
                Ok(AddOutcome::Inserted) => respond(out, "added"),
                Ok(AddOutcome::AlreadyPresent) => respond(out, "already in database"),
                Err(_) => respond(out, "ill-formed command"),
            }
        }
        'd' => {
            let Some(key) = tokens.next() else {
                return respond(out, "ill-formed command");
            };
            if key.is_empty() {
                return respond(out, "ill-formed command");
            }
            match store.remove(key.as_bytes()) {
                RemoveOutcome::Removed => respond(out, "removed"),
                RemoveOutcome::NotFound => respond(out, "not in database"),
            }
        }
        'f' => {
            let Some(path) = tokens.next() else {
                return respond(out, "ill-formed command");
            };
            match replay_file(store, &path, cancelled) {
                Ok(()) => respond(out, "file processed"),
                Err(_) => respond(out, "bad file name"),
            }
        }
        _ => respond(out, "ill-formed command"),
    }
}

fn respond(out: &mut dyn Write, text: &str) -> Result<(), ServerError> {
    writeln!(out, "{text}")?;
    out.flush()?;
    Ok(())
}

/// Runs every line of `path` as its own command, recursing into nested
/// `f` lines. Responses to the individual lines are not sent anywhere —
/// the caller only reports whether the file as a whole was readable.
fn replay_file(store: &Store, path: &str, cancelled: &AtomicBool) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut discard = std::io::sink();
    for line in reader.lines() {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        let line = line?;
        let _ = execute(store, &line, cancelled, &mut discard);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(store: &Store, line: &str) -> String {
        let cancelled = AtomicBool::new(false);
        let mut out = Vec::new();
        execute(store, line, &cancelled, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn add_query_and_duplicate_add() {
        let store = Store::new();
        assert_eq!(run(&store, "a apple red"), "added\n");
        assert_eq!(run(&store, "a apple green"), "already in database\n");
        assert_eq!(run(&store, "q apple"), "red\n");
        assert_eq!(run(&store, "q cherry"), "not found\n");
    }

    #[test]
    fn remove_present_and_absent() {
        let store = Store::new();
        run(&store, "a k v");
        assert_eq!(run(&store, "d k"), "removed\n");
        assert_eq!(run(&store, "d k"), "not in database\n");
    }

    #[test]
    fn unrecognized_verb_is_ill_formed() {
        let store = Store::new();
        assert_eq!(run(&store, "z whatever"), "ill-formed command\n");
        assert_eq!(run(&store, ""), "ill-formed command\n");
        assert_eq!(run(&store, "q"), "ill-formed command\n");
    }

    #[test]
    fn verb_needs_no_separating_space() {
        let store = Store::new();
        assert_eq!(run(&store, "akey value"), "added\n");
        assert_eq!(run(&store, "qkey"), "value\n");
        assert_eq!(run(&store, "dkey"), "removed\n");
        assert_eq!(run(&store, "dkey"), "not in database\n");
    }

    #[test]
    fn empty_key_is_ill_formed_for_every_verb() {
        let store = Store::new();
        assert_eq!(run(&store, "q \"\""), "ill-formed command\n");
        assert_eq!(run(&store, "d \"\""), "ill-formed command\n");
        assert_eq!(run(&store, "a \"\" v"), "ill-formed command\n");
    }

    #[test]
    fn file_replay_applies_each_line() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("bstored-interpreter-test-{}.txt", std::process::id()));
        std::fs::write(&path, "a one 1\na two 2\nd one\n").unwrap();
        let store = Store::new();
        assert_eq!(run(&store, &format!("f {}", path.display())), "file processed\n");
        assert_eq!(run(&store, "q one"), "not found\n");
        assert_eq!(run(&store, "q two"), "2\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn file_replay_reports_missing_file() {
        let store = Store::new();
        assert_eq!(run(&store, "f /no/such/path-bstored-test"), "bad file name\n");
    }
}
