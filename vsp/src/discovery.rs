//! Rendezvous-file based session discovery.
//!
//! A running simulator drops a `vcml_session_*` file in a well-known
//! directory advertising where to connect. This module scans that
//! directory and keeps a process-wide, grow-only record of everything
//! it has ever found — sessions are never forgotten once discovered,
//! even if their rendezvous file later disappears: this is a
//! best-effort registry that may include stale entries.

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use tracing::{debug, warn};

/// One discovered simulator, as advertised by a rendezvous file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub host: String,
    pub port: u16,
}

fn registry() -> &'static Mutex<Vec<SessionInfo>> {
    static REGISTRY: OnceLock<Mutex<Vec<SessionInfo>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

/// The directory scanned for rendezvous files: `VSP_SESSION_DIR` if
/// set, otherwise the process temp directory.
fn sessions_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    if let Ok(dir) = env::var("VSP_SESSION_DIR") {
        return PathBuf::from(dir);
    }
    env::temp_dir()
}

/// Parses one rendezvous file. The format is exactly 4 lines: host,
/// port, then two further lines this client does not interpret
/// (reserved for the simulator's own bookkeeping). Anything else is
/// rejected rather than guessed at.
fn parse_rendezvous_file(contents: &str) -> Option<SessionInfo> {
    let lines: Vec<&str> = contents.lines().collect();
    if lines.len() != 4 {
        return None;
    }
    let host = lines[0].trim().to_string();
    let port: u16 = lines[1].trim().parse().ok()?;
    if host.is_empty() {
        return None;
    }
    Some(SessionInfo { host, port })
}

/// Scans the rendezvous directory, merges any newly discovered sessions
/// into the process-wide registry (deduped by `(host, port)`), and
/// returns the full accumulated list.
pub fn scan_sessions(override_dir: Option<&Path>) -> Vec<SessionInfo> {
    let dir = sessions_dir(override_dir);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "session directory unreadable");
            return registry().lock().unwrap().clone();
        }
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("vcml_session_") {
            continue;
        }

        match fs::read_to_string(entry.path()) {
            Ok(contents) => match parse_rendezvous_file(&contents) {
                Some(info) => found.push(info),
                None => warn!(file = %name, "malformed rendezvous file"),
            },
            Err(err) => warn!(file = %name, error = %err, "could not read rendezvous file"),
        }
    }

    let mut reg = registry().lock().unwrap();
    for info in found {
        if !reg.contains(&info) {
            reg.push(info);
        }
    }
    reg.clone()
}

/// Returns every session discovered so far, without rescanning.
pub fn known_sessions() -> Vec<SessionInfo> {
    registry().lock().unwrap().clone()
}
