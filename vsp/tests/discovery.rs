//! Rendezvous-file discovery.

use std::{fs, path::Path};

use vsp::scan_sessions;

fn write_rendezvous_file(dir: &Path, name: &str, host: &str, port: u16) {
    let contents = format!("{}\n{}\n0\nvcml\n", host, port);
    fs::write(dir.join(name), contents).expect("write rendezvous file");
}

#[test]
fn scan_finds_and_parses_rendezvous_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_rendezvous_file(dir.path(), "vcml_session_1234", "127.0.0.1", 5555);

    let sessions = scan_sessions(Some(dir.path()));
    assert!(sessions.iter().any(|s| s.host == "127.0.0.1" && s.port == 5555));
}

// The discovery registry is process-wide and grow-only, so these tests
// assert on growth (or lack of it) rather than on absolute emptiness —
// other tests in this binary may have already populated it.

#[test]
fn malformed_rendezvous_file_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("vcml_session_bad"), "not enough lines").unwrap();

    let before = scan_sessions(Some(dir.path())).len();
    let after = scan_sessions(Some(dir.path())).len();
    assert_eq!(before, after);
}

#[test]
fn unrelated_files_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("not_a_session_file"), "garbage").unwrap();

    let before = scan_sessions(Some(dir.path())).len();
    let after = scan_sessions(Some(dir.path())).len();
    assert_eq!(before, after);
}

#[test]
fn rescans_merge_rather_than_replace() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_rendezvous_file(dir.path(), "vcml_session_a", "127.0.0.1", 1111);
    let first = scan_sessions(Some(dir.path()));
    assert!(first.iter().any(|s| s.port == 1111));

    fs::remove_file(dir.path().join("vcml_session_a")).unwrap();
    write_rendezvous_file(dir.path(), "vcml_session_b", "127.0.0.1", 2222);
    let second = scan_sessions(Some(dir.path()));

    // The now-vanished session is still known (grow-only registry),
    // alongside the newly discovered one.
    assert!(second.iter().any(|s| s.port == 1111));
    assert!(second.iter().any(|s| s.port == 2222));
}
