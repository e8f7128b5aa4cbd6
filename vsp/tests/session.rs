//! End-to-end hierarchy walking, breakpoints, and watchpoints against a
//! scripted simulator.

mod support;

use std::thread;

use support::FakeSimulator;
use vsp::{Session, StopReason, WatchAccess};

const HIERARCHY_XML: &str = r#"<hierarchy><object name="platform" kind="platform" version="1.0"><object name="core0" kind="cpu" version="2.1"><attribute name="clock" type="u64" count="1"/><command name="dump" argc="0" desc="dump registers"/></object></object><target>platform.core0</target></hierarchy>"#;

/// Scripts the connect handshake: `version`, `getq`, an
/// initial `status` that reports halted (so no forced-stop round trip is
/// needed), `list,xml`, `lreg`, then one `getr` per register name.
fn script_connect(conn: &mut support::FakeConn) {
    assert_eq!(conn.recv_command(), "version");
    conn.respond("OK,2.3.4,1.0.0");

    assert_eq!(conn.recv_command(), "getq");
    conn.respond("OK,10000");

    assert_eq!(conn.recv_command(), "status");
    conn.respond("OK,stopped:user,0,0");

    assert_eq!(conn.recv_command(), "list,xml");
    conn.respond(&format!("OK,{}", HIERARCHY_XML));

    assert_eq!(conn.recv_command(), "lreg,platform.core0");
    conn.respond("OK,pc");

    assert_eq!(conn.recv_command(), "getr,platform.core0,pc");
    conn.respond("OK,4,0,0,0,0,0,0,0");
}

#[test]
fn connect_discovers_hierarchy_and_target() {
    let sim = FakeSimulator::bind();
    let host = sim.host();
    let port = sim.port();

    let server = thread::spawn(move || {
        let mut conn = sim.accept();
        script_connect(&mut conn);

        // running() re-polls status before returning the cached flag.
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,stopped:user,0,0");
    });

    let mut session = Session::new(host, port);
    session.connect().expect("connect");

    assert_eq!(session.sysc_version(), "2.3.4");
    assert_eq!(session.vcml_version(), "1.0.0");
    assert_eq!(session.quantum_ns(), 10000);
    assert!(!session.running().expect("running"));
    assert_eq!(session.stop_reason(), Some(&StopReason::User));

    let core0 = session.find_module("platform.core0").expect("module present");
    assert_eq!(core0.kind(), "cpu");
    assert_eq!(core0.hierarchy_name(), "platform.core0");

    let target = session.find_target("platform.core0").expect("target present");
    assert_eq!(target.registers().len(), 1);
    assert_eq!(target.registers()[0].name(), "pc");
    assert_eq!(target.registers()[0].size_bytes(), 8);

    server.join().unwrap();
}

#[test]
fn connect_forces_a_stop_when_simulator_starts_running() {
    let sim = FakeSimulator::bind();
    let host = sim.host();
    let port = sim.port();

    let server = thread::spawn(move || {
        let mut conn = sim.accept();
        assert_eq!(conn.recv_command(), "version");
        conn.respond("OK,2.3.4,1.0.0");
        assert_eq!(conn.recv_command(), "getq");
        conn.respond("OK,10000");

        // Initial poll reports running, so connect() must force a stop
        // and then spin-poll status until the simulator actually halts.
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,running,0,0");

        assert_eq!(conn.recv_command(), "stop");
        conn.respond("OK");

        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,running,1,1");
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,stopped:user,2,2");

        assert_eq!(conn.recv_command(), "list,xml");
        conn.respond("OK,<hierarchy></hierarchy>");

        // running()/cycle() each re-poll status.
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,stopped:user,2,2");
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,stopped:user,2,2");
    });

    let mut session = Session::new(host, port);
    session.connect().expect("connect");

    assert!(!session.running().expect("running"));
    assert_eq!(session.cycle().expect("cycle"), 2);

    server.join().unwrap();
}

#[test]
fn breakpoint_hit_is_reflected_in_status() {
    let sim = FakeSimulator::bind();
    let host = sim.host();
    let port = sim.port();

    let server = thread::spawn(move || {
        let mut conn = sim.accept();
        script_connect(&mut conn);

        assert_eq!(conn.recv_command(), "mkbp,platform.core0,42");
        conn.respond("OK,created bp 1");

        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,stopped:breakpoint:1,100,5");

        // running() re-polls status before returning the cached flag.
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,stopped:breakpoint:1,100,5");

        conn
    });

    let mut session = Session::new(host, port);
    session.connect().expect("connect");

    let id = session.insert_breakpoint("platform.core0", 0x2a).expect("insert breakpoint");
    assert_eq!(id, 1);

    // Re-inserting the same address must not touch the wire again.
    let id_again = session.insert_breakpoint("platform.core0", 0x2a).expect("idempotent insert");
    assert_eq!(id_again, 1);

    session.update_status().expect("status");
    assert!(!session.running().expect("running"));
    assert_eq!(session.stop_reason(), Some(&StopReason::Breakpoint { id: 1 }));

    server.join().unwrap();
}

#[test]
fn remove_breakpoint_sends_bare_id() {
    let sim = FakeSimulator::bind();
    let host = sim.host();
    let port = sim.port();

    let server = thread::spawn(move || {
        let mut conn = sim.accept();
        script_connect(&mut conn);

        assert_eq!(conn.recv_command(), "mkbp,platform.core0,42");
        conn.respond("OK,created bp 1");

        assert_eq!(conn.recv_command(), "rmbp,1");
        conn.respond("OK");
    });

    let mut session = Session::new(host, port);
    session.connect().expect("connect");

    session.insert_breakpoint("platform.core0", 0x2a).expect("insert breakpoint");
    session.remove_breakpoint("platform.core0", 0x2a).expect("remove breakpoint");

    server.join().unwrap();
}

#[test]
fn write_watchpoint_round_trips() {
    let sim = FakeSimulator::bind();
    let host = sim.host();
    let port = sim.port();

    let server = thread::spawn(move || {
        let mut conn = sim.accept();
        script_connect(&mut conn);

        assert_eq!(conn.recv_command(), "mkwp,platform.core0,256,4,w");
        conn.respond("OK,created wp 7");

        assert_eq!(conn.recv_command(), "rmwp,7,w");
        conn.respond("OK");
    });

    let mut session = Session::new(host, port);
    session.connect().expect("connect");

    let id = session
        .insert_watchpoint("platform.core0", 0x100, 4, WatchAccess::Write)
        .expect("insert watchpoint");
    assert_eq!(id, 7);

    session
        .remove_watchpoint("platform.core0", 0x100, 4, WatchAccess::Write)
        .expect("remove watchpoint");

    server.join().unwrap();
}

#[test]
fn run_resumes_only_when_stopped() {
    let sim = FakeSimulator::bind();
    let host = sim.host();
    let port = sim.port();

    let server = thread::spawn(move || {
        let mut conn = sim.accept();
        script_connect(&mut conn);

        // run() re-polls status before deciding whether to resume.
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,stopped:user,0,0");
        assert_eq!(conn.recv_command(), "resume");
        conn.respond("OK");

        // running() re-polls status too.
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,running,1,1");

        // Already running: the second run() must re-poll but send no
        // further `resume`.
        assert_eq!(conn.recv_command(), "status");
        conn.respond("OK,running,2,2");
    });

    let mut session = Session::new(host, port);
    session.connect().expect("connect");

    session.run().expect("run");
    assert!(session.running().expect("running"));

    // Already running: run() must re-poll status but send no `resume`.
    session.run().expect("run again is a no-op");

    session.disconnect();
    server.join().unwrap();
}

#[test]
fn quit_after_connect() {
    let sim = FakeSimulator::bind();
    let host = sim.host();
    let port = sim.port();

    let server = thread::spawn(move || {
        let mut conn = sim.accept();
        script_connect(&mut conn);

        // `quit` elicits no reply; the client must not block waiting for
        // one.
        assert_eq!(conn.recv_command(), "quit");
    });

    let mut session = Session::new(host, port);
    session.connect().expect("connect");
    session.quit().expect("quit");

    server.join().unwrap();
}
