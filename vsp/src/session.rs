//! The top-level handle to one running simulator.

use roxmltree::Document;
use tracing::{debug, instrument, warn};
use vsp_protocol::{parse_state_word, RunState, StopReason, VspError};

use crate::{
    config::ConnectConfig,
    connection::Connection,
    cpureg::CpuReg,
    module::Module,
    target::Target,
    tree::{AttributeData, CommandData, ModuleId, ModuleTree},
};

/// Upper bound on status-polling iterations while waiting for a halt.
/// Guards against spinning forever against a simulator that never stops.
const MAX_POLL_ITERATIONS: u32 = 100_000;

/// A connected simulator: its module hierarchy, execution targets, and
/// run/stop state.
pub struct Session {
    connection: Connection,
    sysc_version: String,
    vcml_version: String,
    running: bool,
    stop_reason: Option<StopReason>,
    time_ns: u64,
    cycle: u64,
    quantum_ns: u64,
    root_module: ModuleTree,
    targets: Vec<Target>,
}

impl Session {
    pub fn new(host: impl Into<String>, port: u16) -> Session {
        Session::with_config(host, port, ConnectConfig::default())
    }

    /// Like [`Session::new`], but with a non-default [`ConnectConfig`]
    /// (read timeout, NACK retry budget, frame size cap) for the
    /// underlying [`Connection`].
    pub fn with_config(host: impl Into<String>, port: u16, config: ConnectConfig) -> Session {
        Session {
            connection: Connection::with_config(host, port, config),
            sysc_version: String::new(),
            vcml_version: String::new(),
            running: false,
            stop_reason: None,
            time_ns: 0,
            cycle: 0,
            quantum_ns: 0,
            root_module: ModuleTree::new_empty_root(),
            targets: Vec::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Connects and brings the session to a known, halted state: opens
    /// the socket, issues `version`, `getq`, an initial `status` poll, a
    /// forced `stop` (spinning on `status` until halted), and finally
    /// `list,xml` to build the module hierarchy and enumerate targets and
    /// their registers.
    #[instrument(skip(self))]
    pub fn connect(&mut self) -> Result<(), VspError> {
        self.connection.connect();
        if !self.connection.is_connected() {
            return Err(VspError::TransportClosed);
        }

        self.fetch_version()?;
        self.fetch_quantum()?;
        self.update_status()?;

        if self.running {
            self.send_stop()?;
            self.poll_until_halted()?;
        }

        self.fetch_hierarchy()?;
        for target in &mut self.targets {
            Self::populate_registers(&self.connection, target)?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Sends `quit`, which the simulator never answers, then closes the
    /// socket.
    pub fn quit(&mut self) -> Result<(), VspError> {
        if !self.connection.command_no_reply("quit") {
            return Err(VspError::TransportClosed);
        }
        self.disconnect();
        Ok(())
    }

    pub fn sysc_version(&self) -> &str {
        &self.sysc_version
    }

    pub fn vcml_version(&self) -> &str {
        &self.vcml_version
    }

    /// Re-polls `status` and returns the freshened running flag.
    pub fn running(&mut self) -> Result<bool, VspError> {
        self.update_status()?;
        Ok(self.running)
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Re-polls `status` and returns the freshened simulated time.
    pub fn time_ns(&mut self) -> Result<u64, VspError> {
        self.update_status()?;
        Ok(self.time_ns)
    }

    /// Re-polls `status` and returns the freshened cycle count.
    pub fn cycle(&mut self) -> Result<u64, VspError> {
        self.update_status()?;
        Ok(self.cycle)
    }

    pub fn quantum_ns(&self) -> u64 {
        self.quantum_ns
    }

    pub fn root(&self) -> Module<'_> {
        Module::new(&self.root_module, &self.connection, self.root_module.root())
    }

    pub fn find_module(&self, path: &str) -> Option<Module<'_>> {
        self.root().find_module(path)
    }

    pub fn find_attribute(&self, path: &str) -> Option<crate::attribute::Attribute<'_>> {
        self.root().find_attribute(path)
    }

    pub fn find_command(&self, path: &str) -> Option<crate::command::Command<'_>> {
        self.root().find_command(path)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut [Target] {
        &mut self.targets
    }

    pub fn find_target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name() == name)
    }

    pub fn find_target_mut(&mut self, name: &str) -> Option<&mut Target> {
        self.targets.iter_mut().find(|t| t.name() == name)
    }

    /// Inserts a breakpoint on `target`, a thin wrapper over
    /// [`Target::insert_breakpoint`] that borrows `self.connection` and
    /// `self.targets` disjointly so callers don't have to.
    pub fn insert_breakpoint(&mut self, target: &str, addr: u64) -> Result<u32, VspError> {
        let connection = &self.connection;
        self.targets
            .iter_mut()
            .find(|t| t.name() == target)
            .ok_or_else(|| VspError::Semantic { what: format!("target {}", target) })?
            .insert_breakpoint(connection, addr)
    }

    pub fn remove_breakpoint(&mut self, target: &str, addr: u64) -> Result<(), VspError> {
        let connection = &self.connection;
        self.targets
            .iter_mut()
            .find(|t| t.name() == target)
            .ok_or_else(|| VspError::Semantic { what: format!("target {}", target) })?
            .remove_breakpoint(connection, addr)
    }

    /// Inserts a watchpoint on `target`, mirroring
    /// [`Session::insert_breakpoint`].
    pub fn insert_watchpoint(
        &mut self,
        target: &str,
        base: u64,
        size: usize,
        access: crate::target::WatchAccess,
    ) -> Result<u32, VspError> {
        let connection = &self.connection;
        self.targets
            .iter_mut()
            .find(|t| t.name() == target)
            .ok_or_else(|| VspError::Semantic { what: format!("target {}", target) })?
            .insert_watchpoint(connection, base, size, access)
    }

    pub fn remove_watchpoint(
        &mut self,
        target: &str,
        base: u64,
        size: usize,
        access: crate::target::WatchAccess,
    ) -> Result<(), VspError> {
        let connection = &self.connection;
        self.targets
            .iter_mut()
            .find(|t| t.name() == target)
            .ok_or_else(|| VspError::Semantic { what: format!("target {}", target) })?
            .remove_watchpoint(connection, base, size, access)
    }

    /// Re-polls `status`, then resumes free execution. A no-op if the
    /// freshened state is already running.
    pub fn run(&mut self) -> Result<(), VspError> {
        self.update_status()?;
        if !self.running {
            self.send_resume(None)?;
        }
        Ok(())
    }

    /// Re-polls `status`, then resumes execution for `ns` nanoseconds of
    /// simulated time. A no-op if the freshened state is already running.
    /// If `block`, re-polls `status` until the simulator halts again;
    /// otherwise returns immediately after the simulator acknowledges
    /// the command.
    pub fn step(&mut self, ns: u64, block: bool) -> Result<(), VspError> {
        self.update_status()?;
        if self.running {
            return Ok(());
        }
        self.send_resume(Some(ns))?;
        if block {
            self.poll_until_halted()?;
        }
        Ok(())
    }

    /// Equivalent to `step(quantum_ns, true)`.
    pub fn step_quantum(&mut self) -> Result<(), VspError> {
        self.step(self.quantum_ns, true)
    }

    /// Re-polls `status`, then single-steps `target` by one instruction
    /// and polls `status` until the simulator halts again. A no-op if
    /// the freshened state is already running.
    pub fn stepi(&mut self, target: &str) -> Result<(), VspError> {
        self.update_status()?;
        if self.running {
            return Ok(());
        }
        let connection = &self.connection;
        self.targets
            .iter()
            .find(|t| t.name() == target)
            .ok_or_else(|| VspError::Semantic { what: format!("target {}", target) })?
            .step(connection)?;
        self.running = true;
        self.poll_until_halted()
    }

    /// Re-polls `status`, then halts execution. A no-op if the
    /// freshened state is already stopped; the halt and its reason
    /// arrive via a subsequent `status` poll, not in the `stop` response
    /// itself.
    pub fn stop(&mut self) -> Result<(), VspError> {
        self.update_status()?;
        if self.running {
            self.send_stop()?;
            self.update_status()?;
        }
        Ok(())
    }

    fn send_resume(&mut self, ns: Option<u64>) -> Result<(), VspError> {
        let cmd = match ns {
            Some(ns) => format!("resume,{}ns", ns),
            None => "resume".to_string(),
        };
        let resp = self.connection.command(&cmd).ok_or(VspError::TransportClosed)?;
        if !Connection::check_response(&Some(resp), 1) {
            return Err(VspError::ProtocolShape { expected: "OK".to_string(), got: "other".to_string() });
        }
        self.running = true;
        self.stop_reason = None;
        Ok(())
    }

    fn send_stop(&mut self) -> Result<(), VspError> {
        let resp = self.connection.command("stop").ok_or(VspError::TransportClosed)?;
        if !Connection::check_response(&Some(resp), 1) {
            return Err(VspError::ProtocolShape { expected: "OK".to_string(), got: "other".to_string() });
        }
        Ok(())
    }

    /// Polls `status` until the simulator reports halted, up to
    /// [`MAX_POLL_ITERATIONS`] attempts.
    fn poll_until_halted(&mut self) -> Result<(), VspError> {
        for _ in 0..MAX_POLL_ITERATIONS {
            self.update_status()?;
            if !self.running {
                return Ok(());
            }
        }
        Err(VspError::Semantic { what: "simulator never halted".to_string() })
    }

    /// Refreshes `running`/`stop_reason`/`time_ns`/`cycle` from the
    /// simulator's current `status`. `quantum_ns` is not part of this
    /// response; it is established once via `getq`.
    #[instrument(skip(self))]
    pub fn update_status(&mut self) -> Result<(), VspError> {
        let resp = self.connection.command("status").ok_or(VspError::TransportClosed)?;
        if resp.len() != 4 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: "OK,<state>,<time_ns>,<cycle>".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }

        match parse_state_word(&resp[1]) {
            RunState::Running => {
                self.running = true;
                self.stop_reason = None;
            }
            RunState::Stopped(reason) => {
                self.running = false;
                self.stop_reason = Some(reason);
            }
        }

        self.time_ns = resp[2]
            .parse()
            .map_err(|_| VspError::TransportCorruption(format!("time_ns {:?} is not decimal", resp[2])))?;
        self.cycle = resp[3]
            .parse()
            .map_err(|_| VspError::TransportCorruption(format!("cycle {:?} is not decimal", resp[3])))?;
        Ok(())
    }

    fn fetch_version(&mut self) -> Result<(), VspError> {
        let resp = self.connection.command("version").ok_or(VspError::TransportClosed)?;
        if resp.len() != 3 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: "OK,<sysc_version>,<vcml_version>".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }
        self.sysc_version = resp[1].clone();
        self.vcml_version = resp[2].clone();
        Ok(())
    }

    fn fetch_quantum(&mut self) -> Result<(), VspError> {
        let resp = self.connection.command("getq").ok_or(VspError::TransportClosed)?;
        if resp.len() != 2 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: "OK,<quantum_ns>".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }
        self.quantum_ns = resp[1]
            .parse()
            .map_err(|_| VspError::TransportCorruption(format!("quantum_ns {:?} is not decimal", resp[1])))?;
        Ok(())
    }

    /// Fetches `list,xml` and rebuilds the module hierarchy and target
    /// list from it. The document root is `<hierarchy>`; modules are
    /// `<object>` elements; targets are the root-level `<target>`
    /// elements, whose text content (not an attribute) is the target's
    /// fully-qualified hierarchy name.
    fn fetch_hierarchy(&mut self) -> Result<(), VspError> {
        let resp = self.connection.command("list,xml").ok_or(VspError::TransportClosed)?;
        if resp.len() != 2 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: "OK,<xml>".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }

        let doc = Document::parse(&resp[1])
            .map_err(|err| VspError::TransportCorruption(format!("malformed hierarchy xml: {}", err)))?;

        let mut tree = ModuleTree::new_empty_root();
        let mut target_names = Vec::new();
        let root_id = tree.root();
        for child in doc.root_element().children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "object" => Self::parse_module(&mut tree, root_id, &child),
                "target" => target_names.push(Self::target_name(&child)),
                other => debug!(tag = other, "ignoring unrecognized hierarchy element"),
            }
        }

        self.root_module = tree;
        self.targets = target_names.into_iter().map(|name| Target::new(name, Vec::new())).collect();
        Ok(())
    }

    /// A `<target>` element's name is its text content, trimmed.
    fn target_name(node: &roxmltree::Node) -> String {
        node.text().unwrap_or_default().trim().to_string()
    }

    fn parse_module(tree: &mut ModuleTree, parent: ModuleId, node: &roxmltree::Node) {
        let name = node.attribute("name").unwrap_or_default().to_string();
        let kind = node.attribute("kind").unwrap_or_default().to_string();
        let version = node.attribute("version").unwrap_or_default().to_string();
        let id = tree.push_module(parent, name, kind, version);

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "object" => Self::parse_module(tree, id, &child),
                "attribute" => tree.push_attribute(
                    id,
                    AttributeData {
                        name: child.attribute("name").unwrap_or_default().to_string(),
                        ty: child.attribute("type").unwrap_or_default().to_string(),
                        count: child.attribute("count").and_then(|v| v.parse().ok()).unwrap_or(0),
                    },
                ),
                "command" => tree.push_command(
                    id,
                    CommandData {
                        name: child.attribute("name").unwrap_or_default().to_string(),
                        argc: child.attribute("argc").and_then(|v| v.parse().ok()).unwrap_or(0),
                        desc: child.attribute("desc").unwrap_or_default().to_string(),
                    },
                ),
                other => debug!(tag = other, "ignoring unrecognized hierarchy element"),
            }
        }
    }

    /// Populates `target.registers` via `lreg,<target>`, whose response
    /// gives register names only (`OK,r0,r1,...`). Each register's
    /// `size_bytes` is then established by issuing one
    /// `getr,<target>,<name>` and counting the returned byte fields.
    fn populate_registers(conn: &Connection, target: &mut Target) -> Result<(), VspError> {
        let resp = conn.command(&format!("lreg,{}", target.name)).ok_or(VspError::TransportClosed)?;
        if resp.is_empty() || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: "OK,<name>,...".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }

        let mut registers = Vec::with_capacity(resp.len() - 1);
        for name in &resp[1..] {
            let probe = conn
                .command(&format!("getr,{},{}", target.name, name))
                .ok_or(VspError::TransportClosed)?;
            if probe.is_empty() || probe[0] != "OK" {
                return Err(VspError::ProtocolShape {
                    expected: "OK,<byte>,...".to_string(),
                    got: format!("{} fields", probe.len()),
                });
            }
            registers.push(CpuReg { name: name.clone(), size_bytes: probe.len() - 1 });
        }

        if registers.is_empty() {
            warn!(target = %target.name, "target has no registers");
        }
        target.registers = registers;
        Ok(())
    }
}
