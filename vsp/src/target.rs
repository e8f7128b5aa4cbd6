//! Execution targets: registers, breakpoints, watchpoints, memory.

use std::collections::HashMap;

use vsp_protocol::VspError;

use crate::{connection::Connection, cpureg::CpuReg};

/// Which accesses trip a watchpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchAccess {
    Read,
    Write,
    ReadWrite,
}

impl WatchAccess {
    fn wire_tag(self) -> &'static str {
        match self {
            WatchAccess::Read => "r",
            WatchAccess::Write => "w",
            WatchAccess::ReadWrite => "rw",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Breakpoint {
    pub addr: u64,
    pub id: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Watchpoint {
    pub base: u64,
    pub size: usize,
    pub access: WatchAccess,
    pub id: u32,
}

/// Parses a `mkbp`/`mkwp` acknowledgement message: the id is the
/// decimal token after the *last* space in the message, not a dedicated
/// field.
fn parse_trailing_id(message: &str) -> Result<u32, VspError> {
    let token = message.rsplit(' ').next().unwrap_or(message);
    token
        .parse()
        .map_err(|_| VspError::TransportCorruption(format!("id message {:?} has no trailing decimal id", message)))
}

/// One addressable execution unit (typically a CPU core) within a
/// session, with its own register file, breakpoints, and watchpoints.
#[derive(Debug)]
pub struct Target {
    pub(crate) name: String,
    pub(crate) registers: Vec<CpuReg>,
    breakpoints: HashMap<u64, u32>,
    watchpoints: HashMap<(u64, usize, WatchAccess), u32>,
}

impl Target {
    pub(crate) fn new(name: String, registers: Vec<CpuReg>) -> Target {
        Target { name, registers, breakpoints: HashMap::new(), watchpoints: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registers(&self) -> &[CpuReg] {
        &self.registers
    }

    pub fn find_register(&self, name: &str) -> Option<&CpuReg> {
        self.registers.iter().find(|r| r.name == name)
    }

    /// The program counter, located by register name ("pc" or "PC") and
    /// decoded little-endian: index 0 is the lowest-order byte.
    pub fn pc(&self, conn: &Connection) -> Result<u64, VspError> {
        let reg = self
            .find_register("pc")
            .or_else(|| self.find_register("PC"))
            .ok_or_else(|| VspError::Semantic { what: "register pc".to_string() })?;
        reg.get_u64(conn, &self.name)
    }

    /// Single-steps this target once. Does not itself wait for the
    /// simulator to actually halt — callers poll session status.
    pub fn step(&self, conn: &Connection) -> Result<(), VspError> {
        let cmd = format!("step,{}", self.name);
        let resp = conn.command_checked(&cmd)?;
        if !Connection::check_response(&Some(resp), 1) {
            return Err(VspError::ProtocolShape { expected: "OK".to_string(), got: "other".to_string() });
        }
        Ok(())
    }

    /// Translates a virtual address to a physical one. `0` is both a
    /// valid physical address and the failure sentinel; this returns
    /// `0` for both a transport failure and an explicit
    /// simulator-side translation failure, same as the reference
    /// implementation.
    pub fn virt_to_phys(&self, conn: &Connection, vaddr: u64) -> u64 {
        let cmd = format!("vapa,{},{}", self.name, vaddr);
        let resp = match conn.command(&cmd) {
            Some(r) => r,
            None => return 0,
        };
        if resp.len() != 2 || resp[0] != "OK" {
            return 0;
        }
        u64::from_str_radix(&resp[1], 16).unwrap_or(0)
    }

    /// Inserts a breakpoint at `addr`. Re-inserting an address that
    /// already has one is a no-op that returns the existing id without
    /// a second wire round trip.
    pub fn insert_breakpoint(&mut self, conn: &Connection, addr: u64) -> Result<u32, VspError> {
        if let Some(&id) = self.breakpoints.get(&addr) {
            return Ok(id);
        }

        let cmd = format!("mkbp,{},{}", self.name, addr);
        let resp = conn.command_checked(&cmd)?;
        if resp.len() != 2 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: "OK,<message ending in decimal id>".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }
        let id = parse_trailing_id(&resp[1])?;
        self.breakpoints.insert(addr, id);
        Ok(id)
    }

    /// Removes a previously inserted breakpoint. `rmbp` takes only the
    /// id, not the target — it is globally scoped.
    pub fn remove_breakpoint(&mut self, conn: &Connection, addr: u64) -> Result<(), VspError> {
        let id = match self.breakpoints.remove(&addr) {
            Some(id) => id,
            None => return Ok(()),
        };
        let cmd = format!("rmbp,{}", id);
        let resp = conn.command_checked(&cmd)?;
        if !Connection::check_response(&Some(resp), 1) {
            return Err(VspError::ProtocolShape { expected: "OK".to_string(), got: "other".to_string() });
        }
        Ok(())
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = Breakpoint> + '_ {
        self.breakpoints.iter().map(|(&addr, &id)| Breakpoint { addr, id })
    }

    /// Inserts a watchpoint over `[base, base+size)`. Re-inserting an
    /// identical `(base, size, access)` triple is a no-op that returns
    /// the existing id.
    pub fn insert_watchpoint(
        &mut self,
        conn: &Connection,
        base: u64,
        size: usize,
        access: WatchAccess,
    ) -> Result<u32, VspError> {
        let key = (base, size, access);
        if let Some(&id) = self.watchpoints.get(&key) {
            return Ok(id);
        }

        let cmd = format!("mkwp,{},{},{},{}", self.name, base, size, access.wire_tag());
        let resp = conn.command_checked(&cmd)?;
        if resp.len() != 2 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: "OK,<message ending in decimal id>".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }
        let id = parse_trailing_id(&resp[1])?;
        self.watchpoints.insert(key, id);
        Ok(id)
    }

    /// Removes a previously inserted watchpoint. `rmwp` takes the id and
    /// access kind, not the target.
    pub fn remove_watchpoint(
        &mut self,
        conn: &Connection,
        base: u64,
        size: usize,
        access: WatchAccess,
    ) -> Result<(), VspError> {
        let key = (base, size, access);
        let id = match self.watchpoints.remove(&key) {
            Some(id) => id,
            None => return Ok(()),
        };
        let cmd = format!("rmwp,{},{}", id, access.wire_tag());
        let resp = conn.command_checked(&cmd)?;
        if !Connection::check_response(&Some(resp), 1) {
            return Err(VspError::ProtocolShape { expected: "OK".to_string(), got: "other".to_string() });
        }
        Ok(())
    }

    pub fn watchpoints(&self) -> impl Iterator<Item = Watchpoint> + '_ {
        self.watchpoints.iter().map(|(&(base, size, access), &id)| Watchpoint { base, size, access, id })
    }

    /// Reads `len` bytes of virtual memory starting at `vaddr`. On
    /// failure the simulator returns an empty field list; this client
    /// surfaces that as `ProtocolShape` rather than an empty `Ok(vec![])`
    /// so callers cannot mistake it for a genuine zero-length read.
    pub fn read_vmem(&self, conn: &Connection, vaddr: u64, len: usize) -> Result<Vec<u8>, VspError> {
        let cmd = format!("vread,{},{},{}", self.name, vaddr, len);
        let resp = conn.command_checked(&cmd)?;
        if resp.len() != len + 1 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: format!("OK + {} byte fields", len),
                got: format!("{} fields", resp.len()),
            });
        }
        resp[1..]
            .iter()
            .map(|field| {
                u8::from_str_radix(field, 16)
                    .map_err(|_| VspError::TransportCorruption(format!("memory byte {:?} is not valid hex", field)))
            })
            .collect()
    }

    pub fn write_vmem(&self, conn: &Connection, vaddr: u64, bytes: &[u8]) -> Result<(), VspError> {
        let byte_fields: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
        let cmd = format!("vwrite,{},{},{}", self.name, vaddr, byte_fields.join(","));
        let resp = conn.command_checked(&cmd)?;
        if !Connection::check_response(&Some(resp), 2) {
            return Err(VspError::ProtocolShape { expected: "OK,<status>".to_string(), got: "other".to_string() });
        }
        Ok(())
    }
}
