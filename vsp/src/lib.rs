//! `vsp` is a client library for the Virtual-Simulation-Platform debug
//! protocol: a framed TCP request/response protocol exposed by a
//! SystemC/VCML simulator. It connects to a running simulation, walks
//! its module hierarchy, reads and writes attributes, invokes commands,
//! inspects CPU registers and virtual memory, and manages breakpoints
//! and watchpoints.
//!
//! The wire codec and error taxonomy live in the sibling `vsp-protocol`
//! crate; this crate owns the socket and the in-memory views built on
//! top of it.

pub mod attribute;
pub mod command;
mod config;
mod connection;
pub mod cpureg;
pub mod discovery;
pub mod module;
pub mod session;
pub mod target;
mod tree;

pub use attribute::{AttrValue, Attribute};
pub use command::Command;
pub use config::{ConnectConfig, VspConfig};
pub use connection::Connection;
pub use cpureg::CpuReg;
pub use discovery::{known_sessions, scan_sessions, SessionInfo};
pub use module::Module;
pub use session::Session;
pub use target::{Breakpoint, Target, WatchAccess, Watchpoint};

pub use vsp_protocol::{RunState, StopReason, VspError};
