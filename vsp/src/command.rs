//! Command invocation.

use vsp_protocol::{join_fields, VspError};

use crate::{
    connection::Connection,
    tree::{ModuleId, ModuleTree},
};

/// A borrowed view of one named command, belonging to exactly one
/// module.
pub struct Command<'a> {
    pub(crate) tree: &'a ModuleTree,
    pub(crate) conn: &'a Connection,
    pub(crate) module: ModuleId,
    pub(crate) index: usize,
}

impl<'a> Command<'a> {
    fn data(&self) -> &'a crate::tree::CommandData {
        &self.tree.node(self.module).commands[self.index]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn argc(&self) -> usize {
        self.data().argc
    }

    pub fn desc(&self) -> &str {
        &self.data().desc
    }

    /// Invokes the command with `args`. If `args.len() != argc()`, fails
    /// locally with [`VspError::ArgumentMismatch`] without touching the
    /// wire. Otherwise sends `exec,<module>,<cmd>[,args...]`: an `E`
    /// response becomes [`VspError::ProtocolRefused`] carrying the
    /// simulator's message; a transport failure is
    /// [`VspError::TransportClosed`]; anything else returns the joined
    /// response tail.
    pub fn execute(&self, args: &[String]) -> Result<String, VspError> {
        if args.len() != self.argc() {
            return Err(VspError::ArgumentMismatch { expected: self.argc(), got: args.len() });
        }
        self.execute_raw(&join_fields(args))
    }

    /// Invokes the command with a pre-joined argument string, bypassing
    /// the argc guard. Mirrors the reference implementation's
    /// string-argument overload.
    pub fn execute_raw(&self, raw_args: &str) -> Result<String, VspError> {
        let module_name = self.tree.hierarchy_name(self.module);
        let mut cmd = format!("exec,{},{}", module_name, self.name());
        if !raw_args.is_empty() {
            cmd.push(',');
            cmd.push_str(raw_args);
        }

        let resp = self.conn.command_checked(&cmd)?;
        if resp.is_empty() {
            return Err(VspError::ProtocolShape {
                expected: "at least 1 field".to_string(),
                got: "0 fields".to_string(),
            });
        }

        let tail = resp[1..].join(",");
        if resp[0] == "E" {
            return Err(VspError::ProtocolRefused { message: tail });
        }

        Ok(tail)
    }
}
