//! Hierarchical module view.

use std::fmt;

use crate::{
    attribute::Attribute,
    command::Command,
    connection::Connection,
    tree::{ModuleId, ModuleTree},
};

/// A borrowed view into one node of a [`crate::Session`]'s module
/// hierarchy.
#[derive(Clone, Copy)]
pub struct Module<'a> {
    pub(crate) tree: &'a ModuleTree,
    pub(crate) conn: &'a Connection,
    pub(crate) id: ModuleId,
}

impl<'a> Module<'a> {
    pub(crate) fn new(tree: &'a ModuleTree, conn: &'a Connection, id: ModuleId) -> Module<'a> {
        Module { tree, conn, id }
    }

    pub fn name(&self) -> &str {
        &self.tree.node(self.id).name
    }

    pub fn kind(&self) -> &str {
        &self.tree.node(self.id).kind
    }

    pub fn version(&self) -> &str {
        &self.tree.node(self.id).version
    }

    pub fn hierarchy_name(&self) -> String {
        self.tree.hierarchy_name(self.id)
    }

    pub fn parent(&self) -> Option<Module<'a>> {
        self.tree.node(self.id).parent.map(|p| Module::new(self.tree, self.conn, p))
    }

    pub fn modules(&self) -> impl Iterator<Item = Module<'a>> + 'a {
        let tree = self.tree;
        let conn = self.conn;
        tree.node(self.id).children.iter().map(move |&c| Module::new(tree, conn, c))
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute<'a>> + 'a {
        let tree = self.tree;
        let conn = self.conn;
        let module = self.id;
        (0..tree.node(module).attributes.len()).map(move |index| Attribute { tree, conn, module, index })
    }

    pub fn commands(&self) -> impl Iterator<Item = Command<'a>> + 'a {
        let tree = self.tree;
        let conn = self.conn;
        let module = self.id;
        (0..tree.node(module).commands.len()).map(move |index| Command { tree, conn, module, index })
    }

    /// Resolves a dot-separated path relative to this module. The empty
    /// string denotes the receiver itself.
    pub fn find_module(&self, path: &str) -> Option<Module<'a>> {
        self.tree.find_module(self.id, path).map(|id| Module::new(self.tree, self.conn, id))
    }

    pub fn find_attribute(&self, path: &str) -> Option<Attribute<'a>> {
        let (module, index) = self.tree.find_attribute(self.id, path)?;
        Some(Attribute { tree: self.tree, conn: self.conn, module, index })
    }

    pub fn find_command(&self, path: &str) -> Option<Command<'a>> {
        let (module, index) = self.tree.find_command(self.id, path)?;
        Some(Command { tree: self.tree, conn: self.conn, module, index })
    }

    fn dump_indented(&self, out: &mut impl fmt::Write, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        writeln!(out, "{}{} ({})", indent, self.hierarchy_name(), self.kind())?;
        for attr in self.attributes() {
            writeln!(out, "{}  {}: {}", indent, attr.name(), attr.ty())?;
        }
        for child in self.modules() {
            child.dump_indented(out, depth + 1)?;
        }
        Ok(())
    }

    /// Writes a human-readable dump (hierarchy name, kind, then
    /// attributes and child modules) to `out`.
    pub fn dump_to(&self, out: &mut impl fmt::Write) -> fmt::Result {
        self.dump_indented(out, 0)
    }
}

impl<'a> fmt::Display for Module<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump_to(f)
    }
}
