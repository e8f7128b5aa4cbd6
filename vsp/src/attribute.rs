//! Attribute reads and writes.

use vsp_protocol::join_fields;

use crate::{
    connection::Connection,
    tree::{ModuleId, ModuleTree},
};

/// A typed value that can be written to an attribute. Stringified as
/// booleans `true`/`false`, integers in base 10, floats with a
/// round-trippable representation, strings as-is.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
}

impl AttrValue {
    fn to_wire_string(&self) -> String {
        match self {
            AttrValue::Bool(b) => (if *b { "true" } else { "false" }).to_string(),
            AttrValue::I64(v) => v.to_string(),
            AttrValue::U64(v) => v.to_string(),
            // `{:?}` on f64 always round-trips and always includes a
            // decimal point (`1.0` rather than `1`), which the simulator
            // can parse back unambiguously.
            AttrValue::F64(v) => format!("{:?}", v),
            AttrValue::Str(s) => s.clone(),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}
impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::I64(v)
    }
}
impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::U64(v)
    }
}
impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::F64(v)
    }
}
impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}
impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

/// A borrowed view of one attribute, belonging to exactly one module.
pub struct Attribute<'a> {
    pub(crate) tree: &'a ModuleTree,
    pub(crate) conn: &'a Connection,
    pub(crate) module: ModuleId,
    pub(crate) index: usize,
}

impl<'a> Attribute<'a> {
    fn data(&self) -> &'a crate::tree::AttributeData {
        &self.tree.node(self.module).attributes[self.index]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn ty(&self) -> &str {
        &self.data().ty
    }

    pub fn count(&self) -> usize {
        self.data().count
    }

    pub fn hierarchy_name(&self) -> String {
        self.tree.leaf_hierarchy_name(self.module, self.name())
    }

    /// Reads the attribute's current value. A zero `count` fails
    /// locally without issuing a wire request.
    pub fn get(&self) -> Option<Vec<String>> {
        let count = self.count();
        if count == 0 {
            return None;
        }

        let resp = self.conn.command(&format!("geta,{}", self.hierarchy_name()));
        if !Connection::check_response(&resp, count + 1) {
            return None;
        }

        let mut fields = resp.unwrap();
        fields.remove(0);
        Some(fields)
    }

    /// Like [`Attribute::get`], but joins the fields into one string,
    /// returning the `"<error>"` sentinel on failure (matching the
    /// reference implementation's `get_str`).
    pub fn get_str(&self) -> String {
        match self.get() {
            Some(fields) => fields.join(","),
            None => "<error>".to_string(),
        }
    }

    /// Writes `value`. Succeeds iff the response is a bare one-field
    /// `OK`.
    pub fn set(&self, value: impl Into<AttrValue>) -> bool {
        let value = value.into().to_wire_string();
        let cmd = format!(
            "seta,{},{}",
            self.hierarchy_name(),
            join_fields([value.as_str()])
        );
        let resp = self.conn.command(&cmd);
        Connection::check_response(&resp, 1)
    }
}
