//! Arena-backed module hierarchy.
//!
//! Modules form a tree with owned children and a non-owning parent
//! back-reference. Rather than `Rc`/`Weak` (which would let the tree
//! outlive its connection in surprising ways) or raw pointers, the tree
//! is stored as a flat arena indexed by [`ModuleId`]; the parent
//! reference is just another index. The whole arena is dropped at once
//! on disconnect/reconnect, so deleting a module deletes all of its
//! descendants exactly once.

/// An index into a [`ModuleTree`]'s arena. Cheap to copy, meaningless
/// outside the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleId(usize);

#[derive(Debug, Clone)]
pub(crate) struct AttributeData {
    pub name: String,
    pub ty: String,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct CommandData {
    pub name: String,
    pub argc: usize,
    pub desc: String,
}

#[derive(Debug)]
pub(crate) struct ModuleNode {
    pub name: String,
    pub kind: String,
    pub version: String,
    pub parent: Option<ModuleId>,
    pub children: Vec<ModuleId>,
    pub attributes: Vec<AttributeData>,
    pub commands: Vec<CommandData>,
}

/// Owns the whole module hierarchy built from one `list,xml` response.
/// Node 0 is always the synthetic root, with an empty name.
#[derive(Debug)]
pub struct ModuleTree {
    pub(crate) nodes: Vec<ModuleNode>,
}

impl ModuleTree {
    pub(crate) fn new_empty_root() -> ModuleTree {
        ModuleTree {
            nodes: vec![ModuleNode {
                name: String::new(),
                kind: String::new(),
                version: String::new(),
                parent: None,
                children: Vec::new(),
                attributes: Vec::new(),
                commands: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> ModuleId {
        ModuleId(0)
    }

    pub(crate) fn node(&self, id: ModuleId) -> &ModuleNode {
        &self.nodes[id.0]
    }

    /// Appends a new child module under `parent`, returning its id.
    pub(crate) fn push_module(
        &mut self,
        parent: ModuleId,
        name: String,
        kind: String,
        version: String,
    ) -> ModuleId {
        let id = ModuleId(self.nodes.len());
        self.nodes.push(ModuleNode {
            name,
            kind,
            version,
            parent: Some(parent),
            children: Vec::new(),
            attributes: Vec::new(),
            commands: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn push_attribute(&mut self, module: ModuleId, data: AttributeData) {
        self.nodes[module.0].attributes.push(data);
    }

    pub(crate) fn push_command(&mut self, module: ModuleId, data: CommandData) {
        self.nodes[module.0].commands.push(data);
    }

    /// Hierarchy name : dot-joined local names from the
    /// top-level child down. The root contributes no segment.
    pub fn hierarchy_name(&self, id: ModuleId) -> String {
        match self.node(id).parent {
            None => String::new(),
            Some(parent) => {
                let parent_name = self.hierarchy_name(parent);
                if parent_name.is_empty() {
                    self.node(id).name.clone()
                } else {
                    format!("{}.{}", parent_name, self.node(id).name)
                }
            }
        }
    }

    /// The hierarchy name a leaf (attribute or command) named `leaf`
    /// would have under `module`.
    pub(crate) fn leaf_hierarchy_name(&self, module: ModuleId, leaf: &str) -> String {
        let module_name = self.hierarchy_name(module);
        if module_name.is_empty() {
            leaf.to_string()
        } else {
            format!("{}.{}", module_name, leaf)
        }
    }

    /// Descends from `from` following the dot-separated path; the empty
    /// string denotes the receiver itself.
    pub fn find_module(&self, from: ModuleId, path: &str) -> Option<ModuleId> {
        if path.is_empty() {
            return Some(from);
        }

        let (head, rest) = match path.split_once('.') {
            Some((h, r)) => (h, Some(r)),
            None => (path, None),
        };

        let child = self
            .node(from)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).name == head)?;

        match rest {
            Some(rest) => self.find_module(child, rest),
            None => Some(child),
        }
    }

    /// Splits `path` into (module path, leaf name) on the *last* dot.
    fn split_leaf(path: &str) -> (&str, &str) {
        match path.rfind('.') {
            Some(pos) => (&path[..pos], &path[pos + 1..]),
            None => ("", path),
        }
    }

    pub fn find_attribute(&self, from: ModuleId, path: &str) -> Option<(ModuleId, usize)> {
        let (module_path, leaf) = Self::split_leaf(path);
        let module = self.find_module(from, module_path)?;
        let idx = self.node(module).attributes.iter().position(|a| a.name == leaf)?;
        Some((module, idx))
    }

    pub fn find_command(&self, from: ModuleId, path: &str) -> Option<(ModuleId, usize)> {
        let (module_path, leaf) = Self::split_leaf(path);
        let module = self.find_module(from, module_path)?;
        let idx = self.node(module).commands.iter().position(|c| c.name == leaf)?;
        Some((module, idx))
    }
}
