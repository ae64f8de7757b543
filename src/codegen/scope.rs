//! Lexical scopes for code generation.
//!
//! Frames live in one arena and refer to their parent by index, so a frame
//! never owns its ancestors. A frame is popped when its block has been
//! lowered; its storage stays in the arena but can no longer become current,
//! which keeps every `ScopeId` handed out earlier valid for diagnostics.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::codegen::error::{CodegenError, CodegenResult};
use crate::ir::StackSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

#[derive(Debug)]
struct Frame {
    label: String,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    bindings: FxHashMap<String, StackSlot>,
}

#[derive(Debug, Default)]
pub struct ScopeTable {
    frames: Vec<Frame>,
    current: Option<ScopeId>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a child of the current frame (or a new root) and makes it current.
    pub fn enter_scope(&mut self, label: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.frames.len());
        let parent = self.current;
        let label = label.into();
        log::trace!("enter {id} `{label}` (parent {parent:?})");
        self.frames.push(Frame {
            label,
            parent,
            children: Vec::new(),
            bindings: FxHashMap::default(),
        });
        if let Some(parent) = parent {
            self.frames[parent.0].children.push(id);
        }
        self.current = Some(id);
        id
    }

    /// Pops `scope`, which must be the current frame.
    pub fn exit_scope(&mut self, scope: ScopeId) -> CodegenResult<()> {
        if self.current != Some(scope) {
            return Err(CodegenError::ScopeMismatch {
                label: self.label(scope).unwrap_or_default().to_string(),
                expected: scope,
                current: self.current,
            });
        }
        let frame = &self.frames[scope.0];
        log::trace!("exit {scope} `{}`", frame.label);
        self.current = frame.parent;
        Ok(())
    }

    /// Binds `name` in the current frame, replacing a binding of the same
    /// name in that frame. Does nothing when no frame is open.
    pub fn define(&mut self, name: impl Into<String>, slot: StackSlot) {
        if let Some(current) = self.current {
            self.frames[current.0].bindings.insert(name.into(), slot);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<StackSlot> {
        self.chain().find_map(|frame| frame.bindings.get(name).copied())
    }

    pub fn resolve(&self, name: &str) -> CodegenResult<StackSlot> {
        self.lookup(name)
            .ok_or_else(|| CodegenError::UnresolvedVariable {
                name: name.to_string(),
                function: self.root_label().unwrap_or_default().to_string(),
            })
    }

    pub fn label(&self, scope: ScopeId) -> Option<&str> {
        self.frames.get(scope.0).map(|frame| frame.label.as_str())
    }

    #[cfg(test)]
    fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.frames.get(scope.0).and_then(|frame| frame.parent)
    }

    #[cfg(test)]
    fn children(&self, scope: ScopeId) -> &[ScopeId] {
        self.frames
            .get(scope.0)
            .map(|frame| frame.children.as_slice())
            .unwrap_or_default()
    }

    /// Nesting depth of the current frame; zero when no frame is open.
    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// Label of the outermost frame enclosing the current one.
    fn root_label(&self) -> Option<&str> {
        self.chain().last().map(|frame| frame.label.as_str())
    }

    fn chain(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.current.map(|id| &self.frames[id.0]), |frame| {
            frame.parent.map(|parent| &self.frames[parent.0])
        })
    }
}
