//! Named collection of tools available to a session.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::tool::Tool;
use super::types::ToolDeclaration;
use crate::error::ChatError;

/// Immutable-after-construction set of tools, shared through `Arc`.
///
/// Several differently configured registries may coexist; each session is
/// handed the one it should use.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ChatError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ChatError::Configuration(format!(
                "Tool {name} is already registered"
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Result<Self, ChatError> {
        self.register(Arc::new(tool))?;
        Ok(self)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ChatError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ChatError::ToolNotFound(name.to_string()))
    }

    /// Declarations sorted by tool name.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.values().map(|tool| tool.declaration()).collect()
    }

    /// A registry holding only the named tools.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, ChatError> {
        let mut selected = Self::new();
        for name in names {
            selected.register(self.resolve(name.as_ref())?)?;
        }
        Ok(selected)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}
