use std::fmt;

use crate::tool::{ToolDescriptor, ToolError};

/// A registry mapping connected services to the tools they declared.
///
/// Entries keep insertion order. When two services declare a tool with the
/// same name, [`resolve`](ToolRegistry::resolve) returns the service that
/// connected first; the registry does not treat the collision as an error.
pub struct ToolRegistry {
    entries: Vec<ServiceEntry>,
}

/// One connected service and its declared tool list.
#[derive(Debug, Clone)]
pub struct ServiceEntry {
    /// Identifier of the service that declared these tools
    pub service_id: String,
    /// The tools, in the order the service declared them
    pub tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Records the tool list declared by a service.
    ///
    /// Replaces any prior entry for the same service in place, so a
    /// reconnecting service keeps its position in resolution order.
    pub fn register(&mut self, service_id: impl Into<String>, tools: Vec<ToolDescriptor>) {
        let service_id = service_id.into();
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.service_id == service_id)
        {
            Some(entry) => entry.tools = tools,
            None => self.entries.push(ServiceEntry { service_id, tools }),
        }
    }

    /// Removes a service and its tools. No-op if the service is unknown.
    pub fn unregister(&mut self, service_id: &str) -> Option<ServiceEntry> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.service_id == service_id)?;
        Some(self.entries.remove(pos))
    }

    /// Finds the service that owns a tool, scanning in insertion order.
    ///
    /// First match wins when the name is declared by more than one service.
    pub fn resolve(&self, tool_name: &str) -> Result<&str, ToolError> {
        self.entries
            .iter()
            .find(|entry| entry.tools.iter().any(|tool| tool.name == tool_name))
            .map(|entry| entry.service_id.as_str())
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))
    }

    /// Flattens every declared tool in insertion order, for handing to the
    /// language model.
    pub fn tool_definitions(&self) -> Vec<ToolDescriptor> {
        self.entries
            .iter()
            .flat_map(|entry| entry.tools.iter().cloned())
            .collect()
    }

    /// Returns the connected service ids in insertion order.
    pub fn service_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.service_id.clone())
            .collect()
    }

    /// Returns the number of connected services.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether any service is connected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("services", &self.entries.len())
            .field(
                "tools",
                &self.entries.iter().map(|e| e.tools.len()).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: format!("{} tool", name),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn resolve_returns_owning_service() {
        let mut registry = ToolRegistry::new();
        registry.register("flights", vec![descriptor("search_flights")]);
        registry.register("hotels", vec![descriptor("search_hotels")]);

        assert_eq!(registry.resolve("search_hotels").unwrap(), "hotels");
        assert_eq!(registry.resolve("search_flights").unwrap(), "flights");
    }

    #[test]
    fn resolve_unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.resolve("missing"),
            Err(ToolError::NotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn duplicate_tool_name_resolves_to_first_registered_service() {
        let mut registry = ToolRegistry::new();
        registry.register("first", vec![descriptor("foo")]);
        registry.register("second", vec![descriptor("foo")]);

        assert_eq!(registry.resolve("foo").unwrap(), "first");
    }

    #[test]
    fn register_replaces_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register("a", vec![descriptor("one")]);
        registry.register("b", vec![descriptor("two")]);
        registry.register("a", vec![descriptor("three")]);

        assert_eq!(registry.len(), 2);
        assert!(matches!(registry.resolve("one"), Err(ToolError::NotFound(_))));
        assert_eq!(registry.resolve("three").unwrap(), "a");
        // Replacement keeps the original position in resolution order.
        assert_eq!(registry.service_ids(), vec!["a", "b"]);
    }

    #[test]
    fn unregister_removes_tools_from_resolution() {
        let mut registry = ToolRegistry::new();
        registry.register("svc", vec![descriptor("foo")]);
        assert!(registry.unregister("svc").is_some());
        assert!(registry.unregister("svc").is_none());
        assert!(matches!(registry.resolve("foo"), Err(ToolError::NotFound(_))));
    }

    #[test]
    fn tool_definitions_flatten_in_insertion_order() {
        let mut registry = ToolRegistry::new();
        registry.register("a", vec![descriptor("one"), descriptor("two")]);
        registry.register("b", vec![descriptor("three")]);

        let names: Vec<_> = registry
            .tool_definitions()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }
}
