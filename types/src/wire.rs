//! Payloads of the server's custom requests.
//!
//! Field names follow the server's JSON exactly; unknown fields are ignored
//! so newer servers can add data without breaking the client.

use serde::{Deserialize, Serialize};

/// Identifies which front end (source file entry) a file was loaded through.
///
/// Servers report this either as a numeric entry index or as a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrontEndTag {
    Index(u64),
    Name(String),
}

impl std::fmt::Display for FrontEndTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A source file known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub fe: FrontEndTag,
    pub name: String,
    pub dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A design entity and the library it was analyzed into.
///
/// Also the parameter object of the entity-interface request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub library: String,
}

impl Entity {
    #[must_use]
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library: library.into(),
        }
    }

    /// Parse `library.name`, or a bare `name` placed in `default_library`.
    ///
    /// Returns `None` when either component is empty.
    #[must_use]
    pub fn parse(text: &str, default_library: &str) -> Option<Self> {
        let (library, name) = match text.trim().split_once('.') {
            Some((library, name)) => (library.trim(), name.trim()),
            None => (default_library.trim(), text.trim()),
        };
        if library.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(library, name))
    }

    /// `library.name`, as written in an `entity` instantiation.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.library, self.name)
    }
}

/// One generic or port of an entity interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceItem {
    pub name: String,
}

/// Ordered generics and ports of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInterface {
    #[serde(default)]
    pub generics: Vec<InterfaceItem>,
    #[serde(default)]
    pub ports: Vec<InterfaceItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_file_with_numeric_fe() {
        let json = serde_json::json!({
            "fe": 3,
            "name": "top.vhd",
            "dir": "/work/src",
            "uri": "file:///work/src/top.vhd"
        });
        let file: SourceFile = serde_json::from_value(json).unwrap();
        assert_eq!(file.fe, FrontEndTag::Index(3));
        assert_eq!(file.fe.to_string(), "3");
        assert_eq!(file.uri.as_deref(), Some("file:///work/src/top.vhd"));
    }

    #[test]
    fn source_file_without_uri() {
        let json = serde_json::json!({ "fe": "vhdl", "name": "pkg.vhd", "dir": "." });
        let file: SourceFile = serde_json::from_value(json).unwrap();
        assert_eq!(file.fe, FrontEndTag::Name("vhdl".to_string()));
        assert!(file.uri.is_none());
    }

    #[test]
    fn entity_parse_qualified() {
        let entity = Entity::parse("ieee_proposed.fifo", "work").unwrap();
        assert_eq!(entity.library, "ieee_proposed");
        assert_eq!(entity.name, "fifo");
        assert_eq!(entity.qualified_name(), "ieee_proposed.fifo");
    }

    #[test]
    fn entity_parse_bare_uses_default_library() {
        let entity = Entity::parse("  counter ", "work").unwrap();
        assert_eq!(entity, Entity::new("work", "counter"));
    }

    #[test]
    fn entity_parse_rejects_empty_parts() {
        assert!(Entity::parse("", "work").is_none());
        assert!(Entity::parse("lib.", "work").is_none());
        assert!(Entity::parse(".name", "work").is_none());
    }

    #[test]
    fn entity_serializes_as_request_params() {
        let params = serde_json::to_value(Entity::new("work", "uart")).unwrap();
        assert_eq!(params, serde_json::json!({ "name": "uart", "library": "work" }));
    }

    #[test]
    fn interface_keeps_order_and_ignores_extra_fields() {
        let json = serde_json::json!({
            "entity": { "name": "uart", "library": "work" },
            "generics": [{ "name": "WIDTH", "type": "natural" }],
            "ports": [{ "name": "clk" }, { "name": "rst" }, { "name": "tx" }]
        });
        let iface: EntityInterface = serde_json::from_value(json).unwrap();
        assert_eq!(iface.generics.len(), 1);
        let ports: Vec<&str> = iface.ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(ports, ["clk", "rst", "tx"]);
    }

    #[test]
    fn interface_missing_lists_default_empty() {
        let iface: EntityInterface = serde_json::from_str("{}").unwrap();
        assert!(iface.generics.is_empty());
        assert!(iface.ports.is_empty());
    }
}
