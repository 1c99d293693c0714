//! Interface signature table: the host-facing API description.
//!
//! Every wrapper method maps to exactly one module export.  The table records
//! the export name, the parameter kinds as the host sees them, and the return
//! kind, so tooling can check a module against the wrappers and render a
//! declaration file.

use serde::{Deserialize, Serialize};

/// The kind of a value as seen by host code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Passed through as a raw `i32`.
    Number,
    /// Marshalled as `0`/`1`.
    Boolean,
    /// Marshalled through the string codec as `(ptr, len)`.
    String,
    /// Marshalled through the object heap.
    Object,
    /// A module-side allocation owned by another wrapper.
    Handle,
    /// No value.
    Void,
}

impl ValueKind {
    /// Number of `i32` slots this kind occupies in an export's parameter list.
    pub fn abi_width(self) -> usize {
        match self {
            Self::String => 2,
            Self::Void => 0,
            _ => 1,
        }
    }

    fn declaration(self, type_name: Option<&str>) -> String {
        match self {
            Self::Number => "number".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::String => "string".to_string(),
            Self::Object => "any".to_string(),
            Self::Handle => type_name.unwrap_or("unknown").to_string(),
            Self::Void => "void".to_string(),
        }
    }
}

/// A single named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ValueKind,
    /// Wrapper type name for [`ValueKind::Handle`] parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl Param {
    pub fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            type_name: None,
        }
    }

    pub fn handle(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ValueKind::Handle,
            type_name: Some(type_name.to_string()),
        }
    }
}

/// How a method relates to the lifecycle of its wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Constructor,
    Method,
    Destructor,
}

/// One wrapper method and the export it calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub export: String,
    pub kind: MethodKind,
    pub params: Vec<Param>,
    pub returns: ValueKind,
}

impl MethodSignature {
    /// Number of `i32` parameters the export takes, including the receiver
    /// handle for methods and destructors.  String returns use an extra
    /// leading return-slot pointer.
    pub fn abi_param_count(&self) -> usize {
        let receiver = usize::from(self.kind != MethodKind::Constructor);
        let ret_slot = usize::from(self.returns == ValueKind::String);
        receiver + ret_slot + self.params.iter().map(|p| p.kind.abi_width()).sum::<usize>()
    }

    /// Number of `i32` results the export produces.
    pub fn abi_result_count(&self) -> usize {
        match self.kind {
            MethodKind::Constructor => 1,
            _ => match self.returns {
                ValueKind::Void | ValueKind::String => 0,
                _ => 1,
            },
        }
    }
}

/// All methods of one exported type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSignature {
    pub name: String,
    pub methods: Vec<MethodSignature>,
}

/// The complete host-facing interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceTable {
    pub types: Vec<TypeSignature>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// Iterate over every export name referenced by the table.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.types
            .iter()
            .flat_map(|t| t.methods.iter().map(|m| m.export.as_str()))
    }

    /// Look up the signature whose export is `export`.
    pub fn find_export(&self, export: &str) -> Option<(&TypeSignature, &MethodSignature)> {
        self.types.iter().find_map(|t| {
            t.methods
                .iter()
                .find(|m| m.export == export)
                .map(|m| (t, m))
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Render a TypeScript-style declaration file for the table.
    pub fn render_declarations(&self) -> String {
        let mut out = String::new();
        for ty in &self.types {
            out.push_str(&format!("export class {} {{\n", ty.name));
            for method in &ty.methods {
                let params = method
                    .params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.kind.declaration(p.type_name.as_deref())))
                    .collect::<Vec<_>>()
                    .join(", ");
                match method.kind {
                    MethodKind::Constructor => {
                        out.push_str(&format!("  constructor({params});\n"));
                    }
                    MethodKind::Method | MethodKind::Destructor => {
                        out.push_str(&format!(
                            "  {}({params}): {};\n",
                            method.name,
                            method.returns.declaration(None)
                        ));
                    }
                }
            }
            out.push_str("}\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InterfaceTable {
        InterfaceTable {
            types: vec![TypeSignature {
                name: "Counter".to_string(),
                methods: vec![
                    MethodSignature {
                        name: "new".to_string(),
                        export: "counter_new".to_string(),
                        kind: MethodKind::Constructor,
                        params: vec![Param::new("label", ValueKind::String)],
                        returns: ValueKind::Handle,
                    },
                    MethodSignature {
                        name: "label".to_string(),
                        export: "counter_label".to_string(),
                        kind: MethodKind::Method,
                        params: vec![],
                        returns: ValueKind::String,
                    },
                    MethodSignature {
                        name: "is_zero".to_string(),
                        export: "counter_is_zero".to_string(),
                        kind: MethodKind::Method,
                        params: vec![],
                        returns: ValueKind::Boolean,
                    },
                ],
            }],
        }
    }

    #[test]
    fn abi_widths_count_strings_twice() {
        let table = sample();
        let (_, ctor) = table.find_export("counter_new").unwrap();
        assert_eq!(ctor.abi_param_count(), 2);
        assert_eq!(ctor.abi_result_count(), 1);

        let (_, label) = table.find_export("counter_label").unwrap();
        assert_eq!(label.abi_param_count(), 2, "receiver + return slot");
        assert_eq!(label.abi_result_count(), 0);
    }

    #[test]
    fn json_uses_snake_case_kinds() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"kind\": \"constructor\""));
        assert!(json.contains("\"returns\": \"boolean\""));
        assert!(!json.contains("type_name"));
        let back = InterfaceTable::from_json(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn declarations_render_constructor_and_methods() {
        let text = sample().render_declarations();
        assert!(text.contains("export class Counter {"));
        assert!(text.contains("  constructor(label: string);"));
        assert!(text.contains("  is_zero(): boolean;"));
    }
}
