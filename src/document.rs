use serde_json::Value;

/// The shapes the planner and merger agree on. Classification happens once,
/// here; everything downstream matches on the variant instead of re-probing
/// the JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentShape {
    /// Object whose configured field holds an array (`{"data": [...], ...}`).
    ObjectWithList { field: String },
    /// Bare array at the root.
    RootList,
    /// Anything else; submitted whole, never split.
    Opaque,
}

pub fn classify(doc: &Value, list_field: &str) -> DocumentShape {
    match doc {
        Value::Object(map) => match map.get(list_field) {
            Some(Value::Array(_)) => DocumentShape::ObjectWithList {
                field: list_field.to_string(),
            },
            _ => DocumentShape::Opaque,
        },
        Value::Array(_) => DocumentShape::RootList,
        _ => DocumentShape::Opaque,
    }
}
