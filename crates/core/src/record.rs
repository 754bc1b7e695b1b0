use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Structured business document returned by the AI structuring provider.
///
/// The field payload is kept as loose JSON: its shape is owned by the
/// requested schema, not by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub category: Category,
    /// Name of the schema the provider was asked to fill, e.g. "factura".
    pub schema: String,
    pub fields: serde_json::Value,
}

impl StructuredRecord {
    pub fn new(category: Category, schema: impl Into<String>, fields: serde_json::Value) -> Self {
        Self { category, schema: schema.into(), fields }
    }
}
