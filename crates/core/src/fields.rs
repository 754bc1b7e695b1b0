use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Outcome of classifying one document's OCR text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    /// Fine-grained human-readable label, e.g. "Guía de Despacho".
    pub specific_type: String,
}

impl ClassificationResult {
    pub fn new(category: Category, specific_type: impl Into<String>) -> Self {
        Self { category, specific_type: specific_type.into() }
    }

    /// Result used when no definition or heuristic matched.
    pub fn unknown() -> Self {
        Self::new(Category::Unknown, "Documento sin clasificar")
    }
}

/// Insertion-ordered field-name → value mapping produced by extraction.
///
/// Keys are unique; a field whose pattern found no match is simply absent.
/// Order follows the matched definition's declared field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    entries: Vec<(String, String)>,
}

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for the same key in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order_and_uniqueness() {
        let mut fields = ExtractedFields::new();
        fields.insert("rut", "12.345.678-9");
        fields.insert("fecha", "01/02/2024");
        fields.insert("rut", "11.111.111-1");

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("rut"), Some("11.111.111-1"));
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["rut", "fecha"]);
    }

    #[test]
    fn get_missing_returns_none() {
        let fields = ExtractedFields::new();
        assert_eq!(fields.get("total"), None);
        assert!(fields.is_empty());
    }

    #[test]
    fn unknown_result_has_unknown_category() {
        let r = ClassificationResult::unknown();
        assert_eq!(r.category, Category::Unknown);
        assert!(!r.specific_type.is_empty());
    }
}
