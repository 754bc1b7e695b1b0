use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::category::Category;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error reading catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One immutable document-type definition.
///
/// `keywords` drive classification; `field_names` list the fields the
/// extraction engine should attempt for this type. Field names are advisory:
/// a name without a matching extractor pattern is simply absent from the
/// result, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTypeDefinition {
    pub name: String,
    pub keywords: Vec<String>,
    pub field_names: Vec<String>,
    pub category: Category,
}

/// Persisted catalog entry shape: `{ "type", "keywords", "fields" }`.
/// Category is not persisted — it is re-derived from the type name.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    type_name: String,
    keywords: Vec<String>,
    fields: Vec<String>,
}

/// Read-only catalog of document-type definitions.
///
/// Built once at startup (built-ins or a JSON file) and never mutated
/// afterwards; safe to share across threads behind an `Arc` without locking.
/// Definition order is significant: the classifier returns the first entry
/// whose keyword threshold is met.
#[derive(Debug, Clone)]
pub struct Catalog {
    definitions: Vec<DocumentTypeDefinition>,
}

impl Catalog {
    pub fn new(definitions: Vec<DocumentTypeDefinition>) -> Self {
        Self { definitions }
    }

    /// The built-in catalog covering the Chilean document set this tool was
    /// written for.
    pub fn builtin() -> Self {
        let def = |name: &str, keywords: &[&str], fields: &[&str]| DocumentTypeDefinition {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            field_names: fields.iter().map(|s| s.to_string()).collect(),
            category: Category::infer_from_type_name(name),
        };

        Self::new(vec![
            def(
                "Factura Electrónica",
                &["factura", "electrónica", "rut", "iva", "total"],
                &["rut", "fecha", "folio", "neto", "iva", "total", "cliente"],
            ),
            def(
                "Factura Exenta",
                &["factura", "exenta", "rut", "total"],
                &["rut", "fecha", "folio", "total", "cliente"],
            ),
            def(
                "Boleta",
                &["boleta", "total"],
                &["fecha", "folio", "total"],
            ),
            def(
                "Guía de Despacho",
                &["guía", "despacho", "traslado", "rut"],
                &["rut", "fecha", "folio", "cliente", "proveedor"],
            ),
            def(
                "Nota de Crédito",
                &["nota", "crédito", "rut", "total"],
                &["rut", "fecha", "folio", "total", "cliente"],
            ),
            def(
                "Etiqueta de Bodega",
                &["lote", "peso", "producto", "código"],
                &["producto", "codigo", "lote", "peso"],
            ),
        ])
    }

    /// Load a catalog from a JSON array of `{ "type", "keywords", "fields" }`
    /// entries, inferring each category from the type name.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        let definitions = entries
            .into_iter()
            .map(|e| DocumentTypeDefinition {
                category: Category::infer_from_type_name(&e.type_name),
                name: e.type_name,
                keywords: e.keywords,
                field_names: e.fields,
            })
            .collect();
        Ok(Self { definitions })
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to the persisted JSON format (categories are dropped; they
    /// re-derive from the names on reload).
    pub fn to_json_string(&self) -> Result<String, CatalogError> {
        let entries: Vec<CatalogEntry> = self
            .definitions
            .iter()
            .map(|d| CatalogEntry {
                type_name: d.name.clone(),
                keywords: d.keywords.clone(),
                fields: d.field_names.clone(),
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn definitions(&self) -> &[DocumentTypeDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Look up a definition by name, case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<&DocumentTypeDefinition> {
        let lower = name.to_lowercase();
        self.definitions
            .iter()
            .find(|d| d.name.to_lowercase() == lower)
    }
}
