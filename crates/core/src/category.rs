use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse document class assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Invoice,
    DeliveryNote,
    WarehouseLabel,
    Unknown,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Invoice => write!(f, "invoice"),
            Category::DeliveryNote => write!(f, "delivery_note"),
            Category::WarehouseLabel => write!(f, "warehouse_label"),
            Category::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(Category::Invoice),
            "delivery_note" => Ok(Category::DeliveryNote),
            "warehouse_label" => Ok(Category::WarehouseLabel),
            "unknown" => Ok(Category::Unknown),
            other => Err(format!("Unknown category: '{other}'")),
        }
    }
}

impl Category {
    /// Infer the category of a catalog entry from its type name.
    ///
    /// The persisted catalog format does not carry a category; it is derived
    /// from the name: "guía"/"despacho" → delivery note, "etiqueta" →
    /// warehouse label, everything else → invoice.
    pub fn infer_from_type_name(name: &str) -> Category {
        let lower = name.to_lowercase();
        if lower.contains("guía") || lower.contains("guia") || lower.contains("despacho") {
            Category::DeliveryNote
        } else if lower.contains("etiqueta") {
            Category::WarehouseLabel
        } else {
            Category::Invoice
        }
    }
}
