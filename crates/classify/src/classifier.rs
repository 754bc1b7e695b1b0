use std::sync::Arc;

use folioscan_core::{Catalog, Category, ClassificationResult};
use tracing::debug;

/// Heuristic document classifier over an immutable catalog.
///
/// Classification is a pure function of the catalog and the input text:
/// identical text always yields an identical result, and it never fails —
/// the worst case is an `Unknown` result.
pub struct Classifier {
    catalog: Arc<Catalog>,
}

impl Classifier {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Assign a category and specific type to recognized text.
    ///
    /// Walks the catalog in order and returns the first definition whose
    /// keyword hit count reaches half its keyword set size (integer
    /// division). Note that a two-keyword set matches on a single hit and a
    /// one-keyword set matches unconditionally; that threshold is
    /// intentional and pinned by tests. When no definition matches, a fixed
    /// ladder of generic markers decides.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let lower = text.to_lowercase();

        for def in self.catalog.definitions() {
            let hits = def
                .keywords
                .iter()
                .filter(|kw| lower.contains(kw.to_lowercase().as_str()))
                .count();
            // Integer division: a one-hit match suffices for sets of two,
            // and a single-keyword definition (threshold 0) matches any text.
            let threshold = def.keywords.len() / 2;
            if hits >= threshold {
                debug!(
                    specific_type = %def.name,
                    hits,
                    threshold,
                    "Catalog definition matched"
                );
                return ClassificationResult::new(def.category, def.name.clone());
            }
        }

        self.classify_generic(&lower)
    }

    /// Fallback markers, tried in fixed priority order: invoice, delivery
    /// note, warehouse label.
    fn classify_generic(&self, lower: &str) -> ClassificationResult {
        let any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if any(&["factura", "invoice", "recibo", "receipt"])
            || (lower.contains("total") && any(&["iva", "impuesto"]))
        {
            return ClassificationResult::new(Category::Invoice, "Factura genérica");
        }
        if any(&["albarán", "delivery note", "nota de entrega", "guía de despacho"])
            || (lower.contains("entrega") && lower.contains("mercancía"))
        {
            return ClassificationResult::new(Category::DeliveryNote, "Nota de entrega genérica");
        }
        if any(&["ref:", "lote:", "peso:", "etiqueta"])
            || (lower.contains("producto") && lower.contains("código"))
        {
            return ClassificationResult::new(Category::WarehouseLabel, "Etiqueta genérica");
        }

        ClassificationResult::unknown()
    }
}
