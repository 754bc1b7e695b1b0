use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use folioscan_core::{Catalog, ExtractedFields};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Chilean RUT: 1–2 digits, two dotted groups of three, dash, check digit or K;
// or the undotted 7–8 digit form.
re!(re_rut_dotted, r"\b\d{1,2}\.\d{3}\.\d{3}-[\dkK]\b");
re!(re_rut_plain, r"\b\d{7,8}-[\dkK]\b");

re!(re_date_slash, r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b");
re!(re_date_dash, r"\b(\d{1,2})-(\d{1,2})-(\d{4})\b");
re!(re_date_dot, r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b");
re!(re_date_worded,
    r"(?i)\b(\d{1,2})\s+de\s+([a-záéíóúñ]+),?\s+(\d{4})\b");
re!(re_date_anchored,
    r"(?i)\bfecha\b\s*:?\s*(\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4})");

re!(re_currency_anywhere, r"\$\s*(\d[\d.,]*\d|\d)");

// IVA with an optional percentage annotation, e.g. "IVA (19%): 1.900".
re!(re_iva,
    r"(?i)\bi\.?v\.?a\.?\s*(?:\(?\s*\d{1,2}\s*%\s*\)?)?\s*:?\s*\$?\s*(\d[\d.,]*\d|\d)");

/// Label-parameterized patterns are built at runtime from escaped catalog
/// field names; each distinct pattern is compiled once and reused.
fn dynamic_re(pattern: &str) -> Regex {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(pattern.to_string())
        .or_insert_with(|| Regex::new(pattern).expect("invalid regex"))
        .clone()
}

/// Named extraction strategy for one field. Dispatch from field name to
/// strategy happens in `for_field_name`; adding a new field type means adding
/// a variant and an arm there, not touching the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    TaxId,
    Date,
    Amount,
    TaxAmount,
    DocumentNumber,
    EntityName,
    Generic,
}

impl FieldKind {
    /// Map a catalog field name to its extraction strategy. Names with no
    /// dedicated extractor fall back to the generic labeled-run strategy.
    pub fn for_field_name(name: &str) -> FieldKind {
        match name.to_lowercase().as_str() {
            "rut" | "tax_id" | "nit" => FieldKind::TaxId,
            "fecha" | "date" | "fecha_emision" => FieldKind::Date,
            "total" | "neto" | "monto" | "subtotal" | "amount" => FieldKind::Amount,
            "iva" | "impuesto" | "tax" => FieldKind::TaxAmount,
            "folio" | "numero" | "número" | "orden" | "numero_documento" => {
                FieldKind::DocumentNumber
            }
            "cliente" | "proveedor" | "remitente" | "destinatario" | "vendedor" => {
                FieldKind::EntityName
            }
            _ => FieldKind::Generic,
        }
    }

    /// Run this strategy against the text. `label` is the field's own name,
    /// used as the anchor token by the label-prefixed strategies.
    pub fn extract(self, text: &str, label: &str) -> Option<String> {
        match self {
            FieldKind::TaxId => extract_tax_id(text),
            FieldKind::Date => extract_date(text),
            FieldKind::Amount => extract_amount(text, label),
            FieldKind::TaxAmount => extract_tax_amount(text),
            FieldKind::DocumentNumber => extract_document_number(text),
            FieldKind::EntityName => extract_entity_name(text, label),
            FieldKind::Generic => extract_generic(text, label),
        }
    }
}

/// Extract every field declared by the named catalog definition.
///
/// The definition is looked up case-insensitively; an unknown type yields an
/// empty mapping. A field whose pattern finds nothing is absent from the
/// result — extraction has no error path.
pub fn extract_fields(catalog: &Catalog, text: &str, specific_type: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::new();
    let Some(def) = catalog.find_by_name(specific_type) else {
        debug!(specific_type, "No catalog definition; returning empty fields");
        return fields;
    };

    for name in &def.field_names {
        let kind = FieldKind::for_field_name(name);
        if let Some(value) = kind.extract(text, name) {
            fields.insert(name.clone(), value);
        }
    }
    debug!(
        specific_type,
        extracted = fields.len(),
        declared = def.field_names.len(),
        "Field extraction complete"
    );
    fields
}

// ── Individual extractors ────────────────────────────────────────────────────

fn extract_tax_id(text: &str) -> Option<String> {
    re_rut_dotted()
        .find(text)
        .or_else(|| re_rut_plain().find(text))
        .map(|m| m.as_str().to_string())
}

/// Numeric forms (`dd/mm/yyyy`, `dd-mm-yyyy`, `dd.mm.yyyy`) tried in order,
/// then the worded Spanish form, then a `fecha`-anchored token. Day and month
/// are validated before a candidate is accepted.
fn extract_date(text: &str) -> Option<String> {
    for re in [re_date_slash(), re_date_dash(), re_date_dot()] {
        for caps in re.captures_iter(text) {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            if NaiveDate::from_ymd_opt(year, month, day).is_some() {
                return Some(caps[0].to_string());
            }
        }
    }

    for caps in re_date_worded().captures_iter(text) {
        let day: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(month) = spanish_month(&caps[2]) {
            if NaiveDate::from_ymd_opt(year, month, day).is_some() {
                return Some(caps[0].to_string());
            }
        }
    }

    re_date_anchored()
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Label-prefixed amount: plain digits/separators, European grouping, US
/// grouping, then bare integer — falling back to the first currency-prefixed
/// number anywhere in the text.
fn extract_amount(text: &str, label: &str) -> Option<String> {
    let anchor = regex::escape(label);
    let patterns = [
        format!(r"(?i)\b{anchor}\b\s*:?\s*\$?\s*(\d[\d.,]*\d|\d)"),
        format!(r"(?i)\b{anchor}\b\s*:?\s*\$?\s*(\d{{1,3}}(?:\.\d{{3}})+(?:,\d{{1,2}})?)"),
        format!(r"(?i)\b{anchor}\b\s*:?\s*\$?\s*(\d{{1,3}}(?:,\d{{3}})+(?:\.\d{{1,2}})?)"),
        format!(r"(?i)\b{anchor}\b\s*:?\s*\$?\s*(\d+)"),
    ];
    for pattern in &patterns {
        if let Some(caps) = dynamic_re(pattern).captures(text) {
            return Some(caps[1].to_string());
        }
    }
    re_currency_anywhere()
        .captures(text)
        .map(|caps| caps[1].to_string())
}

fn extract_tax_amount(text: &str) -> Option<String> {
    re_iva().captures(text).map(|caps| caps[1].to_string())
}

/// Label-prefixed document number. Label priority order is fixed: Folio,
/// N°/Nº, Numero, Número, Orden, N° Orden; first match wins.
fn extract_document_number(text: &str) -> Option<String> {
    const LABELS: [&str; 7] = ["Folio", "N°", "Nº", "Numero", "Número", "Orden", "N° Orden"];
    for label in LABELS {
        let anchor = regex::escape(label);
        let re = dynamic_re(&format!(r"(?i){anchor}\s*:?\s*#?\s*(\d+)"));
        if let Some(caps) = re.captures(text) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Label followed by a run of letters/digits/spaces, terminated by a line
/// break or a double space; internal whitespace collapsed.
fn extract_entity_name(text: &str, label: &str) -> Option<String> {
    let anchor = regex::escape(label);
    let re = dynamic_re(&format!(
        r"(?i)\b{anchor}\b\s*:?\s*([A-Za-zÁÉÍÓÚÑÜáéíóúñü0-9][A-Za-zÁÉÍÓÚÑÜáéíóúñü0-9 ]*?)(?:\r?\n|\s{{2,}}|$)"
    ));
    let caps = re.captures(text)?;
    let collapsed = collapse_whitespace(caps[1].trim());
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Generic fallback: label followed by word characters, spaces, and light
/// punctuation, same terminators as the entity extractor.
fn extract_generic(text: &str, label: &str) -> Option<String> {
    let anchor = regex::escape(label);
    let re = dynamic_re(&format!(
        r"(?i)\b{anchor}\b\s*:?\s*([\w][\w .,\-/#%]*?)(?:\r?\n|\s{{2,}}|$)"
    ));
    let caps = re.captures(text)?;
    let trimmed = caps[1].trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn spanish_month(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "enero" => Some(1),
        "febrero" => Some(2),
        "marzo" => Some(3),
        "abril" => Some(4),
        "mayo" => Some(5),
        "junio" => Some(6),
        "julio" => Some(7),
        "agosto" => Some(8),
        "septiembre" | "setiembre" => Some(9),
        "octubre" => Some(10),
        "noviembre" => Some(11),
        "diciembre" => Some(12),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Tax identifier ────────────────────────────────────────────────────────

    #[test]
    fn tax_id_dotted_rut() {
        assert_eq!(
            extract_tax_id("Señores ACME\nRUT 12.345.678-9\n"),
            Some("12.345.678-9".to_string())
        );
    }

    #[test]
    fn tax_id_plain_rut_with_k_check() {
        assert_eq!(
            extract_tax_id("RUT: 9876543-K"),
            Some("9876543-K".to_string())
        );
    }

    #[test]
    fn tax_id_absent() {
        assert_eq!(extract_tax_id("no identifier here"), None);
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    #[test]
    fn date_slash_format() {
        assert_eq!(
            extract_date("Emitida el 15/03/2024 en Santiago"),
            Some("15/03/2024".to_string())
        );
    }

    #[test]
    fn date_dash_and_dot_formats() {
        assert_eq!(extract_date("15-03-2024"), Some("15-03-2024".to_string()));
        assert_eq!(extract_date("15.03.2024"), Some("15.03.2024".to_string()));
    }

    #[test]
    fn date_worded_spanish_form() {
        assert_eq!(
            extract_date("Santiago, 15 de marzo, 2024"),
            Some("15 de marzo, 2024".to_string())
        );
    }

    #[test]
    fn date_invalid_calendar_values_skipped() {
        // 45/13 is date-shaped but not a date; the valid one later wins.
        assert_eq!(
            extract_date("45/13/2024 luego 01/02/2024"),
            Some("01/02/2024".to_string())
        );
    }

    #[test]
    fn date_fecha_anchored_fallback() {
        assert_eq!(
            extract_date("Fecha: 7/4/24"),
            Some("7/4/24".to_string())
        );
    }

    #[test]
    fn date_absent() {
        assert_eq!(extract_date("sin fechas aquí"), None);
    }

    // ── Amounts ───────────────────────────────────────────────────────────────

    #[test]
    fn amount_labeled_with_currency_and_grouping() {
        assert_eq!(
            extract_amount("Subtotal $9.000\nTotal: $10.000", "total"),
            Some("10.000".to_string())
        );
    }

    #[test]
    fn amount_european_decimal() {
        assert_eq!(
            extract_amount("Neto 1.234.567,89", "neto"),
            Some("1.234.567,89".to_string())
        );
    }

    #[test]
    fn amount_us_decimal() {
        assert_eq!(
            extract_amount("Total 1,234.56", "total"),
            Some("1,234.56".to_string())
        );
    }

    #[test]
    fn amount_plain_integer() {
        assert_eq!(extract_amount("Monto 4500", "monto"), Some("4500".to_string()));
    }

    #[test]
    fn amount_falls_back_to_first_currency_number() {
        assert_eq!(
            extract_amount("sin etiqueta, pero $ 7.500 aparece", "total"),
            Some("7.500".to_string())
        );
    }

    #[test]
    fn amount_absent() {
        assert_eq!(extract_amount("nada numérico", "total"), None);
    }

    // ── Tax amount ────────────────────────────────────────────────────────────

    #[test]
    fn iva_with_percentage_annotation() {
        assert_eq!(
            extract_tax_amount("IVA (19%): $1.900"),
            Some("1.900".to_string())
        );
    }

    #[test]
    fn iva_dotted_spelling() {
        assert_eq!(extract_tax_amount("I.V.A. 1900"), Some("1900".to_string()));
    }

    // ── Document number ───────────────────────────────────────────────────────

    #[test]
    fn document_number_folio_first() {
        assert_eq!(
            extract_document_number("Orden 99\nFolio: 12345"),
            Some("12345".to_string())
        );
    }

    #[test]
    fn document_number_degree_sign_variants() {
        assert_eq!(extract_document_number("N° 777"), Some("777".to_string()));
        assert_eq!(extract_document_number("Nº 778"), Some("778".to_string()));
    }

    #[test]
    fn document_number_orden() {
        assert_eq!(
            extract_document_number("N° Orden 444"),
            Some("444".to_string())
        );
    }

    // ── Entity name ───────────────────────────────────────────────────────────

    #[test]
    fn entity_name_trims_label_padding() {
        assert_eq!(
            extract_entity_name("Cliente:  ACME Ltda\nDirección: x", "cliente"),
            Some("ACME Ltda".to_string())
        );
    }

    #[test]
    fn entity_name_terminated_by_double_space() {
        assert_eq!(
            extract_entity_name("Proveedor: Distribuidora Sur  Giro: ventas", "proveedor"),
            Some("Distribuidora Sur".to_string())
        );
    }

    #[test]
    fn repeated_label_lookups_reuse_compiled_patterns() {
        // Label-built patterns go through the shared cache; repeated lookups
        // with the same and with metacharacter-bearing labels stay stable.
        for _ in 0..3 {
            assert_eq!(
                extract_amount("Total: $10.000", "total"),
                Some("10.000".to_string())
            );
            assert_eq!(extract_document_number("Folio: 42"), Some("42".to_string()));
        }
        assert_eq!(
            extract_amount("Total.Neto: 500", "total.neto"),
            Some("500".to_string())
        );
    }

    // ── Generic and dispatch ──────────────────────────────────────────────────

    #[test]
    fn generic_labeled_run() {
        assert_eq!(
            extract_generic("Patente: AB-1234\n", "patente"),
            Some("AB-1234".to_string())
        );
    }

    #[test]
    fn dispatch_maps_known_names() {
        assert_eq!(FieldKind::for_field_name("RUT"), FieldKind::TaxId);
        assert_eq!(FieldKind::for_field_name("Fecha"), FieldKind::Date);
        assert_eq!(FieldKind::for_field_name("total"), FieldKind::Amount);
        assert_eq!(FieldKind::for_field_name("iva"), FieldKind::TaxAmount);
        assert_eq!(FieldKind::for_field_name("folio"), FieldKind::DocumentNumber);
        assert_eq!(FieldKind::for_field_name("cliente"), FieldKind::EntityName);
        assert_eq!(FieldKind::for_field_name("patente"), FieldKind::Generic);
    }

    // ── extract_fields ────────────────────────────────────────────────────────

    #[test]
    fn extract_fields_factura_scenario() {
        let catalog = Catalog::builtin();
        let text = "FACTURA ELECTRÓNICA\nRUT 12.345.678-9\nFolio: 1042\nTotal: $10.000";
        let fields = extract_fields(&catalog, text, "Factura Electrónica");

        assert_eq!(fields.get("rut"), Some("12.345.678-9"));
        assert_eq!(fields.get("folio"), Some("1042"));
        assert!(fields.get("total").unwrap().contains("10.000"));
    }

    #[test]
    fn extract_fields_unknown_type_is_empty() {
        let catalog = Catalog::builtin();
        let fields = extract_fields(&catalog, "RUT 12.345.678-9", "No Such Type");
        assert!(fields.is_empty());
    }

    #[test]
    fn extract_fields_keys_subset_of_declared() {
        let catalog = Catalog::builtin();
        let text = "Guía de Despacho\nRUT 11.111.111-1\nFolio 88\nCliente: ACME";
        let fields = extract_fields(&catalog, text, "Guía de Despacho");

        let declared = &catalog.find_by_name("Guía de Despacho").unwrap().field_names;
        for (key, _) in fields.iter() {
            assert!(declared.iter().any(|d| d == key), "unexpected key {key}");
        }
    }

    #[test]
    fn extract_fields_never_errors_on_unmatched_patterns() {
        let catalog = Catalog::builtin();
        let fields = extract_fields(&catalog, "texto sin ningún campo", "Factura Electrónica");
        assert!(fields.is_empty());
    }

    #[test]
    fn extract_fields_lookup_is_case_insensitive() {
        let catalog = Catalog::builtin();
        let fields = extract_fields(&catalog, "Folio 5", "factura electrónica");
        assert_eq!(fields.get("folio"), Some("5"));
    }
}
