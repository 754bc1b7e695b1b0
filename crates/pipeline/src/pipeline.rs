use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use folioscan_classify::{extract_fields, Classifier};
use folioscan_core::{Catalog, Category, ClassificationResult, ExtractedFields, StructuredRecord};
use folioscan_normalize::{to_png_bytes, NormalizeError, Normalizer};

use crate::providers::{OcrError, OcrProvider, StructuringError, StructuringProvider};
use crate::state::ProcessingState;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("No text extracted from document")]
    NoTextExtracted,
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Structuring failed: {0}")]
    Structuring(#[from] StructuringError),
}

impl PipelineError {
    /// The state the pipeline was in when this error ended the run.
    pub fn failed_state(&self) -> ProcessingState {
        match self {
            PipelineError::Io(_) | PipelineError::Normalize(_) => ProcessingState::Idle,
            PipelineError::NoTextExtracted | PipelineError::Ocr(_) => {
                ProcessingState::ExtractingText
            }
            PipelineError::Structuring(_) => ProcessingState::AwaitingStructuring,
        }
    }
}

/// Everything a completed run produces.
#[derive(Debug)]
pub struct ProcessedDocument {
    /// Raw OCR text the classification and structuring ran against.
    pub ocr_text: String,
    pub classification: ClassificationResult,
    /// Heuristically extracted fields, for diagnostics or direct use.
    pub fields: ExtractedFields,
    pub record: StructuredRecord,
    /// Always `Ready` on the success path.
    pub state: ProcessingState,
}

/// Sequences one document end to end:
/// normalize → OCR → classify → extract → structure.
///
/// Each invocation owns its image/text/field chain; the pipeline itself holds
/// only the immutable catalog and the two collaborators, so concurrent runs
/// need no locking. Blank OCR output is the single fatal mid-pipeline
/// condition; everything geometric degrades inside the normalizer instead.
pub struct DocumentPipeline<O: OcrProvider, S: StructuringProvider> {
    normalizer: Normalizer,
    classifier: Classifier,
    catalog: Arc<Catalog>,
    ocr: O,
    structurer: S,
}

impl<O: OcrProvider, S: StructuringProvider> DocumentPipeline<O, S> {
    pub fn new(normalizer: Normalizer, catalog: Arc<Catalog>, ocr: O, structurer: S) -> Self {
        Self {
            normalizer,
            classifier: Classifier::new(catalog.clone()),
            catalog,
            ocr,
            structurer,
        }
    }

    /// Process an image file on disk.
    pub async fn process_path(&self, path: &Path) -> Result<ProcessedDocument, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        self.process_bytes(&bytes).await
    }

    /// Process raw image bytes (camera capture or file read).
    #[instrument(skip_all, fields(input_len = data.len()))]
    pub async fn process_bytes(&self, data: &[u8]) -> Result<ProcessedDocument, PipelineError> {
        let mut state = ProcessingState::Idle;

        // Normalization; decode failure is fatal, everything else degrades
        // inside the normalizer.
        let normalized = self.normalizer.normalize_bytes(data)?;
        let ocr_input = match to_png_bytes(&normalized) {
            Ok(png) => png,
            Err(e) => {
                // Last-resort fallback: hand OCR the original bytes directly.
                warn!(error = %e, "Re-encode of normalized image failed; passing original bytes to OCR");
                data.to_vec()
            }
        };

        state = self.advance(state);
        let ocr_text = self.ocr.extract_text(&ocr_input)?;
        if ocr_text.trim().is_empty() {
            warn!("OCR produced no text; aborting run");
            return Err(PipelineError::NoTextExtracted);
        }
        debug!(chars = ocr_text.len(), "OCR text extracted");

        state = self.advance(state);
        let classification = self.classifier.classify(&ocr_text);
        info!(
            category = %classification.category,
            specific_type = %classification.specific_type,
            "Document classified"
        );

        state = self.advance(state);
        let fields = extract_fields(&self.catalog, &ocr_text, &classification.specific_type);

        state = self.advance(state);
        let schema = schema_for(classification.category);
        let record = self
            .structurer
            .structure(&ocr_text, classification.category, schema)
            .await?;

        state = self.advance(state);
        info!(state = %state, schema, "Document ready");
        Ok(ProcessedDocument { ocr_text, classification, fields, record, state })
    }

    fn advance(&self, state: ProcessingState) -> ProcessingState {
        // Every forward transition exists by construction; `next` only
        // returns None from terminal states, which are never advanced.
        let next = state.next().unwrap_or(ProcessingState::Error);
        debug!(from = %state, to = %next, "Pipeline transition");
        next
    }
}

/// Structuring schema requested per category. An unknown category defaults to
/// the invoice schema as the best-effort choice.
fn schema_for(category: Category) -> &'static str {
    match category {
        Category::Invoice | Category::Unknown => "factura",
        Category::DeliveryNote => "guia_despacho",
        Category::WarehouseLabel => "etiqueta_bodega",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockOcr, MockStructurer};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use serde_json::json;
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(16, 16, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn pipeline(ocr_text: &str) -> DocumentPipeline<MockOcr, MockStructurer> {
        DocumentPipeline::new(
            Normalizer::default(),
            Arc::new(Catalog::builtin()),
            MockOcr::new(ocr_text),
            MockStructurer::new(json!({"ok": true})),
        )
    }

    #[tokio::test]
    async fn factura_runs_end_to_end() {
        let p = pipeline("FACTURA ELECTRÓNICA\nRUT 12.345.678-9\nIVA 19%\nTotal: $10.000");
        let doc = p.process_bytes(&tiny_png()).await.unwrap();

        assert_eq!(doc.state, ProcessingState::Ready);
        assert_eq!(doc.classification.category, Category::Invoice);
        assert_eq!(doc.fields.get("rut"), Some("12.345.678-9"));
        assert!(doc.fields.get("total").unwrap().contains("10.000"));
        assert_eq!(doc.record.schema, "factura");
    }

    #[tokio::test]
    async fn delivery_note_requests_guia_schema() {
        let p = pipeline("Guía de Despacho\nRUT 11.111.111-1\nFolio 88");
        let doc = p.process_bytes(&tiny_png()).await.unwrap();

        assert_eq!(doc.classification.category, Category::DeliveryNote);
        assert_eq!(doc.record.schema, "guia_despacho");
    }

    #[tokio::test]
    async fn unknown_category_defaults_to_invoice_schema() {
        let p = pipeline("zzz texto irreconocible qqq");
        let doc = p.process_bytes(&tiny_png()).await.unwrap();

        assert_eq!(doc.classification.category, Category::Unknown);
        assert_eq!(doc.record.schema, "factura");
    }

    #[tokio::test]
    async fn blank_ocr_text_is_fatal_without_structuring() {
        let normalizer = Normalizer::default();
        let structurer = MockStructurer::new(json!({}));
        let p = DocumentPipeline::new(
            normalizer,
            Arc::new(Catalog::builtin()),
            MockOcr::new("   \n  "),
            structurer,
        );

        let err = p.process_bytes(&tiny_png()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoTextExtracted));
        assert_eq!(err.failed_state(), ProcessingState::ExtractingText);
        // The structuring collaborator must never have been invoked.
        assert_eq!(p.structurer.calls(), 0);
    }

    #[tokio::test]
    async fn undecodable_input_is_fatal() {
        let p = pipeline("irrelevant");
        let err = p.process_bytes(b"not an image at all").await.unwrap_err();
        assert!(matches!(err, PipelineError::Normalize(_)));
        assert_eq!(err.failed_state(), ProcessingState::Idle);
    }

    #[tokio::test]
    async fn structuring_failure_propagates_with_cause() {
        struct FailingStructurer;
        impl StructuringProvider for FailingStructurer {
            async fn structure(
                &self,
                _text: &str,
                _category: Category,
                _schema_hint: &str,
            ) -> Result<StructuredRecord, StructuringError> {
                Err(StructuringError::MissingCredential)
            }
        }

        let p = DocumentPipeline::new(
            Normalizer::default(),
            Arc::new(Catalog::builtin()),
            MockOcr::new("FACTURA Total $100"),
            FailingStructurer,
        );
        let err = p.process_bytes(&tiny_png()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Structuring(StructuringError::MissingCredential)
        ));
        assert_eq!(err.failed_state(), ProcessingState::AwaitingStructuring);
    }

    #[tokio::test]
    async fn process_path_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.png");
        std::fs::write(&path, tiny_png()).unwrap();

        let p = pipeline("Boleta\nTotal 3500");
        let doc = p.process_path(&path).await.unwrap();
        assert_eq!(doc.classification.category, Category::Invoice);
    }

    #[tokio::test]
    async fn missing_file_surfaces_io_error() {
        let p = pipeline("irrelevant");
        let err = p.process_path(Path::new("/no/such/file.png")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
