use thiserror::Error;

use folioscan_core::{Category, StructuredRecord};

// ── OCR provider ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return the recognized text.
pub trait OcrProvider: Send + Sync {
    fn extract_text(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

/// Returns a pre-set string — useful for exercising the classification and
/// orchestration layers without an OCR engine installed.
pub struct MockOcr {
    pub text: String,
}

impl MockOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrProvider for MockOcr {
    fn extract_text(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrError, OcrProvider};
    use leptess::LepTess;

    pub struct TesseractOcr {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractOcr {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrProvider for TesseractOcr {
        fn extract_text(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

// ── AI structuring provider ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StructuringError {
    #[error("Structuring credential missing")]
    MissingCredential,
    #[error("Structuring transport error: {0}")]
    Transport(String),
    #[error("Structuring provider error: {0}")]
    Provider(String),
    #[error("Malformed structuring response: {0}")]
    MalformedResponse(String),
}

/// Abstraction over the AI structuring service: raw text plus a category and
/// schema hint in, a structured record out. This is one of the pipeline's two
/// suspension points, so the call is async.
#[allow(async_fn_in_trait)]
pub trait StructuringProvider: Send + Sync {
    async fn structure(
        &self,
        text: &str,
        category: Category,
        schema_hint: &str,
    ) -> Result<StructuredRecord, StructuringError>;
}

/// Echoes a canned JSON payload and counts invocations; for tests.
pub struct MockStructurer {
    fields: serde_json::Value,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockStructurer {
    pub fn new(fields: serde_json::Value) -> Self {
        Self { fields, calls: std::sync::atomic::AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl StructuringProvider for MockStructurer {
    async fn structure(
        &self,
        _text: &str,
        category: Category,
        schema_hint: &str,
    ) -> Result<StructuredRecord, StructuringError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(StructuredRecord::new(category, schema_hint, self.fields.clone()))
    }
}

/// Structuring client over a JSON HTTP endpoint with a bearer credential.
pub struct HttpStructurer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpStructurer {
    /// Fails immediately when the credential is absent — a configuration
    /// error, not a per-document one.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, StructuringError> {
        let api_key = api_key.ok_or(StructuringError::MissingCredential)?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

impl StructuringProvider for HttpStructurer {
    async fn structure(
        &self,
        text: &str,
        category: Category,
        schema_hint: &str,
    ) -> Result<StructuredRecord, StructuringError> {
        let body = serde_json::json!({
            "text": text,
            "category": category,
            "schema": schema_hint,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StructuringError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StructuringError::Provider(response.status().to_string()));
        }

        let fields: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StructuringError::MalformedResponse(e.to_string()))?;
        Ok(StructuredRecord::new(category, schema_hint, fields))
    }
}
