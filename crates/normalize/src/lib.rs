pub mod enhance;
pub mod preprocess;
pub mod quad;

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode normalized image: {0}")]
    Encode(String),
}

/// Tunables for the normalization pipeline. The defaults are the values the
/// pipeline was calibrated with; `max_output_dim` is a safety ceiling against
/// degenerate quadrilateral geometry, not a physical limit.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Gaussian blur sigma (a 5×5 kernel equivalent).
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum contour area as a fraction of total image area.
    pub min_area_ratio: f64,
    /// Douglas-Peucker epsilon as a fraction of the contour perimeter.
    pub epsilon_ratio: f64,
    /// Reject warp targets with either dimension above this, in pixels.
    pub max_output_dim: u32,
    /// CLAHE clip limit.
    pub clahe_clip: f32,
    /// CLAHE tile grid is `clahe_grid` × `clahe_grid`.
    pub clahe_grid: u32,
    /// Adaptive threshold block size (odd).
    pub threshold_block: u32,
    /// Adaptive threshold constant subtracted from the local mean.
    pub threshold_c: i32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.4,
            canny_low: 75.0,
            canny_high: 200.0,
            min_area_ratio: 0.10,
            epsilon_ratio: 0.02,
            max_output_dim: 5000,
            clahe_clip: 2.0,
            clahe_grid: 8,
            threshold_block: 11,
            threshold_c: 2,
        }
    }
}

/// Geometric and photometric cleanup for photographed documents.
///
/// `normalize` always produces an image: every geometric sub-step (edge
/// detection, contour selection, quadrilateral approximation, warping)
/// degrades to plain enhancement of the unwarped source instead of failing.
/// The only hard error in this crate is undecodable input.
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize a decoded image: perspective-correct if a document boundary
    /// is found, then equalize and binarize.
    #[instrument(skip_all, fields(width = img.width(), height = img.height()))]
    pub fn normalize(&self, img: &DynamicImage) -> GrayImage {
        let gray = preprocess::to_grayscale(img);
        let flattened = match self.correct_perspective(&gray) {
            Some(warped) => {
                debug!(
                    out_w = warped.width(),
                    out_h = warped.height(),
                    "Perspective correction applied"
                );
                warped
            }
            None => gray,
        };
        enhance::enhance(&flattened, &self.config)
    }

    /// Decode raw bytes (JPEG / PNG / WEBP / …) and normalize.
    pub fn normalize_bytes(&self, data: &[u8]) -> Result<GrayImage, NormalizeError> {
        let img = image::load_from_memory(data)?;
        Ok(self.normalize(&img))
    }

    /// Open a file and normalize.
    pub fn normalize_path(&self, path: &Path) -> Result<GrayImage, NormalizeError> {
        let img = image::open(path)?;
        Ok(self.normalize(&img))
    }

    /// Detect the document quadrilateral and warp it to an axis-aligned
    /// rectangle. Returns `None` when no usable boundary is found; callers
    /// fall back to enhancing the unwarped source.
    fn correct_perspective(&self, gray: &GrayImage) -> Option<GrayImage> {
        let cfg = &self.config;

        let blurred = preprocess::blur(gray, cfg.blur_sigma);
        let edges = preprocess::detect_edges(&blurred, cfg.canny_low, cfg.canny_high);
        let dilated = preprocess::close_edges(&edges);

        let img_area = gray.width() as f64 * gray.height() as f64;
        let quad = match quad::detect_document_quad(
            &dilated,
            img_area * cfg.min_area_ratio,
            cfg.epsilon_ratio,
        ) {
            Some(q) => q,
            None => {
                debug!("No usable document boundary; skipping warp");
                return None;
            }
        };

        let (out_w, out_h) = quad.output_dimensions();
        if out_w == 0 || out_h == 0 {
            warn!(out_w, out_h, "Degenerate warp target; skipping warp");
            return None;
        }
        if out_w > cfg.max_output_dim || out_h > cfg.max_output_dim {
            warn!(
                out_w,
                out_h,
                ceiling = cfg.max_output_dim,
                "Warp target exceeds safety ceiling; skipping warp"
            );
            return None;
        }

        let dest: [(f32, f32); 4] = [
            (0.0, 0.0),
            (out_w as f32, 0.0),
            (out_w as f32, out_h as f32),
            (0.0, out_h as f32),
        ];

        let projection = match Projection::from_control_points(quad.corners, dest) {
            Some(p) => p,
            None => {
                warn!("Projective transform is degenerate; skipping warp");
                return None;
            }
        };

        let mut output = GrayImage::new(out_w, out_h);
        warp_into(
            gray,
            &projection,
            Interpolation::Bilinear,
            Luma([255u8]),
            &mut output,
        );
        Some(output)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

/// Encode a normalized image as PNG bytes for the OCR handoff.
pub fn to_png_bytes(img: &GrayImage) -> Result<Vec<u8>, NormalizeError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(buf)
}

pub use quad::sort_corners;
