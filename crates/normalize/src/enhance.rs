//! Photometric enhancement: contrast-limited adaptive histogram equalization
//! followed by adaptive binarization.
//!
//! Both are implemented over plain `GrayImage` buffers — imageproc carries
//! neither a CLAHE nor an offset-carrying adaptive threshold, and the
//! parameters here (clip limit, tile grid, block size, constant) need to be
//! preserved exactly.

use image::{GrayImage, Luma};
use tracing::debug;

use crate::NormalizerConfig;

/// Run the basic enhancement chain on a (possibly perspective-corrected)
/// grayscale image: CLAHE then adaptive thresholding.
pub fn enhance(gray: &GrayImage, config: &NormalizerConfig) -> GrayImage {
    let equalized = clahe(gray, config.clahe_clip, config.clahe_grid);
    let binary = adaptive_threshold(&equalized, config.threshold_block, config.threshold_c);
    debug!(
        width = binary.width(),
        height = binary.height(),
        "Enhancement complete"
    );
    binary
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is divided into a `grid` × `grid` tile mosaic. Each tile gets a
/// clipped-histogram equalization lookup table; per-pixel values are mapped
/// through the bilinear blend of the four surrounding tile tables, which
/// avoids visible tile seams.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }
    let grid = grid.max(1).min(width).min(height);
    let tile_w = width.div_ceil(grid);
    let tile_h = height.div_ceil(grid);

    // Per-tile lookup tables.
    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((grid * grid) as usize);
    for ty in 0..grid {
        for tx in 0..grid {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * grid + tx) as usize];

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = gray.get_pixel(x, y)[0];

            // Position relative to tile centres, clamped at the borders.
            let fx = (x as f32 / tile_w as f32 - 0.5).clamp(0.0, grid as f32 - 1.0);
            let fy = (y as f32 / tile_h as f32 - 0.5).clamp(0.0, grid as f32 - 1.0);
            let tx0 = fx.floor() as u32;
            let ty0 = fy.floor() as u32;
            let tx1 = (tx0 + 1).min(grid - 1);
            let ty1 = (ty0 + 1).min(grid - 1);
            let wx = fx - tx0 as f32;
            let wy = fy - ty0 as f32;

            let top = lut_at(tx0, ty0)[v as usize] as f32 * (1.0 - wx)
                + lut_at(tx1, ty0)[v as usize] as f32 * wx;
            let bottom = lut_at(tx0, ty1)[v as usize] as f32 * (1.0 - wx)
                + lut_at(tx1, ty1)[v as usize] as f32 * wx;
            let blended = top * (1.0 - wy) + bottom * wy;

            out.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Build the equalization lookup table for one tile, clipping the histogram
/// at `clip_limit` times the uniform bin height and redistributing the excess.
fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    // Tiles past the image edge (grid does not divide the dimensions) get an
    // identity table so border blending stays neutral.
    if x1 <= x0 || y1 <= y0 {
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let pixel_count = ((x1 - x0) * (y1 - y0)).max(1);
    let clip_at = ((clip_limit * pixel_count as f32 / 256.0).max(1.0)) as u32;

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip_at {
            excess += *bin - clip_at;
            *bin = clip_at;
        }
    }
    let bonus = excess / 256;
    for bin in hist.iter_mut() {
        *bin += bonus;
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        cdf += count as u64;
        lut[i] = ((cdf * 255) / pixel_count as u64).min(255) as u8;
    }
    lut
}

/// Adaptive binarization: a pixel is black when it falls below the local
/// block mean minus `c`. The local mean uses an integral image, so the cost
/// is independent of block size.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let radius = block_size.max(1) / 2;

    let integral = integral_image(gray);
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mean = region_mean(&integral, width, height, x, y, radius);
            let threshold = (mean as i32 - c).clamp(0, 255) as u8;
            let v = gray.get_pixel(x, y)[0];
            out.put_pixel(x, y, Luma([if v < threshold { 0 } else { 255 }]));
        }
    }
    out
}

/// Summed-area table with a zero-padded border; dimensions (w+1) × (h+1).
fn integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y)[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[y as usize * stride + (x + 1) as usize];
        }
    }
    table
}

fn region_mean(integral: &[u64], width: u32, height: u32, cx: u32, cy: u32, radius: u32) -> f64 {
    let stride = (width + 1) as usize;
    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(width as usize);
    let y2 = ((cy + radius + 1) as usize).min(height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }

    let sum = integral[y2 * stride + x2] as f64
        - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;
    sum / area
}
