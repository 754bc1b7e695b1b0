//! Edge-map preparation: grayscale, blur, Canny, morphological closing.

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Gaussian blur to suppress sensor noise before edge detection.
pub fn blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

pub fn detect_edges(img: &GrayImage, low: f32, high: f32) -> GrayImage {
    canny(img, low, high)
}

/// 3×3 dilation to close broken edge segments so contour tracing sees one
/// boundary instead of fragments.
pub fn close_edges(edges: &GrayImage) -> GrayImage {
    dilate(edges, Norm::LInf, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn blur_preserves_dimensions() {
        let img = GrayImage::from_pixel(20, 30, Luma([100u8]));
        let blurred = blur(&img, 1.4);
        assert_eq!(blurred.dimensions(), (20, 30));
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = GrayImage::from_pixel(32, 32, Luma([128u8]));
        let edges = detect_edges(&blur(&img, 1.4), 75.0, 200.0);
        assert!(edges.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn close_edges_thickens_a_line() {
        let mut img = GrayImage::from_pixel(16, 16, Luma([0u8]));
        for x in 2..14 {
            img.put_pixel(x, 8, Luma([255u8]));
        }
        let closed = close_edges(&img);
        // The single-pixel line gains neighbours above and below.
        assert_eq!(closed.get_pixel(8, 7)[0], 255);
        assert_eq!(closed.get_pixel(8, 9)[0], 255);
    }
}
