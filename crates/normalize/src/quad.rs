//! Document boundary detection: contour selection, polygon approximation,
//! and corner ordering for the perspective warp.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::debug;

/// A detected document boundary with corners ordered
/// `[top-left, top-right, bottom-right, bottom-left]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [(f32, f32); 4],
}

impl Quad {
    /// Warp-target dimensions: width from the longer of the two horizontal
    /// edges, height from the longer of the two vertical edges.
    pub fn output_dimensions(&self) -> (u32, u32) {
        let [tl, tr, br, bl] = self.corners;
        let width = distance(tl, tr).max(distance(br, bl));
        let height = distance(tl, bl).max(distance(tr, br));
        (width.round().max(0.0) as u32, height.round().max(0.0) as u32)
    }
}

/// Find the document quadrilateral in a dilated edge map.
///
/// Selects the outer contour of maximum enclosed area, rejects it when the
/// area is under `min_area`, and approximates it with Douglas-Peucker at
/// `epsilon_ratio` of the closed perimeter. Anything other than exactly four
/// vertices means no usable boundary.
pub fn detect_document_quad(
    edges: &GrayImage,
    min_area: f64,
    epsilon_ratio: f64,
) -> Option<Quad> {
    let contours = find_contours::<i32>(edges);
    let outer = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer);

    let largest = outer.max_by(|a, b| {
        polygon_area(&a.points)
            .partial_cmp(&polygon_area(&b.points))
            .unwrap_or(std::cmp::Ordering::Equal)
    })?;

    let area = polygon_area(&largest.points);
    if area < min_area {
        debug!(area, min_area, "Largest contour below area threshold");
        return None;
    }

    let perimeter = arc_length(&largest.points, true);
    let approx = approximate_polygon_dp(&largest.points, perimeter * epsilon_ratio, true);
    if approx.len() != 4 {
        debug!(vertices = approx.len(), "Approximation is not a quadrilateral");
        return None;
    }

    let points = [
        (approx[0].x as f32, approx[0].y as f32),
        (approx[1].x as f32, approx[1].y as f32),
        (approx[2].x as f32, approx[2].y as f32),
        (approx[3].x as f32, approx[3].y as f32),
    ];
    Some(Quad { corners: sort_corners(points) })
}

/// Order four arbitrary corner points as `[TL, TR, BR, BL]`.
///
/// Top-left has the minimum x+y sum, bottom-right the maximum; top-right has
/// the maximum x−y difference, bottom-left the minimum. The assignment is
/// independent of the input ordering.
pub fn sort_corners(points: [(f32, f32); 4]) -> [(f32, f32); 4] {
    let by_sum = |p: &&(f32, f32)| p.0 + p.1;
    let by_diff = |p: &&(f32, f32)| p.0 - p.1;

    let tl = *points.iter().min_by(|a, b| cmp_f32(by_sum(a), by_sum(b))).unwrap();
    let br = *points.iter().max_by(|a, b| cmp_f32(by_sum(a), by_sum(b))).unwrap();
    let tr = *points.iter().max_by(|a, b| cmp_f32(by_diff(a), by_diff(b))).unwrap();
    let bl = *points.iter().min_by(|a, b| cmp_f32(by_diff(a), by_diff(b))).unwrap();

    [tl, tr, br, bl]
}

fn cmp_f32(a: f32, b: f32) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Enclosed polygon area via the shoelace formula.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0f64;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        area += points[i].x as f64 * points[j].y as f64;
        area -= points[j].x as f64 * points[i].y as f64;
    }
    area.abs() / 2.0
}
