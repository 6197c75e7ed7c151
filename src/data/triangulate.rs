use crate::core::projection::PlanePoint;
use earcutr::earcut;

/// Triangulates one polygon (outer ring first, then holes) into a flat
/// `(x, y, 1.0)` vertex list ready for a 3x3 matrix.
///
/// A trailing point equal to the first one is dropped. Rings with fewer than
/// three distinct points are ignored; an unusable outer ring yields nothing.
pub fn triangulate_polygon(rings: &[Vec<PlanePoint>]) -> Vec<f32> {
    let mut coords: Vec<f64> = Vec::new();
    let mut holes: Vec<usize> = Vec::new();
    let mut vertices_2d: Vec<PlanePoint> = Vec::new();

    for (i, ring) in rings.iter().enumerate() {
        let ring = open_ring(ring);
        if ring.len() < 3 || ring.iter().any(|p| !p.is_finite()) {
            if i == 0 {
                return Vec::new();
            }
            continue;
        }
        if i > 0 {
            holes.push(vertices_2d.len());
        }
        for p in ring {
            coords.push(p.x);
            coords.push(p.y);
            vertices_2d.push(*p);
        }
    }

    match earcut(&coords, &holes, 2) {
        Ok(indices) => {
            let mut out = Vec::with_capacity(indices.len() * 3);
            for idx in indices {
                let p = vertices_2d[idx];
                out.extend_from_slice(&[p.x as f32, p.y as f32, 1.0]);
            }
            out
        }
        Err(e) => {
            log::trace!("earcut failed: {e:?}");
            Vec::new()
        }
    }
}

/// Outline of an axis-aligned rectangle as four `(x, y, 1.0)` corners.
pub fn rect_outline(sw: PlanePoint, ne: PlanePoint) -> Vec<f32> {
    vec![
        sw.x as f32, sw.y as f32, 1.0,
        ne.x as f32, sw.y as f32, 1.0,
        ne.x as f32, ne.y as f32, 1.0,
        sw.x as f32, ne.y as f32, 1.0,
    ]
}

fn open_ring(ring: &[PlanePoint]) -> &[PlanePoint] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}
