use std::cmp::Ordering;

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};

use crate::geom::{BoundingBox, Geometries};

/// The resolved overlap of one fine shape with its best coarse shape.
#[derive(Debug, Clone)]
pub struct Overlap {
    /// Index of the fine shape.
    pub fine: usize,
    /// Index of the coarse shape with the largest share of the fine shape's area.
    pub coarse: usize,
    pub intersection_area: f64,
    pub fine_area: f64,
    /// Intersection of the two shapes.
    pub geometry: MultiPolygon<f64>,
}

impl Overlap {
    /// Fraction of the fine shape covered by the coarse shape.
    #[inline]
    pub fn percent_inner_area(&self) -> f64 { self.intersection_area / self.fine_area }
}

impl Geometries {
    /// For each shape in `self`, intersect it with every overlapping shape in `other`
    /// and keep only the candidate covering the largest fraction of its area.
    ///
    /// Pairs that merely touch (zero intersection area) are not candidates. Equal
    /// fractions are resolved with `tie_break` over the coarse indices, smallest first.
    /// Shapes with no candidate at all are left out of the output.
    pub(crate) fn overlay_largest<F>(&self, other: &Geometries, tie_break: F) -> Vec<Overlap>
    where
        F: Fn(usize, usize) -> Ordering,
    {
        let mut resolved = Vec::with_capacity(self.len());

        for (i, shape) in self.shapes().iter().enumerate() {
            let Some(rect) = shape.bounding_rect() else { continue };
            let fine_area = shape.unsigned_area();
            if fine_area <= 0.0 { continue }

            let mut candidates = other.query(&BoundingBox::envelope_of(&rect))
                .map(|bb| bb.idx())
                .filter_map(|j| {
                    let geometry = shape.intersection(&other.shapes()[j]);
                    let intersection_area = geometry.unsigned_area();
                    (intersection_area > 0.0).then(|| Overlap {
                        fine: i,
                        coarse: j,
                        intersection_area,
                        fine_area,
                        geometry,
                    })
                })
                .collect::<Vec<_>>();

            candidates.sort_by(|a, b| {
                b.percent_inner_area().total_cmp(&a.percent_inner_area())
                    .then_with(|| tie_break(a.coarse, b.coarse))
                    .then_with(|| a.coarse.cmp(&b.coarse))
            });

            if let Some(best) = candidates.into_iter().next() {
                resolved.push(best);
            }
        }

        resolved
    }
}
