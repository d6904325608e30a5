use geo::{BooleanOps, MultiPolygon};

use crate::geom::Geometries;

impl Geometries {
    /// Union the shapes listed in each group into a single MultiPolygon per group.
    /// This method may be slow for large numbers of complex polygons.
    pub(crate) fn dissolve(&self, groups: &[Vec<usize>]) -> Vec<MultiPolygon<f64>> {
        groups.iter()
            .map(|members| members.iter()
                .map(|&i| self.shapes()[i].clone())
                .reduce(|a, b| a.union(&b))
                .unwrap_or_else(|| MultiPolygon(vec![])))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, Area, MultiPolygon};

    use crate::geom::Geometries;

    fn square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y), (x: x + 1.0, y: y), (x: x + 1.0, y: y + 1.0), (x: x, y: y + 1.0), (x: x, y: y),
        ]])
    }

    #[test]
    fn dissolve_preserves_area() {
        let geoms = Geometries::new(vec![square(0.0, 0.0), square(1.0, 0.0), square(5.0, 5.0)]);
        let out = geoms.dissolve(&[vec![0, 1], vec![2], vec![]]);

        assert_eq!(out.len(), 3);
        assert!((out[0].unsigned_area() - 2.0).abs() < 1e-9);
        assert!((out[1].unsigned_area() - 1.0).abs() < 1e-9);
        assert!(out[2].0.is_empty());
    }
}
