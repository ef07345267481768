//! Gated similarity scoring between tracks and detections.

use ndarray::Array2;

use crate::tracker::rect::Rect;

/// Cost used for pairs that fail the gate; never accepted as a match.
pub const GATED: f64 = 1e6;

/// Normalised centroid and area differences between a track and a detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    /// Centroid distance divided by the proximity bound
    pub centroid: f64,
    /// Relative area difference divided by the area bound
    pub area: f64,
}

impl Similarity {
    pub fn between(track: &Rect, det: &Rect, max_centroid_distance: f64, max_area_ratio: f64) -> Self {
        let centroid = track.center_distance(det) as f64 / max_centroid_distance;

        let (ta, da) = (track.area() as f64, det.area() as f64);
        let larger = ta.max(da);
        let relative = if larger > 0.0 { (ta - da).abs() / larger } else { 0.0 };

        Self {
            centroid,
            area: relative / max_area_ratio,
        }
    }

    /// Both components inside their bounds.
    pub fn qualifies(&self) -> bool {
        self.centroid < 1.0 && self.area < 1.0
    }

    /// Combined distance; smaller is a better match.
    pub fn score(&self) -> f64 {
        self.centroid + self.area
    }
}

/// Gated cost matrix of shape (tracks, detections).
///
/// `centroid_bound` gives each track's proximity bound in pixels.
pub fn similarity_cost(
    track_boxes: &[Rect],
    det_boxes: &[Rect],
    centroid_bound: impl Fn(&Rect) -> f64,
    max_area_ratio: f64,
) -> Array2<f64> {
    let mut costs = Array2::from_elem((track_boxes.len(), det_boxes.len()), GATED);
    for (i, t) in track_boxes.iter().enumerate() {
        let bound = centroid_bound(t);
        for (j, d) in det_boxes.iter().enumerate() {
            let sim = Similarity::between(t, d, bound, max_area_ratio);
            if sim.qualifies() {
                costs[[i, j]] = sim.score();
            }
        }
    }
    costs
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// One-to-one assignment minimising total cost; pairs at or above [`GATED`] are left unmatched.
pub fn linear_assignment(cost_matrix: &Array2<f64>) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), GATED);
    padded
        .slice_mut(ndarray::s![..num_rows, ..num_cols])
        .assign(cost_matrix);

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] < GATED {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_components() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(3.0, 4.0, 10.0, 10.0);
        let sim = Similarity::between(&a, &b, 10.0, 0.5);
        assert!((sim.centroid - 0.5).abs() < 1e-9);
        assert_eq!(sim.area, 0.0);
        assert!(sim.qualifies());

        let c = Rect::new(0.0, 0.0, 10.0, 20.0);
        let sim = Similarity::between(&a, &c, 10.0, 0.5);
        // Area halves: relative difference 0.5 sits on the bound
        assert!((sim.area - 1.0).abs() < 1e-9);
        assert!(!sim.qualifies());
    }

    #[test]
    fn test_cost_matrix_gates() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0)];
        let dets = [Rect::new(1.0, 0.0, 10.0, 10.0), Rect::new(500.0, 0.0, 10.0, 10.0)];
        let costs = similarity_cost(&tracks, &dets, |_| 64.0, 0.5);
        assert!(costs[[0, 0]] < 1.0);
        assert_eq!(costs[[0, 1]], GATED);
    }

    #[test]
    fn test_linear_assignment_prefers_global_optimum() {
        // Greedy on row 0 would take column 0 and strand row 1
        let costs = ndarray::array![[0.1, 0.2], [0.15, GATED]];
        let result = linear_assignment(&costs);
        let mut matches = result.matches.clone();
        matches.sort();
        assert_eq!(matches, vec![(0, 1), (1, 0)]);
        assert!(result.unmatched_tracks.is_empty());
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_linear_assignment_leaves_gated_unmatched() {
        let costs = ndarray::array![[GATED, GATED], [0.3, GATED]];
        let result = linear_assignment(&costs);
        assert_eq!(result.matches, vec![(1, 0)]);
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_linear_assignment_empty() {
        let result = linear_assignment(&Array2::zeros((0, 3)));
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);
    }
}
