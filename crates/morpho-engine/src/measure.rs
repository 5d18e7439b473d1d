//! Distance, length and angle queries.

use crate::error::{MorphologyError, Result};
use crate::morphology::NeuronMorphology;
use crate::NodeId;
use glam::DVec3;

impl NeuronMorphology {
    /// Euclidean distance between two nodes.
    pub fn get_distance_between_nodes(&self, a: NodeId, b: NodeId) -> Result<f64> {
        let pa = self.require(a)?.position;
        let pb = self.require(b)?.position;
        Ok(pa.distance(pb))
    }

    /// Summed edge lengths along `path`. Each consecutive pair must be a
    /// parent -> child edge.
    pub fn get_path_length(&self, path: &[NodeId]) -> Result<f64> {
        for &id in path {
            self.require(id)?;
        }
        path.windows(2).try_fold(0.0, |total, pair| {
            let (from, to) = (pair[0], pair[1]);
            if !self.has_edge(from, to) {
                return Err(MorphologyError::MissingEdge { from, to });
            }
            Ok(total + self.get_distance_between_nodes(from, to)?)
        })
    }

    /// Sum of every edge length.
    pub fn get_total_length(&self) -> f64 {
        self.edges()
            .filter_map(|(a, b)| Some(self.node(a)?.position.distance(self.node(b)?.position)))
            .sum()
    }

    /// Node nearest to `point`; ties go to the lowest ID.
    pub fn get_closest_node(&self, point: impl Into<DVec3>) -> Option<NodeId> {
        let point = point.into();
        let mut best: Option<(NodeId, f64)> = None;
        for node in self.nodes() {
            let d = node.position.distance_squared(point);
            // Nodes iterate in ascending ID order, so strict `<` keeps the lowest.
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((node.id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Angle in radians, within [0, pi], between vectors B->A and B->C.
    ///
    /// `b` must share an edge (either direction) with both `a` and `c`.
    pub fn get_branch_angle(&self, a: NodeId, b: NodeId, c: NodeId) -> Result<f64> {
        let pa = self.require(a)?.position;
        let pb = self.require(b)?.position;
        let pc = self.require(c)?.position;
        for (x, y) in [(a, b), (b, c)] {
            if !self.has_edge(x, y) && !self.has_edge(y, x) {
                return Err(MorphologyError::MissingEdge { from: x, to: y });
            }
        }

        let ba = offset(pa, pb);
        let bc = offset(pc, pb);
        if ba == DVec3::ZERO {
            return Err(MorphologyError::DegenerateEdge { from: a, to: b });
        }
        if bc == DVec3::ZERO {
            return Err(MorphologyError::DegenerateEdge { from: b, to: c });
        }
        // Rescale so the largest component is 1; keeps dot and lengths finite
        // and clear of underflow.
        let ba = ba / ba.abs().max_element();
        let bc = bc / bc.abs().max_element();
        let cos = ba.dot(bc) / (ba.length() * bc.length());
        Ok(cos.clamp(-1.0, 1.0).acos())
    }
}

/// `p - q`, or a half-scale difference when the full one overflows.
/// Only the direction matters to callers.
fn offset(p: DVec3, q: DVec3) -> DVec3 {
    let d = p - q;
    if d.is_finite() {
        d
    } else {
        p * 0.5 - q * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::types::SwcRecord;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn morphology(records: &[(NodeId, f64, f64, f64, i64)]) -> NeuronMorphology {
        let records = records
            .iter()
            .map(|&(id, x, y, z, p)| SwcRecord::new(id, 3, x, y, z, 1.0, p));
        NeuronMorphology::from_records(records, &LoadOptions::default()).unwrap()
    }

    #[test]
    fn colinear_angle_is_pi() {
        let n = morphology(&[(1, 0.0, 0.0, 0.0, -1), (2, 1.0, 0.0, 0.0, 1), (3, 2.0, 0.0, 0.0, 2)]);
        assert_relative_eq!(n.get_branch_angle(1, 2, 3).unwrap(), PI, epsilon = 1e-12);
    }

    #[test]
    fn right_angle() {
        let n = morphology(&[(1, 0.0, 0.0, 0.0, -1), (2, 1.0, 0.0, 0.0, 1), (3, 1.0, 3.0, 0.0, 2)]);
        assert_relative_eq!(n.get_branch_angle(1, 2, 3).unwrap(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn sibling_angle_at_fork() {
        let n = morphology(&[
            (1, 0.0, 0.0, 0.0, -1),
            (2, 1.0, 0.0, 0.0, 1),
            (3, 0.0, 1.0, 0.0, 1),
        ]);
        assert_relative_eq!(n.get_branch_angle(2, 1, 3).unwrap(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let n = morphology(&[(1, 0.0, 0.0, 0.0, -1), (2, 0.0, 0.0, 0.0, 1), (3, 1.0, 0.0, 0.0, 2)]);
        assert!(matches!(
            n.get_branch_angle(1, 2, 3),
            Err(MorphologyError::DegenerateEdge { from: 1, to: 2 })
        ));
        let n = morphology(&[(1, 0.0, 0.0, 0.0, -1), (2, 1.0, 0.0, 0.0, 1), (3, 1.0, 0.0, 0.0, 2)]);
        assert!(matches!(
            n.get_branch_angle(1, 2, 3),
            Err(MorphologyError::DegenerateEdge { from: 2, to: 3 })
        ));
    }

    #[test]
    fn huge_coordinates_give_finite_angle() {
        let n = morphology(&[
            (1, 0.0, 0.0, 0.0, -1),
            (2, 1e200, 0.0, 0.0, 1),
            (3, 2e200, 1e200, 0.0, 2),
        ]);
        let angle = n.get_branch_angle(1, 2, 3).unwrap();
        assert_relative_eq!(angle, 3.0 * FRAC_PI_4, epsilon = 1e-12);

        let n = morphology(&[
            (1, -1.5e308, 0.0, 0.0, -1),
            (2, 1.5e308, 0.0, 0.0, 1),
            (3, 1.5e308, 1.0e308, 0.0, 2),
        ]);
        assert_relative_eq!(n.get_branch_angle(1, 2, 3).unwrap(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn tiny_offsets_are_not_degenerate() {
        let n = morphology(&[
            (1, 0.0, 0.0, 0.0, -1),
            (2, 1e-170, 0.0, 0.0, 1),
            (3, 1e-170, 1e-170, 0.0, 2),
        ]);
        assert_relative_eq!(n.get_branch_angle(1, 2, 3).unwrap(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn angle_needs_edges() {
        let n = morphology(&[(1, 0.0, 0.0, 0.0, -1), (2, 1.0, 0.0, 0.0, 1), (3, 2.0, 0.0, 0.0, -1)]);
        assert!(matches!(
            n.get_branch_angle(1, 2, 3),
            Err(MorphologyError::MissingEdge { from: 2, to: 3 })
        ));
        assert!(matches!(n.get_branch_angle(1, 2, 9), Err(MorphologyError::UnknownNode(9))));
    }

    #[test]
    fn distance_and_unknown_ids() {
        let n = morphology(&[(1, 0.0, 0.0, 0.0, -1), (2, 3.0, 4.0, 0.0, 1)]);
        assert_relative_eq!(n.get_distance_between_nodes(1, 2).unwrap(), 5.0);
        assert!(matches!(n.get_distance_between_nodes(1, 3), Err(MorphologyError::UnknownNode(3))));
    }

    #[test]
    fn path_length_follows_edges() {
        let n = morphology(&[
            (1, 0.0, 0.0, 0.0, -1),
            (2, 0.0, 0.0, 2.0, 1),
            (3, 0.0, 3.0, 2.0, 2),
        ]);
        assert_relative_eq!(n.get_path_length(&[1, 2, 3]).unwrap(), 5.0);
        assert_eq!(n.get_path_length(&[2]).unwrap(), 0.0);
        assert_eq!(n.get_path_length(&[]).unwrap(), 0.0);
        assert!(matches!(
            n.get_path_length(&[3, 2]),
            Err(MorphologyError::MissingEdge { from: 3, to: 2 })
        ));
        assert!(matches!(n.get_path_length(&[1, 7]), Err(MorphologyError::UnknownNode(7))));
    }

    #[test]
    fn total_length_matches_edge_distances() {
        let n = morphology(&[
            (1, 0.0, 0.0, 0.0, -1),
            (2, 0.0, 0.0, 2.0, 1),
            (3, 1.0, 0.0, 2.0, 2),
            (4, 0.0, 4.0, 2.0, 2),
            (5, 0.0, 4.0, 5.0, 4),
        ]);
        let by_edge: f64 = n
            .edges()
            .map(|(a, b)| n.get_distance_between_nodes(a, b).unwrap())
            .sum();
        assert_relative_eq!(n.get_total_length(), by_edge, epsilon = 1e-12);
        assert_relative_eq!(n.get_total_length(), 2.0 + 1.0 + 4.0 + 3.0, epsilon = 1e-12);
    }

    #[test]
    fn closest_node_breaks_ties_by_id() {
        let n = morphology(&[(4, 1.0, 0.0, 0.0, -1), (2, -1.0, 0.0, 0.0, -1), (9, 5.0, 5.0, 5.0, -1)]);
        assert_eq!(n.get_closest_node([0.0, 0.0, 0.0]), Some(2));
        assert_eq!(n.get_closest_node([4.0, 4.0, 4.0]), Some(9));
        assert_eq!(NeuronMorphology::new().get_closest_node(DVec3::ZERO), None);
    }
}
