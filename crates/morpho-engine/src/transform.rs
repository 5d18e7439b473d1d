//! Affine transforms over node positions.
//!
//! Each transform has a mutating form (`translate`, `scale`, `rotate`) and a
//! copying form (`translated`, `scaled`, `rotated`). Radius and type are never
//! touched. Parameters are checked before any node moves, so a rejected
//! transform leaves the morphology as it was.
//!
//! Rotation is right-handed, about the origin, applied about X, then Y, then Z
//! (`R = Rz * Ry * Rx`). Rotating by pi about Z maps (1, 0, 0) to (-1, 0, 0).

use crate::error::{MorphologyError, Result};
use crate::morphology::NeuronMorphology;
use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scale factor: one value for every axis, or one per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scale {
    Uniform(f64),
    PerAxis([f64; 3]),
}

impl Scale {
    pub fn factors(self) -> DVec3 {
        match self {
            Self::Uniform(k) => DVec3::splat(k),
            Self::PerAxis(v) => DVec3::from_array(v),
        }
    }
}

impl From<f64> for Scale {
    fn from(k: f64) -> Self {
        Self::Uniform(k)
    }
}

impl From<[f64; 3]> for Scale {
    fn from(v: [f64; 3]) -> Self {
        Self::PerAxis(v)
    }
}

impl From<DVec3> for Scale {
    fn from(v: DVec3) -> Self {
        Self::PerAxis(v.to_array())
    }
}

/// Rotation matrix for extrinsic X, Y, Z angles in radians.
pub fn rotation_matrix(angles: DVec3) -> DMat3 {
    DMat3::from_rotation_z(angles.z) * DMat3::from_rotation_y(angles.y) * DMat3::from_rotation_x(angles.x)
}

fn ensure_finite(what: &str, v: DVec3) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(MorphologyError::NonFiniteTransform(format!("{} {}", what, v)))
    }
}

impl NeuronMorphology {
    pub fn translate(&mut self, offset: impl Into<DVec3>) -> Result<&mut Self> {
        let offset = offset.into();
        ensure_finite("translation", offset)?;
        for node in self.nodes_mut() {
            node.position += offset;
        }
        debug!(%offset, "translated morphology");
        Ok(self)
    }

    pub fn translated(&self, offset: impl Into<DVec3>) -> Result<Self> {
        let mut copy = self.clone();
        copy.translate(offset)?;
        Ok(copy)
    }

    pub fn scale(&mut self, factor: impl Into<Scale>) -> Result<&mut Self> {
        let factors = factor.into().factors();
        ensure_finite("scale", factors)?;
        for node in self.nodes_mut() {
            node.position *= factors;
        }
        debug!(%factors, "scaled morphology");
        Ok(self)
    }

    pub fn scaled(&self, factor: impl Into<Scale>) -> Result<Self> {
        let mut copy = self.clone();
        copy.scale(factor)?;
        Ok(copy)
    }

    pub fn rotate(&mut self, angles: impl Into<DVec3>) -> Result<&mut Self> {
        let angles = angles.into();
        ensure_finite("rotation", angles)?;
        let rotation = rotation_matrix(angles);
        for node in self.nodes_mut() {
            node.position = rotation * node.position;
        }
        debug!(%angles, "rotated morphology");
        Ok(self)
    }

    pub fn rotated(&self, angles: impl Into<DVec3>) -> Result<Self> {
        let mut copy = self.clone();
        copy.rotate(angles)?;
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn single(position: [f64; 3]) -> NeuronMorphology {
        let mut n = NeuronMorphology::new();
        n.add_node(1, NodeType::Dendrite, DVec3::from_array(position), 2.5).unwrap();
        n
    }

    fn pos(n: &NeuronMorphology) -> DVec3 {
        n.node(1).unwrap().position
    }

    #[test]
    fn translate_in_place() {
        let mut n = single([0.0, 0.0, 5.0]);
        n.translate([5.0, 10.0, 15.0]).unwrap();
        assert_eq!(pos(&n), DVec3::new(5.0, 10.0, 20.0));
    }

    #[test]
    fn translate_round_trip() {
        let n = single([1.25, -3.5, 7.0]);
        let v = DVec3::new(0.1, 0.2, -0.3);
        let back = n.translated(v).unwrap().translated(-v).unwrap();
        let (a, b) = (pos(&n), pos(&back));
        assert_relative_eq!(a.x, b.x, epsilon = 1e-12);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-12);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-12);
    }

    #[test]
    fn scale_copy_leaves_receiver() {
        let mut n = single([0.0, 1.0, 5.0]);
        let m = n.scaled([100.0, 2.0, 3.0]).unwrap();
        assert_eq!(pos(&n), DVec3::new(0.0, 1.0, 5.0));
        assert_eq!(pos(&m), DVec3::new(0.0, 2.0, 15.0));
        n.scale(2.0).unwrap();
        assert_eq!(pos(&n), DVec3::new(0.0, 2.0, 10.0));
    }

    #[test]
    fn scale_round_trip() {
        let n = single([3.0, -4.0, 0.5]);
        let k = 7.3;
        let back = n.scaled(k).unwrap().scaled(1.0 / k).unwrap();
        assert_relative_eq!(pos(&back).x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(pos(&back).y, -4.0, epsilon = 1e-12);
        assert_relative_eq!(pos(&back).z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn rotate_quarter_turn_about_z() {
        let mut n = single([0.0, 1.0, 5.0]);
        n.rotate([0.0, 0.0, FRAC_PI_2]).unwrap();
        assert_relative_eq!(pos(&n).x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(pos(&n).y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pos(&n).z, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn rotate_half_turn_about_z() {
        let n = single([1.0, 0.0, 0.0]);
        let m = n.rotated([0.0, 0.0, PI]).unwrap();
        assert_relative_eq!(pos(&m).x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(pos(&m).y, 0.0, epsilon = 1e-12);
        assert_eq!(pos(&n), DVec3::X);
    }

    #[test]
    fn rotation_applies_x_before_z() {
        // X quarter turn sends Y to Z; Z rotation then leaves it alone.
        let n = single([0.0, 1.0, 0.0]);
        let m = n.rotated([FRAC_PI_2, 0.0, FRAC_PI_2]).unwrap();
        assert_relative_eq!(pos(&m).x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pos(&m).y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pos(&m).z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn transforms_keep_radius_and_type() {
        let n = single([1.0, 2.0, 3.0]);
        let m = n.rotated([0.3, 0.2, 0.1]).unwrap().scaled(4.0).unwrap();
        let node = m.node(1).unwrap();
        assert_eq!(node.radius, 2.5);
        assert_eq!(node.node_type, NodeType::Dendrite);
    }

    #[test]
    fn non_finite_parameters_rejected() {
        let mut n = single([1.0, 2.0, 3.0]);
        assert!(matches!(
            n.translate([f64::NAN, 0.0, 0.0]),
            Err(MorphologyError::NonFiniteTransform(_))
        ));
        assert!(n.scale(f64::INFINITY).is_err());
        assert!(n.rotate([0.0, f64::NAN, 0.0]).is_err());
        assert_eq!(pos(&n), DVec3::new(1.0, 2.0, 3.0));
    }
}
