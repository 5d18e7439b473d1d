/// Node identifier, unique within one morphology.
pub type NodeId = u64;

/// Parent value written for root nodes. Any negative parent is read as a root.
pub const ROOT_PARENT: i64 = -1;

/// Largest accepted node ID, so every ID is also a valid SWC parent field.
pub const MAX_NODE_ID: NodeId = i64::MAX as NodeId;

pub mod types {
    use crate::error::{MorphologyError, Result};
    use crate::NodeId;
    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// SWC structure identifier.
    ///
    /// Codes 0..=7 are the standard tags. `Unrecognized` keeps an
    /// out-of-range code from a leniently loaded file so it can be
    /// written back unchanged; it never passes `is_valid`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub enum NodeType {
        #[default]
        Undefined,
        Soma,
        Axon,
        Dendrite,
        ApicalDendrite,
        ForkPoint,
        EndPoint,
        Custom,
        Unrecognized(i64),
    }

    impl NodeType {
        pub fn from_code(code: i64) -> Self {
            match code {
                0 => Self::Undefined,
                1 => Self::Soma,
                2 => Self::Axon,
                3 => Self::Dendrite,
                4 => Self::ApicalDendrite,
                5 => Self::ForkPoint,
                6 => Self::EndPoint,
                7 => Self::Custom,
                other => Self::Unrecognized(other),
            }
        }

        /// Strict conversion: out-of-range codes are an error.
        pub fn try_from_code(code: i64) -> Result<Self> {
            match Self::from_code(code) {
                Self::Unrecognized(c) => Err(MorphologyError::InvalidType(c)),
                t => Ok(t),
            }
        }

        pub fn code(self) -> i64 {
            match self {
                Self::Undefined => 0,
                Self::Soma => 1,
                Self::Axon => 2,
                Self::Dendrite => 3,
                Self::ApicalDendrite => 4,
                Self::ForkPoint => 5,
                Self::EndPoint => 6,
                Self::Custom => 7,
                Self::Unrecognized(c) => c,
            }
        }

        pub fn is_valid(self) -> bool {
            is_valid_type(self.code())
        }
    }

    /// True iff `t` is one of the eight standard SWC type codes.
    pub fn is_valid_type(t: i64) -> bool {
        (0..=7).contains(&t)
    }

    /// One parsed SWC line: `id type x y z radius parent`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct SwcRecord {
        pub id: NodeId,
        pub node_type: i64,
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub radius: f64,
        pub parent: i64,
    }

    impl SwcRecord {
        pub fn new(id: NodeId, node_type: i64, x: f64, y: f64, z: f64, radius: f64, parent: i64) -> Self {
            Self { id, node_type, x, y, z, radius, parent }
        }

        pub fn position(&self) -> DVec3 {
            DVec3::new(self.x, self.y, self.z)
        }

        /// Parent ID, or `None` for the root sentinel.
        pub fn parent_id(&self) -> Option<NodeId> {
            u64::try_from(self.parent).ok()
        }
    }

    impl From<(NodeId, i64, f64, f64, f64, f64, i64)> for SwcRecord {
        fn from((id, t, x, y, z, r, p): (NodeId, i64, f64, f64, f64, f64, i64)) -> Self {
            Self::new(id, t, x, y, z, r, p)
        }
    }

    /// A skeleton sample point.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Node {
        pub id: NodeId,
        pub node_type: NodeType,
        pub position: DVec3,
        pub radius: f64,
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn valid_type_range() {
            assert!((0..=7).all(is_valid_type));
            assert!(!is_valid_type(-1));
            assert!(!is_valid_type(8));
        }

        #[test]
        fn node_type_codes() {
            for code in 0..=7 {
                let t = NodeType::try_from_code(code).unwrap();
                assert_eq!(t.code(), code);
                assert!(t.is_valid());
            }
            assert_eq!(NodeType::from_code(4), NodeType::ApicalDendrite);
            assert_eq!(NodeType::from_code(10), NodeType::Unrecognized(10));
            assert!(!NodeType::Unrecognized(10).is_valid());
            assert!(matches!(NodeType::try_from_code(10), Err(MorphologyError::InvalidType(10))));
        }

        #[test]
        fn record_parent_sentinel() {
            assert_eq!(SwcRecord::new(1, 1, 0.0, 0.0, 0.0, 1.0, -1).parent_id(), None);
            assert_eq!(SwcRecord::new(2, 3, 0.0, 0.0, 0.0, 1.0, 1).parent_id(), Some(1));
        }
    }
}

pub mod client;
pub mod config;
pub mod error;
pub mod measure;
pub mod morphology;
pub mod swc;
pub mod transform;

pub use config::{ClientConfig, LoadOptions, ParentPolicy, TypePolicy};
pub use client::NeuroMorphoClient;
pub use error::{ClientError, MorphologyError, Result};
pub use morphology::NeuronMorphology;
pub use transform::Scale;
pub use types::{is_valid_type, Node, NodeType, SwcRecord};
