//! Neuron skeleton as a directed graph.
//!
//! Node attributes live in an ordered map keyed by ID; topology lives in a
//! `DiGraphMap` with edges pointing from parent to child. IDs are the only
//! cross-reference, so `Clone` yields a fully independent morphology.
//!
//! A morphology has no interior mutability. Sharing one between threads for
//! mutation needs external synchronisation by the caller.

use crate::config::{LoadOptions, ParentPolicy, TypePolicy};
use crate::error::{MorphologyError, Result};
use crate::types::{Node, NodeType, SwcRecord};
use crate::{NodeId, MAX_NODE_ID, ROOT_PARENT};
use glam::DVec3;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction::{Incoming, Outgoing};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct NeuronMorphology {
    nodes: BTreeMap<NodeId, Node>,
    skeleton: DiGraphMap<NodeId, ()>,
}

impl NeuronMorphology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a morphology from parsed SWC records.
    ///
    /// Every record becomes a node; a non-negative parent adds the edge
    /// `parent -> id`. Parents may appear after their children.
    pub fn from_records<I, R>(records: I, options: &LoadOptions) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<SwcRecord>,
    {
        let records: Vec<SwcRecord> = records.into_iter().map(Into::into).collect();
        let mut morphology = Self::new();

        for (index, record) in records.iter().enumerate() {
            let location = format!("record {} (id {})", index + 1, record.id);
            if morphology.contains_node(record.id) {
                return Err(MorphologyError::malformed(location, "duplicate node id"));
            }
            check_geometry(record).map_err(|reason| MorphologyError::malformed(&location, reason))?;
            let node_type = match options.type_policy {
                TypePolicy::Strict => NodeType::try_from_code(record.node_type)?,
                TypePolicy::Lenient => NodeType::from_code(record.node_type),
            };
            morphology.add_node(record.id, node_type, record.position(), record.radius)?;
        }

        for (index, record) in records.iter().enumerate() {
            let Some(parent) = record.parent_id() else {
                continue;
            };
            if morphology.contains_node(parent) {
                morphology.skeleton.add_edge(parent, record.id, ());
                continue;
            }
            match options.parent_policy {
                ParentPolicy::Reject => {
                    return Err(MorphologyError::malformed(
                        format!("record {} (id {})", index + 1, record.id),
                        format!("parent {} does not exist", parent),
                    ));
                }
                ParentPolicy::Drop => {
                    warn!(node = record.id, parent, "dropping edge to missing parent");
                }
            }
        }

        debug!(
            nodes = morphology.len(),
            edges = morphology.edge_count(),
            "built morphology from records"
        );
        Ok(morphology)
    }

    /// Insert a node, or replace the attributes of an existing one.
    /// Edges touching `id` are left in place.
    ///
    /// IDs above [`MAX_NODE_ID`] are rejected: they have no SWC parent
    /// spelling.
    pub fn add_node(&mut self, id: NodeId, node_type: NodeType, position: DVec3, radius: f64) -> Result<()> {
        if id > MAX_NODE_ID {
            return Err(MorphologyError::malformed(
                format!("node {}", id),
                format!("id exceeds {}", MAX_NODE_ID),
            ));
        }
        self.nodes.insert(
            id,
            Node {
                id,
                node_type,
                position,
                radius,
            },
        );
        self.skeleton.add_node(id);
        Ok(())
    }

    /// Add the directed edge `start -> end`. Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, start: NodeId, end: NodeId) -> Result<()> {
        self.require(start)?;
        self.require(end)?;
        self.skeleton.add_edge(start, end, ());
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Nodes in ascending ID order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> + '_ {
        self.nodes.values_mut()
    }

    /// Edges as `(parent, child)` pairs in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.skeleton.all_edges().map(|(a, b, _)| (a, b))
    }

    pub fn graph(&self) -> &DiGraphMap<NodeId, ()> {
        &self.skeleton
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.skeleton.edge_count()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn has_edge(&self, start: NodeId, end: NodeId) -> bool {
        self.skeleton.contains_edge(start, end)
    }

    /// In-degree plus out-degree.
    pub fn degree(&self, id: NodeId) -> Result<usize> {
        self.require(id)?;
        Ok(self.in_degree(id) + self.out_degree(id))
    }

    /// Lowest-ID predecessor, or `None` for a root.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.require(id)?;
        Ok(self.skeleton.neighbors_directed(id, Incoming).min())
    }

    /// Successors in ascending ID order.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.require(id)?;
        Ok(self.sorted_children(id))
    }

    /// Nodes without a predecessor, ascending.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|&id| self.in_degree(id) == 0)
            .collect()
    }

    /// Nodes without a successor, ascending.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|&id| self.out_degree(id) == 0)
            .collect()
    }

    /// IDs whose total degree exceeds 2, in ascending order.
    pub fn get_branch_points(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|&id| self.in_degree(id) + self.out_degree(id) > 2)
            .collect()
    }

    /// Strict type check over every node.
    pub fn validate(&self) -> Result<()> {
        match self.nodes.values().find(|n| !n.node_type.is_valid()) {
            Some(node) => Err(MorphologyError::InvalidType(node.node_type.code())),
            None => Ok(()),
        }
    }

    /// Simplified copy keeping only roots, leaves and branch points.
    ///
    /// Each maximal run of single-in/single-out nodes is contracted into one
    /// edge between its interesting endpoints. Every chain node is walked
    /// exactly once. A cycle made only of chain nodes keeps its lowest ID as
    /// an anchor with a self-loop.
    pub fn smoothed(&self) -> Self {
        let is_chain = |id: NodeId| self.in_degree(id) == 1 && self.out_degree(id) == 1;

        let mut anchors: BTreeSet<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|&id| !is_chain(id))
            .collect();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut edges: Vec<(NodeId, NodeId)> = Vec::new();

        let mut walk = |start: NodeId, anchors: &BTreeSet<NodeId>, visited: &mut HashSet<NodeId>| {
            for first in self.sorted_children(start) {
                let mut current = first;
                while !anchors.contains(&current) && visited.insert(current) {
                    match self.skeleton.neighbors_directed(current, Outgoing).next() {
                        Some(next) => current = next,
                        None => break,
                    }
                }
                edges.push((start, current));
            }
        };

        for &anchor in &anchors {
            walk(anchor, &anchors, &mut visited);
        }

        // Whatever is left unvisited sits on cycles with no interesting node.
        let orphans: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| !anchors.contains(id) && !visited.contains(id))
            .collect();
        for id in orphans {
            if visited.contains(&id) {
                continue;
            }
            anchors.insert(id);
            visited.insert(id);
            walk(id, &anchors, &mut visited);
        }

        let mut smoothed = Self::new();
        for &id in &anchors {
            if let Some(node) = self.nodes.get(&id) {
                smoothed.nodes.insert(id, node.clone());
                smoothed.skeleton.add_node(id);
            }
        }
        for (start, end) in edges {
            smoothed.skeleton.add_edge(start, end, ());
        }

        debug!(
            before = self.len(),
            after = smoothed.len(),
            "smoothed morphology"
        );
        smoothed
    }

    /// Records in parent-before-child order.
    ///
    /// Traversal starts from each root in ascending ID order, visiting
    /// children in ascending order. Nodes reachable only through cycles
    /// follow, again by ascending ID. A node with several predecessors
    /// reports the lowest one as its parent.
    pub fn to_records(&self) -> Vec<SwcRecord> {
        let mut records = Vec::with_capacity(self.len());
        let mut visited: HashSet<NodeId> = HashSet::with_capacity(self.len());

        let starts = self
            .roots()
            .into_iter()
            .chain(self.nodes.keys().copied());
        for start in starts {
            if visited.contains(&start) {
                continue;
            }
            let mut stack = vec![start];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                if let Some(node) = self.nodes.get(&id) {
                    let parent = self
                        .skeleton
                        .neighbors_directed(id, Incoming)
                        .min()
                        // Lossless: add_node keeps every ID within MAX_NODE_ID.
                        .map_or(ROOT_PARENT, |p| p as i64);
                    records.push(SwcRecord::new(
                        id,
                        node.node_type.code(),
                        node.position.x,
                        node.position.y,
                        node.position.z,
                        node.radius,
                        parent,
                    ));
                }
                stack.extend(
                    self.sorted_children(id)
                        .into_iter()
                        .rev()
                        .filter(|c| !visited.contains(c)),
                );
            }
        }
        records
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(MorphologyError::UnknownNode(id))
    }

    fn in_degree(&self, id: NodeId) -> usize {
        self.skeleton.neighbors_directed(id, Incoming).count()
    }

    fn out_degree(&self, id: NodeId) -> usize {
        self.skeleton.neighbors_directed(id, Outgoing).count()
    }

    fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self.skeleton.neighbors_directed(id, Outgoing).collect();
        children.sort_unstable();
        children
    }
}

fn check_geometry(record: &SwcRecord) -> std::result::Result<(), String> {
    if ![record.x, record.y, record.z].iter().all(|v| v.is_finite()) {
        return Err("non-finite coordinate".to_string());
    }
    if !record.radius.is_finite() || record.radius < 0.0 {
        return Err(format!("invalid radius {}", record.radius));
    }
    Ok(())
}
