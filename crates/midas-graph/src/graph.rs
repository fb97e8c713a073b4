//! The node graph: nodes, ported connections and visual groups.
//!
//! Routine invalid edits never panic: lookups return `Option`, mutations on
//! unknown ids are no-ops, and [`NodeGraph::can_connect`] reports why an edge is
//! refused.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    ConnectError,
    node::{Node, NodePort, PortDirection},
};

/// Minimum group width and height.
const MIN_GROUP_EXTENT: f64 = 40.0;

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeConnection {
    /// Source node id.
    pub source_node: String,
    /// Source (output) port.
    pub source_port: String,
    /// Target node id.
    pub target_node: String,
    /// Target (input) port.
    pub target_port: String,
}

impl NodeConnection {
    /// Build an edge.
    pub fn new(source_node: &str, source_port: &str, target_node: &str, target_port: &str) -> Self {
        Self {
            source_node: source_node.to_string(),
            source_port: source_port.to_string(),
            target_node: target_node.to_string(),
            target_port: target_port.to_string(),
        }
    }

    /// True when the edge starts or ends at `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_node == node_id || self.target_node == node_id
    }
}

/// Visual cluster of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGroup {
    /// Group id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Member node ids; a node belongs to at most one group.
    pub node_ids: Vec<String>,
    /// Top-left corner.
    pub position: (f64, f64),
    /// Width and height.
    pub size: (f64, f64),
    /// Whether members are hidden.
    pub collapsed: bool,
}

impl NodeGroup {
    /// A group with default title, geometry and no members.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: "Group".to_string(),
            node_ids: Vec::new(),
            position: (0.0, 0.0),
            size: (240.0, 180.0),
            collapsed: false,
        }
    }
}

/// Owns nodes, connections and groups.
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    /// Nodes in insertion order.
    nodes: Vec<Node>,
    /// Edges in insertion order.
    connections: Vec<NodeConnection>,
    /// Groups in insertion order.
    groups: Vec<NodeGroup>,
}

impl NodeGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A node with the same id is replaced in place.
    pub fn add_node(&mut self, node: Node) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(slot) => *slot = node,
            None => self.nodes.push(node),
        }
    }

    /// Remove a node, every edge touching it, and its group membership.
    /// Groups left empty are deleted.
    pub fn remove_node(&mut self, node_id: &str) {
        self.nodes.retain(|n| n.id != node_id);
        self.connections.retain(|c| !c.touches(node_id));
        self.groups.retain_mut(|g| {
            let before = g.node_ids.len();
            g.node_ids.retain(|id| id != node_id);
            g.node_ids.len() == before || !g.node_ids.is_empty()
        });
    }

    /// Node by id.
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Mutable node by id.
    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == node_id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Port `port_name` on node `node_id`.
    pub fn port(&self, node_id: &str, port_name: &str) -> Option<&NodePort> {
        self.node(node_id)?.port(port_name)
    }

    /// Move a node on the canvas.
    pub fn set_node_position(&mut self, node_id: &str, x: f64, y: f64) {
        if let Some(node) = self.node_mut(node_id) {
            node.position = (x, y);
        }
    }

    /// Check whether an edge may be added, returning the first rule it breaks.
    pub fn can_connect(
        &self,
        source_node: &str,
        source_port: &str,
        target_node: &str,
        target_port: &str,
    ) -> Result<(), ConnectError> {
        if source_node == target_node {
            return Err(ConnectError::SelfLoop);
        }
        let (Some(source), Some(target)) = (
            self.port(source_node, source_port),
            self.port(target_node, target_port),
        ) else {
            return Err(ConnectError::MissingPort);
        };
        if source.direction != PortDirection::Output {
            return Err(ConnectError::SourceNotOutput);
        }
        if target.direction != PortDirection::Input {
            return Err(ConnectError::TargetNotInput);
        }
        if !source.compatible_with(target) {
            return Err(ConnectError::IncompatibleTypes);
        }
        let candidate = NodeConnection::new(source_node, source_port, target_node, target_port);
        if self.connections.contains(&candidate) {
            return Err(ConnectError::Duplicate);
        }
        if self
            .connections
            .iter()
            .any(|c| c.target_node == target_node && c.target_port == target_port)
        {
            return Err(ConnectError::TargetOccupied);
        }
        Ok(())
    }

    /// Add an edge if [`Self::can_connect`] allows it.
    pub fn connect(
        &mut self,
        source_node: &str,
        source_port: &str,
        target_node: &str,
        target_port: &str,
    ) -> bool {
        if let Err(reason) = self.can_connect(source_node, source_port, target_node, target_port) {
            trace!(
                source_node,
                source_port, target_node, target_port, %reason, "connection refused"
            );
            return false;
        }
        self.connections.push(NodeConnection::new(
            source_node,
            source_port,
            target_node,
            target_port,
        ));
        true
    }

    /// Remove the exact edge, if present.
    pub fn disconnect(
        &mut self,
        source_node: &str,
        source_port: &str,
        target_node: &str,
        target_port: &str,
    ) {
        self.connections.retain(|c| {
            !(c.source_node == source_node
                && c.source_port == source_port
                && c.target_node == target_node
                && c.target_port == target_port)
        });
    }

    /// All edges in insertion order.
    pub fn connections(&self) -> &[NodeConnection] {
        &self.connections
    }

    /// Edges leaving `node_id`, optionally only from `port`.
    pub fn connections_from<'a>(
        &'a self,
        node_id: &'a str,
        port: Option<&'a str>,
    ) -> impl Iterator<Item = &'a NodeConnection> + 'a {
        self.connections.iter().filter(move |c| {
            c.source_node == node_id && port.is_none_or(|p| c.source_port == p)
        })
    }

    /// Edges entering `node_id`, optionally only into `port`.
    pub fn connections_to<'a>(
        &'a self,
        node_id: &'a str,
        port: Option<&'a str>,
    ) -> impl Iterator<Item = &'a NodeConnection> + 'a {
        self.connections.iter().filter(move |c| {
            c.target_node == node_id && port.is_none_or(|p| c.target_port == p)
        })
    }

    /// Edges entering `node_id`.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a NodeConnection> + 'a {
        self.connections_to(node_id, None)
    }

    /// Edges leaving `node_id`.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a NodeConnection> + 'a {
        self.connections_from(node_id, None)
    }

    /// True when no edge enters `node_id`.
    pub fn has_no_incoming(&self, node_id: &str) -> bool {
        self.incoming(node_id).next().is_none()
    }

    /// Drop all nodes, edges and groups.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
        self.groups.clear();
    }

    /// Add or replace a group, normalizing its members.
    pub fn add_group(&mut self, group: NodeGroup) {
        let id = group.id.clone();
        match self.groups.iter_mut().find(|g| g.id == id) {
            Some(slot) => *slot = group,
            None => self.groups.push(group),
        }
        self.normalize_group(&id);
    }

    /// Remove a group. Member nodes stay.
    pub fn remove_group(&mut self, group_id: &str) {
        self.groups.retain(|g| g.id != group_id);
    }

    /// Group by id.
    pub fn group(&self, group_id: &str) -> Option<&NodeGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    /// Groups in insertion order.
    pub fn groups(&self) -> &[NodeGroup] {
        &self.groups
    }

    /// Rename a group.
    pub fn set_group_title(&mut self, group_id: &str, title: &str) {
        if let Some(g) = self.group_mut(group_id) {
            g.title = title.to_string();
        }
    }

    /// Replace a group's members, normalizing them.
    pub fn set_group_nodes<I, S>(&mut self, group_id: &str, node_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(g) = self.group_mut(group_id) {
            g.node_ids = node_ids.into_iter().map(Into::into).collect();
            self.normalize_group(group_id);
        }
    }

    /// Move and resize a group; width and height are floored at 40.
    pub fn set_group_rect(&mut self, group_id: &str, x: f64, y: f64, width: f64, height: f64) {
        if let Some(g) = self.group_mut(group_id) {
            g.position = (x, y);
            g.size = (width.max(MIN_GROUP_EXTENT), height.max(MIN_GROUP_EXTENT));
        }
    }

    /// Collapse or expand a group.
    pub fn set_group_collapsed(&mut self, group_id: &str, collapsed: bool) {
        if let Some(g) = self.group_mut(group_id) {
            g.collapsed = collapsed;
        }
    }

    /// Groups that list `node_id`.
    pub fn groups_containing<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a NodeGroup> + 'a {
        self.groups
            .iter()
            .filter(move |g| g.node_ids.iter().any(|id| id == node_id))
    }

    /// True when a collapsed group hides `node_id`.
    pub fn is_node_collapsed(&self, node_id: &str) -> bool {
        self.groups_containing(node_id).any(|g| g.collapsed)
    }

    /// Mutable group by id.
    fn group_mut(&mut self, group_id: &str) -> Option<&mut NodeGroup> {
        self.groups.iter_mut().find(|g| g.id == group_id)
    }

    /// Drop unknown and duplicate members of `group_id` and take its members
    /// away from every other group.
    fn normalize_group(&mut self, group_id: &str) {
        let Some(index) = self.groups.iter().position(|g| g.id == group_id) else {
            return;
        };
        let mut members: Vec<String> = Vec::new();
        for id in &self.groups[index].node_ids {
            if self.node(id).is_some() && !members.contains(id) {
                members.push(id.clone());
            }
        }
        for (i, other) in self.groups.iter_mut().enumerate() {
            if i != index {
                other.node_ids.retain(|id| !members.contains(id));
            }
        }
        self.groups[index].node_ids = members;
    }
}
