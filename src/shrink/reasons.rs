//! Records why each entity was marked, for `--why-are-you-keeping`.

use std::collections::HashMap;

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::model::{ClassId, ClassPath, MemberId};

/// An entity the marker can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageNode {
    /// Keep rules and library classes
    Root,
    Class(ClassId),
    Member(MemberId),
    KotlinMetadata(ClassId),
}

impl UsageNode {
    pub fn describe(&self, path: &ClassPath) -> String {
        match self {
            UsageNode::Root => "keep rules".to_string(),
            UsageNode::Class(id) => path.class_display(*id),
            UsageNode::Member(id) => path.member_display(*id),
            UsageNode::KotlinMetadata(id) => {
                format!("Kotlin metadata of {}", path.class_display(*id))
            }
        }
    }
}

/// Graph of first-cause edges: `a -> b` means `a` was being processed when
/// `b` was first marked
#[derive(Debug)]
pub struct UsageReasons {
    graph: DiGraph<UsageNode, ()>,
    nodes: HashMap<UsageNode, NodeIndex>,
    root: NodeIndex,
}

impl Default for UsageReasons {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageReasons {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(UsageNode::Root);
        let mut nodes = HashMap::new();
        nodes.insert(UsageNode::Root, root);
        Self { graph, nodes, root }
    }

    fn node(&mut self, node: UsageNode) -> NodeIndex {
        if let Some(index) = self.nodes.get(&node) {
            return *index;
        }
        let index = self.graph.add_node(node);
        self.nodes.insert(node, index);
        index
    }

    /// Record that `cause` led to `target` being marked. Only the first
    /// cause of each target is kept.
    pub fn record(&mut self, cause: Option<UsageNode>, target: UsageNode) {
        if self.nodes.contains_key(&target) {
            return;
        }
        let from = self.node(cause.unwrap_or(UsageNode::Root));
        let to = self.node(target);
        self.graph.add_edge(from, to, ());
    }

    pub fn is_recorded(&self, node: UsageNode) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Shortest chain from the roots to `target`, root first
    pub fn explain(&self, target: UsageNode) -> Option<Vec<UsageNode>> {
        let goal = *self.nodes.get(&target)?;
        let (_, path) = astar(&self.graph, self.root, |n| n == goal, |_| 1, |_| 0)?;
        Some(path.into_iter().map(|n| self.graph[n]).collect())
    }

    pub fn len(&self) -> usize {
        self.graph.node_count() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
