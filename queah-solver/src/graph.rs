//! Reachable-position graph, arena-owned with id handles between nodes.
//!
//! The game graph contains cycles: non-capturing moves can shuffle pieces
//! back and forth and repeat a position. A node is therefore registered in
//! the index before its children are expanded, so a child that loops back to
//! an ancestor still under construction resolves to the existing node instead
//! of recursing forever. The work-list keeps memory use proportional to the
//! frontier rather than the search depth.

use std::collections::hash_map::Entry;

use queah_core::{GamePosition, PositionValue, Value};
use rustc_hash::FxHashMap;

/// Handle to a node within its [`Graph`].
pub type NodeId = u32;

/// One canonical position and its solve state.
pub struct Node {
    position: GamePosition,
    value: Value,
    children: Vec<NodeId>,
}

impl Node {
    /// The canonical position this node represents.
    pub fn position(&self) -> GamePosition {
        self.position
    }

    /// The assigned outcome value; zero until resolved.
    pub fn value(&self) -> Value {
        self.value
    }

    /// True if the node has no children: the side to move has no legal move
    /// and has lost.
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// Distinct children, one per legal move, transpositions merged.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn set_value(&mut self, value: Value) {
        debug_assert_eq!(self.value, 0);
        debug_assert_ne!(value, 0);
        self.value = value;
    }
}

/// Every canonical position reachable from a root, keyed by canonical id.
/// The graph exclusively owns its nodes.
pub struct Graph {
    nodes: Vec<Node>,
    index: FxHashMap<u32, NodeId>,
}

impl Graph {
    /// Enumerate every canonical position reachable from `root`.
    pub fn build(root: GamePosition) -> Graph {
        let mut graph = Graph {
            nodes: Vec::new(),
            index: FxHashMap::default(),
        };
        let mut work = Vec::new();
        graph.intern(root.canonical(), &mut work);

        while let Some(id) = work.pop() {
            let position = graph.nodes[id as usize].position;
            for mov in position.moves() {
                let child = position.try_move(&mov).canonical();
                let child_id = graph.intern(child, &mut work);
                let node = &mut graph.nodes[id as usize];
                // Distinct moves can transpose into the same child.
                if !node.children.contains(&child_id) {
                    node.children.push(child_id);
                }
            }
        }
        graph
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Iterate over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// The node holding a position, if the position is reachable.
    pub fn find(&self, position: GamePosition) -> Option<&Node> {
        self.index
            .get(&position.canonical().id())
            .map(|&id| self.node(id))
    }

    /// Smallest value among a node's children. Children are reached by a
    /// move, so their values speak for the opponent. Must only be called for
    /// non-terminal nodes.
    pub fn min_child_value(&self, id: NodeId) -> Value {
        let node = &self.nodes[id as usize];
        node.children
            .iter()
            .map(|&child| self.nodes[child as usize].value)
            .min()
            .expect("non-terminal node has children")
    }

    /// Flatten into (position, value) bindings for the value table.
    pub fn position_values(&self) -> Vec<PositionValue> {
        self.nodes
            .iter()
            .map(|node| PositionValue {
                position: node.position,
                value: node.value,
            })
            .collect()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    // Find the node for a canonical position, creating and queueing it first
    // when it is new.
    fn intern(&mut self, position: GamePosition, work: &mut Vec<NodeId>) -> NodeId {
        match self.index.entry(position.id()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.nodes.len() as NodeId;
                self.nodes.push(Node {
                    position,
                    value: 0,
                    children: Vec::new(),
                });
                entry.insert(id);
                work.push(id);
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queah_core::PlayerState;
    use std::collections::HashSet;

    fn bits(spaces: &[u8]) -> u16 {
        spaces.iter().fold(0, |acc, &s| acc | (1 << s))
    }

    fn position(att: &[u8], att_reserve: u8, def: &[u8], def_reserve: u8) -> GamePosition {
        GamePosition::new(
            PlayerState::new(bits(att), att_reserve),
            PlayerState::new(bits(def), def_reserve),
        )
    }

    #[test]
    fn test_terminal_root_is_single_node() {
        // The side to move has nothing on the board and nothing to drop.
        let graph = Graph::build(position(&[], 0, &[6], 2));
        assert_eq!(graph.len(), 1);
        assert!(graph.node(0).is_terminal());
        assert_eq!(graph.node(0).value(), 0);
    }

    #[test]
    fn test_forced_capture_reaches_terminal() {
        // The lone attacker must jump the lone defender, ending the game.
        let graph = Graph::build(position(&[0], 0, &[3], 0));
        assert_eq!(graph.len(), 2);

        let root = graph
            .find(position(&[0], 0, &[3], 0))
            .expect("root is reachable");
        assert_eq!(root.children().len(), 1);
        let child = graph.node(root.children()[0]);
        assert!(child.is_terminal());
    }

    #[test]
    fn test_nodes_are_canonical_and_children_deduped() {
        let graph = Graph::build(position(&[0], 0, &[12], 0));
        assert!(!graph.is_empty());
        for node in graph.nodes() {
            assert_eq!(node.position().canonical(), node.position());
            let unique: HashSet<NodeId> = node.children().iter().copied().collect();
            assert_eq!(unique.len(), node.children().len());
            for &child in node.children() {
                assert!((child as usize) < graph.len());
            }
        }
    }

    #[test]
    fn test_cyclic_subgame_terminates() {
        // Two lone pieces can shuffle forever; construction must still reach
        // a fixed point with every child edge mirrored by a legal move.
        let root = position(&[0], 0, &[12], 0);
        let graph = Graph::build(root);
        assert!(graph.find(root).is_some());

        for node in graph.nodes() {
            let moves = node.position().moves();
            let reachable: HashSet<u32> = moves
                .iter()
                .map(|m| node.position().try_move(m).canonical().id())
                .collect();
            assert_eq!(reachable.len(), node.children().len());
            for &child in node.children() {
                assert!(reachable.contains(&graph.node(child).position().id()));
            }
        }
    }
}
