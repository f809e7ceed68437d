use std::collections::BTreeMap;

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::{NodeID, RoadSection, Roads, SectionID};

/// Shortest paths along the directed road sections, weighted by length
pub struct RoadGraph {
    graph: DiGraph<NodeID, Edge>,
    nodes: BTreeMap<NodeID, NodeIndex>,
    section_ids: Vec<SectionID>,
}

struct Edge {
    // Index into section_ids
    section: usize,
    length: f64,
}

impl RoadGraph {
    pub fn new(roads: &Roads) -> Self {
        Self::filtered(roads, |_| true)
    }

    /// Only sections passing `usable` can be driven along.
    pub fn filtered<F: Fn(&RoadSection) -> bool>(roads: &Roads, usable: F) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        for id in roads.nodes.keys() {
            nodes.insert(id.clone(), graph.add_node(id.clone()));
        }
        let mut section_ids = Vec::new();
        for section in roads.sections.values().filter(|s| usable(*s)) {
            if let (Some(up), Some(down)) =
                (nodes.get(&section.upstream), nodes.get(&section.downstream))
            {
                graph.add_edge(
                    *up,
                    *down,
                    Edge {
                        section: section_ids.len(),
                        length: section.length,
                    },
                );
                section_ids.push(section.id.clone());
            }
        }
        Self {
            graph,
            nodes,
            section_ids,
        }
    }

    /// The sections to follow from one node to another. Empty if they're the same node, `None` if
    /// there's no way through.
    pub fn shortest_path(&self, from: &NodeID, to: &NodeID) -> Option<Vec<SectionID>> {
        if from == to {
            return Some(Vec::new());
        }
        let start = *self.nodes.get(from)?;
        let goal = *self.nodes.get(to)?;

        // A* with no heuristic is just Dijkstra, but hands back the path
        let (_, path) = astar(
            &self.graph,
            start,
            |n| n == goal,
            |e| e.weight().length,
            |_| 0.0,
        )?;

        let mut sections = Vec::new();
        for pair in path.windows(2) {
            // With parallel sections, take the shortest, then the lowest ID
            let edge = self
                .graph
                .edges_connecting(pair[0], pair[1])
                .map(|e| e.weight())
                .min_by(|e1, e2| {
                    e1.length
                        .total_cmp(&e2.length)
                        .then_with(|| e1.section.cmp(&e2.section))
                })?;
            sections.push(self.section_ids[edge.section].clone());
        }
        Some(sections)
    }
}

#[cfg(test)]
mod tests {
    use gtfs::Pt2D;

    use super::*;

    fn ids(list: &[&str]) -> Vec<SectionID> {
        list.iter().map(|x| SectionID::new(*x)).collect()
    }

    // a -> b -> c, plus a long direct a -> c and two parallel b -> c
    fn roads() -> Roads {
        let mut roads = Roads::empty();
        roads.insert_node("a", Pt2D::new(0.0, 0.0));
        roads.insert_node("b", Pt2D::new(10.0, 0.0));
        roads.insert_node("c", Pt2D::new(20.0, 0.0));
        roads.insert_node("island", Pt2D::new(50.0, 50.0));
        roads.insert_section("ab", "a", "b", None).unwrap();
        roads.insert_section("bc2", "b", "c", Some(10.0)).unwrap();
        roads.insert_section("bc1", "b", "c", Some(10.0)).unwrap();
        roads.insert_section("bc_long", "b", "c", Some(15.0)).unwrap();
        roads.insert_section("ac", "a", "c", Some(25.0)).unwrap();
        roads
    }

    #[test]
    fn follows_shortest() {
        let graph = RoadGraph::new(&roads());
        assert_eq!(
            graph.shortest_path(&NodeID::new("a"), &NodeID::new("c")),
            Some(ids(&["ab", "bc1"]))
        );
    }

    #[test]
    fn respects_direction() {
        let graph = RoadGraph::new(&roads());
        assert_eq!(
            graph.shortest_path(&NodeID::new("c"), &NodeID::new("a")),
            None
        );
        assert_eq!(
            graph.shortest_path(&NodeID::new("a"), &NodeID::new("island")),
            None
        );
    }

    #[test]
    fn same_node_is_empty() {
        let graph = RoadGraph::new(&roads());
        assert_eq!(
            graph.shortest_path(&NodeID::new("b"), &NodeID::new("b")),
            Some(Vec::new())
        );
    }

    #[test]
    fn unknown_nodes() {
        let graph = RoadGraph::new(&roads());
        assert_eq!(
            graph.shortest_path(&NodeID::new("a"), &NodeID::new("nope")),
            None
        );
    }
}
