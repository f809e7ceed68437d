//! Nearest node and nearest section queries over the road network.
//!
//! Both lookups go through an R-tree, but the answers are exactly what a brute-force scan would
//! return: Euclidean distances, and equally close candidates resolved in favor of the lowest ID.

use gtfs::Pt2D;
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::{NodeID, RoadSection, Roads, SectionID};

#[derive(Clone, Debug, PartialEq)]
pub struct NodeMatch {
    pub node: NodeID,
    pub dist: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SectionMatch {
    pub section: SectionID,
    pub dist: f64,
    /// Where the query point projects onto the section. 0 is upstream, 1 is downstream.
    pub offset: f64,
    /// The projected point itself
    pub pt: Pt2D,
}

pub struct SpatialIndex {
    // The data is an index into node_ids
    nodes: RTree<GeomWithData<[f64; 2], usize>>,
    node_ids: Vec<NodeID>,
    sections: RTree<SectionSegment>,
    section_ids: Vec<SectionID>,
}

impl SpatialIndex {
    pub fn new(roads: &Roads) -> Self {
        Self::filtered(roads, |_| true)
    }

    /// Only sections passing `usable` can be matched. Nodes are always indexed.
    pub fn filtered<F: Fn(&RoadSection) -> bool>(roads: &Roads, usable: F) -> Self {
        // BTreeMap order, so a lower index always means a lower ID
        let mut node_ids = Vec::new();
        let mut node_pts = Vec::new();
        for (id, node) in &roads.nodes {
            node_pts.push(GeomWithData::new(
                [node.position.x, node.position.y],
                node_ids.len(),
            ));
            node_ids.push(id.clone());
        }

        let mut section_ids = Vec::new();
        let mut segments = Vec::new();
        for (id, section) in &roads.sections {
            if !usable(section) {
                continue;
            }
            match roads.endpoints(id) {
                Some((up, down)) => {
                    segments.push(SectionSegment::new(section_ids.len(), up, down));
                    section_ids.push(id.clone());
                }
                None => warn!("Section {id} has a missing endpoint; it won't be matched"),
            }
        }

        Self {
            nodes: RTree::bulk_load(node_pts),
            node_ids,
            sections: RTree::bulk_load(segments),
            section_ids,
        }
    }

    pub fn closest_node(&self, pt: Pt2D) -> Option<NodeMatch> {
        let query = [pt.x, pt.y];
        let mut best: Option<(usize, f64)> = None;
        for (obj, dist_2) in self.nodes.nearest_neighbor_iter_with_distance_2(&query) {
            match best {
                Some((_, best_2)) if dist_2 > best_2 => break,
                Some((idx, _)) if idx <= obj.data => {}
                _ => best = Some((obj.data, dist_2)),
            }
        }
        best.map(|(idx, dist_2)| NodeMatch {
            node: self.node_ids[idx].clone(),
            dist: dist_2.sqrt(),
        })
    }

    pub fn closest_section(&self, pt: Pt2D) -> Option<SectionMatch> {
        let query = [pt.x, pt.y];
        let mut best: Option<(&SectionSegment, f64)> = None;
        for (obj, dist_2) in self.sections.nearest_neighbor_iter_with_distance_2(&query) {
            match best {
                Some((_, best_2)) if dist_2 > best_2 => break,
                Some((seg, _)) if seg.idx <= obj.idx => {}
                _ => best = Some((obj, dist_2)),
            }
        }
        best.map(|(seg, dist_2)| {
            let (offset, projected) = project_onto_segment(query, seg.a, seg.b);
            SectionMatch {
                section: self.section_ids[seg.idx].clone(),
                dist: dist_2.sqrt(),
                offset,
                pt: Pt2D::new(projected[0], projected[1]),
            }
        })
    }
}

/// The straight line between a section's endpoints
struct SectionSegment {
    idx: usize,
    a: [f64; 2],
    b: [f64; 2],
    aabb: AABB<[f64; 2]>,
}

impl SectionSegment {
    fn new(idx: usize, up: Pt2D, down: Pt2D) -> Self {
        let a = [up.x, up.y];
        let b = [down.x, down.y];
        Self {
            idx,
            a,
            b,
            aabb: AABB::from_corners(a, b),
        }
    }
}

impl RTreeObject for SectionSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

impl PointDistance for SectionSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let (_, closest) = project_onto_segment(*point, self.a, self.b);
        let dx = point[0] - closest[0];
        let dy = point[1] - closest[1];
        dx * dx + dy * dy
    }
}

/// Projects p onto the segment ab, clamping to the ends. Returns the fraction along the segment
/// and the projected point. A segment with both ends in the same place projects to its start.
pub fn project_onto_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> (f64, [f64; 2]) {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let ab_ab = ab[0] * ab[0] + ab[1] * ab[1];
    if ab_ab == 0.0 {
        return (0.0, a);
    }
    let t = ((ab[0] * ap[0] + ab[1] * ap[1]) / ab_ab).clamp(0.0, 1.0);
    (t, [a[0] + t * ab[0], a[1] + t * ab[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    // a --ab--> b
    //           |
    //           bc
    //           v
    //           c
    fn roads() -> Roads {
        let mut roads = Roads::empty();
        roads.insert_node("a", Pt2D::new(0.0, 0.0));
        roads.insert_node("b", Pt2D::new(100.0, 0.0));
        roads.insert_node("c", Pt2D::new(100.0, -100.0));
        roads.insert_section("ab", "a", "b", None).unwrap();
        roads.insert_section("bc", "b", "c", None).unwrap();
        roads
    }

    // What the index promises to agree with
    fn brute_force_section(roads: &Roads, pt: Pt2D) -> (SectionID, f64) {
        let mut best: Option<(SectionID, f64)> = None;
        for id in roads.sections.keys() {
            let (up, down) = roads.endpoints(id).unwrap();
            let (_, proj) = project_onto_segment([pt.x, pt.y], [up.x, up.y], [down.x, down.y]);
            let dist = pt.dist_to(Pt2D::new(proj[0], proj[1]));
            if best.as_ref().map(|(_, d)| dist < *d).unwrap_or(true) {
                best = Some((id.clone(), dist));
            }
        }
        best.unwrap()
    }

    #[test]
    fn closest_node() {
        let index = SpatialIndex::new(&roads());
        let m = index.closest_node(Pt2D::new(90.0, 5.0)).unwrap();
        assert_eq!(m.node, NodeID::new("b"));
        assert!((m.dist - 125.0_f64.sqrt()).abs() < 1e-9);

        let exact = index.closest_node(Pt2D::new(0.0, 0.0)).unwrap();
        assert_eq!(exact.node, NodeID::new("a"));
        assert_eq!(exact.dist, 0.0);
    }

    #[test]
    fn closest_section_with_offset() {
        let index = SpatialIndex::new(&roads());
        let m = index.closest_section(Pt2D::new(25.0, 3.0)).unwrap();
        assert_eq!(m.section, SectionID::new("ab"));
        assert!((m.dist - 3.0).abs() < 1e-9);
        assert!((m.offset - 0.25).abs() < 1e-9);
        assert_eq!(m.pt, Pt2D::new(25.0, 0.0));

        let m = index.closest_section(Pt2D::new(110.0, -60.0)).unwrap();
        assert_eq!(m.section, SectionID::new("bc"));
        assert!((m.offset - 0.6).abs() < 1e-9);
    }

    #[test]
    fn projection_is_clamped() {
        let index = SpatialIndex::new(&roads());
        // Beyond the upstream end of ab; the infinite line would be 0 away
        let m = index.closest_section(Pt2D::new(-30.0, 0.0)).unwrap();
        assert_eq!(m.section, SectionID::new("ab"));
        assert_eq!(m.offset, 0.0);
        assert!((m.dist - 30.0).abs() < 1e-9);
    }

    #[test]
    fn ties_go_to_the_lowest_id() {
        let mut roads = Roads::empty();
        roads.insert_node("n2", Pt2D::new(-1.0, 0.0));
        roads.insert_node("n1", Pt2D::new(1.0, 0.0));
        roads.insert_node("n3", Pt2D::new(0.0, 1.0));
        roads.insert_node("n4", Pt2D::new(0.0, -5.0));
        roads.insert_section("z", "n2", "n3", None).unwrap();
        roads.insert_section("y", "n1", "n3", None).unwrap();
        let index = SpatialIndex::new(&roads);

        for _ in 0..3 {
            let node = index.closest_node(Pt2D::new(0.0, 0.0)).unwrap();
            assert_eq!(node.node, NodeID::new("n1"));
            let section = index.closest_section(Pt2D::new(0.0, 0.0)).unwrap();
            assert_eq!(section.section, SectionID::new("y"));
        }
    }

    #[test]
    fn agrees_with_brute_force() {
        let roads = roads();
        let index = SpatialIndex::new(&roads);
        for x in (-50..=150).step_by(25) {
            for y in (-150..=50).step_by(25) {
                let pt = Pt2D::new(x as f64 + 0.3, y as f64 - 0.7);
                let (id, dist) = brute_force_section(&roads, pt);
                let m = index.closest_section(pt).unwrap();
                assert_eq!(m.section, id, "at {pt:?}");
                assert!((m.dist - dist).abs() < 1e-9);
                assert!((0.0..=1.0).contains(&m.offset));
            }
        }
    }

    #[test]
    fn empty_network() {
        let index = SpatialIndex::new(&Roads::empty());
        assert!(index.closest_node(Pt2D::new(0.0, 0.0)).is_none());
        assert!(index.closest_section(Pt2D::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn degenerate_segment() {
        let (t, pt) = project_onto_segment([3.0, 4.0], [1.0, 1.0], [1.0, 1.0]);
        assert_eq!(t, 0.0);
        assert_eq!(pt, [1.0, 1.0]);
    }
}
