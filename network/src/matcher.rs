use gtfs::{LineID, Mode, Pt2D, StopID, Time};
use serde::{Deserialize, Serialize};

use crate::{
    LineError, LinkPolicy, MatchingConfig, NodeID, RawLine, RawStop, RoadGraph, RoadSection,
    Roads, SectionID, SpatialIndex,
};

/// The road element a stop was snapped to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchedElement {
    Node(NodeID),
    Section { section: SectionID, offset: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedStop {
    pub stop_id: StopID,
    pub element: MatchedElement,
    /// Where on the road the stop ended up
    pub pt: Pt2D,
    /// How far the stop moved to get there
    pub dist: f64,
}

/// One piece of the route between two consecutive stops
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LegSection {
    Road(SectionID),
    /// A straight link the road network doesn't have. It gets an ID when the line is registered.
    Inferred {
        upstream: NodeID,
        downstream: NodeID,
        length: f64,
    },
}

/// A line with every stop anchored to the road network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedLine {
    pub line_id: LineID,
    pub mode: Mode,
    pub stops: Vec<MatchedStop>,
    /// legs[i] leads from stops[i] to stops[i + 1]
    pub legs: Vec<Vec<LegSection>>,
    pub timetable: Vec<Time>,
}

/// Everything needed to match lines against one road network. Read-only once built, so any
/// number of lines can be matched at the same time.
pub struct RoadIndex<'a> {
    roads: &'a Roads,
    spatial: SpatialIndex,
    graph: RoadGraph,
}

impl<'a> RoadIndex<'a> {
    /// Sections made up by earlier registrations are left out, so stops only snap to and route
    /// along the real road network.
    pub fn new(roads: &'a Roads, config: &MatchingConfig) -> Self {
        let usable = |s: &RoadSection| !config.is_synthesized(&s.id);
        Self {
            roads,
            spatial: SpatialIndex::filtered(roads, usable),
            graph: RoadGraph::filtered(roads, usable),
        }
    }

    /// Snaps one stop to the closest node if it's within the node threshold, or else to the
    /// closest section within the maximum radius. On failure, returns the distance to the nearest
    /// element, if there's any at all.
    pub fn match_stop(
        &self,
        stop: &RawStop,
        config: &MatchingConfig,
    ) -> Result<MatchedStop, Option<f64>> {
        let node = self.spatial.closest_node(stop.pos);
        if let Some(ref n) = node {
            if n.dist <= config.node_snap_threshold {
                return Ok(MatchedStop {
                    stop_id: stop.stop_id.clone(),
                    element: MatchedElement::Node(n.node.clone()),
                    pt: self.roads.nodes[&n.node].position,
                    dist: n.dist,
                });
            }
        }

        let section = self.spatial.closest_section(stop.pos);
        if let Some(ref s) = section {
            if s.dist <= config.max_match_radius {
                return Ok(MatchedStop {
                    stop_id: stop.stop_id.clone(),
                    element: MatchedElement::Section {
                        section: s.section.clone(),
                        offset: s.offset,
                    },
                    pt: s.pt,
                    dist: s.dist,
                });
            }
        }

        let nearest = match (node, section) {
            (Some(n), Some(s)) => Some(n.dist.min(s.dist)),
            (Some(n), None) => Some(n.dist),
            (None, Some(s)) => Some(s.dist),
            (None, None) => None,
        };
        Err(nearest)
    }

    /// Matches every stop, then connects consecutive stops. If any stop can't be matched, the
    /// whole line fails; a line with a gap can't be driven.
    pub fn match_line(
        &self,
        line: &RawLine,
        config: &MatchingConfig,
    ) -> Result<MatchedLine, LineError> {
        let mut stops = Vec::new();
        for stop in &line.stops {
            match self.match_stop(stop, config) {
                Ok(matched) => stops.push(matched),
                Err(nearest) => {
                    return Err(LineError::MapMatchFailure {
                        line: line.line_id.clone(),
                        stop: stop.stop_id.clone(),
                        radius: config.max_match_radius,
                        nearest,
                    });
                }
            }
        }

        let mut legs = Vec::new();
        for pair in stops.windows(2) {
            legs.push(self.connect(&line.line_id, &pair[0], &pair[1], config.link_policy)?);
        }

        Ok(MatchedLine {
            line_id: line.line_id.clone(),
            mode: line.mode,
            stops,
            legs,
            timetable: line.timetable.clone(),
        })
    }

    fn connect(
        &self,
        line: &LineID,
        from: &MatchedStop,
        to: &MatchedStop,
        policy: LinkPolicy,
    ) -> Result<Vec<LegSection>, LineError> {
        match (&from.element, &to.element) {
            (MatchedElement::Node(n1), MatchedElement::Node(n2)) if n1 == n2 => {
                return Ok(Vec::new());
            }
            (
                MatchedElement::Section {
                    section: s1,
                    offset: o1,
                },
                MatchedElement::Section {
                    section: s2,
                    offset: o2,
                },
            ) if s1 == s2 && o1 <= o2 => {
                return Ok(vec![LegSection::Road(s1.clone())]);
            }
            _ => {}
        }

        // Leave the first element by its downstream end, enter the second by its upstream end
        let exit = match from.element {
            MatchedElement::Node(ref n) => n,
            MatchedElement::Section { ref section, .. } => &self.roads.sections[section].downstream,
        };
        let entry = match to.element {
            MatchedElement::Node(ref n) => n,
            MatchedElement::Section { ref section, .. } => &self.roads.sections[section].upstream,
        };

        let mut leg = Vec::new();
        if let MatchedElement::Section { ref section, .. } = from.element {
            leg.push(LegSection::Road(section.clone()));
        }
        if exit != entry {
            let path = match policy {
                LinkPolicy::Inferred => None,
                LinkPolicy::ShortestPath | LinkPolicy::ShortestPathOrInferred => {
                    self.graph.shortest_path(exit, entry)
                }
            };
            match path {
                Some(path) => leg.extend(path.into_iter().map(LegSection::Road)),
                None if policy == LinkPolicy::ShortestPath => {
                    return Err(LineError::NoRoute {
                        line: line.clone(),
                        from: exit.clone(),
                        to: entry.clone(),
                    });
                }
                None => {
                    debug!("Line {line} needs an inferred link from {exit} to {entry}");
                    leg.push(self.inferred(exit, entry));
                }
            }
        }
        if let MatchedElement::Section { ref section, .. } = to.element {
            leg.push(LegSection::Road(section.clone()));
        }
        Ok(leg)
    }

    fn inferred(&self, upstream: &NodeID, downstream: &NodeID) -> LegSection {
        let length = self.roads.nodes[upstream]
            .position
            .dist_to(self.roads.nodes[downstream].position);
        LegSection::Inferred {
            upstream: upstream.clone(),
            downstream: downstream.clone(),
            length,
        }
    }
}
