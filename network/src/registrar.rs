//! Writes matched lines into the road network.
//!
//! A line's new stops and inferred sections are staged and checked before anything touches the
//! view, so a line either lands completely or not at all. IDs for new records are derived from
//! the records themselves: the same line registered twice reuses everything the first run made.

use std::collections::BTreeMap;

use gtfs::LineID;

use crate::{
    Layer, LegSection, LineError, MatchedElement, MatchedLine, MatchingConfig, NodeID, PtLayer,
    PtLine, RoadNetworkView, RoadSection, RoadStop, RoadStopID, Roads, SectionID, PT_LAYER_TYPE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// A line with the same ID was there before, possibly in another layer
    Replaced,
}

/// Adds or replaces a line in the layer for its mode. On error, the view is untouched.
pub fn register(
    view: &mut RoadNetworkView,
    line: &MatchedLine,
    config: &MatchingConfig,
) -> Result<Registration, LineError> {
    let staged = Staging::new(&view.roads, line, &config.id_prefix)?;
    staged.check(&view.roads)?;

    let layer_id = &config.layer(line.mode).layer_id;
    let other_kind = view.layers.iter().any(|layer| match layer {
        Layer::Other(value) => {
            value.get("ID").and_then(|id| id.as_str()) == Some(layer_id.as_str())
        }
        Layer::PublicTransport(_) => false,
    });
    if other_kind {
        return Err(LineError::inconsistent(
            &line.line_id,
            format!("layer {layer_id} exists, but isn't a public transport layer"),
        ));
    }

    // Nothing can fail past this point
    let Staging {
        stops,
        sections,
        stop_ids,
        legs,
        ..
    } = staged;
    for (id, stop) in stops {
        view.roads.stops.insert(id, stop);
    }
    for (id, section) in sections {
        view.roads.sections.insert(id, section);
    }

    let mut existed = false;
    for layer in view.pt_layers_mut() {
        if &layer.id != layer_id {
            let before = layer.lines.len();
            layer.lines.retain(|l| l.id != line.line_id);
            if layer.lines.len() != before {
                info!("Line {} moves from {} to {layer_id}", line.line_id, layer.id);
                existed = true;
            }
        }
    }

    let pt_line = PtLine {
        id: line.line_id.clone(),
        stops: stop_ids,
        sections: legs,
        timetable: line.timetable.clone(),
        extra: BTreeMap::new(),
    };
    let target = view.pt_layers_mut().find(|layer| &layer.id == layer_id);
    match target {
        Some(layer) => match layer.lines.iter_mut().find(|l| l.id == line.line_id) {
            Some(existing) => {
                *existing = pt_line;
                existed = true;
            }
            None => layer.lines.push(pt_line),
        },
        None => {
            let cfg = config.layer(line.mode);
            info!("Creating layer {layer_id}");
            view.layers.push(Layer::PublicTransport(PtLayer {
                layer_type: PT_LAYER_TYPE.to_string(),
                id: cfg.layer_id.clone(),
                veh_type: cfg.veh_type.clone(),
                default_speed: Some(cfg.default_speed),
                services: Vec::new(),
                lines: vec![pt_line],
                extra: BTreeMap::new(),
            }));
        }
    }

    Ok(if existed {
        Registration::Replaced
    } else {
        Registration::Inserted
    })
}

struct Staging {
    stops: BTreeMap<RoadStopID, RoadStop>,
    sections: BTreeMap<SectionID, RoadSection>,
    stop_ids: Vec<RoadStopID>,
    legs: Vec<Vec<SectionID>>,
    // Only used by check()
    anchors: Vec<Anchor>,
    line_id: LineID,
}

/// Where a leg has to start or end
enum Anchor {
    Node(NodeID),
    Section(SectionID),
}

impl Staging {
    fn new(roads: &Roads, line: &MatchedLine, prefix: &str) -> Result<Self, LineError> {
        let mut staging = Staging {
            stops: BTreeMap::new(),
            sections: BTreeMap::new(),
            stop_ids: Vec::new(),
            legs: Vec::new(),
            anchors: Vec::new(),
            line_id: line.line_id.clone(),
        };

        for leg in &line.legs {
            let mut ids = Vec::new();
            for piece in leg {
                match piece {
                    LegSection::Road(id) => ids.push(id.clone()),
                    LegSection::Inferred {
                        upstream,
                        downstream,
                        length,
                    } => {
                        let mut record = RoadSection {
                            id: SectionID::new(""),
                            upstream: upstream.clone(),
                            downstream: downstream.clone(),
                            length: *length,
                        };
                        let base = format!("{prefix}{upstream}_{downstream}");
                        let id = allocate(&base, |candidate| {
                            record.id = SectionID::new(candidate);
                            let key = &record.id;
                            let existing =
                                roads.sections.get(key).or_else(|| staging.sections.get(key));
                            existing.map(|x| x == &record)
                        });
                        record.id = SectionID::new(id);
                        ids.push(record.id.clone());
                        staging.sections.insert(record.id.clone(), record);
                    }
                }
            }
            staging.legs.push(ids);
        }

        for (idx, stop) in line.stops.iter().enumerate() {
            let (section, relative_position, anchor) = match stop.element {
                MatchedElement::Section {
                    ref section,
                    offset,
                } => (section.clone(), offset, Anchor::Section(section.clone())),
                MatchedElement::Node(ref node) => {
                    let (section, pos) = staging
                        .host_from_legs(idx)
                        .or_else(|| host_section(roads, &staging.sections, node, prefix))
                        .ok_or_else(|| {
                            LineError::inconsistent(
                                &line.line_id,
                                format!(
                                    "stop {} is on node {node}, which has no sections",
                                    stop.stop_id
                                ),
                            )
                        })?;
                    (section, pos, Anchor::Node(node.clone()))
                }
            };
            let mut record = RoadStop {
                id: RoadStopID::new(stop.stop_id.as_str()),
                section,
                relative_position,
                absolute_position: stop.pt,
            };
            let id = allocate(stop.stop_id.as_str(), |candidate| {
                record.id = RoadStopID::new(candidate);
                let key = &record.id;
                let existing = roads.stops.get(key).or_else(|| staging.stops.get(key));
                existing.map(|x| x == &record)
            });
            record.id = RoadStopID::new(id);
            staging.stop_ids.push(record.id.clone());
            staging.stops.insert(record.id.clone(), record);
            staging.anchors.push(anchor);
        }

        // Records already in the network don't need to be written again
        staging
            .stops
            .retain(|id, stop| roads.stops.get(id) != Some(stop));
        staging
            .sections
            .retain(|id, section| roads.sections.get(id) != Some(section));

        Ok(staging)
    }

    /// A stop on a node sits at the start of the leg leaving it, or else at the end of the leg
    /// arriving there. Either way, the section belongs to the line.
    fn host_from_legs(&self, idx: usize) -> Option<(SectionID, f64)> {
        if let Some(first) = self.legs.get(idx).and_then(|leg| leg.first()) {
            return Some((first.clone(), 0.0));
        }
        let incoming = idx.checked_sub(1).and_then(|prev| self.legs.get(prev));
        incoming
            .and_then(|leg| leg.last())
            .map(|last| (last.clone(), 1.0))
    }

    fn check(&self, roads: &Roads) -> Result<(), LineError> {
        let line = &self.line_id;
        let section = |id: &SectionID| self.sections.get(id).or_else(|| roads.sections.get(id));

        for (id, stop) in &self.stops {
            if roads.stops.get(id).map(|x| x != stop).unwrap_or(false) {
                return Err(LineError::IdentifierCollision {
                    line: line.clone(),
                    id: id.to_string(),
                });
            }
            if section(&stop.section).is_none() {
                return Err(LineError::inconsistent(
                    line,
                    format!("stop {id} is on unknown section {}", stop.section),
                ));
            }
        }
        for (id, record) in &self.sections {
            if roads.sections.get(id).map(|x| x != record).unwrap_or(false) {
                return Err(LineError::IdentifierCollision {
                    line: line.clone(),
                    id: id.to_string(),
                });
            }
            for node in [&record.upstream, &record.downstream] {
                if !roads.nodes.contains_key(node) {
                    return Err(LineError::inconsistent(
                        line,
                        format!("section {id} touches unknown node {node}"),
                    ));
                }
            }
        }

        if self.legs.len() + 1 != self.stop_ids.len() {
            return Err(LineError::inconsistent(
                line,
                format!(
                    "{} stops, but {} legs between them",
                    self.stop_ids.len(),
                    self.legs.len()
                ),
            ));
        }

        for (idx, leg) in self.legs.iter().enumerate() {
            let mut resolved = Vec::new();
            for id in leg {
                match section(id) {
                    Some(s) => resolved.push(s),
                    None => {
                        return Err(LineError::inconsistent(
                            line,
                            format!("leg {idx} uses unknown section {id}"),
                        ))
                    }
                }
            }
            for pair in resolved.windows(2) {
                if pair[0].downstream != pair[1].upstream {
                    return Err(LineError::inconsistent(
                        line,
                        format!("leg {idx} jumps from {} to {}", pair[0].id, pair[1].id),
                    ));
                }
            }

            let (from, to) = (&self.anchors[idx], &self.anchors[idx + 1]);
            let ok = match (resolved.first(), resolved.last()) {
                (Some(first), Some(last)) => {
                    let starts = match from {
                        Anchor::Node(n) => &first.upstream == n,
                        Anchor::Section(s) => &first.id == s,
                    };
                    let ends = match to {
                        Anchor::Node(n) => &last.downstream == n,
                        Anchor::Section(s) => &last.id == s,
                    };
                    starts && ends
                }
                // Only two stops on the same node can share an empty leg
                _ => matches!((from, to), (Anchor::Node(a), Anchor::Node(b)) if a == b),
            };
            if !ok {
                return Err(LineError::inconsistent(
                    line,
                    format!(
                        "leg {idx} doesn't connect stop {} to stop {}",
                        self.stop_ids[idx],
                        self.stop_ids[idx + 1]
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// For a stop on a node whose legs are all empty: the lowest ID leaving the node, or else the
/// lowest ID entering it, along with the position along that section. Real road sections win over
/// ones made up by earlier registrations.
fn host_section(
    roads: &Roads,
    staged: &BTreeMap<SectionID, RoadSection>,
    node: &NodeID,
    prefix: &str,
) -> Option<(SectionID, f64)> {
    let all = || roads.sections.values().chain(staged.values());
    let rank = |s: &RoadSection| (s.id.as_str().starts_with(prefix), s.id.clone());
    if let Some((_, id)) = all().filter(|s| &s.upstream == node).map(rank).min() {
        return Some((id, 0.0));
    }
    all()
        .filter(|s| &s.downstream == node)
        .map(rank)
        .min()
        .map(|(_, id)| (id, 1.0))
}

/// Tries `base`, then `base_1`, `base_2`, and so on. `lookup` says whether a candidate is taken
/// already, and if so, whether by the same record. The first free or identical candidate wins.
fn allocate<F: FnMut(&str) -> Option<bool>>(base: &str, mut lookup: F) -> String {
    let mut candidate = base.to_string();
    let mut n = 1;
    loop {
        match lookup(&candidate) {
            None | Some(true) => return candidate,
            Some(false) => {
                candidate = format!("{base}_{n}");
                n += 1;
            }
        }
    }
}
