use std::collections::BTreeMap;

use anyhow::{Context, Result};
use gtfs::{LineID, Pt2D, Time};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{NodeID, RoadStopID, SectionID};

pub const PT_LAYER_TYPE: &str = "mnms.graph.layers.PublicTransportLayer";

/// The road network file, in the nested layout the simulator reads. Lines get added through
/// `register`; everything this tool doesn't understand passes through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadNetworkView {
    #[serde(rename = "ROADS")]
    pub roads: Roads,
    #[serde(rename = "LAYERS", default)]
    pub layers: Vec<Layer>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RoadsFile")]
pub struct Roads {
    #[serde(rename = "NODES")]
    pub nodes: BTreeMap<NodeID, RoadNode>,
    #[serde(rename = "SECTIONS")]
    pub sections: BTreeMap<SectionID, RoadSection>,
    #[serde(rename = "STOPS")]
    pub stops: BTreeMap<RoadStopID, RoadStop>,
    #[serde(rename = "ZONES")]
    pub zones: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadNode {
    pub id: NodeID,
    pub position: Pt2D,
}

/// A directed piece of road
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadSection {
    pub id: SectionID,
    pub upstream: NodeID,
    pub downstream: NodeID,
    pub length: f64,
}

/// A stop somewhere along a section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadStop {
    pub id: RoadStopID,
    pub section: SectionID,
    /// 0 is the upstream end, 1 the downstream end
    pub relative_position: f64,
    pub absolute_position: Pt2D,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Layer {
    PublicTransport(PtLayer),
    // Car layers and whatever else
    Other(Value),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PtLayer {
    #[serde(rename = "TYPE")]
    pub layer_type: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "VEH_TYPE")]
    pub veh_type: String,
    #[serde(
        rename = "DEFAULT_SPEED",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_speed: Option<f64>,
    #[serde(rename = "SERVICES", default)]
    pub services: Vec<Value>,
    #[serde(rename = "LINES")]
    pub lines: Vec<PtLine>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PtLine {
    #[serde(rename = "ID")]
    pub id: LineID,
    #[serde(rename = "STOPS")]
    pub stops: Vec<RoadStopID>,
    /// One list per pair of consecutive stops
    #[serde(rename = "SECTIONS")]
    pub sections: Vec<Vec<SectionID>>,
    #[serde(rename = "TIMETABLE")]
    pub timetable: Vec<Time>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RoadNetworkView {
    pub fn new(roads: Roads) -> Self {
        Self {
            roads,
            layers: Vec::new(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let view: RoadNetworkView =
            serde_json::from_str(raw).context("parsing the road network")?;
        info!(
            "Loaded a road network with {} nodes, {} sections, {} stops, and {} layers",
            view.roads.nodes.len(),
            view.roads.sections.len(),
            view.roads.stops.len(),
            view.layers.len()
        );
        Ok(view)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn pt_layer(&self, layer_id: &str) -> Option<&PtLayer> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::PublicTransport(pt) if pt.id == layer_id => Some(pt),
            _ => None,
        })
    }

    pub(crate) fn pt_layers_mut(&mut self) -> impl Iterator<Item = &mut PtLayer> {
        self.layers.iter_mut().filter_map(|layer| match layer {
            Layer::PublicTransport(pt) => Some(pt),
            Layer::Other(_) => None,
        })
    }

    /// Finds a registered line in any public transport layer.
    pub fn line(&self, id: &LineID) -> Option<&PtLine> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::PublicTransport(pt) => pt.lines.iter().find(|l| &l.id == id),
            Layer::Other(_) => None,
        })
    }
}

impl Roads {
    pub fn empty() -> Self {
        Self {
            nodes: BTreeMap::new(),
            sections: BTreeMap::new(),
            stops: BTreeMap::new(),
            zones: BTreeMap::new(),
        }
    }

    pub fn insert_node(&mut self, id: &str, position: Pt2D) {
        let id = NodeID::new(id);
        self.nodes.insert(id.clone(), RoadNode { id, position });
    }

    /// Without an explicit length, the straight-line distance between the endpoints is used.
    pub fn insert_section(
        &mut self,
        id: &str,
        upstream: &str,
        downstream: &str,
        length: Option<f64>,
    ) -> Result<()> {
        let section = make_section(
            &self.nodes,
            SectionID::new(id),
            NodeID::new(upstream),
            NodeID::new(downstream),
            length,
        )?;
        self.sections.insert(section.id.clone(), section);
        Ok(())
    }

    /// The endpoints of a section, if both nodes exist
    pub fn endpoints(&self, id: &SectionID) -> Option<(Pt2D, Pt2D)> {
        let section = self.sections.get(id)?;
        let up = self.nodes.get(&section.upstream)?;
        let down = self.nodes.get(&section.downstream)?;
        Some((up.position, down.position))
    }
}

fn make_section(
    nodes: &BTreeMap<NodeID, RoadNode>,
    id: SectionID,
    upstream: NodeID,
    downstream: NodeID,
    length: Option<f64>,
) -> Result<RoadSection> {
    let length = match length {
        Some(x) => x,
        None => {
            let up = nodes
                .get(&upstream)
                .ok_or_else(|| anyhow!("Section {id} starts at unknown node {upstream}"))?;
            let down = nodes
                .get(&downstream)
                .ok_or_else(|| anyhow!("Section {id} ends at unknown node {downstream}"))?;
            up.position.dist_to(down.position)
        }
    };
    Ok(RoadSection {
        id,
        upstream,
        downstream,
        length,
    })
}

// The on-disk form, where section lengths are optional
#[derive(Deserialize)]
struct RoadsFile {
    #[serde(rename = "NODES")]
    nodes: BTreeMap<NodeID, RoadNode>,
    #[serde(rename = "SECTIONS")]
    sections: BTreeMap<SectionID, SectionRecord>,
    #[serde(rename = "STOPS", default)]
    stops: BTreeMap<RoadStopID, RoadStop>,
    #[serde(rename = "ZONES", default)]
    zones: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct SectionRecord {
    id: SectionID,
    upstream: NodeID,
    downstream: NodeID,
    length: Option<f64>,
}

impl TryFrom<RoadsFile> for Roads {
    type Error = anyhow::Error;

    fn try_from(file: RoadsFile) -> Result<Self> {
        let mut sections = BTreeMap::new();
        for (key, rec) in file.sections {
            if key != rec.id {
                bail!("Section keyed by {key} claims to be {}", rec.id);
            }
            let section = make_section(&file.nodes, rec.id, rec.upstream, rec.downstream, rec.length)?;
            sections.insert(key, section);
        }
        for (key, node) in &file.nodes {
            if key != &node.id {
                bail!("Node keyed by {key} claims to be {}", node.id);
            }
        }
        Ok(Self {
            nodes: file.nodes,
            sections,
            stops: file.stops,
            zones: file.zones,
        })
    }
}
