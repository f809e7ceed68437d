//! Snaps the stops of a public transport feed onto a road network, connects them along the roads,
//! and registers the resulting lines in the network's public transport layers.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod bbox;
mod canonical;
mod config;
mod error;
mod ids;
mod index;
mod matcher;
mod pipeline;
mod raw_line;
mod registrar;
mod roads;
mod router;

pub use bbox::{filter_line, point_in_box, BoundingBox};
pub use canonical::select_canonical;
pub use config::{LayerConfig, LinkPolicy, MatchingConfig};
pub use error::LineError;
pub use ids::{NodeID, RoadStopID, SectionID};
pub use index::{project_onto_segment, NodeMatch, SectionMatch, SpatialIndex};
pub use matcher::{LegSection, MatchedElement, MatchedLine, MatchedStop, RoadIndex};
pub use pipeline::{run, RunSummary};
pub use raw_line::{build_raw_line, RawLine, RawStop};
pub use registrar::{register, Registration};
pub use roads::{
    Layer, PtLayer, PtLine, RoadNetworkView, RoadNode, RoadSection, RoadStop, Roads,
    PT_LAYER_TYPE,
};
pub use router::RoadGraph;
