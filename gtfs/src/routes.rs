use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{LineID, Trip};

/// The kinds of public transport the road network distinguishes. Each one gets its own layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mode {
    Bus,
    Tram,
    Metro,
}

impl Mode {
    pub fn from_route_type(route_type: u16) -> Self {
        match route_type {
            0 => Mode::Tram,
            1 => Mode::Metro,
            // Rail, ferries, trolleybuses and the rest all get treated like buses
            _ => Mode::Bus,
        }
    }
}

/// Everything the feed knows about one line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub line_id: LineID,
    pub mode: Mode,
    pub short_name: Option<String>,
    /// In the order the feed lists them
    pub trips: Vec<Trip>,
}

impl Line {
    pub fn new(line_id: LineID, mode: Mode) -> Self {
        Self {
            line_id,
            mode,
            short_name: None,
            trips: Vec::new(),
        }
    }

    pub fn describe(&self) -> String {
        match self.short_name {
            Some(ref name) => format!("{name} ({}, {:?})", self.line_id, self.mode),
            None => format!("{} ({:?})", self.line_id, self.mode),
        }
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<BTreeMap<LineID, Line>> {
    let mut lines = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if lines.contains_key(&rec.route_id) {
            bail!("Duplicate {:?}", rec.route_id);
        }
        let mut line = Line::new(rec.route_id.clone(), Mode::from_route_type(rec.route_type));
        line.short_name = rec.route_short_name;
        lines.insert(rec.route_id, line);
    }
    Ok(lines)
}

#[derive(Deserialize)]
struct Record {
    route_id: LineID,
    route_type: u16,
    route_short_name: Option<String>,
}
