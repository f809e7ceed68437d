use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Projection, Pt2D, StopID};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: StopID,
    pub name: Option<String>,
    pub code: Option<String>,
    pub pos: Pt2D,
}

impl Stop {
    pub fn describe(&self) -> String {
        match self.name {
            Some(ref name) => format!("{name} ({})", self.stop_id),
            None => self.stop_id.to_string(),
        }
    }
}

pub fn load<R: std::io::Read>(
    reader: R,
    projection: &Projection,
) -> Result<BTreeMap<StopID, Stop>> {
    let mut stops = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if stops.contains_key(&rec.stop_id) {
            bail!("Duplicate {:?}", rec.stop_id);
        }
        stops.insert(
            rec.stop_id.clone(),
            Stop {
                stop_id: rec.stop_id,
                name: rec.stop_name,
                code: rec.stop_code,
                pos: projection.project(rec.stop_lon, rec.stop_lat),
            },
        );
    }
    Ok(stops)
}

#[derive(Deserialize)]
struct Record {
    stop_id: StopID,
    stop_code: Option<String>,
    stop_name: Option<String>,
    stop_lon: f64,
    stop_lat: f64,
}
