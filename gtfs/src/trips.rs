use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{LineID, StopTime, TripID};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripID,
    pub line_id: LineID,
    /// Ordered by stop_sequence
    pub stop_times: Vec<StopTime>,
}

impl Trip {
    /// True if both trips visit exactly the same stops in the same order.
    pub fn same_pattern(&self, other: &Trip) -> bool {
        self.stop_times.len() == other.stop_times.len()
            && self
                .stop_times
                .iter()
                .zip(other.stop_times.iter())
                .all(|(a, b)| a.stop_id == b.stop_id)
    }
}

/// Returns trips in the order the file lists them, without stop times filled out yet.
pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<Trip>> {
    let mut trips: Vec<Trip> = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if !seen.insert(rec.trip_id.clone()) {
            bail!("Duplicate {:?}", rec.trip_id);
        }
        trips.push(Trip {
            id: rec.trip_id,
            line_id: rec.route_id,
            stop_times: Vec::new(),
        });
    }
    Ok(trips)
}

#[derive(Deserialize)]
struct Record {
    trip_id: TripID,
    route_id: LineID,
}
