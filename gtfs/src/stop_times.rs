use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{StopID, Time, TripID};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub stop_id: StopID,
    /// GTFS lets intermediate stops that aren't timepoints leave both times blank.
    pub arrival_time: Option<Time>,
    pub departure_time: Option<Time>,
}

impl StopTime {
    pub fn new(stop_id: StopID, arrival_time: Option<Time>, departure_time: Option<Time>) -> Self {
        Self {
            stop_id,
            arrival_time,
            departure_time,
        }
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<BTreeMap<TripID, Vec<StopTime>>> {
    let mut stop_times = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        let arrival_time = parse_optional(&rec.arrival_time)?;
        let departure_time = parse_optional(&rec.departure_time)?;
        stop_times
            .entry(rec.trip_id)
            .or_insert_with(Vec::new)
            .push((
                rec.stop_sequence,
                StopTime {
                    stop_id: rec.stop_id,
                    // If only one is specified, the vehicle doesn't dwell
                    arrival_time: arrival_time.or(departure_time),
                    departure_time: departure_time.or(arrival_time),
                },
            ));
    }

    // Sort by stop_sequence, in case the file isn't in order
    let mut results = BTreeMap::new();
    for (trip_id, mut stops) in stop_times {
        stops.sort_by_key(|(seq, _)| *seq);
        results.insert(
            trip_id,
            stops.into_iter().map(|(_, stop_time)| stop_time).collect(),
        );
    }
    Ok(results)
}

fn parse_optional(raw: &Option<String>) -> Result<Option<Time>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(x) => Ok(Some(Time::parse(x)?)),
    }
}

#[derive(Deserialize)]
struct Record {
    trip_id: TripID,
    arrival_time: Option<String>,
    departure_time: Option<String>,
    stop_id: StopID,
    stop_sequence: usize,
}
