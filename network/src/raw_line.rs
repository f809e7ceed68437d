use std::collections::BTreeMap;

use gtfs::{Line, LineID, Mode, Pt2D, Stop, StopID, Time};
use serde::{Deserialize, Serialize};

use crate::{select_canonical, LineError};

/// A line before map matching. Stops only have their feed coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    pub line_id: LineID,
    pub mode: Mode,
    /// In the order the canonical trip visits them
    pub stops: Vec<RawStop>,
    /// When a vehicle leaves the first stop, for every trip following the canonical pattern.
    /// Sorted.
    pub timetable: Vec<Time>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawStop {
    pub stop_id: StopID,
    pub name: Option<String>,
    pub pos: Pt2D,
    pub arrival: Option<Time>,
    pub departure: Option<Time>,
}

/// Combines the canonical trip of a line with stop positions.
pub fn build_raw_line(line: &Line, stops: &BTreeMap<StopID, Stop>) -> Result<RawLine, LineError> {
    let id = &line.line_id;
    let canonical = match select_canonical(&line.trips) {
        Some(trip) => trip,
        None => return Err(LineError::malformed(id, "no trips")),
    };
    if canonical.stop_times.len() < 2 {
        return Err(LineError::malformed(
            id,
            format!(
                "the longest trip {} has {} stop(s); a line needs at least two",
                canonical.id,
                canonical.stop_times.len()
            ),
        ));
    }

    let mut raw_stops = Vec::new();
    // The latest time seen so far along the trip. Blank times don't count.
    let mut latest: Option<Time> = None;
    for st in &canonical.stop_times {
        let stop = match stops.get(&st.stop_id) {
            Some(stop) => stop,
            None => {
                return Err(LineError::malformed(
                    id,
                    format!("trip {} visits unknown stop {}", canonical.id, st.stop_id),
                ))
            }
        };
        if let (Some(arrival), Some(departure)) = (st.arrival_time, st.departure_time) {
            if arrival > departure {
                return Err(LineError::malformed(
                    id,
                    format!(
                        "trip {} arrives at {} at {arrival}, after leaving at {departure}",
                        canonical.id,
                        stop.describe()
                    ),
                ));
            }
        }
        for t in [st.arrival_time, st.departure_time].into_iter().flatten() {
            if let Some(prev) = latest {
                if t < prev {
                    return Err(LineError::malformed(
                        id,
                        format!(
                            "trip {} goes back in time at {} ({t} after {prev})",
                            canonical.id,
                            stop.describe()
                        ),
                    ));
                }
            }
            latest = Some(t);
        }

        raw_stops.push(RawStop {
            stop_id: st.stop_id.clone(),
            name: stop.name.clone(),
            pos: stop.pos,
            arrival: st.arrival_time,
            departure: st.departure_time,
        });
    }

    let mut timetable: Vec<Time> = line
        .trips
        .iter()
        .filter(|trip| trip.same_pattern(canonical))
        .filter_map(|trip| trip.stop_times[0].departure_time)
        .collect();
    timetable.sort();
    if timetable.is_empty() {
        warn!("Line {id} has no departure times from its first stop");
    }

    Ok(RawLine {
        line_id: id.clone(),
        mode: line.mode,
        stops: raw_stops,
        timetable,
    })
}
