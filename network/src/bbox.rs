use std::str::FromStr;

use anyhow::Result;
use gtfs::Time;
use serde::{Deserialize, Serialize};

use crate::{LineError, RawLine, RawStop};

/// An axis-aligned area, in the same coordinate system as the stops and road nodes
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if !(min_x <= max_x && min_y <= max_y) {
            bail!("Bounding box ({min_x}, {min_y}, {max_x}, {max_y}) has min > max");
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }
}

/// Parses "min_x,min_y,max_x,max_y"
impl FromStr for BoundingBox {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let values = raw
            .split(',')
            .map(|x| x.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| anyhow!("Bounding box {raw:?}: {err}"))?;
        if values.len() != 4 {
            bail!("Bounding box {raw:?} needs 4 numbers");
        }
        Self::new(values[0], values[1], values[2], values[3])
    }
}

/// Boundaries count as inside.
pub fn point_in_box(x: f64, y: f64, bbox: &BoundingBox) -> bool {
    bbox.min_x <= x && x <= bbox.max_x && bbox.min_y <= y && y <= bbox.max_y
}

/// Keeps only the stops inside the box, in their original order. A line needs at least two stops
/// to go anywhere, so anything shorter is reported as an `EmptyLine`.
pub fn filter_line(mut line: RawLine, bbox: &BoundingBox) -> Result<RawLine, LineError> {
    let before = line.stops.len();
    let first_time = line.stops.first().and_then(stop_time);
    line.stops
        .retain(|stop| point_in_box(stop.pos.x, stop.pos.y, bbox));

    if line.stops.len() < 2 {
        return Err(LineError::EmptyLine {
            line: line.line_id,
            remaining: line.stops.len(),
        });
    }
    if line.stops.len() != before {
        debug!(
            "Line {} keeps {} of {} stops inside the bounding box",
            line.line_id,
            line.stops.len(),
            before
        );
    }

    // The timetable counts departures from the first stop. If that stop is gone, shift everything
    // to the new first stop, or the earliest kept stop with a time if it has none.
    if line.stops.len() != before {
        let kept = line
            .stops
            .iter()
            .enumerate()
            .find_map(|(idx, stop)| stop_time(stop).map(|t| (idx, t)));
        match (first_time, kept) {
            (Some(old), Some((idx, new))) => {
                if idx != 0 {
                    warn!(
                        "Line {} has no time at its new first stop {}; shifting the timetable to \
                         stop {} instead",
                        line.line_id, line.stops[0].stop_id, line.stops[idx].stop_id
                    );
                }
                let delta = new.inner_seconds() as i64 - old.inner_seconds() as i64;
                for t in &mut line.timetable {
                    *t = t.offset(delta);
                }
            }
            _ => warn!(
                "Line {} lost stops to the bounding box, but has no stop times to shift its \
                 timetable by",
                line.line_id
            ),
        }
    }
    Ok(line)
}

fn stop_time(stop: &RawStop) -> Option<Time> {
    stop.departure.or(stop.arrival)
}
