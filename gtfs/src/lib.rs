#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod geometry;
mod ids;
mod projection;
mod routes;
mod source;
mod stop_times;
mod stops;
mod time;
mod trips;

use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use geometry::Pt2D;
pub use ids::{LineID, StopID, TripID};
pub use projection::Projection;
pub use routes::{Line, Mode};
pub use source::{DirSource, FeedSource, ZipSource};
pub use stop_times::StopTime;
pub use stops::Stop;
pub use time::Time;
pub use trips::Trip;

/// The stops and trips of one public transport feed, with stop positions already projected into
/// the road network's coordinate system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub stops: BTreeMap<StopID, Stop>,
    pub lines: BTreeMap<LineID, Line>,
}

impl Feed {
    pub fn load<S: FeedSource + ?Sized>(source: &mut S, projection: &Projection) -> Result<Self> {
        let stops = stops::load(required(source, "stops.txt")?, projection)
            .context("stops.txt")?;
        let mut lines = match source.open("routes.txt")? {
            Some(reader) => routes::load(reader).context("routes.txt")?,
            None => BTreeMap::new(),
        };
        let trips = trips::load(required(source, "trips.txt")?).context("trips.txt")?;
        let mut stop_times =
            stop_times::load(required(source, "stop_times.txt")?).context("stop_times.txt")?;

        let mut used_lines: BTreeMap<LineID, Line> = BTreeMap::new();
        for mut trip in trips {
            trip.stop_times = match stop_times.remove(&trip.id) {
                Some(list) => list,
                None => {
                    warn!("Trip {} has no stop times", trip.id);
                    Vec::new()
                }
            };
            let line_id = trip.line_id.clone();
            used_lines
                .entry(line_id.clone())
                .or_insert_with(|| {
                    // No routes.txt entry; assume a bus
                    lines
                        .remove(&line_id)
                        .unwrap_or_else(|| Line::new(line_id.clone(), Mode::Bus))
                })
                .trips
                .push(trip);
        }

        if !lines.is_empty() {
            debug!("{} lines have no trips and are skipped", lines.len());
        }
        if !stop_times.is_empty() {
            warn!(
                "Stop times defined for unknown trips: {:?}",
                stop_times.keys()
            );
        }

        info!(
            "Loaded a feed with {} stops and {} lines",
            stops.len(),
            used_lines.len()
        );
        Ok(Self {
            stops,
            lines: used_lines,
        })
    }
}

// Adds the filename in the error message
fn required<'a, S: FeedSource + ?Sized>(
    source: &'a mut S,
    name: &str,
) -> Result<Box<dyn Read + 'a>> {
    match source.open(name)? {
        Some(reader) => Ok(reader),
        None => bail!("The feed is missing {name}"),
    }
}
