use anyhow::Result;
use gtfs::{Feed, Line, LineID};
use rayon::prelude::*;

use crate::{
    build_raw_line, filter_line, register, LineError, MatchedLine, MatchingConfig, Registration,
    RoadIndex, RoadNetworkView,
};

/// What happened to every line of one run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub matched: usize,
    pub registered: usize,
    pub inserted: usize,
    pub replaced: usize,
    /// Lines with nothing left after clipping to the bounding box
    pub dropped: Vec<(LineID, LineError)>,
    pub failed: Vec<(LineID, LineError)>,
}

impl RunSummary {
    /// Every line ends up registered, dropped, or failed
    pub fn total(&self) -> usize {
        self.registered + self.dropped.len() + self.failed.len()
    }

    pub fn log(&self) {
        info!(
            "{} lines: {} registered ({} new, {} replaced), {} dropped, {} failed",
            self.total(),
            self.registered,
            self.inserted,
            self.replaced,
            self.dropped.len(),
            self.failed.len()
        );
        for (_, err) in &self.dropped {
            warn!("Dropped {err}");
        }
        for (_, err) in &self.failed {
            warn!("Failed {err}");
        }
    }
}

/// Matches every line in the feed against the road network, then registers the ones that worked.
/// Problems with individual lines end up in the summary; only bad configuration fails the run.
///
/// A line's longest trip is picked from the whole feed when it's loaded. Clipping to the bounding
/// box happens afterwards, so the line keeps that trip's stops inside the box, even if another
/// trip would have kept more of them.
pub fn run(
    view: &mut RoadNetworkView,
    feed: &Feed,
    config: &MatchingConfig,
) -> Result<RunSummary> {
    config.validate()?;

    let lines: Vec<&Line> = feed.lines.values().collect();
    info!(
        "Matching {} lines with {} stops",
        lines.len(),
        feed.stops.len()
    );
    // Lines come out in ID order, the same order they went in
    let results: Vec<(LineID, Result<MatchedLine, LineError>)> = {
        let index = RoadIndex::new(&view.roads, config);
        lines
            .par_iter()
            .map(|line| (line.line_id.clone(), match_one(&index, line, feed, config)))
            .collect()
    };

    let mut summary = RunSummary::default();
    for (id, result) in results {
        let matched = match result {
            Ok(matched) => matched,
            Err(err) if err.is_drop() => {
                summary.dropped.push((id, err));
                continue;
            }
            Err(err) => {
                summary.failed.push((id, err));
                continue;
            }
        };
        summary.matched += 1;
        match register(view, &matched, config) {
            Ok(reg) => {
                summary.registered += 1;
                match reg {
                    Registration::Inserted => summary.inserted += 1,
                    Registration::Replaced => summary.replaced += 1,
                }
            }
            Err(err) => summary.failed.push((id, err)),
        }
    }
    Ok(summary)
}

fn match_one(
    index: &RoadIndex,
    line: &Line,
    feed: &Feed,
    config: &MatchingConfig,
) -> Result<MatchedLine, LineError> {
    let mut raw = build_raw_line(line, &feed.stops)?;
    if let Some(ref bbox) = config.bbox {
        raw = filter_line(raw, bbox)?;
    }
    let matched = index.match_line(&raw, config)?;
    debug!("Matched {} with {} stops", line.describe(), matched.stops.len());
    Ok(matched)
}
