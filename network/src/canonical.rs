use gtfs::Trip;

/// Picks the trip that visits the most stops. Among several equally long trips, the first one in
/// the feed's order wins, so the result never depends on anything but the input.
///
/// Feeds list partial runs and both directions as separate trips of the same line, and the
/// longest one usually covers the line's full extent. This is only a heuristic: a branching line
/// collapses onto whichever branch is longest.
pub fn select_canonical(trips: &[Trip]) -> Option<&Trip> {
    let mut best: Option<&Trip> = None;
    for trip in trips {
        match best {
            Some(b) if b.stop_times.len() >= trip.stop_times.len() => {}
            _ => best = Some(trip),
        }
    }
    best
}
