use std::collections::BTreeMap;
use std::io::Read;

use anyhow::Result;
use gtfs::{Feed, FeedSource, LineID, Projection};
use network::{run, LineError, MatchingConfig, RoadNetworkView, SectionID};
use serde_json::{json, Value};

// n0 --> n1 --> n2
//        |       |
//        v       v
//       (n1n0)   n3                 n4 (no sections)
const NETWORK: &str = r#"{
    "ROADS": {
        "NODES": {
            "n0": {"id": "n0", "position": [0.0, 0.0]},
            "n1": {"id": "n1", "position": [100.0, 0.0]},
            "n2": {"id": "n2", "position": [200.0, 0.0]},
            "n3": {"id": "n3", "position": [200.0, 100.0]},
            "n4": {"id": "n4", "position": [500.0, 500.0]}
        },
        "SECTIONS": {
            "n0n1": {"id": "n0n1", "upstream": "n0", "downstream": "n1"},
            "n1n0": {"id": "n1n0", "upstream": "n1", "downstream": "n0"},
            "n1n2": {"id": "n1n2", "upstream": "n1", "downstream": "n2"},
            "n2n3": {"id": "n2n3", "upstream": "n2", "downstream": "n3", "length": 100.0}
        },
        "STOPS": {},
        "ZONES": {"Z": {"id": "Z", "sections": ["n0n1"]}}
    },
    "LAYERS": [
        {"TYPE": "mnms.graph.layers.CarLayer", "ID": "CAR", "SECTIONS": ["n0n1", "n1n2"]}
    ]
}"#;

struct InMemory(BTreeMap<&'static str, String>);

impl FeedSource for InMemory {
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>> {
        Ok(self
            .0
            .get(name)
            .map(|contents| Box::new(contents.as_bytes()) as Box<dyn Read>))
    }
}

fn feed() -> Feed {
    let mut files = BTreeMap::new();
    // With the identity projection, lon is x and lat is y
    files.insert(
        "stops.txt",
        "stop_id,stop_name,stop_lat,stop_lon\n\
         A,Depot,0,0\n\
         B,Market,0.3,100.5\n\
         C,Hill,60,200\n\
         D,Airport,502,500\n\
         X,Nowhere,-900,-900\n",
    );
    files.insert(
        "routes.txt",
        "route_id,route_type,route_short_name\nT1,0,T1\nB2,3,2\nB9,3,9\n",
    );
    files.insert(
        "trips.txt",
        "route_id,service_id,trip_id\n\
         T1,wk,t1\nT1,wk,t2\nT1,wk,t3\nB2,wk,b1\nB9,wk,x1\n",
    );
    files.insert(
        "stop_times.txt",
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
         t2,08:00:00,08:00:00,A,1\n\
         t2,08:04:00,08:05:00,B,2\n\
         t2,08:09:00,08:10:00,C,3\n\
         t1,07:00:00,07:00:00,A,1\n\
         t1,07:04:00,07:05:00,B,2\n\
         t1,07:09:00,07:10:00,C,3\n\
         t3,09:00:00,09:00:00,C,1\n\
         t3,09:05:00,09:05:00,A,2\n\
         b1,25:10:00,25:10:00,C,1\n\
         b1,25:20:00,25:20:00,D,2\n\
         x1,06:00:00,06:00:00,A,1\n\
         x1,06:30:00,06:30:00,X,2\n",
    );
    let files = files.into_iter().map(|(k, v)| (k, v.to_string())).collect();
    Feed::load(&mut InMemory(files), &Projection::Identity).unwrap()
}

fn line<'a>(out: &'a Value, layer: &str, id: &str) -> &'a Value {
    out["LAYERS"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["ID"] == layer)
        .unwrap()["LINES"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["ID"] == id)
        .unwrap()
}

#[test]
fn feed_to_network() {
    let mut view = RoadNetworkView::from_json(NETWORK).unwrap();
    let summary = run(&mut view, &feed(), &MatchingConfig::default()).unwrap();
    summary.log();

    assert_eq!(summary.registered, 2);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, LineID::new("B9"));
    assert!(matches!(
        summary.failed[0].1,
        LineError::MapMatchFailure { .. }
    ));

    let out: Value = serde_json::from_str(&view.to_json().unwrap()).unwrap();

    // Untouched
    assert_eq!(
        out["LAYERS"][0],
        json!({"TYPE": "mnms.graph.layers.CarLayer", "ID": "CAR",
               "SECTIONS": ["n0n1", "n1n2"]})
    );
    assert_eq!(out["ROADS"]["ZONES"]["Z"]["sections"], json!(["n0n1"]));
    assert_eq!(out["ROADS"]["SECTIONS"]["n0n1"]["length"], json!(100.0));

    // Registered in line ID order, so the bus layer comes first
    assert_eq!(out["LAYERS"][1]["ID"], "BUSLayer");
    assert_eq!(out["LAYERS"][2]["ID"], "TRAMLayer");
    assert_eq!(
        out["LAYERS"][2]["TYPE"],
        "mnms.graph.layers.PublicTransportLayer"
    );
    assert_eq!(out["LAYERS"][2]["VEH_TYPE"], "mnms.vehicles.veh_type.Tram");

    let tram = line(&out, "TRAMLayer", "T1");
    assert_eq!(tram["STOPS"], json!(["A", "B", "C"]));
    assert_eq!(tram["SECTIONS"], json!([["n0n1"], ["n1n2", "n2n3"]]));
    assert_eq!(tram["TIMETABLE"], json!(["07:00:00", "08:00:00"]));

    let bus = line(&out, "BUSLayer", "B2");
    assert_eq!(bus["STOPS"], json!(["C", "D"]));
    assert_eq!(bus["SECTIONS"], json!([["n2n3", "PT_n3_n4"]]));
    assert_eq!(bus["TIMETABLE"], json!(["25:10:00"]));

    let stops = &out["ROADS"]["STOPS"];
    assert_eq!(
        stops["A"],
        json!({"id": "A", "section": "n0n1", "relative_position": 0.0,
               "absolute_position": [0.0, 0.0]})
    );
    assert_eq!(stops["C"]["section"], "n2n3");
    assert_eq!(stops["C"]["absolute_position"], json!([200.0, 60.0]));
    // n4 is only reachable through the made-up link
    assert_eq!(stops["D"]["section"], "PT_n3_n4");
    assert_eq!(stops["D"]["relative_position"], json!(1.0));

    let inferred = &view.roads.sections[&SectionID::new("PT_n3_n4")];
    assert_eq!(inferred.length, 500.0);
}

#[test]
fn running_twice_changes_nothing() {
    let feed = feed();
    let config = MatchingConfig::default();

    let mut view = RoadNetworkView::from_json(NETWORK).unwrap();
    run(&mut view, &feed, &config).unwrap();
    let once = view.to_json().unwrap();

    let summary = run(&mut view, &feed, &config).unwrap();
    assert_eq!(summary.replaced, 2);
    assert_eq!(summary.inserted, 0);
    assert_eq!(view.to_json().unwrap(), once);

    // Reading the output back and running again is just as stable
    let mut reloaded = RoadNetworkView::from_json(&once).unwrap();
    run(&mut reloaded, &feed, &config).unwrap();
    assert_eq!(reloaded.to_json().unwrap(), once);
}

#[test]
fn routing_only_leaves_out_disconnected_lines() {
    let mut view = RoadNetworkView::from_json(NETWORK).unwrap();
    let config: MatchingConfig =
        serde_json::from_str(r#"{"link_policy": "ShortestPath"}"#).unwrap();
    let summary = run(&mut view, &feed(), &config).unwrap();
    assert_eq!(summary.registered, 1);
    assert!(summary
        .failed
        .iter()
        .any(|(id, err)| id == &LineID::new("B2") && matches!(err, LineError::NoRoute { .. })));
    assert!(view.line(&LineID::new("B2")).is_none());
    assert!(!view.roads.sections.contains_key(&SectionID::new("PT_n3_n4")));
}

// a --ab--> b, plus nodes with no sections at all
fn small_network(extra_nodes: &[(&str, f64, f64)]) -> RoadNetworkView {
    let mut nodes = json!({
        "a": {"id": "a", "position": [0.0, 0.0]},
        "b": {"id": "b", "position": [100.0, 0.0]}
    });
    for (id, x, y) in extra_nodes {
        nodes[*id] = json!({"id": id, "position": [x, y]});
    }
    let network = json!({
        "ROADS": {
            "NODES": nodes,
            "SECTIONS": {"ab": {"id": "ab", "upstream": "a", "downstream": "b"}},
            "STOPS": {},
            "ZONES": {}
        },
        "LAYERS": []
    });
    RoadNetworkView::from_json(&network.to_string()).unwrap()
}

// Two bus lines, R1 and R2, each with one trip
fn two_lines(stops: &str, r1: [&str; 2], r2: [&str; 2]) -> Feed {
    let stop_times = format!(
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
         r1,07:00:00,07:00:00,{},1\nr1,07:10:00,07:10:00,{},2\n\
         r2,08:00:00,08:00:00,{},1\nr2,08:10:00,08:10:00,{},2\n",
        r1[0], r1[1], r2[0], r2[1]
    );
    let mut files = BTreeMap::new();
    files.insert("stops.txt", stops.to_string());
    files.insert("routes.txt", "route_id,route_type\nR1,3\nR2,3\n".to_string());
    files.insert(
        "trips.txt",
        "route_id,service_id,trip_id\nR1,wk,r1\nR2,wk,r2\n".to_string(),
    );
    files.insert("stop_times.txt", stop_times);
    Feed::load(&mut InMemory(files), &Projection::Identity).unwrap()
}

#[test]
fn shared_stop_stays_put_across_runs() {
    // x can only be reached through a made-up section leaving a, which A also sits on
    let mut view = small_network(&[("x", 0.0, 300.0)]);
    let feed = two_lines(
        "stop_id,stop_lat,stop_lon\nA,0,0\nB,0,100\nX,300,0\n",
        ["A", "B"],
        ["A", "X"],
    );
    let config = MatchingConfig::default();

    let summary = run(&mut view, &feed, &config).unwrap();
    assert_eq!(summary.registered, 2);
    let once = view.to_json().unwrap();
    run(&mut view, &feed, &config).unwrap();
    assert_eq!(view.to_json().unwrap(), once);

    let out: Value = serde_json::from_str(&once).unwrap();
    let r1 = line(&out, "BUSLayer", "R1");
    assert_eq!(r1["STOPS"], json!(["A", "B"]));
    assert_eq!(r1["SECTIONS"], json!([["ab"]]));
    let r2 = line(&out, "BUSLayer", "R2");
    assert_eq!(r2["STOPS"], json!(["A_1", "X"]));
    assert_eq!(r2["SECTIONS"], json!([["PT_a_x"]]));
    assert_eq!(out["ROADS"]["STOPS"]["A"]["section"], "ab");
    assert_eq!(out["ROADS"]["STOPS"]["A_1"]["section"], "PT_a_x");
}

#[test]
fn made_up_sections_dont_rescue_lines_later() {
    // R1 needs PT_a_c. S is right next to it, but nowhere near a real road.
    let mut view = small_network(&[("c", 0.0, 200.0)]);
    let feed = two_lines(
        "stop_id,stop_lat,stop_lon\nA,0,0\nB,0,100\nC,200,0\nS,100,5\n",
        ["A", "C"],
        ["B", "S"],
    );
    let config = MatchingConfig::default();

    let summary = run(&mut view, &feed, &config).unwrap();
    assert_eq!(summary.registered, 1);
    assert!(view.roads.sections.contains_key(&SectionID::new("PT_a_c")));
    let once = view.to_json().unwrap();

    let summary = run(&mut view, &feed, &config).unwrap();
    assert_eq!(summary.registered, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, LineID::new("R2"));
    assert!(matches!(
        summary.failed[0].1,
        LineError::MapMatchFailure { .. }
    ));
    assert!(view.line(&LineID::new("R2")).is_none());
    assert_eq!(view.to_json().unwrap(), once);
}
