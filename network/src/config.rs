use anyhow::Result;
use gtfs::Mode;
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, SectionID};

/// Everything tunable about one matching run. Nothing here is global, so runs with different
/// settings can happen side by side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// A stop this close to a road node (in meters) is matched to the node itself.
    pub node_snap_threshold: f64,
    /// A stop farther than this from every node and section can't be matched.
    pub max_match_radius: f64,
    /// Prepended to the IDs of sections this tool makes up.
    pub id_prefix: String,
    pub link_policy: LinkPolicy,
    /// If present, only stops inside are kept.
    pub bbox: Option<BoundingBox>,
    pub bus: LayerConfig,
    pub tram: LayerConfig,
    pub metro: LayerConfig,
}

/// How to connect two consecutive stops that aren't on the same road element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkPolicy {
    /// Follow the road network. Lines with disconnected stops fail.
    ShortestPath,
    /// Follow the road network, falling back to a straight inferred section.
    ShortestPathOrInferred,
    /// Always bridge with one straight inferred section.
    Inferred,
}

/// Where lines of one mode get registered
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub layer_id: String,
    pub veh_type: String,
    /// In m/s
    pub default_speed: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            node_snap_threshold: 5.0,
            max_match_radius: 50.0,
            id_prefix: "PT_".to_string(),
            link_policy: LinkPolicy::ShortestPathOrInferred,
            bbox: None,
            bus: LayerConfig::new("BUSLayer", "mnms.vehicles.veh_type.Bus", 13.8),
            tram: LayerConfig::new("TRAMLayer", "mnms.vehicles.veh_type.Tram", 15.0),
            metro: LayerConfig::new("METROLayer", "mnms.vehicles.veh_type.Metro", 20.0),
        }
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.node_snap_threshold >= 0.0) {
            bail!(
                "node_snap_threshold must be non-negative, not {}",
                self.node_snap_threshold
            );
        }
        if !(self.max_match_radius >= self.node_snap_threshold) {
            bail!(
                "max_match_radius {} must be at least node_snap_threshold {}",
                self.max_match_radius,
                self.node_snap_threshold
            );
        }
        if self.id_prefix.is_empty() {
            bail!("id_prefix can't be empty; made-up sections need to stand out");
        }
        for layer in [&self.bus, &self.tram, &self.metro] {
            if layer.layer_id.is_empty() {
                bail!("A layer_id is empty");
            }
        }
        Ok(())
    }

    /// True for sections this tool made up to connect stops
    pub fn is_synthesized(&self, id: &SectionID) -> bool {
        id.as_str().starts_with(&self.id_prefix)
    }

    pub fn layer(&self, mode: Mode) -> &LayerConfig {
        match mode {
            Mode::Bus => &self.bus,
            Mode::Tram => &self.tram,
            Mode::Metro => &self.metro,
        }
    }
}

impl LayerConfig {
    pub fn new(layer_id: &str, veh_type: &str, default_speed: f64) -> Self {
        Self {
            layer_id: layer_id.to_string(),
            veh_type: veh_type.to_string(),
            default_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MatchingConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: MatchingConfig =
            serde_json::from_str(r#"{"node_snap_threshold": 1.0, "link_policy": "Inferred"}"#)
                .unwrap();
        assert_eq!(cfg.node_snap_threshold, 1.0);
        assert_eq!(cfg.max_match_radius, 50.0);
        assert_eq!(cfg.link_policy, LinkPolicy::Inferred);
        assert_eq!(cfg.layer(Mode::Tram).layer_id, "TRAMLayer");
    }

    #[test]
    fn bad_thresholds_rejected() {
        let mut cfg = MatchingConfig::default();
        cfg.node_snap_threshold = 100.0;
        assert!(cfg.validate().is_err());

        let mut cfg = MatchingConfig::default();
        cfg.node_snap_threshold = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = MatchingConfig::default();
        cfg.id_prefix.clear();
        assert!(cfg.validate().is_err());
    }
}
