#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use structopt::StructOpt;

use gtfs::{DirSource, Feed, Projection, ZipSource};
use network::{BoundingBox, MatchingConfig, RoadNetworkView};

/// Adds the lines of a GTFS feed to a road network as public transport layers.
#[derive(StructOpt)]
#[structopt(name = "ptmatch")]
struct Args {
    /// The road network JSON file to start from
    #[structopt(long)]
    network: PathBuf,
    /// A GTFS directory or .zip
    #[structopt(long)]
    gtfs: PathBuf,
    /// Where to write the road network with lines added
    #[structopt(long)]
    output: PathBuf,
    /// A JSON file with matching settings. Anything missing uses the defaults, and the flags
    /// below override it.
    #[structopt(long)]
    config: Option<PathBuf>,
    /// Only keep stops inside "min_x,min_y,max_x,max_y"
    #[structopt(long)]
    bbox: Option<BoundingBox>,
    /// Stops this close to a road node (in meters) are matched to the node
    #[structopt(long)]
    node_threshold: Option<f64>,
    /// Stops farther than this from every road element fail to match
    #[structopt(long)]
    max_radius: Option<f64>,
    /// Prefix for the IDs of sections made up to connect stops
    #[structopt(long)]
    prefix: Option<String>,
    /// Project stop coordinates from WGS84 into this UTM zone. Without this, stop_lon and stop_lat
    /// are used as x and y directly.
    #[structopt(long)]
    utm_zone: Option<u8>,
    /// The UTM zone is in the southern hemisphere
    #[structopt(long)]
    south: bool,
    /// Log details about every line
    #[structopt(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> Result<MatchingConfig> {
        let mut config = match self.config {
            Some(ref path) => {
                let raw = fs_err::read_to_string(path)?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => MatchingConfig::default(),
        };
        if let Some(bbox) = self.bbox {
            config.bbox = Some(bbox);
        }
        if let Some(x) = self.node_threshold {
            config.node_snap_threshold = x;
        }
        if let Some(x) = self.max_radius {
            config.max_match_radius = x;
        }
        if let Some(ref prefix) = self.prefix {
            config.id_prefix = prefix.clone();
        }
        Ok(config)
    }

    fn projection(&self) -> Result<Projection> {
        match self.utm_zone {
            Some(zone) => Projection::utm(zone, !self.south),
            None => {
                if self.south {
                    bail!("--south only makes sense with --utm-zone");
                }
                Ok(Projection::Identity)
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::from_args();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let config = args.config()?;
    let projection = args.projection()?;

    let mut view = RoadNetworkView::from_json(&fs_err::read_to_string(&args.network)?)
        .with_context(|| format!("loading {}", args.network.display()))?;
    let feed = load_feed(&args.gtfs, &projection)?;

    let summary = network::run(&mut view, &feed, &config)?;
    summary.log();

    fs_err::write(&args.output, view.to_json()?)?;
    info!("Wrote {}", args.output.display());
    Ok(())
}

fn load_feed(path: &Path, projection: &Projection) -> Result<Feed> {
    let feed = if path.is_dir() {
        Feed::load(&mut DirSource::new(path), projection)
    } else {
        Feed::load(&mut ZipSource::open_path(path)?, projection)
    }
    .with_context(|| format!("loading GTFS from {}", path.display()))?;
    info!(
        "Loaded {} stops and {} lines from {}",
        feed.stops.len(),
        feed.lines.len(),
        path.display()
    );
    Ok(feed)
}
