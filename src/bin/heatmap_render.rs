use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use taxi_heatmap::{HeatmapConfig, HeatmapView, HttpHeatmapSource, Metric, RasterSurface};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fetch an aggregated taxi heatmap and render it to a PNG.
#[derive(Parser, Debug)]
#[command(name = "heatmap-render")]
struct Args {
    /// Metric to color by: altitude, speed, azimuth or none
    #[arg(long)]
    metric: Option<Metric>,

    /// H3 resolution (0-15)
    #[arg(long)]
    resolution: Option<u8>,

    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    lng: Option<f64>,

    #[arg(long)]
    zoom: Option<f64>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Base URL of the aggregation service
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long, short, default_value = "heatmap.png")]
    output: PathBuf,

    /// Paint the marker layer over the heat blobs
    #[arg(long)]
    markers: bool,

    /// Print the popup for this cell id
    #[arg(long)]
    select: Option<String>,
}

impl Args {
    fn apply(&self, mut config: HeatmapConfig) -> HeatmapConfig {
        if let Some(metric) = self.metric {
            config.metric = metric;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(lat) = self.lat {
            config.center.0 = lat;
        }
        if let Some(lng) = self.lng {
            config.center.1 = lng;
        }
        if let Some(zoom) = self.zoom {
            config.zoom = zoom;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taxi_heatmap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.apply(HeatmapConfig::from_env().context("Failed to load configuration")?);

    if let Err(err) = config.validate() {
        eprintln!("{err}");
        std::process::exit(2);
    }

    let source = HttpHeatmapSource::new(config.api_base_url.clone());
    let surface = RasterSurface::new(config.width, config.height);
    let mut view = HeatmapView::mount(&config, source, surface).context("Failed to mount heatmap")?;
    tracing::info!(
        metric = %config.metric,
        resolution = config.resolution,
        url = %config.api_base_url,
        "heatmap mounted"
    );

    view.settle().await;

    if let Some(message) = view.error_banner() {
        eprintln!("Error: {message}");
    }
    if let Some(caption) = view.caption() {
        println!("{caption}");
    }

    if args.markers {
        view.paint_markers();
    }
    if let Some(cell_id) = &args.select {
        match view.select(cell_id) {
            Some(popup) => println!("{popup}"),
            None => eprintln!("No cell with id {cell_id} in the snapshot"),
        }
    }

    if let Some(surface) = view.overlay().surface() {
        surface
            .save(&args.output)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
        println!("Wrote {}", args.output.display());
    }

    view.unmount();
    Ok(())
}
