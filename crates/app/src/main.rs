use std::{f32::consts::TAU, path::PathBuf, sync::Arc, time::Duration};

use backdrop_core::{
    BackdropConfig, BackgroundDriver, BackgroundVariant, CursorFollower, FileSource, HeadlessHost,
    Host, RecordingRenderer, StatCounter, Viewport,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

fn main() -> backdrop_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            variant,
            frames,
            fps,
            assets_dir,
            record,
        } => {
            let config = load_config(config.as_ref(), variant)?;
            run_headless(config, frames, fps, assets_dir, record)
        }
        Commands::Config { variant, output } => write_default_config(variant, output),
    }
}

fn load_config(
    path: Option<&PathBuf>,
    variant: Option<VariantArg>,
) -> backdrop_core::Result<BackdropConfig> {
    let mut config = match path {
        Some(path) => {
            tracing::info!(?path, "loading config");
            BackdropConfig::from_json_file(path)?
        }
        None => BackdropConfig::default(),
    };
    if let Some(variant) = variant {
        config.variant = variant.into();
    }
    config.validate()?;
    Ok(config)
}

fn run_headless(
    config: BackdropConfig,
    frames: u32,
    fps: u32,
    assets_dir: PathBuf,
    record: Option<PathBuf>,
) -> backdrop_core::Result<()> {
    let frame_time = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    tracing::info!(variant = ?config.variant, frames, fps, ?assets_dir, "starting headless run");

    let host = HeadlessHost::new(config.mount.container_id.clone())
        .with_viewport(Viewport::default())
        .with_document_height(6000.0);
    let mut driver = BackgroundDriver::new(
        config,
        host,
        RecordingRenderer::new(),
        Arc::new(FileSource::new(assets_dir)),
    );

    let state = driver.start();
    if !state.is_running() {
        tracing::warn!(?state, "backdrop did not start");
        return Ok(());
    }

    let viewport = driver.host().viewport();
    let mut cursor = CursorFollower::for_viewport(viewport.width);
    let mut counter = StatCounter::new(120);

    for frame in 0..frames {
        let t = frame as f32 / frames.max(1) as f32;
        // Scroll down the page and back up while the pointer circles the centre.
        let sweep = 1.0 - (2.0 * t - 1.0).abs();
        let pointer_x = viewport.width * (0.5 + 0.4 * (t * TAU * 2.0).cos());
        let pointer_y = viewport.height * (0.5 + 0.4 * (t * TAU * 2.0).sin());

        let host = driver.host_mut();
        host.scroll_to_fraction(sweep);
        host.move_pointer(pointer_x, pointer_y);
        let now = host.now();
        if let Some(cursor) = cursor.as_mut() {
            cursor.set_pointer(pointer_x, pointer_y, now);
            cursor.tick(now);
        }
        if sweep >= 0.5 {
            counter.trigger(now);
        }

        if !driver.pump(frame_time) {
            tracing::warn!(frame, "frame loop ended early");
            break;
        }
    }

    let stats = driver.stats();
    let view = driver.view().clone();
    tracing::info!(
        frames = stats.frames_rendered,
        errors = stats.render_errors,
        loaded = ?stats.loaded_assets,
        failed = ?stats.failed_assets,
        pending = stats.pending_assets,
        azimuth = view.azimuth.current,
        polar = view.polar.current,
        scroll = view.scroll.current,
        "run finished"
    );
    tracing::debug!(
        cursor = ?cursor.as_ref().map(CursorFollower::head),
        counter = counter.value_at(driver.host().now()),
        "interactions"
    );

    if let Some(path) = record {
        let json = serde_json::to_string_pretty(driver.renderer().frames())?;
        std::fs::write(&path, json)?;
        tracing::info!(?path, "frame log written");
    }

    driver.stop();
    Ok(())
}

fn write_default_config(
    variant: Option<VariantArg>,
    output: Option<PathBuf>,
) -> backdrop_core::Result<()> {
    let config = match variant.map(BackgroundVariant::from) {
        Some(BackgroundVariant::OrbitModel) => BackdropConfig::orbit_model(),
        _ => BackdropConfig::wave_field(),
    };
    let json = config.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            tracing::info!(?path, "default config written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Animated scroll-driven site backdrop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Wave,
    Orbit,
}

impl From<VariantArg> for BackgroundVariant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Wave => BackgroundVariant::WaveField,
            VariantArg::Orbit => BackgroundVariant::OrbitModel,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the backdrop headlessly with scripted scroll and pointer input.
    Run {
        /// JSON config file; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured variant.
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
        /// Number of frames to simulate.
        #[arg(short, long, default_value_t = 600)]
        frames: u32,
        /// Simulated display refresh rate.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Directory asset URLs are resolved against.
        #[arg(long, default_value = "assets")]
        assets_dir: PathBuf,
        /// Write a JSON summary of every rendered frame here.
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Print or write the default configuration as JSON.
    Config {
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
