//! Trackball Terminal - interactive mesh viewer
//!
//! Controls:
//!   - Left mouse drag: rotate
//!   - s/b/f/l/i/k/p: depth sort, back/front culling, lighting, fill, stroke, perspective
//!   - [ / ]: perspective distance, + / -: zoom
//!   - Tab: next mesh, r: reset, d: debug log
//!   - Q/ESC: quit

use clap::Parser;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use trackball_core::driver::DEFAULT_TICK_RATE;
use trackball_core::Controls;
use trackball_terminal::TerminalApp;

#[derive(Debug, Parser)]
#[command(name = "trackball-terminal", about = "Arcball mesh viewer for the terminal")]
struct Args {
    /// Mesh files (.json or .stl); Tab cycles through them. Defaults to a cube.
    meshes: Vec<PathBuf>,

    /// JSON file with initial control settings
    #[arg(long)]
    controls: Option<PathBuf>,

    /// Render ticks per second
    #[arg(long, default_value_t = DEFAULT_TICK_RATE)]
    fps: u32,

    /// Trackball radius in terminal rows (default: fit the terminal)
    #[arg(long)]
    radius: Option<f32>,

    /// Write logs here; the terminal itself is used for drawing
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(path: &Path) -> io::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackball_core=debug,trackball_terminal=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn load_controls(path: &Path) -> io::Result<Controls> {
    let text = std::fs::read_to_string(path)?;
    Controls::from_json(&text).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid controls in {}: {}", path.display(), e),
        )
    })
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        init_tracing(path)?;
    }

    let controls = match &args.controls {
        Some(path) => load_controls(path)?,
        None => Controls::default(),
    };

    tracing::info!("Starting trackball viewer with {} mesh(es)", args.meshes.len());

    let mut app = TerminalApp::new(args.meshes, controls, args.fps, args.radius)?;
    app.run()?;

    tracing::info!("Viewer closed");
    Ok(())
}
