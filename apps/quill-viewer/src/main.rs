//! Quill demo viewer
//!
//! Opens a window and runs the acquire / record / submit / present loop with
//! clear-only frames. The clear color cycles over time.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p quill-viewer -- [CONFIG.toml]
//! ```
//!
//! ## Keys
//!
//! - `P`: cycle present mode
//! - `M`: cycle MSAA sample count (1, 2, 4, 8)
//! - `Escape`: quit
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use quill_gpu::RendererConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::Viewer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "Loading renderer config");
            RendererConfig::load(&path)?
        }
        None => RendererConfig::new("quill-viewer"),
    };

    info!("{} starting...", config.app_name);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config, WIDTH, HEIGHT);
    if let Err(e) = event_loop.run_app(&mut viewer) {
        error!("Event loop error: {e}");
    }

    Ok(())
}
