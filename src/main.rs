use std::path::PathBuf;

use winit::event_loop::{ControlFlow, EventLoop};

use neural_cells::app::App;
use neural_cells::config::{EngineConfig, DEFAULT_SEED, GRID_HEIGHT, GRID_WIDTH};
use neural_cells::{ModelAsset, Topology};

/// Model names of the built-in demo asset
const DEMO_MODELS: [&str; 4] = ["amber", "moss", "tide", "ember"];

struct Args {
    asset: Option<PathBuf>,
    width: u32,
    height: u32,
}

/// `neural-cells [asset.json] [width height]`
fn parse_args() -> Result<Args, String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let asset = match args.first() {
        Some(first) if first.parse::<u32>().is_err() => Some(PathBuf::from(args.remove(0))),
        _ => None,
    };

    let (width, height) = match args.as_slice() {
        [] => (GRID_WIDTH, GRID_HEIGHT),
        [w, h] => (
            w.parse().map_err(|_| format!("invalid width: {}", w))?,
            h.parse().map_err(|_| format!("invalid height: {}", h))?,
        ),
        _ => return Err("usage: neural-cells [asset.json] [width height]".into()),
    };

    Ok(Args {
        asset,
        width,
        height,
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    let asset = match &args.asset {
        Some(path) => {
            log::info!("Loading model asset {}", path.display());
            ModelAsset::from_slice(&std::fs::read(path)?)?
        }
        None => {
            log::info!("No asset given, using randomly initialized demo models");
            ModelAsset::random(&DEMO_MODELS, 12, 64, Topology::Square, DEFAULT_SEED)
        }
    };

    let config = EngineConfig::with_size(args.width, args.height);
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(asset, config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
