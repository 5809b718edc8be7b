//! ortho-connect CLI
//!
//! Usage:
//!   ortho-connect [OPTIONS] [FILE]
//!
//! Options:
//!   -o, --overlay        Draw the occupancy overlay
//!   -c, --config <FILE>  Router configuration (TOML format)
//!       --compact        Write the SVG on a single line
//!   -h, --help           Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, error};

use ortho_connect::{render_scene, RenderConfig, RouterConfig, SvgConfig};

#[derive(Parser)]
#[command(name = "ortho-connect")]
#[command(about = "Route orthogonal connectors between boxes and render them as SVG")]
struct Cli {
    /// Scene file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Draw the occupancy overlay
    #[arg(short, long)]
    overlay: bool,

    /// Router configuration file; replaces the scene's [router] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable pretty printing
    #[arg(long)]
    compact: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.input.is_none() && io::stdin().is_terminal() {
        print_intro();
        return;
    }

    let router = match &cli.config {
        Some(path) => match load_router_config(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let source = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => buffer,
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let mut config = RenderConfig::new()
        .with_svg(SvgConfig::default().with_pretty_print(!cli.compact))
        .with_overlay(cli.overlay);
    if let Some(router) = router {
        debug!("router config override: {:?}", router);
        config = config.with_router(router);
    }

    match render_scene(&source, &config) {
        Ok(svg) => {
            println!("{}", svg);
        }
        Err(e) => {
            error!("render failed: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_router_config(path: &Path) -> Result<RouterConfig, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    toml::from_str(&content).map_err(|e| e.to_string())
}

fn print_intro() {
    println!(
        r#"ortho-connect - orthogonal connector routing

USAGE:
    ortho-connect [OPTIONS] [FILE]
    cat scene.toml | ortho-connect

OPTIONS:
    -o, --overlay      Draw the occupancy overlay
    -c, --config       Router configuration (TOML file)
    --compact          Write the SVG on a single line
    -h, --help         Print help

SCENE FORMAT:
    [[layer]]
    name = "a"
    x = 0
    y = 0
    width = 100
    height = 50

    [[connection]]
    from = "a"
    to = "b""#
    );
}
