//! ortho-connect - orthogonal connector routing for box-and-line diagrams
//!
//! The library routes axis-aligned connectors between rectangular layers,
//! keeps the routed polylines consistent while they are dragged, and writes
//! the resulting geometry as SVG.
//!
//! # Example
//!
//! ```rust
//! use ortho_connect::render;
//!
//! let svg = render(r#"
//!     [[layer]]
//!     name = "a"
//!     x = 0
//!     y = 0
//!     width = 100
//!     height = 50
//!
//!     [[layer]]
//!     name = "b"
//!     x = 0
//!     y = 200
//!     width = 100
//!     height = 50
//!
//!     [[connection]]
//!     from = "a"
//!     to = "b"
//! "#).unwrap();
//!
//! assert!(svg.contains("<svg"));
//! assert!(svg.contains("connection"));
//! ```

pub mod renderer;
pub mod routing;
pub mod scene;

pub use renderer::{render_svg, SvgConfig};
pub use routing::{Instance, RouterConfig, RoutingError};
pub use scene::{Scene, SceneError};

use thiserror::Error;

/// Errors that can occur during the render pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// Error while loading the scene or building its instance
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    /// Error from the routing core
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),
}

/// Configuration for the complete render pipeline
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Router settings; overrides the scene's `[router]` table when set
    pub router: Option<RouterConfig>,
    /// SVG output configuration
    pub svg: SvgConfig,
    /// Draw the occupancy overlay
    pub overlay: bool,
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_router(mut self, config: RouterConfig) -> Self {
        self.router = Some(config);
        self
    }

    pub fn with_svg(mut self, config: SvgConfig) -> Self {
        self.svg = config;
        self
    }

    pub fn with_overlay(mut self, overlay: bool) -> Self {
        self.overlay = overlay;
        self
    }
}

/// Route a TOML scene and render it to SVG with default configuration
pub fn render(source: &str) -> Result<String, RenderError> {
    render_scene(source, &RenderConfig::default())
}

/// Route a TOML scene and render it to SVG
///
/// # Example
///
/// ```rust
/// use ortho_connect::{render_scene, RenderConfig, RouterConfig, SvgConfig};
///
/// let config = RenderConfig::new()
///     .with_router(RouterConfig::default().with_grid_scale(10.0))
///     .with_svg(SvgConfig::default().with_pretty_print(false));
///
/// let svg = render_scene("[[layer]]\nname = \"a\"\nx = 0\ny = 0\nwidth = 10\nheight = 10\n", &config).unwrap();
/// assert!(!svg.contains('\n'));
/// ```
pub fn render_scene(source: &str, config: &RenderConfig) -> Result<String, RenderError> {
    let scene = Scene::from_str(source)?;
    let router = config.router.clone().unwrap_or_else(|| scene.router.clone());
    let mut instance = scene.build_instance_with(router)?;

    if config.overlay {
        instance.toggle_occupancy_overlay();
    }

    Ok(render_svg(&instance, &config.svg))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACKED: &str = r#"
[[layer]]
name = "a"
x = 0
y = 0
width = 100
height = 50

[[layer]]
name = "b"
x = 0
y = 200
width = 100
height = 50

[[connection]]
from = "a"
to = "b"
"#;

    #[test]
    fn test_render_stacked_layers() {
        let svg = render(STACKED).unwrap();
        assert!(svg.contains(r#"id="a""#));
        assert!(svg.contains(r#"id="b""#));
        assert!(svg.contains(r#"d="M50 0 L50 250""#));
    }

    #[test]
    fn test_render_with_overlay() {
        let svg = render_scene(STACKED, &RenderConfig::new().with_overlay(true)).unwrap();
        assert!(svg.contains("oc-overlay"));
        assert!(svg.contains("oc-blocked"));
    }

    #[test]
    fn test_router_override_wins() {
        let source = format!("[router]\nmax_iterations = 0\n{STACKED}");
        assert!(matches!(
            render(&source),
            Err(RenderError::Scene(SceneError::Routing(_)))
        ));

        let config = RenderConfig::new().with_router(RouterConfig::default());
        assert!(render_scene(&source, &config).is_ok());
    }

    #[test]
    fn test_render_parse_error() {
        let result = render("[[layer]]\nname = 3");
        assert!(matches!(
            result,
            Err(RenderError::Scene(SceneError::ParseError(_)))
        ));
    }
}
