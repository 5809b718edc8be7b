//! Configuration for the routing core

use serde::Deserialize;

/// Configuration options shared by the grid, pathfinder and update engine
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Size of one grid cell
    pub grid_scale: f64,

    /// Free space kept around every layer inside the workspace
    pub instance_padding: f64,

    /// Width of the endpoint glyph; its height is derived from it
    pub endpoint_size: f64,

    /// Margin from the corner when an endpoint flips to a neighbouring side
    pub endpoint_inset: f64,

    /// Minimum drag distance before a pinned line end grows a new corner
    pub create_line_size: f64,

    /// Lines shorter than this are merged away
    pub collapse_threshold: f64,

    /// Hard cap on pathfinder iterations
    pub max_iterations: usize,

    /// Build an occupancy grid so paths avoid layers
    pub use_overlap_detection: bool,

    /// Step used by keyboard panning
    pub move_step: f64,

    /// Initial workspace size (width, height)
    pub viewport: (f64, f64),
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            grid_scale: 5.0,
            instance_padding: 200.0,
            endpoint_size: 30.0,
            endpoint_inset: 5.0,
            create_line_size: 10.0,
            collapse_threshold: 3.0,
            max_iterations: 10_000,
            use_overlap_detection: true,
            move_step: 50.0,
            viewport: (1000.0, 800.0),
        }
    }
}

impl RouterConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance between an endpoint and the grid cell its path starts from
    pub fn endpoint_height(&self) -> f64 {
        self.endpoint_size * 1.5
    }

    /// Set the grid cell size
    pub fn with_grid_scale(mut self, scale: f64) -> Self {
        self.grid_scale = scale;
        self
    }

    /// Set the padding kept around layers
    pub fn with_instance_padding(mut self, padding: f64) -> Self {
        self.instance_padding = padding;
        self
    }

    /// Set the endpoint glyph width
    pub fn with_endpoint_size(mut self, size: f64) -> Self {
        self.endpoint_size = size;
        self
    }

    /// Set the pathfinder iteration cap
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable or disable the occupancy grid
    pub fn with_overlap_detection(mut self, enabled: bool) -> Self {
        self.use_overlap_detection = enabled;
        self
    }

    /// Set the initial workspace size
    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Set the collapse threshold for short lines
    pub fn with_collapse_threshold(mut self, threshold: f64) -> Self {
        self.collapse_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();
        assert_eq!(config.grid_scale, 5.0);
        assert_eq!(config.instance_padding, 200.0);
        assert_eq!(config.endpoint_height(), 45.0);
        assert_eq!(config.max_iterations, 10_000);
        assert!(config.use_overlap_detection);
    }

    #[test]
    fn test_builder_pattern() {
        let config = RouterConfig::new()
            .with_grid_scale(10.0)
            .with_instance_padding(50.0)
            .with_endpoint_size(20.0)
            .with_max_iterations(100)
            .with_overlap_detection(false)
            .with_viewport(300.0, 200.0);

        assert_eq!(config.grid_scale, 10.0);
        assert_eq!(config.instance_padding, 50.0);
        assert_eq!(config.endpoint_height(), 30.0);
        assert_eq!(config.max_iterations, 100);
        assert!(!config.use_overlap_detection);
        assert_eq!(config.viewport, (300.0, 200.0));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RouterConfig = toml::from_str("grid_scale = 10.0\nmax_iterations = 50").unwrap();
        assert_eq!(config.grid_scale, 10.0);
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.instance_padding, 200.0);
    }
}
