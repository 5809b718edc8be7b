//! TOML scene descriptions
//!
//! A scene lists layer rectangles and the connections between them, plus an
//! optional `[router]` table overriding [`RouterConfig`] defaults:
//!
//! ```toml
//! [router]
//! grid_scale = 5
//!
//! [[layer]]
//! name = "client"
//! x = 0
//! y = 0
//! width = 100
//! height = 50
//!
//! [[connection]]
//! from = "client"
//! to = "server"
//! ```

use std::collections::HashSet;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::routing::{BoundingBox, Instance, RouterConfig, RoutingError};

/// Errors that can occur when loading or building a scene
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Failed to read scene file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse scene TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Routing failed: {0}")]
    Routing(#[from] RoutingError),
    #[error("Connection {index} refers to unknown layer '{name}'")]
    UnknownLayer { index: usize, name: String },
    #[error("Layer '{0}' is declared twice")]
    DuplicateLayer(String),
}

/// A rectangle placed in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLayer {
    pub name: String,
    pub bounds: BoundingBox,
}

/// A connection between two named layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneConnection {
    pub from: String,
    pub to: String,
}

/// A parsed scene, ready to be turned into an [`Instance`]
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Router settings from the `[router]` table, defaults otherwise
    pub router: RouterConfig,
    pub layers: Vec<SceneLayer>,
    pub connections: Vec<SceneConnection>,
}

/// TOML structure for deserializing scenes
#[derive(Deserialize)]
struct TomlScene {
    router: Option<RouterConfig>,
    #[serde(default, rename = "layer")]
    layers: Vec<TomlLayer>,
    #[serde(default, rename = "connection")]
    connections: Vec<TomlConnection>,
}

#[derive(Deserialize)]
struct TomlLayer {
    name: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct TomlConnection {
    from: String,
    to: String,
}

impl Scene {
    /// Load a scene from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a scene from a TOML string
    ///
    /// Layer names must be unique and every connection must name declared
    /// layers; both are checked here so that routing never sees a dangling
    /// reference.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, SceneError> {
        let parsed: TomlScene = toml::from_str(content)?;

        let mut names = HashSet::new();
        let layers = parsed
            .layers
            .into_iter()
            .map(|l| {
                if !names.insert(l.name.clone()) {
                    return Err(SceneError::DuplicateLayer(l.name));
                }
                Ok(SceneLayer {
                    name: l.name,
                    bounds: BoundingBox::new(l.x, l.y, l.width, l.height),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let connections = parsed
            .connections
            .into_iter()
            .enumerate()
            .map(|(index, c)| {
                for name in [&c.from, &c.to] {
                    if !names.contains(name) {
                        return Err(SceneError::UnknownLayer {
                            index,
                            name: name.clone(),
                        });
                    }
                }
                Ok(SceneConnection {
                    from: c.from,
                    to: c.to,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            router: parsed.router.unwrap_or_default(),
            layers,
            connections,
        })
    }

    /// Build and route an instance with the scene's own router settings
    pub fn build_instance(&self) -> Result<Instance, SceneError> {
        self.build_instance_with(self.router.clone())
    }

    /// Build and route an instance with explicit router settings
    ///
    /// Layers are created first so every connection is routed against the
    /// complete obstacle set.
    pub fn build_instance_with(&self, config: RouterConfig) -> Result<Instance, SceneError> {
        let mut instance = Instance::new(config)?;
        for layer in &self.layers {
            instance.create_layer(layer.name.clone(), layer.bounds)?;
        }
        for connection in &self.connections {
            instance.connect_names(&connection.from, &connection.to)?;
        }
        debug!(
            "scene built: {} layers, {} connections",
            self.layers.len(),
            self.connections.len()
        );
        Ok(instance)
    }
}
