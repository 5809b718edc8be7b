//! Orthogonal connector routing
//!
//! This module contains the routing core:
//! - `grid`: occupancy grid rebuilt from layer rectangles
//! - `anchor`: boundary anchors where connections leave their layers
//! - `pathfinder`: turn-penalized search for few-corner routes
//! - `connection`: the live polyline and its drag/collapse engine
//! - `instance`: the workspace tying layers, grid and connections together
//! - `drag`: pointer drag sessions

pub mod anchor;
pub mod config;
pub mod connection;
pub mod drag;
pub mod error;
pub mod grid;
pub mod instance;
pub mod pathfinder;
pub mod types;

pub use anchor::{boundary_intersections, closest_point_to, resolve_anchors, Anchor, LinearFunction};
pub use config::RouterConfig;
pub use connection::{
    Collapse, Connection, DragReport, End, Endpoint, Line, LineId, PathPoint, PointId,
};
pub use drag::{DragOutcome, DragSession, DragTarget};
pub use error::{ErrorKind, RoutingError};
pub use grid::{rebuild_grid, Grid, GridCell};
pub use instance::{ConnectionHandle, Instance, LineRef, LineView, Notification};
pub use pathfinder::{compress_path, find_path};
pub use types::{BoundingBox, ConnectionId, Direction, Layer, LayerId, Orientation, Point};
