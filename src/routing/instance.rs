//! The routing workspace
//!
//! An [`Instance`] owns the layers, the occupancy grid and every connection
//! in one coordinate space. All geometry changes go through it so the grid,
//! the workspace bounds and the attached connections stay in step.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};

use super::anchor::{connection_point, resolve_anchors};
use super::config::RouterConfig;
use super::connection::{Connection, DragReport, End, EndLayers, Endpoint, LineId};
use super::error::RoutingError;
use super::grid::{rebuild_grid_in, Grid, GridCell};
use super::pathfinder::find_path;
use super::types::{
    ceil_to_scale, direction_between, floor_to_scale, BoundingBox, ConnectionId, Direction, Layer,
    LayerId, Orientation, Point,
};

/// Handle returned by [`Instance::connect`]
pub type ConnectionHandle = ConnectionId;

/// A line of a specific connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRef {
    pub connection: ConnectionId,
    pub line: LineId,
}

/// Change notifications queued for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    LayerChanged(LayerId),
    ConnectionChanged(ConnectionId),
    GridChanged,
    OverlayToggled(bool),
}

/// A line as handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineView {
    pub id: LineId,
    pub start: Point,
    pub end: Point,
    pub orientation: Orientation,
    pub direction: Option<Direction>,
}

/// Root container for layers, connections and the occupancy grid
#[derive(Debug, Clone)]
pub struct Instance {
    config: RouterConfig,
    bounds: BoundingBox,
    layers: BTreeMap<LayerId, Layer>,
    layer_names: HashMap<String, LayerId>,
    connections: BTreeMap<ConnectionId, Connection>,
    grid: Grid,
    overlay_visible: bool,
    view_offset: Point,
    notifications: Vec<Notification>,
    next_layer: usize,
    next_connection: usize,
}

impl Instance {
    /// Create an empty workspace the size of the configured viewport
    pub fn new(config: RouterConfig) -> Result<Self, RoutingError> {
        if config.max_iterations == 0 {
            return Err(RoutingError::configuration("max_iterations must be at least 1"));
        }
        if config.endpoint_size < 0.0 || config.collapse_threshold < 0.0 {
            return Err(RoutingError::configuration(
                "endpoint_size and collapse_threshold must not be negative",
            ));
        }
        let (width, height) = config.viewport;
        let bounds = BoundingBox::new(0.0, 0.0, width, height);
        let grid = Grid::new(bounds, config.grid_scale)?;
        Ok(Self {
            config,
            bounds,
            layers: BTreeMap::new(),
            layer_names: HashMap::new(),
            connections: BTreeMap::new(),
            grid,
            overlay_visible: false,
            view_offset: Point::default(),
            notifications: Vec::new(),
            next_layer: 0,
            next_connection: 0,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// The workspace area covered by the grid
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn view_offset(&self) -> Point {
        self.view_offset
    }

    // --- layers ---

    /// Add a layer; names are unique within the instance
    pub fn create_layer(
        &mut self,
        name: impl Into<String>,
        bounds: BoundingBox,
    ) -> Result<LayerId, RoutingError> {
        let name = name.into();
        if self.layer_names.contains_key(&name) {
            warn!("layer '{}' already exists", name);
            return Err(RoutingError::configuration(format!(
                "layer '{name}' already exists"
            )));
        }
        check_bounds(&name, &bounds)?;

        let id = LayerId(self.next_layer);
        self.layers.insert(id, Layer::new(name.clone(), bounds));
        self.layer_names.insert(name.clone(), id);

        let previous = self.bounds;
        self.grow_bounds(bounds);
        if let Err(err) = self.refresh_grid() {
            self.layers.remove(&id);
            self.layer_names.remove(&name);
            self.bounds = previous;
            return Err(err);
        }
        self.next_layer += 1;
        self.notify(Notification::LayerChanged(id));
        Ok(id)
    }

    /// Remove a layer; its connections stay but become unrouted
    pub fn remove_layer(&mut self, id: LayerId) -> Result<(), RoutingError> {
        let layer = self
            .layers
            .remove(&id)
            .ok_or_else(|| unknown_layer(id))?;
        self.layer_names.remove(layer.name());
        self.notify(Notification::LayerChanged(id));

        let attached = self.attached_to(id);
        for connection in &attached {
            if let Some(c) = self.connections.get_mut(connection) {
                c.clear();
            }
            self.notify(Notification::ConnectionChanged(*connection));
        }
        debug!(
            "removed layer '{}', {} connections unrouted",
            layer.name(),
            attached.len()
        );
        self.refresh_grid()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn layer_id(&self, name: &str) -> Option<LayerId> {
        self.layer_names.get(name).copied()
    }

    /// Layers in creation order
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.layers.iter().map(|(id, layer)| (*id, layer))
    }

    /// Topmost layer containing `point`
    pub fn hit_test(&self, point: Point) -> Option<LayerId> {
        self.layers
            .iter()
            .rev()
            .find(|(_, layer)| layer.bounds().contains(point))
            .map(|(id, _)| *id)
    }

    pub fn set_layer_position(&mut self, id: LayerId, x: f64, y: f64) -> Result<(), RoutingError> {
        let bounds = self.layer(id).ok_or_else(|| unknown_layer(id))?.bounds();
        self.set_layer_geometry(id, BoundingBox::new(x, y, bounds.width, bounds.height))
    }

    pub fn set_layer_size(
        &mut self,
        id: LayerId,
        width: f64,
        height: f64,
    ) -> Result<(), RoutingError> {
        let bounds = self.layer(id).ok_or_else(|| unknown_layer(id))?.bounds();
        self.set_layer_geometry(id, BoundingBox::new(bounds.x, bounds.y, width, height))
    }

    /// Replace a layer's rectangle and reroute everything attached to it
    pub fn set_layer_geometry(
        &mut self,
        id: LayerId,
        bounds: BoundingBox,
    ) -> Result<(), RoutingError> {
        let layer = self.layers.get_mut(&id).ok_or_else(|| unknown_layer(id))?;
        check_bounds(layer.name(), &bounds)?;
        layer.set_geometry(bounds);
        self.notify(Notification::LayerChanged(id));

        self.grow_bounds(bounds);
        self.refresh_grid()?;
        self.reroute_attached(id)
    }

    /// Hide the connections of a layer that is about to be dragged
    pub fn begin_layer_move(&mut self, id: LayerId) -> Result<(), RoutingError> {
        if !self.layers.contains_key(&id) {
            return Err(unknown_layer(id));
        }
        for connection in self.attached_to(id) {
            if let Some(c) = self.connections.get_mut(&connection) {
                c.set_hidden(true);
            }
            self.notify(Notification::ConnectionChanged(connection));
        }
        Ok(())
    }

    /// Move a layer without touching the grid or its connections
    ///
    /// The workspace still grows, so a grid rebuilt mid-drag covers the layer.
    pub fn move_layer_draft(&mut self, id: LayerId, position: Point) -> Result<(), RoutingError> {
        let layer = self.layers.get_mut(&id).ok_or_else(|| unknown_layer(id))?;
        layer.set_position(position.x, position.y);
        let bounds = layer.bounds();
        self.grow_bounds(bounds);
        self.notify(Notification::LayerChanged(id));
        Ok(())
    }

    /// Commit a layer move: show its connections again and reroute them
    pub fn finish_layer_move(&mut self, id: LayerId) -> Result<(), RoutingError> {
        let bounds = self.layer(id).ok_or_else(|| unknown_layer(id))?.bounds();
        for connection in self.attached_to(id) {
            if let Some(c) = self.connections.get_mut(&connection) {
                c.set_hidden(false);
            }
        }
        self.set_layer_geometry(id, bounds)
    }

    // --- connections ---

    /// Create and route a connection between two layers
    ///
    /// Nothing is kept when routing fails.
    pub fn connect(
        &mut self,
        source: LayerId,
        target: LayerId,
    ) -> Result<ConnectionHandle, RoutingError> {
        for layer in [source, target] {
            if !self.layers.contains_key(&layer) {
                return Err(unknown_layer(layer));
            }
        }
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections
            .insert(id, Connection::new(id, source, target));

        if let Err(err) = self.route_connection(id) {
            self.connections.remove(&id);
            return Err(err);
        }
        info!("connected {:?} -> {:?} as {}", source, target, id);
        Ok(id)
    }

    /// Connect two layers by name
    pub fn connect_names(
        &mut self,
        source: &str,
        target: &str,
    ) -> Result<ConnectionHandle, RoutingError> {
        let lookup = |name: &str| {
            self.layer_id(name)
                .ok_or_else(|| RoutingError::configuration(format!("unknown layer '{name}'")))
        };
        let (source, target) = (lookup(source)?, lookup(target)?);
        self.connect(source, target)
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Result<(), RoutingError> {
        self.connections
            .remove(&id)
            .ok_or_else(|| unknown_connection(id))?;
        self.notify(Notification::ConnectionChanged(id));
        Ok(())
    }

    /// Replace a connection's path
    ///
    /// Fewer than two points run the full recomputation. Otherwise the given
    /// endpoints, or the current ones when omitted, are bound to the path.
    pub fn update_path_points(
        &mut self,
        id: ConnectionId,
        points: &[Point],
        endpoints: Option<(Endpoint, Endpoint)>,
    ) -> Result<(), RoutingError> {
        if points.len() < 2 {
            return self.route_connection(id);
        }
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| unknown_connection(id))?;
        let (source, target) = match endpoints {
            Some(pair) => pair,
            None => match (
                connection.endpoint(End::Source),
                connection.endpoint(End::Target),
            ) {
                (Some(s), Some(t)) => (*s, *t),
                _ => {
                    return Err(RoutingError::configuration(format!(
                        "connection {id} has no endpoints to bind the path to"
                    )))
                }
            },
        };
        self.apply_path(id, points, source, target)
    }

    /// Full recomputation: resolve anchors, search the grid, rebuild the lines
    pub fn route_connection(&mut self, id: ConnectionId) -> Result<(), RoutingError> {
        let result = self.compute_route(id);
        match result {
            Ok((points, source, target)) => self.apply_path(id, &points, source, target),
            Err(err) => {
                self.unroute(id);
                Err(err)
            }
        }
    }

    fn compute_route(
        &self,
        id: ConnectionId,
    ) -> Result<(Vec<Point>, Endpoint, Endpoint), RoutingError> {
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| unknown_connection(id))?;
        let (source_id, target_id) = (connection.source_layer(), connection.target_layer());
        let source = self
            .layers
            .get(&source_id)
            .ok_or_else(|| unknown_layer(source_id))?;
        let target = self
            .layers
            .get(&target_id)
            .ok_or_else(|| unknown_layer(target_id))?;

        let (s_anchor, t_anchor) = resolve_anchors(source, target, self.config.grid_scale)?;
        let source_ep = Endpoint::new(source_id, s_anchor);
        let target_ep = Endpoint::new(target_id, t_anchor);

        let points = if source.middle().x == target.middle().x {
            vec![s_anchor.position, t_anchor.position]
        } else {
            self.search_route(&source_ep, &target_ep)?
        };
        Ok((points, source_ep, target_ep))
    }

    /// Route between the connection points of two endpoints
    fn search_route(&self, source: &Endpoint, target: &Endpoint) -> Result<Vec<Point>, RoutingError> {
        let start = self
            .grid
            .cell_at(connection_point(&source.anchor(), &self.config))?;
        let goal = self
            .grid
            .cell_at(connection_point(&target.anchor(), &self.config))?;
        let cells = find_path(
            &self.grid,
            start,
            goal,
            source.direction,
            self.config.max_iterations,
        )?;
        Ok(cells.iter().map(GridCell::position).collect())
    }

    /// Reroute from the endpoints the connection currently has
    ///
    /// Used after a side-flip: both endpoints are kept, snapped to the grid.
    pub fn reroute_from_endpoints(&mut self, id: ConnectionId) -> Result<(), RoutingError> {
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| unknown_connection(id))?;
        let (Some(source), Some(target)) = (
            connection.endpoint(End::Source).copied(),
            connection.endpoint(End::Target).copied(),
        ) else {
            return self.route_connection(id);
        };

        let scale = self.config.grid_scale;
        let source = Endpoint::new(source.layer, source.anchor().snapped(scale));
        let target = Endpoint::new(target.layer, target.anchor().snapped(scale));
        match self.search_route(&source, &target) {
            Ok(points) => self.apply_path(id, &points, source, target),
            Err(err) => {
                self.unroute(id);
                Err(err)
            }
        }
    }

    fn apply_path(
        &mut self,
        id: ConnectionId,
        points: &[Point],
        source: Endpoint,
        target: Endpoint,
    ) -> Result<(), RoutingError> {
        let connection = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| unknown_connection(id))?;
        let result = connection.set_path(points, source, target);
        self.notify(Notification::ConnectionChanged(id));
        if let Err(err) = &result {
            warn!("connection {} keeps its previous path: {}", id, err);
        }
        result
    }

    fn unroute(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.clear();
            self.notify(Notification::ConnectionChanged(id));
        }
    }

    /// Check a connection's invariants
    pub fn validate_connection(&self, id: ConnectionId) -> Result<(), RoutingError> {
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| unknown_connection(id))?;
        let result = connection.validate();
        if let Err(err) = &result {
            warn!("{}", err);
        }
        result
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Connections in creation order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// The lines of a connection in path order
    pub fn lines(&self, id: ConnectionId) -> Result<Vec<LineView>, RoutingError> {
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| unknown_connection(id))?;
        connection
            .lines()
            .map(|(line_id, line)| {
                let (start, end) = connection.line_ends(line_id).ok_or_else(|| {
                    RoutingError::invariant(id.0, format!("line {:?} has a missing point", line_id))
                })?;
                Ok(LineView {
                    id: line_id,
                    start,
                    end,
                    orientation: line.orientation,
                    direction: direction_between(start, end),
                })
            })
            .collect()
    }

    /// Source and target endpoint of a routed connection
    pub fn endpoints(&self, id: ConnectionId) -> Result<(Endpoint, Endpoint), RoutingError> {
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| unknown_connection(id))?;
        match (
            connection.endpoint(End::Source),
            connection.endpoint(End::Target),
        ) {
            (Some(s), Some(t)) => Ok((*s, *t)),
            _ => Err(RoutingError::configuration(format!(
                "connection {id} is not routed"
            ))),
        }
    }

    // --- drags ---

    /// Drag a line so it passes through `pointer`
    pub fn drag_line(&mut self, line: LineRef, pointer: Point) -> Result<DragReport, RoutingError> {
        self.drag_with(line.connection, |connection, layers, config| {
            connection.drag_line(line.line, pointer, layers, config)
        })
    }

    /// Drag an endpoint along its edge towards `pointer`
    pub fn drag_endpoint(
        &mut self,
        id: ConnectionId,
        end: End,
        pointer: Point,
    ) -> Result<DragReport, RoutingError> {
        self.drag_with(id, |connection, layers, config| {
            let axis = connection
                .endpoint(end)
                .map(|e| e.direction.free_axis())
                .ok_or_else(|| {
                    RoutingError::configuration(format!("connection {id} is not routed"))
                })?;
            connection.drag_endpoint(end, pointer.along(axis), layers, config)
        })
    }

    fn drag_with<F>(&mut self, id: ConnectionId, drag: F) -> Result<DragReport, RoutingError>
    where
        F: FnOnce(&mut Connection, EndLayers<'_>, &RouterConfig) -> Result<DragReport, RoutingError>,
    {
        let connection = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| unknown_connection(id))?;
        let (source_id, target_id) = (connection.source_layer(), connection.target_layer());
        let source = self
            .layers
            .get(&source_id)
            .ok_or_else(|| unknown_layer(source_id))?;
        let target = self
            .layers
            .get(&target_id)
            .ok_or_else(|| unknown_layer(target_id))?;

        let report = drag(connection, EndLayers { source, target }, &self.config)?;
        if !report.is_empty() {
            self.notify(Notification::ConnectionChanged(id));
        }
        if let Some(end) = report.flipped {
            debug!("connection {} rerouted after {:?} side-flip", id, end);
            self.reroute_from_endpoints(id)?;
        }
        Ok(report)
    }

    // --- view ---

    /// Show or hide the occupancy overlay; returns the new state
    pub fn toggle_occupancy_overlay(&mut self) -> bool {
        self.overlay_visible = !self.overlay_visible;
        self.notify(Notification::OverlayToggled(self.overlay_visible));
        self.overlay_visible
    }

    pub fn set_view_offset(&mut self, offset: Point) {
        self.view_offset = offset;
    }

    /// Shift the view by an arbitrary amount
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.view_offset = Point::new(self.view_offset.x + dx, self.view_offset.y + dy);
    }

    /// Shift the view one keyboard step
    pub fn pan(&mut self, direction: Direction) {
        let (dx, dy) = direction.unit();
        let step = self.config.move_step;
        self.pan_by(dx * step, dy * step);
    }

    // --- notifications ---

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Remove every layer and connection and return to the initial viewport
    pub fn clear(&mut self) -> Result<(), RoutingError> {
        self.layers.clear();
        self.layer_names.clear();
        self.connections.clear();
        let (width, height) = self.config.viewport;
        self.bounds = BoundingBox::new(0.0, 0.0, width, height);
        self.view_offset = Point::default();
        self.refresh_grid()
    }

    // --- internals ---

    fn attached_to(&self, layer: LayerId) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|c| c.source_layer() == layer || c.target_layer() == layer)
            .map(Connection::id)
            .collect()
    }

    /// Reroute every connection of a layer; the first failure is returned
    fn reroute_attached(&mut self, layer: LayerId) -> Result<(), RoutingError> {
        let mut first_error = None;
        for id in self.attached_to(layer) {
            if let Err(err) = self.route_connection(id) {
                warn!("rerouting connection {} failed: {}", id, err);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Grow the workspace so `bounds` keeps the configured padding
    ///
    /// The workspace never shrinks. Edges are snapped outwards to the grid,
    /// with one extra cell so rounded layer edges stay inside.
    fn grow_bounds(&mut self, bounds: BoundingBox) {
        let scale = self.config.grid_scale;
        let padded = bounds.inflate(self.config.instance_padding);
        let padded = BoundingBox::new(
            padded.x,
            padded.y,
            padded.width + scale,
            padded.height + scale,
        );
        let union = self.bounds.union(&padded);
        let left = floor_to_scale(union.x, scale);
        let top = floor_to_scale(union.y, scale);
        let right = ceil_to_scale(union.right(), scale);
        let bottom = ceil_to_scale(union.bottom(), scale);
        let grown = BoundingBox::new(left, top, right - left, bottom - top);
        if grown != self.bounds {
            debug!(
                "workspace grows to {}x{} at ({},{})",
                grown.width, grown.height, grown.x, grown.y
            );
            self.bounds = grown;
        }
    }

    /// Rebuild the grid over the current bounds
    ///
    /// Without overlap detection the grid is left all walkable.
    fn refresh_grid(&mut self) -> Result<(), RoutingError> {
        let overlap = self.config.use_overlap_detection;
        self.grid = rebuild_grid_in(
            self.layers.values().filter(|_| overlap),
            self.bounds,
            self.config.grid_scale,
        )?;
        self.notify(Notification::GridChanged);
        Ok(())
    }
}

fn unknown_layer(id: LayerId) -> RoutingError {
    RoutingError::configuration(format!("unknown layer {:?}", id))
}

fn unknown_connection(id: ConnectionId) -> RoutingError {
    RoutingError::configuration(format!("unknown connection {id}"))
}

fn check_bounds(name: &str, bounds: &BoundingBox) -> Result<(), RoutingError> {
    let finite = [bounds.x, bounds.y, bounds.width, bounds.height]
        .iter()
        .all(|v| v.is_finite());
    if !finite || bounds.width < 0.0 || bounds.height < 0.0 {
        return Err(RoutingError::geometry(format!(
            "layer '{name}' has an invalid rectangle {:?}",
            bounds
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        Instance::new(RouterConfig::default()).unwrap()
    }

    #[test]
    fn test_new_instance_covers_viewport() {
        let inst = instance();
        assert_eq!(inst.bounds(), BoundingBox::new(0.0, 0.0, 1000.0, 800.0));
        assert_eq!(inst.grid().len(), 200 * 160);
        assert!(!inst.overlay_visible());
    }

    #[test]
    fn test_zero_iterations_is_rejected() {
        let config = RouterConfig::default().with_max_iterations(0);
        assert!(matches!(
            Instance::new(config),
            Err(RoutingError::Configuration { .. })
        ));
    }

    #[test]
    fn test_fractional_grid_scale_is_rejected() {
        let config = RouterConfig::default().with_grid_scale(2.5);
        assert!(matches!(
            Instance::new(config),
            Err(RoutingError::Configuration { .. })
        ));
        assert!(Instance::new(RouterConfig::default().with_grid_scale(2.0)).is_ok());
    }

    #[test]
    fn test_bounds_grow_with_padding() {
        let mut inst = instance();
        inst.create_layer("a", BoundingBox::new(-12.0, 0.0, 100.0, 50.0))
            .unwrap();
        let bounds = inst.bounds();
        // -12 - 200 = -212 snaps down to -215
        assert_eq!(bounds.x, -215.0);
        assert_eq!(bounds.y, -200.0);
        assert_eq!(bounds.right(), 1000.0);

        // growing again with the same layer is a no-op
        let before = inst.bounds();
        inst.set_layer_position(LayerId(0), -12.0, 0.0).unwrap();
        assert_eq!(inst.bounds(), before);
    }

    #[test]
    fn test_duplicate_layer_name_is_rejected() {
        let mut inst = instance();
        inst.create_layer("a", BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let result = inst.create_layer("a", BoundingBox::new(50.0, 0.0, 10.0, 10.0));
        assert!(matches!(result, Err(RoutingError::Configuration { .. })));
        assert_eq!(inst.layers().count(), 1);
    }

    #[test]
    fn test_negative_size_is_a_geometry_error() {
        let mut inst = instance();
        let result = inst.create_layer("a", BoundingBox::new(0.0, 0.0, -10.0, 10.0));
        assert!(matches!(result, Err(RoutingError::Geometry { .. })));
    }

    #[test]
    fn test_layers_block_grid_cells() {
        let mut inst = instance();
        inst.create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        assert!(!inst.grid().is_walkable(25, 50));
        assert!(inst.grid().is_walkable(100, 50));
    }

    #[test]
    fn test_overlap_detection_off_keeps_grid_walkable() {
        let config = RouterConfig::default().with_overlap_detection(false);
        let mut inst = Instance::new(config).unwrap();
        inst.create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        assert_eq!(inst.grid().blocked_count(), 0);
    }

    #[test]
    fn test_connect_unknown_layer() {
        let mut inst = instance();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let result = inst.connect(a, LayerId(42));
        assert!(matches!(result, Err(RoutingError::Configuration { .. })));
        assert!(matches!(
            inst.connect_names("a", "nope"),
            Err(RoutingError::Configuration { .. })
        ));
        assert_eq!(inst.connections().count(), 0);
    }

    #[test]
    fn test_failed_route_leaves_nothing_behind() {
        let config = RouterConfig::default().with_max_iterations(1);
        let mut inst = Instance::new(config).unwrap();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let b = inst
            .create_layer("b", BoundingBox::new(300.0, 0.0, 100.0, 50.0))
            .unwrap();
        let result = inst.connect(a, b);
        assert!(matches!(result, Err(RoutingError::SearchExhausted { .. })));
        assert_eq!(inst.connections().count(), 0);
    }

    #[test]
    fn test_remove_layer_unroutes_connections() {
        let mut inst = instance();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let b = inst
            .create_layer("b", BoundingBox::new(300.0, 0.0, 100.0, 50.0))
            .unwrap();
        let c = inst.connect(a, b).unwrap();
        assert!(inst.connection(c).unwrap().is_routed());

        inst.remove_layer(b).unwrap();
        assert!(!inst.connection(c).unwrap().is_routed());
        assert_eq!(inst.layer_id("b"), None);
        assert!(matches!(
            inst.endpoints(c),
            Err(RoutingError::Configuration { .. })
        ));
    }

    #[test]
    fn test_side_by_side_route() {
        let mut inst = instance();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let b = inst
            .create_layer("b", BoundingBox::new(300.0, 0.0, 100.0, 50.0))
            .unwrap();
        let c = inst.connect(a, b).unwrap();

        let (source, target) = inst.endpoints(c).unwrap();
        assert_eq!(source.direction, Direction::Right);
        assert_eq!(target.direction, Direction::Left);

        let lines = inst.lines(c).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].start, Point::new(145.0, 25.0));
        assert_eq!(lines[0].end, Point::new(255.0, 25.0));
        assert_eq!(lines[0].direction, Some(Direction::Right));
        assert!(inst.validate_connection(c).is_ok());
    }

    #[test]
    fn test_notifications_are_drained() {
        let mut inst = instance();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let notes = inst.drain_notifications();
        assert_eq!(
            notes,
            vec![Notification::GridChanged, Notification::LayerChanged(a)]
        );
        assert!(inst.drain_notifications().is_empty());

        assert!(inst.toggle_occupancy_overlay());
        assert_eq!(
            inst.drain_notifications(),
            vec![Notification::OverlayToggled(true)]
        );
    }

    #[test]
    fn test_pan_steps() {
        let mut inst = instance();
        inst.pan(Direction::Right);
        inst.pan(Direction::Top);
        assert_eq!(inst.view_offset(), Point::new(50.0, -50.0));
        inst.pan_by(-10.0, 5.0);
        assert_eq!(inst.view_offset(), Point::new(40.0, -45.0));
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut inst = instance();
        inst.create_layer("under", BoundingBox::new(0.0, 0.0, 100.0, 100.0))
            .unwrap();
        let over = inst
            .create_layer("over", BoundingBox::new(50.0, 50.0, 100.0, 100.0))
            .unwrap();
        assert_eq!(inst.hit_test(Point::new(75.0, 75.0)), Some(over));
        assert_eq!(inst.hit_test(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut inst = instance();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let b = inst
            .create_layer("b", BoundingBox::new(0.0, 200.0, 100.0, 50.0))
            .unwrap();
        inst.connect(a, b).unwrap();
        inst.clear().unwrap();
        assert_eq!(inst.layers().count(), 0);
        assert_eq!(inst.connections().count(), 0);
        assert_eq!(inst.bounds(), BoundingBox::new(0.0, 0.0, 1000.0, 800.0));
        assert_eq!(inst.grid().blocked_count(), 0);
    }

    #[test]
    fn test_resizing_a_layer_reroutes_it() {
        let mut inst = instance();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let b = inst
            .create_layer("b", BoundingBox::new(0.0, 200.0, 100.0, 50.0))
            .unwrap();
        let c = inst.connect(a, b).unwrap();
        assert_eq!(inst.connection(c).unwrap().positions().len(), 2);

        inst.set_layer_size(a, 200.0, 50.0).unwrap();
        assert_eq!(inst.layer(a).unwrap().width(), 200.0);
        let connection = inst.connection(c).unwrap();
        assert!(connection.is_routed());
        let (source, _) = inst.endpoints(c).unwrap();
        assert_eq!(source.direction, Direction::Bottom);
        assert!(inst.validate_connection(c).is_ok());
    }

    #[test]
    fn test_grid_rebuild_during_layer_draft() {
        let mut inst = instance();
        let a = inst
            .create_layer("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0))
            .unwrap();
        let b = inst
            .create_layer("b", BoundingBox::new(300.0, 0.0, 100.0, 50.0))
            .unwrap();
        let c = inst
            .create_layer("c", BoundingBox::new(0.0, 300.0, 100.0, 50.0))
            .unwrap();
        let link = inst.connect(a, b).unwrap();

        inst.begin_layer_move(b).unwrap();
        inst.move_layer_draft(b, Point::new(3000.0, 2000.0)).unwrap();
        assert!(inst.bounds().right() >= 3100.0 + 200.0);

        inst.remove_layer(c).unwrap();
        inst.finish_layer_move(b).unwrap();
        assert!(inst.connection(link).unwrap().is_routed());
        assert!(inst.validate_connection(link).is_ok());
    }
}
