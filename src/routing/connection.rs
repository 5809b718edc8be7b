//! Live polyline of a connection and the engine that keeps it orthogonal
//!
//! Points and lines live in per-connection arenas keyed by stable ids. The
//! ordered id lists describe the polyline from source to target: line `i`
//! always joins point `i` to point `i + 1`.
//!
//! Dragging a line or an endpoint starts a cascade. A moved point notifies
//! its lines, and a line forwards the movement to its other end only when
//! the movement is perpendicular to it. Every node is visited at most once
//! per cascade, so a drag touches exactly the points it has to.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use log::{debug, trace};

use super::anchor::Anchor;
use super::config::RouterConfig;
use super::error::RoutingError;
use super::types::{
    direction_between, ConnectionId, Direction, Layer, LayerId, Orientation, Point, EPSILON,
};

/// Stable id of a point within its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(pub usize);

/// Stable id of a line within its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub usize);

/// One end of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum End {
    Source,
    Target,
}

/// Where a connection attaches to a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    pub layer: LayerId,
    pub position: Point,
    pub direction: Direction,
}

impl Endpoint {
    pub fn new(layer: LayerId, anchor: Anchor) -> Self {
        Self {
            layer,
            position: anchor.position,
            direction: anchor.direction,
        }
    }

    pub fn anchor(&self) -> Anchor {
        Anchor::new(self.position, self.direction)
    }

    /// The neighbouring side to jump to once the endpoint slid past a corner
    ///
    /// Returns the new anchor, placed `inset` away from the corner it passed.
    pub fn out_of_bounds(&self, layer: &Layer, inset: f64) -> Option<Anchor> {
        let p = self.position;
        let (position, direction) = match self.direction {
            Direction::Bottom if p.x < layer.left() => {
                (Point::new(layer.left(), layer.bottom() - inset), Direction::Left)
            }
            Direction::Bottom if p.x > layer.right() => {
                (Point::new(layer.right(), layer.bottom() - inset), Direction::Right)
            }
            Direction::Top if p.x < layer.left() => {
                (Point::new(layer.left(), layer.top() + inset), Direction::Left)
            }
            Direction::Top if p.x > layer.right() => {
                (Point::new(layer.right(), layer.top() + inset), Direction::Right)
            }
            Direction::Left if p.y < layer.top() => {
                (Point::new(layer.left() + inset, layer.top()), Direction::Top)
            }
            Direction::Left if p.y > layer.bottom() => {
                (Point::new(layer.left() + inset, layer.bottom()), Direction::Bottom)
            }
            Direction::Right if p.y < layer.top() => {
                (Point::new(layer.right() - inset, layer.top()), Direction::Top)
            }
            Direction::Right if p.y > layer.bottom() => {
                (Point::new(layer.right() - inset, layer.bottom()), Direction::Bottom)
            }
            _ => return None,
        };
        Some(Anchor::new(position, direction))
    }
}

/// A corner or end of the polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub position: Point,
    pub can_move_x: bool,
    pub can_move_y: bool,
    /// Side a pinned end may grow a new line towards
    pub grow_direction: Option<Direction>,
}

impl PathPoint {
    fn corner(position: Point) -> Self {
        Self {
            position,
            can_move_x: true,
            can_move_y: true,
            grow_direction: None,
        }
    }

    /// A path end bound to an endpoint facing `direction`
    fn bound(position: Point, direction: Direction) -> Self {
        let free = direction.free_axis();
        Self {
            position,
            can_move_x: free == Orientation::Horizontal,
            can_move_y: free == Orientation::Vertical,
            grow_direction: Some(direction),
        }
    }

    pub fn can_move(&self, axis: Orientation) -> bool {
        match axis {
            Orientation::Horizontal => self.can_move_x,
            Orientation::Vertical => self.can_move_y,
            Orientation::Lopsided => false,
        }
    }
}

/// An axis-aligned segment between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub source: PointId,
    pub target: PointId,
    pub orientation: Orientation,
}

/// Lines removed by a zero-length collapse and the line replacing them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collapse {
    pub removed: Vec<LineId>,
    pub merged: LineId,
}

/// What a drag did to the polyline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragReport {
    pub moved: Vec<PointId>,
    pub inserted: Vec<PointId>,
    pub collapses: Vec<Collapse>,
    /// Set when an endpoint jumped to another side; the path must be rerouted
    pub flipped: Option<End>,
}

impl DragReport {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
            && self.inserted.is_empty()
            && self.collapses.is_empty()
            && self.flipped.is_none()
    }

    /// The line an old line reference points to after the collapses
    pub fn remap(&self, mut line: LineId) -> LineId {
        for collapse in &self.collapses {
            if collapse.removed.contains(&line) {
                line = collapse.merged;
            }
        }
        line
    }
}

/// Geometry of the two layers a connection is attached to
#[derive(Debug, Clone, Copy)]
pub struct EndLayers<'a> {
    pub source: &'a Layer,
    pub target: &'a Layer,
}

impl<'a> EndLayers<'a> {
    fn get(&self, end: End) -> &'a Layer {
        match end {
            End::Source => self.source,
            End::Target => self.target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Point(PointId),
    Line(LineId),
    Endpoint(End),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PositionChange {
    axis: Orientation,
    delta: f64,
}

impl PositionChange {
    fn same_as(&self, other: &PositionChange) -> bool {
        self.axis == other.axis && (self.delta - other.delta).abs() < EPSILON
    }
}

#[derive(Debug, Clone, Copy)]
struct Message {
    to: Node,
    from: Node,
    change: PositionChange,
}

/// A routed (or not yet routed) link between two layers
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    source_layer: LayerId,
    target_layer: LayerId,
    source: Option<Endpoint>,
    target: Option<Endpoint>,
    points: BTreeMap<PointId, PathPoint>,
    lines: BTreeMap<LineId, Line>,
    point_order: Vec<PointId>,
    line_order: Vec<LineId>,
    next_id: usize,
    hidden: bool,
}

impl Connection {
    pub fn new(id: ConnectionId, source_layer: LayerId, target_layer: LayerId) -> Self {
        Self {
            id,
            source_layer,
            target_layer,
            source: None,
            target: None,
            points: BTreeMap::new(),
            lines: BTreeMap::new(),
            point_order: Vec::new(),
            line_order: Vec::new(),
            next_id: 0,
            hidden: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn source_layer(&self) -> LayerId {
        self.source_layer
    }

    pub fn target_layer(&self) -> LayerId {
        self.target_layer
    }

    pub fn is_routed(&self) -> bool {
        self.point_order.len() >= 2 && self.source.is_some() && self.target.is_some()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn endpoint(&self, end: End) -> Option<&Endpoint> {
        match end {
            End::Source => self.source.as_ref(),
            End::Target => self.target.as_ref(),
        }
    }

    fn endpoint_mut(&mut self, end: End) -> Option<&mut Endpoint> {
        match end {
            End::Source => self.source.as_mut(),
            End::Target => self.target.as_mut(),
        }
    }

    pub fn source_point(&self) -> Option<PointId> {
        self.point_order.first().copied()
    }

    pub fn target_point(&self) -> Option<PointId> {
        self.point_order.last().copied()
    }

    /// The path point bound to the given endpoint
    pub fn end_point(&self, end: End) -> Option<PointId> {
        match end {
            End::Source => self.source_point(),
            End::Target => self.target_point(),
        }
    }

    pub fn point(&self, id: PointId) -> Option<&PathPoint> {
        self.points.get(&id)
    }

    /// Points in path order
    pub fn points(&self) -> impl Iterator<Item = (PointId, &PathPoint)> + '_ {
        self.point_order
            .iter()
            .filter_map(|id| self.points.get(id).map(|p| (*id, p)))
    }

    /// Point positions in path order
    pub fn positions(&self) -> Vec<Point> {
        self.points().map(|(_, p)| p.position).collect()
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    /// Lines in path order
    pub fn lines(&self) -> impl Iterator<Item = (LineId, &Line)> + '_ {
        self.line_order
            .iter()
            .filter_map(|id| self.lines.get(id).map(|l| (*id, l)))
    }

    pub fn line_count(&self) -> usize {
        self.line_order.len()
    }

    /// Start and end position of a line
    pub fn line_ends(&self, id: LineId) -> Option<(Point, Point)> {
        let line = self.lines.get(&id)?;
        let a = self.points.get(&line.source)?.position;
        let b = self.points.get(&line.target)?.position;
        Some((a, b))
    }

    pub fn line_length(&self, id: LineId) -> Option<f64> {
        self.line_ends(id).map(|(a, b)| a.distance(b))
    }

    /// Drop the path and both endpoints; the connection becomes unrouted
    pub fn clear(&mut self) {
        self.points.clear();
        self.lines.clear();
        self.point_order.clear();
        self.line_order.clear();
        self.source = None;
        self.target = None;
    }

    /// Replace the polyline with `points`, bound to the given endpoints
    ///
    /// Duplicate points are dropped and consecutive lines running the same
    /// way are merged. The new path is built aside and only replaces the
    /// current one once it validates; on error the connection is unchanged.
    pub fn set_path(
        &mut self,
        points: &[Point],
        source: Endpoint,
        target: Endpoint,
    ) -> Result<(), RoutingError> {
        let simplified = simplify(points);
        if simplified.len() < 2 {
            return Err(RoutingError::geometry(format!(
                "connection {} needs two distinct points, got {}",
                self.id,
                simplified.len()
            )));
        }

        // ids keep counting from the live path so stale handles never alias
        let mut staged = Connection::new(self.id, self.source_layer, self.target_layer);
        staged.next_id = self.next_id;
        staged.hidden = self.hidden;

        let last = simplified.len() - 1;
        for (i, position) in simplified.iter().enumerate() {
            let point = if i == 0 {
                PathPoint::bound(*position, source.direction)
            } else if i == last {
                PathPoint::bound(*position, target.direction)
            } else {
                PathPoint::corner(*position)
            };
            let id = staged.add_point(point);
            staged.point_order.push(id);
        }
        staged.source = Some(source);
        staged.target = Some(target);

        for i in 0..last {
            let line = staged.make_line(staged.point_order[i], staged.point_order[i + 1])?;
            staged.line_order.push(line);
        }
        staged.validate()?;

        *self = staged;
        debug!(
            "connection {} routed through {} points",
            self.id,
            self.point_order.len()
        );
        Ok(())
    }

    /// Check the structural invariants of a routed connection
    ///
    /// Every line must be axis-aligned and agree with its stored orientation,
    /// the lines must chain the points in order, and each end point must share
    /// its endpoint's free-axis coordinate.
    pub fn validate(&self) -> Result<(), RoutingError> {
        if !self.is_routed() {
            return Ok(());
        }
        if self.line_order.len() + 1 != self.point_order.len() {
            return Err(self.error(format!(
                "{} lines for {} points",
                self.line_order.len(),
                self.point_order.len()
            )));
        }

        for (i, id) in self.line_order.iter().enumerate() {
            let line = self
                .lines
                .get(id)
                .ok_or_else(|| self.error(format!("missing line {:?}", id)))?;
            if line.source != self.point_order[i] || line.target != self.point_order[i + 1] {
                return Err(self.error(format!("line {:?} is out of sequence", id)));
            }
            if line.orientation == Orientation::Lopsided {
                return Err(self.error(format!("line {:?} is lopsided", id)));
            }
            let (a, b) = self
                .line_ends(*id)
                .ok_or_else(|| self.error(format!("line {:?} refers to a missing point", id)))?;
            if a.distance(b) >= EPSILON && Orientation::between(a, b) != line.orientation {
                return Err(self.error(format!(
                    "line {:?} from ({a}) to ({b}) is no longer {:?}",
                    id, line.orientation
                )));
            }
        }

        for end in [End::Source, End::Target] {
            let endpoint = self
                .endpoint(end)
                .ok_or_else(|| self.error(format!("{:?} endpoint is missing", end)))?;
            let point = self
                .end_point(end)
                .and_then(|id| self.points.get(&id))
                .ok_or_else(|| self.error(format!("{:?} point is missing", end)))?;
            let axis = endpoint.direction.free_axis();
            if (point.position.along(axis) - endpoint.position.along(axis)).abs() > EPSILON {
                return Err(self.error(format!(
                    "{:?} point ({}) drifted off its endpoint ({})",
                    end, point.position, endpoint.position
                )));
            }
        }
        Ok(())
    }

    /// Whether turning from `first` into `second` is clockwise on screen
    pub fn is_clockwise(&self, first: LineId, second: LineId) -> Result<bool, RoutingError> {
        let a = self
            .lines
            .get(&first)
            .ok_or_else(|| self.error(format!("missing line {:?}", first)))?;
        let b = self
            .lines
            .get(&second)
            .ok_or_else(|| self.error(format!("missing line {:?}", second)))?;
        if a.target != b.source {
            return Err(self.error(format!(
                "lines {:?} and {:?} are not consecutive",
                first, second
            )));
        }
        let p1 = self.position(a.source)?;
        let p2 = self.position(a.target)?;
        let p3 = self.position(b.target)?;
        let sum = (p2.x - p1.x) * (p2.y + p1.y)
            + (p3.x - p2.x) * (p3.y + p2.y)
            + (p1.x - p3.x) * (p1.y + p3.y);
        Ok(sum < 0.0)
    }

    /// Slide an endpoint along its edge to `value` on its free axis
    pub fn drag_endpoint(
        &mut self,
        end: End,
        value: f64,
        layers: EndLayers<'_>,
        config: &RouterConfig,
    ) -> Result<DragReport, RoutingError> {
        let endpoint = *self.endpoint(end).ok_or_else(|| {
            RoutingError::configuration(format!("connection {} has no {:?} endpoint", self.id, end))
        })?;
        let point = self.end_point(end).ok_or_else(|| {
            RoutingError::configuration(format!("connection {} is not routed", self.id))
        })?;

        let axis = endpoint.direction.free_axis();
        let delta = value - endpoint.position.along(axis);
        let mut report = DragReport::default();
        if delta.abs() < EPSILON {
            return Ok(report);
        }
        let change = PositionChange { axis, delta };

        self.cascade(
            vec![Message {
                to: Node::Endpoint(end),
                from: Node::Endpoint(end),
                change,
            }],
            HashSet::new(),
            layers,
            config,
            &mut report,
        )?;
        if report.flipped.is_some() {
            return Ok(report);
        }

        let touched = self.cascade(
            vec![Message {
                to: Node::Point(point),
                from: Node::Endpoint(end),
                change,
            }],
            HashSet::from([Node::Endpoint(end)]),
            layers,
            config,
            &mut report,
        )?;
        self.settle(touched, layers, config, &mut report)?;
        Ok(report)
    }

    /// Move a line perpendicular to itself so it passes through `pointer`
    ///
    /// When an end is pinned to an endpoint on that axis, a new corner is
    /// grown instead, provided the drag is long enough and heads the way the
    /// endpoint faces. Otherwise the drag is ignored.
    pub fn drag_line(
        &mut self,
        id: LineId,
        pointer: Point,
        layers: EndLayers<'_>,
        config: &RouterConfig,
    ) -> Result<DragReport, RoutingError> {
        let line = *self.lines.get(&id).ok_or_else(|| {
            RoutingError::configuration(format!("connection {} has no line {:?}", self.id, id))
        })?;
        let axis = line.orientation.perpendicular();
        if axis == Orientation::Lopsided {
            return Err(self.error(format!("cannot drag lopsided line {:?}", id)));
        }

        let source = *self.path_point(line.source)?;
        let target = *self.path_point(line.target)?;
        let value = pointer.along(axis);
        let diff = value - source.position.along(axis);
        let mut report = DragReport::default();
        if diff.abs() < EPSILON {
            return Ok(report);
        }

        let source_free = source.can_move(axis);
        let target_free = target.can_move(axis);
        if !(source_free && target_free) {
            if diff.abs() < config.create_line_size {
                trace!("drag of {:?} by {} is too short to grow a corner", id, diff);
                return Ok(report);
            }
            let grows = |p: &PathPoint| {
                p.grow_direction
                    .is_some_and(|d| d.travel_axis() == axis && d.matches_delta(diff))
            };
            if (!source_free && !grows(&source)) || (!target_free && !grows(&target)) {
                trace!("line {:?} cannot grow towards {}", id, diff);
                return Ok(report);
            }
            if !source_free {
                let corner = self.insert_corner(id, End::Source, value, axis)?;
                report.inserted.push(corner);
            }
            if !target_free {
                let corner = self.insert_corner(id, End::Target, value, axis)?;
                report.inserted.push(corner);
            }
        }

        let line = *self
            .lines
            .get(&id)
            .ok_or_else(|| self.error(format!("missing line {:?}", id)))?;
        let mut queue = Vec::new();
        for point in [line.source, line.target] {
            let delta = value - self.position(point)?.along(axis);
            if delta.abs() > EPSILON {
                queue.push(Message {
                    to: Node::Point(point),
                    from: Node::Line(id),
                    change: PositionChange { axis, delta },
                });
            }
        }

        let touched = self.cascade(
            queue,
            HashSet::from([Node::Line(id)]),
            layers,
            config,
            &mut report,
        )?;
        self.settle(touched, layers, config, &mut report)?;
        Ok(report)
    }

    fn error(&self, reason: impl Into<String>) -> RoutingError {
        RoutingError::invariant(self.id.0, reason)
    }

    fn path_point(&self, id: PointId) -> Result<&PathPoint, RoutingError> {
        self.points
            .get(&id)
            .ok_or_else(|| self.error(format!("missing point {:?}", id)))
    }

    fn position(&self, id: PointId) -> Result<Point, RoutingError> {
        self.path_point(id).map(|p| p.position)
    }

    fn point_index(&self, id: PointId) -> Result<usize, RoutingError> {
        self.point_order
            .iter()
            .position(|p| *p == id)
            .ok_or_else(|| self.error(format!("point {:?} is not on the path", id)))
    }

    fn line_index(&self, id: LineId) -> Result<usize, RoutingError> {
        self.line_order
            .iter()
            .position(|l| *l == id)
            .ok_or_else(|| self.error(format!("line {:?} is not on the path", id)))
    }

    fn lines_at(&self, point: PointId) -> Vec<LineId> {
        self.line_order
            .iter()
            .copied()
            .filter(|id| {
                self.lines
                    .get(id)
                    .is_some_and(|l| l.source == point || l.target == point)
            })
            .collect()
    }

    fn add_point(&mut self, point: PathPoint) -> PointId {
        let id = PointId(self.next_id);
        self.next_id += 1;
        self.points.insert(id, point);
        id
    }

    /// Register a line between two existing points; it is not placed in order
    fn make_line(&mut self, source: PointId, target: PointId) -> Result<LineId, RoutingError> {
        let a = self.position(source)?;
        let b = self.position(target)?;
        let orientation = Orientation::between(a, b);
        if orientation == Orientation::Lopsided {
            return Err(self.error(format!("lopsided line from ({a}) to ({b})")));
        }
        let id = LineId(self.next_id);
        self.next_id += 1;
        self.lines.insert(
            id,
            Line {
                source,
                target,
                orientation,
            },
        );
        Ok(id)
    }

    /// Split a pinned end off `line` with a new corner at `value` on `axis`
    fn insert_corner(
        &mut self,
        line: LineId,
        end: End,
        value: f64,
        axis: Orientation,
    ) -> Result<PointId, RoutingError> {
        let index = self.line_index(line)?;
        let current = *self
            .lines
            .get(&line)
            .ok_or_else(|| self.error(format!("missing line {:?}", line)))?;
        let pinned = match end {
            End::Source => current.source,
            End::Target => current.target,
        };
        let base = self.position(pinned)?;
        let position = match axis {
            Orientation::Vertical => Point::new(base.x, value),
            _ => Point::new(value, base.y),
        };
        let corner = self.add_point(PathPoint::corner(position));
        let pinned_at = self.point_index(pinned)?;

        match end {
            End::Source => {
                self.point_order.insert(pinned_at + 1, corner);
                if let Some(l) = self.lines.get_mut(&line) {
                    l.source = corner;
                }
                let stub = self.make_line(pinned, corner)?;
                self.line_order.insert(index, stub);
            }
            End::Target => {
                self.point_order.insert(pinned_at, corner);
                if let Some(l) = self.lines.get_mut(&line) {
                    l.target = corner;
                }
                let stub = self.make_line(corner, pinned)?;
                self.line_order.insert(index + 1, stub);
            }
        }
        debug!(
            "connection {}: new corner at ({}) next to {:?} end",
            self.id, position, end
        );
        Ok(corner)
    }

    /// Propagate position changes; returns every line whose length may have changed
    fn cascade(
        &mut self,
        queue: Vec<Message>,
        mut visited: HashSet<Node>,
        layers: EndLayers<'_>,
        config: &RouterConfig,
        report: &mut DragReport,
    ) -> Result<Vec<LineId>, RoutingError> {
        let mut queue: VecDeque<Message> = queue.into();
        let mut applied: HashMap<PointId, PositionChange> = HashMap::new();
        let mut touched = Vec::new();

        while let Some(Message { to, from, change }) = queue.pop_front() {
            if let Node::Point(id) = to {
                if applied.get(&id).is_some_and(|prev| !prev.same_as(&change)) {
                    return Err(self.error(format!("conflicting updates reached point {:?}", id)));
                }
            }
            if !visited.insert(to) {
                continue;
            }

            match to {
                Node::Point(id) => {
                    let connection = self.id.0;
                    let point = self.points.get_mut(&id).ok_or_else(|| {
                        RoutingError::invariant(connection, format!("missing point {:?}", id))
                    })?;
                    point.position = point.position.shifted(change.axis, change.delta);
                    trace!("point {:?} -> ({})", id, point.position);
                    applied.insert(id, change);
                    report.moved.push(id);

                    for line in self.lines_at(id) {
                        touched.push(line);
                        queue.push_back(Message {
                            to: Node::Line(line),
                            from: Node::Point(id),
                            change,
                        });
                    }
                    for end in [End::Source, End::Target] {
                        let follows = self.end_point(end) == Some(id)
                            && self
                                .endpoint(end)
                                .is_some_and(|e| e.direction.free_axis() == change.axis);
                        if follows {
                            queue.push_back(Message {
                                to: Node::Endpoint(end),
                                from: Node::Point(id),
                                change,
                            });
                        }
                    }
                }
                Node::Line(id) => {
                    let line = *self
                        .lines
                        .get(&id)
                        .ok_or_else(|| self.error(format!("missing line {:?}", id)))?;
                    if line.orientation != change.axis {
                        let other = if from == Node::Point(line.source) {
                            line.target
                        } else {
                            line.source
                        };
                        queue.push_back(Message {
                            to: Node::Point(other),
                            from: Node::Line(id),
                            change,
                        });
                    }
                }
                Node::Endpoint(end) => {
                    let connection = self.id;
                    let layer = layers.get(end);
                    let endpoint = self.endpoint_mut(end).ok_or_else(|| {
                        RoutingError::configuration(format!(
                            "connection {} has no {:?} endpoint",
                            connection, end
                        ))
                    })?;
                    endpoint.position = endpoint.position.shifted(change.axis, change.delta);
                    if let Some(anchor) = endpoint.out_of_bounds(layer, config.endpoint_inset) {
                        debug!(
                            "connection {}: {:?} endpoint flips from {} to {}",
                            connection, end, endpoint.direction, anchor.direction
                        );
                        endpoint.position = anchor.position;
                        endpoint.direction = anchor.direction;
                        report.flipped = Some(end);
                    }
                }
            }
        }
        Ok(touched)
    }

    /// Collapse lines that became too short, then check the invariants
    fn settle(
        &mut self,
        mut candidates: Vec<LineId>,
        layers: EndLayers<'_>,
        config: &RouterConfig,
        report: &mut DragReport,
    ) -> Result<(), RoutingError> {
        while report.flipped.is_none() && self.line_order.len() >= 2 {
            let short = self.line_order.iter().copied().find(|id| {
                candidates.contains(id)
                    && self
                        .line_length(*id)
                        .is_some_and(|len| len < config.collapse_threshold)
            });
            let Some(line) = short else {
                break;
            };
            let (collapse, touched) = self.collapse_line(line, layers, config, report)?;
            candidates.retain(|id| !collapse.removed.contains(id));
            candidates.extend(touched);
            report.collapses.push(collapse);
        }
        if report.flipped.is_some() {
            return Ok(());
        }
        self.validate()
    }

    /// Merge a near-zero-length line with its neighbours
    ///
    /// An interior line takes both neighbours and their shared points with
    /// it; a line touching a path end only takes the neighbour on its free
    /// side. The remaining start is shifted onto the remaining end's axis.
    fn collapse_line(
        &mut self,
        id: LineId,
        layers: EndLayers<'_>,
        config: &RouterConfig,
        report: &mut DragReport,
    ) -> Result<(Collapse, Vec<LineId>), RoutingError> {
        let index = self.line_index(id)?;
        let line = *self
            .lines
            .get(&id)
            .ok_or_else(|| self.error(format!("missing line {:?}", id)))?;
        let mut removed_lines = vec![id];
        let mut removed_points = Vec::new();
        let mut first_index = index;

        let source = if Some(line.source) == self.source_point() {
            line.source
        } else {
            let prev_id = *index
                .checked_sub(1)
                .and_then(|i| self.line_order.get(i))
                .ok_or_else(|| self.error(format!("line {:?} has no predecessor", id)))?;
            let prev = *self
                .lines
                .get(&prev_id)
                .ok_or_else(|| self.error(format!("missing line {:?}", prev_id)))?;
            removed_lines.push(prev_id);
            removed_points.push(line.source);
            first_index = index - 1;
            prev.source
        };
        let target = if Some(line.target) == self.target_point() {
            line.target
        } else {
            let next_id = *self
                .line_order
                .get(index + 1)
                .ok_or_else(|| self.error(format!("line {:?} has no successor", id)))?;
            let next = *self
                .lines
                .get(&next_id)
                .ok_or_else(|| self.error(format!("missing line {:?}", next_id)))?;
            removed_lines.push(next_id);
            removed_points.push(line.target);
            next.target
        };

        for removed in &removed_lines {
            self.lines.remove(removed);
        }
        self.line_order.retain(|l| !removed_lines.contains(l));
        for removed in &removed_points {
            self.points.remove(removed);
        }
        self.point_order.retain(|p| !removed_points.contains(p));

        let axis = line.orientation;
        let goal = self.position(target)?;
        let delta = goal.along(axis) - self.position(source)?.along(axis);
        let mut touched = Vec::new();
        if delta.abs() > EPSILON {
            touched = self.cascade(
                vec![Message {
                    to: Node::Point(source),
                    from: Node::Line(id),
                    change: PositionChange { axis, delta },
                }],
                HashSet::from([Node::Point(target)]),
                layers,
                config,
                report,
            )?;
        }
        if let Some(point) = self.points.get_mut(&source) {
            point.position = match axis {
                Orientation::Vertical => Point::new(point.position.x, goal.y),
                _ => Point::new(goal.x, point.position.y),
            };
        }

        let merged = self.make_line(source, target)?;
        self.line_order.insert(first_index, merged);
        debug!(
            "connection {}: collapsed {} lines into {:?}",
            self.id,
            removed_lines.len(),
            merged
        );
        Ok((
            Collapse {
                removed: removed_lines,
                merged,
            },
            touched,
        ))
    }
}

/// Drop repeated points and join consecutive segments heading the same way
fn simplify(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last().is_some_and(|last| last.distance(p) < EPSILON) {
            continue;
        }
        if let [.., a, b] = out[..] {
            let straight = matches!(
                (direction_between(a, b), direction_between(b, p)),
                (Some(d1), Some(d2)) if d1 == d2
            );
            if straight {
                out.pop();
            }
        }
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::types::BoundingBox;

    fn layers() -> (Layer, Layer) {
        (
            Layer::new("a", BoundingBox::new(0.0, 0.0, 100.0, 50.0)),
            Layer::new("b", BoundingBox::new(250.0, 290.0, 100.0, 50.0)),
        )
    }

    fn endpoint(layer: usize, x: f64, y: f64, direction: Direction) -> Endpoint {
        Endpoint {
            layer: LayerId(layer),
            position: Point::new(x, y),
            direction,
        }
    }

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn coords(connection: &Connection) -> Vec<(f64, f64)> {
        connection.positions().iter().map(|p| (p.x, p.y)).collect()
    }

    /// Bottom of `a` down, across, and down into the top of `b`
    fn three_lines() -> Connection {
        let mut c = Connection::new(ConnectionId(0), LayerId(0), LayerId(1));
        c.set_path(
            &pts(&[(50.0, 50.0), (50.0, 125.0), (300.0, 125.0), (300.0, 290.0)]),
            endpoint(0, 50.0, 50.0, Direction::Bottom),
            endpoint(1, 300.0, 290.0, Direction::Top),
        )
        .unwrap();
        c
    }

    /// Starts sideways from the connection point below `a`
    fn four_lines() -> Connection {
        let mut c = Connection::new(ConnectionId(1), LayerId(0), LayerId(1));
        c.set_path(
            &pts(&[
                (50.0, 95.0),
                (150.0, 95.0),
                (150.0, 150.0),
                (300.0, 150.0),
                (300.0, 245.0),
            ]),
            endpoint(0, 50.0, 50.0, Direction::Bottom),
            endpoint(1, 300.0, 290.0, Direction::Top),
        )
        .unwrap();
        c
    }

    fn line_at(c: &Connection, index: usize) -> LineId {
        c.lines().nth(index).map(|(id, _)| id).unwrap()
    }

    #[test]
    fn test_set_path_builds_lines_and_permissions() {
        let c = three_lines();
        let orientations: Vec<Orientation> = c.lines().map(|(_, l)| l.orientation).collect();
        assert_eq!(
            orientations,
            vec![Orientation::Vertical, Orientation::Horizontal, Orientation::Vertical]
        );

        let points: Vec<&PathPoint> = c.points().map(|(_, p)| p).collect();
        assert!(points[0].can_move_x && !points[0].can_move_y);
        assert_eq!(points[0].grow_direction, Some(Direction::Bottom));
        assert!(points[1].can_move_x && points[1].can_move_y);
        assert!(points[3].can_move_x && !points[3].can_move_y);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_set_path_merges_collinear_segments() {
        let mut c = Connection::new(ConnectionId(0), LayerId(0), LayerId(1));
        c.set_path(
            &pts(&[
                (50.0, 50.0),
                (50.0, 80.0),
                (50.0, 80.0),
                (50.0, 125.0),
                (300.0, 125.0),
                (300.0, 290.0),
            ]),
            endpoint(0, 50.0, 50.0, Direction::Bottom),
            endpoint(1, 300.0, 290.0, Direction::Top),
        )
        .unwrap();
        assert_eq!(
            coords(&c),
            vec![(50.0, 50.0), (50.0, 125.0), (300.0, 125.0), (300.0, 290.0)]
        );
        assert_eq!(c.line_count(), 3);
    }

    #[test]
    fn test_lopsided_path_is_rejected() {
        let mut c = Connection::new(ConnectionId(4), LayerId(0), LayerId(1));
        let result = c.set_path(
            &pts(&[(50.0, 50.0), (60.0, 70.0)]),
            endpoint(0, 50.0, 50.0, Direction::Bottom),
            endpoint(1, 60.0, 70.0, Direction::Top),
        );
        assert!(matches!(
            result,
            Err(RoutingError::InvariantViolation { connection: 4, .. })
        ));
        assert!(!c.is_routed());
    }

    #[test]
    fn test_rejected_path_keeps_previous_route() {
        let mut c = three_lines();
        let before = coords(&c);
        let first = line_at(&c, 0);

        let result = c.set_path(
            &pts(&[(50.0, 50.0), (60.0, 70.0)]),
            endpoint(0, 50.0, 50.0, Direction::Bottom),
            endpoint(1, 60.0, 70.0, Direction::Top),
        );
        assert!(matches!(result, Err(RoutingError::InvariantViolation { .. })));
        assert!(c.is_routed());
        assert_eq!(coords(&c), before);
        assert_eq!(line_at(&c, 0), first);
        assert_eq!(c.endpoint(End::Target).unwrap().position, Point::new(300.0, 290.0));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_end_point_must_follow_endpoint() {
        let mut c = Connection::new(ConnectionId(0), LayerId(0), LayerId(1));
        let result = c.set_path(
            &pts(&[(55.0, 50.0), (55.0, 125.0), (300.0, 125.0), (300.0, 290.0)]),
            endpoint(0, 50.0, 50.0, Direction::Bottom),
            endpoint(1, 300.0, 290.0, Direction::Top),
        );
        assert!(matches!(result, Err(RoutingError::InvariantViolation { .. })));
    }

    #[test]
    fn test_single_point_is_a_geometry_error() {
        let mut c = Connection::new(ConnectionId(0), LayerId(0), LayerId(1));
        let result = c.set_path(
            &pts(&[(50.0, 50.0), (50.0, 50.0)]),
            endpoint(0, 50.0, 50.0, Direction::Bottom),
            endpoint(1, 50.0, 50.0, Direction::Top),
        );
        assert!(matches!(result, Err(RoutingError::Geometry { .. })));
    }

    #[test]
    fn test_drag_middle_line_moves_both_corners() {
        let (a, b) = layers();
        let mut c = three_lines();
        let middle = line_at(&c, 1);
        let report = c
            .drag_line(
                middle,
                Point::new(0.0, 150.0),
                EndLayers { source: &a, target: &b },
                &RouterConfig::default(),
            )
            .unwrap();

        assert_eq!(report.moved.len(), 2);
        assert_eq!(
            coords(&c),
            vec![(50.0, 50.0), (50.0, 150.0), (300.0, 150.0), (300.0, 290.0)]
        );
    }

    #[test]
    fn test_drag_endpoint_moves_two_points() {
        let (a, b) = layers();
        let mut c = three_lines();
        let report = c
            .drag_endpoint(
                End::Source,
                70.0,
                EndLayers { source: &a, target: &b },
                &RouterConfig::default(),
            )
            .unwrap();

        assert_eq!(report.moved.len(), 2);
        assert_eq!(report.flipped, None);
        assert_eq!(c.endpoint(End::Source).unwrap().position, Point::new(70.0, 50.0));
        assert_eq!(
            coords(&c),
            vec![(70.0, 50.0), (70.0, 125.0), (300.0, 125.0), (300.0, 290.0)]
        );
    }

    #[test]
    fn test_endpoint_flips_past_corner() {
        let (a, b) = layers();
        let mut c = three_lines();
        let report = c
            .drag_endpoint(
                End::Source,
                -10.0,
                EndLayers { source: &a, target: &b },
                &RouterConfig::default(),
            )
            .unwrap();

        assert_eq!(report.flipped, Some(End::Source));
        let endpoint = c.endpoint(End::Source).unwrap();
        assert_eq!(endpoint.direction, Direction::Left);
        assert_eq!(endpoint.position, Point::new(0.0, 45.0));
        // the path is left for the caller to reroute
        assert_eq!(coords(&c)[0], (50.0, 50.0));
    }

    #[test]
    fn test_dragging_first_line_slides_endpoint() {
        let (a, b) = layers();
        let mut c = three_lines();
        let first = line_at(&c, 0);
        c.drag_line(
            first,
            Point::new(30.0, 0.0),
            EndLayers { source: &a, target: &b },
            &RouterConfig::default(),
        )
        .unwrap();

        assert_eq!(c.endpoint(End::Source).unwrap().position, Point::new(30.0, 50.0));
        assert_eq!(coords(&c)[..2], [(30.0, 50.0), (30.0, 125.0)]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_pinned_end_grows_corner() {
        let (a, b) = layers();
        let mut c = four_lines();
        let first = line_at(&c, 0);
        let report = c
            .drag_line(
                first,
                Point::new(0.0, 120.0),
                EndLayers { source: &a, target: &b },
                &RouterConfig::default(),
            )
            .unwrap();

        assert_eq!(report.inserted.len(), 1);
        assert_eq!(
            coords(&c),
            vec![
                (50.0, 95.0),
                (50.0, 120.0),
                (150.0, 120.0),
                (150.0, 150.0),
                (300.0, 150.0),
                (300.0, 245.0)
            ]
        );
        assert_eq!(c.line_count(), 5);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_pinned_end_ignores_short_or_backward_drag() {
        let (a, b) = layers();
        let layers = EndLayers { source: &a, target: &b };
        let config = RouterConfig::default();
        let mut c = four_lines();
        let first = line_at(&c, 0);

        let short = c.drag_line(first, Point::new(0.0, 100.0), layers, &config).unwrap();
        assert!(short.is_empty());
        let backward = c.drag_line(first, Point::new(0.0, 70.0), layers, &config).unwrap();
        assert!(backward.is_empty());
        assert_eq!(c.line_count(), 4);
    }

    #[test]
    fn test_interior_collapse_removes_two_points() {
        let (a, b) = layers();
        let mut c = four_lines();
        let third = line_at(&c, 2);
        let report = c
            .drag_line(
                third,
                Point::new(0.0, 97.0),
                EndLayers { source: &a, target: &b },
                &RouterConfig::default(),
            )
            .unwrap();

        assert_eq!(report.collapses.len(), 1);
        assert_eq!(c.positions().len(), 3);
        assert_eq!(c.line_count(), 2);
        assert_eq!(coords(&c), vec![(50.0, 97.0), (300.0, 97.0), (300.0, 245.0)]);

        let merged = report.collapses[0].merged;
        assert_eq!(report.remap(third), merged);
        assert!(c.line(merged).is_some());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_collapse_next_to_source_removes_one_point() {
        let (a, b) = layers();
        let mut c = four_lines();
        let second = line_at(&c, 1);
        let report = c
            .drag_line(
                second,
                Point::new(51.0, 0.0),
                EndLayers { source: &a, target: &b },
                &RouterConfig::default(),
            )
            .unwrap();

        assert_eq!(report.collapses.len(), 1);
        assert_eq!(c.positions().len(), 4);
        assert_eq!(c.line_count(), 3);
        assert_eq!(coords(&c)[..2], [(51.0, 95.0), (51.0, 150.0)]);
        assert_eq!(c.endpoint(End::Source).unwrap().position, Point::new(51.0, 50.0));
        assert_eq!(report.remap(second), report.collapses[0].merged);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_is_clockwise() {
        let c = three_lines();
        let (l1, l2, l3) = (line_at(&c, 0), line_at(&c, 1), line_at(&c, 2));
        // down then right turns left on screen
        assert!(!c.is_clockwise(l1, l2).unwrap());
        assert!(c.is_clockwise(l2, l3).unwrap());
        assert!(matches!(
            c.is_clockwise(l1, l3),
            Err(RoutingError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_out_of_bounds_sides() {
        let (a, _) = layers();
        let e = endpoint(0, 120.0, 0.0, Direction::Top);
        assert_eq!(
            e.out_of_bounds(&a, 5.0),
            Some(Anchor::new(Point::new(100.0, 5.0), Direction::Right))
        );
        let e = endpoint(0, 0.0, -1.0, Direction::Left);
        assert_eq!(
            e.out_of_bounds(&a, 5.0),
            Some(Anchor::new(Point::new(5.0, 0.0), Direction::Top))
        );
        let e = endpoint(0, 100.0, 25.0, Direction::Right);
        assert_eq!(e.out_of_bounds(&a, 5.0), None);
    }

    #[test]
    fn test_clear_makes_unrouted() {
        let mut c = three_lines();
        assert!(c.is_routed());
        c.clear();
        assert!(!c.is_routed());
        assert_eq!(c.line_count(), 0);
        assert!(c.endpoint(End::Source).is_none());
    }

    fn move_message(to: PointId, delta: f64) -> Message {
        Message {
            to: Node::Point(to),
            from: Node::Point(to),
            change: PositionChange {
                axis: Orientation::Vertical,
                delta,
            },
        }
    }

    #[test]
    fn test_cascade_rejects_conflicting_updates() {
        let (a, b) = layers();
        let mut c = three_lines();
        let corner = c.point_order[1];
        let mut report = DragReport::default();

        let result = c.cascade(
            vec![move_message(corner, 10.0), move_message(corner, 20.0)],
            HashSet::new(),
            EndLayers { source: &a, target: &b },
            &RouterConfig::default(),
            &mut report,
        );
        assert!(matches!(
            result,
            Err(RoutingError::InvariantViolation { connection: 0, .. })
        ));
    }

    #[test]
    fn test_cascade_skips_repeated_update() {
        let (a, b) = layers();
        let mut c = three_lines();
        let corner = c.point_order[1];
        let mut report = DragReport::default();

        c.cascade(
            vec![move_message(corner, 10.0), move_message(corner, 10.0)],
            HashSet::new(),
            EndLayers { source: &a, target: &b },
            &RouterConfig::default(),
            &mut report,
        )
        .unwrap();
        assert_eq!(report.moved.iter().filter(|&&id| id == corner).count(), 1);
        assert_eq!(c.point(corner).unwrap().position, Point::new(50.0, 135.0));
    }
}
