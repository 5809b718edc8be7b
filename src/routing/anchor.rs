//! Anchor resolution on layer boundaries
//!
//! An anchor is the point where a connection leaves a layer, together with
//! the side it leaves through. For two layers whose centers are not vertically
//! aligned, the line through both centers is intersected with every edge of
//! each layer, and each side picks the hit nearest to the other layer's center.

use super::config::RouterConfig;
use super::error::RoutingError;
use super::types::{round_to_scale, Direction, Layer, Point};

/// A point on a layer boundary plus the side it sits on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Point,
    pub direction: Direction,
}

impl Anchor {
    pub fn new(position: Point, direction: Direction) -> Self {
        Self {
            position,
            direction,
        }
    }

    /// Snap the coordinate running along the anchor's edge to the grid
    pub fn snapped(self, scale: f64) -> Self {
        let position = match self.direction {
            Direction::Top | Direction::Bottom => {
                Point::new(round_to_scale(self.position.x, scale), self.position.y)
            }
            Direction::Left | Direction::Right => {
                Point::new(self.position.x, round_to_scale(self.position.y, scale))
            }
        };
        Self { position, ..self }
    }
}

/// A non-vertical line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFunction {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFunction {
    /// A horizontal line at height `y`
    pub fn horizontal(y: f64) -> Self {
        Self {
            slope: 0.0,
            intercept: y,
        }
    }

    /// The line through two points with different x coordinates
    pub fn through(a: Point, b: Point) -> Result<Self, RoutingError> {
        if a.x == b.x {
            return Err(RoutingError::geometry(format!(
                "no linear function through ({a}) and ({b}): x coordinates are equal"
            )));
        }
        let slope = (b.y - a.y) / (b.x - a.x);
        Ok(Self {
            slope,
            intercept: a.y - slope * a.x,
        })
    }

    /// Value of the function at `x`
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Intersection with another line; `None` when parallel or identical
    pub fn intersect(&self, other: &LinearFunction) -> Option<Point> {
        if self.slope == other.slope {
            return None;
        }
        let x = (other.intercept - self.intercept) / (self.slope - other.slope);
        Some(Point::new(x, self.at(x)))
    }
}

/// Intersections of `function` with the four edges of `layer`
///
/// Only hits inside an edge's span are kept, in TOP, RIGHT, BOTTOM, LEFT order.
pub fn boundary_intersections(layer: &Layer, function: &LinearFunction) -> Vec<Anchor> {
    let mut hits = Vec::with_capacity(4);
    let within_x = |x: f64| x >= layer.left() && x <= layer.right();
    let within_y = |y: f64| y >= layer.top() && y <= layer.bottom();

    if let Some(p) = function.intersect(&LinearFunction::horizontal(layer.top())) {
        if within_x(p.x) {
            hits.push(Anchor::new(p, Direction::Top));
        }
    }
    let right = Point::new(layer.right(), function.at(layer.right()));
    if within_y(right.y) {
        hits.push(Anchor::new(right, Direction::Right));
    }
    if let Some(p) = function.intersect(&LinearFunction::horizontal(layer.bottom())) {
        if within_x(p.x) {
            hits.push(Anchor::new(p, Direction::Bottom));
        }
    }
    let left = Point::new(layer.left(), function.at(layer.left()));
    if within_y(left.y) {
        hits.push(Anchor::new(left, Direction::Left));
    }
    hits
}

/// The candidate closest to `reference`; the first one wins ties
pub fn closest_point_to(candidates: &[Anchor], reference: Point) -> Option<Anchor> {
    candidates.iter().copied().fold(None, |best, candidate| match best {
        Some(b) if b.position.distance(reference) <= candidate.position.distance(reference) => {
            Some(b)
        }
        _ => Some(candidate),
    })
}

/// Pick the source and target anchors for a connection between two layers
pub fn resolve_anchors(
    source: &Layer,
    target: &Layer,
    scale: f64,
) -> Result<(Anchor, Anchor), RoutingError> {
    let s_mid = source.middle();
    let t_mid = target.middle();

    if s_mid.x == t_mid.x {
        let (s_dir, t_dir) = if source.bottom() > target.top() {
            (Direction::Bottom, Direction::Top)
        } else if source.top() < target.bottom() {
            (Direction::Top, Direction::Bottom)
        } else {
            return Err(RoutingError::geometry(format!(
                "layers '{}' and '{}' overlap",
                source.name(),
                target.name()
            )));
        };
        let s = Anchor::new(Point::new(s_mid.x, source.side(s_dir)), s_dir);
        let t = Anchor::new(Point::new(t_mid.x, target.side(t_dir)), t_dir);
        return Ok((s.snapped(scale), t.snapped(scale)));
    }

    let function = LinearFunction::through(s_mid, t_mid)?;
    let s = closest_point_to(&boundary_intersections(source, &function), t_mid).ok_or_else(|| {
        RoutingError::geometry(format!("no boundary intersection on '{}'", source.name()))
    })?;
    let t = closest_point_to(&boundary_intersections(target, &function), s_mid).ok_or_else(|| {
        RoutingError::geometry(format!("no boundary intersection on '{}'", target.name()))
    })?;
    Ok((s.snapped(scale), t.snapped(scale)))
}

/// The point a path starts from: the anchor pushed out by the endpoint height
pub fn connection_point(anchor: &Anchor, config: &RouterConfig) -> Point {
    let (dx, dy) = anchor.direction.unit();
    let h = config.endpoint_height();
    Point::new(anchor.position.x + dx * h, anchor.position.y + dy * h)
}
