//! Geometric types shared by the routing core

use std::fmt;

use serde::Deserialize;

/// Tolerance for coordinate comparisons
pub const EPSILON: f64 = 1e-9;

/// Stable identifier of a layer within an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub usize);

/// Stable identifier of a connection within an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A 2D point in the root coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Manhattan distance to another point
    pub fn manhattan(&self, other: Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Coordinate along the given axis
    pub fn along(&self, axis: Orientation) -> f64 {
        match axis {
            Orientation::Vertical => self.y,
            _ => self.x,
        }
    }

    /// Shift the point along an axis
    pub fn shifted(self, axis: Orientation, delta: f64) -> Point {
        match axis {
            Orientation::Vertical => Point::new(self.x, self.y + delta),
            _ => Point::new(self.x + delta, self.y),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// An axis-aligned rectangle given by its top-left corner and size
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge x-coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point of the rectangle
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if this rectangle contains a point (edges inclusive)
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(x, y, right - x, bottom - y)
    }

    /// Grow the rectangle by `amount` on every side
    pub fn inflate(&self, amount: f64) -> BoundingBox {
        BoundingBox::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }
}

/// Cardinal side of a layer, also used as travel direction on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Top,
    Right,
    Bottom,
    Left,
}

impl Direction {
    /// All directions in expansion order
    pub const ALL: [Direction; 4] = [
        Direction::Top,
        Direction::Right,
        Direction::Bottom,
        Direction::Left,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Top => Direction::Bottom,
            Direction::Right => Direction::Left,
            Direction::Bottom => Direction::Top,
            Direction::Left => Direction::Right,
        }
    }

    /// Unit step `(dx, dy)` in screen coordinates (y grows downwards)
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Top => (0.0, -1.0),
            Direction::Right => (1.0, 0.0),
            Direction::Bottom => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
        }
    }

    /// The axis an endpoint facing this way may slide along
    ///
    /// TOP/BOTTOM endpoints sit on a horizontal edge and slide horizontally.
    pub fn free_axis(self) -> Orientation {
        match self {
            Direction::Top | Direction::Bottom => Orientation::Horizontal,
            Direction::Left | Direction::Right => Orientation::Vertical,
        }
    }

    /// Orientation of a segment travelling in this direction
    pub fn travel_axis(self) -> Orientation {
        match self {
            Direction::Top | Direction::Bottom => Orientation::Vertical,
            Direction::Left | Direction::Right => Orientation::Horizontal,
        }
    }

    /// Whether a movement by `delta` along the travel axis heads this way
    pub fn matches_delta(self, delta: f64) -> bool {
        match self {
            Direction::Top | Direction::Left => delta < 0.0,
            Direction::Bottom | Direction::Right => delta > 0.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Top => "top",
            Direction::Right => "right",
            Direction::Bottom => "bottom",
            Direction::Left => "left",
        };
        f.write_str(name)
    }
}

/// Orientation of a line, or the axis of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Horizontal,
    Vertical,
    /// Neither axis-aligned; an error state for lines
    Lopsided,
}

impl Orientation {
    /// Orientation of the segment between two points
    pub fn between(a: Point, b: Point) -> Orientation {
        if (a.x - b.x).abs() < EPSILON {
            Orientation::Vertical
        } else if (a.y - b.y).abs() < EPSILON {
            Orientation::Horizontal
        } else {
            Orientation::Lopsided
        }
    }

    pub fn perpendicular(self) -> Orientation {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
            Orientation::Lopsided => Orientation::Lopsided,
        }
    }
}

/// Direction of travel from `a` to `b`, if the segment is axis-aligned
pub fn direction_between(a: Point, b: Point) -> Option<Direction> {
    match Orientation::between(a, b) {
        Orientation::Vertical if a.y > b.y => Some(Direction::Top),
        Orientation::Vertical => Some(Direction::Bottom),
        Orientation::Horizontal if a.x > b.x => Some(Direction::Left),
        Orientation::Horizontal => Some(Direction::Right),
        Orientation::Lopsided => None,
    }
}

/// A rectangular diagram element routed around by connections
///
/// `right`, `bottom` and `middle` are cached; every mutation goes through
/// [`Layer::set_geometry`] which refreshes them in one place.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    bounds: BoundingBox,
    right: f64,
    bottom: f64,
    middle: Point,
}

impl Layer {
    pub fn new(name: impl Into<String>, bounds: BoundingBox) -> Self {
        let mut layer = Self {
            name: name.into(),
            bounds,
            right: 0.0,
            bottom: 0.0,
            middle: Point::default(),
        };
        layer.recompute_derived();
        layer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn left(&self) -> f64 {
        self.bounds.x
    }

    pub fn top(&self) -> f64 {
        self.bounds.y
    }

    pub fn width(&self) -> f64 {
        self.bounds.width
    }

    pub fn height(&self) -> f64 {
        self.bounds.height
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn middle(&self) -> Point {
        self.middle
    }

    /// Move the layer, keeping its size
    pub fn set_position(&mut self, x: f64, y: f64) {
        self.set_geometry(BoundingBox::new(x, y, self.bounds.width, self.bounds.height));
    }

    /// Resize the layer, keeping its top-left corner
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.set_geometry(BoundingBox::new(self.bounds.x, self.bounds.y, width, height));
    }

    /// Replace the layer's rectangle
    pub fn set_geometry(&mut self, bounds: BoundingBox) {
        self.bounds = bounds;
        self.recompute_derived();
    }

    /// Refresh the cached edges and center from the current rectangle
    pub fn recompute_derived(&mut self) {
        self.right = self.bounds.right();
        self.bottom = self.bounds.bottom();
        self.middle = self.bounds.center();
    }

    /// Coordinate of the given side along its normal
    pub fn side(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Top => self.top(),
            Direction::Right => self.right(),
            Direction::Bottom => self.bottom(),
            Direction::Left => self.left(),
        }
    }
}

/// Round a coordinate to the nearest grid multiple (ties away from zero)
pub fn round_to_scale(value: f64, scale: f64) -> f64 {
    (value / scale).round() * scale
}

/// Round a coordinate down to a grid multiple
pub fn floor_to_scale(value: f64, scale: f64) -> f64 {
    (value / scale).floor() * scale
}

/// Round a coordinate up to a grid multiple
pub fn ceil_to_scale(value: f64, scale: f64) -> f64 {
    (value / scale).ceil() * scale
}
