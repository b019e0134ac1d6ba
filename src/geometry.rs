use serde::Serialize;
use std::fmt;
use std::ops::{Add, Sub};

/// A world tile position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn checked_offset(self, offset: Offset) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(offset.dx)?,
            y: self.y.checked_add(offset.dy)?,
        })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Translation between two points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const ZERO: Self = Self { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

impl Add<Offset> for Point {
    type Output = Point;

    fn add(self, rhs: Offset) -> Point {
        Point {
            x: self.x.wrapping_add(rhs.dx),
            y: self.y.wrapping_add(rhs.dy),
        }
    }
}

impl Sub<Offset> for Point {
    type Output = Point;

    fn sub(self, rhs: Offset) -> Point {
        Point {
            x: self.x.wrapping_sub(rhs.dx),
            y: self.y.wrapping_sub(rhs.dy),
        }
    }
}

impl Sub<Point> for Point {
    type Output = Offset;

    fn sub(self, rhs: Point) -> Offset {
        Offset {
            dx: self.x.wrapping_sub(rhs.x),
            dy: self.y.wrapping_sub(rhs.y),
        }
    }
}

/// Inclusive 2D tile rectangle: both `min` and `max` belong to the region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Normalizes two arbitrary corners into `(minX, minY)-(maxX, maxY)`.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Rectangle of `width × height` cells starting at `origin`.
    ///
    /// Returns `None` for an empty size or when the far corner overflows `i32`.
    pub fn from_origin_size(origin: Point, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = i64::from(origin.x) + i64::from(width) - 1;
        let max_y = i64::from(origin.y) + i64::from(height) - 1;
        Some(Self {
            min: origin,
            max: Point::new(i32::try_from(max_x).ok()?, i32::try_from(max_y).ok()?),
        })
    }

    /// Column count, saturating at `u32::MAX` for a full `i32` span.
    pub fn width(&self) -> u32 {
        u32::try_from(self.span_x()).unwrap_or(u32::MAX)
    }

    pub fn height(&self) -> u32 {
        u32::try_from(self.span_y()).unwrap_or(u32::MAX)
    }

    pub fn cell_count(&self) -> u64 {
        self.span_x() * self.span_y()
    }

    fn span_x(&self) -> u64 {
        (i64::from(self.max.x) - i64::from(self.min.x) + 1) as u64
    }

    fn span_y(&self) -> u64 {
        (i64::from(self.max.y) - i64::from(self.min.y) + 1) as u64
    }

    pub fn contains(&self, pos: Point) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let min = Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        (min.x <= max.x && min.y <= max.y).then_some(Rect { min, max })
    }

    pub fn translate(&self, offset: Offset) -> Rect {
        Rect {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Column-major walk: outer loop x, inner loop y.
    pub fn positions(&self) -> impl Iterator<Item = Point> {
        let Rect { min, max } = *self;
        (min.x..=max.x).flat_map(move |x| (min.y..=max.y).map(move |y| Point::new(x, y)))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.min, self.max)
    }
}
