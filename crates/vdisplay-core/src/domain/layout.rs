//! Output placement in the shared screen space.
//!
//! Every active output, virtual or physical, occupies a rectangle in one
//! coordinate space whose origin is the top-left corner of the screen.
//! Coordinates are never negative: the display server grows the screen to
//! the right and downwards only.
//!
//! Three placement strategies live here:
//!
//! - **explicit** – an absolute `XxY` parsed by [`Position::parse`].
//! - **relative** – next to a reference rectangle, see [`relative_position`].
//! - **automatic** – to the right of the current rightmost output, see
//!   [`auto_position`].  This is what keeps tiled outputs from overlapping.

use std::fmt;

use thiserror::Error;

use crate::domain::resolution::{parse_dimensions, MAX_DIMENSION};

/// Errors that can occur when computing a placement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// The position argument is not of the form `XxY`.
    #[error("invalid position '{0}': expected XxY with non-negative integers, e.g. 1920x0")]
    PositionFormat(String),

    /// The computed origin falls outside the addressable screen.
    #[error("placement at ({x}, {y}) is outside the screen (coordinates must be 0-{max})", max = MAX_DIMENSION)]
    OffScreen { x: i64, y: i64 },
}

/// Top-left corner of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    /// Parses an `XxY` coordinate such as `1920x0`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::PositionFormat`] for anything that is not two
    /// non-negative integers separated by `x`, and [`LayoutError::OffScreen`]
    /// when a coordinate exceeds [`MAX_DIMENSION`].
    pub fn parse(input: &str) -> Result<Self, LayoutError> {
        let (x, y) =
            parse_dimensions(input).ok_or_else(|| LayoutError::PositionFormat(input.to_string()))?;
        Self::checked(i64::from(x), i64::from(y))
    }

    /// Builds a position, rejecting coordinates outside `0..=MAX_DIMENSION`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::OffScreen`] when either coordinate is out of range.
    pub fn checked(x: i64, y: i64) -> Result<Self, LayoutError> {
        let range = 0..=i64::from(MAX_DIMENSION);
        if !range.contains(&x) || !range.contains(&y) {
            return Err(LayoutError::OffScreen { x, y });
        }
        // Both values are within 0..=32767 after the range check.
        Ok(Self { x: x as i32, y: y as i32 })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// A rectangle in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Returns the rightmost X coordinate (exclusive).
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Returns the bottommost Y coordinate (exclusive).
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Returns `true` if this region overlaps with `other`.
    ///
    /// Regions that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Region) -> bool {
        i64::from(self.x) < other.right()
            && self.right() > i64::from(other.x)
            && i64::from(self.y) < other.bottom()
            && self.bottom() > i64::from(other.y)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Side of a reference output on which the new output is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    RightOf,
    LeftOf,
    Above,
    Below,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::RightOf => "right-of",
            Direction::LeftOf => "left-of",
            Direction::Above => "above",
            Direction::Below => "below",
        })
    }
}

/// Who occupies a region.  Ordering is the auto-placement tie-break:
/// virtual slots by ascending index, then physical outputs by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OccupantKey {
    Slot(u32),
    Physical(String),
}

/// An active output as seen by the placement algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub key: OccupantKey,
    pub region: Region,
}

/// Computes the origin for an output placed next to `reference`.
///
/// `width` and `height` are the new output's on-screen size (already
/// rotated).  The new output is aligned with the reference's top edge for
/// left/right placement and with its left edge for above/below.
///
/// # Errors
///
/// Returns [`LayoutError::OffScreen`] when the result would be negative or
/// beyond the addressable screen, e.g. `left-of` an output at `x = 0`.
pub fn relative_position(
    direction: Direction,
    reference: &Region,
    width: u32,
    height: u32,
) -> Result<Position, LayoutError> {
    let (x, y) = match direction {
        Direction::RightOf => (reference.right(), i64::from(reference.y)),
        Direction::LeftOf => (i64::from(reference.x) - i64::from(width), i64::from(reference.y)),
        Direction::Above => (i64::from(reference.x), i64::from(reference.y) - i64::from(height)),
        Direction::Below => (i64::from(reference.x), reference.bottom()),
    };
    Position::checked(x, y)
}

/// Computes the automatic placement for a new output.
///
/// With nothing active the origin is returned.  Otherwise the new output
/// goes immediately to the right of the occupant with the greatest right
/// edge, aligned with its top.  Because no occupant extends past that edge,
/// the new output cannot overlap any of them.
///
/// # Errors
///
/// Returns [`LayoutError::OffScreen`] when the screen is already full to
/// the right.
pub fn auto_position(occupants: &[Occupant]) -> Result<Position, LayoutError> {
    let rightmost = occupants.iter().max_by(|a, b| {
        a.region
            .right()
            .cmp(&b.region.right())
            // Reverse key order so the smallest key wins a tie.
            .then_with(|| b.key.cmp(&a.key))
    });

    match rightmost {
        None => Ok(Position::ORIGIN),
        Some(o) => Position::checked(o.region.right(), i64::from(o.region.y)),
    }
}

/// Returns the first occupant whose region overlaps `candidate`, if any.
pub fn first_overlap<'a>(candidate: &Region, occupants: &'a [Occupant]) -> Option<&'a Occupant> {
    occupants
        .iter()
        .filter(|o| o.region.overlaps(candidate))
        .min_by(|a, b| a.key.cmp(&b.key))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
