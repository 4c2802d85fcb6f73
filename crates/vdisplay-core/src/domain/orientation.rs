//! Orientation resolver.
//!
//! Maps a full orientation token (`normal`, `right`, `left`, `inverted`) or
//! its short alias (`L`, `PR`, `PL`, `LF`) to a rotation.  The alias table
//! is the single place new spellings are added.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned for a token that is neither a full name nor an alias.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown orientation '{0}' (expected normal|right|left|inverted or L|PR|PL|LF)")]
pub struct OrientationError(pub String);

/// Rotation applied to an output, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// 0°, landscape.
    #[default]
    Normal,
    /// 90°, portrait rotated right.
    Right,
    /// 270°, portrait rotated left.
    Left,
    /// 180°, landscape flipped.
    Inverted,
}

/// `(full token, alias, orientation)` for every orientation.
const TOKENS: [(&str, &str, Orientation); 4] = [
    ("normal", "L", Orientation::Normal),
    ("right", "PR", Orientation::Right),
    ("left", "PL", Orientation::Left),
    ("inverted", "LF", Orientation::Inverted),
];

impl Orientation {
    /// Resolves a full token or alias.  Matching is exact.
    ///
    /// # Errors
    ///
    /// Returns [`OrientationError`] for any other input; no default is
    /// substituted.
    pub fn resolve(token: &str) -> Result<Self, OrientationError> {
        TOKENS
            .iter()
            .find(|(full, alias, _)| *full == token || *alias == token)
            .map(|(_, _, o)| *o)
            .ok_or_else(|| OrientationError(token.to_string()))
    }

    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            Orientation::Normal => 0,
            Orientation::Right => 90,
            Orientation::Inverted => 180,
            Orientation::Left => 270,
        }
    }

    /// The full token, which is also the word the display server reports.
    pub fn as_str(self) -> &'static str {
        TOKENS
            .iter()
            .find(|(_, _, o)| *o == self)
            .map(|(full, _, _)| *full)
            .unwrap_or("normal")
    }

    /// Whether this rotation swaps the output's width and height on screen.
    pub fn is_portrait(self) -> bool {
        matches!(self, Orientation::Right | Orientation::Left)
    }

    /// Width and height of a `width × height` mode once rotated.
    pub fn apply(self, width: u32, height: u32) -> (u32, u32) {
        if self.is_portrait() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

impl FromStr for Orientation {
    type Err = OrientationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
