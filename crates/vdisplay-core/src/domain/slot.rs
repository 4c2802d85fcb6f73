//! Virtual output slots.
//!
//! The display server exposes a fixed number of virtual outputs named
//! `<prefix>1`, `<prefix>2`, ...  Each one is a slot: it is never created or
//! destroyed, only switched between `Free` and `Active`.
//!
//! ```text
//!   Free ──activate──► Active ──change──► Active
//!    ▲                    │
//!    └─────deactivate─────┘
//! ```

use std::fmt;

use thiserror::Error;

use crate::domain::layout::{Position, Region};
use crate::domain::mode::ModeRecord;
use crate::domain::orientation::Orientation;

/// Errors for slot identification and lifecycle transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    /// The slot argument is not a positive integer.
    #[error("invalid output '{0}': expected a positive integer")]
    NotANumber(String),

    /// The slot number is outside `1..=pool_size`.
    #[error("output {id} is out of range (valid outputs are 1-{pool_size})")]
    InvalidSlot { id: u32, pool_size: u32 },

    /// Activation was requested for a slot that is already active.
    #[error("{0} is already active; use --change to modify it")]
    AlreadyActive(String),

    /// Change or deactivation was requested for a free slot.
    #[error("{0} is not active")]
    NotActive(String),
}

/// 1-based index of a slot within the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u32);

impl SlotId {
    /// Validates `id` against a pool of `pool_size` slots.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::InvalidSlot`] when `id` is zero or above `pool_size`.
    pub fn new(id: u32, pool_size: u32) -> Result<Self, SlotError> {
        if id == 0 || id > pool_size {
            return Err(SlotError::InvalidSlot { id, pool_size });
        }
        Ok(Self(id))
    }

    /// Parses a command-line slot argument.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::NotANumber`] for non-numeric input and
    /// [`SlotError::InvalidSlot`] for numbers outside the pool.
    pub fn parse(token: &str, pool_size: u32) -> Result<Self, SlotError> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SlotError::NotANumber(token.to_string()));
        }
        // All digits but too large for u32: certainly out of range.
        let id = token.parse::<u32>().unwrap_or(u32::MAX);
        Self::new(id, pool_size)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// System name of this slot's output, e.g. `VIRTUAL3`.
    pub fn output_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration carried by an active slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveOutput {
    pub mode: ModeRecord,
    pub position: Position,
    pub orientation: Orientation,
}

impl ActiveOutput {
    /// Screen-space bounding box, with width and height swapped for portrait.
    pub fn region(&self) -> Region {
        let (width, height) = self.orientation.apply(self.mode.width, self.mode.height);
        Region {
            x: self.position.x,
            y: self.position.y,
            width,
            height,
        }
    }
}

/// Lifecycle state.  The mode, position and orientation exist only while active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Free,
    Active(ActiveOutput),
}

/// One addressable virtual output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualOutputSlot {
    pub id: SlotId,
    /// System name reported by the display server.
    pub name: String,
    pub state: SlotState,
}

impl VirtualOutputSlot {
    /// Creates a free slot.
    pub fn free(id: SlotId, prefix: &str) -> Self {
        Self {
            id,
            name: id.output_name(prefix),
            state: SlotState::Free,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SlotState::Active(_))
    }

    /// The active configuration, if any.
    pub fn active(&self) -> Option<&ActiveOutput> {
        match &self.state {
            SlotState::Active(active) => Some(active),
            SlotState::Free => None,
        }
    }

    pub fn region(&self) -> Option<Region> {
        self.active().map(ActiveOutput::region)
    }
}
