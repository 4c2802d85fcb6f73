//! # vdisplay-core
//!
//! Domain entities for vdisplay: the resolution catalog, orientation
//! resolver, display mode records, virtual output slots, and the layout
//! geometry used to place outputs in the shared screen space.
//!
//! This crate has zero dependencies on the windowing system, the command
//! line, or the file system.  Everything here is pure data and pure
//! functions, so it can be tested on any machine without a display.
//!
//! # Architecture overview
//!
//! vdisplay turns on, resizes, moves, rotates and turns off "virtual"
//! outputs (simulated monitors) that the display server exposes as a fixed
//! pool (`VIRTUAL1`, `VIRTUAL2`, ...).  This crate defines:
//!
//! - **`resolution`** – the predefined size table plus `WxH` parsing.
//! - **`orientation`** – the tagged rotation enum and its alias table.
//! - **`mode`** – deterministic mode naming and CVT timing generation.
//! - **`slot`** – slot identity and lifecycle state.
//! - **`layout`** – bounding boxes and the placement algorithm.

pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `vdisplay_core::Region` instead of `vdisplay_core::domain::layout::Region`.
pub use domain::layout::{
    auto_position, first_overlap, relative_position, Direction, LayoutError, Occupant,
    OccupantKey, Position, Region,
};
pub use domain::mode::{mode_name, ModeOrigin, ModeRecord, Modeline};
pub use domain::orientation::{Orientation, OrientationError};
pub use domain::resolution::{parse_dimensions, CatalogError, ResolutionSpec, CATALOG, MAX_DIMENSION};
pub use domain::slot::{ActiveOutput, SlotError, SlotId, SlotState, VirtualOutputSlot};
