//! Domain entities for vdisplay.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies.  Code in the outer crates (the dispatcher, the xrandr
//! adapter, the configuration store) depends on these types, but the domain
//! never depends on them.

/// Bounding boxes and output placement.
pub mod layout;

/// Display mode records and CVT modeline generation.
pub mod mode;

/// Rotation values and their command-line aliases.
pub mod orientation;

/// Predefined resolutions and custom `WxH` parsing.
pub mod resolution;

/// Virtual output slot identity and lifecycle.
pub mod slot;
