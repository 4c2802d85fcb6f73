//! Placement of an output in the shared screen space.
//!
//! Turns a [`Placement`] request into a concrete [`Position`] using the
//! display state the caller just queried.  Physical outputs count as
//! occupants too, so auto-placement never lands a virtual output on top of a
//! real monitor.
//!
//! Overlap is not an error: explicit and relative placements that overlap
//! another output are applied as asked, with a warning.

use thiserror::Error;
use tracing::{debug, warn};
use vdisplay_core::{
    auto_position, first_overlap, relative_position, Direction, LayoutError, Occupant,
    OccupantKey, Position, Region,
};

use crate::application::extension::DisplayState;
use crate::application::output_pool::PoolSettings;

/// Error type for placement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The reference names no known output.
    #[error("reference output '{0}' not found")]
    ReferenceNotFound(String),

    /// The reference exists but is not active, so it has no position.
    #[error("reference output '{0}' is not active")]
    ReferenceInactive(String),

    /// An output cannot be placed relative to itself.
    #[error("{0} cannot be placed relative to itself")]
    SelfReference(String),
}

/// How the caller wants the output placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// At a fixed `XxY`.
    Absolute(Position),
    /// Next to another output.  The reference is a system output name or a
    /// bare slot number.
    Relative { direction: Direction, reference: String },
    /// Right of the rightmost active output.
    Auto,
    /// At the origin, with auto-placement switched off.
    Disabled,
}

/// Computes where `output` (of on-screen size `width`×`height`) goes.
///
/// `output` itself is ignored as an occupant, so a slot being changed does
/// not collide with its own current rectangle.
///
/// # Errors
///
/// - [`PlaceError::Layout`] when the result would be off-screen.
/// - [`PlaceError::ReferenceNotFound`], [`PlaceError::ReferenceInactive`]
///   or [`PlaceError::SelfReference`] for a bad relative reference.
pub fn compute_position(
    state: &DisplayState,
    settings: &PoolSettings,
    output: &str,
    placement: &Placement,
    width: u32,
    height: u32,
) -> Result<Position, PlaceError> {
    let occupants = occupants(state, settings, output);

    let position = match placement {
        Placement::Absolute(position) => *position,
        Placement::Disabled => Position::ORIGIN,
        Placement::Auto => auto_position(&occupants)?,
        Placement::Relative {
            direction,
            reference,
        } => {
            let region = reference_region(state, settings, output, reference)?;
            relative_position(*direction, &region, width, height)?
        }
    };

    let candidate = Region {
        x: position.x,
        y: position.y,
        width,
        height,
    };
    if let Some(other) = first_overlap(&candidate, &occupants) {
        warn!(
            output,
            overlaps = %describe(&other.key, settings),
            region = %candidate,
            "output overlaps another active output"
        );
    }
    debug!(output, ?placement, %position, "placement computed");
    Ok(position)
}

/// Every active output except `exclude`, keyed for tie-breaking.
fn occupants(state: &DisplayState, settings: &PoolSettings, exclude: &str) -> Vec<Occupant> {
    state
        .outputs
        .iter()
        .filter(|o| o.name != exclude)
        .filter_map(|o| {
            let region = o.geometry?;
            let key = match settings.slot_for_output(&o.name) {
                Some(id) => OccupantKey::Slot(id.get()),
                None => OccupantKey::Physical(o.name.clone()),
            };
            Some(Occupant { key, region })
        })
        .collect()
}

/// Resolves a relative-placement reference to its on-screen rectangle.
fn reference_region(
    state: &DisplayState,
    settings: &PoolSettings,
    output: &str,
    reference: &str,
) -> Result<Region, PlaceError> {
    let name = if state.output(reference).is_some() {
        reference.to_string()
    } else if !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}{reference}", settings.output_prefix)
    } else {
        return Err(PlaceError::ReferenceNotFound(reference.to_string()));
    };

    if name == output {
        return Err(PlaceError::SelfReference(output.to_string()));
    }
    let info = state
        .output(&name)
        .ok_or_else(|| PlaceError::ReferenceNotFound(reference.to_string()))?;
    info.geometry
        .ok_or_else(|| PlaceError::ReferenceInactive(info.name.clone()))
}

fn describe(key: &OccupantKey, settings: &PoolSettings) -> String {
    match key {
        OccupantKey::Slot(n) => format!("{}{n}", settings.output_prefix),
        OccupantKey::Physical(name) => name.clone(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
