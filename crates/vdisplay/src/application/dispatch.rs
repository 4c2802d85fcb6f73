//! Command dispatcher: turns one invocation into one validated command and
//! runs it against the pool, the registry and the layout engine.
//!
//! # Two stages
//!
//! 1. [`Invocation::validate`] is pure.  It checks that exactly one action
//!    was requested, that modifiers belong to that action, and parses every
//!    argument (slot, resolution, orientation, position) into domain types.
//! 2. [`Dispatcher::execute`] queries the display server and performs the
//!    command.  State-dependent checks (slot already active, reference not
//!    found, placement off-screen) all run before the first mutating call.
//!
//! Every failure from either stage that happens before a mutation is a
//! validation error; only [`DispatchError::Extension`] is operational.
//! [`DispatchError::is_validation`] lets the binary pick its exit code.

use std::fmt;

use thiserror::Error;
use tracing::debug;
use vdisplay_core::{
    CatalogError, Direction, LayoutError, Orientation, OrientationError, Position,
    ResolutionSpec, SlotError, SlotId, SlotState, VirtualOutputSlot, CATALOG,
};

use crate::application::extension::{DisplayExtension, ExtensionError};
use crate::application::mode_registry::{ModeRegistry, PurgeResult};
use crate::application::output_pool::{OutputPool, PoolError, PoolSettings};
use crate::application::place_output::{compute_position, PlaceError, Placement};

/// Error type for a whole invocation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no action given (try --help)")]
    NoAction,

    #[error("only one action may be given per invocation, got {}", .0.join(", "))]
    MultipleActions(Vec<&'static str>),

    #[error("{0} can only be used with {1}")]
    OrphanOption(&'static str, &'static str),

    #[error("-r and --size are mutually exclusive")]
    ConflictingResolution,

    #[error("--output requires -r or --size")]
    MissingResolution,

    #[error("only one of --pos, --right-of, --left-of, --above, --below may be given")]
    ConflictingPosition,

    #[error("--change requires at least one of -r, --size, -o, --pos or a relative placement")]
    NothingToChange,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Orientation(#[from] OrientationError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Place(#[from] PlaceError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

impl DispatchError {
    /// `true` for errors raised before any change was made to the display.
    pub fn is_validation(&self) -> bool {
        !matches!(self, DispatchError::Extension(_))
    }
}

impl From<PoolError> for DispatchError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Slot(e) => DispatchError::Slot(e),
            PoolError::Extension(e) => DispatchError::Extension(e),
        }
    }
}

/// Which partition of the pool `--list` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    Active,
    Free,
}

/// Raw arguments of one invocation, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub list: Option<ListFilter>,
    pub list_resolutions: bool,
    pub output: Option<String>,
    pub resolution: Option<String>,
    pub size: Option<String>,
    pub off: Option<String>,
    pub off_all: bool,
    pub change: Option<String>,
    pub orientation: Option<String>,
    pub pos: Option<String>,
    pub right_of: Option<String>,
    pub left_of: Option<String>,
    pub above: Option<String>,
    pub below: Option<String>,
    pub no_auto: bool,
    pub purge_modes: bool,
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(ListFilter),
    ListResolutions,
    Activate {
        slot: SlotId,
        resolution: ResolutionSpec,
        orientation: Orientation,
        placement: Placement,
    },
    Change {
        slot: SlotId,
        resolution: Option<ResolutionSpec>,
        orientation: Option<Orientation>,
        placement: Option<Placement>,
    },
    Deactivate(SlotId),
    DeactivateAll { purge: bool },
    Purge,
}

impl Invocation {
    /// Checks the invocation and parses its arguments.
    ///
    /// # Errors
    ///
    /// Every error returned here is a validation error.
    pub fn validate(&self, settings: &PoolSettings) -> Result<Command, DispatchError> {
        let actions = self.actions();
        match actions.len() {
            0 => return Err(DispatchError::NoAction),
            1 => {}
            _ => return Err(DispatchError::MultipleActions(actions)),
        }

        let configures = self.output.is_some() || self.change.is_some();
        if !configures {
            if let Some(flag) = self.first_modifier() {
                let valid_with = if flag == "--no-auto" {
                    "--output"
                } else {
                    "--output or --change"
                };
                return Err(DispatchError::OrphanOption(flag, valid_with));
            }
        }

        let pool_size = settings.pool_size;
        if let Some(filter) = self.list {
            Ok(Command::List(filter))
        } else if self.list_resolutions {
            Ok(Command::ListResolutions)
        } else if let Some(token) = &self.output {
            let slot = SlotId::parse(token, pool_size)?;
            let resolution = self.parse_resolution()?.ok_or(DispatchError::MissingResolution)?;
            let orientation = self.parse_orientation()?.unwrap_or_default();
            let placement = match self.parse_placement()? {
                Some(placement) => placement,
                None if self.no_auto || !settings.auto_place => Placement::Disabled,
                None => Placement::Auto,
            };
            Ok(Command::Activate {
                slot,
                resolution,
                orientation,
                placement,
            })
        } else if let Some(token) = &self.change {
            if self.no_auto {
                return Err(DispatchError::OrphanOption("--no-auto", "--output"));
            }
            let slot = SlotId::parse(token, pool_size)?;
            let resolution = self.parse_resolution()?;
            let orientation = self.parse_orientation()?;
            let placement = self.parse_placement()?;
            if resolution.is_none() && orientation.is_none() && placement.is_none() {
                return Err(DispatchError::NothingToChange);
            }
            Ok(Command::Change {
                slot,
                resolution,
                orientation,
                placement,
            })
        } else if let Some(token) = &self.off {
            Ok(Command::Deactivate(SlotId::parse(token, pool_size)?))
        } else if self.off_all {
            Ok(Command::DeactivateAll {
                purge: self.purge_modes,
            })
        } else {
            Ok(Command::Purge)
        }
    }

    /// Action flags present.  `--purge-modes` rides along with `--off-all`.
    fn actions(&self) -> Vec<&'static str> {
        let mut actions = Vec::new();
        if self.list.is_some() {
            actions.push("--list");
        }
        if self.list_resolutions {
            actions.push("--list-resolutions");
        }
        if self.output.is_some() {
            actions.push("--output");
        }
        if self.change.is_some() {
            actions.push("--change");
        }
        if self.off.is_some() {
            actions.push("--off");
        }
        if self.off_all {
            actions.push("--off-all");
        }
        if self.purge_modes && !self.off_all {
            actions.push("--purge-modes");
        }
        actions
    }

    fn first_modifier(&self) -> Option<&'static str> {
        [
            (self.resolution.is_some(), "-r"),
            (self.size.is_some(), "--size"),
            (self.orientation.is_some(), "-o"),
            (self.pos.is_some(), "--pos"),
            (self.right_of.is_some(), "--right-of"),
            (self.left_of.is_some(), "--left-of"),
            (self.above.is_some(), "--above"),
            (self.below.is_some(), "--below"),
            (self.no_auto, "--no-auto"),
        ]
        .into_iter()
        .find(|(present, _)| *present)
        .map(|(_, flag)| flag)
    }

    fn parse_resolution(&self) -> Result<Option<ResolutionSpec>, DispatchError> {
        match (&self.resolution, &self.size) {
            (Some(_), Some(_)) => Err(DispatchError::ConflictingResolution),
            (Some(token), None) => Ok(Some(ResolutionSpec::resolve(token)?)),
            (None, Some(size)) => Ok(Some(ResolutionSpec::parse_custom(size)?)),
            (None, None) => Ok(None),
        }
    }

    fn parse_orientation(&self) -> Result<Option<Orientation>, DispatchError> {
        Ok(self.orientation.as_deref().map(Orientation::resolve).transpose()?)
    }

    fn parse_placement(&self) -> Result<Option<Placement>, DispatchError> {
        let relatives = [
            (Direction::RightOf, &self.right_of),
            (Direction::LeftOf, &self.left_of),
            (Direction::Above, &self.above),
            (Direction::Below, &self.below),
        ];
        let mut requested = relatives
            .into_iter()
            .filter_map(|(direction, reference)| {
                reference.as_ref().map(|r| Placement::Relative {
                    direction,
                    reference: r.clone(),
                })
            })
            .collect::<Vec<_>>();
        if let Some(pos) = &self.pos {
            requested.push(Placement::Absolute(Position::parse(pos)?));
        }

        if requested.len() > 1 {
            return Err(DispatchError::ConflictingPosition);
        }
        Ok(requested.pop())
    }
}

/// What an executed command did, rendered for the terminal by `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(Vec<VirtualOutputSlot>),
    Resolutions,
    Activated(VirtualOutputSlot),
    Changed(VirtualOutputSlot),
    Deactivated(String),
    DeactivatedAll {
        outputs: Vec<String>,
        purge: Option<PurgeResult>,
    },
    Purged(PurgeResult),
}

/// Runs validated commands against a display extension.
pub struct Dispatcher<'a> {
    extension: &'a dyn DisplayExtension,
    settings: &'a PoolSettings,
}

impl<'a> Dispatcher<'a> {
    pub fn new(extension: &'a dyn DisplayExtension, settings: &'a PoolSettings) -> Self {
        Self {
            extension,
            settings,
        }
    }

    /// Validates and executes one invocation.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`]; use [`DispatchError::is_validation`] to tell
    /// the two tiers apart.
    pub fn run(&self, invocation: &Invocation) -> Result<Outcome, DispatchError> {
        let command = invocation.validate(self.settings)?;
        debug!(?command, "dispatching");
        self.execute(command)
    }

    /// Executes an already validated command.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`].
    pub fn execute(&self, command: Command) -> Result<Outcome, DispatchError> {
        let mut pool = OutputPool::new(self.extension, self.settings);
        let registry = ModeRegistry::new(self.extension, self.settings);

        match command {
            Command::List(filter) => {
                let slots = match filter {
                    ListFilter::All => pool.list_all()?,
                    ListFilter::Active => pool.list_active()?,
                    ListFilter::Free => pool.list_free()?,
                };
                Ok(Outcome::Listed(slots))
            }
            Command::ListResolutions => Ok(Outcome::Resolutions),
            Command::Activate {
                slot,
                resolution,
                orientation,
                placement,
            } => {
                let state = pool.refresh()?;
                let name = pool.slot(slot).name.clone();
                if pool.slot(slot).is_active() {
                    return Err(SlotError::AlreadyActive(name).into());
                }

                let (width, height) = orientation.apply(resolution.width, resolution.height);
                let position =
                    compute_position(&state, self.settings, &name, &placement, width, height)?;

                let mode = registry.ensure(&resolution)?;
                let created = !state.has_mode(&mode.name);
                match pool.activate(slot, mode.clone(), position, orientation) {
                    Ok(slot) => Ok(Outcome::Activated(slot.clone())),
                    Err(e) => {
                        if created {
                            registry.discard(&mode);
                        }
                        Err(e.into())
                    }
                }
            }
            Command::Change {
                slot,
                resolution,
                orientation,
                placement,
            } => {
                let state = pool.refresh()?;
                let current = pool.slot(slot);
                let active = current
                    .active()
                    .ok_or_else(|| SlotError::NotActive(current.name.clone()))?;

                let position = match &placement {
                    Some(placement) => {
                        let (w, h) = resolution
                            .as_ref()
                            .map_or((active.mode.width, active.mode.height), |r| {
                                (r.width, r.height)
                            });
                        let (width, height) =
                            orientation.unwrap_or(active.orientation).apply(w, h);
                        Some(compute_position(
                            &state,
                            self.settings,
                            &current.name,
                            placement,
                            width,
                            height,
                        )?)
                    }
                    None => None,
                };

                let mode = resolution.map(|r| registry.ensure(&r)).transpose()?;
                let created = mode.as_ref().filter(|m| !state.has_mode(&m.name)).cloned();
                match pool.change(slot, mode, orientation, position) {
                    Ok(slot) => Ok(Outcome::Changed(slot.clone())),
                    Err(e) => {
                        if let Some(mode) = &created {
                            registry.discard(mode);
                        }
                        Err(e.into())
                    }
                }
            }
            Command::Deactivate(slot) => {
                pool.refresh()?;
                let name = pool.deactivate(slot)?.name.clone();
                Ok(Outcome::Deactivated(name))
            }
            Command::DeactivateAll { purge } => {
                pool.refresh()?;
                let outputs = pool.deactivate_all()?;
                let purge = if purge {
                    Some(registry.purge_all()?)
                } else {
                    None
                };
                Ok(Outcome::DeactivatedAll { outputs, purge })
            }
            Command::Purge => Ok(Outcome::Purged(registry.purge_all()?)),
        }
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn write_slot(f: &mut fmt::Formatter<'_>, slot: &VirtualOutputSlot) -> fmt::Result {
    match &slot.state {
        SlotState::Free => write!(f, "{}  free", slot.name),
        SlotState::Active(active) => write!(
            f,
            "{}  active  {}  {}  {}",
            slot.name,
            active.region(),
            active.orientation,
            active.mode
        ),
    }
}

fn write_purge(f: &mut fmt::Formatter<'_>, result: &PurgeResult) -> fmt::Result {
    if result.removed.is_empty() && result.skipped.is_empty() {
        return write!(f, "no modes to remove");
    }
    let lines = result
        .removed
        .iter()
        .map(|m| format!("removed mode {m}"))
        .chain(result.skipped.iter().map(|m| format!("kept mode {m} (in use)")));
    for (i, line) in lines.enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        f.write_str(&line)?;
    }
    Ok(())
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Listed(slots) => {
                for (i, slot) in slots.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write_slot(f, slot)?;
                }
                Ok(())
            }
            Outcome::Resolutions => {
                writeln!(f, "ID  NAME    SIZE")?;
                for (i, entry) in CATALOG.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(
                        f,
                        "{:<3} {:<7} {}x{}",
                        entry.id, entry.name, entry.width, entry.height
                    )?;
                }
                Ok(())
            }
            Outcome::Activated(slot) | Outcome::Changed(slot) => write_slot(f, slot),
            Outcome::Deactivated(name) => write!(f, "{name}  off"),
            Outcome::DeactivatedAll { outputs, purge } => {
                if outputs.is_empty() {
                    write!(f, "no active outputs")?;
                }
                for (i, name) in outputs.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{name}  off")?;
                }
                if let Some(result) = purge {
                    writeln!(f)?;
                    write_purge(f, result)?;
                }
                Ok(())
            }
            Outcome::Purged(result) => write_purge(f, result),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
