//! The display extension boundary.
//!
//! vdisplay never talks to the display server directly from the use cases.
//! Instead they call a [`DisplayExtension`]: a narrow capability offering a
//! snapshot query plus four mutating calls.  The production implementation
//! shells out to `xrandr`; tests use an in-memory fake or a `mockall` mock.
//!
//! # Source of truth
//!
//! The live display server state is the only source of truth.  Callers
//! re-query with [`DisplayExtension::query`] before each decision instead of
//! keeping their own copy, because another invocation may have changed the
//! configuration in between.
//!
//! # Mutations as data
//!
//! Every mutating call has a [`Mutation`] counterpart that knows how to apply
//! itself to a [`DisplayState`] snapshot, including the rejections the real
//! server would produce.  The dry-run decorator and the in-memory fake both
//! build on it, so they agree with each other on what succeeds.

use std::fmt;

use thiserror::Error;
use vdisplay_core::{ModeRecord, Modeline, Orientation, Position, Region};

/// Error type for calls across the display extension boundary.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The extension program could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The display server refused the request.
    #[error("'{command}' was rejected: {reason}")]
    Rejected { command: String, reason: String },

    /// The query output could not be understood.
    #[error("could not parse display state: {0}")]
    Parse(String),
}

/// One output as reported by the display server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    /// System name, e.g. `eDP1` or `VIRTUAL2`.
    pub name: String,
    pub connected: bool,
    /// On-screen rectangle when the output is active (already rotated).
    pub geometry: Option<Region>,
    pub rotation: Orientation,
    /// Names of the modes attached to this output.
    pub modes: Vec<String>,
    /// Mode currently driving the output, if active.
    pub current_mode: Option<String>,
}

impl OutputInfo {
    /// A disconnected, inactive output with no modes.
    pub fn idle(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            geometry: None,
            rotation: Orientation::Normal,
            modes: Vec::new(),
            current_mode: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.geometry.is_some()
    }
}

/// A point-in-time snapshot of the display configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub outputs: Vec<OutputInfo>,
    /// Every mode name the server knows, attached to an output or not.
    pub modes: Vec<String>,
}

impl DisplayState {
    pub fn output(&self, name: &str) -> Option<&OutputInfo> {
        self.outputs.iter().find(|o| o.name == name)
    }

    fn output_mut(&mut self, name: &str) -> Option<&mut OutputInfo> {
        self.outputs.iter_mut().find(|o| o.name == name)
    }

    pub fn has_mode(&self, name: &str) -> bool {
        self.modes.iter().any(|m| m == name)
    }

    /// Returns `true` if some active output is currently driven by `mode`.
    pub fn mode_in_use(&self, mode: &str) -> bool {
        self.outputs
            .iter()
            .any(|o| o.is_active() && o.current_mode.as_deref() == Some(mode))
    }
}

/// A state-changing request to the display server.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateMode { mode: ModeRecord, timings: Modeline },
    RemoveMode { name: String },
    SetOutput {
        output: String,
        mode: ModeRecord,
        rotation: Orientation,
        position: Position,
    },
    ClearOutput { output: String },
}

impl Mutation {
    /// Applies this mutation to `state` the way the display server would.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::Rejected`] for duplicate or unknown modes,
    /// unknown outputs, and removal of a mode that is still in use.
    pub fn apply(&self, state: &mut DisplayState) -> Result<(), ExtensionError> {
        let reject = |reason: &str| ExtensionError::Rejected {
            command: self.to_string(),
            reason: reason.to_string(),
        };

        match self {
            Mutation::CreateMode { mode, .. } => {
                if state.has_mode(&mode.name) {
                    return Err(reject("mode already exists"));
                }
                state.modes.push(mode.name.clone());
            }
            Mutation::RemoveMode { name } => {
                if !state.has_mode(name) {
                    return Err(reject("no such mode"));
                }
                if state.mode_in_use(name) {
                    return Err(reject("mode is in use"));
                }
                state.modes.retain(|m| m != name);
                for output in &mut state.outputs {
                    output.modes.retain(|m| m != name);
                }
            }
            Mutation::SetOutput {
                output,
                mode,
                rotation,
                position,
            } => {
                if !state.has_mode(&mode.name) {
                    return Err(reject("no such mode"));
                }
                let info = state.output_mut(output).ok_or_else(|| reject("no such output"))?;
                if !info.modes.contains(&mode.name) {
                    info.modes.push(mode.name.clone());
                }
                let (width, height) = rotation.apply(mode.width, mode.height);
                info.geometry = Some(Region {
                    x: position.x,
                    y: position.y,
                    width,
                    height,
                });
                info.rotation = *rotation;
                info.current_mode = Some(mode.name.clone());
                info.connected = true;
            }
            Mutation::ClearOutput { output } => {
                let info = state.output_mut(output).ok_or_else(|| reject("no such output"))?;
                info.geometry = None;
                info.rotation = Orientation::Normal;
                info.current_mode = None;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::CreateMode { mode, timings } => {
                write!(f, "create mode {mode} ({timings})")
            }
            Mutation::RemoveMode { name } => write!(f, "remove mode {name}"),
            Mutation::SetOutput {
                output,
                mode,
                rotation,
                position,
            } => write!(
                f,
                "set {output} to mode {mode}, rotation {rotation}, position {position}"
            ),
            Mutation::ClearOutput { output } => write!(f, "turn off {output}"),
        }
    }
}

/// Capability offered by the display server's output-configuration extension.
///
/// All calls are blocking with no timeout and no retry; a failure is
/// reported immediately as an [`ExtensionError`].
#[cfg_attr(test, mockall::automock)]
pub trait DisplayExtension: Send + Sync {
    /// Returns the current outputs and known modes.
    fn query(&self) -> Result<DisplayState, ExtensionError>;

    /// Registers a new named mode with the given timings.
    fn create_mode(&self, mode: &ModeRecord, timings: &Modeline) -> Result<(), ExtensionError>;

    /// Detaches a mode from every output and deletes it.
    fn remove_mode(&self, name: &str) -> Result<(), ExtensionError>;

    /// Drives `output` with `mode`, rotated and positioned as given.
    fn set_output(
        &self,
        output: &str,
        mode: &ModeRecord,
        rotation: Orientation,
        position: Position,
    ) -> Result<(), ExtensionError>;

    /// Turns `output` off.
    fn clear_output(&self, output: &str) -> Result<(), ExtensionError>;
}
