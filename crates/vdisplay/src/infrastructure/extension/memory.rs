//! In-memory display server for tests and demos.
//!
//! `InMemoryExtension` keeps a [`DisplayState`] behind a `Mutex` and applies
//! each mutating call to it with [`Mutation::apply`], so it rejects the same
//! requests a real server would (duplicate modes, removing a mode in use,
//! unknown outputs).  Every applied mutation is recorded in order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every mutating call fail without touching
//! the state.  Queries keep working, which lets tests check that a failed
//! call leaves the display exactly as it was.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use vdisplay_core::{ModeRecord, Modeline, Orientation, Position, Region};

use crate::application::extension::{
    DisplayExtension, DisplayState, ExtensionError, Mutation, OutputInfo,
};

/// A simulated display server.
#[derive(Default)]
pub struct InMemoryExtension {
    state: Mutex<DisplayState>,
    /// Mutations applied so far, oldest first.
    pub applied: Mutex<Vec<Mutation>>,
    /// Number of `query` calls served.
    pub queries: AtomicUsize,
    /// When `true`, every mutating call returns [`ExtensionError::Rejected`].
    pub should_fail: bool,
}

impl InMemoryExtension {
    /// A server exposing `count` idle virtual outputs named `<prefix>1..`.
    pub fn with_virtual_outputs(prefix: &str, count: u32) -> Self {
        let outputs = (1..=count)
            .map(|i| OutputInfo::idle(format!("{prefix}{i}")))
            .collect();
        Self {
            state: Mutex::new(DisplayState {
                outputs,
                modes: Vec::new(),
            }),
            ..Self::default()
        }
    }

    /// Adds a connected physical output driven by its native `WxH` mode.
    pub fn with_physical(self, name: &str, region: Region) -> Self {
        {
            let mut state = self.lock_state();
            let mode = format!("{}x{}", region.width, region.height);
            if !state.modes.contains(&mode) {
                state.modes.push(mode.clone());
            }
            state.outputs.insert(
                0,
                OutputInfo {
                    name: name.to_string(),
                    connected: true,
                    geometry: Some(region),
                    rotation: Orientation::Normal,
                    modes: vec![mode.clone()],
                    current_mode: Some(mode),
                },
            );
        }
        self
    }

    /// Makes every mutating call fail from now on.
    pub fn failing(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> DisplayState {
        self.lock_state().clone()
    }

    /// A copy of the mutations applied so far.
    pub fn applied(&self) -> Vec<Mutation> {
        lock(&self.applied).clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, DisplayState> {
        lock(&self.state)
    }

    fn mutate(&self, mutation: Mutation) -> Result<(), ExtensionError> {
        if self.should_fail {
            return Err(ExtensionError::Rejected {
                command: mutation.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        let mut state = self.lock_state();
        mutation.apply(&mut state)?;
        lock(&self.applied).push(mutation);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DisplayExtension for InMemoryExtension {
    fn query(&self) -> Result<DisplayState, ExtensionError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.snapshot())
    }

    fn create_mode(&self, mode: &ModeRecord, timings: &Modeline) -> Result<(), ExtensionError> {
        self.mutate(Mutation::CreateMode {
            mode: mode.clone(),
            timings: *timings,
        })
    }

    fn remove_mode(&self, name: &str) -> Result<(), ExtensionError> {
        self.mutate(Mutation::RemoveMode {
            name: name.to_string(),
        })
    }

    fn set_output(
        &self,
        output: &str,
        mode: &ModeRecord,
        rotation: Orientation,
        position: Position,
    ) -> Result<(), ExtensionError> {
        self.mutate(Mutation::SetOutput {
            output: output.to_string(),
            mode: mode.clone(),
            rotation,
            position,
        })
    }

    fn clear_output(&self, output: &str) -> Result<(), ExtensionError> {
        self.mutate(Mutation::ClearOutput {
            output: output.to_string(),
        })
    }
}
