//! Dry-run decorator.
//!
//! Wraps another [`DisplayExtension`]: queries go to the real server, while
//! mutating calls are only checked and recorded.  Each recorded mutation is
//! replayed onto later query results, so a multi-step command such as
//! `--off-all --purge-modes` sees the state its earlier steps would have
//! produced.  The recorded plan is printed by the binary afterwards.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;
use vdisplay_core::{ModeRecord, Modeline, Orientation, Position};

use crate::application::extension::{DisplayExtension, DisplayState, ExtensionError, Mutation};

/// Records mutations instead of performing them.
pub struct DryRunExtension<'a> {
    inner: &'a dyn DisplayExtension,
    planned: Mutex<Vec<Mutation>>,
}

impl<'a> DryRunExtension<'a> {
    pub fn new(inner: &'a dyn DisplayExtension) -> Self {
        Self {
            inner,
            planned: Mutex::new(Vec::new()),
        }
    }

    /// The mutations that would have been sent, oldest first.
    pub fn planned(&self) -> Vec<Mutation> {
        self.lock().clone()
    }

    /// The plan so far, ready to print.
    pub fn report(&self) -> DryRunPlan {
        DryRunPlan(self.planned())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Mutation>> {
        self.planned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks `mutation` against the projected state and records it.
    fn plan(&self, mutation: Mutation) -> Result<(), ExtensionError> {
        let mut state = self.query()?;
        mutation.apply(&mut state)?;
        info!(action = %mutation, "dry run: not applied");
        self.lock().push(mutation);
        Ok(())
    }
}

/// Mutations a dry run would have sent, one `dry run: would ...` line each.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunPlan(pub Vec<Mutation>);

impl fmt::Display for DryRunPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "dry run: no changes");
        }
        for (i, mutation) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "dry run: would {mutation}")?;
        }
        Ok(())
    }
}

impl DisplayExtension for DryRunExtension<'_> {
    fn query(&self) -> Result<DisplayState, ExtensionError> {
        let mut state = self.inner.query()?;
        for mutation in self.lock().iter() {
            mutation.apply(&mut state)?;
        }
        Ok(state)
    }

    fn create_mode(&self, mode: &ModeRecord, timings: &Modeline) -> Result<(), ExtensionError> {
        self.plan(Mutation::CreateMode {
            mode: mode.clone(),
            timings: *timings,
        })
    }

    fn remove_mode(&self, name: &str) -> Result<(), ExtensionError> {
        self.plan(Mutation::RemoveMode {
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
        self.plan(Mutation::SetOutput {
            output: output.to_string(),
            mode: mode.clone(),
            rotation,
            position,
        })
    }

    fn clear_output(&self, output: &str) -> Result<(), ExtensionError> {
        self.plan(Mutation::ClearOutput {
            output: output.to_string(),
        })
    }
}
