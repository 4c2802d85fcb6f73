//! ModeRegistry: the custom display modes vdisplay creates on demand.
//!
//! A mode's name is derived from its size (`vd-1920x1080`), so "is there
//! already a mode for this size?" is a lookup by name against a fresh query.
//! Asking for the same size twice therefore creates exactly one mode, even
//! across separate invocations.
//!
//! Modes the server already provided (`1920x1080`, `1920x1080_60.00`, ...)
//! are intrinsic.  The registry never creates, lists or purges them.

use tracing::{debug, info, warn};
use vdisplay_core::{ModeRecord, Modeline, ResolutionSpec};

use crate::application::extension::{DisplayExtension, ExtensionError};
use crate::application::output_pool::PoolSettings;

/// Outcome of [`ModeRegistry::purge_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeResult {
    /// Modes that were deleted.
    pub removed: Vec<ModeRecord>,
    /// Modes left in place because an active output still uses them.
    pub skipped: Vec<ModeRecord>,
}

/// Creates, lists and purges registry modes.
pub struct ModeRegistry<'a> {
    extension: &'a dyn DisplayExtension,
    settings: &'a PoolSettings,
}

impl<'a> ModeRegistry<'a> {
    pub fn new(extension: &'a dyn DisplayExtension, settings: &'a PoolSettings) -> Self {
        Self {
            extension,
            settings,
        }
    }

    /// Returns the registry mode for `spec`, creating it if the server does
    /// not know it yet.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError`] if the query or the creation fails.  A failed
    /// creation leaves nothing behind.
    pub fn ensure(&self, spec: &ResolutionSpec) -> Result<ModeRecord, ExtensionError> {
        let record = ModeRecord::registry(&self.settings.mode_prefix, spec.width, spec.height);
        let state = self.extension.query()?;
        if state.has_mode(&record.name) {
            debug!(mode = %record, "reusing existing mode");
            return Ok(record);
        }

        let timings = Modeline::cvt(spec.width, spec.height, self.settings.refresh_hz);
        self.extension.create_mode(&record, &timings)?;
        info!(mode = %record, timings = %timings, "mode created");
        Ok(record)
    }

    /// Removes a mode created for an output change that then failed.
    ///
    /// The original failure is what the caller reports, so a failed removal
    /// is only logged.
    pub fn discard(&self, mode: &ModeRecord) {
        match self.extension.remove_mode(&mode.name) {
            Ok(()) => info!(mode = %mode, "unused mode removed"),
            Err(e) => warn!(mode = %mode, error = %e, "could not remove unused mode"),
        }
    }

    /// All registry modes currently known to the server, in server order.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError`] if the query fails.
    pub fn list(&self) -> Result<Vec<ModeRecord>, ExtensionError> {
        let state = self.extension.query()?;
        Ok(state
            .modes
            .iter()
            .filter_map(|name| ModeRecord::classify(&self.settings.mode_prefix, name))
            .filter(ModeRecord::is_registry)
            .collect())
    }

    /// Deletes every registry mode not used by an active output.
    ///
    /// In-use modes are skipped with a warning rather than failing the purge.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError`] from the query or from the first removal the
    /// server rejects.  Modes removed before that point stay removed.
    pub fn purge_all(&self) -> Result<PurgeResult, ExtensionError> {
        let state = self.extension.query()?;
        let mut result = PurgeResult::default();

        let registry_modes = state
            .modes
            .iter()
            .filter_map(|name| ModeRecord::classify(&self.settings.mode_prefix, name))
            .filter(ModeRecord::is_registry);

        for record in registry_modes {
            if state.mode_in_use(&record.name) {
                warn!(mode = %record, "mode is in use by an active output; not removed");
                result.skipped.push(record);
                continue;
            }
            self.extension.remove_mode(&record.name)?;
            info!(mode = %record, "mode removed");
            result.removed.push(record);
        }
        Ok(result)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::extension::{DisplayState, MockDisplayExtension, OutputInfo};
    use vdisplay_core::{Orientation, Region};

    fn fhd() -> ResolutionSpec {
        ResolutionSpec::resolve_by_name("fhd").unwrap()
    }

    fn modes(names: &[&str]) -> DisplayState {
        DisplayState {
            outputs: Vec::new(),
            modes: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    // ── ensure ────────────────────────────────────────────────────────────────

    #[test]
    fn test_ensure_creates_mode_when_absent() {
        // Arrange
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(modes(&["1920x1080"])));
        mock.expect_create_mode()
            .withf(|mode, timings| mode.name == "vd-1920x1080" && timings.hdisplay == 1920)
            .times(1)
            .returning(|_, _| Ok(()));
        let settings = PoolSettings::default();
        let registry = ModeRegistry::new(&mock, &settings);

        // Act
        let record = registry.ensure(&fhd()).unwrap();

        // Assert
        assert_eq!(record, ModeRecord::registry("vd-", 1920, 1080));
    }

    #[test]
    fn test_ensure_reuses_existing_mode() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(modes(&["vd-1920x1080"])));
        mock.expect_create_mode().never();
        let settings = PoolSettings::default();
        let registry = ModeRegistry::new(&mock, &settings);

        let record = registry.ensure(&fhd()).unwrap();

        assert_eq!(record.name, "vd-1920x1080");
    }

    #[test]
    fn test_ensure_uses_configured_refresh_rate() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(DisplayState::default()));
        mock.expect_create_mode()
            .withf(|_, timings| *timings == Modeline::cvt(1920, 1080, 75.0))
            .times(1)
            .returning(|_, _| Ok(()));
        let settings = PoolSettings {
            refresh_hz: 75.0,
            ..PoolSettings::default()
        };

        ModeRegistry::new(&mock, &settings).ensure(&fhd()).unwrap();
    }

    #[test]
    fn test_ensure_propagates_creation_failure() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(DisplayState::default()));
        mock.expect_create_mode().returning(|_, _| {
            Err(ExtensionError::Rejected {
                command: "newmode".to_string(),
                reason: "BadName".to_string(),
            })
        });
        let settings = PoolSettings::default();

        let result = ModeRegistry::new(&mock, &settings).ensure(&fhd());

        assert!(matches!(result, Err(ExtensionError::Rejected { .. })));
    }

    // ── list ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_list_returns_registry_modes_only() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query()
            .returning(|| Ok(modes(&["1920x1080", "vd-1280x720", "1920x1080_60.00", "vd-800x600"])));
        let settings = PoolSettings::default();

        let names: Vec<String> = ModeRegistry::new(&mock, &settings)
            .list()
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();

        assert_eq!(names, vec!["vd-1280x720".to_string(), "vd-800x600".to_string()]);
    }

    // ── purge_all ─────────────────────────────────────────────────────────────

    #[test]
    fn test_purge_removes_unused_and_skips_in_use_modes() {
        // Arrange: vd-1920x1080 drives VIRTUAL1, vd-1280x720 is idle.
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| {
            Ok(DisplayState {
                outputs: vec![OutputInfo {
                    name: "VIRTUAL1".to_string(),
                    connected: true,
                    geometry: Some(Region { x: 0, y: 0, width: 1920, height: 1080 }),
                    rotation: Orientation::Normal,
                    modes: vec!["vd-1920x1080".to_string()],
                    current_mode: Some("vd-1920x1080".to_string()),
                }],
                modes: vec![
                    "1920x1080".to_string(),
                    "vd-1920x1080".to_string(),
                    "vd-1280x720".to_string(),
                ],
            })
        });
        mock.expect_remove_mode()
            .withf(|name| name == "vd-1280x720")
            .times(1)
            .returning(|_| Ok(()));
        let settings = PoolSettings::default();

        // Act
        let result = ModeRegistry::new(&mock, &settings).purge_all().unwrap();

        // Assert
        assert_eq!(result.removed, vec![ModeRecord::registry("vd-", 1280, 720)]);
        assert_eq!(result.skipped, vec![ModeRecord::registry("vd-", 1920, 1080)]);
    }

    #[test]
    fn test_purge_with_no_registry_modes_is_noop() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(modes(&["1920x1080", "1280x720"])));
        mock.expect_remove_mode().never();
        let settings = PoolSettings::default();

        let result = ModeRegistry::new(&mock, &settings).purge_all().unwrap();

        assert_eq!(result, PurgeResult::default());
    }
}
