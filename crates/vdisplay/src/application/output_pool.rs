//! OutputPool: the fixed set of virtual output slots and their lifecycle.
//!
//! The pool never owns the truth.  [`OutputPool::refresh`] rebuilds every
//! slot from a fresh [`DisplayExtension::query`], and the dispatcher calls it
//! at the start of each operation.  Mutations go to the extension first; the
//! in-memory snapshot is only updated once the extension call succeeded, so a
//! failed call leaves the pool exactly as it was.

use thiserror::Error;
use tracing::{debug, info};
use vdisplay_core::{
    mode_name, ActiveOutput, ModeOrigin, ModeRecord, Orientation, Position, SlotError, SlotId,
    SlotState, VirtualOutputSlot,
};

use crate::application::extension::{DisplayExtension, DisplayState, ExtensionError, OutputInfo};

/// Error type for pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

/// Naming and sizing knobs shared by every use case.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Output name prefix; slot `n` is the output `<prefix><n>`.
    pub output_prefix: String,
    /// Number of virtual outputs the display server exposes.
    pub pool_size: u32,
    /// Prefix of modes created by vdisplay.
    pub mode_prefix: String,
    /// Vertical refresh used when computing timings for new modes.
    pub refresh_hz: f64,
    /// Whether activation without a position is auto-placed.
    pub auto_place: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            output_prefix: "VIRTUAL".to_string(),
            pool_size: 6,
            mode_prefix: "vd-".to_string(),
            refresh_hz: 60.0,
            auto_place: true,
        }
    }
}

impl PoolSettings {
    /// Maps an output name back to its slot, if it belongs to the pool.
    pub fn slot_for_output(&self, name: &str) -> Option<SlotId> {
        let digits = name.strip_prefix(&self.output_prefix)?;
        // Reject "VIRTUAL01" so every slot has exactly one spelling.
        if digits.starts_with('0') {
            return None;
        }
        SlotId::parse(digits, self.pool_size).ok()
    }
}

/// The virtual output pool, mirrored from the display server.
pub struct OutputPool<'a> {
    extension: &'a dyn DisplayExtension,
    settings: &'a PoolSettings,
    slots: Vec<VirtualOutputSlot>,
}

impl<'a> OutputPool<'a> {
    /// Creates a pool with every slot free.  Call [`refresh`](Self::refresh)
    /// before reading.
    pub fn new(extension: &'a dyn DisplayExtension, settings: &'a PoolSettings) -> Self {
        let slots = (1..=settings.pool_size)
            .filter_map(|i| SlotId::new(i, settings.pool_size).ok())
            .map(|id| VirtualOutputSlot::free(id, &settings.output_prefix))
            .collect();
        Self {
            extension,
            settings,
            slots,
        }
    }

    /// Re-reads the display server and rebuilds every slot.
    ///
    /// Returns the snapshot so callers can reuse it for the same decision.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Extension`] if the query fails; the previous
    /// snapshot is kept in that case.
    pub fn refresh(&mut self) -> Result<DisplayState, PoolError> {
        let state = self.extension.query()?;
        for slot in &mut self.slots {
            slot.state = match state.output(&slot.name) {
                Some(info) => slot_state_from(info, &self.settings.mode_prefix),
                None => SlotState::Free,
            };
        }
        debug!(
            active = self.slots.iter().filter(|s| s.is_active()).count(),
            "pool refreshed"
        );
        Ok(state)
    }

    /// Every slot, in index order.  Re-queries first.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Extension`] if the query fails.
    pub fn list_all(&mut self) -> Result<Vec<VirtualOutputSlot>, PoolError> {
        self.refresh()?;
        Ok(self.slots.clone())
    }

    /// Active slots only, in index order.  Re-queries first.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Extension`] if the query fails.
    pub fn list_active(&mut self) -> Result<Vec<VirtualOutputSlot>, PoolError> {
        self.refresh()?;
        Ok(self.slots.iter().filter(|s| s.is_active()).cloned().collect())
    }

    /// Free slots only, in index order.  Re-queries first.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Extension`] if the query fails.
    pub fn list_free(&mut self) -> Result<Vec<VirtualOutputSlot>, PoolError> {
        self.refresh()?;
        Ok(self.slots.iter().filter(|s| !s.is_active()).cloned().collect())
    }

    /// The slot as of the last refresh.
    pub fn slot(&self, id: SlotId) -> &VirtualOutputSlot {
        &self.slots[index(id)]
    }

    /// Activates a free slot.
    ///
    /// # Errors
    ///
    /// - [`SlotError::AlreadyActive`] if the slot is active in the snapshot.
    /// - [`PoolError::Extension`] if the display server rejects the change.
    pub fn activate(
        &mut self,
        id: SlotId,
        mode: ModeRecord,
        position: Position,
        orientation: Orientation,
    ) -> Result<&VirtualOutputSlot, PoolError> {
        let slot = self.slot(id);
        if slot.is_active() {
            return Err(SlotError::AlreadyActive(slot.name.clone()).into());
        }

        let next = ActiveOutput {
            mode,
            position,
            orientation,
        };
        let slot = self.commit(id, SlotState::Active(next.clone()), |ext, name| {
            ext.set_output(name, &next.mode, next.orientation, next.position)
        })?;
        info!(output = %slot.name, mode = %next.mode, position = %next.position, "output activated");
        Ok(slot)
    }

    /// Changes any subset of an active slot's mode, orientation and position.
    /// Fields left as `None` keep their current value.
    ///
    /// # Errors
    ///
    /// - [`SlotError::NotActive`] if the slot is free in the snapshot.
    /// - [`PoolError::Extension`] if the display server rejects the change.
    pub fn change(
        &mut self,
        id: SlotId,
        mode: Option<ModeRecord>,
        orientation: Option<Orientation>,
        position: Option<Position>,
    ) -> Result<&VirtualOutputSlot, PoolError> {
        let slot = self.slot(id);
        let current = slot
            .active()
            .ok_or_else(|| SlotError::NotActive(slot.name.clone()))?;

        let next = ActiveOutput {
            mode: mode.unwrap_or_else(|| current.mode.clone()),
            orientation: orientation.unwrap_or(current.orientation),
            position: position.unwrap_or(current.position),
        };
        let slot = self.commit(id, SlotState::Active(next.clone()), |ext, name| {
            ext.set_output(name, &next.mode, next.orientation, next.position)
        })?;
        info!(output = %slot.name, mode = %next.mode, position = %next.position, "output changed");
        Ok(slot)
    }

    /// Turns an active slot off.
    ///
    /// # Errors
    ///
    /// - [`SlotError::NotActive`] if the slot is free in the snapshot.
    /// - [`PoolError::Extension`] if the display server rejects the change.
    pub fn deactivate(&mut self, id: SlotId) -> Result<&VirtualOutputSlot, PoolError> {
        let slot = self.slot(id);
        if !slot.is_active() {
            return Err(SlotError::NotActive(slot.name.clone()).into());
        }
        let slot = self.commit(id, SlotState::Free, |ext, name| ext.clear_output(name))?;
        info!(output = %slot.name, "output deactivated");
        Ok(slot)
    }

    /// Turns every active slot off, in index order.
    ///
    /// Slots turned off before a failure stay off.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Extension`] from the first rejected call.
    pub fn deactivate_all(&mut self) -> Result<Vec<String>, PoolError> {
        let active: Vec<SlotId> = self
            .slots
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.id)
            .collect();

        let mut names = Vec::with_capacity(active.len());
        for id in active {
            names.push(self.deactivate(id)?.name.clone());
        }
        Ok(names)
    }

    /// Calls the extension, then stores `next` only if the call succeeded.
    fn commit<F>(
        &mut self,
        id: SlotId,
        next: SlotState,
        call: F,
    ) -> Result<&VirtualOutputSlot, PoolError>
    where
        F: FnOnce(&dyn DisplayExtension, &str) -> Result<(), ExtensionError>,
    {
        let i = index(id);
        call(self.extension, &self.slots[i].name)?;
        self.slots[i].state = next;
        Ok(&self.slots[i])
    }
}

fn index(id: SlotId) -> usize {
    // SlotId is validated against the pool size, so this is in bounds.
    (id.get() - 1) as usize
}

/// Rebuilds a slot's state from what the display server reports.
fn slot_state_from(info: &OutputInfo, mode_prefix: &str) -> SlotState {
    let Some(geometry) = info.geometry else {
        return SlotState::Free;
    };
    let (width, height) = info.rotation.apply(geometry.width, geometry.height);
    let mode = info
        .current_mode
        .as_deref()
        .and_then(|name| ModeRecord::classify(mode_prefix, name))
        .unwrap_or_else(|| ModeRecord {
            name: info
                .current_mode
                .clone()
                .unwrap_or_else(|| mode_name("", width, height)),
            width,
            height,
            origin: ModeOrigin::Intrinsic,
        });

    SlotState::Active(ActiveOutput {
        mode,
        position: Position {
            x: geometry.x,
            y: geometry.y,
        },
        orientation: info.rotation,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::extension::MockDisplayExtension;
    use vdisplay_core::Region;

    fn settings(pool_size: u32) -> PoolSettings {
        PoolSettings {
            pool_size,
            ..PoolSettings::default()
        }
    }

    fn active_output(name: &str, x: i32, mode: &str, w: u32, h: u32) -> OutputInfo {
        OutputInfo {
            name: name.to_string(),
            connected: true,
            geometry: Some(Region { x, y: 0, width: w, height: h }),
            rotation: Orientation::Normal,
            modes: vec![mode.to_string()],
            current_mode: Some(mode.to_string()),
        }
    }

    fn state(outputs: Vec<OutputInfo>) -> DisplayState {
        let modes = outputs.iter().flat_map(|o| o.modes.clone()).collect();
        DisplayState { outputs, modes }
    }

    fn id(n: u32) -> SlotId {
        SlotId::new(n, 4).unwrap()
    }

    // ── PoolSettings ──────────────────────────────────────────────────────────

    #[test]
    fn test_slot_for_output_maps_pool_names_only() {
        let s = settings(4);
        assert_eq!(s.slot_for_output("VIRTUAL3"), Some(id(3)));
        assert_eq!(s.slot_for_output("VIRTUAL5"), None);
        assert_eq!(s.slot_for_output("VIRTUAL03"), None);
        assert_eq!(s.slot_for_output("eDP1"), None);
    }

    // ── refresh / listing ─────────────────────────────────────────────────────

    #[test]
    fn test_refresh_rebuilds_slots_from_display_state() {
        // Arrange
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| {
            Ok(state(vec![
                OutputInfo::idle("VIRTUAL1"),
                active_output("VIRTUAL2", 1920, "vd-1600x900", 1600, 900),
            ]))
        });
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);

        // Act
        pool.refresh().unwrap();

        // Assert
        assert!(!pool.slot(id(1)).is_active());
        let active = pool.slot(id(2)).active().unwrap();
        assert_eq!(active.mode, ModeRecord::registry("vd-", 1600, 900));
        assert_eq!(active.position, Position { x: 1920, y: 0 });
        // Outputs missing from the server are reported free.
        assert!(!pool.slot(id(4)).is_active());
    }

    #[test]
    fn test_refresh_unrotates_portrait_geometry() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| {
            let mut out = active_output("VIRTUAL1", 0, "1920x1080", 1080, 1920);
            out.rotation = Orientation::Left;
            Ok(state(vec![out]))
        });
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);

        pool.refresh().unwrap();

        let active = pool.slot(id(1)).active().unwrap();
        assert_eq!((active.mode.width, active.mode.height), (1920, 1080));
        assert_eq!(active.mode.origin, ModeOrigin::Intrinsic);
        assert_eq!(active.orientation, Orientation::Left);
    }

    #[test]
    fn test_active_and_free_lists_partition_all() {
        // Arrange
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| {
            Ok(state(vec![
                active_output("VIRTUAL1", 0, "vd-1920x1080", 1920, 1080),
                active_output("VIRTUAL3", 1920, "vd-1280x720", 1280, 720),
            ]))
        });
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);

        // Act
        let all = pool.list_all().unwrap();
        let active = pool.list_active().unwrap();
        let free = pool.list_free().unwrap();

        // Assert
        let ids = |v: &[VirtualOutputSlot]| v.iter().map(|s| s.id.get()).collect::<Vec<_>>();
        assert_eq!(ids(&all), vec![1, 2, 3, 4]);
        assert_eq!(ids(&active), vec![1, 3]);
        assert_eq!(ids(&free), vec![2, 4]);
    }

    #[test]
    fn test_every_list_call_requeries_the_server() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().times(3).returning(|| Ok(DisplayState::default()));
        let s = settings(2);
        let mut pool = OutputPool::new(&mock, &s);

        pool.list_all().unwrap();
        pool.list_active().unwrap();
        pool.list_free().unwrap();
    }

    // ── activate ──────────────────────────────────────────────────────────────

    #[test]
    fn test_activate_calls_extension_then_commits() {
        // Arrange
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(state(vec![OutputInfo::idle("VIRTUAL2")])));
        mock.expect_set_output()
            .withf(|name, mode, rot, pos| {
                name == "VIRTUAL2"
                    && mode.name == "vd-1920x1080"
                    && *rot == Orientation::Normal
                    && *pos == Position { x: 1920, y: 0 }
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        // Act
        let slot = pool
            .activate(
                id(2),
                ModeRecord::registry("vd-", 1920, 1080),
                Position { x: 1920, y: 0 },
                Orientation::Normal,
            )
            .unwrap();

        // Assert
        assert!(slot.is_active());
        assert_eq!(slot.region(), Some(Region { x: 1920, y: 0, width: 1920, height: 1080 }));
    }

    #[test]
    fn test_activate_already_active_slot_is_rejected_without_calling_extension() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| {
            Ok(state(vec![active_output("VIRTUAL1", 0, "vd-1920x1080", 1920, 1080)]))
        });
        mock.expect_set_output().never();
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        let result = pool.activate(
            id(1),
            ModeRecord::registry("vd-", 1280, 720),
            Position::ORIGIN,
            Orientation::Normal,
        );

        assert!(matches!(
            result,
            Err(PoolError::Slot(SlotError::AlreadyActive(ref name))) if name == "VIRTUAL1"
        ));
    }

    #[test]
    fn test_activate_failure_leaves_slot_free() {
        // Arrange
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(state(vec![OutputInfo::idle("VIRTUAL1")])));
        mock.expect_set_output().returning(|_, _, _, _| {
            Err(ExtensionError::Rejected {
                command: "set".to_string(),
                reason: "BadMatch".to_string(),
            })
        });
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        // Act
        let result = pool.activate(
            id(1),
            ModeRecord::registry("vd-", 1920, 1080),
            Position::ORIGIN,
            Orientation::Normal,
        );

        // Assert
        assert!(matches!(result, Err(PoolError::Extension(_))));
        assert!(!pool.slot(id(1)).is_active());
    }

    // ── change ────────────────────────────────────────────────────────────────

    #[test]
    fn test_change_keeps_unspecified_fields() {
        // Arrange
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| {
            Ok(state(vec![active_output("VIRTUAL1", 1920, "vd-1920x1080", 1920, 1080)]))
        });
        mock.expect_set_output()
            .withf(|_, mode, rot, pos| {
                mode.name == "vd-1920x1080"
                    && *rot == Orientation::Right
                    && *pos == Position { x: 1920, y: 0 }
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        // Act
        let slot = pool.change(id(1), None, Some(Orientation::Right), None).unwrap();

        // Assert
        assert_eq!(
            slot.region(),
            Some(Region { x: 1920, y: 0, width: 1080, height: 1920 })
        );
    }

    #[test]
    fn test_change_free_slot_is_not_active_error() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(DisplayState::default()));
        mock.expect_set_output().never();
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        let result = pool.change(id(3), None, Some(Orientation::Left), None);

        assert!(matches!(result, Err(PoolError::Slot(SlotError::NotActive(_)))));
    }

    // ── deactivate ────────────────────────────────────────────────────────────

    #[test]
    fn test_deactivate_free_slot_is_not_active_error() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(DisplayState::default()));
        mock.expect_clear_output().never();
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        assert!(matches!(
            pool.deactivate(id(2)),
            Err(PoolError::Slot(SlotError::NotActive(_)))
        ));
    }

    #[test]
    fn test_deactivate_all_turns_off_active_slots_in_order() {
        // Arrange
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| {
            Ok(state(vec![
                active_output("VIRTUAL3", 1920, "vd-1280x720", 1280, 720),
                active_output("VIRTUAL1", 0, "vd-1920x1080", 1920, 1080),
            ]))
        });
        let mut seq = mockall::Sequence::new();
        for name in ["VIRTUAL1", "VIRTUAL3"] {
            mock.expect_clear_output()
                .withf(move |n| n == name)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        // Act
        let names = pool.deactivate_all().unwrap();

        // Assert
        assert_eq!(names, vec!["VIRTUAL1".to_string(), "VIRTUAL3".to_string()]);
        assert!(!pool.slot(id(1)).is_active());
        assert!(!pool.slot(id(3)).is_active());
    }

    #[test]
    fn test_deactivate_all_with_nothing_active_is_noop() {
        let mut mock = MockDisplayExtension::new();
        mock.expect_query().returning(|| Ok(DisplayState::default()));
        mock.expect_clear_output().never();
        let s = settings(4);
        let mut pool = OutputPool::new(&mock, &s);
        pool.refresh().unwrap();

        assert!(pool.deactivate_all().unwrap().is_empty());
    }
}
