//! Integration tests for the command dispatcher.
//!
//! These tests drive whole invocations end-to-end through
//! `Dispatcher` + `OutputPool` + `ModeRegistry` + placement against the
//! in-memory display server, and check what ends up on the (simulated)
//! screen.

use vdisplay::application::dispatch::{
    DispatchError, Dispatcher, Invocation, ListFilter, Outcome,
};
use vdisplay::application::extension::{DisplayExtension, Mutation};
use vdisplay::application::output_pool::PoolSettings;
use vdisplay::infrastructure::extension::{DryRunExtension, InMemoryExtension};
use vdisplay_core::{CatalogError, ModeRecord, Region, SlotError, VirtualOutputSlot, CATALOG};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn server() -> InMemoryExtension {
    InMemoryExtension::with_virtual_outputs("VIRTUAL", 6)
}

fn run(ext: &dyn DisplayExtension, inv: Invocation) -> Result<Outcome, DispatchError> {
    let settings = PoolSettings::default();
    Dispatcher::new(ext, &settings).run(&inv)
}

fn activate(slot: &str, resolution: &str) -> Invocation {
    Invocation {
        output: Some(slot.to_string()),
        resolution: Some(resolution.to_string()),
        ..Invocation::default()
    }
}

fn activate_size(slot: &str, size: &str) -> Invocation {
    Invocation {
        output: Some(slot.to_string()),
        size: Some(size.to_string()),
        ..Invocation::default()
    }
}

fn list(ext: &dyn DisplayExtension, filter: ListFilter) -> Vec<VirtualOutputSlot> {
    let inv = Invocation {
        list: Some(filter),
        ..Invocation::default()
    };
    match run(ext, inv).expect("list must succeed") {
        Outcome::Listed(slots) => slots,
        other => panic!("expected a listing, got {other:?}"),
    }
}

fn region_of(ext: &InMemoryExtension, output: &str) -> Option<Region> {
    ext.snapshot().output(output).and_then(|o| o.geometry)
}

fn ids(slots: &[VirtualOutputSlot]) -> Vec<u32> {
    slots.iter().map(|s| s.id.get()).collect()
}

// ── Activation and auto-placement ─────────────────────────────────────────────

#[test]
fn test_two_catalog_outputs_are_tiled_left_to_right() {
    // Arrange
    let ext = server();

    // Act
    run(&ext, activate("1", "1")).expect("slot 1");
    run(&ext, activate("2", "2")).expect("slot 2");

    // Assert
    assert_eq!(
        region_of(&ext, "VIRTUAL1"),
        Some(Region { x: 0, y: 0, width: 1920, height: 1080 })
    );
    let second = region_of(&ext, "VIRTUAL2").expect("slot 2 active");
    assert_eq!(second, Region { x: 1920, y: 0, width: 1600, height: 900 });
}

#[test]
fn test_every_catalog_resolution_activates_its_slot() {
    for entry in CATALOG {
        let ext = server();
        let slot = entry.id.to_string();

        run(&ext, activate(&slot, &slot)).expect("activation must succeed");

        let active = ids(&list(&ext, ListFilter::Active));
        let free = ids(&list(&ext, ListFilter::Free));
        assert!(active.contains(&entry.id), "slot {slot} must be active");
        assert!(!free.contains(&entry.id), "slot {slot} must not be free");
    }
}

#[test]
fn test_auto_placement_goes_right_of_physical_monitor() {
    let ext = server().with_physical("eDP1", Region { x: 0, y: 0, width: 2560, height: 1600 });

    run(&ext, activate("1", "hd")).expect("activate");

    assert_eq!(
        region_of(&ext, "VIRTUAL1"),
        Some(Region { x: 2560, y: 0, width: 1280, height: 720 })
    );
}

#[test]
fn test_no_auto_places_at_origin() {
    let ext = server();
    run(&ext, activate("1", "fhd")).expect("slot 1");

    let inv = Invocation {
        no_auto: true,
        ..activate("2", "hd")
    };
    run(&ext, inv).expect("slot 2");

    assert_eq!(region_of(&ext, "VIRTUAL2").map(|r| (r.x, r.y)), Some((0, 0)));
}

#[test]
fn test_relative_placement_below_a_slot() {
    let ext = server();
    run(&ext, activate("1", "fhd")).expect("slot 1");

    let inv = Invocation {
        below: Some("1".to_string()),
        ..activate("3", "hd")
    };
    run(&ext, inv).expect("slot 3");

    assert_eq!(
        region_of(&ext, "VIRTUAL3"),
        Some(Region { x: 0, y: 1080, width: 1280, height: 720 })
    );
}

#[test]
fn test_portrait_activation_swaps_footprint() {
    let ext = server();
    let inv = Invocation {
        orientation: Some("PL".to_string()),
        ..activate("1", "fhd")
    };

    run(&ext, inv).expect("activate");
    run(&ext, activate("2", "hd")).expect("activate second");

    assert_eq!(
        region_of(&ext, "VIRTUAL1"),
        Some(Region { x: 0, y: 0, width: 1080, height: 1920 })
    );
    assert_eq!(region_of(&ext, "VIRTUAL2").map(|r| r.x), Some(1080));
}

#[test]
fn test_activating_active_slot_changes_nothing() {
    let ext = server();
    run(&ext, activate("1", "fhd")).expect("first activation");
    let before = ext.snapshot();

    let result = run(&ext, activate("1", "hd"));

    assert!(matches!(
        result,
        Err(DispatchError::Slot(SlotError::AlreadyActive(_)))
    ));
    assert_eq!(ext.snapshot(), before);
}

// ── Mode registry ─────────────────────────────────────────────────────────────

#[test]
fn test_same_size_twice_creates_one_mode_and_purge_removes_it() {
    // Arrange
    let ext = server();

    // Act
    run(&ext, activate_size("1", "1920x1080")).expect("slot 1");
    run(&ext, activate_size("2", "1920x1080")).expect("slot 2");
    run(&ext, Invocation { off_all: true, ..Invocation::default() }).expect("off-all");
    let purged = run(&ext, Invocation { purge_modes: true, ..Invocation::default() })
        .expect("purge");

    // Assert
    let created = ext
        .applied()
        .iter()
        .filter(|m| matches!(m, Mutation::CreateMode { .. }))
        .count();
    assert_eq!(created, 1, "the mode must be created once");
    match purged {
        Outcome::Purged(result) => {
            assert_eq!(result.removed, vec![ModeRecord::registry("vd-", 1920, 1080)]);
            assert!(result.skipped.is_empty());
        }
        other => panic!("expected purge outcome, got {other:?}"),
    }
    assert!(!ext.snapshot().has_mode("vd-1920x1080"));
}

#[test]
fn test_purge_skips_modes_in_use() {
    let ext = server();
    run(&ext, activate("1", "fhd")).expect("slot 1");
    run(&ext, activate("2", "hd")).expect("slot 2");
    run(&ext, Invocation { off: Some("2".to_string()), ..Invocation::default() }).expect("off");

    let outcome = run(&ext, Invocation { purge_modes: true, ..Invocation::default() })
        .expect("purge");

    match outcome {
        Outcome::Purged(result) => {
            assert_eq!(result.removed, vec![ModeRecord::registry("vd-", 1280, 720)]);
            assert_eq!(result.skipped, vec![ModeRecord::registry("vd-", 1920, 1080)]);
        }
        other => panic!("expected purge outcome, got {other:?}"),
    }
}

#[test]
fn test_off_all_with_purge_turns_off_then_removes_everything() {
    let ext = server();
    run(&ext, activate("1", "fhd")).expect("slot 1");
    run(&ext, activate("2", "qhd")).expect("slot 2");

    let inv = Invocation {
        off_all: true,
        purge_modes: true,
        ..Invocation::default()
    };
    let outcome = run(&ext, inv).expect("off-all + purge");

    match outcome {
        Outcome::DeactivatedAll { outputs, purge: Some(result) } => {
            assert_eq!(outputs, vec!["VIRTUAL1".to_string(), "VIRTUAL2".to_string()]);
            assert_eq!(result.removed.len(), 2);
            assert!(result.skipped.is_empty());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(list(&ext, ListFilter::Active).is_empty());
}

// ── Change and deactivation ───────────────────────────────────────────────────

#[test]
fn test_change_orientation_keeps_position_and_mode() {
    let ext = server();
    run(&ext, activate("1", "fhd")).expect("slot 1");
    run(&ext, activate("2", "hd")).expect("slot 2");

    let inv = Invocation {
        change: Some("2".to_string()),
        orientation: Some("right".to_string()),
        ..Invocation::default()
    };
    run(&ext, inv).expect("change");

    assert_eq!(
        region_of(&ext, "VIRTUAL2"),
        Some(Region { x: 1920, y: 0, width: 720, height: 1280 })
    );
}

#[test]
fn test_change_resolution_creates_new_mode() {
    let ext = server();
    run(&ext, activate("1", "hd")).expect("slot 1");

    let inv = Invocation {
        change: Some("1".to_string()),
        size: Some("800x600".to_string()),
        ..Invocation::default()
    };
    run(&ext, inv).expect("change");

    let state = ext.snapshot();
    assert!(state.has_mode("vd-800x600"));
    assert_eq!(
        state.output("VIRTUAL1").and_then(|o| o.current_mode.clone()).as_deref(),
        Some("vd-800x600")
    );
}

#[test]
fn test_change_free_slot_is_not_active_and_changes_nothing() {
    let ext = server();
    let before = ext.snapshot();

    let inv = Invocation {
        change: Some("2".to_string()),
        orientation: Some("left".to_string()),
        ..Invocation::default()
    };
    let result = run(&ext, inv);

    let err = result.expect_err("changing a free slot must fail");
    assert!(matches!(err, DispatchError::Slot(SlotError::NotActive(_))));
    assert!(err.is_validation());
    assert_eq!(ext.snapshot(), before);
}

#[test]
fn test_off_all_empties_active_list() {
    let ext = server();
    for slot in ["1", "3", "5"] {
        run(&ext, activate(slot, "hd")).expect("activate");
    }

    run(&ext, Invocation { off_all: true, ..Invocation::default() }).expect("off-all");

    assert!(list(&ext, ListFilter::Active).is_empty());
    assert_eq!(list(&ext, ListFilter::Free).len(), 6);
}

// ── Listing ───────────────────────────────────────────────────────────────────

#[test]
fn test_all_is_disjoint_union_of_active_and_free() {
    let ext = server();
    run(&ext, activate("2", "fhd")).expect("slot 2");
    run(&ext, activate("5", "hd")).expect("slot 5");

    let all = ids(&list(&ext, ListFilter::All));
    let active = ids(&list(&ext, ListFilter::Active));
    let free = ids(&list(&ext, ListFilter::Free));

    assert_eq!(active, vec![2, 5]);
    assert!(active.iter().all(|id| !free.contains(id)));
    let mut union: Vec<u32> = active.iter().chain(free.iter()).copied().collect();
    union.sort_unstable();
    assert_eq!(union, all);
}

// ── Validation leaves the display untouched ───────────────────────────────────

#[test]
fn test_size_without_height_is_format_error() {
    let ext = server();

    let result = run(&ext, activate_size("1", "1920"));

    assert!(matches!(
        result,
        Err(DispatchError::Catalog(CatalogError::Format(_)))
    ));
    assert!(ext.applied().is_empty());
}

#[test]
fn test_unknown_orientation_changes_nothing() {
    let ext = server();
    let inv = Invocation {
        orientation: Some("sideways".to_string()),
        ..activate("1", "fhd")
    };

    let err = run(&ext, inv).expect_err("unknown orientation must fail");

    assert!(err.is_validation());
    assert!(ext.applied().is_empty());
}

#[test]
fn test_left_of_output_at_origin_changes_nothing() {
    let ext = server();
    run(&ext, activate("1", "fhd")).expect("slot 1");
    let before = ext.snapshot();

    let inv = Invocation {
        left_of: Some("VIRTUAL1".to_string()),
        ..activate("2", "hd")
    };
    let err = run(&ext, inv).expect_err("off-screen placement must fail");

    assert!(err.is_validation());
    assert_eq!(ext.snapshot(), before);
}

// ── Operational failures ──────────────────────────────────────────────────────

#[test]
fn test_extension_failure_is_operational_and_leaves_state() {
    let ext = server().failing();
    let before = ext.snapshot();

    let err = run(&ext, activate("1", "fhd")).expect_err("server rejects");

    assert!(!err.is_validation());
    assert_eq!(ext.snapshot(), before);
}

// ── Dry run ───────────────────────────────────────────────────────────────────

#[test]
fn test_dry_run_plans_without_touching_the_server() {
    // Arrange
    let ext = server();
    let dry = DryRunExtension::new(&ext);

    // Act
    let outcome = run(&dry, activate("1", "fhd")).expect("dry run activation");

    // Assert
    assert!(matches!(outcome, Outcome::Activated(_)));
    assert!(ext.applied().is_empty());
    let planned = dry.planned();
    assert_eq!(planned.len(), 2);
    assert!(matches!(planned[0], Mutation::CreateMode { .. }));
    assert!(matches!(planned[1], Mutation::SetOutput { .. }));
}
