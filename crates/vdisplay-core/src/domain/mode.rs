//! Display mode records.
//!
//! A mode is identified by a name derived deterministically from its size,
//! so asking for the same width × height twice always yields the same
//! record.  Modes created by vdisplay carry a configurable prefix (default
//! `vd-`); that prefix is what distinguishes them from modes the display
//! server or driver provides on its own.
//!
//! New modes need real timings before the display server will accept them.
//! [`Modeline::cvt`] computes VESA CVT (standard blanking) timings, the same
//! figures the `cvt` utility prints.

use std::fmt;

use crate::domain::resolution::parse_dimensions;

/// Where a mode came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeOrigin {
    /// Created by vdisplay; eligible for purge.
    Registry,
    /// Provided by the display server or driver; never purged.
    Intrinsic,
}

/// A display mode known to the display server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModeRecord {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub origin: ModeOrigin,
}

/// Returns the registry name for a `width × height` mode, e.g. `vd-1920x1080`.
pub fn mode_name(prefix: &str, width: u32, height: u32) -> String {
    format!("{prefix}{width}x{height}")
}

impl ModeRecord {
    /// Builds the registry record for a size.
    pub fn registry(prefix: &str, width: u32, height: u32) -> Self {
        Self {
            name: mode_name(prefix, width, height),
            width,
            height,
            origin: ModeOrigin::Registry,
        }
    }

    /// Classifies a mode name reported by the display server.
    ///
    /// Names of the form `<prefix>WxH` are registry modes.  Other names whose
    /// leading part is `WxH` (`1920x1080`, `1920x1080_60.00`, `720x480i`) are
    /// intrinsic.  Anything else yields `None`.
    pub fn classify(prefix: &str, name: &str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix(prefix).filter(|_| !prefix.is_empty()) {
            if let Some((width, height)) = parse_dimensions(rest) {
                return Some(Self {
                    name: name.to_string(),
                    width,
                    height,
                    origin: ModeOrigin::Registry,
                });
            }
        }

        let (w, rest) = name.split_once('x')?;
        let h: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let (width, height) = parse_dimensions(&format!("{w}x{h}"))?;
        Some(Self {
            name: name.to_string(),
            width,
            height,
            origin: ModeOrigin::Intrinsic,
        })
    }

    pub fn is_registry(&self) -> bool {
        self.origin == ModeOrigin::Registry
    }
}

impl fmt::Display for ModeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ── CVT timings ───────────────────────────────────────────────────────────────

const CELL_GRAN: u32 = 8;
const MIN_V_PORCH: u32 = 3;
const MIN_V_BPORCH: u32 = 6;
const MIN_VSYNC_BP_US: f64 = 550.0;
const HSYNC_PERCENT: u32 = 8;
const C_PRIME: f64 = 30.0;
const M_PRIME: f64 = 300.0;
const CLOCK_STEP_KHZ: u32 = 250;

/// Video timings for one mode, in the order `xrandr --newmode` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modeline {
    /// Pixel clock in kHz (always a multiple of 250).
    pub clock_khz: u32,
    pub hdisplay: u32,
    pub hsync_start: u32,
    pub hsync_end: u32,
    pub htotal: u32,
    pub vdisplay: u32,
    pub vsync_start: u32,
    pub vsync_end: u32,
    pub vtotal: u32,
}

impl Modeline {
    /// Computes CVT standard-blanking timings for a progressive mode.
    ///
    /// `refresh_hz` must be positive and below ~1800 Hz; the configuration
    /// layer enforces a narrower range.  Blanking is derived from the width
    /// rounded down to the 8-pixel cell, while the active width stays exactly
    /// as requested.
    pub fn cvt(width: u32, height: u32, refresh_hz: f64) -> Self {
        let h_cells = width - width % CELL_GRAN;
        let v_sync = vsync_width(h_cells, height);

        // Estimated line period in microseconds.
        let h_period =
            (1_000_000.0 / refresh_hz - MIN_VSYNC_BP_US) / f64::from(height + MIN_V_PORCH);

        let mut v_sync_bp = (MIN_VSYNC_BP_US / h_period) as u32 + 1;
        if v_sync_bp < v_sync + MIN_V_BPORCH {
            v_sync_bp = v_sync + MIN_V_BPORCH;
        }
        let vtotal = height + v_sync_bp + MIN_V_PORCH;

        let duty = (C_PRIME - M_PRIME * h_period / 1000.0).max(20.0);
        let h_blank = (f64::from(h_cells) * duty / (100.0 - duty) / f64::from(2 * CELL_GRAN))
            as u32
            * 2
            * CELL_GRAN;
        let htotal = width + h_blank;

        let mut clock_khz = (f64::from(htotal) * 1000.0 / h_period) as u32;
        clock_khz -= clock_khz % CLOCK_STEP_KHZ;

        let mut h_sync = htotal * HSYNC_PERCENT / 100;
        h_sync -= h_sync % CELL_GRAN;
        let hsync_end = htotal - h_blank / 2;

        Self {
            clock_khz,
            hdisplay: width,
            hsync_start: hsync_end - h_sync,
            hsync_end,
            htotal,
            vdisplay: height,
            vsync_start: height + MIN_V_PORCH,
            vsync_end: height + MIN_V_PORCH + v_sync,
            vtotal,
        }
    }

    /// Pixel clock in MHz with two decimals, as display tools print it.
    pub fn clock_mhz(&self) -> String {
        format!("{}.{:02}", self.clock_khz / 1000, (self.clock_khz % 1000) / 10)
    }

    /// Timing fields followed by sync polarities (`-hsync +vsync`).
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.clock_mhz()];
        args.extend(
            [
                self.hdisplay,
                self.hsync_start,
                self.hsync_end,
                self.htotal,
                self.vdisplay,
                self.vsync_start,
                self.vsync_end,
                self.vtotal,
            ]
            .iter()
            .map(u32::to_string),
        );
        args.push("-hsync".to_string());
        args.push("+vsync".to_string());
        args
    }
}

impl fmt::Display for Modeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}

/// Vertical sync width in lines, keyed on the aspect ratio.
fn vsync_width(h: u32, v: u32) -> u32 {
    if v % 3 == 0 && v * 4 / 3 == h {
        4
    } else if v % 9 == 0 && v * 16 / 9 == h {
        5
    } else if v % 10 == 0 && v * 16 / 10 == h {
        6
    } else if (v % 4 == 0 && v * 5 / 4 == h) || (v % 9 == 0 && v * 15 / 9 == h) {
        7
    } else {
        10
    }
}
