//! `xrandr`-backed display extension.
//!
//! Every call runs the `xrandr` program (or the one named in the config) and
//! waits for it.  A spawn failure or a nonzero exit status becomes an
//! [`ExtensionError`] carrying the program's stderr.
//!
//! # Query format
//!
//! `xrandr --query` prints one header line per output followed by its
//! indented mode lines, then the modes that no output uses:
//!
//! ```text
//! Screen 0: minimum 8 x 8, current 3520 x 1080, maximum 32767 x 32767
//! eDP1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 344mm x 194mm
//!    1920x1080     60.02*+  59.93
//! VIRTUAL1 disconnected (normal left inverted right x axis y axis)
//! VIRTUAL2 connected 1080x1600+1920+0 left (normal left inverted right x axis y axis) 0mm x 0mm
//!    vd-1600x900   59.95*
//!   vd-1280x720 (0x1d2) 74.500MHz -HSync +VSync
//!         h: width  1280 start 1344 end 1472 total 1664 skew    0 clock  44.77KHz
//!         v: height  720 start  723 end  728 total  748           clock  59.86Hz
//! ```
//!
//! The geometry on a header line is already rotated.  A `*` after a refresh
//! rate marks the output's current mode.  Unused modes are recognised by the
//! `(0x..)` id after their name.

use std::process::Command;

use tracing::debug;
use vdisplay_core::{parse_dimensions, ModeRecord, Modeline, Orientation, Position, Region};

use crate::application::extension::{DisplayExtension, DisplayState, ExtensionError, OutputInfo};

/// Display extension that drives the X server through `xrandr`.
pub struct XrandrExtension {
    program: String,
}

impl XrandrExtension {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[String]) -> Result<String, ExtensionError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, "running display extension");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| ExtensionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(ExtensionError::Rejected { command, reason });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl DisplayExtension for XrandrExtension {
    fn query(&self) -> Result<DisplayState, ExtensionError> {
        let text = self.run(&["--query".to_string()])?;
        let state = parse_query(&text)?;
        debug!(outputs = state.outputs.len(), modes = state.modes.len(), "display state queried");
        Ok(state)
    }

    fn create_mode(&self, mode: &ModeRecord, timings: &Modeline) -> Result<(), ExtensionError> {
        self.run(&newmode_args(mode, timings)).map(drop)
    }

    fn remove_mode(&self, name: &str) -> Result<(), ExtensionError> {
        let state = self.query()?;
        for output in state.outputs.iter().filter(|o| o.modes.iter().any(|m| m == name)) {
            self.run(&args(&["--delmode", &output.name, name]))?;
        }
        self.run(&args(&["--rmmode", name])).map(drop)
    }

    fn set_output(
        &self,
        output: &str,
        mode: &ModeRecord,
        rotation: Orientation,
        position: Position,
    ) -> Result<(), ExtensionError> {
        let state = self.query()?;
        let attached = state
            .output(output)
            .is_some_and(|o| o.modes.contains(&mode.name));
        if !attached {
            self.run(&args(&["--addmode", output, &mode.name]))?;
        }
        self.run(&output_args(output, mode, rotation, position)).map(drop)
    }

    fn clear_output(&self, output: &str) -> Result<(), ExtensionError> {
        self.run(&args(&["--output", output, "--off"])).map(drop)
    }
}

// ── Argument builders ─────────────────────────────────────────────────────────

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn newmode_args(mode: &ModeRecord, timings: &Modeline) -> Vec<String> {
    let mut args = vec!["--newmode".to_string(), mode.name.clone()];
    args.extend(timings.to_args());
    args
}

fn output_args(
    output: &str,
    mode: &ModeRecord,
    rotation: Orientation,
    position: Position,
) -> Vec<String> {
    args(&[
        "--output",
        output,
        "--mode",
        &mode.name,
        "--rotate",
        rotation.as_str(),
        "--pos",
        &position.to_string(),
    ])
}

// ── Query parser ──────────────────────────────────────────────────────────────

/// Parses the output of `xrandr --query`.
///
/// # Errors
///
/// Returns [`ExtensionError::Parse`] when a mode line appears before any
/// output header.
pub fn parse_query(text: &str) -> Result<DisplayState, ExtensionError> {
    let mut state = DisplayState::default();

    for line in text.lines() {
        if line.trim().is_empty() || line.starts_with("Screen ") {
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            state.outputs.push(parse_output_header(line)?);
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let name = tokens[0];
        // Timing detail of an unused mode, or a property line.
        if matches!(name, "h:" | "v:") || name.ends_with(':') {
            continue;
        }
        if !state.has_mode(name) {
            state.modes.push(name.to_string());
        }

        let unused = tokens.get(1).is_some_and(|t| t.starts_with("(0x"));
        if unused {
            continue;
        }
        let output = state
            .outputs
            .last_mut()
            .ok_or_else(|| ExtensionError::Parse(format!("mode line before any output: {line:?}")))?;
        if !output.modes.iter().any(|m| m == name) {
            output.modes.push(name.to_string());
        }
        if tokens[1..].iter().any(|t| t.contains('*')) {
            output.current_mode = Some(name.to_string());
        }
    }
    Ok(state)
}

fn parse_output_header(line: &str) -> Result<OutputInfo, ExtensionError> {
    let mut tokens = line.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| ExtensionError::Parse(format!("empty output line: {line:?}")))?;
    let mut info = OutputInfo::idle(name);
    info.connected = tokens.next() == Some("connected");

    for token in tokens.take_while(|t| !t.starts_with('(')) {
        if let Some(region) = parse_geometry(token) {
            info.geometry = Some(region);
        } else if let Ok(rotation) = token.parse::<Orientation>() {
            info.rotation = rotation;
        }
    }
    Ok(info)
}

/// Parses `WxH+X+Y`.
fn parse_geometry(token: &str) -> Option<Region> {
    let (size, offset) = token.split_once('+')?;
    let (width, height) = parse_dimensions(size)?;
    let (x, y) = offset.split_once('+')?;
    Some(Region {
        x: x.parse().ok()?,
        y: y.parse().ok()?,
        width,
        height,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
