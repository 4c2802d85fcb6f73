//! Command-line grammar.
//!
//! `clap` only checks shapes here (which flags exist, which take a value).
//! Values stay raw strings so that every semantic check, including "exactly
//! one action", happens in [`Invocation::validate`] with the domain's own
//! error messages.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::application::dispatch::{Invocation, ListFilter};

/// Create, arrange and remove virtual display outputs.
///
/// Exactly one action is run per invocation: --list, --list-resolutions,
/// --output, --change, --off, --off-all or --purge-modes (which may be
/// combined with --off-all).
#[derive(Debug, Parser)]
#[command(name = "vdisplay", version, about, long_about = None)]
pub struct Cli {
    /// List virtual outputs.
    #[arg(long, value_enum, value_name = "WHICH", num_args = 0..=1, default_missing_value = "all")]
    pub list: Option<ListArg>,

    /// List the predefined resolutions.
    #[arg(long)]
    pub list_resolutions: bool,

    /// Activate virtual output N.
    #[arg(long, value_name = "N")]
    pub output: Option<String>,

    /// Predefined resolution by id or name (see --list-resolutions).
    #[arg(short = 'r', long = "resolution", value_name = "ID|NAME")]
    pub resolution: Option<String>,

    /// Custom resolution.
    #[arg(long, value_name = "WxH")]
    pub size: Option<String>,

    /// Deactivate virtual output N.
    #[arg(long, value_name = "N")]
    pub off: Option<String>,

    /// Deactivate every active virtual output.
    #[arg(long)]
    pub off_all: bool,

    /// Change the resolution, orientation or position of active output N.
    #[arg(long, value_name = "N")]
    pub change: Option<String>,

    /// Orientation: normal|right|left|inverted, or L|PR|PL|LF.
    #[arg(short = 'o', long = "orientation", value_name = "ORIENTATION")]
    pub orientation: Option<String>,

    /// Absolute position of the output's top-left corner.
    #[arg(long, value_name = "XxY")]
    pub pos: Option<String>,

    /// Place right of an output (name or virtual output number).
    #[arg(long, value_name = "OUTPUT")]
    pub right_of: Option<String>,

    /// Place left of an output (name or virtual output number).
    #[arg(long, value_name = "OUTPUT")]
    pub left_of: Option<String>,

    /// Place above an output (name or virtual output number).
    #[arg(long, value_name = "OUTPUT")]
    pub above: Option<String>,

    /// Place below an output (name or virtual output number).
    #[arg(long, value_name = "OUTPUT")]
    pub below: Option<String>,

    /// Place at 0x0 instead of right of the rightmost output.
    #[arg(long)]
    pub no_auto: bool,

    /// Remove display modes created by vdisplay that no output uses.
    #[arg(long)]
    pub purge_modes: bool,

    /// Configuration file [default: $XDG_CONFIG_HOME/vdisplay/config.toml].
    #[arg(long, value_name = "PATH", env = "VDISPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log every display server interaction.
    #[arg(long)]
    pub debug: bool,

    /// Show what would be done without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Values accepted by `--list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListArg {
    All,
    Active,
    Free,
}

impl From<ListArg> for ListFilter {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::All => ListFilter::All,
            ListArg::Active => ListFilter::Active,
            ListArg::Free => ListFilter::Free,
        }
    }
}

impl Cli {
    /// The action part of the command line, for the dispatcher.
    pub fn invocation(&self) -> Invocation {
        Invocation {
            list: self.list.map(ListFilter::from),
            list_resolutions: self.list_resolutions,
            output: self.output.clone(),
            resolution: self.resolution.clone(),
            size: self.size.clone(),
            off: self.off.clone(),
            off_all: self.off_all,
            change: self.change.clone(),
            orientation: self.orientation.clone(),
            pos: self.pos.clone(),
            right_of: self.right_of.clone(),
            left_of: self.left_of.clone(),
            above: self.above.clone(),
            below: self.below.clone(),
            no_auto: self.no_auto,
            purge_modes: self.purge_modes,
        }
    }
}
