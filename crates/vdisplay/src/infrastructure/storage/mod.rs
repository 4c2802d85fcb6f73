//! Storage infrastructure: configuration file loading.
//!
//! vdisplay keeps no state of its own between runs; the display server is
//! the only record of which outputs are active.  The one file it reads is
//! the optional TOML configuration handled by the `config` sub-module.

pub mod config;
