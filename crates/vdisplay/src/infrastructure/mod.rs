//! Infrastructure layer for vdisplay.
//!
//! Contains the OS-facing adapters: the display extension implementations
//! and configuration file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `vdisplay_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod extension;
pub mod storage;
