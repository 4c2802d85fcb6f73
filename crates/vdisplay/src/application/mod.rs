//! Application layer use cases for vdisplay.
//!
//! Use cases here orchestrate the domain types from `vdisplay_core` against
//! the live display server, reached only through the [`extension`] trait.
//! Nothing in this layer spawns processes or touches the file system.
//!
//! # Sub-modules
//!
//! - **`extension`**     – The display extension boundary: the trait, the
//!   snapshot types it returns, and mutations as data.
//!
//! - **`output_pool`**   – The fixed pool of virtual output slots and their
//!   free/active lifecycle.
//!
//! - **`mode_registry`** – Creates display modes on demand (one per size) and
//!   purges the unused ones.
//!
//! - **`place_output`**  – Resolves absolute, relative and automatic placement
//!   against the outputs currently on screen.
//!
//! - **`dispatch`**      – Validates one invocation and runs it.

pub mod dispatch;
pub mod extension;
pub mod mode_registry;
pub mod output_pool;
pub mod place_output;
