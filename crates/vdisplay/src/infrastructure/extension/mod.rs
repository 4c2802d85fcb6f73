//! Display extension adapters.
//!
//! - **`xrandr`**  – production adapter, runs the `xrandr` program.
//! - **`dry_run`** – decorator that records mutations instead of sending them.
//! - **`memory`**  – simulated server used by tests.

pub mod dry_run;
pub mod memory;
pub mod xrandr;

pub use dry_run::{DryRunExtension, DryRunPlan};
pub use memory::InMemoryExtension;
pub use xrandr::XrandrExtension;
