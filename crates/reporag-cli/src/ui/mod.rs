//! # CLI UI Module
//!
//! Styling and formatting layer for reporag output.
//!
//! Human output is colored when stdout is a terminal and `NO_COLOR` is
//! unset; every command also has a `--json` form for scripts.
//!
//! ## Module Structure
//!
//! - `color`: color mode detection
//! - `style`: message prefixes and value styling
//! - `format`: small text formatters
//! - `table`: ranked result tables with comfy-table

pub mod color;
pub mod format;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use style::{MessageType, Style};
