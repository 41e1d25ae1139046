//! Output generation for the newsletter run.
//!
//! # Submodules
//!
//! - [`markdown`]: assembles and writes the newsletter document
//! - [`json`]: writes the collected [`crate::models::MarketSnapshot`]
//!
//! Charts are written by [`crate::charts`] into the same directory.

pub mod json;
pub mod markdown;
