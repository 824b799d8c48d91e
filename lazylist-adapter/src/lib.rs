//! Adapter utilities for the `lazylist` crate.
//!
//! The `lazylist` crate is UI-agnostic: it talks to its host through traits. This crate
//! provides framework-neutral pieces for driving it without a real UI:
//!
//! - [`MemorySurface`]: an in-memory list container with block heights, a scroll position and
//!   event emission
//! - [`FnDelegate`]: a content delegate assembled from closures
//! - [`Controller`]: owns the single-threaded executor and the clock, and pumps them
#![forbid(unsafe_code)]

mod controller;
mod delegate;
mod surface;

#[cfg(test)]
mod tests;

pub use controller::Controller;
pub use delegate::FnDelegate;
pub use surface::{Block, MemoryScroller, MemorySurface};
