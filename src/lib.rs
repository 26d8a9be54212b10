//! ImageStag windowed filters
//!
//! Neighborhood image filters run by a parallel row-band executor.
//!
//! ## Image Format
//! Buffers are `(height, width, channels)` arrays of `u8`:
//! - **Gray**: (height, width, 1)
//! - **Rgb**: (height, width, 3)
//!
//! ## Execution Model
//! Each filter call snapshots the input, splits the output rows into one
//! band per worker, and computes every sample from the snapshot. Workers
//! never share writable rows. Faults from any band are collected after all
//! workers have joined and returned as a single error.

pub mod engine;
pub mod error;
pub mod filters;

pub use engine::{
    BorderPolicy, ChannelMode, Filter, ParallelFilterExecutor, PixelBuffer, Window, WindowOperator,
};
pub use error::{FilterError, FilterResult};
