//! The parallel windowed pixel-transform engine.
//!
//! A filter invocation is `prepass? -> snapshot? -> parallel pass -> join`,
//! optionally followed by a second pass that reads auxiliary buffers filled
//! by the first. Callers only see [`Filter::apply_in_place`]; bands,
//! snapshots and workers stay inside [`ParallelFilterExecutor`].
//!
//! In-flight passes cannot be cancelled.

pub mod border;
pub mod buffer;
pub mod executor;
pub mod partition;
pub mod snapshot;
pub mod window;

pub use border::BorderPolicy;
pub use buffer::{AuxiliaryStatsBuffer, ChannelMode, PixelBuffer};
pub use executor::{Filter, ParallelFilterExecutor, WindowOperator};
pub use partition::{RowBand, RowPartitioner};
pub use snapshot::Snapshot;
pub use window::{Window, WindowCell, MAX_RADIUS};
