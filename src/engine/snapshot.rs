//! Frozen copy of a buffer read by every worker of a windowed pass.

use std::ops::Deref;
use std::sync::Arc;

use super::buffer::PixelBuffer;

/// Immutable, shared view of a [`PixelBuffer`] taken before a pass starts.
///
/// Workers read neighborhoods from the snapshot while the executor keeps
/// exclusive ownership of the live buffer, so a write in one band can never
/// be seen by a window in another.
#[derive(Debug, Clone)]
pub struct Snapshot {
    frozen: Arc<PixelBuffer>,
}

impl Snapshot {
    /// Deep-copy `buffer`.
    pub fn take(buffer: &PixelBuffer) -> Self {
        Snapshot {
            frozen: Arc::new(buffer.clone()),
        }
    }
}

impl Deref for Snapshot {
    type Target = PixelBuffer;

    fn deref(&self) -> &PixelBuffer {
        &self.frozen
    }
}
