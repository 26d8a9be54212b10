//! Handling of window cells that fall outside the image.
//!
//! Bounds are always the whole image, `0 <= row < height` and
//! `0 <= col < width`. Workers read from a snapshot, so a window reaching
//! into another band's rows is always safe.

use super::buffer::PixelBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderPolicy {
    /// Leave the cell out; the operator divides by the real sample count.
    Skip,
    /// Clamp to the nearest edge pixel.
    Replicate,
    /// Use the pixel currently being computed.
    SubstituteCenter,
}

impl BorderPolicy {
    /// Sample for window cell `(row, col)` while computing `center`.
    /// `None` means the cell is excluded.
    #[inline]
    pub fn resolve(
        self,
        source: &PixelBuffer,
        row: isize,
        col: isize,
        channel: usize,
        center: (usize, usize),
    ) -> Option<u8> {
        if let Some(v) = source.try_get(row, col, channel) {
            return Some(v);
        }
        match self {
            BorderPolicy::Skip => None,
            BorderPolicy::Replicate => {
                if source.width() == 0 || source.height() == 0 {
                    return None;
                }
                let r = row.clamp(0, source.height() as isize - 1) as usize;
                let c = col.clamp(0, source.width() as isize - 1) as usize;
                Some(source.get(r, c, channel))
            }
            BorderPolicy::SubstituteCenter => Some(source.get(center.0, center.1, channel)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelMode;

    fn ramp() -> PixelBuffer {
        // 3x3, value = row * 10 + col
        PixelBuffer::from_fn(3, 3, ChannelMode::Gray, |r, c, _| (r * 10 + c) as u8)
    }

    #[test]
    fn test_in_range_is_identical_for_all_policies() {
        let buf = ramp();
        for policy in [
            BorderPolicy::Skip,
            BorderPolicy::Replicate,
            BorderPolicy::SubstituteCenter,
        ] {
            assert_eq!(policy.resolve(&buf, 2, 1, 0, (1, 1)), Some(21));
        }
    }

    #[test]
    fn test_skip_excludes() {
        assert_eq!(BorderPolicy::Skip.resolve(&ramp(), -1, 0, 0, (0, 0)), None);
        assert_eq!(BorderPolicy::Skip.resolve(&ramp(), 0, 3, 0, (0, 2)), None);
    }

    #[test]
    fn test_replicate_clamps() {
        let buf = ramp();
        assert_eq!(BorderPolicy::Replicate.resolve(&buf, -2, -2, 0, (0, 0)), Some(0));
        assert_eq!(BorderPolicy::Replicate.resolve(&buf, 5, 1, 0, (2, 1)), Some(21));
        assert_eq!(BorderPolicy::Replicate.resolve(&buf, 1, 9, 0, (1, 2)), Some(12));
    }

    #[test]
    fn test_substitute_center() {
        let buf = ramp();
        assert_eq!(
            BorderPolicy::SubstituteCenter.resolve(&buf, -1, 1, 0, (0, 2)),
            Some(2)
        );
    }
}
