//! Delivered units of raw PCM audio

/// Bytes in one live frame: 8192 little-endian 16-bit samples
pub const FRAME_BYTES: usize = 16384;

/// Where a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    /// Read from a demodulator process
    Live,
    /// Replayed from the fallback chunk pool
    Fallback,
    /// A fixed-length recording assembled from live frames
    Window,
}

/// Raw 16-bit little-endian PCM owned by whoever received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    origin: FrameOrigin,
    data: Vec<u8>,
}

impl AudioFrame {
    pub fn new(origin: FrameOrigin, data: Vec<u8>) -> Self {
        Self { origin, data }
    }

    pub fn origin(&self) -> FrameOrigin {
        self.origin
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode as signed 16-bit samples; a trailing odd byte is ignored
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Samples scaled to `[-1.0, 1.0)` for playback
    pub fn to_f32(&self) -> Vec<f32> {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_little_endian() {
        let frame = AudioFrame::new(FrameOrigin::Live, vec![0x01, 0x00, 0xff, 0xff, 0x00, 0x80]);
        assert_eq!(frame.samples(), vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let frame = AudioFrame::new(FrameOrigin::Fallback, vec![0x10, 0x00, 0x7f]);
        assert_eq!(frame.samples(), vec![16]);
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn test_to_f32_range() {
        let frame = AudioFrame::new(FrameOrigin::Live, vec![0x00, 0x80, 0xff, 0x7f]);
        let samples = frame.to_f32();
        assert_eq!(samples[0], -1.0);
        assert!(samples[1] < 1.0 && samples[1] > 0.99);
    }
}
