//! Frame accumulation over a bursty byte stream

use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::trace;

use super::frame::{AudioFrame, FrameOrigin, FRAME_BYTES};
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Result of one fill cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// Exactly `frame_bytes` were accumulated
    Frame(AudioFrame),
    /// Input ended first; holds whatever arrived (possibly nothing)
    EndOfStream(Vec<u8>),
}

/// Accumulates reads until a full frame is available
///
/// Demodulators write in OS pipe-sized bursts that have nothing to do with
/// the frame size, so a single `read` rarely lines up with a frame boundary.
pub struct AudioBuffer {
    data: Vec<u8>,
    frame_bytes: usize,
    backoff: Duration,
}

impl AudioBuffer {
    /// Create a buffer producing frames of `frame_bytes`
    pub fn new(frame_bytes: usize, backoff: Duration) -> Self {
        Self {
            data: Vec::with_capacity(frame_bytes),
            frame_bytes,
            backoff,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.frame_bytes, config.backoff())
    }

    /// Read from `reader` until a frame is complete or input ends
    ///
    /// Sleeps for the backoff delay after every read that leaves the frame
    /// incomplete. Any read error other than `Interrupted` aborts the fill and
    /// discards the bytes accumulated so far.
    pub fn fill_frame<R: Read>(&mut self, reader: &mut R) -> Result<FillOutcome, AudioError> {
        self.data.clear();
        self.data.resize(self.frame_bytes, 0);
        let mut filled = 0;

        while filled < self.frame_bytes {
            match reader.read(&mut self.data[filled..]) {
                Ok(0) => {
                    self.data.truncate(filled);
                    trace!("End of stream after {} bytes", filled);
                    return Ok(FillOutcome::EndOfStream(std::mem::take(&mut self.data)));
                }
                Ok(n) => {
                    filled += n;
                    if filled < self.frame_bytes {
                        trace!("Short read: {}/{} bytes", filled, self.frame_bytes);
                        std::thread::sleep(self.backoff);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::sleep(self.backoff),
                Err(e) => {
                    self.data.clear();
                    return Err(AudioError::StreamRead(e));
                }
            }
        }

        let frame = std::mem::replace(&mut self.data, Vec::with_capacity(self.frame_bytes));
        Ok(FillOutcome::Frame(AudioFrame::new(FrameOrigin::Live, frame)))
    }

    /// Target frame size in bytes
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(FRAME_BYTES, Duration::from_millis(10))
    }
}
