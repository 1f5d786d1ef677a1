//! Routing of audio requests to live or fallback audio

use std::sync::Arc;
use tracing::debug;

use super::capture::WindowCapture;
use super::fallback::{ChunkLoader, FallbackCache};
use super::frame::AudioFrame;
use super::live::LiveSession;
use crate::config::Config;
use crate::error::{AudioError, Result};

/// Frequency that selects the placeholder stream instead of the receiver
pub const FALLBACK_FREQ: u32 = 0;

/// A request for audio at a given frequency (Hz)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRequest {
    pub freq: u32,
}

impl AudioRequest {
    pub fn new(freq: u32) -> Self {
        Self { freq }
    }

    pub fn is_fallback(&self) -> bool {
        self.freq == FALLBACK_FREQ
    }
}

/// Frames produced for one request
pub enum ChunkStream {
    /// A single chunk from the fallback pool
    Fallback(Option<AudioFrame>),
    /// Frames from a dedicated demodulator session
    Live(LiveSession),
}

impl Iterator for ChunkStream {
    type Item = std::result::Result<AudioFrame, AudioError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ChunkStream::Fallback(frame) => frame.take().map(Ok),
            ChunkStream::Live(session) => session.next(),
        }
    }
}

/// Hands out audio per request; each live request gets its own process
pub struct ChunkSource<L: ChunkLoader> {
    config: Config,
    fallback: Arc<FallbackCache<L>>,
}

impl<L: ChunkLoader> ChunkSource<L> {
    pub fn new(config: Config, fallback: Arc<FallbackCache<L>>) -> Self {
        Self { config, fallback }
    }

    /// Open a frame stream for `request`
    ///
    /// Start failures are reported once; nothing here retries.
    pub fn stream(&self, request: AudioRequest) -> Result<ChunkStream> {
        if request.is_fallback() {
            debug!("Fallback stream requested");
            let frame = self.fallback.next()?;
            return Ok(ChunkStream::Fallback(Some(frame)));
        }
        Ok(ChunkStream::Live(self.start_live(request.freq)?))
    }

    /// One response-sized unit of audio: a fallback chunk or a fixed window
    pub fn next(&self, request: AudioRequest) -> Result<AudioFrame> {
        if request.is_fallback() {
            return Ok(self.fallback.next()?);
        }
        let session = self.start_live(request.freq)?;
        let capture = WindowCapture::new(self.config.capture.clone());
        Ok(capture.run(session)?)
    }

    fn start_live(&self, freq: u32) -> std::result::Result<LiveSession, AudioError> {
        LiveSession::start(freq, &self.config.demod, &self.config.rpc, &self.config.audio)
    }

    pub fn fallback(&self) -> &Arc<FallbackCache<L>> {
        &self.fallback
    }
}
