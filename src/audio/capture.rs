//! Fixed-length recordings from a live session

use crossbeam_channel::{bounded, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::frame::{AudioFrame, FrameOrigin};
use super::live::LiveSession;
use crate::config::CaptureConfig;
use crate::error::AudioError;

/// Records a live session into one window of exactly `window_bytes`
pub struct WindowCapture {
    config: CaptureConfig,
}

impl WindowCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Capture length as a `Duration`
    pub fn duration(&self) -> Result<Duration, AudioError> {
        let secs = self.config.duration_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(AudioError::CaptureWindow(format!("duration {} s", secs)));
        }
        Duration::try_from_secs_f32(secs)
            .map_err(|e| AudioError::CaptureWindow(format!("duration {} s: {}", secs, e)))
    }

    /// Collect frames until the window is full, the duration elapses or the
    /// stream ends, then stop the demodulator
    ///
    /// Frames are read on a helper thread so a stalled demodulator cannot
    /// hold the capture past its deadline.
    pub fn run(&self, session: LiveSession) -> Result<AudioFrame, AudioError> {
        let duration = self.duration()?;
        let deadline = Instant::now().checked_add(duration).ok_or_else(|| {
            AudioError::CaptureWindow(format!("duration {:?} out of range", duration))
        })?;
        let freq = session.freq();
        let Some(process) = session.process() else {
            return Err(AudioError::ProcessStart(format!(
                "demodulator at {} Hz is not running",
                freq
            )));
        };

        let (tx, rx) = bounded(4);
        // Not joined: a child of the tool may keep the pipe open after the
        // kill, and the reader only exits once that pipe closes
        std::thread::spawn(move || {
            for frame in session {
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });

        let mut audio = Vec::with_capacity(self.config.window_bytes);
        let mut frames = 0u64;
        let outcome = loop {
            if audio.len() >= self.config.window_bytes {
                break Ok(());
            }
            match rx.recv_deadline(deadline) {
                Ok(Ok(frame)) => {
                    frames += 1;
                    audio.extend_from_slice(frame.as_bytes());
                }
                Ok(Err(e)) => break Err(e),
                Err(RecvTimeoutError::Timeout) => {
                    debug!("Capture window elapsed at {} bytes", audio.len());
                    break Ok(());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Stream ended during capture at {} bytes", audio.len());
                    break Ok(());
                }
            }
        };

        if process.kill() {
            debug!("Stopped demodulator at {} Hz", freq);
        }
        if let Err(e) = outcome {
            warn!("Capture at {} Hz failed: {}", freq, e);
            return Err(e);
        }

        info!(
            "Captured {} bytes at {} Hz in {} frames",
            audio.len(),
            freq,
            frames
        );
        self.finish(audio)
    }

    /// Validate the length, then trim or zero-pad to the window size
    pub fn finish(&self, mut audio: Vec<u8>) -> Result<AudioFrame, AudioError> {
        if audio.len() < self.config.min_bytes {
            return Err(AudioError::ShortCapture {
                got: audio.len(),
                min: self.config.min_bytes,
            });
        }
        audio.resize(self.config.window_bytes, 0);
        Ok(AudioFrame::new(FrameOrigin::Window, audio))
    }
}
