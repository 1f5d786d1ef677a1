//! Live demodulator sessions
//!
//! One external demodulator process per session. The session moves through
//! `Starting -> Streaming -> Draining -> Closed`; `cancel` (or drop) jumps
//! straight to `Closed` and always kills and reaps the child.

use parking_lot::Mutex;
use std::io::Read;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use super::buffer::{AudioBuffer, FillOutcome};
use super::frame::AudioFrame;
use crate::config::{AudioConfig, DemodConfig, RpcConfig};
use crate::error::AudioError;

/// Lifecycle of a demodulation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Streaming,
    Draining,
    Closed,
}

/// Shared handle that can stop a session's process from another thread
///
/// Killing does not touch the session's stdout, so a thread blocked reading
/// frames is woken by end of input once the process is gone.
#[derive(Clone)]
pub struct ProcessHandle {
    child: Arc<Mutex<Option<Child>>>,
}

impl ProcessHandle {
    fn new(child: Child) -> Self {
        Self {
            child: Arc::new(Mutex::new(Some(child))),
        }
    }

    fn take(&self) -> Option<Child> {
        self.child.lock().take()
    }

    /// Kill and reap the process; returns false if it was already gone
    pub fn kill(&self) -> bool {
        let Some(mut child) = self.take() else {
            return false;
        };
        // kill fails if the child already exited; reaping is still needed
        if let Err(e) = child.kill() {
            debug!("Kill of demodulator pid {}: {}", child.id(), e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to reap demodulator: {}", e);
        }
        true
    }

    /// True while the process has not been killed or reaped
    pub fn is_running(&self) -> bool {
        self.child.lock().is_some()
    }
}

/// A running demodulator producing fixed-size frames
pub struct LiveSession {
    freq: u32,
    state: SessionState,
    child: Option<ProcessHandle>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    buffer: AudioBuffer,
    frames: u64,
}

impl LiveSession {
    /// Spawn the demodulator tuned to `freq`
    pub fn start(
        freq: u32,
        demod: &DemodConfig,
        rpc: &RpcConfig,
        audio: &AudioConfig,
    ) -> Result<Self, AudioError> {
        let mut session = Self {
            freq,
            state: SessionState::Starting,
            child: None,
            stdout: None,
            stderr: None,
            buffer: AudioBuffer::from_config(audio),
            frames: 0,
        };

        let mut child = Command::new(&demod.program)
            .args(demod.args_for(freq))
            .envs(rpc.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AudioError::ProcessStart(format!("{}: {}", demod.program, e))
            })?;

        session.stdout = child.stdout.take();
        session.stderr = child.stderr.take().map(drain_stderr);
        info!(
            "Started {} (pid {}) at {} Hz",
            demod.program,
            child.id(),
            freq
        );
        session.child = Some(ProcessHandle::new(child));

        if session.stdout.is_none() {
            session.cancel();
            return Err(AudioError::ProcessStart(
                "demodulator stdout unavailable".to_string(),
            ));
        }

        session.state = SessionState::Streaming;
        Ok(session)
    }

    /// Next full frame, `None` once the stream has ended
    ///
    /// A trailing partial frame at end of input is dropped, never padded.
    pub fn next_frame(&mut self) -> Result<Option<AudioFrame>, AudioError> {
        if self.state != SessionState::Streaming {
            return Ok(None);
        }
        let Some(stdout) = self.stdout.as_mut() else {
            self.cancel();
            return Ok(None);
        };

        match self.buffer.fill_frame(stdout) {
            Ok(FillOutcome::Frame(frame)) => {
                self.frames += 1;
                debug!("Frame {} ({} bytes) from {} Hz", self.frames, frame.len(), self.freq);
                Ok(Some(frame))
            }
            Ok(FillOutcome::EndOfStream(partial)) => {
                self.state = SessionState::Draining;
                if !partial.is_empty() {
                    debug!("Dropping {} trailing bytes", partial.len());
                }
                self.drain();
                Ok(None)
            }
            Err(e) => {
                warn!("Demodulator stream at {} Hz failed: {}", self.freq, e);
                self.cancel();
                Err(e)
            }
        }
    }

    /// Reap a process whose output has ended
    fn drain(&mut self) {
        self.stdout = None;
        let status = self
            .child
            .take()
            .and_then(|handle| handle.take())
            .map(|mut child| child.wait());
        let diagnostics = self.take_stderr();

        match status {
            Some(Ok(status)) if status.success() => {
                info!("Demodulator at {} Hz finished after {} frames", self.freq, self.frames);
            }
            Some(Ok(status)) => {
                warn!(
                    "Demodulator at {} Hz exited with {}: {}",
                    self.freq,
                    describe(status),
                    diagnostics.trim()
                );
            }
            Some(Err(e)) => warn!("Failed to reap demodulator: {}", e),
            None => {}
        }
        self.state = SessionState::Closed;
    }

    /// Terminate the process, whatever state the session is in
    pub fn cancel(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.stdout = None;
        if let Some(handle) = self.child.take() {
            if handle.kill() {
                info!("Demodulator at {} Hz stopped after {} frames", self.freq, self.frames);
            }
        }
        let _ = self.take_stderr();
        self.state = SessionState::Closed;
    }

    fn take_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Handle for stopping the process while another thread reads frames
    pub fn process(&self) -> Option<ProcessHandle> {
        self.child.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn freq(&self) -> u32 {
        self.freq
    }

    /// Frames delivered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Iterator for LiveSession {
    type Item = Result<AudioFrame, AudioError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Read stderr on a helper thread so a chatty tool never blocks on a full pipe
fn drain_stderr<R: Read + Send + 'static>(mut stderr: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut text = String::new();
        let mut raw = Vec::new();
        if stderr.read_to_end(&mut raw).is_ok() {
            text = String::from_utf8_lossy(&raw).into_owned();
        }
        text
    })
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "signal".to_string(),
    }
}
