//! Playback of frames on the default output device using cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleRate, Stream, StreamConfig};
use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use super::frame::AudioFrame;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Output stream fed from a frame receiver
pub struct Playback {
    config: AudioConfig,
    host: Host,
    device: Option<Device>,
    stream: Option<Stream>,
    drained: Arc<AtomicBool>,
}

impl Playback {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            host: cpal::default_host(),
            device: None,
            stream: None,
            drained: Arc::new(AtomicBool::new(false)),
        }
    }

    /// List available audio output devices
    pub fn list_devices(&self) -> Result<Vec<String>, AudioError> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    /// Pick the default output device
    pub fn init(&mut self) -> Result<(), AudioError> {
        let device = self
            .host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!(
            "Using audio output device: {} ({} channels @ {} Hz)",
            device_name, self.config.channels, self.config.sample_rate
        );

        self.device = Some(device);
        Ok(())
    }

    /// Start playing frames from `frames` until the sender side closes
    pub fn start(&mut self, frames: Receiver<AudioFrame>) -> Result<(), AudioError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| AudioError::DeviceConfig("Device not initialized".to_string()))?;

        let config = StreamConfig {
            channels: self.config.channels,
            sample_rate: SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let drained = self.drained.clone();
        let mut queue: VecDeque<f32> = VecDeque::new();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while queue.len() < data.len() {
                        match frames.try_recv() {
                            Ok(frame) => queue.extend(frame.to_f32()),
                            Err(crossbeam_channel::TryRecvError::Empty) => break,
                            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                                if queue.is_empty() {
                                    drained.store(true, Ordering::Relaxed);
                                }
                                break;
                            }
                        }
                    }
                    // underruns are filled with silence
                    for sample in data.iter_mut() {
                        *sample = queue.pop_front().unwrap_or(0.0);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        self.stream = Some(stream);
        info!("Playback started");
        Ok(())
    }

    /// True once the producer is gone and every queued sample was played
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("Playback stopped");
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}
