//! WAV recording of PCM frames

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::audio::AudioFrame;
use crate::config::AudioConfig;

/// Appends 16-bit frames to a WAV file
pub struct WavRecorder {
    writer: hound::WavWriter<BufWriter<File>>,
    samples: u64,
    sample_rate: u32,
    channels: u16,
}

impl WavRecorder {
    pub fn create(path: &Path, config: &AudioConfig) -> hound::Result<Self> {
        let spec = hound::WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        Ok(Self {
            writer: hound::WavWriter::create(path, spec)?,
            samples: 0,
            sample_rate: config.sample_rate,
            channels: config.channels,
        })
    }

    pub fn write_frame(&mut self, frame: &AudioFrame) -> hound::Result<()> {
        for sample in frame.samples() {
            self.writer.write_sample(sample)?;
            self.samples += 1;
        }
        Ok(())
    }

    /// Seconds of audio written so far
    pub fn duration(&self) -> f32 {
        self.samples as f32 / (self.sample_rate as f32 * self.channels.max(1) as f32)
    }

    pub fn finalize(self) -> hound::Result<()> {
        self.writer.finalize()
    }
}
