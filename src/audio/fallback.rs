//! Placeholder audio served when no receiver is involved
//!
//! A reference recording is decoded once per refill and split into a pool of
//! chunks. Chunks are handed out newest-first; when the pool runs dry the next
//! caller reloads it synchronously while holding the lock.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use super::frame::{AudioFrame, FrameOrigin};
use crate::config::FallbackConfig;
use crate::error::AudioError;

/// Produces the chunks that make up one pool generation
pub trait ChunkLoader: Send + Sync {
    fn load(&self) -> Result<Vec<Vec<u8>>, AudioError>;
}

/// Split a PCM byte stream into chunks of up to `reads_per_chunk` reads
///
/// Each read is filled to `read_bytes` unless the stream ends first, so every
/// chunk but the last holds exactly `read_bytes * reads_per_chunk` bytes. A
/// chunk that would be empty is not emitted.
pub fn split_chunks<R: Read>(
    reader: &mut R,
    read_bytes: usize,
    reads_per_chunk: usize,
) -> io::Result<Vec<Vec<u8>>> {
    let mut chunks = Vec::new();
    let mut buf = vec![0u8; read_bytes];

    'outer: loop {
        let mut chunk = Vec::with_capacity(read_bytes * reads_per_chunk);
        for _ in 0..reads_per_chunk {
            let n = fill_read(reader, &mut buf)?;
            chunk.extend_from_slice(&buf[..n]);
            if n < read_bytes {
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
                break 'outer;
            }
        }
        chunks.push(chunk);
    }

    Ok(chunks)
}

/// Read until `buf` is full or the stream ends; returns the bytes read
fn fill_read<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Decodes a compressed audio file into 16-bit PCM chunks
pub struct FileChunkLoader {
    path: PathBuf,
    read_bytes: usize,
    reads_per_chunk: usize,
}

impl FileChunkLoader {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            path: config.path.clone(),
            read_bytes: config.read_bytes,
            reads_per_chunk: config.reads_per_chunk,
        }
    }
}

impl ChunkLoader for FileChunkLoader {
    fn load(&self) -> Result<Vec<Vec<u8>>, AudioError> {
        let mut pcm = PcmReader::open(&self.path)?;
        split_chunks(&mut pcm, self.read_bytes, self.reads_per_chunk).map_err(|e| {
            AudioError::Decode(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// Streams decoded interleaved i16 little-endian PCM from an audio file
pub struct PcmReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl PcmReader {
    pub fn open(path: &Path) -> Result<Self, AudioError> {
        let file = File::open(path)
            .map_err(|e| AudioError::FallbackLoad(format!("{}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let detected = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Decode(format!("{}: {}", path.display(), e)))?;

        let format = detected.format;
        let track = format
            .default_track()
            .ok_or_else(|| AudioError::Decode(format!("{}: no default track", path.display())))?;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode(format!("{}: {}", path.display(), e)))?;
        let track_id = track.id;

        Ok(Self {
            format,
            decoder,
            track_id,
            pending: Vec::new(),
            pos: 0,
            finished: false,
        })
    }

    /// Decode packets until some PCM is pending or the file ends
    fn refill(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.pos = 0;

        while self.pending.is_empty() && !self.finished {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.finished = true;
                    break;
                }
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    samples.copy_interleaved_ref(decoded);
                    for sample in samples.samples() {
                        self.pending.extend_from_slice(&sample.to_le_bytes());
                    }
                }
                // corrupt frames are skipped
                Err(SymphoniaError::DecodeError(_)) | Err(SymphoniaError::IoError(_)) => continue,
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
        }
        Ok(())
    }
}

impl Read for PcmReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            self.refill()?;
        }
        let available = &self.pending[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

struct ChunkPool {
    chunks: Vec<Vec<u8>>,
    /// Chunks at indices `[0, cursor)` are still unserved
    cursor: usize,
    refills: u64,
}

/// Lock-guarded pool of fallback chunks
pub struct FallbackCache<L: ChunkLoader> {
    loader: L,
    pool: Mutex<ChunkPool>,
}

impl<L: ChunkLoader> FallbackCache<L> {
    /// Create an empty cache; nothing is loaded until first use
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            pool: Mutex::new(ChunkPool {
                chunks: Vec::new(),
                cursor: 0,
                refills: 0,
            }),
        }
    }

    /// Next chunk, newest-loaded first
    ///
    /// An error means the reference audio cannot be loaded at all; there is
    /// no other source to fall back to, so callers should treat it as fatal.
    pub fn next(&self) -> Result<AudioFrame, AudioError> {
        let mut pool = self.pool.lock();
        if pool.cursor == 0 {
            self.refill(&mut pool)?;
        }
        pool.cursor -= 1;
        let cursor = pool.cursor;
        let chunk = std::mem::take(&mut pool.chunks[cursor]);
        pool.chunks.truncate(cursor);
        debug!("Serving fallback chunk {} ({} bytes)", cursor, chunk.len());
        Ok(AudioFrame::new(FrameOrigin::Fallback, chunk))
    }

    /// Load the pool now if it is empty, so load failures surface at startup
    pub fn preload(&self) -> Result<usize, AudioError> {
        let mut pool = self.pool.lock();
        if pool.cursor == 0 {
            self.refill(&mut pool)?;
        }
        Ok(pool.cursor)
    }

    fn refill(&self, pool: &mut ChunkPool) -> Result<(), AudioError> {
        info!("No fallback chunks left, reloading");
        let chunks = self.loader.load()?;
        if chunks.is_empty() {
            return Err(AudioError::FallbackLoad("reference audio produced no chunks".to_string()));
        }
        pool.cursor = chunks.len();
        pool.chunks = chunks;
        pool.refills += 1;
        info!("Loaded {} chunks of fallback audio", pool.cursor);
        Ok(())
    }

    /// Chunks left before the next refill
    pub fn remaining(&self) -> usize {
        self.pool.lock().cursor
    }

    /// Completed refills since creation
    pub fn refills(&self) -> u64 {
        self.pool.lock().refills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Hands out numbered chunks and counts how often it was asked
    struct CountingLoader {
        chunks: usize,
        loads: AtomicUsize,
    }

    impl CountingLoader {
        fn new(chunks: usize) -> Self {
            Self {
                chunks,
                loads: AtomicUsize::new(0),
            }
        }
    }

    impl ChunkLoader for CountingLoader {
        fn load(&self) -> Result<Vec<Vec<u8>>, AudioError> {
            let generation = self.loads.fetch_add(1, Ordering::SeqCst) as u8;
            Ok((0..self.chunks)
                .map(|i| vec![generation, i as u8])
                .collect())
        }
    }

    struct FailingLoader;

    impl ChunkLoader for FailingLoader {
        fn load(&self) -> Result<Vec<Vec<u8>>, AudioError> {
            Err(AudioError::FallbackLoad("mock_audio.mp3: not found".to_string()))
        }
    }

    #[test]
    fn test_split_exact_and_remainder() {
        let data: Vec<u8> = (0..25).collect();
        let chunks = split_chunks(&mut io::Cursor::new(data), 4, 2).unwrap();
        let sizes: Vec<_> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![8, 8, 8, 1]);
        assert_eq!(chunks[3], vec![24]);
    }

    /// Hands out a few bytes per call, interrupting every other call
    struct StutteringReader {
        data: io::Cursor<Vec<u8>>,
        calls: usize,
    }

    impl Read for StutteringReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let n = buf.len().min(3);
            self.data.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_split_survives_short_and_interrupted_reads() {
        let data: Vec<u8> = (0..25).collect();
        let mut reader = StutteringReader {
            data: io::Cursor::new(data.clone()),
            calls: 0,
        };
        let chunks = split_chunks(&mut reader, 4, 2).unwrap();
        let sizes: Vec<_> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![8, 8, 8, 1]);
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn test_split_drops_empty_tail() {
        let chunks = split_chunks(&mut io::Cursor::new(vec![1u8; 16]), 4, 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(split_chunks(&mut io::empty(), 4, 2).unwrap().is_empty());
    }

    #[test]
    fn test_serves_in_reverse_load_order() {
        let cache = FallbackCache::new(CountingLoader::new(3));

        let served: Vec<_> = (0..3).map(|_| cache.next().unwrap().into_bytes()).collect();
        assert_eq!(served, vec![vec![0, 2], vec![0, 1], vec![0, 0]]);
        assert_eq!(cache.refills(), 1);
        assert_eq!(cache.remaining(), 0);
    }

    #[test]
    fn test_exhaustion_triggers_single_refill() {
        let cache = FallbackCache::new(CountingLoader::new(2));
        cache.next().unwrap();
        cache.next().unwrap();
        assert_eq!(cache.refills(), 1);

        let frame = cache.next().unwrap();
        assert_eq!(frame.as_bytes(), &[1, 1]);
        assert_eq!(frame.origin(), FrameOrigin::Fallback);
        assert_eq!(cache.refills(), 2);
        assert_eq!(cache.remaining(), 1);
    }

    #[test]
    fn test_preload_is_idempotent() {
        let cache = FallbackCache::new(CountingLoader::new(4));
        assert_eq!(cache.preload().unwrap(), 4);
        assert_eq!(cache.preload().unwrap(), 4);
        assert_eq!(cache.refills(), 1);
    }

    #[test]
    fn test_load_failure_surfaces() {
        let cache = FallbackCache::new(FailingLoader);
        assert!(matches!(cache.next(), Err(AudioError::FallbackLoad(_))));
        assert!(cache.preload().is_err());
    }

    #[test]
    fn test_concurrent_callers_never_double_refill() {
        let cache = Arc::new(FallbackCache::new(CountingLoader::new(50)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    (0..25).map(|_| cache.next().unwrap().into_bytes()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut served: Vec<Vec<u8>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        served.sort();
        served.dedup();

        // 100 serves over two generations of 50, each chunk exactly once
        assert_eq!(served.len(), 100);
        assert_eq!(cache.refills(), 2);
    }

    /// Mono 16-bit WAV holding `count` ascending samples
    fn write_wav(path: &Path, count: usize) -> Vec<i16> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 32000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples: Vec<i16> = (0..count).map(|i| (i as i16).wrapping_mul(7) - 1000).collect();
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in &samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        samples
    }

    #[test]
    fn test_pcm_reader_decodes_to_le_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.wav");
        let samples = write_wav(&path, 3000);

        let mut pcm = Vec::new();
        PcmReader::open(&path).unwrap().read_to_end(&mut pcm).unwrap();

        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(pcm.len(), 6000);
        assert_eq!(pcm, expected);
    }

    #[test]
    fn test_file_loader_splits_decoded_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.wav");
        let samples = write_wav(&path, 3000);

        let loader = FileChunkLoader::new(&FallbackConfig {
            path: path.clone(),
            read_bytes: 512,
            reads_per_chunk: 4,
        });
        let chunks = loader.load().unwrap();
        let sizes: Vec<_> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2048, 2048, 1904]);

        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(chunks.concat(), expected);

        // Served newest-first through the cache
        let cache = FallbackCache::new(loader);
        assert_eq!(cache.next().unwrap().len(), 1904);
        assert_eq!(cache.remaining(), 2);
    }

    #[test]
    fn test_undecodable_file_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mock_audio.mp3");
        std::fs::write(&path, b"not audio at all").unwrap();
        assert!(matches!(PcmReader::open(&path), Err(AudioError::Decode(_))));
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let loader = FileChunkLoader::new(&FallbackConfig {
            path: PathBuf::from("/nonexistent/mock_audio.mp3"),
            ..Default::default()
        });
        assert!(matches!(loader.load(), Err(AudioError::FallbackLoad(_))));
    }
}
