//! Audio acquisition: live demodulator sessions, fallback audio and playback

pub mod buffer;
pub mod capture;
pub mod fallback;
pub mod feed;
pub mod frame;
pub mod live;
pub mod playback;
pub mod source;

pub use buffer::{AudioBuffer, FillOutcome};
pub use capture::WindowCapture;
pub use fallback::{split_chunks, ChunkLoader, FallbackCache, FileChunkLoader, PcmReader};
pub use feed::FrameFeed;
pub use frame::{AudioFrame, FrameOrigin, FRAME_BYTES};
pub use live::{LiveSession, SessionState};
pub use playback::Playback;
pub use source::{AudioRequest, ChunkSource, ChunkStream, FALLBACK_FREQ};
