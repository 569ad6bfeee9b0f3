use std::sync::Arc;

use crate::models::error::RecorderError;

/// Callback invoked by a capture source for every delivered chunk.
///
/// The argument holds one chunk per channel, all of equal length.
/// Called on the source's real-time thread; implementations must not block.
pub type FrameCallback = Arc<dyn Fn(Vec<Vec<f32>>) + Send + Sync + 'static>;

/// A source of multichannel float frames on a fixed cadence.
///
/// The platform audio graph lives behind this trait; the recorder only
/// consumes what it delivers.
pub trait CaptureSource: Send {
    /// Rate the source delivers frames at, in Hz.
    fn sample_rate(&self) -> u32;

    /// Channels per delivered chunk.
    fn channels(&self) -> u16;

    /// Frames per delivered chunk, if the source uses a fixed size.
    fn frames_per_chunk(&self) -> Option<usize> {
        None
    }

    /// Start delivering chunks to `callback`.
    fn start(&mut self, callback: FrameCallback) -> Result<(), RecorderError>;

    /// Stop delivering chunks and release resources.
    fn stop(&mut self) -> Result<(), RecorderError>;
}
