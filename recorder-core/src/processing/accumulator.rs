use crate::models::audio_models::ChannelBuffers;
use crate::models::error::RecorderError;

/// Lossless, ordered store of captured multichannel chunks.
///
/// Each channel keeps its chunks in arrival order. Reads concatenate the
/// chunk lists into freshly allocated buffers and leave the stored chunks
/// untouched, so [`materialize`](Self::materialize) can be called any number
/// of times.
///
/// Owned by the processing worker; nothing else touches the chunk lists.
#[derive(Debug)]
pub struct FrameAccumulator {
    sample_rate: u32,
    channels: usize,
    chunks: Vec<Vec<Vec<f32>>>,
    rec_length: usize,
}

impl FrameAccumulator {
    /// Set the session parameters and allocate one empty chunk list per channel.
    pub fn initialize(sample_rate: u32, channels: usize) -> Result<Self, RecorderError> {
        if channels == 0 {
            return Err(RecorderError::ConfigurationFailed(
                "accumulator needs at least one channel".into(),
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            chunks: vec![Vec::new(); channels],
            rec_length: 0,
        })
    }

    /// Append one chunk per channel.
    ///
    /// All chunks must have the same, non-zero length. Nothing is stored if
    /// the chunk is rejected.
    pub fn append(&mut self, chunk: ChannelBuffers) -> Result<(), RecorderError> {
        let frames = validate_chunk(&chunk, self.channels)?;
        if frames == 0 {
            return Err(RecorderError::EmptyChunk);
        }
        for (list, channel) in self.chunks.iter_mut().zip(chunk) {
            list.push(channel);
        }
        self.rec_length += frames;
        Ok(())
    }

    /// Concatenate every channel's chunks into one contiguous buffer of
    /// `rec_length` samples.
    pub fn materialize(&self) -> ChannelBuffers {
        self.chunks
            .iter()
            .map(|list| {
                let mut merged = Vec::with_capacity(self.rec_length);
                for chunk in list {
                    merged.extend_from_slice(chunk);
                }
                merged
            })
            .collect()
    }

    /// Discard the current recording and store `buffers` as a single
    /// already-merged chunk per channel.
    ///
    /// Empty buffers leave the accumulator cleared.
    pub fn replace(&mut self, buffers: ChannelBuffers) -> Result<(), RecorderError> {
        let frames = validate_chunk(&buffers, self.channels)?;
        self.clear();
        if frames > 0 {
            for (list, channel) in self.chunks.iter_mut().zip(buffers) {
                list.push(channel);
            }
            self.rec_length = frames;
        }
        Ok(())
    }

    /// Drop every stored chunk. The accumulator stays ready for `append`.
    pub fn clear(&mut self) {
        for list in &mut self.chunks {
            list.clear();
        }
        self.rec_length = 0;
    }

    /// Frames accumulated per channel.
    pub fn rec_length(&self) -> usize {
        self.rec_length
    }

    pub fn is_empty(&self) -> bool {
        self.rec_length == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// Check that `chunk` holds `channels` buffers of equal length and return
/// that length.
pub fn validate_chunk(chunk: &[Vec<f32>], channels: usize) -> Result<usize, RecorderError> {
    if chunk.len() != channels {
        return Err(RecorderError::ChannelMismatch {
            expected: channels,
            actual: chunk.len(),
        });
    }
    let Some(first) = chunk.first() else {
        return Ok(0);
    };
    let frames = first.len();
    if let Some((channel, other)) = chunk
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, c)| c.len() != frames)
    {
        return Err(RecorderError::ChannelLengthMismatch {
            channel,
            expected: frames,
            actual: other.len(),
        });
    }
    Ok(frames)
}
