pub mod accumulator;
pub mod resampler;
pub mod wav_format;
