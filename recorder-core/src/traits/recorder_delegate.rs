use crate::models::audio_models::RecorderStatus;
use crate::models::error::RecorderError;
use crate::models::state::RecordingState;

/// Event delegate for recorder notifications.
///
/// Methods are called from recorder-owned threads (or the caller's thread
/// for state changes). Implementations should hand off to their own thread
/// if they need to do real work.
pub trait RecorderDelegate: Send + Sync {
    /// Called when recording starts or stops.
    fn on_state_changed(&self, state: RecordingState);

    /// Called with the accumulator status after each forwarded chunk.
    fn on_status(&self, status: &RecorderStatus);

    /// Called when the processing worker rejects a command.
    fn on_error(&self, error: &RecorderError);
}
