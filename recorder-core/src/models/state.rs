/// Recording state of a [`Recorder`](crate::session::recorder::Recorder).
///
/// ```text
/// idle ⇄ capturing
/// ```
///
/// Frames delivered while idle are discarded, never buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Capturing,
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }
}
