//! Stage state management

use crate::error::ChannelError;

/// Why a stage left `Running`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// End of stream reached the stage and was passed on
    EndOfStream,
    /// The pipeline was cancelled (user quit or external stop)
    Cancelled,
    /// The frame source could not be opened or failed mid-stream
    SourceFailure,
    /// A neighbouring stage went away without completing the stream
    Disconnected,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::EndOfStream => "end of stream",
            StopReason::Cancelled => "cancelled",
            StopReason::SourceFailure => "source failure",
            StopReason::Disconnected => "disconnected",
        };
        write!(f, "{text}")
    }
}

impl From<ChannelError> for StopReason {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Cancelled => StopReason::Cancelled,
            ChannelError::Disconnected => StopReason::Disconnected,
        }
    }
}

/// Stage state machine
///
/// A stage is `Running` from the moment it starts. It moves to `Stopped`
/// exactly once and never leaves it; there is no paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageState {
    #[default]
    Running,
    Stopped(StopReason),
}

impl StageState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &StageState) -> bool {
        matches!(
            (self, target),
            (StageState::Running, StageState::Stopped(_))
        )
    }

    /// Enter `Stopped`.
    ///
    /// # Panics
    ///
    /// Panics if the stage already stopped.
    pub fn stop(&mut self, reason: StopReason) {
        let target = StageState::Stopped(reason);
        assert!(
            self.can_transition_to(&target),
            "stage stopped twice ({self} -> {target})"
        );
        *self = target;
    }

    pub fn is_running(&self) -> bool {
        matches!(self, StageState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, StageState::Stopped(_))
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            StageState::Running => None,
            StageState::Stopped(reason) => Some(*reason),
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageState::Running => write!(f, "Running"),
            StageState::Stopped(reason) => write!(f, "Stopped ({reason})"),
        }
    }
}
