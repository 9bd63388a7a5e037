//! Progress reporting service
//!
//! Each request walks `Idle → Preparing → Inferring → Postprocessing → Done`,
//! or ends in `Failed` from any non-idle state. [`ProgressTracker`] enforces
//! those transitions and forwards every one of them to a [`ProgressReporter`].

use crate::error::{ErrorKind, Result, SmartCutError};
use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::Arc;

/// Lifecycle state of one background removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    /// Validating the image and building the input tensor
    Preparing,
    /// Running the model
    Inferring,
    /// Extracting, normalizing and compositing the mask
    Postprocessing,
    Done,
    /// Terminal failure, classified by kind
    Failed(ErrorKind),
}

impl ProcessingState {
    /// Get a human-readable description of the state
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Waiting",
            Self::Preparing => "Preprocessing image",
            Self::Inferring => "Running inference",
            Self::Postprocessing => "Generating alpha mask",
            Self::Done => "Processing completed",
            Self::Failed(_) => "Processing failed",
        }
    }

    /// Get the typical progress percentage for this state
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Preparing => 10,
            Self::Inferring => 30,
            Self::Postprocessing => 85,
            Self::Done | Self::Failed(_) => 100,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of this state
    #[must_use]
    pub fn can_transition_to(&self, next: ProcessingState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Preparing)
                | (Self::Preparing, Self::Inferring)
                | (Self::Inferring, Self::Postprocessing)
                | (Self::Postprocessing, Self::Done)
                | (
                    Self::Preparing | Self::Inferring | Self::Postprocessing,
                    Self::Failed(_)
                )
        )
    }
}

/// Progress update containing state and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub state: ProcessingState,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since the request started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(state: ProcessingState, start_time: Instant) -> Self {
        Self {
            progress: state.progress_percentage(),
            description: state.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            state,
        }
    }
}

/// Trait for reporting progress during background removal operations
pub trait ProgressReporter: Send + Sync {
    /// Report a state transition
    fn report_progress(&self, update: ProgressUpdate);

    /// Report successful completion with final timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report a failure and the state it happened in
    fn report_error(&self, state: ProcessingState, error: &SmartCutError);
}

/// No-op progress reporter that discards all progress updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _state: ProcessingState, _error: &SmartCutError) {}
}

/// Console progress reporter that logs progress through the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        log::info!("Background removal completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  Detailed timings:");
            log::info!("    - Session wait: {}ms", timings.lock_wait_ms);
            log::info!("    - Preprocessing: {}ms", timings.preprocessing_ms);
            log::info!("    - Inference: {}ms", timings.inference_ms);
            log::info!("    - Postprocessing: {}ms", timings.postprocessing_ms);
        }
    }

    fn report_error(&self, state: ProcessingState, error: &SmartCutError) {
        log::error!("Error during {}: {}", state.description(), error);
    }
}

/// Per-request state machine that reports every transition
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    state: ProcessingState,
    start_time: Instant,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            state: ProcessingState::Idle,
            start_time: Instant::now(),
        }
    }

    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    #[must_use]
    pub fn state(&self) -> ProcessingState {
        self.state
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Move to `next` and report it
    ///
    /// # Errors
    /// - `Internal` when `next` is not a legal successor of the current state
    pub fn advance(&mut self, next: ProcessingState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SmartCutError::internal(format!(
                "Illegal processing transition {:?} -> {:?}",
                self.state, next
            )));
        }
        tracing::debug!(from = ?self.state, to = ?next, "processing state transition");
        self.state = next;
        self.reporter
            .report_progress(ProgressUpdate::new(next, self.start_time));
        Ok(())
    }

    /// Enter `Done` and report the final timings
    ///
    /// # Errors
    /// - `Internal` when not currently post-processing
    pub fn complete(&mut self, timings: &ProcessingTimings) -> Result<()> {
        self.advance(ProcessingState::Done)?;
        self.reporter.report_completion(timings);
        Ok(())
    }

    /// Enter `Failed` for `error`, reporting the state it interrupted
    ///
    /// From `Idle` the error is still reported but the state is left alone,
    /// since no work had started.
    pub fn fail(&mut self, error: &SmartCutError) {
        let interrupted = self.state;
        let failed = ProcessingState::Failed(error.kind());
        if interrupted.can_transition_to(failed) {
            tracing::debug!(from = ?interrupted, kind = %error.kind(), "processing failed");
            self.state = failed;
            self.reporter
                .report_progress(ProgressUpdate::new(failed, self.start_time));
        }
        self.reporter.report_error(interrupted, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        states: Mutex<Vec<ProcessingState>>,
        errors: Mutex<Vec<(ProcessingState, ErrorKind)>>,
        completions: Mutex<usize>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.states.lock().unwrap().push(update.state);
        }

        fn report_completion(&self, _timings: &ProcessingTimings) {
            *self.completions.lock().unwrap() += 1;
        }

        fn report_error(&self, state: ProcessingState, error: &SmartCutError) {
            self.errors.lock().unwrap().push((state, error.kind()));
        }
    }

    #[test]
    fn test_transition_rules() {
        use ProcessingState::*;
        assert!(Idle.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Inferring));
        assert!(Inferring.can_transition_to(Postprocessing));
        assert!(Postprocessing.can_transition_to(Done));
        assert!(Inferring.can_transition_to(Failed(ErrorKind::Inference)));

        assert!(!Idle.can_transition_to(Failed(ErrorKind::InvalidInput)));
        assert!(!Idle.can_transition_to(Inferring));
        assert!(!Done.can_transition_to(Failed(ErrorKind::Internal)));
        assert!(!Failed(ErrorKind::Cancelled).can_transition_to(Preparing));
    }

    #[test]
    fn test_tracker_happy_path() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut tracker = ProgressTracker::new(reporter.clone());

        tracker.advance(ProcessingState::Preparing).unwrap();
        tracker.advance(ProcessingState::Inferring).unwrap();
        tracker.advance(ProcessingState::Postprocessing).unwrap();
        tracker.complete(&ProcessingTimings::default()).unwrap();

        assert_eq!(
            *reporter.states.lock().unwrap(),
            vec![
                ProcessingState::Preparing,
                ProcessingState::Inferring,
                ProcessingState::Postprocessing,
                ProcessingState::Done
            ]
        );
        assert_eq!(*reporter.completions.lock().unwrap(), 1);
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn test_tracker_rejects_skipped_state() {
        let mut tracker = ProgressTracker::no_op();
        assert!(tracker.advance(ProcessingState::Inferring).is_err());
        assert_eq!(tracker.state(), ProcessingState::Idle);
    }

    #[test]
    fn test_tracker_failure() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut tracker = ProgressTracker::new(reporter.clone());

        tracker.advance(ProcessingState::Preparing).unwrap();
        tracker.advance(ProcessingState::Inferring).unwrap();
        tracker.fail(&SmartCutError::inference("engine crashed"));

        assert_eq!(
            tracker.state(),
            ProcessingState::Failed(ErrorKind::Inference)
        );
        assert_eq!(
            *reporter.errors.lock().unwrap(),
            vec![(ProcessingState::Inferring, ErrorKind::Inference)]
        );
    }
}
