//! Service layer for I/O and progress reporting

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingState, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
