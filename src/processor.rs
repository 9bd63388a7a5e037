//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns the one inference session of the process
//! and drives every request through preprocessing, inference, mask extraction,
//! normalization and compositing. Clones share the session behind a mutex, so
//! at most one request talks to the engine at any time.
//!
//! A processor is always constructible. When the model cannot be opened the
//! failure is captured and reported through [`Readiness`]; every later request
//! returns that failure without touching the image.

use crate::{
    config::RemovalConfig,
    error::{ErrorKind, Result, SmartCutError},
    inference::{DefaultSessionFactory, InferenceSession, ModelIoSpec, SessionFactory},
    postprocessing::{Compositor, MaskExtractor, MaskNormalizer, NormalizationOptions},
    services::{
        ImageIOService, NoOpProgressReporter, ProcessingState, ProgressReporter, ProgressTracker,
    },
    tensor::NamedTensors,
    types::{CutoutResult, ProcessingMetadata, ProcessingTimings},
    utils::{ImagePreprocessor, TensorValidator},
};
use image::{DynamicImage, GenericImageView};
use instant::Instant;
use log::{debug, error, info};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug as trace_debug, info as trace_info, instrument, span, Level};

/// Whether the processor can serve requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Initialization failed; requests return the captured error
    NotReady { kind: ErrorKind, reason: String },
}

impl Readiness {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

type SharedSession = Arc<Mutex<Box<dyn InferenceSession>>>;

/// Pipeline orchestrator over a single shared inference session
#[derive(Clone)]
pub struct BackgroundRemovalProcessor {
    config: Arc<RemovalConfig>,
    session: Option<SharedSession>,
    io_spec: Option<ModelIoSpec>,
    backend_name: &'static str,
    readiness: Readiness,
    init_error: Option<Arc<SmartCutError>>,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("io_spec", &self.io_spec)
            .field("backend", &self.backend_name)
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Open the configured model with the engines compiled into this build
    ///
    /// Never fails: a missing or unusable model leaves the processor
    /// `NotReady` with the reason attached.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use smartcut::{BackgroundRemovalProcessor, RemovalConfig};
    ///
    /// let config = RemovalConfig::builder().model_path("models/u2net.onnx").build()?;
    /// let processor = BackgroundRemovalProcessor::new(config);
    /// if processor.is_ready() {
    ///     let written = processor.remove_background_to_file("portrait.jpg")?;
    ///     println!("saved {}", written.display());
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new(config: RemovalConfig) -> Self {
        Self::with_factory(config, &DefaultSessionFactory)
    }

    /// Open the configured model through `factory`
    #[must_use]
    pub fn with_factory(config: RemovalConfig, factory: &dyn SessionFactory) -> Self {
        let opened = config.validate().and_then(|()| factory.open(&config));
        match opened {
            Ok(session) => Self::with_session(config, session),
            Err(e) => Self::not_ready(config, e),
        }
    }

    /// Use an already opened session
    ///
    /// Input/output names and the input resolution are resolved once here.
    #[must_use]
    pub fn with_session(config: RemovalConfig, session: Box<dyn InferenceSession>) -> Self {
        let resolved = config
            .validate()
            .and_then(|()| ModelIoSpec::resolve(session.as_ref(), &config));
        let io_spec = match resolved {
            Ok(spec) => spec,
            Err(e) => return Self::not_ready(config, e),
        };

        info!(
            "Session ready on {} backend: input '{}' {}x{}, output '{}'",
            session.backend_name(),
            io_spec.input_name,
            io_spec.input_height,
            io_spec.input_width,
            io_spec.output_name
        );

        Self {
            config: Arc::new(config),
            backend_name: session.backend_name(),
            session: Some(Arc::new(Mutex::new(session))),
            io_spec: Some(io_spec),
            readiness: Readiness::Ready,
            init_error: None,
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    fn not_ready(config: RemovalConfig, err: SmartCutError) -> Self {
        error!("Background removal unavailable: {}", err);
        Self {
            config: Arc::new(config),
            session: None,
            io_spec: None,
            backend_name: "none",
            readiness: Readiness::NotReady {
                kind: err.kind(),
                reason: err.to_string(),
            },
            init_error: Some(Arc::new(err)),
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    /// Report state transitions of every request to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Resolved model I/O, `None` while not ready
    #[must_use]
    pub fn io_spec(&self) -> Option<&ModelIoSpec> {
        self.io_spec.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Engine identifier of the open session (`"none"` while not ready)
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Remove the background of `image`
    ///
    /// # Errors
    /// - The captured initialization error while not ready
    /// - `InvalidInput` / `ResourceExhausted` for unusable source dimensions
    /// - `Inference` / `UnsupportedTensorShape` from the model run
    pub fn process_image(&self, image: DynamicImage) -> Result<CutoutResult> {
        self.process_image_with_cancel(image, &CancellationToken::new())
    }

    /// Remove the background of `image`, checking `cancel` between stages
    ///
    /// A stage that has started always finishes; cancellation is observed at
    /// the next stage boundary and ends the request with `Cancelled`.
    ///
    /// # Errors
    /// - Everything [`Self::process_image`] returns
    /// - `Cancelled` when `cancel` fires before the result is composed
    #[instrument(
        skip(self, image, cancel),
        fields(
            backend = self.backend_name,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image_with_cancel(
        &self,
        image: DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<CutoutResult> {
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));
        let (session, io_spec) = match self.ready_parts() {
            Ok(parts) => parts,
            Err(e) => {
                tracker.fail(&e);
                return Err(e);
            },
        };

        match self.run_pipeline(session, io_spec, image, cancel, &mut tracker) {
            Ok(result) => Ok(result),
            Err(e) => {
                debug!("Request failed in state {:?}: {}", tracker.state(), e);
                tracker.fail(&e);
                Err(e)
            },
        }
    }

    /// Decode and process an image file
    ///
    /// # Errors
    /// - The captured initialization error while not ready, before the file is read
    /// - `Io` / `Image` when the file cannot be read or decoded
    /// - Everything [`Self::process_image`] returns
    pub fn process_file<P: AsRef<Path>>(&self, input_path: P) -> Result<CutoutResult> {
        self.ensure_ready()?;
        let image = ImageIOService::load_image(input_path)?;
        self.process_image(image)
    }

    /// Decode and process an encoded image held in memory
    ///
    /// # Errors
    /// - The captured initialization error while not ready
    /// - `InvalidInput` / `Image` when the bytes cannot be decoded
    /// - Everything [`Self::process_image`] returns
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<CutoutResult> {
        self.ensure_ready()?;
        let image = ImageIOService::load_from_bytes(image_bytes)?;
        self.process_image(image)
    }

    /// Process `input_path` and save the cutout beside it as
    /// `<stem><output_suffix>.png`, returning the written path
    ///
    /// # Errors
    /// - Everything [`Self::process_file`] returns
    /// - `Io` / `Image` when the PNG cannot be written
    pub fn remove_background_to_file<P: AsRef<Path>>(&self, input_path: P) -> Result<PathBuf> {
        let input_path = input_path.as_ref();
        let result = self.process_file(input_path)?;
        result.save_beside(input_path, &self.config.output_suffix)
    }

    /// Run [`Self::process_image`] on a blocking worker thread
    ///
    /// # Errors
    /// - Everything [`Self::process_image`] returns
    /// - `Internal` when the worker task panics or is aborted
    pub async fn process_image_async(&self, image: DynamicImage) -> Result<CutoutResult> {
        self.process_image_async_with_cancel(image, CancellationToken::new())
            .await
    }

    /// Run [`Self::process_image_with_cancel`] on a blocking worker thread
    ///
    /// # Errors
    /// - Everything [`Self::process_image_with_cancel`] returns
    /// - `Internal` when the worker task panics or is aborted
    pub async fn process_image_async_with_cancel(
        &self,
        image: DynamicImage,
        cancel: CancellationToken,
    ) -> Result<CutoutResult> {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || processor.process_image_with_cancel(image, &cancel))
            .await
            .map_err(|e| SmartCutError::internal(format!("Processing worker failed: {}", e)))?
    }

    /// Run [`Self::remove_background_to_file`] on a blocking worker thread
    ///
    /// # Errors
    /// - Everything [`Self::remove_background_to_file`] returns
    /// - `Internal` when the worker task panics or is aborted
    pub async fn remove_background_to_file_async<P: AsRef<Path>>(
        &self,
        input_path: P,
    ) -> Result<PathBuf> {
        let processor = self.clone();
        let input_path = input_path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || processor.remove_background_to_file(input_path))
            .await
            .map_err(|e| SmartCutError::internal(format!("Processing worker failed: {}", e)))?
    }

    fn ensure_ready(&self) -> Result<()> {
        self.ready_parts().map(|_| ())
    }

    fn ready_parts(&self) -> Result<(&SharedSession, &ModelIoSpec)> {
        match (&self.session, &self.io_spec) {
            (Some(session), Some(io_spec)) => Ok((session, io_spec)),
            _ => Err(self.init_error.as_deref().map_or_else(
                || SmartCutError::internal("Processor has no session"),
                SmartCutError::duplicate,
            )),
        }
    }

    fn run_pipeline(
        &self,
        session: &SharedSession,
        io_spec: &ModelIoSpec,
        image: DynamicImage,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
    ) -> Result<CutoutResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let original_dimensions = image.dimensions();
        let (input_height, input_width) = io_spec.input_size();
        let filter = self.config.resize_filter.filter_type();

        tracker.advance(ProcessingState::Preparing)?;
        check_cancelled(cancel)?;
        TensorValidator::validate_image_dimensions(
            original_dimensions.0,
            original_dimensions.1,
            self.config.max_pixels,
        )?;

        trace_info!(
            backend = self.backend_name,
            width = original_dimensions.0,
            height = original_dimensions.1,
            "Starting background removal"
        );

        let lock_start = Instant::now();
        // Sessions hold no state a panicked request could leave half-updated
        let mut engine = session.lock().unwrap_or_else(|poisoned| {
            log::warn!("Recovering inference session after a panicked request");
            poisoned.into_inner()
        });
        timings.lock_wait_ms = lock_start.elapsed().as_millis() as u64;
        if timings.lock_wait_ms > 0 {
            trace_debug!(wait_ms = timings.lock_wait_ms, "Waited for inference session");
        }

        let input_tensor = {
            let _span = span!(
                Level::DEBUG,
                "preprocessing",
                original_width = %original_dimensions.0,
                original_height = %original_dimensions.1
            )
            .entered();
            let start = Instant::now();
            let tensor =
                ImagePreprocessor::prepare(&image, (input_height, input_width), filter)?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            tensor
        };

        check_cancelled(cancel)?;
        tracker.advance(ProcessingState::Inferring)?;

        let outputs = {
            let _span = span!(
                Level::INFO,
                "inference",
                backend = self.backend_name,
                input = %io_spec.input_name
            )
            .entered();
            let start = Instant::now();
            let mut feeds = NamedTensors::new();
            feeds.insert(io_spec.input_name.as_str(), input_tensor);
            let outputs = panic::catch_unwind(AssertUnwindSafe(|| engine.run(feeds)))
                .map_err(|payload| {
                    SmartCutError::processing_stage_error(
                        "inference",
                        &format!("engine panicked: {}", panic_message(payload.as_ref())),
                        Some(&format!("{}x{}", input_width, input_height)),
                    )
                })??;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            outputs
        };

        check_cancelled(cancel)?;
        tracker.advance(ProcessingState::Postprocessing)?;

        let mut metadata = ProcessingMetadata::new(io_spec.input_size());
        let (cutout, mask) = {
            let _span = span!(
                Level::DEBUG,
                "postprocessing",
                width = %original_dimensions.0,
                height = %original_dimensions.1
            )
            .entered();
            let start = Instant::now();

            if let Some((name, tensor)) = outputs.get_or_first(&io_spec.output_name) {
                metadata.output_name = name.to_string();
                metadata.output_shape = tensor.shape().to_vec();
            }
            let confidence = MaskExtractor::extract(
                &outputs,
                &io_spec.output_name,
                input_height as usize,
                input_width as usize,
            )?;
            let model_mask = MaskNormalizer::normalize(
                &confidence,
                NormalizationOptions::from(&*self.config),
            )?;
            let composed = Compositor::composite(image.into_rgba8(), &model_mask, filter)?;
            timings.postprocessing_ms = start.elapsed().as_millis() as u64;
            composed
        };
        drop(engine);

        let stats = mask.statistics();
        debug!(
            "Mask {}x{}: {:.1}% foreground ({} of {} pixels)",
            mask.width(),
            mask.height(),
            stats.foreground_ratio * 100.0,
            stats.foreground_pixels,
            stats.total_pixels
        );

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!("{}", timings.summary());
        tracker.complete(&timings)?;

        metadata.timings = timings;
        Ok(CutoutResult::new(
            cutout,
            mask,
            original_dimensions,
            metadata,
        ))
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(SmartCutError::Cancelled)
    } else {
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockSession;
    use crate::inference::TensorSpec;
    use crate::services::ProgressUpdate;
    use crate::tensor::Tensor;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::Ordering;

    fn config() -> RemovalConfig {
        RemovalConfig::builder()
            .model_path("/unused/u2net.onnx")
            .build()
            .unwrap()
    }

    fn half_mask_session() -> MockSession {
        let tensor = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        MockSession::returning(2, 2, tensor)
    }

    #[derive(Default)]
    struct RecordingReporter {
        states: Mutex<Vec<ProcessingState>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.states.lock().unwrap().push(update.state);
        }

        fn report_completion(&self, _timings: &ProcessingTimings) {}

        fn report_error(&self, _state: ProcessingState, _error: &SmartCutError) {}
    }

    #[test]
    fn test_processes_with_mock_session() {
        let processor =
            BackgroundRemovalProcessor::with_session(config(), Box::new(half_mask_session()));
        assert!(processor.is_ready());
        assert_eq!(processor.backend_name(), "mock");

        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        let result = processor.process_image(image).unwrap();

        assert_eq!(result.dimensions(), (2, 2));
        assert_eq!(result.image.get_pixel(0, 0).0, [10, 20, 30, 0]);
        assert_eq!(result.image.get_pixel(1, 0).0, [10, 20, 30, 255]);
        assert_eq!(result.metadata.output_name, "output");
        assert_eq!(result.metadata.output_shape, vec![1, 1, 2, 2]);
        assert_eq!(result.metadata.model_input_size, (2, 2));
    }

    #[test]
    fn test_not_ready_returns_init_error_without_running() {
        let failing = |_: &RemovalConfig| -> Result<Box<dyn InferenceSession>> {
            Err(SmartCutError::model_missing("/missing/u2net.onnx"))
        };
        struct FnFactory<F>(F);
        impl<F> SessionFactory for FnFactory<F>
        where
            F: Fn(&RemovalConfig) -> Result<Box<dyn InferenceSession>> + Send + Sync,
        {
            fn open(&self, config: &RemovalConfig) -> Result<Box<dyn InferenceSession>> {
                (self.0)(config)
            }

            fn available_backends(&self) -> Vec<crate::config::BackendType> {
                Vec::new()
            }
        }

        let processor = BackgroundRemovalProcessor::with_factory(config(), &FnFactory(failing));
        assert!(!processor.is_ready());
        assert!(processor.io_spec().is_none());
        match processor.readiness() {
            Readiness::NotReady { kind, reason } => {
                assert_eq!(*kind, ErrorKind::ModelMissing);
                assert!(reason.contains("/missing/u2net.onnx"));
            },
            Readiness::Ready => panic!("expected NotReady"),
        }

        let image = DynamicImage::new_rgb8(4, 4);
        let err = processor.process_image(image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelMissing);

        let err = processor.process_bytes(b"not decoded").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelMissing);
    }

    #[test]
    fn test_session_without_outputs_is_not_ready() {
        let session = MockSession::new(
            vec![TensorSpec::fixed("input", &[1, 3, 8, 8])],
            Vec::new(),
            |_| Ok(NamedTensors::new()),
        );
        let processor = BackgroundRemovalProcessor::with_session(config(), Box::new(session));
        assert_eq!(
            processor.readiness(),
            &Readiness::NotReady {
                kind: ErrorKind::SessionInitFailure,
                reason: "Failed to initialize inference session: Model declares no outputs"
                    .to_string(),
            }
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let session = half_mask_session();
        let counter = session.call_counter();
        let processor = BackgroundRemovalProcessor::with_session(config(), Box::new(session));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = processor
            .process_image_with_cancel(DynamicImage::new_rgb8(2, 2), &cancel)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_area_image_fails_in_preparing() {
        let reporter = Arc::new(RecordingReporter::default());
        let processor =
            BackgroundRemovalProcessor::with_session(config(), Box::new(half_mask_session()))
                .with_progress_reporter(reporter.clone());

        let err = processor
            .process_image(DynamicImage::new_rgb8(0, 5))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            *reporter.states.lock().unwrap(),
            vec![
                ProcessingState::Preparing,
                ProcessingState::Failed(ErrorKind::InvalidInput)
            ]
        );
    }

    #[test]
    fn test_oversized_image_is_resource_exhausted() {
        let config = RemovalConfig::builder()
            .model_path("/unused/u2net.onnx")
            .max_pixels(15)
            .build()
            .unwrap();
        let processor =
            BackgroundRemovalProcessor::with_session(config, Box::new(half_mask_session()));

        let err = processor
            .process_image(DynamicImage::new_rgb8(4, 4))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_states_reported_in_order() {
        let reporter = Arc::new(RecordingReporter::default());
        let processor =
            BackgroundRemovalProcessor::with_session(config(), Box::new(half_mask_session()))
                .with_progress_reporter(reporter.clone());

        processor
            .process_image(DynamicImage::new_rgb8(3, 3))
            .unwrap();
        assert_eq!(
            *reporter.states.lock().unwrap(),
            vec![
                ProcessingState::Preparing,
                ProcessingState::Inferring,
                ProcessingState::Postprocessing,
                ProcessingState::Done
            ]
        );
    }
}
