use std::sync::Arc;

use tokio::sync::broadcast;

use crate::driver::MatchOptions;
use crate::errors::{LocatorError, LocatorResult};
use crate::imaging::extract::extract;
use crate::imaging::upload::{decode_upload, validate_upload, UploadedFile};
use crate::imaging::{to_natural_rect, DisplayedRect, EncodedImage, ImageDimensions};
use crate::locator::event_bus::{EventBus, NoticeLevel, WorkflowEvent};
use crate::locator::matcher::{MatchInvoker, MatchResult};
use crate::locator::screenshot::{Screenshot, ScreenshotSource};
use crate::locator::state::{Action, Candidate, CandidateOrigin, Effect, WorkflowState};
use crate::locator::strategy::LocatorStrategy;

/// Generation an async request was issued against. Its completion is only
/// applied while the workflow is still at that generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Pending screenshot capture. Run it without holding the workflow, then hand
/// the completion back with [`LocatorWorkflow::finish_capture`].
pub struct CaptureRequest {
    ticket: Ticket,
    source: Arc<dyn ScreenshotSource>,
}

pub struct CaptureCompletion {
    pub ticket: Ticket,
    pub result: LocatorResult<Screenshot>,
}

impl CaptureRequest {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub async fn run(self) -> CaptureCompletion {
        let result = match self.source.capture().await {
            Ok(image) => Screenshot::load(image)
                .await
                .map_err(|e| LocatorError::CaptureFailed(e.to_string())),
            Err(e) => Err(e),
        };
        CaptureCompletion {
            ticket: self.ticket,
            result,
        }
    }
}

/// Pending template search; see [`CaptureRequest`].
pub struct SearchRequest {
    ticket: Ticket,
    matcher: Arc<dyn MatchInvoker>,
    screenshot: EncodedImage,
    candidate: EncodedImage,
    options: MatchOptions,
}

pub struct SearchCompletion {
    pub ticket: Ticket,
    pub result: MatchResult,
}

impl SearchRequest {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub async fn run(self) -> SearchCompletion {
        let result = self
            .matcher
            .match_images(&self.screenshot, &self.candidate, &self.options)
            .await;
        SearchCompletion {
            ticket: self.ticket,
            result,
        }
    }
}

/// Copy of a capture error for the caller, keeping a single `CaptureFailed`
/// prefix.
fn capture_failure(err: &LocatorError) -> LocatorError {
    match err {
        LocatorError::CaptureFailed(msg) => LocatorError::CaptureFailed(msg.clone()),
        other => LocatorError::CaptureFailed(other.to_string()),
    }
}

/// Orchestrates screenshot capture, candidate selection and matching for one
/// inspector panel. Each instance owns its state exclusively.
pub struct LocatorWorkflow {
    state: WorkflowState,
    generation: u64,
    /// Rendered size of the current screenshot as reported by the UI.
    displayed_size: Option<(u32, u32)>,
    options: MatchOptions,
    screenshots: Arc<dyn ScreenshotSource>,
    matcher: Arc<dyn MatchInvoker>,
    events: EventBus,
}

impl LocatorWorkflow {
    pub fn new(
        screenshots: Arc<dyn ScreenshotSource>,
        matcher: Arc<dyn MatchInvoker>,
        options: MatchOptions,
    ) -> Self {
        Self {
            state: WorkflowState::Idle,
            generation: 0,
            displayed_size: None,
            options,
            screenshots,
            matcher,
            events: EventBus::default(),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: MatchOptions) {
        self.options = options;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Dimensions of the loaded screenshot. Displayed size is zero until the
    /// UI reports it through [`LocatorWorkflow::set_displayed_size`].
    pub fn dimensions(&self) -> Option<ImageDimensions> {
        let shot = self.state.screenshot()?;
        Some(ImageDimensions::new(
            self.displayed_size.unwrap_or((0, 0)),
            shot.natural_size(),
        ))
    }

    fn apply(&mut self, action: Action) -> LocatorResult<Effect> {
        let action_name = action.name();
        let (next, effect) = self.state.apply(action)?;
        let replaces_screenshot = next.screenshot() != self.state.screenshot();
        self.state = next;
        self.generation += 1;
        if replaces_screenshot {
            self.displayed_size = None;
        }
        tracing::debug!(
            action = action_name,
            state = self.state.name(),
            generation = self.generation,
            "workflow transition"
        );
        self.events.publish(WorkflowEvent::StateChanged {
            generation: self.generation,
            state: self.state.clone(),
        });
        Ok(effect)
    }

    fn reject(&self, err: LocatorError) -> LocatorError {
        self.events.notice(NoticeLevel::Error, err.to_string());
        err
    }

    /// Switch locator strategy. Selecting the image strategy (again) discards
    /// any screenshot and returns the capture to run.
    pub fn select_strategy(&mut self, strategy: LocatorStrategy) -> Option<CaptureRequest> {
        tracing::info!(strategy = %strategy, "locator strategy selected");
        match self.apply(Action::SelectStrategy(strategy)) {
            Ok(Effect::CaptureScreenshot) => Some(CaptureRequest {
                ticket: Ticket {
                    generation: self.generation,
                },
                source: self.screenshots.clone(),
            }),
            Ok(_) => None,
            Err(e) => {
                tracing::error!(error = %e, "strategy selection rejected");
                None
            }
        }
    }

    /// Apply a capture completion. Returns `false` when it was stale and
    /// ignored.
    pub fn finish_capture(&mut self, completion: CaptureCompletion) -> bool {
        if completion.ticket.generation != self.generation {
            tracing::debug!(
                ticket = completion.ticket.generation,
                current = self.generation,
                "discarding stale screenshot"
            );
            return false;
        }

        let outcome = match completion.result {
            Ok(shot) => {
                tracing::info!(width = shot.width, height = shot.height, "screenshot ready");
                self.apply(Action::ScreenshotLoaded(shot))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to take screenshot");
                self.events.notice(NoticeLevel::Error, e.to_string());
                self.apply(Action::ScreenshotFailed)
            }
        };
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "capture completion did not apply");
            return false;
        }
        true
    }

    /// Select the image strategy and wait for its screenshot.
    pub async fn refresh_screenshot(&mut self) -> LocatorResult<()> {
        let request = self
            .select_strategy(LocatorStrategy::Image)
            .ok_or_else(|| LocatorError::CaptureFailed("capture was not requested".into()))?;
        let completion = request.run().await;
        let failure = completion.result.as_ref().err().map(capture_failure);
        self.finish_capture(completion);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Record the rendered size of the current screenshot (the UI's image
    /// load callback).
    pub fn set_displayed_size(&mut self, width: u32, height: u32) -> LocatorResult<()> {
        if self.state.screenshot().is_none() {
            return Err(LocatorError::NoScreenshot);
        }
        tracing::debug!(width, height, "screenshot measured");
        self.displayed_size = Some((width, height));
        Ok(())
    }

    /// Enter free-form crop mode with no selection. Any previous draft or
    /// candidate is dropped.
    pub fn start_cropping(&mut self) -> LocatorResult<()> {
        self.apply(Action::StartCropping)
            .map(|_| ())
            .map_err(|e| self.reject(e))
    }

    /// Replace the draft selection. Kept in displayed space until completion.
    pub fn update_crop(&mut self, rect: DisplayedRect) -> LocatorResult<()> {
        self.apply(Action::UpdateCrop(rect)).map(|_| ())
    }

    /// Turn the draft selection into the candidate.
    ///
    /// Returns `Ok(false)` without changing anything when not cropping or when
    /// no selection has been drawn yet.
    pub fn complete_cropping(&mut self) -> LocatorResult<bool> {
        let (screenshot, draft) = match &self.state {
            WorkflowState::Cropping {
                screenshot,
                draft: Some(draft),
            } => (screenshot, *draft),
            _ => {
                tracing::debug!(state = self.state.name(), "nothing to crop");
                return Ok(false);
            }
        };

        let dims = ImageDimensions::new(
            self.displayed_size.unwrap_or((0, 0)),
            screenshot.natural_size(),
        );
        let cropped = to_natural_rect(&draft, &dims)
            .and_then(|rect| extract(screenshot.raster(), &rect).map(|image| (rect, image)));
        let (rect, image) = cropped.map_err(|e| self.reject(e))?;

        tracing::info!(?rect, bytes = image.len(), "crop completed");
        self.apply(Action::SelectCandidate(Candidate {
            image,
            origin: CandidateOrigin::Crop { rect },
        }))?;
        Ok(true)
    }

    /// Use an uploaded file as the candidate. Non-image media types are
    /// rejected before anything else happens.
    pub async fn upload(&mut self, file: UploadedFile) -> LocatorResult<()> {
        validate_upload(&file).map_err(|e| self.reject(e))?;
        if self.state.screenshot().is_none() {
            return Err(self.reject(LocatorError::NoScreenshot));
        }

        let file_name = file.name.clone();
        let image = decode_upload(file).await.map_err(|e| self.reject(e))?;
        self.apply(Action::SelectCandidate(Candidate {
            image,
            origin: CandidateOrigin::Upload { file_name },
        }))?;
        Ok(())
    }

    /// Start a search for the current candidate.
    pub fn begin_search(&mut self) -> LocatorResult<SearchRequest> {
        match self.apply(Action::BeginSearch)? {
            Effect::RunMatch {
                screenshot,
                candidate,
            } => Ok(SearchRequest {
                ticket: Ticket {
                    generation: self.generation,
                },
                matcher: self.matcher.clone(),
                screenshot,
                candidate,
                options: self.options,
            }),
            other => Err(LocatorError::MatchFailed(format!(
                "search produced unexpected effect {other:?}"
            ))),
        }
    }

    /// Apply a search completion. Returns `false` when it was stale.
    pub fn finish_search(&mut self, completion: SearchCompletion) -> bool {
        if completion.ticket.generation != self.generation {
            tracing::debug!(
                ticket = completion.ticket.generation,
                current = self.generation,
                "discarding stale match result"
            );
            return false;
        }
        match self.apply(Action::SearchFinished(completion.result)) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "search completion did not apply");
                false
            }
        }
    }

    /// Search and wait for the result.
    pub async fn search(&mut self) -> LocatorResult<MatchResult> {
        let request = self.begin_search()?;
        let completion = request.run().await;
        let result = completion.result.clone();
        self.finish_search(completion);
        Ok(result)
    }

    /// Drop the match result, keeping screenshot and candidate.
    pub fn clear_results(&mut self) -> LocatorResult<()> {
        self.apply(Action::ClearResult).map(|_| ())
    }
}
