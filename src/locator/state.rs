/// Image-locator workflow states and the pure transition function between
/// them. Side effects (capture, match) are returned as [`Effect`]s for the
/// orchestrator to run.
use serde::Serialize;

use crate::errors::{LocatorError, LocatorResult};
use crate::imaging::{DisplayedRect, EncodedImage, NaturalRect};
use crate::locator::matcher::MatchResult;
use crate::locator::screenshot::Screenshot;
use crate::locator::strategy::LocatorStrategy;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateOrigin {
    Upload { file_name: String },
    Crop { rect: NaturalRect },
}

/// The sub-image that will be searched for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub image: EncodedImage,
    pub origin: CandidateOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    AwaitingScreenshot,
    Ready {
        screenshot: Screenshot,
    },
    Cropping {
        screenshot: Screenshot,
        draft: Option<DisplayedRect>,
    },
    CandidateSelected {
        screenshot: Screenshot,
        candidate: Candidate,
    },
    Searching {
        screenshot: Screenshot,
        candidate: Candidate,
    },
    Resolved {
        screenshot: Screenshot,
        candidate: Candidate,
        result: MatchResult,
    },
}

/// Inputs to the state machine: user actions and async completions.
#[derive(Debug, Clone)]
pub enum Action {
    SelectStrategy(LocatorStrategy),
    ScreenshotLoaded(Screenshot),
    ScreenshotFailed,
    StartCropping,
    UpdateCrop(DisplayedRect),
    SelectCandidate(Candidate),
    BeginSearch,
    SearchFinished(MatchResult),
    ClearResult,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectStrategy(_) => "select a strategy",
            Self::ScreenshotLoaded(_) => "load a screenshot",
            Self::ScreenshotFailed => "fail a screenshot",
            Self::StartCropping => "start cropping",
            Self::UpdateCrop(_) => "update the crop",
            Self::SelectCandidate(_) => "select a candidate",
            Self::BeginSearch => "search",
            Self::SearchFinished(_) => "finish a search",
            Self::ClearResult => "clear results",
        }
    }
}

/// Work the orchestrator must start after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    CaptureScreenshot,
    RunMatch {
        screenshot: EncodedImage,
        candidate: EncodedImage,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingScreenshot => "awaiting a screenshot",
            Self::Ready { .. } => "ready",
            Self::Cropping { .. } => "cropping",
            Self::CandidateSelected { .. } => "holding a candidate",
            Self::Searching { .. } => "searching",
            Self::Resolved { .. } => "showing a result",
        }
    }

    pub fn screenshot(&self) -> Option<&Screenshot> {
        match self {
            Self::Idle | Self::AwaitingScreenshot => None,
            Self::Ready { screenshot }
            | Self::Cropping { screenshot, .. }
            | Self::CandidateSelected { screenshot, .. }
            | Self::Searching { screenshot, .. }
            | Self::Resolved { screenshot, .. } => Some(screenshot),
        }
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Self::CandidateSelected { candidate, .. }
            | Self::Searching { candidate, .. }
            | Self::Resolved { candidate, .. } => Some(candidate),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&MatchResult> {
        match self {
            Self::Resolved { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_cropping(&self) -> bool {
        matches!(self, Self::Cropping { .. })
    }

    pub fn draft(&self) -> Option<&DisplayedRect> {
        match self {
            Self::Cropping { draft, .. } => draft.as_ref(),
            _ => None,
        }
    }

    /// Search is offered once a candidate exists and no search is running.
    pub fn can_search(&self) -> bool {
        matches!(self, Self::CandidateSelected { .. } | Self::Resolved { .. })
    }

    fn invalid(&self, action: &Action) -> LocatorError {
        LocatorError::InvalidTransition {
            action: action.name(),
            state: self.name(),
        }
    }

    /// Compute the next state for `action`. Never mutates `self`; a rejected
    /// action leaves the caller's state untouched.
    pub fn apply(&self, action: Action) -> LocatorResult<(WorkflowState, Effect)> {
        match action {
            Action::SelectStrategy(strategy) => {
                if strategy.is_image() {
                    Ok((Self::AwaitingScreenshot, Effect::CaptureScreenshot))
                } else {
                    Ok((Self::Idle, Effect::None))
                }
            }

            Action::ScreenshotLoaded(screenshot) => match self {
                Self::AwaitingScreenshot => Ok((Self::Ready { screenshot }, Effect::None)),
                _ => Err(self.invalid(&Action::ScreenshotLoaded(screenshot))),
            },

            Action::ScreenshotFailed => match self {
                Self::AwaitingScreenshot => Ok((Self::Idle, Effect::None)),
                _ => Err(self.invalid(&action)),
            },

            Action::StartCropping => {
                let screenshot = self.screenshot().ok_or(LocatorError::NoScreenshot)?;
                Ok((
                    Self::Cropping {
                        screenshot: screenshot.clone(),
                        draft: None,
                    },
                    Effect::None,
                ))
            }

            Action::UpdateCrop(rect) => match self {
                Self::Cropping { screenshot, .. } => Ok((
                    Self::Cropping {
                        screenshot: screenshot.clone(),
                        draft: Some(rect),
                    },
                    Effect::None,
                )),
                _ => Err(self.invalid(&action)),
            },

            Action::SelectCandidate(candidate) => {
                let screenshot = self.screenshot().ok_or(LocatorError::NoScreenshot)?;
                Ok((
                    Self::CandidateSelected {
                        screenshot: screenshot.clone(),
                        candidate,
                    },
                    Effect::None,
                ))
            }

            Action::BeginSearch => match self {
                Self::CandidateSelected { screenshot, candidate }
                | Self::Resolved {
                    screenshot,
                    candidate,
                    ..
                } => Ok((
                    Self::Searching {
                        screenshot: screenshot.clone(),
                        candidate: candidate.clone(),
                    },
                    Effect::RunMatch {
                        screenshot: screenshot.image.clone(),
                        candidate: candidate.image.clone(),
                    },
                )),
                _ => Err(self.invalid(&action)),
            },

            Action::SearchFinished(result) => match self {
                Self::Searching { screenshot, candidate } => Ok((
                    Self::Resolved {
                        screenshot: screenshot.clone(),
                        candidate: candidate.clone(),
                        result,
                    },
                    Effect::None,
                )),
                _ => Err(self.invalid(&Action::SearchFinished(result))),
            },

            Action::ClearResult => match self {
                Self::Resolved {
                    screenshot,
                    candidate,
                    ..
                } => Ok((
                    Self::CandidateSelected {
                        screenshot: screenshot.clone(),
                        candidate: candidate.clone(),
                    },
                    Effect::None,
                )),
                _ => Err(self.invalid(&action)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::tests::png;

    fn shot() -> Screenshot {
        Screenshot::decode(png(40, 30)).unwrap()
    }

    fn candidate() -> Candidate {
        Candidate {
            image: png(4, 4),
            origin: CandidateOrigin::Upload {
                file_name: "btn.png".into(),
            },
        }
    }

    fn step(state: &WorkflowState, action: Action) -> WorkflowState {
        state.apply(action).unwrap().0
    }

    #[test]
    fn test_image_strategy_requests_capture() {
        for start in [WorkflowState::Idle, WorkflowState::Ready { screenshot: shot() }] {
            let (next, effect) = start.apply(Action::SelectStrategy(LocatorStrategy::Image)).unwrap();
            assert_eq!(next, WorkflowState::AwaitingScreenshot);
            assert_eq!(effect, Effect::CaptureScreenshot);
        }
    }

    #[test]
    fn test_text_strategy_drops_image_state() {
        let state = WorkflowState::CandidateSelected {
            screenshot: shot(),
            candidate: candidate(),
        };
        let (next, effect) = state.apply(Action::SelectStrategy(LocatorStrategy::XPath)).unwrap();
        assert_eq!(next, WorkflowState::Idle);
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_screenshot_outcomes() {
        let s = shot();
        let ready = step(&WorkflowState::AwaitingScreenshot, Action::ScreenshotLoaded(s.clone()));
        assert_eq!(ready, WorkflowState::Ready { screenshot: s });

        let idle = step(&WorkflowState::AwaitingScreenshot, Action::ScreenshotFailed);
        assert_eq!(idle, WorkflowState::Idle);

        let err = WorkflowState::Idle.apply(Action::ScreenshotFailed).unwrap_err();
        assert!(matches!(err, LocatorError::InvalidTransition { .. }));
    }

    #[test]
    fn test_start_cropping_always_clears_draft() {
        let s = shot();
        let draft = DisplayedRect::new(1.0, 2.0, 3.0, 4.0);
        let starts = [
            WorkflowState::Ready { screenshot: s.clone() },
            WorkflowState::Cropping {
                screenshot: s.clone(),
                draft: Some(draft),
            },
            WorkflowState::CandidateSelected {
                screenshot: s.clone(),
                candidate: candidate(),
            },
            WorkflowState::Resolved {
                screenshot: s.clone(),
                candidate: candidate(),
                result: MatchResult::NotFound,
            },
        ];
        for start in starts {
            let next = step(&start, Action::StartCropping);
            assert_eq!(
                next,
                WorkflowState::Cropping {
                    screenshot: s.clone(),
                    draft: None
                }
            );
            assert!(next.candidate().is_none());
        }
    }

    #[test]
    fn test_start_cropping_needs_screenshot() {
        for start in [WorkflowState::Idle, WorkflowState::AwaitingScreenshot] {
            let err = start.apply(Action::StartCropping).unwrap_err();
            assert!(matches!(err, LocatorError::NoScreenshot));
        }
    }

    #[test]
    fn test_crop_updates_only_while_cropping() {
        let s = shot();
        let rect = DisplayedRect::new(5.0, 5.0, 10.0, 10.0);
        let cropping = WorkflowState::Cropping {
            screenshot: s.clone(),
            draft: None,
        };
        let next = step(&cropping, Action::UpdateCrop(rect));
        assert_eq!(next.draft(), Some(&rect));

        let err = WorkflowState::Ready { screenshot: s }
            .apply(Action::UpdateCrop(rect))
            .unwrap_err();
        assert!(matches!(err, LocatorError::InvalidTransition { action: "update the crop", state: "ready" }));
    }

    #[test]
    fn test_search_round_trip_and_clear() {
        let s = shot();
        let c = candidate();
        let selected = step(&WorkflowState::Ready { screenshot: s.clone() }, Action::SelectCandidate(c.clone()));
        assert!(selected.can_search());

        let (searching, effect) = selected.apply(Action::BeginSearch).unwrap();
        assert_eq!(
            effect,
            Effect::RunMatch {
                screenshot: s.image.clone(),
                candidate: c.image.clone()
            }
        );
        assert!(!searching.can_search());

        let resolved = step(&searching, Action::SearchFinished(MatchResult::NotFound));
        assert_eq!(resolved.result(), Some(&MatchResult::NotFound));

        let cleared = step(&resolved, Action::ClearResult);
        assert_eq!(cleared, selected);
    }

    #[test]
    fn test_search_requires_candidate() {
        let ready = WorkflowState::Ready { screenshot: shot() };
        assert!(!ready.can_search());
        assert!(matches!(
            ready.apply(Action::BeginSearch).unwrap_err(),
            LocatorError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_candidate_needs_screenshot() {
        let err = WorkflowState::AwaitingScreenshot
            .apply(Action::SelectCandidate(candidate()))
            .unwrap_err();
        assert!(matches!(err, LocatorError::NoScreenshot));
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let v = serde_json::to_value(WorkflowState::Ready { screenshot: shot() }).unwrap();
        assert_eq!(v["state"], "ready");
        assert_eq!(v["screenshot"]["width"], 40);
    }
}
