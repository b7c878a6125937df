pub mod event_bus;
pub mod matcher;
pub mod screenshot;
pub mod state;
pub mod strategy;
pub mod workflow;

pub use event_bus::{EventBus, NoticeLevel, WorkflowEvent};
pub use matcher::{DriverMatcher, MatchInvoker, MatchResult};
pub use screenshot::{DriverScreenshotSource, Screenshot, ScreenshotSource};
pub use state::{Candidate, CandidateOrigin, WorkflowState};
pub use strategy::{available_strategies, LocatorStrategy};
pub use workflow::LocatorWorkflow;
