pub mod appium;
pub mod traits;
pub mod types;

pub use appium::AppiumDriver;
pub use traits::Driver;
pub use types::{MatchOptions, MatchRect, MATCH_TEMPLATE_MODE};
