use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LocatorError;

/// A named way of identifying a UI element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    Id,
    XPath,
    Name,
    ClassName,
    AccessibilityId,
    Image,
    Predicate,
    ClassChain,
    DataMatcher,
    ViewTag,
    UiAutomator,
}

const BASE_STRATEGIES: [LocatorStrategy; 6] = [
    LocatorStrategy::Id,
    LocatorStrategy::XPath,
    LocatorStrategy::Name,
    LocatorStrategy::ClassName,
    LocatorStrategy::AccessibilityId,
    LocatorStrategy::Image,
];

const ALL_STRATEGIES: [LocatorStrategy; 11] = [
    LocatorStrategy::Id,
    LocatorStrategy::XPath,
    LocatorStrategy::Name,
    LocatorStrategy::ClassName,
    LocatorStrategy::AccessibilityId,
    LocatorStrategy::Image,
    LocatorStrategy::Predicate,
    LocatorStrategy::ClassChain,
    LocatorStrategy::DataMatcher,
    LocatorStrategy::ViewTag,
    LocatorStrategy::UiAutomator,
];

impl LocatorStrategy {
    /// Strategy name as sent to the automation server.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::XPath => "xpath",
            Self::Name => "name",
            Self::ClassName => "class name",
            Self::AccessibilityId => "accessibility id",
            Self::Image => "-image",
            Self::Predicate => "-ios predicate string",
            Self::ClassChain => "-ios class chain",
            Self::DataMatcher => "-android datamatcher",
            Self::ViewTag => "-android viewtag",
            Self::UiAutomator => "-android uiautomator",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::XPath => "XPath",
            Self::Name => "Name",
            Self::ClassName => "Class Name",
            Self::AccessibilityId => "Accessibility ID",
            Self::Image => "Image",
            Self::Predicate => "Predicate String",
            Self::ClassChain => "Class Chain",
            Self::DataMatcher => "DataMatcher",
            Self::ViewTag => "View Tag",
            Self::UiAutomator => "UIAutomator Selector",
        }
    }

    pub fn is_image(self) -> bool {
        self == Self::Image
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for LocatorStrategy {
    type Err = LocatorError;

    /// Accepts the wire name; `image` is accepted as an alias of `-image`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("image") {
            return Ok(Self::Image);
        }
        ALL_STRATEGIES
            .iter()
            .copied()
            .find(|st| st.wire_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LocatorError::Config(format!("unknown locator strategy '{s}'")))
    }
}

/// Strategies offered for a backend. Image matching is always included.
pub fn available_strategies(automation_name: Option<&str>) -> Vec<LocatorStrategy> {
    let mut strategies = BASE_STRATEGIES.to_vec();
    let extras: &[LocatorStrategy] = match automation_name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
        Some("xcuitest") | Some("mac2") => &[LocatorStrategy::Predicate, LocatorStrategy::ClassChain],
        Some("espresso") => &[LocatorStrategy::DataMatcher, LocatorStrategy::ViewTag],
        Some("uiautomator2") => &[LocatorStrategy::UiAutomator],
        _ => &[],
    };
    strategies.extend_from_slice(extras);
    strategies
}

/// True when the UI should explain that backend-specific strategies are
/// hidden because no automation name is known.
pub fn needs_automation_name_hint(automation_name: Option<&str>) -> bool {
    automation_name.map_or(true, |n| n.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_is_always_offered() {
        for name in [None, Some(""), Some("uiautomator2"), Some("xcuitest"), Some("windows")] {
            assert!(available_strategies(name).contains(&LocatorStrategy::Image), "{name:?}");
        }
    }

    #[test]
    fn test_backend_extras() {
        let ios = available_strategies(Some("XCUITest"));
        assert!(ios.ends_with(&[LocatorStrategy::Predicate, LocatorStrategy::ClassChain]));

        let espresso = available_strategies(Some("espresso"));
        assert!(espresso.ends_with(&[LocatorStrategy::DataMatcher, LocatorStrategy::ViewTag]));

        let android = available_strategies(Some("uiautomator2"));
        assert_eq!(android.last(), Some(&LocatorStrategy::UiAutomator));

        assert_eq!(available_strategies(None).len(), 6);
    }

    #[test]
    fn test_hint_only_without_automation_name() {
        assert!(needs_automation_name_hint(None));
        assert!(needs_automation_name_hint(Some("  ")));
        assert!(!needs_automation_name_hint(Some("mac2")));
    }

    #[test]
    fn test_parse_wire_names() {
        assert_eq!("-image".parse::<LocatorStrategy>().unwrap(), LocatorStrategy::Image);
        assert_eq!("image".parse::<LocatorStrategy>().unwrap(), LocatorStrategy::Image);
        assert_eq!("class name".parse::<LocatorStrategy>().unwrap(), LocatorStrategy::ClassName);
        assert!("css selector".parse::<LocatorStrategy>().is_err());
    }
}
