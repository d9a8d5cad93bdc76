//! Knobs shared by the type registry and the encoding parser.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the encoding parser picks the starting point for members without an explicit `@offset`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OffsetBaseline {
    /// Only auto-placed members advance the running offset. An `@offset` member is placed
    /// verbatim and the next unlabeled member continues after the previous auto-placed one.
    #[default]
    AutoOnly,
    /// Every member advances the running offset, including explicitly placed ones.
    LastMember,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayoutConfig {
    pub offset_baseline: OffsetBaseline,
    /// Register the native C scalar types and their short aliases on construction.
    pub prelude: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            offset_baseline: OffsetBaseline::AutoOnly,
            prelude: true,
        }
    }
}

impl LayoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_baseline(mut self, baseline: OffsetBaseline) -> Self {
        self.offset_baseline = baseline;
        self
    }

    pub fn prelude(mut self, enabled: bool) -> Self {
        self.prelude = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_documented_parser_behavior() {
        // the literal grammar keeps explicit offsets out of the running baseline
        let config = LayoutConfig::default();
        assert_eq!(config.offset_baseline, OffsetBaseline::AutoOnly);
        assert!(config.prelude, "builtin scalars should be available by default");
    }

    #[test]
    fn fluent_setters_override_fields() {
        let config = LayoutConfig::new()
            .offset_baseline(OffsetBaseline::LastMember)
            .prelude(false);
        assert_eq!(config.offset_baseline, OffsetBaseline::LastMember);
        assert!(!config.prelude);
    }
}
