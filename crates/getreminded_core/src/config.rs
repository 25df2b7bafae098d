//! Coordinator configuration.
//!
//! # Invariants
//! - Defaults match the list screen: 300 ms discard delay, color `0`.

use crate::model::reminder::{ColorCode, DEFAULT_COLOR};
use std::time::Duration;

/// Delay before the discard notification, so the banner lands above the
/// floating action control instead of under it.
pub const DEFAULT_DISCARD_DELAY: Duration = Duration::from_millis(300);

/// Runtime knobs for `ReminderCoordinator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Wait applied before emitting `ReminderEvent::ReminderDiscarded`.
    pub discard_delay: Duration,
    /// Active color used until the UI picks or loads one.
    pub initial_color: ColorCode,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            discard_delay: DEFAULT_DISCARD_DELAY,
            initial_color: DEFAULT_COLOR,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_discard_delay(mut self, discard_delay: Duration) -> Self {
        self.discard_delay = discard_delay;
        self
    }

    pub fn with_initial_color(mut self, color: ColorCode) -> Self {
        self.initial_color = color;
        self
    }
}
