use serde::{Deserialize, Serialize};

use crate::red_dot_tag::RedDotTag;

/// Presentation style of a red dot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedDotType {
    #[default]
    Normal,
    Important,
    Urgent,
    Count,
    Text,
}

/// Whether a listener hears only its own tag or its descendants too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagMatch {
    #[default]
    Exact,
    Partial,
}

/// State of one node of the red-dot tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedDotInfo {
    pub tag: RedDotTag,
    /// Aggregate over this node and its registered descendants
    pub count: u32,
    /// Change made by the last mutation at or below this node
    pub delta: i64,
    /// Seconds on the manager's clock
    pub trigger_time: f64,
    pub priority: i32,
    pub dot_type: RedDotType,
}

impl RedDotInfo {
    pub fn new(tag: RedDotTag) -> Self {
        Self {
            tag,
            count: 0,
            delta: 0,
            trigger_time: 0.0,
            priority: 0,
            dot_type: RedDotType::Normal,
        }
    }

    pub fn is_active(&self) -> bool {
        self.count > 0
    }

    /// Applies `delta`, flooring at zero. Returns the change actually made.
    pub(crate) fn apply(&mut self, delta: i64) -> i64 {
        let old = self.count as i64;
        let new = (old + delta).clamp(0, u32::MAX as i64);
        self.count = new as u32;
        new - old
    }
}
