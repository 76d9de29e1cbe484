use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// App-wide settings of the plugin. Insert before adding the plugin to
/// override the defaults.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamekitConfig {
    /// Seconds between pool shrink sweeps
    pub shrink_check_period: f32,
    /// Red-dot tags registered at startup
    pub red_dot_tags: Vec<String>,
    pub log_pool_stats_on_exit: bool,
}

impl Default for GamekitConfig {
    fn default() -> Self {
        Self {
            shrink_check_period: 10.0,
            red_dot_tags: Vec::new(),
            log_pool_stats_on_exit: true,
        }
    }
}

impl GamekitConfig {
    /// Register a red-dot tag to create at startup
    pub fn register_red_dot_tag(&mut self, tag: &str) {
        self.red_dot_tags.push(tag.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: GamekitConfig =
            serde_json::from_str(r#"{ "red_dot_tags": ["Mail", "Mail.System"] }"#).unwrap();
        assert_eq!(config.shrink_check_period, 10.0);
        assert!(config.log_pool_stats_on_exit);
        assert_eq!(config.red_dot_tags, vec!["Mail", "Mail.System"]);
    }
}
