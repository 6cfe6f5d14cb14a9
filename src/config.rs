//! Emitter configuration.

use serde::Deserialize;

/// Knobs for the generated project. All fields have defaults; a JSON config
/// file may override any subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EmitterConfig {
    /// Loop iterations between continue-as-new checkpoints.
    pub loop_checkpoint_threshold: u32,
    /// Task queue the worker listens on. Defaults to the workflow name.
    pub task_queue: Option<String>,
    /// Activity schedule-to-close timeout when the task declares none.
    pub default_activity_timeout_secs: u64,
    /// Activity retry attempts when the task declares none.
    pub default_retry_attempts: u32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        EmitterConfig {
            loop_checkpoint_threshold: 100,
            task_queue: None,
            default_activity_timeout_secs: 60,
            default_retry_attempts: 3,
        }
    }
}
