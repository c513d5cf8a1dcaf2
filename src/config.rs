//! Configuration types.

use std::time::Duration;

/// Pipeline tuning knobs. One instance per `EmailPipeline`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Default fetch cap for daily runs.
    pub daily_max_results: u32,
    /// Default fetch cap for on-demand runs.
    pub on_demand_max_results: u32,
    /// Default lookback window for on-demand runs.
    pub on_demand_lookback: Duration,
    /// Minimum body length before a summary is even considered.
    pub summarize_min_body_chars: usize,
    /// Unread messages longer than this are summarized regardless of score.
    pub summarize_unread_body_chars: usize,
    /// Concurrent model calls per summarization batch.
    pub summarize_batch_size: usize,
    /// Pause between summarization batches (upstream rate-limit courtesy).
    pub summarize_batch_delay: Duration,
    /// Normalized bodies are truncated to this many characters.
    pub max_body_chars: usize,
    /// Fetch cap and entity cap when the user has no profile.
    pub basic_filter_cap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            daily_max_results: 50,
            on_demand_max_results: 10,
            on_demand_lookback: Duration::from_secs(4 * 3600),
            summarize_min_body_chars: 100,
            summarize_unread_body_chars: 300,
            summarize_batch_size: 10,
            summarize_batch_delay: Duration::from_millis(500),
            max_body_chars: 8000,
            basic_filter_cap: 20,
        }
    }
}
