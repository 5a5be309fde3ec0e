use trendwatch_insight::InsightError;
use trendwatch_notify::NotifyError;
use trendwatch_sources::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("a trend scan is already running")]
    AlreadyRunning,

    #[error("failed to build source client: {0}")]
    Source(#[from] SourceError),

    #[error("failed to build insight annotator: {0}")]
    Insight(#[from] InsightError),

    #[error("failed to build notifier: {0}")]
    Notify(#[from] NotifyError),
}
