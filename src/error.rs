use thiserror::Error;

pub type ViewerResult<T> = Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: f64, height: f64 },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("timeframe {timeframe} is not allowed on the {pane} pane")]
    TimeframeNotAllowed { timeframe: String, pane: String },
}
