// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 错误类型
//! Error types for the event pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Thread error: {0}")]
    Thread(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = PipelineError::InvalidConfig("time_window_us must be positive".to_string());
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.to_string().contains("time_window_us"));
    }

    #[test]
    fn test_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io_err.into();
        match err {
            PipelineError::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_from_json() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(matches!(err, PipelineError::Json(_)));
    }
}
