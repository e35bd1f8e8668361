//! HTTP transport error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("環境変数が設定されていません: {0}")]
    MissingEnvVar(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

pub type Result<T> = std::result::Result<T, HttpError>;
