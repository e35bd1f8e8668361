use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("リソースIDが不正です: {0}")]
    MalformedId(String),

    #[error("スキーマ不一致: {0}")]
    SchemaMismatch(String),

    #[error("型不一致: {0}")]
    TypeMismatch(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
