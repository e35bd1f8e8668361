//! Totonoe Core — リソースモデルの基盤
//!
//! 宣言的リソース管理の土台となるデータモデルを提供します。
//!
//! # 概要
//!
//! - **ResourceId**: リモートリソースへの階層パス（決定的構築・文字列往復）
//! - **Schema**: リソース属性の宣言（required / optional / computed）
//! - **Codec**: ユーザーが記述した動的な設定表現と型付きモデルの相互変換

pub mod codec;
pub mod error;
pub mod id;
pub mod schema;

pub use codec::{Codec, REDACTED};
pub use error::{CoreError, Result};
pub use id::{IdGrammar, ResourceId};
pub use schema::{AttrKind, AttrMode, Attribute, BackoffConfig, Schema, Timeouts};
