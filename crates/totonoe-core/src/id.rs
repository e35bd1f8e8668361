//! 構造化リソースID
//!
//! リモートリソースへの階層パスを `/キー/値/キー/値...` の形で表現します。
//! 例: `/zones/tk1a/disks/data-01`
//!
//! IDはリソース種別ごとの文法（[`IdGrammar`]）に従って構築・パースされ、
//! 文字列表現との往復は無損失です（`parse(id.to_string()) == id`）。

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// リソースIDの文法（パスセグメントキーの並び）
///
/// リソース種別が登録時に宣言します。
/// 例: `IdGrammar::new(["zones", "disks"])`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGrammar {
    keys: Vec<String>,
}

impl IdGrammar {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// 階層パスとして表現される不変のリソースID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct Segment {
    key: String,
    value: String,
}

impl ResourceId {
    /// 文法とセグメント値からIDを決定的に構築する
    ///
    /// 値の数が文法と一致しない場合、値が空の場合、値に `/` を含む場合は
    /// `MalformedId` になります。
    pub fn build(grammar: &IdGrammar, values: &[&str]) -> Result<Self> {
        if grammar.is_empty() {
            return Err(CoreError::MalformedId("IDの文法が空です".to_string()));
        }
        if values.len() != grammar.len() {
            return Err(CoreError::MalformedId(format!(
                "セグメント値が {} 個必要ですが {} 個です",
                grammar.len(),
                values.len()
            )));
        }

        let mut segments = Vec::with_capacity(values.len());
        for (key, value) in grammar.keys().zip(values) {
            if value.is_empty() {
                return Err(CoreError::MalformedId(format!(
                    "セグメント '{key}' の値が空です"
                )));
            }
            if value.contains('/') {
                return Err(CoreError::MalformedId(format!(
                    "セグメント '{key}' の値に '/' は使えません: {value}"
                )));
            }
            segments.push(Segment {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        Ok(Self { segments })
    }

    /// 文字列表現を文法に対して検証しながらパースする
    pub fn parse(input: &str, grammar: &IdGrammar) -> Result<Self> {
        let Some(rest) = input.strip_prefix('/') else {
            return Err(CoreError::MalformedId(format!(
                "先頭が '/' ではありません: {input}"
            )));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() != grammar.len() * 2 {
            return Err(CoreError::MalformedId(format!(
                "セグメント数が文法と一致しません: {input}"
            )));
        }

        let mut values = Vec::with_capacity(grammar.len());
        for (expected, pair) in grammar.keys().zip(parts.chunks(2)) {
            let (key, value) = (pair[0], pair[1]);
            if key != expected {
                return Err(CoreError::MalformedId(format!(
                    "セグメント '{expected}' の位置に '{key}' があります: {input}"
                )));
            }
            values.push(value);
        }

        Self::build(grammar, &values)
    }

    /// 指定キーのセグメント値を返す
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.as_str())
    }

    /// 最後のセグメント値（リソース自身の名前）
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(|s| s.value.as_str())
            .unwrap_or_default()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}/{}", segment.key, segment.value)?;
        }
        Ok(())
    }
}
