//! リソーススキーマ定義
//!
//! 各リソース種別が登録時に宣言する属性メタデータと、
//! ライフサイクル各ステップのタイムアウト・待機設定。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 属性の宣言モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrMode {
    /// ユーザーが必ず指定する
    Required,
    /// ユーザーが任意で指定する
    Optional,
    /// サーバー側が割り当てる（Create時に送信してはならない）
    Computed,
}

/// 属性の型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    String,
    Int,
    Bool,
    /// 順序が意味を持つ列
    List(Box<AttrKind>),
    /// 順序が意味を持たない集合（重複は値の同値性で排除）
    Set(Box<AttrKind>),
    /// 文字列キーのマップ（値の型は同種）
    Map(Box<AttrKind>),
    /// 入れ子の構造体
    Object(Schema),
}

/// 属性メタデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub kind: AttrKind,
    pub mode: AttrMode,
    /// 作成後は変更できない属性（変更には再作成が必要）
    #[serde(default)]
    pub forces_recreation: bool,
    /// ログに出力してはならない属性
    #[serde(default)]
    pub sensitive: bool,
}

impl Attribute {
    pub fn required(kind: AttrKind) -> Self {
        Self::new(kind, AttrMode::Required)
    }

    pub fn optional(kind: AttrKind) -> Self {
        Self::new(kind, AttrMode::Optional)
    }

    pub fn computed(kind: AttrKind) -> Self {
        Self::new(kind, AttrMode::Computed)
    }

    fn new(kind: AttrKind, mode: AttrMode) -> Self {
        Self {
            kind,
            mode,
            forces_recreation: false,
            sensitive: false,
        }
    }

    pub fn forces_recreation(mut self) -> Self {
        self.forces_recreation = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// リソース属性スキーマ（宣言順を保持）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    attributes: Vec<(String, Attribute)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.push((name.into(), attribute));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// ライフサイクル各ステップのタイムアウト
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

/// ポーリング・再試行の待機設定（Exponential Backoff）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// 初期待機時間（ミリ秒）
    pub initial_delay_ms: u64,
    /// 最大待機時間（ミリ秒）
    pub max_delay_ms: u64,
    /// Exponential倍率
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// 指定回数目の待機時間を計算（ミリ秒）
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        (delay as u64).min(self.max_delay_ms)
    }
}
