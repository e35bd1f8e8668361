//! 計算リソースモデル
//!
//! Totonoeで管理する計算リソース（サーバー、ディスク）の定義と、
//! リモートAPIのワイヤ形式（PascalCase）との変換。
//! 属性名がワイヤ形式の命名に漏れ出すことはありません。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use totonoe_core::{AttrKind, Attribute, CoreError, IdGrammar, Schema};
use totonoe_engine::{EngineError, LockToken, TransportError};

/// サーバーリソースのモデル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerModel {
    pub name: String,

    /// ゾーン（tk1a, is1b など）
    pub zone: String,

    /// サーバープラン（2core-4gb, 4core-8gb など）
    pub plan: Option<String>,

    /// タグ（順序は意味を持たない）
    #[serde(default)]
    pub tags: Vec<String>,

    /// 電源状態（サーバー側が割り当てる）
    pub power_state: Option<String>,

    /// 割り当てられたIPアドレス
    pub ip_address: Option<String>,
}

pub fn server_schema() -> Schema {
    Schema::new()
        .with_attribute(
            "name",
            Attribute::required(AttrKind::String).forces_recreation(),
        )
        .with_attribute(
            "zone",
            Attribute::required(AttrKind::String).forces_recreation(),
        )
        .with_attribute("plan", Attribute::optional(AttrKind::String))
        .with_attribute(
            "tags",
            Attribute::optional(AttrKind::Set(Box::new(AttrKind::String))),
        )
        .with_attribute("power_state", Attribute::computed(AttrKind::String))
        .with_attribute("ip_address", Attribute::computed(AttrKind::String))
}

pub fn server_grammar() -> IdGrammar {
    IdGrammar::new(["zones", "servers"])
}

/// ディスクの初期化元
///
/// いずれか一つの形しか取れないため、タグ付き合併型で表現する。
/// 取りこぼしはコンパイル時に検出される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiskSource {
    /// 空のディスク
    Blank,
    /// スナップショットから複製
    Snapshot { snapshot: String },
    /// アーカイブから複製
    Archive { archive: String },
}

/// ディスクリソースのモデル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskModel {
    pub name: String,

    /// ゾーン（作成後は変更不可）
    pub zone: String,

    /// ディスクサイズ (GB)
    pub size_gb: i64,

    /// ディスクプラン（ssd, hdd。作成後は変更不可）
    pub plan: Option<String>,

    /// 初期化元（作成後は変更不可）
    pub source: Option<DiskSource>,

    /// アタッチ先サーバー名
    pub server: Option<String>,

    /// 暗号化パスフレーズ（ログには出力されない）
    pub encryption_passphrase: Option<String>,

    /// ディスク状態（サーバー側が割り当てる）
    pub status: Option<String>,
}

pub fn disk_schema() -> Schema {
    Schema::new()
        .with_attribute(
            "name",
            Attribute::required(AttrKind::String).forces_recreation(),
        )
        .with_attribute(
            "zone",
            Attribute::required(AttrKind::String).forces_recreation(),
        )
        .with_attribute("size_gb", Attribute::required(AttrKind::Int))
        .with_attribute(
            "plan",
            Attribute::optional(AttrKind::String).forces_recreation(),
        )
        .with_attribute(
            "source",
            Attribute::optional(AttrKind::Object(
                Schema::new()
                    .with_attribute("type", Attribute::required(AttrKind::String))
                    .with_attribute("snapshot", Attribute::optional(AttrKind::String))
                    .with_attribute("archive", Attribute::optional(AttrKind::String)),
            ))
            .forces_recreation(),
        )
        .with_attribute("server", Attribute::optional(AttrKind::String))
        .with_attribute(
            "encryption_passphrase",
            Attribute::optional(AttrKind::String).sensitive(),
        )
        .with_attribute("status", Attribute::computed(AttrKind::String))
}

pub fn disk_grammar() -> IdGrammar {
    IdGrammar::new(["zones", "disks"])
}

/// 共有オブジェクト（サーバー）のロックトークン
///
/// サーバー自身のミューテーションも、アタッチされたディスクの
/// ミューテーションも、より基盤側であるサーバー名のトークンを取る。
/// 両者が常に同一の単独トークンを取るため、取得順序による
/// デッドロックは起き得ない。
pub fn server_lock_token(zone: &str, name: &str) -> LockToken {
    LockToken::new(format!("server/{zone}/{name}"))
}

// ============ ワイヤ形式 ============

/// サーバーのワイヤ形式
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerWire {
    pub name: String,
    pub zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_state: Option<String>,
    #[serde(rename = "IPAddress", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl From<ServerModel> for ServerWire {
    fn from(model: ServerModel) -> Self {
        Self {
            name: model.name,
            zone: model.zone,
            plan: model.plan,
            tags: model.tags,
            power_state: model.power_state,
            ip_address: model.ip_address,
        }
    }
}

impl From<ServerWire> for ServerModel {
    fn from(wire: ServerWire) -> Self {
        Self {
            name: wire.name,
            zone: wire.zone,
            plan: wire.plan,
            tags: wire.tags,
            power_state: wire.power_state,
            ip_address: wire.ip_address,
        }
    }
}

/// ディスク初期化元のワイヤ形式
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum DiskSourceWire {
    Blank,
    Snapshot {
        #[serde(rename = "Snapshot")]
        snapshot: String,
    },
    Archive {
        #[serde(rename = "Archive")]
        archive: String,
    },
}

impl From<DiskSource> for DiskSourceWire {
    fn from(source: DiskSource) -> Self {
        match source {
            DiskSource::Blank => Self::Blank,
            DiskSource::Snapshot { snapshot } => Self::Snapshot { snapshot },
            DiskSource::Archive { archive } => Self::Archive { archive },
        }
    }
}

impl From<DiskSourceWire> for DiskSource {
    fn from(wire: DiskSourceWire) -> Self {
        match wire {
            DiskSourceWire::Blank => Self::Blank,
            DiskSourceWire::Snapshot { snapshot } => Self::Snapshot { snapshot },
            DiskSourceWire::Archive { archive } => Self::Archive { archive },
        }
    }
}

/// ディスクのワイヤ形式
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskWire {
    pub name: String,
    pub zone: String,
    #[serde(rename = "SizeGB")]
    pub size_gb: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DiskSourceWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_passphrase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<DiskModel> for DiskWire {
    fn from(model: DiskModel) -> Self {
        Self {
            name: model.name,
            zone: model.zone,
            size_gb: model.size_gb,
            plan: model.plan,
            source: model.source.map(Into::into),
            server: model.server,
            encryption_passphrase: model.encryption_passphrase,
            status: model.status,
        }
    }
}

impl From<DiskWire> for DiskModel {
    fn from(wire: DiskWire) -> Self {
        Self {
            name: wire.name,
            zone: wire.zone,
            size_gb: wire.size_gb,
            plan: wire.plan,
            source: wire.source.map(Into::into),
            server: wire.server,
            encryption_passphrase: wire.encryption_passphrase,
            status: wire.status,
        }
    }
}

/// APIレスポンスの封筒
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(rename = "Server")]
    pub server: ServerWire,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiskEnvelope {
    #[serde(rename = "Disk")]
    pub disk: DiskWire,
}

// ============ 変換ヘルパー ============

/// 検証済み属性からモデルを復元する。失敗はワイヤ境界の契約違反。
pub(crate) fn decode_attrs<T: DeserializeOwned>(
    attrs: &serde_json::Value,
) -> Result<T, TransportError> {
    serde_json::from_value(attrs.clone()).map_err(|e| TransportError::Payload(e.to_string()))
}

pub(crate) fn encode_attrs<T: Serialize>(model: &T) -> Result<serde_json::Value, TransportError> {
    serde_json::to_value(model).map_err(|e| TransportError::Payload(e.to_string()))
}

/// IDを構成する識別属性の取り出し
pub(crate) fn ident<'a>(
    type_name: &str,
    attrs: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, EngineError> {
    attrs
        .get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| EngineError::Decode {
            resource: type_name.to_string(),
            source: CoreError::SchemaMismatch(format!("識別属性 '{key}' がありません")),
        })
}
