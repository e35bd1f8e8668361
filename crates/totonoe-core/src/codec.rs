//! 型付きモデルコーデック
//!
//! ユーザーが記述した動的な設定表現（JSON値）と、serdeタグ付きの
//! 型付きモデルの間をスキーマ駆動で相互変換します。
//! `SchemaMismatch` / `TypeMismatch` を発生させるのはこのモジュールだけです。
//!
//! # 変換の規則
//!
//! - 必須属性の欠落・null → `SchemaMismatch`
//! - 宣言された型に合わない値 → `TypeMismatch`（暗黙の型変換はしない）
//! - 未知のキーは無視する（前方互換）
//! - List は順序を保持、Set は正規化（値の同値性で重複排除、順序は不問）
//! - エンコードは全域関数: 宣言された全属性を書き出し、モデルが値を
//!   持たない属性は明示的な null になる（「未設定」と「空」を区別できる）

use crate::error::{CoreError, Result};
use crate::schema::{AttrKind, AttrMode, Schema};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// 秘匿属性のログ出力用マーカー
pub const REDACTED: &str = "(sensitive)";

/// スキーマ駆動の双方向コーデック
#[derive(Debug, Clone)]
pub struct Codec {
    schema: Schema,
}

impl Codec {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// 動的表現をスキーマに対して検証し、正規化した形を返す
    ///
    /// 欠落した任意属性は出力に現れず、明示的な null はそのまま残ります。
    pub fn validate(&self, dynamic: &Value) -> Result<Value> {
        validate_object(&self.schema, dynamic, "")
    }

    /// 検証してモデルへデコードする
    pub fn decode<M: DeserializeOwned>(&self, dynamic: &Value) -> Result<M> {
        let normalized = self.validate(dynamic)?;
        serde_json::from_value(normalized)
            .map_err(|e| CoreError::TypeMismatch(format!("モデルへの変換に失敗しました: {e}")))
    }

    /// モデルを動的表現へエンコードする（全属性を書き出す全域関数）
    pub fn encode<M: Serialize>(&self, model: &M) -> Value {
        let raw = match serde_json::to_value(model) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let mut out = Map::new();
        for (name, attr) in self.schema.iter() {
            let value = raw.get(name).cloned().unwrap_or(Value::Null);
            out.insert(name.to_string(), normalize_sets(value, &attr.kind));
        }
        Value::Object(out)
    }

    /// Create 送信用ペイロード（computed 属性を除いたもの）
    pub fn create_payload(&self, validated: &Value) -> Value {
        let Value::Object(map) = validated else {
            return Value::Object(Map::new());
        };

        let mut out = Map::new();
        for (name, attr) in self.schema.iter() {
            if attr.mode == AttrMode::Computed {
                continue;
            }
            if let Some(value) = map.get(name) {
                out.insert(name.to_string(), value.clone());
            }
        }
        Value::Object(out)
    }

    /// ログ出力用に秘匿属性を置き換えたコピーを返す
    ///
    /// 置き換えるのはログ用コピーだけで、エンコード・デコードの往復では
    /// 秘匿属性もそのまま通ります。
    pub fn redact(&self, value: &Value) -> Value {
        redact_object(&self.schema, value)
    }
}

fn validate_object(schema: &Schema, value: &Value, path: &str) -> Result<Value> {
    let Value::Object(map) = value else {
        return Err(CoreError::TypeMismatch(format!(
            "{} にはオブジェクトが必要です（実際: {}）",
            display_path(path),
            kind_name(value)
        )));
    };

    let mut normalized = Map::new();
    for (name, attr) in schema.iter() {
        let child = join_path(path, name);
        match map.get(name) {
            None => {
                if attr.mode == AttrMode::Required {
                    return Err(CoreError::SchemaMismatch(format!(
                        "必須属性 '{child}' がありません"
                    )));
                }
            }
            Some(Value::Null) => {
                if attr.mode == AttrMode::Required {
                    return Err(CoreError::SchemaMismatch(format!(
                        "必須属性 '{child}' が null です"
                    )));
                }
                normalized.insert(name.to_string(), Value::Null);
            }
            Some(present) => {
                normalized.insert(name.to_string(), check_kind(&child, present, &attr.kind)?);
            }
        }
    }
    // スキーマにないキーは無視（前方互換）
    Ok(Value::Object(normalized))
}

fn check_kind(path: &str, value: &Value, kind: &AttrKind) -> Result<Value> {
    match kind {
        AttrKind::String => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            other => Err(type_error(path, "string", other)),
        },
        AttrKind::Int => match value.as_i64() {
            Some(n) => Ok(Value::from(n)),
            None => Err(type_error(path, "int", value)),
        },
        AttrKind::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(type_error(path, "bool", other)),
        },
        AttrKind::List(inner) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(check_kind(&format!("{path}[{i}]"), item, inner)?);
                }
                Ok(Value::Array(out))
            }
            other => Err(type_error(path, "list", other)),
        },
        AttrKind::Set(inner) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(check_kind(&format!("{path}[{i}]"), item, inner)?);
                }
                Ok(Value::Array(normalize_set_items(out)))
            }
            other => Err(type_error(path, "set", other)),
        },
        AttrKind::Map(inner) => match value {
            Value::Object(entries) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    out.insert(
                        key.clone(),
                        check_kind(&format!("{path}.{key}"), item, inner)?,
                    );
                }
                Ok(Value::Object(out))
            }
            other => Err(type_error(path, "map", other)),
        },
        AttrKind::Object(schema) => validate_object(schema, value, path),
    }
}

/// Set の正規化: 正準なJSONテキストで整列し、同値の要素を除く
fn normalize_set_items(mut items: Vec<Value>) -> Vec<Value> {
    items.sort_by_key(|v| v.to_string());
    items.dedup();
    items
}

/// エンコード済みの値に対して Set 属性だけを正規化する
fn normalize_sets(value: Value, kind: &AttrKind) -> Value {
    match (kind, value) {
        (AttrKind::Set(_), Value::Array(items)) => Value::Array(normalize_set_items(items)),
        (AttrKind::List(inner), Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize_sets(item, inner))
                .collect(),
        ),
        (AttrKind::Object(schema), Value::Object(map)) => {
            let mut out = Map::new();
            for (key, item) in map {
                match schema.get(&key) {
                    Some(attr) => {
                        out.insert(key, normalize_sets(item, &attr.kind));
                    }
                    None => {
                        out.insert(key, item);
                    }
                }
            }
            Value::Object(out)
        }
        (_, value) => value,
    }
}

fn redact_object(schema: &Schema, value: &Value) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };

    let mut out = Map::new();
    for (key, item) in map {
        match schema.get(key) {
            Some(attr) if attr.sensitive && !item.is_null() => {
                out.insert(key.clone(), Value::String(REDACTED.to_string()));
            }
            Some(attr) => match &attr.kind {
                AttrKind::Object(inner) => {
                    out.insert(key.clone(), redact_object(inner, item));
                }
                AttrKind::List(inner) | AttrKind::Set(inner) => {
                    if let (AttrKind::Object(nested), Value::Array(items)) = (inner.as_ref(), item)
                    {
                        out.insert(
                            key.clone(),
                            Value::Array(
                                items.iter().map(|v| redact_object(nested, v)).collect(),
                            ),
                        );
                    } else {
                        out.insert(key.clone(), item.clone());
                    }
                }
                _ => {
                    out.insert(key.clone(), item.clone());
                }
            },
            None => {
                out.insert(key.clone(), item.clone());
            }
        }
    }
    Value::Object(out)
}

fn type_error(path: &str, expected: &str, actual: &Value) -> CoreError {
    CoreError::TypeMismatch(format!(
        "'{path}' には {expected} が必要です（実際: {}）",
        kind_name(actual)
    ))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "設定全体" } else { path }
}
