//! モデル応答パーサー
//!
//! 言語モデルや検出スクリプトの出力からJSONオブジェクトを抽出する

use crate::error::{Error, Result};
use serde::Deserialize;

/// 応答からJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 最初の `{` から最後の `}` まで
///
/// # Examples
/// ```
/// use ewizard_common::extract_json_object;
///
/// let response = "Sure! {\"what\": \"a CPU\"} Hope that helps.";
/// assert_eq!(extract_json_object(response).unwrap(), "{\"what\": \"a CPU\"}");
/// ```
pub fn extract_json_object(response: &str) -> Result<&str> {
    let mut body = response;

    // ```json ... ``` ブロックを探す
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            body = &response[start..start + end_offset];
        }
    }

    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(body[start..=end].trim()),
        _ => Err(Error::Parse("JSONオブジェクトが見つかりません".into())),
    }
}

/// 助言応答（what / safety）
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdviceReply {
    pub what: String,
    pub safety: String,
}

/// 助言応答をパース
///
/// どちらかの項目が空の場合は不完全な応答としてエラーにする。
pub fn parse_advice_reply(response: &str) -> Result<AdviceReply> {
    let json_str = extract_json_object(response)?;
    let reply: AdviceReply = serde_json::from_str(json_str)
        .map_err(|e| Error::Parse(format!("助言 JSONパースエラー: {}", e)))?;

    if reply.what.trim().is_empty() || reply.safety.trim().is_empty() {
        return Err(Error::Parse("助言の項目が不足しています".into()));
    }

    Ok(reply)
}
