//! プロンプト生成モジュール

/// 廃棄ガイダンス用プロンプト生成
///
/// # Arguments
/// * `item_label` - 品目ラベル（例: `ram_stick`）
/// * `location_hint` - 回収先を案内する地域
///
/// # Returns
/// JSON（what / safety）のみを返させるプロンプト文字列
pub fn build_advisory_prompt(item_label: &str, location_hint: &str) -> String {
    format!(
        r#"Return ONLY valid JSON. No markdown. No extra text.

Schema:
{{
  "what": "ONE sentence defining what the item is (what it does).",
  "safety": "ONE sentence about safety or data wiping if needed."
}}

Item: {item_label}
Location: {location_hint}

Write the "what" field as a definition, not disposal advice."#
    )
}
