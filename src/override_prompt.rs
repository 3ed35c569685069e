//! 対話式オーバーライド
//!
//! 信頼度が閾値未満のとき、分類をその場で選ばせる。

use crate::error::{Result, SorterError};
use dialoguer::Select;
use ewizard_common::{Label, OverrideAction};

/// 最後に追加する「選ばない」項目
const LEAVE_UNKNOWN: &str = "Leave as unknown";

/// 選択肢の表示文字列
pub fn menu_items(actions: &[OverrideAction]) -> Vec<&'static str> {
    actions
        .iter()
        .map(|a| a.title)
        .chain(std::iter::once(LEAVE_UNKNOWN))
        .collect()
}

/// 選択番号をラベルへ（範囲外・「選ばない」は `None`）
pub fn choice_to_label(actions: &[OverrideAction], index: usize) -> Option<Label> {
    actions.get(index).map(|a| a.label)
}

/// オーバーライドを対話で選ぶ
pub fn prompt_override(actions: &[OverrideAction], confidence: f64) -> Result<Option<Label>> {
    if actions.is_empty() {
        return Ok(None);
    }

    let prompt = format!("信頼度が低いため分類を選んでください (信頼度 {:.2})", confidence);
    let index = Select::new()
        .with_prompt(prompt)
        .items(&menu_items(actions))
        .default(actions.len())
        .interact()
        .map_err(|e| SorterError::CliExecution(e.to_string()))?;

    Ok(choice_to_label(actions, index))
}
