//! ガイダンス文の整形と分割
//!
//! ガイダンスは `## <見出し>\n<本文>` を繰り返した1つの文字列として受け渡し、
//! 表示側は `split_sections` で見出し付きブロックに戻す。

use crate::taxonomy::DISPOSAL_RESOURCES;
use lazy_static::lazy_static;
use regex::Regex;

/// セクション見出しの接頭辞
pub const SECTION_MARKER: &str = "## ";

/// 見出し付きブロック
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidanceSection {
    /// 見出し（マーカー前の前置きは空文字）
    pub title: String,
    pub body: String,
}

impl GuidanceSection {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// セクション列を1つの文字列に連結
pub fn format_sections(sections: &[GuidanceSection]) -> String {
    sections
        .iter()
        .map(|s| format!("{}{}\n{}", SECTION_MARKER, s.title, s.body.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 文字列をセクション列へ分割
///
/// マーカーを含まない文字列は見出しなしの1ブロックになる。
pub fn split_sections(text: &str) -> Vec<GuidanceSection> {
    lazy_static! {
        static ref HEADING_RE: Regex = Regex::new(r"(?m)^##[ \t]+(.+?)[ \t]*$").unwrap();
    }

    let mut sections = Vec::new();
    let mut cursor = 0;
    let mut current_title: Option<String> = None;

    for caps in HEADING_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_section(&mut sections, current_title.take(), &text[cursor..whole.start()]);
        current_title = Some(caps[1].to_string());
        cursor = whole.end();
    }
    push_section(&mut sections, current_title, &text[cursor..]);

    sections
}

fn push_section(sections: &mut Vec<GuidanceSection>, title: Option<String>, body: &str) {
    let body = body.trim();
    match title {
        Some(title) => sections.push(GuidanceSection::new(title, body)),
        // 前置き（見出しなし）は空なら捨てる
        None if !body.is_empty() => sections.push(GuidanceSection::new("", body)),
        None => {}
    }
}

/// AI応答（what / safety）から表示用ガイダンスを組み立てる
pub fn compose_guidance(what: &str, safety: &str, location_hint: &str) -> String {
    let resources = DISPOSAL_RESOURCES
        .iter()
        .map(|r| format!("- **{}** – {}", r.name, r.url))
        .collect::<Vec<_>>()
        .join("\n");

    format_sections(&[
        GuidanceSection::new("What it is", what.trim()),
        GuidanceSection::new("Safety & Data", safety.trim()),
        GuidanceSection::new(
            "How to Dispose",
            format!("Drop-off options near {}:\n{}", location_hint, resources),
        ),
    ])
}
