//! 廃棄ガイダンス生成アダプタ
//!
//! 外部の言語モデル呼び出しを `Advice` の2値に畳み込む。
//! 失敗は呼び出し側へエラーとして伝播させない。

mod gemini;

pub use gemini::GeminiAdvisor;

use ewizard_common::{static_guidance, Label};
use std::fmt;
use std::future::Future;
use tracing::warn;

/// APIキー未設定時に固定ガイダンスの前に付ける注記
pub const NOT_CONFIGURED_NOTE: &str =
    "AI guidance is not configured. Set GEMINI_API_KEY or run `ewizard config --set-api-key`.";

/// ガイダンス生成の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advice {
    /// セクション区切り付きのガイダンス
    Generated(String),
    /// 生成できなかった
    Unavailable(Unavailable),
}

/// 生成できなかった理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    NotConfigured,
    Timeout,
    Status(u16),
    Malformed(String),
    Request(String),
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::NotConfigured => write!(f, "APIキー未設定"),
            Unavailable::Timeout => write!(f, "タイムアウト"),
            Unavailable::Status(code) => write!(f, "HTTP {}", code),
            Unavailable::Malformed(msg) => write!(f, "応答の形式が不正: {}", msg),
            Unavailable::Request(msg) => write!(f, "リクエスト失敗: {}", msg),
        }
    }
}

pub trait Advisor {
    /// ラベルに対するガイダンスを生成する（タイムアウトは実装側で保証）
    fn advise(&self, label: &str) -> impl Future<Output = Advice> + Send;
}

impl<T: Advisor + ?Sized> Advisor for &T {
    fn advise(&self, label: &str) -> impl Future<Output = Advice> + Send {
        (**self).advise(label)
    }
}

/// `Advice` を表示用ガイダンスへ確定させる
///
/// 生成できなかった場合はラベルの固定ガイダンスに置き換える。
pub fn resolve_guidance(advice: Advice, label: Label) -> String {
    let fallback = static_guidance(label.as_str());
    match advice {
        Advice::Generated(text) => text,
        Advice::Unavailable(Unavailable::NotConfigured) => {
            format!("{}\n\n{}", NOT_CONFIGURED_NOTE, fallback)
        }
        Advice::Unavailable(reason) => {
            warn!(%reason, label = %label, "ガイダンス生成に失敗、固定文面を使用");
            fallback.to_string()
        }
    }
}
