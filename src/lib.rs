//! E-Wizard: e-waste identification and sorting
//!
//! 写真から電子廃棄物を判定し、分別先の決定・廃棄ガイダンス・
//! サーボによる仕分け・スキャン履歴の記録を行う。

pub mod actuator;
pub mod advisory;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod history;
pub mod override_prompt;
pub mod pipeline;
pub mod scanner;
