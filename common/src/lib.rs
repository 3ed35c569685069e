//! E-Wizard Common Library
//!
//! 品目ラベル・分別先・ガイダンス整形など、I/Oを持たない共通ロジック

pub mod error;
pub mod guidance;
pub mod parser;
pub mod prompts;
pub mod selection;
pub mod taxonomy;
pub mod types;

pub use error::{Error, Result};
pub use guidance::{compose_guidance, format_sections, split_sections, GuidanceSection, SECTION_MARKER};
pub use parser::{extract_json_object, parse_advice_reply, AdviceReply};
pub use prompts::build_advisory_prompt;
pub use selection::select_top;
pub use taxonomy::{
    all_bins, bin_for, bin_for_label, label_for_class, static_guidance, DisposalResource,
    COMPONENTS_BIN, DISPOSAL_RESOURCES, STORAGE_BIN, UNKNOWN_BIN,
};
pub use types::{DetectionRecord, Label, OverrideAction, ScanLogEntry, OVERRIDE_ACTIONS};
