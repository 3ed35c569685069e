//! 分別先の体系
//!
//! ラベル → 分別先、検出器クラス → ラベル、ラベル → 固定ガイダンスの対応表。
//! いずれも起動後は読み取り専用で、未知の値は `unknown` の項目にフォールバックする。

use crate::types::Label;

pub const COMPONENTS_BIN: &str = "Components (CPU/RAM)";
pub const STORAGE_BIN: &str = "Storage Media (Flash Drives)";
pub const UNKNOWN_BIN: &str = "Unknown / Manual Review";

/// ラベルに対応する分別先
pub fn bin_for_label(label: Label) -> &'static str {
    match label {
        Label::Cpu | Label::RamStick => COMPONENTS_BIN,
        Label::FlashDrive => STORAGE_BIN,
        Label::Unknown => UNKNOWN_BIN,
    }
}

/// ラベル文字列に対応する分別先（未登録は `UNKNOWN_BIN`）
pub fn bin_for(label: &str) -> &'static str {
    bin_for_label(Label::from_label(label))
}

/// すべての分別先（表示順）
pub fn all_bins() -> Vec<&'static str> {
    let mut bins: Vec<&'static str> = Vec::new();
    for label in Label::KNOWN.iter().chain(std::iter::once(&Label::Unknown)) {
        let bin = bin_for_label(*label);
        if !bins.contains(&bin) {
            bins.push(bin);
        }
    }
    bins
}

/// 検出器のクラス名をラベルへ正規化
pub fn label_for_class(class_name: &str) -> Label {
    match class_name.trim() {
        "CPU" => Label::Cpu,
        "RAM" => Label::RamStick,
        "USB_Drive" => Label::FlashDrive,
        _ => Label::Unknown,
    }
}

/// 固定ガイダンス（AI不使用時・失敗時のフォールバック）
const STATIC_GUIDANCE: &[(Label, &str)] = &[
    (
        Label::Cpu,
        "Processors contain recoverable precious metals. Keep them in anti-static packaging and drop them off with certified e-waste recycling.",
    ),
    (
        Label::RamStick,
        "Memory modules are circuit boards and belong in e-waste recycling. Do not put them in household trash.",
    ),
    (
        Label::FlashDrive,
        "Flash drives may hold personal data. Wipe or physically destroy the drive, then recycle it with electronics.",
    ),
    (
        Label::Unknown,
        "Item not recognized confidently. Please ask a volunteer or use a campus e-waste drop-off location.",
    ),
];

/// ラベルに対応する固定ガイダンス（未登録は `unknown` の文面）
pub fn static_guidance(label: &str) -> &'static str {
    let label = Label::from_label(label);
    lookup_guidance(label)
        .or_else(|| lookup_guidance(Label::Unknown))
        .unwrap_or_default()
}

fn lookup_guidance(label: Label) -> Option<&'static str> {
    STATIC_GUIDANCE
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, text)| *text)
}

/// 回収拠点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisposalResource {
    pub name: &'static str,
    pub url: &'static str,
}

pub const DISPOSAL_RESOURCES: &[DisposalResource] = &[
    DisposalResource {
        name: "UGA Surplus Store & Recycling Center",
        url: "https://busfin.uga.edu/surplus",
    },
    DisposalResource {
        name: "Athens-Clarke County Household Hazardous Waste",
        url: "https://www.accgov.com/hhw",
    },
    DisposalResource {
        name: "Best Buy Recycling",
        url: "https://www.bestbuy.com/site/services/recycling/pcmcat149900050025.c",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels_map_to_real_bins() {
        for label in Label::KNOWN {
            assert_ne!(bin_for(label.as_str()), UNKNOWN_BIN, "{} has no bin", label);
        }
        assert_eq!(bin_for("cpu"), "Components (CPU/RAM)");
        assert_eq!(bin_for("ram_stick"), "Components (CPU/RAM)");
    }

    #[test]
    fn test_unrecognized_labels_map_to_unknown_bin() {
        assert_eq!(bin_for("unknown"), UNKNOWN_BIN);
        assert_eq!(bin_for("battery"), UNKNOWN_BIN);
        assert_eq!(bin_for(""), UNKNOWN_BIN);
    }

    #[test]
    fn test_all_bins_deduplicated() {
        let bins = all_bins();
        assert_eq!(bins, vec![COMPONENTS_BIN, STORAGE_BIN, UNKNOWN_BIN]);
    }

    #[test]
    fn test_label_for_class() {
        assert_eq!(label_for_class("CPU"), Label::Cpu);
        assert_eq!(label_for_class("RAM"), Label::RamStick);
        assert_eq!(label_for_class("USB_Drive"), Label::FlashDrive);
        assert_eq!(label_for_class("Keyboard"), Label::Unknown);
    }

    #[test]
    fn test_static_guidance_fallback() {
        assert!(static_guidance("flash_drive").contains("personal data"));
        assert_eq!(static_guidance("battery"), static_guidance("unknown"));
        for label in Label::KNOWN {
            assert_ne!(static_guidance(label.as_str()), static_guidance("unknown"));
        }
    }
}
