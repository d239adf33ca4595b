// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

/// Aesthetic principle (`l1`) paired with a practical technique (`l2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnowledgeItem {
    pub id: &'static str,
    pub l1: &'static str,
    pub l2: &'static str,
    pub formula: &'static str,
}

pub static KNOWLEDGE_BASE: [KnowledgeItem; 5] = [
    KnowledgeItem {
        id: "k1",
        l1: "视觉重心转移",
        l2: "增加颅顶高度",
        formula: "[高冠帽] + [上移重心] = [视觉延展面中]",
    },
    KnowledgeItem {
        id: "k2",
        l1: "视错觉原理",
        l2: "对比肩宽",
        formula: "[大帽檐] + [对比肩宽] = [显脸小]",
    },
    KnowledgeItem {
        id: "k3",
        l1: "骨相分析",
        l2: "修饰颧骨外扩",
        formula: "[软檐渔夫帽] + [遮蔽线条] = [柔化面部边缘]",
    },
    KnowledgeItem {
        id: "k4",
        l1: "色彩心理",
        l2: "提亮肤色",
        formula: "[冷色调] + [皮肤对比] = [中和面部暗沉]",
    },
    KnowledgeItem {
        id: "k5",
        l1: "几何平衡",
        l2: "抵消下颌方度",
        formula: "[圆润弧度] + [中和直线] = [视觉内缩下颌]",
    },
];

#[must_use]
pub fn find_by_l2(l2: &str) -> Option<&'static KnowledgeItem> {
    if l2.is_empty() {
        return None;
    }
    KNOWLEDGE_BASE.iter().find(|k| k.l2 == l2)
}

/// Catalog entry whose `l1` or `l2` label occurs in `text`.
///
/// When several labels occur the longest one wins; equal lengths keep catalog order.
#[must_use]
pub fn best_match(text: &str) -> Option<&'static KnowledgeItem> {
    let mut best: Option<(&'static KnowledgeItem, usize)> = None;
    for item in &KNOWLEDGE_BASE {
        let matched = [item.l1, item.l2]
            .into_iter()
            .filter(|label| text.contains(label))
            .map(|label| label.chars().count())
            .max();
        if let Some(len) = matched {
            if best.is_none_or(|(_, current)| len > current) {
                best = Some((item, len));
            }
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_five_unique_techniques() {
        let mut l2: Vec<&str> = KNOWLEDGE_BASE.iter().map(|k| k.l2).collect();
        l2.sort_unstable();
        l2.dedup();
        assert_eq!(l2.len(), 5);
    }

    #[test]
    fn finds_entry_by_technique_label() {
        assert_eq!(find_by_l2("对比肩宽").map(|k| k.id), Some("k2"));
        assert!(find_by_l2("").is_none());
        assert!(find_by_l2("视错觉原理").is_none());
    }

    #[test]
    fn matches_either_label() {
        assert_eq!(best_match("运用视错觉原理来搭配").map(|k| k.id), Some("k2"));
        assert_eq!(best_match("帽子可以提亮肤色").map(|k| k.id), Some("k4"));
        assert!(best_match("今天天气很好").is_none());
    }

    #[test]
    fn longest_label_wins_over_catalog_order() {
        // "色彩心理" (4 chars, k4) and "抵消下颌方度" (6 chars, k5)
        let text = "色彩心理之外，更要抵消下颌方度";
        assert_eq!(best_match(text).map(|k| k.id), Some("k5"));
        // equal length labels: "骨相分析" (k3) and "几何平衡" (k5) keep catalog order
        assert_eq!(best_match("几何平衡与骨相分析").map(|k| k.id), Some("k3"));
    }
}
