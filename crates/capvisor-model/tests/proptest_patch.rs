use capvisor_model::{AssetCardData, AssetCardPatch, LogicType, VisualStatus, KNOWLEDGE_BASE};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn base_card(index: usize) -> AssetCardData {
    let knowledge = &KNOWLEDGE_BASE[index % KNOWLEDGE_BASE.len()];
    AssetCardData {
        id: AssetCardData::card_id(index),
        logic_type: LogicType::for_page(index),
        visual_status: VisualStatus::Done,
        visual_logic: "侧脸45度角".to_string(),
        prompt: "Fashion portrait, side view".to_string(),
        image_url: Some("data:image/png;base64,AAAA".to_string()),
        headline: "揭秘".to_string(),
        l1_knowledge: knowledge.l1.to_string(),
        l2_knowledge: knowledge.l2.to_string(),
        script: "关于帽子".to_string(),
        score: Some(8.2),
    }
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn single_field_patch_preserves_every_other_field(
        index in 0usize..20,
        field in 0usize..5,
        text in "\\PC{0,40}",
        knowledge_index in 0usize..5
    ) {
        let before = base_card(index);
        let patch = match field {
            0 => AssetCardPatch::headline(text.clone()),
            1 => AssetCardPatch::visual_logic(text.clone()),
            2 => AssetCardPatch::prompt(text.clone()),
            3 => AssetCardPatch::script(text.clone()),
            _ => AssetCardPatch::knowledge(&KNOWLEDGE_BASE[knowledge_index]),
        };
        let mut after = before.clone();
        after.apply(&patch);

        let mut expected = before.clone();
        match field {
            0 => expected.headline = text,
            1 => expected.visual_logic = text,
            2 => expected.prompt = text,
            3 => expected.script = text,
            _ => {
                expected.l1_knowledge = KNOWLEDGE_BASE[knowledge_index].l1.to_string();
                expected.l2_knowledge = KNOWLEDGE_BASE[knowledge_index].l2.to_string();
            }
        }
        prop_assert_eq!(after, expected);
    }
}
