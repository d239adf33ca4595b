use capvisor_model::{
    FaceShape, HatType, LogicType, TargetingParameters, TopicCard, VisualStatus, KNOWLEDGE_BASE,
    ORIGINS, SCENES,
};
use capvisor_synth::{fallback_skeleton, fallback_topics, SeededRandom};
use proptest::prelude::*;
use proptest::sample::{select, subsequence};
use proptest::test_runner::Config;

fn params_strategy() -> impl Strategy<Value = TargetingParameters> {
    (
        select(FaceShape::ALL.to_vec()),
        select(HatType::ALL.to_vec()),
        subsequence(ORIGINS.to_vec(), 0..=ORIGINS.len()),
        subsequence(SCENES.to_vec(), 0..=SCENES.len()),
        10u32..=20,
        1u8..=3,
    )
        .prop_map(|(face_shape, hat_type, origin, scene, volume, depth)| TargetingParameters {
            origin: origin.into_iter().map(str::to_string).collect(),
            scene: scene.into_iter().map(str::to_string).collect(),
            face_shape,
            hat_type,
            volume,
            depth,
            ..TargetingParameters::default()
        })
}

proptest! {
    #![proptest_config(Config::with_cases(96))]

    #[test]
    fn topic_fallback_is_full_and_labelled(params in params_strategy(), seed in any::<u64>()) {
        let topics = fallback_topics(&params, &SeededRandom::new(seed));
        prop_assert_eq!(topics.len(), 8);
        for (i, topic) in topics.iter().enumerate() {
            prop_assert_eq!(&topic.id, &format!("topic-{}", i + 1));
            prop_assert!((60.0..100.0).contains(&topic.heat));
            prop_assert!(topic.title.contains(params.face_shape.label()));
            prop_assert!(topic.title.contains(params.hat_type.label()));
        }
    }

    #[test]
    fn skeleton_fallback_is_sized_cyclic_and_deterministic(
        params in params_strategy(),
        title in "\\PC{0,30}"
    ) {
        let topic = TopicCard { id: "topic-1".to_string(), title, heat: 75.0, summary: String::new() };
        let stream = fallback_skeleton(&topic, &params);
        prop_assert_eq!(stream.len(), params.volume as usize);
        for (i, card) in stream.iter().enumerate() {
            prop_assert_eq!(&card.id, &format!("card-{i}"));
            prop_assert_eq!(card.logic_type, LogicType::ALL[i % 5]);
            prop_assert_eq!(card.visual_status, VisualStatus::Skeleton);
            prop_assert_eq!(card.l2_knowledge.as_str(), KNOWLEDGE_BASE[i % 5].l2);
            prop_assert!(card.image_url.is_none());
            prop_assert!(card.score.is_none());
            prop_assert!(card.prompt.contains(params.face_shape.label()));
            prop_assert!(card.prompt.contains(params.hat_type.label()));
        }
        prop_assert_eq!(stream, fallback_skeleton(&topic, &params));
    }
}
