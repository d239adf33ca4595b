// SPDX-License-Identifier: Apache-2.0

use capvisor_model::{LogicType, TargetingParameters, DEFAULT_SCENE};

const POOL_SIZE: usize = 3;
const DAILY_SCENE: &str = "日常";
const DATE_SCENE: &str = "约会";

pub(crate) struct TemplateContext<'a> {
    title: &'a str,
    face: &'static str,
    hat: &'static str,
    origin: &'a str,
    commute: &'a str,
    daily: &'a str,
    date: &'a str,
    scenes: String,
    keyword: &'static str,
}

impl<'a> TemplateContext<'a> {
    pub(crate) fn new(title: &'a str, params: &'a TargetingParameters) -> Self {
        Self {
            title,
            face: params.face_shape.label(),
            hat: params.hat_type.label(),
            origin: params.primary_origin(),
            commute: params.scene_at(0).unwrap_or(DEFAULT_SCENE),
            daily: params.scene_at(0).unwrap_or(DAILY_SCENE),
            date: params.scene_at(1).unwrap_or(DATE_SCENE),
            scenes: params.scenes_joined("、"),
            keyword: topic_keyword(title),
        }
    }
}

const KEYWORDS: [(&str, &str); 8] = [
    ("技巧", "技巧展示"),
    ("痛点", "痛点对比"),
    ("场景", "场景化展示"),
    ("原理", "原理图解"),
    ("版型", "版型细节"),
    ("颜色", "色彩对比"),
    ("误区", "误区对比"),
    ("明星", "明星同款"),
];

/// Visual angle implied by the topic title; first listed cue wins.
#[must_use]
pub fn topic_keyword(title: &str) -> &'static str {
    KEYWORDS
        .iter()
        .find(|(cue, _)| title.contains(cue))
        .map_or("常规展示", |(_, keyword)| keyword)
}

/// Picks from a pool the way page numbers (1-based) rotate through it.
pub(crate) fn pick(mut pool: [String; POOL_SIZE], page_index: usize) -> String {
    std::mem::take(&mut pool[(page_index + 1) % POOL_SIZE])
}

pub(crate) fn visual_logic_pool(logic: LogicType, cx: &TemplateContext<'_>) -> [String; POOL_SIZE] {
    let TemplateContext {
        title,
        face,
        hat,
        origin,
        commute,
        daily,
        scenes,
        keyword,
        ..
    } = cx;
    match logic {
        LogicType::Intro => [
            format!("模特正面展示{hat}，突出{face}脸型的整体轮廓，呼应\"{title}\"的主题"),
            format!("侧脸45度角，展示{hat}与{face}的协调感，体现{keyword}的视觉效果"),
            format!("多角度对比：正面、侧面、45度角，全面展示{hat}效果，契合\"{title}\"的深度解析"),
        ],
        LogicType::PainPointAnalysis => [
            format!("对比图：不戴帽 vs 戴{hat}，突出{origin}问题的改善，呼应\"{title}\"中的痛点分析"),
            format!("特写镜头聚焦{face}的关键区域，展示{hat}的修饰作用，体现\"{title}\"的解决方案"),
            format!("动态抓拍：模特转头瞬间，展示{hat}对{face}的修饰效果，验证\"{title}\"的实用性"),
        ],
        LogicType::AestheticPrinciple => [
            format!("黄金分割构图，{hat}作为视觉焦点，引导视线，诠释\"{title}\"中的美学原理"),
            format!("光影对比：强光打在{hat}上，弱化{face}的不足，展示\"{title}\"提到的视觉技巧"),
            format!("色彩层次：{hat}的颜色与肤色形成对比，提升整体美感，体现\"{title}\"的色彩心理学应用"),
        ],
        LogicType::Solution => [
            format!("专业搭配示范：{hat} + 适合{face}的发型和妆容，实践\"{title}\"的搭配方案"),
            format!("场景化展示：在{commute}场景中，{hat}的实际应用，验证\"{title}\"的实用性"),
            format!("细节特写：{hat}的材质、版型如何优化{face}的视觉效果，详解\"{title}\"中的关键细节"),
        ],
        LogicType::ProductPitch => [
            format!("情感化表达：模特自信佩戴{hat}，展现{face}的独特魅力，呼应\"{title}\"的情感价值"),
            format!("生活化场景：{daily}中{hat}的自然呈现，体现\"{title}\"的实用场景"),
            format!("多场景切换：{scenes}等不同场合，{hat}的百搭性，验证\"{title}\"的适用性"),
        ],
    }
}

pub(crate) fn headline_pool(logic: LogicType, cx: &TemplateContext<'_>) -> [String; POOL_SIZE] {
    let TemplateContext {
        title,
        face,
        hat,
        origin,
        commute,
        daily,
        date,
        ..
    } = cx;
    match logic {
        LogicType::Intro => [
            format!("{title}：完美搭配从这里开始"),
            format!("揭秘{face}最适合的{hat}款式"),
            format!("{title}：{face}的{hat}选择指南"),
        ],
        LogicType::PainPointAnalysis => [
            format!("{origin}？{hat}帮你解决"),
            format!("{face}的困扰，{hat}来拯救"),
            format!("告别{origin}，{hat}的正确打开方式"),
        ],
        LogicType::AestheticPrinciple => [
            format!("视觉重心转移：{hat}如何优化{face}"),
            format!("黄金比例法则：{hat}与{face}的完美平衡"),
            format!("色彩心理学：{hat}如何提升{face}的视觉美感"),
        ],
        LogicType::Solution => [
            format!("{face} x {hat}：专业搭配方案"),
            format!("场景化搭配：{commute}中的{hat}应用"),
            format!("细节决定成败：{hat}的{face}适配技巧"),
        ],
        LogicType::ProductPitch => [
            format!("{hat}：{face}的时尚新选择"),
            format!("从{daily}到{date}，{hat}的百搭魅力"),
            format!("自信从{hat}开始：{face}的完美蜕变"),
        ],
    }
}

pub(crate) fn script_pool(logic: LogicType, cx: &TemplateContext<'_>) -> [String; POOL_SIZE] {
    let TemplateContext {
        title,
        face,
        hat,
        origin,
        commute,
        daily,
        date,
        ..
    } = cx;
    match logic {
        LogicType::Intro => [
            format!("关于\"{title}\"，如果你是{face}，{hat}可能是你的最佳选择。今天就来聊聊为什么。"),
            format!("{title}：{face} x {hat}，这个组合比你想象的更完美。"),
            format!("谁说{face}不适合{hat}？关于\"{title}\"，看完这篇你就知道了。"),
        ],
        LogicType::PainPointAnalysis => [
            format!("{face}最怕的就是{origin}，而{hat}正好能解决这个问题。"),
            format!("很多{face}的朋友都有{origin}的困扰，{hat}来帮你。"),
            format!("为什么{face}容易{origin}？{hat}如何改善？"),
        ],
        LogicType::AestheticPrinciple => [
            format!("视觉重心转移原理告诉我们，{hat}可以通过上移重心来优化{face}。"),
            format!("黄金比例法则：{hat}的宽度和高度如何与{face}形成最佳比例。"),
            format!("色彩心理学：{hat}的颜色选择如何影响{face}的视觉效果。"),
        ],
        LogicType::Solution => [
            format!("{face}选择{hat}时，要注意版型、材质和颜色。"),
            format!("在{commute}场景中，{hat}的搭配技巧有哪些？"),
            format!("细节决定成败：{hat}的细节设计如何优化{face}的视觉效果。"),
        ],
        LogicType::ProductPitch => [
            format!("这款{hat}专为{face}设计，从{daily}到{date}都能完美驾驭。"),
            format!("如果你也是{face}，这款{hat}绝对值得拥有。"),
            format!("{hat}：让{face}的你更加自信美丽。"),
        ],
    }
}
