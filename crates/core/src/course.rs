//! The Yeast Respiration Inquiry
//!
//! The authored lesson: a four-module guided inquiry into whether temperature
//! changes how fast yeast respires. Module 1 focuses the question, module 2
//! identifies variables and runs the experiment on the lab bench, module 3
//! draws the conclusion and module 4 transfers it to everyday life.

use crate::classifier::{AnyKeyword, ClassifierPolicy, KeywordCount, KeywordGroup, KeywordGroups};
use crate::lesson::Lesson;
use crate::script::{ChoiceOption, Condition, Script, ScriptError, Step, StepKind};
use crate::state::LearnerState;
use crate::summary::{CourseSummary, Highlight};
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const TITLE: &str = "细胞AI探究课 - 酵母菌呼吸作用实验";
pub const SUMMARY_TITLE: &str = "探究总结";
/// Summary label under which the learner's prediction is reported.
pub const PREDICTION_LABEL: &str = "你的预测";
/// What the experiment actually shows.
pub const ACTUAL_RESULT: &str = "温度越高，产气越多";

const UNRECORDED: &str = "未记录";
const PREDICTION_PHRASES: [(&str, &str); 3] = [
    ("higher_more", ACTUAL_RESULT),
    ("lower_more", "温度越低，产气越多"),
    ("no_effect", "温度不影响产气量"),
];

/// The phrase shown for a recorded prediction value.
pub fn prediction_text(prediction: Option<&str>) -> &'static str {
    PREDICTION_PHRASES
        .iter()
        .find(|(value, _)| Some(*value) == prediction)
        .map_or(UNRECORDED, |&(_, phrase)| phrase)
}

/// Parameters of the bench's prediction-versus-result comparison.
fn prediction_compare_params() -> Value {
    let phrases: Map<String, Value> = PREDICTION_PHRASES
        .iter()
        .map(|(value, phrase)| (value.to_string(), json!(phrase)))
        .collect();
    json!({
        "phrases": phrases,
        "actual": "higher_more",
        "stateKey": "prediction",
        "unrecorded": UNRECORDED,
    })
}

/// The learner-state defaults the lesson starts from (and resets to).
pub fn defaults() -> Map<String, Value> {
    let value = json!({
        "currentModule": 1,
        "currentStep": 0,
        "hasLearnedVariables": false,
        "initialAnswer": "",
        "understoodConnection": false,
        "independentVariable": null,
        "dependentVariable": null,
        "controlVariables": [],
        "measurementMethod": null,
        "groupCount": 0,
        "prediction": null,
        "experimentData": {
            "group1": { "temp": 10, "gas": 0 },
            "group2": { "temp": 20, "gas": 0 },
            "group3": { "temp": 30, "gas": 0 }
        },
        "experimentPhase": 0,
        "observedPhenomenon": false,
        "foundPattern": false,
        "conclusion": "",
        "explainedPhenomenon": false,
        "transferAnswer": null,
        "reflection": "",
        "waitingForInput": false,
        "lastAnswerCorrect": false,
        "lastAnalysis": null
    });
    value.as_object().cloned().unwrap_or_default()
}

pub fn initial_state() -> LearnerState {
    LearnerState::new(defaults())
}

/// Builds the course summary card.
pub fn summarize(state: &LearnerState) -> CourseSummary {
    let mut summary = CourseSummary::from_state(SUMMARY_TITLE, state);
    summary.highlights = vec![
        Highlight::new("探究问题", "温度是否会影响酵母菌呼吸作用的速度"),
        Highlight::new(
            "实验变量",
            "自变量（温度）、因变量（CO₂体积）、控制变量（酵母量、糖量等）",
        ),
        Highlight::new(PREDICTION_LABEL, prediction_text(state.get_str("prediction"))),
        Highlight::new(
            "实验结论",
            "温度越高，酵母菌产生的二氧化碳越多（适用于10-40°C）",
        ),
        Highlight::new("生活应用", "温度影响发面速度，冷藏可减缓发酵"),
    ];
    summary
}

/// The complete lesson.
pub fn yeast_respiration() -> Result<Lesson, ScriptError> {
    Ok(Lesson::new(
        TITLE,
        Script::new(steps())?,
        defaults(),
        Arc::new(summarize),
    ))
}

struct Grading {
    correct_value: Value,
    on_correct: &'static str,
    on_incorrect: &'static str,
}

impl Grading {
    fn new(correct_value: impl Into<Value>, on_correct: &'static str, on_incorrect: &'static str) -> Self {
        Self {
            correct_value: correct_value.into(),
            on_correct,
            on_incorrect,
        }
    }
}

fn message(id: &str, module: u8, content: &str, delay_ms: u64) -> Step {
    Step {
        id: id.to_string(),
        module,
        kind: StepKind::Message {
            content: content.to_string(),
            auto_advance: true,
            delay_ms,
        },
    }
}

fn action(id: &str, module: u8, name: &str, params: Value, delay_ms: u64) -> Step {
    Step {
        id: id.to_string(),
        module,
        kind: StepKind::Action {
            action: name.to_string(),
            params,
            auto_advance: true,
            delay_ms,
        },
    }
}

fn reveal(id: &str, module: u8) -> Step {
    Step {
        id: id.to_string(),
        module,
        kind: StepKind::Reveal,
    }
}

fn branch(id: &str, module: u8, condition: Condition, on_true: &str, on_false: &str) -> Step {
    Step {
        id: id.to_string(),
        module,
        kind: StepKind::Branch {
            condition,
            on_true: on_true.to_string(),
            on_false: on_false.to_string(),
        },
    }
}

/// An unconditional jump, used to skip over the alternative feedback path.
fn goto(id: &str, module: u8, target: &str) -> Step {
    branch(id, module, Condition::Always, target, target)
}

fn choice(
    id: &str,
    module: u8,
    prompt: &str,
    options: Vec<ChoiceOption>,
    state_key: Option<&str>,
    grading: Option<Grading>,
) -> Step {
    let (correct_value, on_correct, on_incorrect) = match grading {
        Some(g) => (
            Some(g.correct_value),
            Some(g.on_correct.to_string()),
            Some(g.on_incorrect.to_string()),
        ),
        None => (None, None, None),
    };
    Step {
        id: id.to_string(),
        module,
        kind: StepKind::Choice {
            prompt: prompt.to_string(),
            options,
            state_key: state_key.map(str::to_string),
            correct_value,
            on_correct,
            on_incorrect,
        },
    }
}

fn free_input(
    id: &str,
    module: u8,
    prompt: &str,
    state_key: Option<&str>,
    classifier: Option<ClassifierPolicy>,
    targets: Option<(&str, &str)>,
) -> Step {
    Step {
        id: id.to_string(),
        module,
        kind: StepKind::FreeInput {
            prompt: prompt.to_string(),
            state_key: state_key.map(str::to_string),
            classifier,
            on_understood: targets.map(|(yes, _)| yes.to_string()),
            on_not_understood: targets.map(|(_, no)| no.to_string()),
        },
    }
}

fn steps() -> Vec<Step> {
    vec![
        message(
            "intro_1",
            1,
            "你好！欢迎来到细胞探究实验室！🔬\n\n今天我们要一起探索一个有趣的科学问题。",
            1500,
        ),
        message(
            "intro_2",
            1,
            "想象一下这样的场景：\n\n周末的早晨，妈妈在厨房里揉好了一团面团，准备做包子。她把面团放进一个大盆里，然后**把盆放到了暖气旁边**。\n\n过了一个多小时，面团竟然变得**又大又软**，比刚才大了两倍！",
            2500,
        ),
        free_input(
            "question_1",
            1,
            "🤔 你觉得，**为什么妈妈要把面团放到暖气附近呢？**\n\n请说说你的想法：",
            Some("initialAnswer"),
            Some(
                KeywordGroups::new(vec![
                    KeywordGroup::new("mentionsTemp", ["温度", "热", "暖", "温暖"]),
                    KeywordGroup::new("mentionsYeast", ["酵母", "呼吸", "发酵", "菌"]),
                ])
                .into(),
            ),
            Some(("focus_understood", "focus_guide")),
        ),
        message(
            "focus_understood",
            1,
            "**很好的思考！** 👏\n\n你已经将温度和呼吸作用联系起来了！面团中确实有酵母菌，它们通过呼吸作用产生气体。\n\n那么，**温度是否真的会影响酵母菌的呼吸作用速度呢？**",
            2000,
        ),
        message(
            "focus_question_show",
            1,
            "我们今天就来研究这个科学问题：\n\n🔬 **温度会不会影响酵母菌的呼吸速度？**",
            1500,
        ),
        reveal("show_science_question", 2),
        message(
            "goto_module2",
            2,
            "让我们通过实验来探究这个问题！首先，我们需要了解实验中的变量。",
            1500,
        ),
        goto("jump_to_variables", 2, "variable_intro"),
        message(
            "focus_guide",
            1,
            "这是个很好的问题！让我来给你一些提示：\n\n我们知道，面团中有一种微小的生物叫**酵母菌**。酵母菌通过**呼吸作用**产生二氧化碳气体，这些气体让面团膨胀变大。",
            2000,
        ),
        message(
            "focus_guide_2",
            1,
            "那么，**温度是否会影响酵母菌的呼吸作用速度呢？**\n\n这就是我们今天要探究的科学问题！",
            1500,
        ),
        reveal("focus_guide_show_question", 2),
        message(
            "focus_guide_to_module2",
            2,
            "让我们通过实验来探究这个问题！首先，我们需要了解实验中的变量。",
            1500,
        ),
        message(
            "variable_intro",
            2,
            "在科学实验中，我们需要识别三种重要的**变量**：\n\n• 我们**主动改变**的因素\n• 我们**观察和测量**的结果\n• 需要**保持不变**的因素\n\n让我们一起来识别这些变量！",
            2000,
        ),
        choice(
            "variable_independent",
            2,
            "首先，在这个实验中，我们**主动改变**的因素是什么？",
            vec![
                ChoiceOption::new("温度", "temperature").marked(true),
                ChoiceOption::new("酵母数量", "yeast").marked(false),
                ChoiceOption::new("时间", "time").marked(false),
            ],
            Some("independentVariable"),
            Some(Grading::new("temperature", "variable_independent_correct", "variable_independent_wrong")),
        ),
        message(
            "variable_independent_correct",
            2,
            "**正确！** ✓\n\n我们主动改变的是**温度**。这在科学实验中叫做**自变量**。\n\n[自变量:温度]",
            1500,
        ),
        action("add_temp_tool", 2, "add_tool", json!({"tool":{"id":"heater","icon":"🌡️","name":"温度控制器"}}), 500),
        goto("goto_dependent", 2, "variable_dependent"),
        message(
            "variable_independent_wrong",
            2,
            "🤔 想想看，我们想研究的是\"温度是否影响呼吸速度\"。\n\n所以，我们需要**主动改变温度**来观察效果。温度就是我们的**自变量**。\n\n[自变量:温度]",
            2000,
        ),
        action("add_temp_tool_2", 2, "add_tool", json!({"tool":{"id":"heater","icon":"🌡️","name":"温度控制器"}}), 500),
        choice(
            "variable_dependent",
            2,
            "接下来，我们需要**观察和测量**什么来判断呼吸作用的速度呢？",
            vec![
                ChoiceOption::new("定时1小时，测量产生的二氧化碳气体体积", "gas_volume").marked(true),
                ChoiceOption::new("闻一闻气味", "smell").marked(false),
                ChoiceOption::new("看面团的颜色", "color").marked(false),
            ],
            Some("dependentVariable"),
            Some(Grading::new("gas_volume", "variable_dependent_correct", "variable_dependent_wrong")),
        ),
        message(
            "variable_dependent_correct",
            2,
            "**太棒了！** ✓\n\n测量二氧化碳气体的体积是一个**准确、可量化**的方法！\n\n我们观察和测量的结果叫做**因变量**。\n\n[因变量:二氧化碳体积]",
            1500,
        ),
        action("add_gas_meter", 2, "add_tool", json!({"tool":{"id":"gasmeter","icon":"📊","name":"气体测量仪"}}), 500),
        goto("goto_control", 2, "variable_control"),
        message(
            "variable_dependent_wrong",
            2,
            "🤔 这个方法不够准确哦！\n\n闻气味或看颜色很难**精确测量**。但如果我们测量酵母菌产生的**二氧化碳气体体积**，就能得到准确的数据。\n\n这就是我们的**因变量**！\n\n[因变量:二氧化碳体积]",
            2000,
        ),
        action("add_gas_meter_2", 2, "add_tool", json!({"tool":{"id":"gasmeter","icon":"📊","name":"气体测量仪"}}), 500),
        choice(
            "variable_control",
            2,
            "最后，在实验中哪些因素需要**保持不变**呢？",
            vec![
                ChoiceOption::new("酵母数量、糖量、水量都要保持一样", "all_same").marked(true),
                ChoiceOption::new("只需要保持酵母数量一样", "yeast_only").marked(false),
                ChoiceOption::new("都可以不一样", "all_different").marked(false),
            ],
            Some("controlVariables"),
            Some(Grading::new("all_same", "variable_control_correct", "variable_control_wrong")),
        ),
        message(
            "variable_control_correct",
            2,
            "**完全正确！** ✓\n\n酵母数量、糖量、水量都需要保持一样。这些叫做**控制变量**。\n\n[控制变量:酵母量、糖量、水量]\n\n只有这样，我们才能确定是**温度**影响了结果，而不是其他因素！",
            2000,
        ),
        action("add_control_tools", 2, "show_toolbox", json!({"tools":[{"id":"heater","icon":"🌡️","name":"温度控制器"},{"id":"gasmeter","icon":"📊","name":"气体测量仪"},{"id":"yeast","icon":"🧫","name":"酵母菌"},{"id":"sugar","icon":"🍬","name":"糖"},{"id":"water","icon":"💧","name":"水"},{"id":"beaker","icon":"🧪","name":"烧杯"}]}), 1000),
        goto("goto_summary", 2, "variable_summary"),
        message(
            "variable_control_wrong",
            2,
            "🤔 想想看：如果酵母数量、糖量、水量都不一样，我们还能确定是温度导致的变化吗？\n\n为了确保实验结果可靠，除了温度，其他条件都要**保持一样**。这些叫做**控制变量**。\n\n[控制变量:酵母量、糖量、水量]",
            2000,
        ),
        action("add_control_tools_2", 2, "show_toolbox", json!({"tools":[{"id":"heater","icon":"🌡️","name":"温度控制器"},{"id":"gasmeter","icon":"📊","name":"气体测量仪"},{"id":"yeast","icon":"🧫","name":"酵母菌"},{"id":"sugar","icon":"🍬","name":"糖"},{"id":"water","icon":"💧","name":"水"},{"id":"beaker","icon":"🧪","name":"烧杯"}]}), 1000),
        message(
            "variable_summary",
            2,
            "很好！让我来总结一下三种变量：\n\n• **自变量**：我们主动改变的因素（温度）\n• **因变量**：我们观察和测量的结果（二氧化碳体积）\n• **控制变量**：保持不变的因素（酵母量、糖量、水量）\n\n这样设计实验，才能准确看出不同因素之间的关系！",
            2500,
        ),
        message(
            "group_intro",
            2,
            "现在，让我们来设置实验组别。\n\n我们需要用**不同的温度**来进行实验，这样才能观察温度的影响。",
            1500,
        ),
        choice(
            "group_choice",
            2,
            "你觉得我们应该设置几个温度组来做实验？",
            vec![
                ChoiceOption::new("1个组", 1).marked(false),
                ChoiceOption::new("2个组", 2).marked(false),
                ChoiceOption::new("3个组", 3).marked(true),
            ],
            Some("groupCount"),
            Some(Grading::new(3, "group_correct", "group_guide")),
        ),
        message(
            "group_correct",
            2,
            "**很好的选择！** 👏\n\n3个组是很合适的！这样我们可以设置：\n• **低温组**：10°C\n• **室温组**：20°C\n• **高温组**：30°C\n\n3个温度可以帮助我们看出**变化趋势**，得出更可靠的结论！",
            2000,
        ),
        action("setup_groups", 2, "setup_groups", json!({"count":3}), 1500),
        goto("goto_prediction", 2, "prediction_intro"),
        message(
            "group_guide",
            2,
            "让我来解释一下：\n\n• **1个组**：只有一个温度，无法进行对比\n• **2个组**：可以对比，但只能看出差异，看不出趋势\n• **3个组**：可以看出温度变化对呼吸作用的**影响趋势**\n\n所以，我建议我们用3个温度：**10°C、20°C、30°C**",
            2500,
        ),
        action("setup_groups_2", 2, "setup_groups", json!({"count":3}), 1500),
        action("prediction_intro", 2, "show_preparation", Value::Null, 1000),
        message(
            "prediction_intro_2",
            2,
            "实验准备工作完成了！在开始实验之前，让我们先来**预测**一下结果。\n\n科学家在做实验前，通常会根据已有知识做出预测，然后通过实验来验证。",
            2000,
        ),
        choice(
            "prediction_choice",
            2,
            "🔮 你预测实验结果会是什么？",
            vec![
                ChoiceOption::new("温度越高，产生的气体越多", "higher_more"),
                ChoiceOption::new("温度越低，产生的气体越多", "lower_more"),
                ChoiceOption::new("温度不影响气体产生量", "no_effect"),
            ],
            Some("prediction"),
            None,
        ),
        message(
            "prediction_recorded",
            2,
            "好的，我记录下你的预测了！ 📝\n\n让我们通过实验来验证你的预测是否正确！准备好了吗？",
            1500,
        ),
        message(
            "experiment_start",
            2,
            "🧪 **实验开始！**\n\n我们向每个烧杯中加入等量的酵母菌、糖和水，然后分别设置不同的温度。",
            1500,
        ),
        action("experiment_action", 2, "start_experiment", Value::Null, 2000),
        free_input(
            "experiment_observe",
            2,
            "实验已经开始了！🔍\n\n请你仔细观察一下，你能看到什么现象？",
            Some("observedPhenomenon"),
            Some(AnyKeyword::new(["气泡", "冒泡", "泡", "冒", "气体"]).with_signal("observed").into()),
            Some(("observe_correct", "observe_guide")),
        ),
        message(
            "observe_correct",
            2,
            "**观察得很仔细！** 👏\n\n你看到的气泡就是酵母菌呼吸作用产生的**二氧化碳气体**。",
            1500,
        ),
        goto("goto_fastforward", 2, "fast_forward"),
        message(
            "observe_guide",
            2,
            "仔细看烧杯中的液体——你能看到液体中正在产生**气泡**吗？\n\n这些气泡就是酵母菌呼吸作用产生的**二氧化碳气体**！",
            2000,
        ),
        message(
            "fast_forward",
            2,
            "⏩ 现在让我们**快进时间**，看看1小时后的实验结果！",
            1000,
        ),
        action("fast_forward_action", 2, "fast_forward", Value::Null, 2500),
        action("observe_results_1", 2, "show_results", json!({"groupIndex":0}), 500),
        free_input(
            "observe_results_1_ask",
            2,
            "1小时过去了！让我们来观察结果。\n\n先看**第一组（10°C）**，你能看到产生了多少毫升的气体吗？",
            Some("observation1"),
            Some(ClassifierPolicy::ContainsDigit),
            Some(("observe_results_1_correct", "observe_results_1_hint")),
        ),
        message(
            "observe_results_1_correct",
            2,
            "没错！第一组（10°C）产生了 **20ml** 的二氧化碳气体。",
            1000,
        ),
        goto("goto_obs2", 2, "observe_results_2"),
        message(
            "observe_results_1_hint",
            2,
            "看看气体测量仪的刻度——第一组（10°C）产生了 **20ml** 的二氧化碳气体。",
            1500,
        ),
        action("observe_results_2", 2, "show_results", json!({"groupIndex":1}), 500),
        free_input(
            "observe_results_2_ask",
            2,
            "再看**第二组（20°C）**，产生了多少毫升的气体？",
            Some("observation2"),
            Some(ClassifierPolicy::ContainsDigit),
            Some(("observe_results_2_correct", "observe_results_2_hint")),
        ),
        message(
            "observe_results_2_correct",
            2,
            "正确！第二组（20°C）产生了 **40ml** 的二氧化碳气体。比第一组多了一倍呢！",
            1000,
        ),
        goto("goto_obs3", 2, "observe_results_3"),
        message(
            "observe_results_2_hint",
            2,
            "看气体测量仪——第二组（20°C）产生了 **40ml** 的二氧化碳气体！",
            1500,
        ),
        action("observe_results_3", 2, "show_results", json!({"groupIndex":2}), 500),
        free_input(
            "observe_results_3_ask",
            2,
            "最后看**第三组（30°C）**，产生了多少毫升的气体？",
            Some("observation3"),
            Some(ClassifierPolicy::ContainsDigit),
            Some(("observe_results_3_correct", "observe_results_3_hint")),
        ),
        message(
            "observe_results_3_correct",
            2,
            "太棒了！第三组（30°C）产生了 **60ml** 的二氧化碳气体！是产气量最多的一组！",
            1000,
        ),
        goto("goto_data_table", 2, "show_data_table"),
        message(
            "observe_results_3_hint",
            2,
            "第三组（30°C）产生了 **60ml** 的二氧化碳气体——是三组中最多的！",
            1500,
        ),
        message(
            "show_data_table",
            2,
            "📊 让我们把数据整理成表格：",
            1000,
        ),
        action("data_table_action", 2, "show_data_table", Value::Null, 1500),
        message(
            "show_chart_intro",
            2,
            "实验数据都收集完了！📈\n\n让我们把它画成图表，这样更容易看出规律。",
            1500,
        ),
        action("show_chart_action", 2, "show_chart", Value::Null, 2000),
        free_input(
            "find_pattern",
            3,
            "观察这个图表，你发现了什么规律？🔍",
            Some("patternDescription"),
            Some(AnyKeyword::new(["高", "多", "增", "上升", "越", "规律"]).into()),
            Some(("pattern_found", "pattern_guide")),
        ),
        message(
            "pattern_found",
            3,
            "**发现得很好！** 👏\n\n从数据可以清楚地看到：\n• 10°C → 20ml\n• 20°C → 40ml\n• 30°C → 60ml\n\n**温度每升高10°C，产生的二氧化碳就增加20ml！**",
            2000,
        ),
        goto("goto_prediction_compare", 3, "prediction_compare"),
        message(
            "pattern_guide",
            3,
            "让我来帮你分析：\n\n看图表的柱子高度：\n• 10°C 产生 20ml\n• 20°C 产生 40ml\n• 30°C 产生 60ml\n\n你看出来了吗？**温度越高，产生的气体越多！**",
            2500,
        ),
        message(
            "prediction_compare",
            3,
            "还记得你在实验前的预测吗？让我们来对比一下：",
            1000,
        ),
        action(
            "prediction_compare_action",
            3,
            "show_prediction_compare",
            prediction_compare_params(),
            1500,
        ),
        branch(
            "prediction_compare_result",
            3,
            Condition::equals("prediction", "higher_more"),
            "prediction_match",
            "prediction_mismatch",
        ),
        message(
            "prediction_match",
            3,
            "🎉 **太棒了！你的预测完全正确！**\n\n通过实验，我们证实了：温度越高，酵母菌产生的二氧化碳越多！",
            2000,
        ),
        goto("goto_conclusion", 3, "conclusion_intro"),
        message(
            "prediction_mismatch",
            3,
            "实验结果与你的预测不同，但这没关系！\n\n这正是科学探究的意义——**通过实验来验证或修正我们的想法**。\n\n现在我们知道了：温度越高，酵母菌产生的二氧化碳越多！",
            2500,
        ),
        message(
            "conclusion_intro",
            3,
            "现在，让我们来总结实验结论。\n\n一个好的科学结论需要：\n• 说清楚**自变量和因变量**的关系\n• 最好用上**具体的数字**",
            2000,
        ),
        free_input(
            "conclusion_ask",
            3,
            "根据实验结果，你能尝试总结出我们的结论吗？",
            Some("conclusion"),
            Some(
                KeywordGroups::new(vec![
                    KeywordGroup::new("mentionsTemp", ["温度"]),
                    KeywordGroup::new("mentionsRelation", ["高", "多", "增"]),
                ])
                .into(),
            ),
            Some(("conclusion_good", "conclusion_help")),
        ),
        message(
            "conclusion_good",
            3,
            "**很好！** ✓\n\n让我来完善一下：\n\n📝 **实验结论**：温度越高，酵母菌产生的二氧化碳气体量越多。温度每升高10°C，产生的二氧化碳就增加20ml。",
            2000,
        ),
        goto("goto_scope", 3, "scope_discuss"),
        message(
            "conclusion_help",
            3,
            "没问题，让我来示范一下：\n\n📝 **实验结论**：\n温度越高，酵母菌产生的二氧化碳气体量越多。\n温度每升高10°C，产生的二氧化碳就增加20ml。\n\n这样的结论说清楚了温度和气体量的关系，还用了具体的数字！",
            2500,
        ),
        choice(
            "scope_discuss",
            3,
            "🤔 这个结论在任何情况下都成立吗？\n\n比如，你认为在**100°C**时，这个结论还成立吗？",
            vec![
                ChoiceOption::new("成立，温度越高产气越多", "yes"),
                ChoiceOption::new("不成立，太热会有问题", "no").marked(true),
                ChoiceOption::new("不确定", "unsure"),
            ],
            Some("scopeAnswer"),
            None,
        ),
        message(
            "scope_explain",
            3,
            "**很好的思考！** 💡\n\n实际上，在100°C时，酵母菌会被**烫死**，就不会再产生气体了！\n\n这说明，我们的结论有一个\"**适用范围**\"：\n• 适用于 **10-40°C** 的温度范围\n• 温度太高（>50°C）：酵母可能死亡\n• 温度太低（<5°C）：酵母几乎不进行呼吸作用\n\n科学结论往往都有适用条件！",
            3000,
        ),
        message(
            "explain_intro",
            4,
            "现在，让我们回到开始的问题：\n\n**为什么妈妈要把面团放到暖气附近呢？**\n\n你现在能用我们学到的知识来解释吗？",
            2000,
        ),
        free_input(
            "explain_ask",
            4,
            "请尝试解释一下：",
            Some("explanation"),
            Some(
                KeywordCount::new(
                    ["温度", "暖", "热", "快", "呼吸", "气体", "二氧化碳", "发酵"],
                    2,
                )
                .into(),
            ),
            Some(("explain_good", "explain_help")),
        ),
        message(
            "explain_good",
            4,
            "**解释得很清晰！** 👏\n\n没错！妈妈把面团放在温暖的地方，是因为：\n• 温度高 → 酵母菌呼吸作用快\n• 产生更多二氧化碳\n• 面团里更快地充满气体，变得又大又软！\n\n你成功地用科学知识解释了生活现象！",
            2500,
        ),
        goto("goto_transfer", 4, "transfer_intro"),
        message(
            "explain_help",
            4,
            "让我来帮你解释：\n\n妈妈把面团放在暖气附近，是因为：\n1. 暖气附近**温度较高**\n2. 根据我们的实验：温度高 → 酵母菌呼吸作用快 → 产生更多**二氧化碳**\n3. 二氧化碳气体让面团**膨胀变大**！\n\n所以，温暖的环境可以让面团发得更快！",
            3000,
        ),
        message(
            "transfer_intro",
            4,
            "让我们再来解决一个新问题：",
            1000,
        ),
        choice(
            "transfer_question",
            4,
            "🌙 如果想让面团发得**慢一点**，比如晚上睡觉前准备好面团，打算第二天早上再用。\n\n应该怎么做呢？",
            vec![
                ChoiceOption::new("放在冰箱里（温度低）", "fridge").marked(true),
                ChoiceOption::new("放在暖气旁（温度高）", "heater").marked(false),
                ChoiceOption::new("就放在室温下（20度左右）", "room").marked(false),
            ],
            Some("transferAnswer"),
            Some(Grading::new("fridge", "transfer_correct", "transfer_wrong")),
        ),
        message(
            "transfer_correct",
            4,
            "**完全正确！** 🎉\n\n放冰箱里温度低，根据我们的实验结论：\n• 温度低 → 呼吸作用减弱\n• 二氧化碳产生得慢 → 面团发得慢\n• 刚好第二天早上用！\n\n你已经学会运用科学知识解决生活问题了！",
            2500,
        ),
        goto("goto_review", 4, "review_intro"),
        message(
            "transfer_wrong",
            4,
            "想想我们的实验：温度越高，呼吸作用越快。\n\n如果想让面团发得**慢**，应该用**低温**！\n\n所以，放在**冰箱里**是最好的选择——温度低，酵母菌呼吸作用慢，面团就发得慢，刚好第二天早上用！",
            2500,
        ),
        message(
            "review_intro",
            4,
            "🎊 **恭喜你完成了一次完整的科学探究！**\n\n让我们来回顾一下整个探究过程：",
            1500,
        ),
        action("review_flow", 4, "show_flow_chart", Value::Null, 2000),
        message(
            "review_steps",
            4,
            "我们经历了这些步骤：\n\n1. ❓ **提出问题**：温度是否影响呼吸速度\n2. 📊 **识别变量**：自变量、因变量、控制变量\n3. 🔧 **设计实验**：设置3个温度组\n4. 🧪 **执行实验**：观察和记录数据\n5. 📈 **分析数据**：发现规律\n6. 💡 **得出结论**：温度越高，产气越多\n7. 🔄 **应用知识**：解释生活现象",
            3000,
        ),
        free_input(
            "reflection",
            4,
            "在这些环节中，你觉得**哪个环节最有趣**或**学到最多**？",
            Some("reflection"),
            None,
            None,
        ),
        message(
            "reflection_response",
            4,
            "感谢你的分享！ 💝\n\n科学探究就是这样一个有趣的过程：从生活中发现问题，通过实验寻找答案，再用知识解释更多现象。\n\n希望你今天学到的方法，能帮助你探索更多的科学奥秘！",
            2500,
        ),
        message(
            "end_message",
            4,
            "🌟 **探究结束！**\n\n今天你的表现非常棒！继续保持好奇心，探索这个神奇的世界吧！\n\n下次见！👋",
            2000,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::lab::{LabAction, LabBench, LabView};

    fn lesson() -> Lesson {
        yeast_respiration().expect("authored lesson is valid")
    }

    fn classify(id: &str, text: &str) -> bool {
        let lesson = lesson();
        match &lesson.script.get(id).expect("step exists").kind {
            StepKind::FreeInput {
                classifier: Some(classifier),
                ..
            } => classifier.classify(text).understood,
            other => panic!("{} is not a classified free-input step: {:?}", id, other),
        }
    }

    #[test]
    fn every_reference_resolves() {
        let lesson = lesson();
        assert!(lesson.script.unresolved_references().is_empty());
        assert_eq!(lesson.script.step_at(0).map(|s| s.id.as_str()), Some("intro_1"));
    }

    #[test]
    fn modules_stay_within_the_four_phases() {
        let lesson = lesson();
        assert!(lesson.script.iter().all(|s| (1..=4).contains(&s.module)));
        assert_eq!(lesson.script.iter().last().map(|s| s.module), Some(4));
    }

    #[test]
    fn first_question_needs_temperature_and_respiration() {
        assert!(classify("question_1", "因为天气暖和，酵母呼吸变快"));
        assert!(!classify("question_1", "因为它比较好吃"));
        assert!(!classify("question_1", "因为暖气旁边很热"));
    }

    #[test]
    fn observation_and_reading_questions() {
        assert!(classify("experiment_observe", "冒出了很多小泡"));
        assert!(!classify("experiment_observe", "什么也没有"));
        assert!(classify("observe_results_2_ask", "40ml"));
        assert!(!classify("observe_results_2_ask", "四十毫升"));
    }

    #[test]
    fn conclusion_and_explanation_thresholds() {
        assert!(classify("conclusion_ask", "温度越高气体越多"));
        assert!(!classify("conclusion_ask", "气体越来越多"));
        assert!(classify("explain_ask", "暖和的地方发酵快"));
        assert!(!classify("explain_ask", "因为暖和"));
    }

    #[test]
    fn prediction_phrases() {
        assert_eq!(prediction_text(Some("higher_more")), "温度越高，产气越多");
        assert_eq!(prediction_text(Some("no_effect")), "温度不影响产气量");
        assert_eq!(prediction_text(Some("other")), "未记录");
        assert_eq!(prediction_text(None), "未记录");
    }

    #[test]
    fn bench_compares_against_the_course_phrases() {
        let compare = LabAction::parse("show_prediction_compare", &prediction_compare_params())
            .expect("course comparison params parse");
        let mut state = initial_state();
        state.set("prediction", "lower_more");
        assert_eq!(
            LabBench::new().apply(&compare, &state).view,
            LabView::PredictionCompare {
                predicted: "温度越低，产气越多".into(),
                actual: "温度越高，产气越多".into(),
                matched: false,
            }
        );
    }

    #[test]
    fn summary_reports_prediction() {
        let mut state = initial_state();
        state.set("prediction", "lower_more");
        let summary = summarize(&state);
        assert_eq!(summary.title, SUMMARY_TITLE);
        assert_eq!(summary.highlight(PREDICTION_LABEL), Some("温度越低，产气越多"));
        assert_eq!(summary.experiment.len(), 3);
    }
}
