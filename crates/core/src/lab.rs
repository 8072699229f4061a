//! Lab Bench Model
//!
//! The lesson's action steps drive a simulated lab bench: tools appear,
//! temperature groups are set up, the experiment runs and is fast-forwarded,
//! and the results are tabulated and charted. This module keeps the bench's
//! state and decides what each action shows; presenters only draw the
//! resulting [`LabView`].

use crate::state::LearnerState;
use crate::summary::{EXPERIMENT_DATA_KEY, GroupReading, readings};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

/// Temperatures of the three experiment groups, in °C.
pub const GROUP_TEMPERATURES: [i64; 3] = [10, 20, 30];
/// Gas produced by each group after the one-hour fast-forward, in ml.
pub const FAST_FORWARD_GAS: [i64; 3] = [20, 40, 60];

const IDLE_STATUS: &str = "准备中...";
const FLOW_STAGES: [&str; 7] = [
    "提出问题",
    "识别变量",
    "设计实验",
    "执行实验",
    "收集数据",
    "得出结论",
    "迁移应用",
];

#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("unknown lab action '{0}'")]
    UnknownAction(String),
    #[error("invalid parameters for lab action '{action}': {source}")]
    InvalidParams {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A piece of equipment on the bench.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub icon: String,
    pub name: String,
}

impl Tool {
    pub fn new(id: &str, icon: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            icon: icon.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ToolParams {
    tool: Tool,
}

#[derive(Deserialize)]
struct ToolboxParams {
    tools: Vec<Tool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighlightParams {
    tool_id: String,
}

#[derive(Deserialize)]
struct GroupsParams {
    count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultsParams {
    group_index: usize,
}

#[derive(Deserialize)]
struct StatusParams {
    text: String,
}

/// How to set a recorded prediction against the experiment's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionCompare {
    /// The phrase shown for each prediction value.
    pub phrases: BTreeMap<String, String>,
    /// The prediction value the experiment confirms.
    pub actual: String,
    /// The learner-state key holding the prediction.
    #[serde(default = "default_prediction_key")]
    pub state_key: String,
    /// Shown when no known prediction was recorded.
    #[serde(default)]
    pub unrecorded: String,
}

fn default_prediction_key() -> String {
    "prediction".to_string()
}

impl PredictionCompare {
    fn phrase(&self, value: &str) -> String {
        self.phrases
            .get(value)
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    fn view(&self, state: &LearnerState) -> LabView {
        let prediction = state.get_str(&self.state_key);
        LabView::PredictionCompare {
            predicted: prediction
                .and_then(|p| self.phrases.get(p))
                .cloned()
                .unwrap_or_else(|| self.unrecorded.clone()),
            actual: self.phrase(&self.actual),
            matched: prediction == Some(self.actual.as_str()),
        }
    }
}

fn params<T: DeserializeOwned>(action: &str, params: &Value) -> Result<T, LabError> {
    serde_json::from_value(params.clone()).map_err(|source| LabError::InvalidParams {
        action: action.to_string(),
        source,
    })
}

/// A parsed lab action.
#[derive(Debug, Clone, PartialEq)]
pub enum LabAction {
    AddTool(Tool),
    ShowToolbox(Vec<Tool>),
    HighlightTool(String),
    SetupGroups(usize),
    ShowPreparation,
    StartExperiment,
    FastForward,
    ShowResults(usize),
    ShowDataTable,
    ShowChart,
    ShowPredictionCompare(PredictionCompare),
    ShowFlowChart,
    UpdateStatus(String),
}

impl LabAction {
    /// Parses an action step's name and parameters.
    pub fn parse(name: &str, raw: &Value) -> Result<Self, LabError> {
        Ok(match name {
            "add_tool" => Self::AddTool(params::<ToolParams>(name, raw)?.tool),
            "show_toolbox" => Self::ShowToolbox(params::<ToolboxParams>(name, raw)?.tools),
            "highlight_tool" => Self::HighlightTool(params::<HighlightParams>(name, raw)?.tool_id),
            "setup_groups" => Self::SetupGroups(params::<GroupsParams>(name, raw)?.count),
            "show_preparation" => Self::ShowPreparation,
            "start_experiment" => Self::StartExperiment,
            "fast_forward" => Self::FastForward,
            "show_results" => Self::ShowResults(params::<ResultsParams>(name, raw)?.group_index),
            "show_data_table" => Self::ShowDataTable,
            "show_chart" => Self::ShowChart,
            "show_prediction_compare" => Self::ShowPredictionCompare(params(name, raw)?),
            "show_flow_chart" => Self::ShowFlowChart,
            "update_status" => Self::UpdateStatus(params::<StatusParams>(name, raw)?.text),
            other => return Err(LabError::UnknownAction(other.to_string())),
        })
    }
}

/// One beaker on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExperimentGroup {
    pub index: usize,
    pub temperature: i64,
    pub gas: i64,
}

/// What the bench shows after an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum LabView {
    Toolbox {
        tools: Vec<Tool>,
        highlighted: Option<String>,
    },
    Groups {
        groups: Vec<ExperimentGroup>,
        running: bool,
    },
    Checklist {
        items: Vec<String>,
    },
    Results {
        group: ExperimentGroup,
    },
    DataTable {
        readings: Vec<GroupReading>,
    },
    Chart {
        labels: Vec<String>,
        values: Vec<i64>,
    },
    PredictionCompare {
        predicted: String,
        actual: String,
        matched: bool,
    },
    FlowChart {
        stages: Vec<String>,
    },
    /// Only the status line changed.
    Status,
}

/// The result of applying one action to the bench.
#[derive(Debug, Clone, PartialEq)]
pub struct LabOutcome {
    pub view: LabView,
    /// The bench's status line after the action.
    pub status: String,
    /// How long the action's animation takes to play out.
    pub settle: Duration,
    /// A composite learner-state update the action requests.
    pub state_update: Option<Map<String, Value>>,
}

/// The simulated lab bench.
#[derive(Debug, Clone)]
pub struct LabBench {
    tools: Vec<Tool>,
    highlighted: Option<String>,
    groups: Vec<ExperimentGroup>,
    running: bool,
    status: String,
}

impl Default for LabBench {
    fn default() -> Self {
        Self {
            tools: Vec::new(),
            highlighted: None,
            groups: Vec::new(),
            running: false,
            status: IDLE_STATUS.to_string(),
        }
    }
}

impl LabBench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn groups(&self) -> &[ExperimentGroup] {
        &self.groups
    }

    /// Clears the bench back to its empty placeholder.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Parses and applies an action step in one go.
    pub fn run(
        &mut self,
        name: &str,
        raw: &Value,
        state: &LearnerState,
    ) -> Result<LabOutcome, LabError> {
        let action = LabAction::parse(name, raw)?;
        Ok(self.apply(&action, state))
    }

    pub fn apply(&mut self, action: &LabAction, state: &LearnerState) -> LabOutcome {
        let mut settle = Duration::ZERO;
        let mut state_update = None;

        let view = match action {
            LabAction::AddTool(tool) => {
                self.tools.push(tool.clone());
                self.status = "工具已添加".into();
                self.toolbox()
            }
            LabAction::ShowToolbox(tools) => {
                self.tools = tools.clone();
                self.status = "工具准备完成".into();
                self.toolbox()
            }
            LabAction::HighlightTool(id) => {
                if self.tools.iter().any(|t| &t.id == id) {
                    self.highlighted = Some(id.clone());
                }
                self.toolbox()
            }
            LabAction::SetupGroups(count) => {
                let count = (*count).min(GROUP_TEMPERATURES.len());
                self.groups = GROUP_TEMPERATURES
                    .iter()
                    .take(count)
                    .enumerate()
                    .map(|(index, &temperature)| ExperimentGroup {
                        index,
                        temperature,
                        gas: 0,
                    })
                    .collect();
                self.status = "实验组设置完成".into();
                settle = Duration::from_millis(count as u64 * 300 + 500);
                self.group_view()
            }
            LabAction::ShowPreparation => {
                self.status = "准备就绪".into();
                LabView::Checklist {
                    items: vec![
                        "自变量：温度（10°C、20°C、30°C）".into(),
                        "因变量：二氧化碳气体体积".into(),
                        "控制变量：酵母量、糖量、水量".into(),
                        "实验组数：3组".into(),
                    ],
                }
            }
            LabAction::StartExperiment => {
                self.running = true;
                self.status = "实验进行中...".into();
                settle = Duration::from_millis(2000);
                self.group_view()
            }
            LabAction::FastForward => {
                for group in &mut self.groups {
                    if let Some(gas) = FAST_FORWARD_GAS.get(group.index) {
                        group.gas = *gas;
                    }
                }
                state_update = Some(fast_forward_data());
                self.status = "1小时后...".into();
                settle = Duration::from_millis(2000);
                self.group_view()
            }
            LabAction::ShowResults(index) => match self.groups.get(*index) {
                Some(group) => {
                    self.status = format!("观察第{}组（{}°C）", index + 1, group.temperature);
                    LabView::Results { group: *group }
                }
                None => LabView::Status,
            },
            LabAction::ShowDataTable => {
                self.status = "数据记录完成".into();
                LabView::DataTable {
                    readings: readings(state),
                }
            }
            LabAction::ShowChart => {
                let data = readings(state);
                self.status = "数据可视化完成".into();
                LabView::Chart {
                    labels: data.iter().map(|r| format!("{}°C", r.temperature)).collect(),
                    values: data.iter().map(|r| r.gas).collect(),
                }
            }
            LabAction::ShowPredictionCompare(compare) => {
                self.status = "预测对比完成".into();
                compare.view(state)
            }
            LabAction::ShowFlowChart => {
                self.status = "探究完成！".into();
                LabView::FlowChart {
                    stages: FLOW_STAGES.iter().map(|s| s.to_string()).collect(),
                }
            }
            LabAction::UpdateStatus(text) => {
                self.status = text.clone();
                LabView::Status
            }
        };

        LabOutcome {
            view,
            status: self.status.clone(),
            settle,
            state_update,
        }
    }

    fn toolbox(&self) -> LabView {
        LabView::Toolbox {
            tools: self.tools.clone(),
            highlighted: self.highlighted.clone(),
        }
    }

    fn group_view(&self) -> LabView {
        LabView::Groups {
            groups: self.groups.clone(),
            running: self.running,
        }
    }
}

/// The `experimentData` update published by the fast-forward.
fn fast_forward_data() -> Map<String, Value> {
    let groups: Map<String, Value> = GROUP_TEMPERATURES
        .iter()
        .zip(FAST_FORWARD_GAS)
        .enumerate()
        .map(|(i, (temp, gas))| (format!("group{}", i + 1), json!({ "temp": temp, "gas": gas })))
        .collect();
    let mut update = Map::new();
    update.insert(EXPERIMENT_DATA_KEY.to_string(), Value::Object(groups));
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course;

    #[test]
    fn parses_known_actions() {
        let add = LabAction::parse(
            "add_tool",
            &json!({"tool": {"id": "heater", "icon": "🌡️", "name": "温度控制器"}}),
        )
        .unwrap();
        assert_eq!(add, LabAction::AddTool(Tool::new("heater", "🌡️", "温度控制器")));
        assert_eq!(
            LabAction::parse("show_results", &json!({"groupIndex": 2})).unwrap(),
            LabAction::ShowResults(2)
        );
        assert_eq!(
            LabAction::parse("fast_forward", &Value::Null).unwrap(),
            LabAction::FastForward
        );
    }

    #[test]
    fn rejects_unknown_or_malformed_actions() {
        assert!(matches!(
            LabAction::parse("explode", &Value::Null),
            Err(LabError::UnknownAction(name)) if name == "explode"
        ));
        assert!(matches!(
            LabAction::parse("setup_groups", &json!({"count": "three"})),
            Err(LabError::InvalidParams { .. })
        ));
    }

    #[test]
    fn experiment_runs_through_fast_forward() {
        let mut state = course::initial_state();
        let mut bench = LabBench::new();

        let setup = bench.apply(&LabAction::SetupGroups(3), &state);
        assert_eq!(setup.settle, Duration::from_millis(1400));
        assert_eq!(bench.groups().len(), 3);

        let outcome = bench.apply(&LabAction::FastForward, &state);
        assert_eq!(outcome.status, "1小时后...");
        let update = outcome.state_update.expect("fast forward publishes data");
        state.bulk_update(update);

        let gas: Vec<i64> = bench.groups().iter().map(|g| g.gas).collect();
        assert_eq!(gas, vec![20, 40, 60]);

        match bench.apply(&LabAction::ShowDataTable, &state).view {
            LabView::DataTable { readings } => {
                let values: Vec<i64> = readings.iter().map(|r| r.gas).collect();
                assert_eq!(values, vec![20, 40, 60]);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn group_count_is_capped_and_results_out_of_range_are_ignored() {
        let state = course::initial_state();
        let mut bench = LabBench::new();
        bench.apply(&LabAction::SetupGroups(9), &state);
        assert_eq!(bench.groups().len(), 3);

        let before = bench.status().to_string();
        let outcome = bench.apply(&LabAction::ShowResults(7), &state);
        assert_eq!(outcome.view, LabView::Status);
        assert_eq!(outcome.status, before);
    }

    fn compare() -> LabAction {
        LabAction::parse(
            "show_prediction_compare",
            &json!({
                "phrases": {"warm": "Warm dough rises", "cold": "Cold dough rises"},
                "actual": "warm",
                "stateKey": "guess",
                "unrecorded": "no guess",
            }),
        )
        .unwrap()
    }

    #[test]
    fn prediction_compare_reads_the_configured_key() {
        let mut state = LearnerState::new(Map::new());
        let mut bench = LabBench::new();
        assert_eq!(
            bench.apply(&compare(), &state).view,
            LabView::PredictionCompare {
                predicted: "no guess".into(),
                actual: "Warm dough rises".into(),
                matched: false,
            }
        );

        state.set("guess", "warm");
        let outcome = bench.apply(&compare(), &state);
        assert_eq!(outcome.status, "预测对比完成");
        assert_eq!(
            outcome.view,
            LabView::PredictionCompare {
                predicted: "Warm dough rises".into(),
                actual: "Warm dough rises".into(),
                matched: true,
            }
        );
    }

    #[test]
    fn prediction_compare_needs_phrases() {
        assert!(matches!(
            LabAction::parse("show_prediction_compare", &Value::Null),
            Err(LabError::InvalidParams { .. })
        ));
    }

    #[test]
    fn reset_clears_bench() {
        let state = course::initial_state();
        let mut bench = LabBench::new();
        bench.apply(&LabAction::AddTool(Tool::new("a", "a", "a")), &state);
        bench.reset();
        assert!(bench.tools().is_empty());
        assert_eq!(bench.status(), "准备中...");
    }
}
