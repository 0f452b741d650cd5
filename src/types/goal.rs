//! Dialogue goals and the two dataset loaders.

use crate::error::{AgentError, Result};
use crate::schemas::{read_document, SgdCatalog};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const USER_NAME: &str = "User";
pub const AGENT_NAME: &str = "AI Assistant";

/// Domains that carry a bookable or queryable goal
const MULTIWOZ_DOMAINS: [&str; 5] = ["restaurant", "hotel", "attraction", "train", "taxi"];
const UNSUPPORTED_DOMAINS: [&str; 2] = ["police", "hospital"];

static TASK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Task \d{5}: (.*)").expect("valid regex"));
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+").expect("valid regex"));
static SPAN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<span\b[^>]*>(.*?)</span>").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFamily {
    Multiwoz,
    Sgd,
}

impl fmt::Display for DatasetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetFamily::Multiwoz => write!(f, "multiwoz"),
            DatasetFamily::Sgd => write!(f, "sgd"),
        }
    }
}

/// One utterance of the recorded dialogue the simulated user imitates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceUtterance {
    pub speaker: String,
    pub text: String,
}

/// What the simulated user sets out to achieve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueGoal {
    pub id: String,
    pub family: DatasetFamily,
    pub services: Vec<String>,
    pub goal_text: String,
    pub first_utterance: String,
    pub reference: Vec<ReferenceUtterance>,
}

impl DialogueGoal {
    /// The reference dialogue as `Speaker: text` lines
    pub fn reference_text(&self) -> String {
        self.reference
            .iter()
            .map(|utterance| format!("{}: {}", utterance.speaker, utterance.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// MultiWOZ

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GoalMessage {
    Text(String),
    Lines(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiwozGoal {
    pub message: GoalMessage,
    #[serde(flatten)]
    pub domains: BTreeMap<String, Value>,
}

impl MultiwozGoal {
    /// Domains with a non-empty goal, in document order of `names`
    fn active<'a>(&self, names: &[&'a str]) -> Vec<&'a str> {
        names
            .iter()
            .copied()
            .filter(|name| {
                self.domains
                    .get(*name)
                    .and_then(Value::as_object)
                    .map(|goal| !goal.is_empty())
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiwozTurn {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiwozDialogue {
    pub goal: MultiwozGoal,
    pub log: Vec<MultiwozTurn>,
}

/// Load a MultiWOZ `data.json` file keyed by dialogue id
pub fn load_multiwoz(path: impl AsRef<Path>) -> Result<BTreeMap<String, MultiwozDialogue>> {
    read_document(path)
}

/// Render the goal message as one sentence per line
pub fn multiwoz_goal_text(message: &GoalMessage) -> String {
    let sentences: Vec<String> = match message {
        GoalMessage::Text(text) => {
            let body = TASK_HEADER
                .captures(text)
                .and_then(|captures| captures.get(1))
                .map(|body| body.as_str())
                .unwrap_or(text.as_str());
            SENTENCE_BREAK
                .split(body)
                .map(str::to_string)
                .collect()
        }
        GoalMessage::Lines(lines) => lines.clone(),
    };

    let text = sentences
        .into_iter()
        .map(|sentence| sentence.trim().to_string())
        .filter(|sentence| !sentence.is_empty())
        .map(|sentence| {
            if sentence.ends_with('.') {
                sentence
            } else {
                format!("{}.", sentence)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    SPAN_TAG.replace_all(&text, "$1").into_owned()
}

impl DialogueGoal {
    pub fn from_multiwoz(id: &str, dialogue: &MultiwozDialogue) -> Result<Self> {
        let unsupported = dialogue.goal.active(&UNSUPPORTED_DOMAINS);
        if !unsupported.is_empty() {
            return Err(AgentError::Config(format!(
                "dialogue {} involves unsupported domains: {}",
                id,
                unsupported.join(", ")
            )));
        }

        let first_utterance = dialogue
            .log
            .first()
            .map(|turn| turn.text.trim().to_string())
            .ok_or_else(|| AgentError::Config(format!("dialogue {} has an empty log", id)))?;

        let reference = dialogue
            .log
            .iter()
            .enumerate()
            .map(|(index, turn)| ReferenceUtterance {
                speaker: if index % 2 == 0 { USER_NAME } else { AGENT_NAME }.to_string(),
                text: turn.text.trim().to_string(),
            })
            .collect();

        Ok(Self {
            id: id.to_string(),
            family: DatasetFamily::Multiwoz,
            services: dialogue
                .goal
                .active(&MULTIWOZ_DOMAINS)
                .into_iter()
                .map(str::to_string)
                .collect(),
            goal_text: multiwoz_goal_text(&dialogue.goal.message),
            first_utterance,
            reference,
        })
    }
}

/// Look up a dialogue by id, accepting the id with or without `.json`
pub fn find_multiwoz_goal(
    dialogues: &BTreeMap<String, MultiwozDialogue>,
    id: &str,
) -> Result<DialogueGoal> {
    let key = if id.ends_with(".json") {
        id.to_string()
    } else {
        format!("{}.json", id)
    };
    let (key, dialogue) = dialogues
        .get_key_value(&key)
        .or_else(|| dialogues.get_key_value(id))
        .ok_or_else(|| AgentError::Config(format!("dialogue {} not found", id)))?;
    DialogueGoal::from_multiwoz(key, dialogue)
}

// SGD

#[derive(Debug, Clone, Deserialize)]
pub struct SgdAction {
    pub act: String,
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub canonical_values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SgdState {
    pub active_intent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SgdFrame {
    pub service: String,
    #[serde(default)]
    pub actions: Vec<SgdAction>,
    #[serde(default)]
    pub state: Option<SgdState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SgdTurn {
    pub speaker: String,
    pub utterance: String,
    #[serde(default)]
    pub frames: Vec<SgdFrame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SgdDialogue {
    pub dialogue_id: String,
    pub services: Vec<String>,
    pub turns: Vec<SgdTurn>,
}

/// Load dialogues from one or more SGD dialogue files
pub fn load_sgd_dialogues<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SgdDialogue>> {
    let mut dialogues = Vec::new();
    for path in paths {
        let loaded: Vec<SgdDialogue> = read_document(path)?;
        dialogues.extend(loaded);
    }
    Ok(dialogues)
}

#[derive(Debug, Default)]
struct IntentGoal {
    inform: Vec<(String, String, String)>,
    request: Vec<String>,
}

impl IntentGoal {
    fn is_empty(&self) -> bool {
        self.inform.is_empty() && self.request.is_empty()
    }
}

/// First character lowercased, the rest kept
fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Collect INFORM and REQUEST acts of the user, grouped by service and
/// active intent in order of first mention
fn extract_user_goals(dialogue: &SgdDialogue) -> Vec<(String, String, IntentGoal)> {
    let mut goals: Vec<(String, String, IntentGoal)> = Vec::new();

    for turn in dialogue.turns.iter().filter(|turn| turn.speaker == "USER") {
        for frame in &turn.frames {
            let Some(state) = &frame.state else {
                continue;
            };
            let position = match goals.iter().position(|(service, intent, _)| {
                *service == frame.service && *intent == state.active_intent
            }) {
                Some(position) => position,
                None => {
                    goals.push((
                        frame.service.clone(),
                        state.active_intent.clone(),
                        IntentGoal::default(),
                    ));
                    goals.len() - 1
                }
            };
            let goal = &mut goals[position].2;

            for action in &frame.actions {
                match action.act.as_str() {
                    "INFORM" => {
                        let value = action.values.first().cloned().unwrap_or_default();
                        let canonical = action
                            .canonical_values
                            .first()
                            .cloned()
                            .unwrap_or_else(|| value.clone());
                        match goal.inform.iter_mut().find(|(slot, _, _)| *slot == action.slot) {
                            Some(entry) => *entry = (action.slot.clone(), value, canonical),
                            None => goal.inform.push((action.slot.clone(), value, canonical)),
                        }
                    }
                    "REQUEST" => {
                        if !goal.request.contains(&action.slot) {
                            goal.request.push(action.slot.clone());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    goals.retain(|(_, _, goal)| !goal.is_empty());
    goals
}

/// Compose the numbered goal text from the user's acts
pub fn sgd_goal_text(dialogue: &SgdDialogue, catalog: &SgdCatalog) -> Result<String> {
    let mut lines = Vec::new();
    let mut goal_index = 0;

    for (service_name, intent_name, goal) in extract_user_goals(dialogue) {
        let service = catalog.service(&service_name)?;
        let Some(intent) = service.intent(&intent_name) else {
            debug!(
                target: "tod_bench::goals",
                service = %service_name,
                intent = %intent_name,
                "skipping acts outside a declared intent"
            );
            continue;
        };
        let slot_description = |slot: &str| -> Result<String> {
            service
                .slot(slot)
                .map(|spec| lower_first(&spec.description))
                .ok_or_else(|| {
                    AgentError::Config(format!(
                        "service {} does not declare slot {}",
                        service_name, slot
                    ))
                })
        };

        goal_index += 1;
        lines.push(format!("\nGoal {}:", goal_index));
        lines.push(format!("You want to {}.", lower_first(&intent.description)));

        let mut inform = Vec::new();
        for (slot, value, canonical) in &goal.inform {
            let mut text = format!("the {} is {}", slot_description(slot)?, value);
            if canonical != value {
                text.push_str(&format!(" ({})", canonical));
            }
            inform.push(text);
        }
        if !inform.is_empty() {
            lines.push(format!(
                "You will inform the AI Assistant that: {}.",
                inform.join(", ")
            ));
        }

        let request = goal
            .request
            .iter()
            .map(|slot| slot_description(slot).map(|description| format!("the {}", description)))
            .collect::<Result<Vec<_>>>()?;
        if !request.is_empty() {
            lines.push(format!(
                "You ask the AI Assistant to know: {}.",
                request.join(", ")
            ));
        }
    }

    Ok(lines.join("\n").trim().to_string())
}

impl DialogueGoal {
    pub fn from_sgd(dialogue: &SgdDialogue, catalog: &SgdCatalog) -> Result<Self> {
        let first_utterance = dialogue
            .turns
            .iter()
            .find(|turn| turn.speaker == "USER")
            .map(|turn| turn.utterance.trim().to_string())
            .ok_or_else(|| {
                AgentError::Config(format!(
                    "dialogue {} has no user turn",
                    dialogue.dialogue_id
                ))
            })?;

        let reference = dialogue
            .turns
            .iter()
            .map(|turn| ReferenceUtterance {
                speaker: if turn.speaker == "USER" {
                    USER_NAME
                } else {
                    AGENT_NAME
                }
                .to_string(),
                text: turn.utterance.trim().to_string(),
            })
            .collect();

        Ok(Self {
            id: dialogue.dialogue_id.clone(),
            family: DatasetFamily::Sgd,
            services: dialogue.services.clone(),
            goal_text: sgd_goal_text(dialogue, catalog)?,
            first_utterance,
            reference,
        })
    }
}

pub fn find_sgd_goal(
    dialogues: &[SgdDialogue],
    id: &str,
    catalog: &SgdCatalog,
) -> Result<DialogueGoal> {
    let dialogue = dialogues
        .iter()
        .find(|dialogue| dialogue.dialogue_id == id)
        .ok_or_else(|| AgentError::Config(format!("dialogue {} not found", id)))?;
    DialogueGoal::from_sgd(dialogue, catalog)
}
