use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Recorded action logs arrive in two shapes: the current envelope carrying
/// actions, screenshots and recorder metadata, and the legacy bare array of
/// actions from older extension builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ActionLog {
    Envelope(ActionEnvelope),
    Legacy(Vec<Value>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ActionEnvelope {
    #[serde(default)]
    pub(crate) actions: Vec<Value>,
    #[serde(default)]
    pub(crate) screenshots: Vec<Value>,
    #[serde(default = "default_metadata")]
    pub(crate) metadata: Value,
}

fn default_metadata() -> Value {
    json!({})
}

impl ActionLog {
    pub(crate) fn into_envelope(self) -> ActionEnvelope {
        match self {
            Self::Envelope(envelope) => envelope,
            Self::Legacy(actions) => {
                ActionEnvelope { actions, screenshots: Vec::new(), metadata: json!({}) }
            }
        }
    }
}

/// Normalizes a stored `actions_json` value into the envelope form. Null and
/// unrecognized shapes collapse to an empty envelope.
pub(crate) fn normalize(value: &Value) -> ActionEnvelope {
    if value.is_null() {
        return ActionEnvelope { metadata: json!({}), ..ActionEnvelope::default() };
    }

    match serde_json::from_value::<ActionLog>(value.clone()) {
        Ok(log) => log.into_envelope(),
        Err(_) => ActionEnvelope { metadata: json!({}), ..ActionEnvelope::default() },
    }
}

/// Condenses raw recorder actions into compact per-step summaries. The raw
/// entries carry DOM details and screenshots that would blow the prompt
/// budget; only the fields a reviewer needs survive.
pub(crate) fn summarize(actions: &[Value]) -> Vec<Value> {
    actions.iter().enumerate().map(|(index, action)| summarize_one(index, action)).collect()
}

fn summarize_one(index: usize, action: &Value) -> Value {
    let kind = action.get("type").and_then(Value::as_str).unwrap_or("unknown");
    let at_ms = action.get("t").and_then(Value::as_f64).unwrap_or(0.0);

    let mut summary = json!({
        "step": index + 1,
        "type": kind,
        "time": format!("{}s", (at_ms / 1000.0).round() as i64),
    });

    match kind {
        "click" => {
            summary["what"] = first_text(action, &["text", "element"], "élément");
            copy_field(action, &mut summary, "context", "where");
            copy_field(action, &mut summary, "role", "role");
        }
        "input" => {
            summary["field"] = first_text(action, &["label", "element"], "champ");
            if let Some(value) = action.get("value") {
                summary["value"] = value.clone();
            }
            copy_field(action, &mut summary, "context", "where");
        }
        "drag" => {
            summary["what"] = first_text(action, &["text", "element"], "élément");
            summary["from"] = Value::String(format!(
                "({}, {})",
                coordinate(action, "x1"),
                coordinate(action, "y1")
            ));
            summary["to"] = Value::String(format!(
                "({}, {})",
                coordinate(action, "x2"),
                coordinate(action, "y2")
            ));
        }
        "navigate" => copy_field(action, &mut summary, "url", "url"),
        "keypress" => copy_field(action, &mut summary, "key", "key"),
        _ => {}
    }

    summary
}

fn first_text(action: &Value, keys: &[&str], fallback: &str) -> Value {
    for key in keys {
        if let Some(text) = action.get(*key).and_then(Value::as_str) {
            if !text.is_empty() {
                return Value::String(text.to_string());
            }
        }
    }
    Value::String(fallback.to_string())
}

fn copy_field(action: &Value, summary: &mut Value, source: &str, target: &str) {
    if let Some(value) = action.get(source) {
        if !value.is_null() {
            summary[target] = value.clone();
        }
    }
}

fn coordinate(action: &Value, key: &str) -> i64 {
    action.get(key).and_then(Value::as_f64).unwrap_or(0.0).round() as i64
}
