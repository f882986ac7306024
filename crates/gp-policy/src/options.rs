// options.rs — Element option values and their JSON form.
//
// Each element of an enabled policy carries one option value whose shape is
// fixed by the element kind. `OptionValues` maps element ids to values and is
// both the input of a mutation and the read-back output of inference.
//
// JSON form (used by the CLI and any API layer): decimal → number, boolean →
// bool, text → string, list → array of strings (or an object of strings when
// the list takes user-provided names), enum → item index, multiText → array
// of strings.

use std::collections::BTreeMap;

use gp_admx::{AdmxPolicy, PolicyElement};
use serde::Serialize;
use serde_json::Value;

use crate::error::OptionError;

/// The value of one policy element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Decimal(u32),
    Boolean(bool),
    Text(String),
    /// Ordered list items.
    List(Vec<String>),
    /// List items keyed by user-provided value names.
    Dictionary(BTreeMap<String, String>),
    /// Index into the enum's items.
    Enum(usize),
    MultiText(Vec<String>),
}

impl OptionValue {
    /// Short name of the value's shape, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            OptionValue::Decimal(_) => "decimal",
            OptionValue::Boolean(_) => "boolean",
            OptionValue::Text(_) => "text",
            OptionValue::List(_) => "list",
            OptionValue::Dictionary(_) => "dictionary",
            OptionValue::Enum(_) => "enum",
            OptionValue::MultiText(_) => "multiText",
        }
    }
}

/// Option values keyed by element id.
pub type OptionValues = BTreeMap<String, OptionValue>;

fn string_array(element: &str, value: &Value) -> Result<Vec<String>, OptionError> {
    let wrong = || OptionError::WrongType {
        element: element.to_string(),
        expected: "an array of strings",
    };
    value
        .as_array()
        .ok_or_else(wrong)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(wrong))
        .collect()
}

/// Convert one JSON value for `element`.
pub fn option_from_json(element: &PolicyElement, value: &Value) -> Result<OptionValue, OptionError> {
    let id = element.id();
    let wrong = |expected: &'static str| OptionError::WrongType {
        element: id.to_string(),
        expected,
    };
    match element {
        PolicyElement::Decimal(_) => {
            let n = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            n.and_then(|n| u32::try_from(n).ok())
                .map(OptionValue::Decimal)
                .ok_or_else(|| wrong("an unsigned 32-bit number"))
        }
        PolicyElement::Boolean(_) => value
            .as_bool()
            .map(OptionValue::Boolean)
            .ok_or_else(|| wrong("true or false")),
        PolicyElement::Text(_) => value
            .as_str()
            .map(|s| OptionValue::Text(s.to_string()))
            .ok_or_else(|| wrong("a string")),
        PolicyElement::List(list) if list.user_provides_names => {
            let map = value.as_object().ok_or_else(|| wrong("an object of strings"))?;
            map.iter()
                .map(|(k, v)| {
                    v.as_str()
                        .map(|s| (k.clone(), s.to_string()))
                        .ok_or_else(|| wrong("an object of strings"))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(OptionValue::Dictionary)
        }
        PolicyElement::List(_) => string_array(id, value).map(OptionValue::List),
        PolicyElement::Enum(_) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(OptionValue::Enum)
            .ok_or_else(|| wrong("an item index")),
        PolicyElement::MultiText(_) => string_array(id, value).map(OptionValue::MultiText),
    }
}

/// Convert a JSON object `{ element_id: value, ... }` for `policy`.
pub fn options_from_json(policy: &AdmxPolicy, json: &Value) -> Result<OptionValues, OptionError> {
    let object = json.as_object().ok_or(OptionError::NotAnObject)?;
    let mut out = OptionValues::new();
    for (id, value) in object {
        let element = policy
            .element(id)
            .ok_or_else(|| OptionError::UnknownElement {
                element: id.clone(),
            })?;
        out.insert(id.clone(), option_from_json(element, value)?);
    }
    Ok(out)
}

/// JSON object form of `options`.
pub fn options_to_json(options: &OptionValues) -> Value {
    serde_json::to_value(options).unwrap_or(Value::Null)
}
