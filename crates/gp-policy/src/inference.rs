// inference.rs — Inferring a policy's state from registry evidence.
//
// The registry does not record "this policy is enabled"; it only holds the
// values the policy wrote. Inference looks for the policy's own on/off
// values, its value lists and its elements' values, and weighs what it finds:
//
// 1. Main value (only when the policy names one): the on value (DWORD 1 when
//    not declared) adds 1 to enabled, the off value (a deletion when not
//    declared) adds 1 to disabled.
// 2. Value lists: each list whose entries all match adds 1 to its side.
// 3. Elements are scored as "present" or "deleted"; a boolean's off-side
//    matches count a tenth. Present elements add to enabled; only when none
//    is present do deleted elements add to disabled.
// 4. `Evidence::decide` turns the scores into a state.
//
// A deletion is only ever evidenced by a marker in the policy file. Plain
// absence of a value is never evidence of anything.

use gp_admx::{AdmxPolicy, BooleanElement, PolicyElement, RegistryValue, ValueList};
use gp_registry::{RegistryStore, TypedValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::options::{OptionValue, OptionValues};
use crate::state::{Evidence, PolicyState};

/// Weight of a boolean element's off-side match.
const OFF_MATCH_WEIGHT: f64 = 0.1;

/// The result of inferring one policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    pub state: PolicyState,
    /// Element values; only filled in for an Enabled policy.
    pub options: OptionValues,
}

/// One check made during inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceStep {
    /// What was examined (e.g. "on_value", "element:Level").
    pub check: String,
    /// What was found (e.g. "matched", "marked deleted").
    pub outcome: String,
    /// Running enabled score after this step.
    pub enabled: f64,
    /// Running disabled score after this step.
    pub disabled: f64,
}

/// Full inference record: the decision plus every step taken to reach it.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceTrace {
    pub state: PolicyState,
    pub evidence: Evidence,
    pub steps: Vec<EvidenceStep>,
    pub options: OptionValues,
}

/// Infer the state and options of `policy` from `source`.
pub fn infer(policy: &AdmxPolicy, source: &dyn RegistryStore) -> Inference {
    let trace = infer_with_trace(policy, source);
    Inference {
        state: trace.state,
        options: trace.options,
    }
}

/// Like [`infer`], but also returns the evidence steps.
pub fn infer_with_trace(policy: &AdmxPolicy, source: &dyn RegistryStore) -> InferenceTrace {
    let mut scorer = Scorer::default();
    score_main(policy, source, &mut scorer);
    score_elements(policy, source, &mut scorer);

    let state = scorer.evidence.decide();
    let options = if state == PolicyState::Enabled {
        read_options(policy, source)
    } else {
        OptionValues::new()
    };
    debug!(
        policy = %policy.id,
        %state,
        enabled = scorer.evidence.enabled,
        disabled = scorer.evidence.disabled,
        "inferred policy state"
    );
    InferenceTrace {
        state,
        evidence: scorer.evidence,
        steps: scorer.steps,
        options,
    }
}

#[derive(Default)]
struct Scorer {
    evidence: Evidence,
    steps: Vec<EvidenceStep>,
}

impl Scorer {
    fn step(&mut self, check: impl Into<String>, outcome: impl Into<String>) {
        self.steps.push(EvidenceStep {
            check: check.into(),
            outcome: outcome.into(),
            enabled: self.evidence.enabled,
            disabled: self.evidence.disabled,
        });
    }
}

/// Whether `source` holds `expected` at `key`/`name`.
pub(crate) fn value_matches(
    source: &dyn RegistryStore,
    key: &str,
    name: &str,
    expected: &RegistryValue,
) -> bool {
    match expected {
        RegistryValue::Delete => source.is_marked_deleted(key, name),
        RegistryValue::Numeric(n) => {
            matches!(source.get(key, name), Ok(Some(TypedValue::U32(v))) if v == *n)
        }
        RegistryValue::Text(s) => match source.get(key, name) {
            Ok(Some(v)) => v.as_str() == Some(s.as_str()),
            _ => false,
        },
    }
}

/// Whether every entry of `list` matches. Entries without a value are
/// skipped; a list with nothing to compare never matches.
pub(crate) fn list_matches(source: &dyn RegistryStore, list: &ValueList, fallback_key: &str) -> bool {
    let mut compared = false;
    for entry in &list.entries {
        let Some(value) = &entry.value else { continue };
        compared = true;
        if !value_matches(source, list.entry_key(entry, fallback_key), &entry.value_name, value) {
            return false;
        }
    }
    compared
}

/// The value a boolean writes when checked: the declared on value, or DWORD 1
/// when neither an on value nor an on list is declared.
pub(crate) fn boolean_on_value(element: &BooleanElement) -> Option<RegistryValue> {
    match (&element.affected.on_value, &element.affected.on_list) {
        (Some(v), _) => Some(v.clone()),
        (None, None) => Some(RegistryValue::Numeric(1)),
        (None, Some(_)) => None,
    }
}

/// The value a boolean writes when unchecked: the declared off value, or a
/// deletion when neither an off value nor an off list is declared.
pub(crate) fn boolean_off_value(element: &BooleanElement) -> Option<RegistryValue> {
    match (&element.affected.off_value, &element.affected.off_list) {
        (Some(v), _) => Some(v.clone()),
        (None, None) => Some(RegistryValue::Delete),
        (None, Some(_)) => None,
    }
}

fn score_main(policy: &AdmxPolicy, source: &dyn RegistryStore, s: &mut Scorer) {
    let key = policy.key.as_str();
    let affected = &policy.affected;

    if let Some(name) = policy.value_name.as_deref() {
        let on = affected.on_value.clone().unwrap_or(RegistryValue::Numeric(1));
        if value_matches(source, key, name, &on) {
            s.evidence.enabled += 1.0;
            s.step("on_value", "matched");
        } else {
            s.step("on_value", "no match");
        }

        let off = affected.off_value.clone().unwrap_or(RegistryValue::Delete);
        if value_matches(source, key, name, &off) {
            s.evidence.disabled += 1.0;
            s.step("off_value", "matched");
        } else {
            s.step("off_value", "no match");
        }
    }

    if let Some(list) = &affected.on_list {
        if list_matches(source, list, key) {
            s.evidence.enabled += 1.0;
            s.step("on_list", "all entries matched");
        } else {
            s.step("on_list", "not matched");
        }
    }
    if let Some(list) = &affected.off_list {
        if list_matches(source, list, key) {
            s.evidence.disabled += 1.0;
            s.step("off_list", "all entries matched");
        } else {
            s.step("off_list", "not matched");
        }
    }
}

fn score_elements(policy: &AdmxPolicy, source: &dyn RegistryStore, s: &mut Scorer) {
    let mut present = 0.0;
    let mut deleted = 0.0;

    for element in &policy.elements {
        let key = element.registry_key(policy);
        let check = format!("element:{}", element.id());
        match element {
            PolicyElement::List(_) => {
                let mut needed = 0.0;
                if source.is_marked_deleted(key, "") {
                    deleted += 1.0;
                    needed = 1.0;
                }
                if !source.value_names(key).is_empty() {
                    deleted -= needed;
                    present += 1.0;
                    s.step(check, "has values");
                } else if needed > 0.0 {
                    s.step(check, "key cleared");
                }
            }
            PolicyElement::Boolean(b) => {
                let name = element.value_name(policy);
                if name.is_some_and(|n| source.is_marked_deleted(key, n)) {
                    deleted += 1.0;
                    s.step(check, "marked deleted");
                    continue;
                }
                let matches_value = |value: Option<RegistryValue>| match (value, name) {
                    (Some(RegistryValue::Delete), _) | (None, _) | (_, None) => false,
                    (Some(v), Some(n)) => value_matches(source, key, n, &v),
                };
                let matches_list = |list: &Option<ValueList>| {
                    list.as_ref().is_some_and(|l| list_matches(source, l, key))
                };
                let mut off_hits = 0.0;
                if matches_value(boolean_off_value(b)) {
                    off_hits += 1.0;
                }
                if matches_list(&b.affected.off_list) {
                    off_hits += 1.0;
                }
                let mut on_hits = 0.0;
                if matches_value(boolean_on_value(b)) {
                    on_hits += 1.0;
                }
                if matches_list(&b.affected.on_list) {
                    on_hits += 1.0;
                }
                deleted += off_hits * OFF_MATCH_WEIGHT;
                present += on_hits;
                s.step(check, format!("on matches {on_hits}, off matches {off_hits}"));
            }
            _ => {
                let Some(name) = element.value_name(policy) else {
                    continue;
                };
                if source.is_marked_deleted(key, name) {
                    deleted += 1.0;
                    s.step(check, "marked deleted");
                } else if source.contains(key, name) {
                    present += 1.0;
                    s.step(check, "present");
                }
            }
        }
    }

    if present > 0.0 {
        s.evidence.enabled += present;
        s.step("elements", format!("{present} present"));
    } else if deleted > 0.0 {
        s.evidence.disabled += deleted;
        s.step("elements", format!("{deleted} deleted"));
    }
}

/// Whether a boolean element reads as checked.
fn boolean_checked(
    source: &dyn RegistryStore,
    element: &BooleanElement,
    key: &str,
    name: Option<&str>,
) -> bool {
    let by_value = match (boolean_on_value(element), name) {
        (Some(v), Some(n)) => Some(value_matches(source, key, n, &v)),
        _ => None,
    };
    let by_list = element
        .affected
        .on_list
        .as_ref()
        .map(|l| list_matches(source, l, key));
    match (by_value, by_list) {
        (Some(v), Some(l)) => v && l,
        (Some(v), None) => v,
        (None, Some(l)) => l,
        (None, None) => name.is_some_and(|n| source.contains(key, n)),
    }
}

fn read_text(source: &dyn RegistryStore, key: &str, name: &str) -> Option<String> {
    match source.get(key, name) {
        Ok(Some(v)) => v.as_str().map(str::to_string),
        _ => None,
    }
}

/// Read every element's current value.
pub fn read_options(policy: &AdmxPolicy, source: &dyn RegistryStore) -> OptionValues {
    let mut out = OptionValues::new();
    for element in &policy.elements {
        let key = element.registry_key(policy);
        let name = element.value_name(policy);
        let value = match element {
            PolicyElement::Decimal(_) => name.and_then(|n| match source.get(key, n) {
                Ok(Some(TypedValue::U32(v))) => Some(OptionValue::Decimal(v)),
                Ok(Some(v)) => v
                    .as_str()
                    .and_then(|s| s.trim().parse::<u32>().ok())
                    .map(OptionValue::Decimal),
                _ => None,
            }),
            PolicyElement::Boolean(b) => {
                Some(OptionValue::Boolean(boolean_checked(source, b, key, name)))
            }
            PolicyElement::Text(_) => {
                name.and_then(|n| read_text(source, key, n)).map(OptionValue::Text)
            }
            PolicyElement::MultiText(_) => name.and_then(|n| match source.get(key, n) {
                Ok(Some(v)) => v.as_multi().map(|m| OptionValue::MultiText(m.to_vec())),
                _ => None,
            }),
            PolicyElement::List(list) if list.user_provides_names => Some(OptionValue::Dictionary(
                source
                    .value_names(key)
                    .into_iter()
                    .filter_map(|n| read_text(source, key, &n).map(|v| (n, v)))
                    .collect(),
            )),
            PolicyElement::List(list) if list.has_prefix() => {
                let prefix = list.value_prefix.as_deref().unwrap_or_default();
                let items = (1..)
                    .map_while(|i| read_text(source, key, &format!("{prefix}{i}")))
                    .collect();
                Some(OptionValue::List(items))
            }
            PolicyElement::List(_) => Some(OptionValue::List(
                source
                    .value_names(key)
                    .into_iter()
                    .map(|n| read_text(source, key, &n).unwrap_or(n))
                    .collect(),
            )),
            PolicyElement::Enum(e) => e
                .items
                .iter()
                .position(|item| match (&item.value, &item.value_list) {
                    (Some(v), _) => name.is_some_and(|n| value_matches(source, key, n, v)),
                    (None, Some(list)) => list_matches(source, list, key),
                    (None, None) => false,
                })
                .map(OptionValue::Enum),
        };
        if let Some(value) = value {
            out.insert(element.id().to_string(), value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gp_admx::{AffectedValues, Section, TextElement, ValueListEntry};
    use gp_registry::{MemoryStore, PolStore};

    const KEY: &str = r"Software\Policies\Acme";

    fn policy(value_name: Option<&str>, affected: AffectedValues, elements: Vec<PolicyElement>) -> AdmxPolicy {
        AdmxPolicy {
            id: "Acme:Test".into(),
            section: Section::Machine,
            category_ref: None,
            display_code: String::new(),
            explain_code: String::new(),
            supported_ref: None,
            presentation_ref: None,
            client_extension: None,
            key: KEY.into(),
            value_name: value_name.map(str::to_string),
            affected,
            elements,
        }
    }

    fn entry(name: &str, value: RegistryValue) -> ValueListEntry {
        ValueListEntry {
            key: None,
            value_name: name.into(),
            value: Some(value),
        }
    }

    #[test]
    fn nothing_written_is_not_configured() {
        let p = policy(Some("On"), AffectedValues::default(), Vec::new());
        assert_eq!(infer(&p, &PolStore::new()).state, PolicyState::NotConfigured);
    }

    #[test]
    fn implicit_main_value() {
        let p = policy(Some("On"), AffectedValues::default(), Vec::new());
        let mut store = PolStore::new();
        store.set(KEY, "On", TypedValue::U32(1)).unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::Enabled);

        store.delete(KEY, "On").unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::Disabled);

        // A different number is not the implicit on value.
        store.set(KEY, "On", TypedValue::U32(2)).unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::NotConfigured);
    }

    #[test]
    fn absence_on_a_live_store_is_not_disabled() {
        let p = policy(Some("On"), AffectedValues::default(), Vec::new());
        let mut live = MemoryStore::new();
        live.set(KEY, "On", TypedValue::U32(1)).unwrap();
        live.delete(KEY, "On").unwrap();
        assert_eq!(infer(&p, &live).state, PolicyState::NotConfigured);
    }

    #[test]
    fn text_values_match_string_kinds_only() {
        let affected = AffectedValues {
            on_value: Some(RegistryValue::Text("yes".into())),
            off_value: Some(RegistryValue::Text("no".into())),
            ..Default::default()
        };
        let p = policy(Some("Mode"), affected, Vec::new());
        let mut store = MemoryStore::new();
        store.set(KEY, "Mode", TypedValue::ExpandString("yes".into())).unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::Enabled);
        store.set(KEY, "Mode", TypedValue::MultiString(vec!["yes".into()])).unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::NotConfigured);
        store.set(KEY, "Mode", TypedValue::String("no".into())).unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::Disabled);
    }

    #[test]
    fn value_lists_count_only_when_every_entry_matches() {
        let affected = AffectedValues {
            on_list: Some(ValueList {
                default_key: None,
                entries: vec![
                    entry("A", RegistryValue::Numeric(1)),
                    entry("B", RegistryValue::Text("x".into())),
                ],
            }),
            ..Default::default()
        };
        let p = policy(None, affected, Vec::new());
        let mut store = MemoryStore::new();
        store.set(KEY, "A", TypedValue::U32(1)).unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::NotConfigured);
        store.set(KEY, "B", TypedValue::String("x".into())).unwrap();
        assert_eq!(infer(&p, &store).state, PolicyState::Enabled);
    }

    #[test]
    fn contradicting_evidence_is_unknown() {
        let affected = AffectedValues {
            off_list: Some(ValueList {
                default_key: None,
                entries: vec![entry("Reason", RegistryValue::Numeric(0))],
            }),
            ..Default::default()
        };
        let p = policy(Some("On"), affected, Vec::new());
        let mut store = PolStore::new();
        store.set(KEY, "On", TypedValue::U32(1)).unwrap();
        store.set(KEY, "Reason", TypedValue::U32(0)).unwrap();

        let trace = infer_with_trace(&p, &store);
        assert_eq!(trace.state, PolicyState::Unknown);
        assert_eq!(trace.evidence, Evidence { enabled: 1.0, disabled: 1.0 });
        assert!(trace.options.is_empty());
        let checks: Vec<&str> = trace.steps.iter().map(|s| s.check.as_str()).collect();
        assert_eq!(checks, vec!["on_value", "off_value", "off_list"]);
    }

    #[test]
    fn present_elements_outweigh_deleted_ones() {
        let text = |id: &str| {
            PolicyElement::Text(TextElement {
                id: id.into(),
                key: None,
                value_name: Some(id.into()),
                client_extension: None,
                required: false,
                max_length: 255,
                expandable: false,
                no_overwrite: false,
            })
        };
        let p = policy(None, AffectedValues::default(), vec![text("A"), text("B")]);
        let mut store = PolStore::new();
        store.delete(KEY, "A").unwrap();
        store.delete(KEY, "B").unwrap();
        assert_eq!(infer_with_trace(&p, &store).evidence.disabled, 2.0);

        store.set(KEY, "B", TypedValue::String("v".into())).unwrap();
        let trace = infer_with_trace(&p, &store);
        assert_eq!(trace.state, PolicyState::Enabled);
        assert_eq!(trace.evidence, Evidence { enabled: 1.0, disabled: 0.0 });
        assert_eq!(trace.options["B"], OptionValue::Text("v".into()));
        assert!(!trace.options.contains_key("A"));
    }
}
