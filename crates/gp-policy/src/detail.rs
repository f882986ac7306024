// detail.rs — Presentation-ready description of one policy.
//
// Merges a policy's definition, its presentation (labels, defaults) and its
// current state into a serializable record for display or an API layer.

use std::collections::BTreeMap;

use gp_admx::{Catalog, Policy, PolicyElement, PresentationElement, Section};
use serde::Serialize;
use serde_json::{json, Value};

use crate::options::{OptionValue, OptionValues};
use crate::state::PolicyState;

#[derive(Debug, Clone, Serialize)]
pub struct EnumOptionDetail {
    pub index: usize,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementDetail {
    pub id: String,
    pub kind: &'static str,
    /// Presentation label, or the element id when there is none.
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Current value when the policy is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<EnumOptionDetail>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub section: Section,
    pub state: PolicyState,
    pub category: Option<String>,
    pub supported_on: Option<String>,
    pub registry_key: String,
    pub value_name: Option<String>,
    pub elements: Vec<ElementDetail>,
}

/// Build the detail record for `policy` in `state` with current `options`.
pub fn build_detail(
    catalog: &Catalog,
    policy: &Policy,
    state: PolicyState,
    options: &OptionValues,
) -> PolicyDetail {
    let elements = policy
        .definition
        .elements
        .iter()
        .map(|element| element_detail(catalog, policy, element, options))
        .collect();
    PolicyDetail {
        id: policy.id.clone(),
        name: policy.display_name.clone(),
        description: policy.explanation.clone(),
        section: policy.section(),
        state,
        category: policy.category.map(|c| catalog.category_at(c).id.clone()),
        supported_on: policy
            .supported_on
            .map(|s| catalog.support_at(s).display_name.clone()),
        registry_key: policy.definition.key.clone(),
        value_name: policy.definition.value_name.clone(),
        elements,
    }
}

fn element_detail(
    catalog: &Catalog,
    policy: &Policy,
    element: &PolicyElement,
    options: &OptionValues,
) -> ElementDetail {
    let mut detail = ElementDetail {
        id: element.id().to_string(),
        kind: element.kind_name(),
        label: element.id().to_string(),
        required: false,
        default_value: None,
        value: options.get(element.id()).cloned(),
        min_value: None,
        max_value: None,
        max_length: None,
        options: Vec::new(),
        metadata: BTreeMap::new(),
    };

    if let Some(control) = policy
        .presentation
        .as_ref()
        .and_then(|p| p.control_for(element.id()))
    {
        detail.label = control.label().to_string();
        detail.default_value = match control {
            PresentationElement::DecimalTextBox {
                default_value,
                spin,
                spin_step,
                ..
            } => {
                detail.metadata.insert("spin".into(), json!(spin));
                detail.metadata.insert("spin_step".into(), json!(spin_step));
                Some(json!(default_value))
            }
            PresentationElement::TextBox { default_value, .. } => {
                default_value.as_ref().map(|v| json!(v))
            }
            PresentationElement::CheckBox {
                default_checked, ..
            } => Some(json!(default_checked)),
            PresentationElement::ComboBox {
                default_text,
                suggestions,
                ..
            } => {
                if !suggestions.is_empty() {
                    detail
                        .metadata
                        .insert("suggestions".into(), json!(suggestions));
                }
                default_text.as_ref().map(|v| json!(v))
            }
            PresentationElement::DropdownList { default_item, .. } => {
                default_item.map(|i| json!(i))
            }
            _ => None,
        };
    }

    match element {
        PolicyElement::Decimal(d) => {
            detail.required = d.required;
            if d.minimum > 0 || d.maximum < u32::MAX {
                detail.min_value = Some(d.minimum);
            }
            if d.maximum < u32::MAX {
                detail.max_value = Some(d.maximum);
            }
            detail
                .metadata
                .insert("store_as_text".into(), json!(d.store_as_text));
        }
        PolicyElement::Boolean(b) => {
            detail
                .metadata
                .insert("has_affected_values".into(), json!(!b.affected.is_empty()));
        }
        PolicyElement::Text(t) => {
            detail.required = t.required;
            detail.max_length = Some(t.max_length);
            detail
                .metadata
                .insert("expandable".into(), json!(t.expandable));
        }
        PolicyElement::List(l) => {
            detail
                .metadata
                .insert("has_prefix".into(), json!(l.has_prefix()));
            detail
                .metadata
                .insert("user_provides_names".into(), json!(l.user_provides_names));
            detail
                .metadata
                .insert("additive".into(), json!(!l.purge_others));
        }
        PolicyElement::Enum(e) => {
            detail.required = e.required;
            detail.options = e
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| EnumOptionDetail {
                    index,
                    display_name: catalog.resolve_string(policy.source, &item.display_code),
                })
                .collect();
        }
        PolicyElement::MultiText(_) => {
            detail.metadata.insert("multiline".into(), json!(true));
        }
    }
    detail
}
