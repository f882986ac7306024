// presentation.rs — ADML presentation layouts.
//
// A presentation describes how a policy's elements are shown: labels, default
// values and control hints. Controls refer to policy elements by `ref_id`.

use roxmltree::Node;
use serde::Serialize;

use crate::error::TemplateError;
use crate::xml;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum PresentationElement {
    /// Free-standing label text.
    Text { text: String },
    DecimalTextBox {
        ref_id: String,
        label: String,
        default_value: u32,
        spin: bool,
        spin_step: u32,
    },
    TextBox {
        ref_id: String,
        label: String,
        default_value: Option<String>,
    },
    CheckBox {
        ref_id: String,
        text: String,
        default_checked: bool,
    },
    ComboBox {
        ref_id: String,
        label: String,
        default_text: Option<String>,
        suggestions: Vec<String>,
        no_sort: bool,
    },
    DropdownList {
        ref_id: String,
        label: String,
        default_item: Option<usize>,
        no_sort: bool,
    },
    ListBox { ref_id: String, label: String },
    MultiTextBox { ref_id: String, label: String },
}

impl PresentationElement {
    /// The policy element this control edits, if any.
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            PresentationElement::Text { .. } => None,
            PresentationElement::DecimalTextBox { ref_id, .. }
            | PresentationElement::TextBox { ref_id, .. }
            | PresentationElement::CheckBox { ref_id, .. }
            | PresentationElement::ComboBox { ref_id, .. }
            | PresentationElement::DropdownList { ref_id, .. }
            | PresentationElement::ListBox { ref_id, .. }
            | PresentationElement::MultiTextBox { ref_id, .. } => Some(ref_id),
        }
    }

    /// The user-facing label of the control.
    pub fn label(&self) -> &str {
        match self {
            PresentationElement::Text { text } | PresentationElement::CheckBox { text, .. } => text,
            PresentationElement::DecimalTextBox { label, .. }
            | PresentationElement::TextBox { label, .. }
            | PresentationElement::ComboBox { label, .. }
            | PresentationElement::DropdownList { label, .. }
            | PresentationElement::ListBox { label, .. }
            | PresentationElement::MultiTextBox { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub id: String,
    pub elements: Vec<PresentationElement>,
}

impl Presentation {
    /// The control bound to a policy element.
    pub fn control_for(&self, element_id: &str) -> Option<&PresentationElement> {
        self.elements
            .iter()
            .find(|e| e.ref_id() == Some(element_id))
    }

    pub(crate) fn parse(node: Node<'_, '_>) -> Result<Self, TemplateError> {
        let mut elements = Vec::new();
        for control in xml::elements(node) {
            if let Some(element) = parse_control(control)? {
                elements.push(element);
            }
        }
        Ok(Presentation {
            id: xml::required_attr(node, "id")?,
            elements,
        })
    }
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    xml::child(node, name).map(xml::text)
}

fn parse_control(node: Node<'_, '_>) -> Result<Option<PresentationElement>, TemplateError> {
    let ref_id = || xml::required_attr(node, "refId");
    let control = match node.tag_name().name() {
        "text" => PresentationElement::Text {
            text: xml::text(node),
        },
        "decimalTextBox" => PresentationElement::DecimalTextBox {
            ref_id: ref_id()?,
            label: xml::text(node),
            default_value: xml::u32_attr(node, "defaultValue", 1)?,
            spin: xml::bool_attr(node, "spin", true)?,
            spin_step: xml::u32_attr(node, "spinStep", 1)?,
        },
        "textBox" => PresentationElement::TextBox {
            ref_id: ref_id()?,
            label: child_text(node, "label").unwrap_or_default(),
            default_value: child_text(node, "defaultValue"),
        },
        "checkBox" => PresentationElement::CheckBox {
            ref_id: ref_id()?,
            text: xml::text(node),
            default_checked: xml::bool_attr(node, "defaultChecked", false)?,
        },
        "comboBox" => PresentationElement::ComboBox {
            ref_id: ref_id()?,
            label: child_text(node, "label").unwrap_or_default(),
            default_text: child_text(node, "default"),
            suggestions: xml::children(node, "suggestion").map(xml::text).collect(),
            no_sort: xml::bool_attr(node, "noSort", false)?,
        },
        "dropdownList" => PresentationElement::DropdownList {
            ref_id: ref_id()?,
            label: xml::text(node),
            default_item: xml::opt_u32_attr(node, "defaultItem")?.map(|i| i as usize),
            no_sort: xml::bool_attr(node, "noSort", false)?,
        },
        "listBox" => PresentationElement::ListBox {
            ref_id: ref_id()?,
            label: xml::text(node),
        },
        "multiTextBox" => PresentationElement::MultiTextBox {
            ref_id: ref_id()?,
            label: xml::text(node),
        },
        _ => return Ok(None),
    };
    Ok(Some(control))
}
