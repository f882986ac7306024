// adml.rs — One ADML localization file: string and presentation tables.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::TemplateError;
use crate::presentation::Presentation;
use crate::xml;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdmlFile {
    pub revision: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub strings: HashMap<String, String>,
    pub presentations: HashMap<String, Presentation>,
}

impl AdmlFile {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let doc = xml::parse(text)?;
        let root = doc.root_element();
        if root.tag_name().name() != "policyDefinitionResources" {
            return Err(TemplateError::Schema(format!(
                "root element is <{}>, expected <policyDefinitionResources>",
                root.tag_name().name()
            )));
        }

        let mut file = AdmlFile {
            revision: xml::attr(root, "revision"),
            display_name: xml::child(root, "displayName").map(xml::text),
            description: xml::child(root, "description").map(xml::text),
            ..Default::default()
        };

        let resources = xml::child(root, "resources")
            .ok_or_else(|| TemplateError::Schema("missing <resources>".to_string()))?;
        if let Some(table) = xml::child(resources, "stringTable") {
            for s in xml::children(table, "string") {
                file.strings.insert(xml::required_attr(s, "id")?, xml::text(s));
            }
        }
        if let Some(table) = xml::child(resources, "presentationTable") {
            for p in xml::children(table, "presentation") {
                let presentation = Presentation::parse(p)?;
                file.presentations.insert(presentation.id.clone(), presentation);
            }
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::PresentationElement;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<policyDefinitionResources xmlns="http://schemas.microsoft.com/GroupPolicy/2006/07/PolicyDefinitions" revision="1.0" schemaVersion="1.0">
  <displayName>Acme</displayName>
  <description>Acme settings</description>
  <resources>
    <stringTable>
      <string id="Telemetry">Send telemetry</string>
      <string id="Telemetry_Help">Controls telemetry.
Second line.</string>
    </stringTable>
    <presentationTable>
      <presentation id="Telemetry">
        <text>Configure the endpoint below.</text>
        <textBox refId="Endpoint"><label>Endpoint:</label><defaultValue>localhost</defaultValue></textBox>
        <decimalTextBox refId="Level" defaultValue="2" spinStep="1">Level</decimalTextBox>
        <listBox refId="Hosts">Hosts</listBox>
        <dropdownList refId="Mode" defaultItem="1" noSort="true">Mode</dropdownList>
        <checkBox refId="Verbose" defaultChecked="true">Verbose logging</checkBox>
        <comboBox refId="Pick"><label>Pick</label><default>a</default><suggestion>a</suggestion><suggestion>b</suggestion></comboBox>
        <multiTextBox refId="Notes">Notes</multiTextBox>
      </presentation>
    </presentationTable>
  </resources>
</policyDefinitionResources>"#;

    #[test]
    fn string_table_keeps_multiline_text() {
        let file = AdmlFile::parse(SAMPLE).unwrap();
        assert_eq!(file.revision.as_deref(), Some("1.0"));
        assert_eq!(file.display_name.as_deref(), Some("Acme"));
        assert_eq!(file.strings["Telemetry"], "Send telemetry");
        assert!(file.strings["Telemetry_Help"].contains("Second line."));
    }

    #[test]
    fn presentation_controls_in_order() {
        let file = AdmlFile::parse(SAMPLE).unwrap();
        let p = &file.presentations["Telemetry"];
        assert_eq!(p.elements.len(), 8);
        assert_eq!(p.elements[0].ref_id(), None);
        assert_eq!(
            p.control_for("Endpoint"),
            Some(&PresentationElement::TextBox {
                ref_id: "Endpoint".into(),
                label: "Endpoint:".into(),
                default_value: Some("localhost".into()),
            })
        );
        match p.control_for("Level").unwrap() {
            PresentationElement::DecimalTextBox { default_value, spin, .. } => {
                assert_eq!(*default_value, 2);
                assert!(*spin);
            }
            other => panic!("unexpected control {other:?}"),
        }
        match p.control_for("Pick").unwrap() {
            PresentationElement::ComboBox { suggestions, default_text, .. } => {
                assert_eq!(suggestions, &vec!["a".to_string(), "b".to_string()]);
                assert_eq!(default_text.as_deref(), Some("a"));
            }
            other => panic!("unexpected control {other:?}"),
        }
        assert_eq!(p.control_for("Verbose").unwrap().label(), "Verbose logging");
    }

    #[test]
    fn missing_resources_is_a_schema_error() {
        let err = AdmlFile::parse("<policyDefinitionResources/>").unwrap_err();
        assert!(matches!(err, TemplateError::Schema(_)));
    }
}
