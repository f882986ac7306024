// admx.rs — Raw records of one ADMX definition file and their parser.
//
// The records here are file-scoped: ids are local to the declaring file and
// references (`parentCategory`, `supportedOn`, ...) are still in their
// `prefix:id` written form. The linker qualifies and resolves them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use serde::Serialize;
use tracing::debug;

use crate::error::TemplateError;
use crate::xml;

/// Which registry hive a policy writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Machine,
    User,
    Both,
}

impl Section {
    pub fn includes(self, scope: Section) -> bool {
        self == Section::Both || self == scope
    }
}

/// A registry write described by the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RegistryValue {
    Delete,
    Numeric(u32),
    Text(String),
}

/// One entry of a value list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueListEntry {
    /// Overrides the list's default key when present.
    pub key: Option<String>,
    pub value_name: String,
    pub value: Option<RegistryValue>,
}

/// A list of registry writes applied together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValueList {
    pub default_key: Option<String>,
    pub entries: Vec<ValueListEntry>,
}

impl ValueList {
    /// The key an entry writes to: entry override, then the list default,
    /// then `fallback` (the owning policy's or element's key).
    pub fn entry_key<'a>(&'a self, entry: &'a ValueListEntry, fallback: &'a str) -> &'a str {
        entry
            .key
            .as_deref()
            .or(self.default_key.as_deref())
            .unwrap_or(fallback)
    }
}

/// The on/off registry writes of a policy or boolean element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AffectedValues {
    pub on_value: Option<RegistryValue>,
    pub on_list: Option<ValueList>,
    pub off_value: Option<RegistryValue>,
    pub off_list: Option<ValueList>,
}

impl AffectedValues {
    pub fn is_empty(&self) -> bool {
        self.on_value.is_none()
            && self.on_list.is_none()
            && self.off_value.is_none()
            && self.off_list.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecimalElement {
    pub id: String,
    pub key: Option<String>,
    pub value_name: Option<String>,
    pub client_extension: Option<String>,
    pub required: bool,
    pub minimum: u32,
    /// Inclusive; `u32::MAX` means unbounded.
    pub maximum: u32,
    pub store_as_text: bool,
    /// "soft": do not overwrite an existing value.
    pub no_overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BooleanElement {
    pub id: String,
    pub key: Option<String>,
    pub value_name: Option<String>,
    pub client_extension: Option<String>,
    pub affected: AffectedValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextElement {
    pub id: String,
    pub key: Option<String>,
    pub value_name: Option<String>,
    pub client_extension: Option<String>,
    pub required: bool,
    pub max_length: u32,
    pub expandable: bool,
    pub no_overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListElement {
    pub id: String,
    pub key: Option<String>,
    /// `valuePrefix`. When present, entries are named `<prefix>1`,
    /// `<prefix>2`, ...; it never falls back to the policy's value name.
    pub value_prefix: Option<String>,
    pub client_extension: Option<String>,
    /// `additive="true"` turns purging of other values off.
    pub purge_others: bool,
    pub expandable: bool,
    /// `explicitValue="true"`: options are a name → data dictionary.
    pub user_provides_names: bool,
}

impl ListElement {
    pub fn has_prefix(&self) -> bool {
        self.value_prefix.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumItem {
    pub display_code: String,
    pub value: Option<RegistryValue>,
    pub value_list: Option<ValueList>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumElement {
    pub id: String,
    pub key: Option<String>,
    pub value_name: Option<String>,
    pub client_extension: Option<String>,
    pub required: bool,
    pub items: Vec<EnumItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiTextElement {
    pub id: String,
    pub key: Option<String>,
    pub value_name: Option<String>,
    pub client_extension: Option<String>,
}

/// A configurable option of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyElement {
    Decimal(DecimalElement),
    Boolean(BooleanElement),
    Text(TextElement),
    List(ListElement),
    Enum(EnumElement),
    MultiText(MultiTextElement),
}

impl PolicyElement {
    pub fn id(&self) -> &str {
        match self {
            PolicyElement::Decimal(e) => &e.id,
            PolicyElement::Boolean(e) => &e.id,
            PolicyElement::Text(e) => &e.id,
            PolicyElement::List(e) => &e.id,
            PolicyElement::Enum(e) => &e.id,
            PolicyElement::MultiText(e) => &e.id,
        }
    }

    /// Schema name of the element kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PolicyElement::Decimal(_) => "decimal",
            PolicyElement::Boolean(_) => "boolean",
            PolicyElement::Text(_) => "text",
            PolicyElement::List(_) => "list",
            PolicyElement::Enum(_) => "enum",
            PolicyElement::MultiText(_) => "multiText",
        }
    }

    fn own_key(&self) -> Option<&str> {
        match self {
            PolicyElement::Decimal(e) => e.key.as_deref(),
            PolicyElement::Boolean(e) => e.key.as_deref(),
            PolicyElement::Text(e) => e.key.as_deref(),
            PolicyElement::List(e) => e.key.as_deref(),
            PolicyElement::Enum(e) => e.key.as_deref(),
            PolicyElement::MultiText(e) => e.key.as_deref(),
        }
    }

    /// Registry key this element writes to.
    pub fn registry_key<'a>(&'a self, policy: &'a AdmxPolicy) -> &'a str {
        self.own_key().unwrap_or(&policy.key)
    }

    /// Value name this element writes to. Lists use their prefix and never
    /// inherit the policy's value name.
    pub fn value_name<'a>(&'a self, policy: &'a AdmxPolicy) -> Option<&'a str> {
        let own = match self {
            PolicyElement::List(e) => return e.value_prefix.as_deref(),
            PolicyElement::Decimal(e) => e.value_name.as_deref(),
            PolicyElement::Boolean(e) => e.value_name.as_deref(),
            PolicyElement::Text(e) => e.value_name.as_deref(),
            PolicyElement::Enum(e) => e.value_name.as_deref(),
            PolicyElement::MultiText(e) => e.value_name.as_deref(),
        };
        own.or(policy.value_name.as_deref())
    }

    pub fn client_extension(&self) -> Option<&str> {
        match self {
            PolicyElement::Decimal(e) => e.client_extension.as_deref(),
            PolicyElement::Boolean(e) => e.client_extension.as_deref(),
            PolicyElement::Text(e) => e.client_extension.as_deref(),
            PolicyElement::List(e) => e.client_extension.as_deref(),
            PolicyElement::Enum(e) => e.client_extension.as_deref(),
            PolicyElement::MultiText(e) => e.client_extension.as_deref(),
        }
    }
}

/// A policy as declared in its file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmxPolicy {
    pub id: String,
    pub section: Section,
    pub category_ref: Option<String>,
    pub display_code: String,
    pub explain_code: String,
    pub supported_ref: Option<String>,
    pub presentation_ref: Option<String>,
    pub client_extension: Option<String>,
    pub key: String,
    pub value_name: Option<String>,
    pub affected: AffectedValues,
    pub elements: Vec<PolicyElement>,
}

impl AdmxPolicy {
    pub fn element(&self, id: &str) -> Option<&PolicyElement> {
        self.elements.iter().find(|e| e.id() == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmxCategory {
    pub id: String,
    pub display_code: String,
    pub explain_code: Option<String>,
    pub parent_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Product,
    MajorRevision,
    MinorRevision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmxProduct {
    pub id: String,
    pub display_code: String,
    pub kind: ProductKind,
    pub version: Option<u32>,
    /// Local id of the enclosing product or major revision.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLogic {
    Blank,
    AllOf,
    AnyOf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmxSupportEntry {
    pub target_ref: String,
    pub is_range: bool,
    pub min_version: Option<u32>,
    pub max_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmxSupportDefinition {
    pub id: String,
    pub display_code: String,
    pub logic: SupportLogic,
    pub entries: Vec<AdmxSupportEntry>,
}

/// Everything one ADMX file declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmxFile {
    pub path: PathBuf,
    pub namespace: String,
    pub prefix: String,
    /// Prefix → namespace, own prefix included.
    pub prefixes: HashMap<String, String>,
    pub superseded_adm: Vec<String>,
    pub min_adml_revision: Option<String>,
    pub categories: Vec<AdmxCategory>,
    pub products: Vec<AdmxProduct>,
    pub support_definitions: Vec<AdmxSupportDefinition>,
    pub policies: Vec<AdmxPolicy>,
}

fn schema(msg: impl Into<String>) -> TemplateError {
    TemplateError::Schema(msg.into())
}

impl AdmxFile {
    /// Parse ADMX text.
    pub fn parse(text: &str, path: &Path) -> Result<Self, TemplateError> {
        let doc = xml::parse(text)?;
        let root = doc.root_element();
        if root.tag_name().name() != "policyDefinitions" {
            return Err(schema(format!(
                "root element is <{}>, expected <policyDefinitions>",
                root.tag_name().name()
            )));
        }

        let namespaces = xml::child(root, "policyNamespaces")
            .ok_or_else(|| schema("missing <policyNamespaces>"))?;
        let target =
            xml::child(namespaces, "target").ok_or_else(|| schema("missing namespace <target>"))?;
        let prefix = xml::required_attr(target, "prefix")?;
        let namespace = xml::required_attr(target, "namespace")?;
        let mut prefixes = HashMap::new();
        for using in xml::children(namespaces, "using") {
            prefixes.insert(
                xml::required_attr(using, "prefix")?,
                xml::required_attr(using, "namespace")?,
            );
        }
        prefixes.insert(prefix.clone(), namespace.clone());

        let superseded_adm = xml::children(root, "supersededAdm")
            .filter_map(|n| xml::attr(n, "fileName"))
            .collect();
        let min_adml_revision =
            xml::child(root, "resources").and_then(|n| xml::attr(n, "minRequiredRevision"));

        let mut file = AdmxFile {
            path: path.to_path_buf(),
            namespace,
            prefix,
            prefixes,
            superseded_adm,
            min_adml_revision,
            categories: Vec::new(),
            products: Vec::new(),
            support_definitions: Vec::new(),
            policies: Vec::new(),
        };

        if let Some(supported_on) = xml::child(root, "supportedOn") {
            if let Some(products) = xml::child(supported_on, "products") {
                for product in xml::children(products, "product") {
                    parse_product(product, &mut file.products)?;
                }
            }
            if let Some(defs) = xml::child(supported_on, "definitions") {
                for def in xml::children(defs, "definition") {
                    file.support_definitions.push(parse_support(def)?);
                }
            }
        }

        if let Some(categories) = xml::child(root, "categories") {
            for cat in xml::children(categories, "category") {
                file.categories.push(AdmxCategory {
                    id: xml::required_attr(cat, "name")?,
                    display_code: xml::required_attr(cat, "displayName")?,
                    explain_code: xml::attr(cat, "explainText"),
                    parent_ref: xml::child(cat, "parentCategory")
                        .map(|p| xml::required_attr(p, "ref"))
                        .transpose()?,
                });
            }
        }

        if let Some(policies) = xml::child(root, "policies") {
            for pol in xml::children(policies, "policy") {
                file.policies.push(parse_policy(pol)?);
            }
        }

        Ok(file)
    }
}

fn parse_product(node: Node<'_, '_>, out: &mut Vec<AdmxProduct>) -> Result<(), TemplateError> {
    let id = xml::required_attr(node, "name")?;
    out.push(AdmxProduct {
        id: id.clone(),
        display_code: xml::required_attr(node, "displayName")?,
        kind: ProductKind::Product,
        version: None,
        parent: None,
    });
    for major in xml::children(node, "majorVersion") {
        let major_id = xml::required_attr(major, "name")?;
        out.push(AdmxProduct {
            id: major_id.clone(),
            display_code: xml::required_attr(major, "displayName")?,
            kind: ProductKind::MajorRevision,
            version: xml::opt_u32_attr(major, "versionIndex")?,
            parent: Some(id.clone()),
        });
        for minor in xml::children(major, "minorVersion") {
            out.push(AdmxProduct {
                id: xml::required_attr(minor, "name")?,
                display_code: xml::required_attr(minor, "displayName")?,
                kind: ProductKind::MinorRevision,
                version: xml::opt_u32_attr(minor, "versionIndex")?,
                parent: Some(major_id.clone()),
            });
        }
    }
    Ok(())
}

fn parse_support(node: Node<'_, '_>) -> Result<AdmxSupportDefinition, TemplateError> {
    let (logic, block) = if let Some(or) = xml::child(node, "or") {
        (SupportLogic::AnyOf, Some(or))
    } else if let Some(and) = xml::child(node, "and") {
        (SupportLogic::AllOf, Some(and))
    } else {
        (SupportLogic::Blank, None)
    };

    let mut entries = Vec::new();
    if let Some(block) = block {
        for item in xml::elements(block) {
            match item.tag_name().name() {
                "reference" => entries.push(AdmxSupportEntry {
                    target_ref: xml::required_attr(item, "ref")?,
                    is_range: false,
                    min_version: None,
                    max_version: None,
                }),
                "range" => entries.push(AdmxSupportEntry {
                    target_ref: xml::required_attr(item, "ref")?,
                    is_range: true,
                    min_version: xml::opt_u32_attr(item, "minVersionIndex")?,
                    max_version: xml::opt_u32_attr(item, "maxVersionIndex")?,
                }),
                _ => {}
            }
        }
    }

    Ok(AdmxSupportDefinition {
        id: xml::required_attr(node, "name")?,
        display_code: xml::required_attr(node, "displayName")?,
        logic,
        entries,
    })
}

fn parse_policy(node: Node<'_, '_>) -> Result<AdmxPolicy, TemplateError> {
    let section = match xml::attr(node, "class").map(|c| c.to_ascii_lowercase()) {
        Some(c) if c == "machine" => Section::Machine,
        Some(c) if c == "user" => Section::User,
        _ => Section::Both,
    };

    let mut affected = AffectedValues::default();
    if let Some(v) = xml::child(node, "enabledValue") {
        affected.on_value = parse_value(v)?;
    }
    if let Some(v) = xml::child(node, "disabledValue") {
        affected.off_value = parse_value(v)?;
    }
    if let Some(l) = xml::child(node, "enabledList") {
        affected.on_list = Some(parse_value_list(l)?);
    }
    if let Some(l) = xml::child(node, "disabledList") {
        affected.off_list = Some(parse_value_list(l)?);
    }

    let mut elements = Vec::new();
    if let Some(block) = xml::child(node, "elements") {
        for e in xml::elements(block) {
            if let Some(element) = parse_element(e)? {
                elements.push(element);
            }
        }
    }

    Ok(AdmxPolicy {
        id: xml::required_attr(node, "name")?,
        section,
        category_ref: xml::child(node, "parentCategory")
            .map(|p| xml::required_attr(p, "ref"))
            .transpose()?,
        display_code: xml::required_attr(node, "displayName")?,
        explain_code: xml::attr(node, "explainText").unwrap_or_default(),
        supported_ref: xml::child(node, "supportedOn")
            .map(|p| xml::required_attr(p, "ref"))
            .transpose()?,
        presentation_ref: xml::attr(node, "presentation"),
        client_extension: xml::attr(node, "clientExtension"),
        key: xml::required_attr(node, "key")?,
        value_name: xml::attr(node, "valueName"),
        affected,
        elements,
    })
}

/// `<value>`-shaped node: one of `<decimal value=..>`, `<string>..</string>`,
/// `<delete/>`. An empty node carries no value.
fn parse_value(node: Node<'_, '_>) -> Result<Option<RegistryValue>, TemplateError> {
    let Some(inner) = xml::elements(node).next() else {
        return Ok(None);
    };
    match inner.tag_name().name() {
        "delete" => Ok(Some(RegistryValue::Delete)),
        "decimal" => {
            let raw = xml::required_attr(inner, "value")?;
            let n = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| schema(format!("decimal value '{raw}' is not an unsigned 32-bit number")))?;
            Ok(Some(RegistryValue::Numeric(n)))
        }
        "string" => Ok(Some(RegistryValue::Text(xml::text(inner)))),
        "longDecimal" => Err(schema("longDecimal values are not supported")),
        other => Err(schema(format!("unexpected value element <{other}>"))),
    }
}

fn parse_value_list(node: Node<'_, '_>) -> Result<ValueList, TemplateError> {
    let mut entries = Vec::new();
    for item in xml::children(node, "item") {
        entries.push(ValueListEntry {
            key: xml::attr(item, "key"),
            value_name: xml::required_attr(item, "valueName")?,
            value: match xml::child(item, "value") {
                Some(v) => parse_value(v)?,
                None => None,
            },
        });
    }
    Ok(ValueList {
        default_key: xml::attr(node, "defaultKey"),
        entries,
    })
}

fn parse_element(node: Node<'_, '_>) -> Result<Option<PolicyElement>, TemplateError> {
    let id = || xml::required_attr(node, "id");
    let key = xml::attr(node, "key");
    let value_name = xml::attr(node, "valueName");
    let client_extension = xml::attr(node, "clientExtension");

    let element = match node.tag_name().name() {
        "decimal" => PolicyElement::Decimal(DecimalElement {
            id: id()?,
            key,
            value_name,
            client_extension,
            required: xml::bool_attr(node, "required", false)?,
            minimum: xml::u32_attr(node, "minValue", 0)?,
            maximum: xml::u32_attr(node, "maxValue", u32::MAX)?,
            store_as_text: xml::bool_attr(node, "storeAsText", false)?,
            no_overwrite: xml::bool_attr(node, "soft", false)?,
        }),
        "boolean" => {
            let mut affected = AffectedValues::default();
            if let Some(v) = xml::child(node, "trueValue") {
                affected.on_value = parse_value(v)?;
            }
            if let Some(v) = xml::child(node, "falseValue") {
                affected.off_value = parse_value(v)?;
            }
            if let Some(l) = xml::child(node, "trueList") {
                affected.on_list = Some(parse_value_list(l)?);
            }
            if let Some(l) = xml::child(node, "falseList") {
                affected.off_list = Some(parse_value_list(l)?);
            }
            PolicyElement::Boolean(BooleanElement {
                id: id()?,
                key,
                value_name,
                client_extension,
                affected,
            })
        }
        "text" => PolicyElement::Text(TextElement {
            id: id()?,
            key,
            value_name,
            client_extension,
            required: xml::bool_attr(node, "required", false)?,
            max_length: xml::u32_attr(node, "maxLength", 255)?,
            expandable: xml::bool_attr(node, "expandable", false)?,
            no_overwrite: xml::bool_attr(node, "soft", false)?,
        }),
        "list" => PolicyElement::List(ListElement {
            id: id()?,
            key,
            value_prefix: xml::attr(node, "valuePrefix"),
            client_extension,
            purge_others: !xml::bool_attr(node, "additive", false)?,
            expandable: xml::bool_attr(node, "expandable", false)?,
            user_provides_names: xml::bool_attr(node, "explicitValue", false)?,
        }),
        "enum" => {
            let mut items = Vec::new();
            for item in xml::children(node, "item") {
                items.push(EnumItem {
                    display_code: xml::required_attr(item, "displayName")?,
                    value: match xml::child(item, "value") {
                        Some(v) => parse_value(v)?,
                        None => None,
                    },
                    value_list: xml::child(item, "valueList")
                        .map(parse_value_list)
                        .transpose()?,
                });
            }
            PolicyElement::Enum(EnumElement {
                id: id()?,
                key,
                value_name,
                client_extension,
                required: xml::bool_attr(node, "required", false)?,
                items,
            })
        }
        "multiText" => PolicyElement::MultiText(MultiTextElement {
            id: id()?,
            key,
            value_name,
            client_extension,
        }),
        "longDecimal" => return Err(schema("longDecimal elements are not supported")),
        other => {
            debug!(element = other, "skipping unknown policy element");
            return Ok(None);
        }
    };
    Ok(Some(element))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<policyDefinitions xmlns="http://schemas.microsoft.com/GroupPolicy/2006/07/PolicyDefinitions" revision="1.0" schemaVersion="1.0">
  <policyNamespaces>
    <target prefix="acme" namespace="Acme.Policies" />
    <using prefix="windows" namespace="Microsoft.Policies.Windows" />
  </policyNamespaces>
  <supersededAdm fileName="acme.adm" />
  <resources minRequiredRevision="1.0" />
  <supportedOn>
    <products>
      <product name="Acme" displayName="$(string.Acme)">
        <majorVersion name="Acme2" displayName="$(string.Acme2)" versionIndex="2">
          <minorVersion name="Acme21" displayName="$(string.Acme21)" versionIndex="1" />
        </majorVersion>
      </product>
    </products>
    <definitions>
      <definition name="SUPPORTED_Acme2" displayName="$(string.SUPPORTED_Acme2)">
        <or>
          <reference ref="Acme2" />
          <range ref="Acme" minVersionIndex="2" maxVersionIndex="4" />
        </or>
      </definition>
    </definitions>
  </supportedOn>
  <categories>
    <category name="AcmeRoot" displayName="$(string.AcmeRoot)" explainText="$(string.AcmeRoot_Help)">
      <parentCategory ref="windows:WindowsComponents" />
    </category>
  </categories>
  <policies>
    <policy name="Telemetry" class="Machine" displayName="$(string.Telemetry)" explainText="$(string.Telemetry_Help)" presentation="$(presentation.Telemetry)" key="Software\Policies\Acme" valueName="Telemetry">
      <parentCategory ref="AcmeRoot" />
      <supportedOn ref="SUPPORTED_Acme2" />
      <enabledValue><decimal value="1" /></enabledValue>
      <disabledValue><delete /></disabledValue>
      <elements>
        <text id="Endpoint" valueName="Endpoint" maxLength="10" required="true" />
        <decimal id="Level" valueName="Level" minValue="1" maxValue="3" />
        <list id="Hosts" key="Software\Policies\Acme\Hosts" valuePrefix="Item" />
        <enum id="Mode" valueName="Mode">
          <item displayName="$(string.ModeFast)"><value><string>fast</string></value></item>
          <item displayName="$(string.ModeSafe)"><value><decimal value="2" /></value>
            <valueList><item key="Software\Policies\Acme\Extra" valueName="Safe"><value><decimal value="1" /></value></item></valueList>
          </item>
        </enum>
        <boolean id="Verbose" valueName="Verbose">
          <trueValue><decimal value="1" /></trueValue>
          <falseValue><decimal value="0" /></falseValue>
        </boolean>
        <multiText id="Notes" valueName="Notes" />
      </elements>
    </policy>
    <policy name="UserBanner" class="User" displayName="$(string.UserBanner)" key="Software\Policies\Acme">
      <enabledList defaultKey="Software\Policies\Acme\Banner">
        <item valueName="Show"><value><decimal value="1" /></value></item>
      </enabledList>
    </policy>
  </policies>
</policyDefinitions>"#;

    fn sample() -> AdmxFile {
        AdmxFile::parse(SAMPLE, Path::new("acme.admx")).unwrap()
    }

    #[test]
    fn namespaces_and_prefixes() {
        let file = sample();
        assert_eq!(file.namespace, "Acme.Policies");
        assert_eq!(file.prefixes["acme"], "Acme.Policies");
        assert_eq!(file.prefixes["windows"], "Microsoft.Policies.Windows");
        assert_eq!(file.superseded_adm, vec!["acme.adm"]);
        assert_eq!(file.min_adml_revision.as_deref(), Some("1.0"));
    }

    #[test]
    fn products_nest_by_parent_id() {
        let file = sample();
        let kinds: Vec<_> = file.products.iter().map(|p| (p.id.as_str(), p.kind, p.parent.as_deref())).collect();
        assert_eq!(
            kinds,
            vec![
                ("Acme", ProductKind::Product, None),
                ("Acme2", ProductKind::MajorRevision, Some("Acme")),
                ("Acme21", ProductKind::MinorRevision, Some("Acme2")),
            ]
        );
        let support = &file.support_definitions[0];
        assert_eq!(support.logic, SupportLogic::AnyOf);
        assert_eq!(support.entries.len(), 2);
        assert!(support.entries[1].is_range);
        assert_eq!(support.entries[1].max_version, Some(4));
    }

    #[test]
    fn policy_fields_and_elements_in_document_order() {
        let file = sample();
        let policy = &file.policies[0];
        assert_eq!(policy.section, Section::Machine);
        assert_eq!(policy.category_ref.as_deref(), Some("AcmeRoot"));
        assert_eq!(policy.affected.on_value, Some(RegistryValue::Numeric(1)));
        assert_eq!(policy.affected.off_value, Some(RegistryValue::Delete));
        let kinds: Vec<_> = policy.elements.iter().map(|e| e.kind_name()).collect();
        assert_eq!(kinds, vec!["text", "decimal", "list", "enum", "boolean", "multiText"]);

        match policy.element("Endpoint").unwrap() {
            PolicyElement::Text(t) => {
                assert_eq!(t.max_length, 10);
                assert!(t.required);
            }
            other => panic!("unexpected element {other:?}"),
        }
        match policy.element("Level").unwrap() {
            PolicyElement::Decimal(d) => assert_eq!((d.minimum, d.maximum), (1, 3)),
            other => panic!("unexpected element {other:?}"),
        }
        match policy.element("Hosts").unwrap() {
            PolicyElement::List(l) => {
                assert!(l.has_prefix());
                assert!(l.purge_others);
                assert!(!l.user_provides_names);
            }
            other => panic!("unexpected element {other:?}"),
        }
        match policy.element("Mode").unwrap() {
            PolicyElement::Enum(e) => {
                assert_eq!(e.items[0].value, Some(RegistryValue::Text("fast".into())));
                assert_eq!(e.items[1].value_list.as_ref().unwrap().entries.len(), 1);
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn element_registry_targets_fall_back_to_policy() {
        let file = sample();
        let policy = &file.policies[0];
        let hosts = policy.element("Hosts").unwrap();
        assert_eq!(hosts.registry_key(policy), r"Software\Policies\Acme\Hosts");
        assert_eq!(hosts.value_name(policy), Some("Item"));
        let level = policy.element("Level").unwrap();
        assert_eq!(level.registry_key(policy), r"Software\Policies\Acme");
    }

    #[test]
    fn class_defaults_and_lists() {
        let file = sample();
        let banner = &file.policies[1];
        assert_eq!(banner.section, Section::User);
        assert!(banner.value_name.is_none());
        let list = banner.affected.on_list.as_ref().unwrap();
        assert_eq!(list.default_key.as_deref(), Some(r"Software\Policies\Acme\Banner"));
        assert_eq!(list.entry_key(&list.entries[0], &banner.key), r"Software\Policies\Acme\Banner");
    }

    #[test]
    fn wrong_root_is_a_schema_error() {
        let err = AdmxFile::parse("<policyDefinitionResources/>", Path::new("x.admx")).unwrap_err();
        assert!(matches!(err, TemplateError::Schema(_)));
    }

    #[test]
    fn malformed_markup_is_a_markup_error() {
        let err = AdmxFile::parse("<policyDefinitions>", Path::new("x.admx")).unwrap_err();
        assert!(matches!(err, TemplateError::Markup(_)));
    }

    #[test]
    fn long_decimal_element_is_a_schema_error() {
        let text = r#"<policyDefinitions><policyNamespaces><target prefix="a" namespace="A"/></policyNamespaces>
            <policies><policy name="P" displayName="x" class="Machine" key="K">
              <elements><longDecimal id="Big" valueName="Big" /></elements>
            </policy></policies></policyDefinitions>"#;
        let err = AdmxFile::parse(text, Path::new("x.admx")).unwrap_err();
        assert!(matches!(err, TemplateError::Schema(_)));
        assert!(err.to_string().contains("longDecimal"), "{err}");
    }

    #[test]
    fn missing_policy_key_is_a_schema_error() {
        let text = r#"<policyDefinitions><policyNamespaces><target prefix="a" namespace="A"/></policyNamespaces>
            <policies><policy name="P" displayName="x" class="Machine"/></policies></policyDefinitions>"#;
        let err = AdmxFile::parse(text, Path::new("x.admx")).unwrap_err();
        assert!(matches!(err, TemplateError::Schema(msg) if msg.contains("key")));
    }
}
