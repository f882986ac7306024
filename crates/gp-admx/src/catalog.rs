// catalog.rs — The linked policy catalog.
//
// Nodes live in flat arenas and refer to each other by index: a category
// holds the indices of its children and policies, a child holds its parent's
// index. Ids are qualified as `namespace:id`.
//
// Linking is two-pass and always runs over every loaded file, so a reference
// into a file that was loaded later still resolves:
//
// 1. instantiate every category, product, support definition and policy
//    with its qualified id and localized strings;
// 2. resolve parent/child, category membership and support references
//    through each file's prefix table.
//
// A reference that does not resolve leaves the node unattached (a category
// becomes a root, a policy has no category). Missing strings fall back to
// the raw display code.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::adml::AdmlFile;
use crate::admx::{AdmxFile, AdmxPolicy, ProductKind, Section, SupportLogic};
use crate::presentation::Presentation;

macro_rules! arena_index {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub usize);
    };
}

arena_index!(SourceIdx);
arena_index!(CategoryIdx);
arena_index!(ProductIdx);
arena_index!(SupportIdx);
arena_index!(PolicyIdx);

/// A definition file paired with the localization chosen for it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub admx: AdmxFile,
    pub adml: AdmlFile,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: String,
    pub display_name: String,
    pub explanation: String,
    pub parent: Option<CategoryIdx>,
    pub children: Vec<CategoryIdx>,
    pub policies: Vec<PolicyIdx>,
    #[serde(skip)]
    pub source: SourceIdx,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: String,
    pub display_name: String,
    pub kind: ProductKind,
    pub version: Option<u32>,
    pub parent: Option<ProductIdx>,
    pub children: Vec<ProductIdx>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum SupportTarget {
    Product(ProductIdx),
    Definition(SupportIdx),
    /// The reference as written, after prefix mapping.
    Unresolved(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportEntry {
    pub target: SupportTarget,
    pub is_range: bool,
    pub min_version: Option<u32>,
    pub max_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportDefinition {
    pub id: String,
    pub display_name: String,
    pub logic: SupportLogic,
    pub entries: Vec<SupportEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Policy {
    pub id: String,
    pub display_name: String,
    pub explanation: String,
    pub category: Option<CategoryIdx>,
    pub supported_on: Option<SupportIdx>,
    pub presentation: Option<Presentation>,
    /// The declaration as written in its file. `section` may have been
    /// widened to `Both` by duplicate merging.
    pub definition: AdmxPolicy,
    #[serde(skip)]
    pub source: SourceIdx,
}

impl Policy {
    pub fn section(&self) -> Section {
        self.definition.section
    }
}

/// A cross-referenced, localized view over every loaded template.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub(crate) sources: Vec<SourceFile>,
    pub(crate) namespaces: HashMap<String, SourceIdx>,
    merge_duplicates: bool,
    categories: Vec<Category>,
    products: Vec<Product>,
    supports: Vec<SupportDefinition>,
    policies: Vec<Policy>,
    category_ids: HashMap<String, CategoryIdx>,
    product_ids: HashMap<String, ProductIdx>,
    support_ids: HashMap<String, SupportIdx>,
    policy_ids: HashMap<String, PolicyIdx>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parsed file pair and relink. Returns `Err(namespace)` when the
    /// namespace is already taken.
    pub fn add_source(&mut self, admx: AdmxFile, adml: AdmlFile) -> Result<SourceIdx, String> {
        if self.namespaces.contains_key(&admx.namespace) {
            return Err(admx.namespace);
        }
        let idx = SourceIdx(self.sources.len());
        self.namespaces.insert(admx.namespace.clone(), idx);
        self.sources.push(SourceFile { admx, adml });
        self.link();
        Ok(idx)
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    /// Whether a definition file already claimed `namespace`.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    // ── string / reference resolution ──

    /// Resolve `$(string.X)` through the source's string table. Anything
    /// else, or an unknown id, comes back unchanged.
    pub fn resolve_string(&self, source: SourceIdx, code: &str) -> String {
        code.strip_prefix("$(string.")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|id| self.sources.get(source.0)?.adml.strings.get(id))
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    /// Resolve `$(presentation.Y)` through the source's presentation table.
    pub fn resolve_presentation(&self, source: SourceIdx, code: &str) -> Option<Presentation> {
        let id = code
            .strip_prefix("$(presentation.")
            .and_then(|rest| rest.strip_suffix(')'))?;
        self.sources.get(source.0)?.adml.presentations.get(id).cloned()
    }

    fn qualify(&self, source: SourceIdx, id: &str) -> String {
        format!("{}:{}", self.sources[source.0].admx.namespace, id)
    }

    /// `prefix:id` is remapped through the source's prefix table (left as
    /// written when the prefix is unknown); a bare id is local.
    fn resolve_ref(&self, source: SourceIdx, reference: &str) -> String {
        match reference.split_once(':') {
            Some((prefix, id)) => match self.sources[source.0].admx.prefixes.get(prefix) {
                Some(ns) => format!("{ns}:{id}"),
                None => reference.to_string(),
            },
            None => self.qualify(source, reference),
        }
    }

    // ── linking ──

    pub(crate) fn link(&mut self) {
        let mut categories = Vec::new();
        let mut products = Vec::new();
        let mut supports = Vec::new();
        let mut policies = Vec::new();
        let mut category_ids = HashMap::new();
        let mut product_ids = HashMap::new();
        let mut support_ids = HashMap::new();
        let mut policy_ids = HashMap::new();

        // Pass 1: instantiate.
        for (i, file) in self.sources.iter().enumerate() {
            let src = SourceIdx(i);
            for raw in &file.admx.categories {
                let id = self.qualify(src, &raw.id);
                category_ids.insert(id.clone(), CategoryIdx(categories.len()));
                categories.push(Category {
                    id,
                    display_name: self.resolve_string(src, &raw.display_code),
                    explanation: raw
                        .explain_code
                        .as_deref()
                        .map(|c| self.resolve_string(src, c))
                        .unwrap_or_default(),
                    parent: None,
                    children: Vec::new(),
                    policies: Vec::new(),
                    source: src,
                });
            }
            for raw in &file.admx.products {
                let id = self.qualify(src, &raw.id);
                product_ids.insert(id.clone(), ProductIdx(products.len()));
                products.push(Product {
                    id,
                    display_name: self.resolve_string(src, &raw.display_code),
                    kind: raw.kind,
                    version: raw.version,
                    parent: None,
                    children: Vec::new(),
                });
            }
            for raw in &file.admx.support_definitions {
                let id = self.qualify(src, &raw.id);
                support_ids.insert(id.clone(), SupportIdx(supports.len()));
                supports.push(SupportDefinition {
                    id,
                    display_name: self.resolve_string(src, &raw.display_code),
                    logic: raw.logic,
                    entries: Vec::new(),
                });
            }
            for raw in &file.admx.policies {
                let id = self.qualify(src, &raw.id);
                if policy_ids.contains_key(&id) {
                    debug!(policy = %id, "duplicate policy id, keeping the first");
                    continue;
                }
                policy_ids.insert(id.clone(), PolicyIdx(policies.len()));
                policies.push(Policy {
                    id,
                    display_name: self.resolve_string(src, &raw.display_code),
                    explanation: self.resolve_string(src, &raw.explain_code),
                    category: None,
                    supported_on: None,
                    presentation: raw
                        .presentation_ref
                        .as_deref()
                        .and_then(|p| self.resolve_presentation(src, p)),
                    definition: raw.clone(),
                    source: src,
                });
            }
        }

        // Pass 2: resolve references.
        let mut cat_cursor = 0;
        let mut product_cursor = 0;
        let mut support_cursor = 0;
        for (i, file) in self.sources.iter().enumerate() {
            let src = SourceIdx(i);
            for raw in &file.admx.categories {
                let me = CategoryIdx(cat_cursor);
                cat_cursor += 1;
                let Some(parent_ref) = &raw.parent_ref else { continue };
                if let Some(&parent) = category_ids.get(&self.resolve_ref(src, parent_ref)) {
                    if parent != me {
                        categories[me.0].parent = Some(parent);
                        categories[parent.0].children.push(me);
                    }
                }
            }
            for raw in &file.admx.products {
                let me = ProductIdx(product_cursor);
                product_cursor += 1;
                let Some(parent_id) = &raw.parent else { continue };
                if let Some(&parent) = product_ids.get(&self.qualify(src, parent_id)) {
                    products[me.0].parent = Some(parent);
                    products[parent.0].children.push(me);
                }
            }
            for raw in &file.admx.support_definitions {
                let me = SupportIdx(support_cursor);
                support_cursor += 1;
                for entry in &raw.entries {
                    let target_id = self.resolve_ref(src, &entry.target_ref);
                    let target = if let Some(&p) = product_ids.get(&target_id) {
                        SupportTarget::Product(p)
                    } else if let Some(&s) = support_ids.get(&target_id) {
                        SupportTarget::Definition(s)
                    } else {
                        SupportTarget::Unresolved(target_id)
                    };
                    supports[me.0].entries.push(SupportEntry {
                        target,
                        is_range: entry.is_range,
                        min_version: entry.min_version,
                        max_version: entry.max_version,
                    });
                }
            }
        }
        for (i, policy) in policies.iter_mut().enumerate() {
            let src = policy.source;
            if let Some(cat_ref) = &policy.definition.category_ref {
                if let Some(&cat) = category_ids.get(&self.resolve_ref(src, cat_ref)) {
                    policy.category = Some(cat);
                    categories[cat.0].policies.push(PolicyIdx(i));
                }
            }
            if let Some(sup_ref) = &policy.definition.supported_ref {
                policy.supported_on = support_ids.get(&self.resolve_ref(src, sup_ref)).copied();
            }
        }

        self.categories = categories;
        self.products = products;
        self.supports = supports;
        self.policies = policies;
        self.category_ids = category_ids;
        self.product_ids = product_ids;
        self.support_ids = support_ids;
        self.policy_ids = policy_ids;

        if self.merge_duplicates {
            self.merge_pairs();
        }
        debug!(
            sources = self.sources.len(),
            categories = self.categories.len(),
            policies = self.policies.len(),
            "catalog linked"
        );
    }

    // ── queries ──

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn support_definitions(&self) -> &[SupportDefinition] {
        &self.supports
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn root_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|c| c.parent.is_none())
    }

    pub fn root_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.parent.is_none())
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.category_ids.get(id).map(|&i| &self.categories[i.0])
    }

    pub fn category_at(&self, idx: CategoryIdx) -> &Category {
        &self.categories[idx.0]
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.product_ids.get(id).map(|&i| &self.products[i.0])
    }

    pub fn product_at(&self, idx: ProductIdx) -> &Product {
        &self.products[idx.0]
    }

    pub fn support_definition(&self, id: &str) -> Option<&SupportDefinition> {
        self.support_ids.get(id).map(|&i| &self.supports[i.0])
    }

    pub fn support_at(&self, idx: SupportIdx) -> &SupportDefinition {
        &self.supports[idx.0]
    }

    pub fn policy(&self, id: &str) -> Option<&Policy> {
        self.policy_ids.get(id).map(|&i| &self.policies[i.0])
    }

    pub fn policy_at(&self, idx: PolicyIdx) -> &Policy {
        &self.policies[idx.0]
    }

    /// Policies directly inside a category.
    pub fn category_policies<'a>(&'a self, category: &'a Category) -> impl Iterator<Item = &'a Policy> + 'a {
        category.policies.iter().map(move |&i| &self.policies[i.0])
    }

    /// Child categories of a category.
    pub fn child_categories<'a>(&'a self, category: &'a Category) -> impl Iterator<Item = &'a Category> + 'a {
        category.children.iter().map(move |&i| &self.categories[i.0])
    }

    /// Case-insensitive substring search over display name, explanation and
    /// id, optionally limited to policies applying to `scope`.
    pub fn search(&self, query: &str, scope: Option<Section>) -> Vec<&Policy> {
        let needle = query.to_lowercase();
        self.policies
            .iter()
            .filter(|p| scope.map_or(true, |s| p.section().includes(s)))
            .filter(|p| {
                needle.is_empty()
                    || p.display_name.to_lowercase().contains(&needle)
                    || p.explanation.to_lowercase().contains(&needle)
                    || p.id.to_lowercase().contains(&needle)
            })
            .collect()
    }

    // ── duplicate merging ──

    /// Merge User/Machine policy pairs that are the same setting (same
    /// category, display name, explanation and key) into a single `Both`
    /// policy. The merge is re-applied after every later load. Returns the
    /// number of policies removed.
    pub fn merge_scope_duplicates(&mut self) -> usize {
        self.merge_duplicates = true;
        self.merge_pairs()
    }

    fn merge_pairs(&mut self) -> usize {
        let mut removed = vec![false; self.policies.len()];
        let mut widened = Vec::new();
        for cat in &self.categories {
            let mut by_name: Vec<(&str, Vec<PolicyIdx>)> = Vec::new();
            for &i in &cat.policies {
                let name = self.policies[i.0].display_name.as_str();
                match by_name.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, group)) => group.push(i),
                    None => by_name.push((name, vec![i])),
                }
            }
            for (_, group) in by_name {
                let &[keep, dup] = group.as_slice() else { continue };
                let (a, b) = (&self.policies[keep.0], &self.policies[dup.0]);
                let pair = matches!(
                    (a.section(), b.section()),
                    (Section::Machine, Section::User) | (Section::User, Section::Machine)
                );
                if pair
                    && a.explanation == b.explanation
                    && a.definition.key == b.definition.key
                {
                    removed[dup.0] = true;
                    widened.push(keep);
                }
            }
        }
        if widened.is_empty() {
            return 0;
        }

        for keep in &widened {
            self.policies[keep.0].definition.section = Section::Both;
        }
        let mut remap = vec![None; self.policies.len()];
        let mut survivors = Vec::new();
        for (i, policy) in std::mem::take(&mut self.policies).into_iter().enumerate() {
            if !removed[i] {
                remap[i] = Some(PolicyIdx(survivors.len()));
                survivors.push(policy);
            }
        }
        for cat in &mut self.categories {
            cat.policies = cat.policies.iter().filter_map(|i| remap[i.0]).collect();
        }
        self.policies = survivors;
        self.policy_ids = self
            .policies
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), PolicyIdx(i)))
            .collect();
        debug!(merged = widened.len(), "merged user/machine duplicate policies");
        widened.len()
    }
}
