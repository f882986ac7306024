// browse.rs — Catalog browsing: categories, policies, show, search.

use anyhow::Context as _;
use gp_admx::{Catalog, Category, Policy};
use gp_policy::{build_detail, PolicyState};
use serde::Serialize;

use super::{find_policy, Context};

#[derive(Serialize)]
struct CategoryNode {
    id: String,
    name: String,
    policy_count: usize,
    children: Vec<CategoryNode>,
}

fn category_node(catalog: &Catalog, category: &Category) -> CategoryNode {
    CategoryNode {
        id: category.id.clone(),
        name: category.display_name.clone(),
        policy_count: category.policies.len(),
        children: catalog
            .child_categories(category)
            .map(|c| category_node(catalog, c))
            .collect(),
    }
}

fn print_tree(node: &CategoryNode, depth: usize) {
    println!(
        "{}{} [{}] ({} policies)",
        "  ".repeat(depth),
        node.name,
        node.id,
        node.policy_count
    );
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

pub fn categories(ctx: &Context) -> anyhow::Result<()> {
    let catalog = ctx.catalog();
    let roots: Vec<CategoryNode> = catalog
        .root_categories()
        .map(|c| category_node(&catalog, c))
        .collect();
    if ctx.json {
        return ctx.print_json(&roots);
    }
    if roots.is_empty() {
        println!("No categories loaded from {}", ctx.config.definitions_dir.display());
    }
    for root in &roots {
        print_tree(root, 0);
    }
    Ok(())
}

#[derive(Serialize)]
struct PolicyListItem<'a> {
    id: &'a str,
    name: &'a str,
    section: gp_admx::Section,
    /// `None` when the policy does not apply to the chosen scope.
    state: Option<PolicyState>,
}

fn list_items<'a>(ctx: &Context, policies: impl Iterator<Item = &'a Policy>) -> Vec<PolicyListItem<'a>> {
    let editor = ctx.editor();
    policies
        .map(|p| PolicyListItem {
            id: &p.id,
            name: &p.display_name,
            section: p.section(),
            state: p
                .section()
                .includes(ctx.scope.section())
                .then(|| editor.read(p).state),
        })
        .collect()
}

fn print_items(ctx: &Context, items: &[PolicyListItem<'_>]) -> anyhow::Result<()> {
    if ctx.json {
        return ctx.print_json(&items);
    }
    for item in items {
        let state = item.state.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{:<16} {}  [{}]", state, item.name, item.id);
    }
    Ok(())
}

pub fn policies(ctx: &Context, category_id: &str) -> anyhow::Result<()> {
    let catalog = ctx.catalog();
    let category = catalog
        .category(category_id)
        .with_context(|| format!("no category '{category_id}'"))?;
    let items = list_items(ctx, catalog.category_policies(category));
    print_items(ctx, &items)
}

pub fn search(ctx: &Context, text: &str, all_scopes: bool) -> anyhow::Result<()> {
    let catalog = ctx.catalog();
    let scope = (!all_scopes).then(|| ctx.scope.section());
    let hits = catalog.search(text, scope);
    let items = list_items(ctx, hits.into_iter());
    if items.is_empty() && !ctx.json {
        println!("No policies match '{text}'");
        return Ok(());
    }
    print_items(ctx, &items)
}

pub fn show(ctx: &Context, policy_id: &str) -> anyhow::Result<()> {
    let catalog = ctx.catalog();
    let policy = find_policy(&catalog, policy_id)?;
    let report = ctx.editor().read(policy);
    let detail = build_detail(&catalog, policy, report.state, &report.options);
    if ctx.json {
        return ctx.print_json(&detail);
    }

    println!("{}", detail.name);
    println!("  id:       {}", detail.id);
    println!("  state:    {}", detail.state);
    println!("  key:      {}", detail.registry_key);
    if let Some(value_name) = &detail.value_name {
        println!("  value:    {value_name}");
    }
    if let Some(supported) = &detail.supported_on {
        println!("  requires: {supported}");
    }
    if !detail.description.is_empty() {
        println!();
        println!("{}", detail.description);
    }
    if !detail.elements.is_empty() {
        println!();
        println!("Options:");
        for element in &detail.elements {
            let current = element
                .value
                .as_ref()
                .map(|v| serde_json::to_string(v).unwrap_or_default())
                .unwrap_or_default();
            println!(
                "  {} ({}{}) {}",
                element.label,
                element.kind,
                if element.required { ", required" } else { "" },
                current
            );
            for option in &element.options {
                println!("      {}: {}", option.index, option.display_name);
            }
        }
    }
    for error in &report.read_errors {
        eprintln!("warning: {error}");
    }
    Ok(())
}
