// mod.rs — Shared state for gpol subcommands.

pub mod browse;
pub mod dump;
pub mod state;

use anyhow::Context as _;
use gp_admx::{Catalog, Policy};
use gp_policy::{EngineConfig, PolicyEditor, Scope};
use gp_registry::MemoryStore;
use serde::Serialize;
use tracing::debug;

/// Resolved settings for one invocation.
pub struct Context {
    pub config: EngineConfig,
    pub scope: Scope,
    pub json: bool,
}

impl Context {
    /// Load the definitions. Files that fail to load are reported on stderr
    /// and skipped.
    pub fn catalog(&self) -> Catalog {
        let (mut catalog, failures) =
            gp_admx::load(&self.config.definitions_dir, &self.config.locales);
        for failure in &failures {
            eprintln!("warning: {failure}");
        }
        if self.config.merge_scope_duplicates {
            let merged = catalog.merge_scope_duplicates();
            debug!(merged, "merged scope duplicates");
        }
        debug!(
            dir = %self.config.definitions_dir.display(),
            policies = catalog.policies().len(),
            failures = failures.len(),
            "catalog loaded"
        );
        catalog
    }

    /// An editor for the configured scope. This host has no live registry,
    /// so the live side is an empty in-memory store and the policy file
    /// carries the state.
    pub fn editor(&self) -> PolicyEditor<MemoryStore> {
        PolicyEditor::new(self.scope, MemoryStore::new())
            .with_policy_file(self.config.policy_file(self.scope))
            .with_precedence(self.config.read_precedence)
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(value).context("serializing output")?;
        println!("{text}");
        Ok(())
    }
}

/// Look a policy up by id, or fail with a readable message.
pub fn find_policy<'a>(catalog: &'a Catalog, id: &str) -> anyhow::Result<&'a Policy> {
    catalog
        .policy(id)
        .with_context(|| format!("no policy '{id}' (ids look like Namespace:Name)"))
}
