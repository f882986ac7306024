// editor.rs — Reading and writing policies through both backends.
//
// A PolicyEditor owns one scope (Machine or User) and two backends: the live
// registry store for that hive, and optionally the scope's policy file.
//
// Writes go to the live store first. If that fails the apply fails and the
// file is not touched. If it succeeds the same mutation is mirrored into the
// policy file (load, apply, atomic save); a mirror problem is reported as a
// warning on the outcome, never as an error. A policy file that no longer
// parses is replaced by a fresh one.
//
// Reads follow the configured `ReadPrecedence`. Problems reading the file
// are recorded in the report so callers can tell "not configured" apart from
// "could not read".

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gp_admx::{Policy, Section};
use gp_registry::{PolStore, RegistryError, RegistryStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ReadPrecedence;
use crate::error::MutationError;
use crate::inference::{infer_with_trace, InferenceTrace};
use crate::mutation;
use crate::notify::{ChangeNotifier, LoggingNotifier};
use crate::options::OptionValues;
use crate::state::{PolicyState, TargetState};

/// One registry hive a policy can be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Machine,
    User,
}

impl Scope {
    pub fn section(self) -> Section {
        match self {
            Scope::Machine => Section::Machine,
            Scope::User => Section::User,
        }
    }

    /// `<system root>\System32\GroupPolicy\<Machine|User>\Registry.pol`.
    pub fn policy_file_path(self, system_root: &Path) -> PathBuf {
        let dir = match self {
            Scope::Machine => "Machine",
            Scope::User => "User",
        };
        system_root
            .join("System32")
            .join("GroupPolicy")
            .join(dir)
            .join("Registry.pol")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Machine => "machine",
            Scope::User => "user",
        })
    }
}

/// Which backend a state report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Live,
    PolicyFile,
}

/// Record of one successful apply.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub change_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub policy_id: String,
    pub scope: Scope,
    pub state: TargetState,
    /// Whether the policy file now reflects the change.
    pub mirrored: bool,
    /// Non-fatal problems (mirror failures, notifier failures).
    pub warnings: Vec<String>,
}

/// The observed state of a policy in one scope.
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub policy_id: String,
    pub scope: Scope,
    pub state: PolicyState,
    pub options: OptionValues,
    /// Backend whose evidence decided the state; `None` when nothing could
    /// be read.
    pub source: Option<Backend>,
    /// Problems reading a backend. A NotConfigured state with read errors
    /// means "could not tell", not "not configured".
    pub read_errors: Vec<String>,
}

impl StateReport {
    pub fn is_degraded(&self) -> bool {
        !self.read_errors.is_empty()
    }
}

/// Reads and writes policies for one scope.
pub struct PolicyEditor<L: RegistryStore> {
    scope: Scope,
    live: L,
    policy_file: Option<PathBuf>,
    precedence: ReadPrecedence,
    notifier: Box<dyn ChangeNotifier>,
}

impl<L: RegistryStore> PolicyEditor<L> {
    /// An editor over a live store only.
    pub fn new(scope: Scope, live: L) -> Self {
        Self {
            scope,
            live,
            policy_file: None,
            precedence: ReadPrecedence::default(),
            notifier: Box::new(LoggingNotifier),
        }
    }

    /// Mirror writes into (and read from) this policy file.
    pub fn with_policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_file = Some(path.into());
        self
    }

    pub fn with_precedence(mut self, precedence: ReadPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn live(&self) -> &L {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut L {
        &mut self.live
    }

    pub fn policy_file(&self) -> Option<&Path> {
        self.policy_file.as_deref()
    }

    /// Apply `target` to `policy`: live store first, then the policy file.
    pub fn apply(
        &mut self,
        policy: &Policy,
        target: PolicyState,
        options: &OptionValues,
    ) -> Result<ApplyOutcome, MutationError> {
        let target = TargetState::try_from(target)?;
        if !policy.section().includes(self.scope.section()) {
            return Err(MutationError::WrongScope {
                policy_id: policy.id.clone(),
                scope: self.scope.to_string(),
            });
        }

        mutation::apply(&policy.definition, target, options, &mut self.live)?;

        let mut warnings = Vec::new();
        let mirrored = self.mirror(policy, target, options, &mut warnings);
        if let Err(reason) = self.notifier.policy_changed(self.scope, &policy.id) {
            warn!(policy = %policy.id, %reason, "change notification failed");
            warnings.push(format!("change notification failed: {reason}"));
        }

        let outcome = ApplyOutcome {
            change_id: Uuid::new_v4(),
            applied_at: Utc::now(),
            policy_id: policy.id.clone(),
            scope: self.scope,
            state: target,
            mirrored,
            warnings,
        };
        info!(
            change_id = %outcome.change_id,
            policy = %outcome.policy_id,
            scope = %self.scope,
            ?target,
            mirrored,
            "policy applied"
        );
        Ok(outcome)
    }

    /// Best-effort write of the same mutation into the policy file. Returns
    /// whether the file now holds the change.
    fn mirror(
        &self,
        policy: &Policy,
        target: TargetState,
        options: &OptionValues,
        warnings: &mut Vec<String>,
    ) -> bool {
        let Some(path) = self.policy_file.as_deref() else {
            return false;
        };
        let mut store = match PolStore::load(path) {
            Ok(store) => store,
            Err(e) if e.is_format() => {
                warn!(path = %path.display(), error = %e, "replacing unreadable policy file");
                warnings.push(format!(
                    "policy file {} could not be parsed and was replaced: {e}",
                    path.display()
                ));
                PolStore::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "policy file not mirrored");
                warnings.push(format!("policy file not updated: {e}"));
                return false;
            }
        };
        if let Err(e) = mutation::apply(&policy.definition, target, options, &mut store) {
            warn!(path = %path.display(), error = %e, "policy file not mirrored");
            warnings.push(format!("policy file not updated: {e}"));
            return false;
        }
        if let Err(e) = store.save(path) {
            warn!(path = %path.display(), error = %e, "policy file not saved");
            warnings.push(format!("policy file not saved: {e}"));
            return false;
        }
        true
    }

    fn load_file(&self) -> Option<Result<PolStore, RegistryError>> {
        self.policy_file.as_deref().map(PolStore::load)
    }

    /// Observe the state of `policy` according to the read precedence.
    pub fn read(&self, policy: &Policy) -> StateReport {
        self.read_with_trace(policy).0
    }

    /// Like [`read`](Self::read), plus the evidence steps taken on the
    /// backend that decided the state. The trace is `None` when no backend
    /// could be read.
    pub fn read_with_trace(&self, policy: &Policy) -> (StateReport, Option<InferenceTrace>) {
        let mut report = StateReport {
            policy_id: policy.id.clone(),
            scope: self.scope,
            state: PolicyState::NotConfigured,
            options: OptionValues::new(),
            source: None,
            read_errors: Vec::new(),
        };
        let settle = |report: &mut StateReport, trace: &InferenceTrace, backend: Backend| {
            report.state = trace.state;
            report.options = trace.options.clone();
            report.source = Some(backend);
        };

        if self.precedence != ReadPrecedence::LiveOnly {
            match self.load_file() {
                Some(Ok(store)) => {
                    let trace = infer_with_trace(&policy.definition, &store);
                    if self.precedence == ReadPrecedence::FileOnly
                        || trace.state != PolicyState::NotConfigured
                    {
                        settle(&mut report, &trace, Backend::PolicyFile);
                        return (report, Some(trace));
                    }
                }
                Some(Err(e)) => {
                    warn!(policy = %policy.id, error = %e, "policy file unreadable");
                    report.read_errors.push(e.to_string());
                }
                None if self.precedence == ReadPrecedence::FileOnly => {
                    report
                        .read_errors
                        .push("no policy file configured".to_string());
                }
                None => {}
            }
            if self.precedence == ReadPrecedence::FileOnly {
                return (report, None);
            }
        }

        let trace = infer_with_trace(&policy.definition, &self.live);
        settle(&mut report, &trace, Backend::Live);
        (report, Some(trace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_file_paths_per_scope() {
        let root = Path::new("/win");
        let machine = Scope::Machine.policy_file_path(root);
        assert!(machine.ends_with("System32/GroupPolicy/Machine/Registry.pol"));
        assert!(Scope::User
            .policy_file_path(root)
            .ends_with("GroupPolicy/User/Registry.pol"));
    }

    #[test]
    fn scope_maps_to_section() {
        assert!(Section::Both.includes(Scope::User.section()));
        assert!(!Section::Machine.includes(Scope::User.section()));
        assert_eq!(Scope::Machine.to_string(), "machine");
    }
}
