//! # gp-policy
//!
//! Reads and writes Group Policy state on top of a linked
//! [`gp_admx::Catalog`] and the [`gp_registry`] backends.
//!
//! - [`infer`] / [`infer_with_trace`]: registry evidence → [`PolicyState`]
//!   plus the element values of an enabled policy.
//! - [`apply`]: a [`TargetState`] and option values → registry writes.
//! - [`PolicyEditor`]: one scope, live store first, policy file mirrored.
//! - [`EngineConfig`]: where definitions and policy files live.
//!
//! ## Key invariants
//!
//! - Applying a target and inferring from the same backend yields that
//!   target (for the policy file, which records deletions).
//! - Plain absence of a value is never evidence; deletions are only seen
//!   through policy-file markers.
//! - `Unknown` is reported, never written.
//! - A live write failure fails the apply; a policy-file failure never does.

pub mod config;
pub mod detail;
pub mod editor;
pub mod error;
pub mod inference;
pub mod mutation;
pub mod notify;
pub mod options;
pub mod state;

pub use config::{detect_locales, normalize_locale, EngineConfig, ReadPrecedence};
pub use detail::{build_detail, ElementDetail, EnumOptionDetail, PolicyDetail};
pub use editor::{ApplyOutcome, Backend, PolicyEditor, Scope, StateReport};
pub use error::{ConfigError, MutationError, OptionError};
pub use inference::{infer, infer_with_trace, read_options, EvidenceStep, Inference, InferenceTrace};
pub use mutation::{apply, validate};
pub use notify::{ChangeNotifier, LoggingNotifier};
pub use options::{option_from_json, options_from_json, options_to_json, OptionValue, OptionValues};
pub use state::{Evidence, PolicyState, TargetState};
