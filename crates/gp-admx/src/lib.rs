//! # gp-admx
//!
//! Compiles ADMX policy definition files and their ADML localizations into a
//! linked [`Catalog`].
//!
//! - [`AdmxFile`] / [`AdmlFile`]: raw, file-scoped records parsed from one
//!   definition file and one localization file.
//! - [`locale::resolve_adml`]: picks the localization for a preference list,
//!   falling back through base language, sibling regions and `en-US`.
//! - [`load`] / [`Catalog::load_path`]: discover, parse, pair and link;
//!   per-file problems come back as [`LoadFailure`]s.
//!
//! ## Key invariants
//!
//! - Catalog ids are `namespace:id`; references written as `prefix:id` are
//!   remapped through the declaring file's prefix table.
//! - Every linked node has a display name: unresolved `$(string.X)` codes
//!   are kept verbatim.
//! - A policy's section is exactly one scope unless it is `Both`.

pub mod adml;
pub mod admx;
pub mod catalog;
pub mod error;
pub mod loader;
pub mod locale;
pub mod presentation;
mod xml;

pub use adml::AdmlFile;
pub use admx::{
    AdmxFile, AdmxPolicy, AffectedValues, BooleanElement, DecimalElement, EnumElement, EnumItem,
    ListElement, MultiTextElement, PolicyElement, ProductKind, RegistryValue, Section,
    SupportLogic, TextElement, ValueList, ValueListEntry,
};
pub use catalog::{
    Catalog, Category, CategoryIdx, Policy, PolicyIdx, Product, ProductIdx, SourceIdx,
    SupportDefinition, SupportEntry, SupportIdx, SupportTarget,
};
pub use error::{LoadFailure, LoadFailureKind, TemplateError};
pub use loader::load;
pub use presentation::{Presentation, PresentationElement};
