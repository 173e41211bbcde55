//! Settings tree: schema handling and the materialized nodes.
//!
//! ## Architecture
//!
//! - [`schema`] - sub-schema resolution, `allOf` merging and default values
//! - [`directives`] - the `Page`/`PageGroup`/`Prop`/`PropLink`/`Hide`/`AdditionalProps` vocabulary
//! - [`types`] - the [`Setting`](types::Setting) union and the contract it shares
//! - [`menu`] - pages and page groups
//! - [`item`] - leaf and container properties
//! - [`link`] - option sets of link properties

/// `AdditionalProps` injection.
mod additional;

/// Directive vocabulary embedded in schema nodes.
pub mod directives;

/// Leaf and container properties.
pub mod item;

/// Link option resolution.
pub mod link;

/// Schema-driven construction of settings.
pub(crate) mod materialize;

/// Pages and page groups.
pub mod menu;

/// JSON Schema resolution utilities.
pub mod schema;

/// Array editing shared by page groups and array properties.
mod seq;

/// Setting kinds and their shared contract.
pub mod types;
