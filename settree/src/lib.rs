//! # settree
//!
//! A schema-driven, reactive settings tree over a JSON document.
//!
//! An [`Editor`] pairs a JSON Schema (extended with a small directive
//! vocabulary) with a JSON document. Settings are materialized lazily from
//! the schema, cached by path, validated on every write and observable both
//! per node and globally.
//!
//! ## Features
//!
//! - Pages, page groups and typed properties derived from the schema
//! - Relative and variable paths (`.`, `..`, `<$>`, `<&>`)
//! - `allOf` merging, `$ref` and nullable unwrapping
//! - Link properties resolving their options from another collection,
//!   optionally filtered by a second property
//! - Slug auto-completion and additional-props injection
//! - Deferred re-validation through an explicit task queue
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use settree::{Editor, SettingNode, path};
//!
//! let editor = Editor::new(
//!     json!({
//!         "type": "object",
//!         "required": ["name"],
//!         "properties": {"name": {"type": "string"}}
//!     }),
//!     json!({}),
//! );
//! let name = editor.get_property(&path!["name"]).unwrap();
//! assert_eq!(name.error_msg().as_deref(), Some("Required value"));
//! name.set(Some(json!("Acme"))).unwrap();
//! assert_eq!(editor.get_value(&path!["name"]), Some(json!("Acme")));
//! ```
//!
//! ## Modules
//!
//! - [`path`] - path algebra
//! - [`data`] - schema handling and settings
//! - [`cache`] - path-keyed settings cache
//! - [`observer`] - subscriptions and the deferred queue
//! - [`editor`] - the editor façade

#[macro_use]
extern crate log;

/// Path-keyed cache of materialized settings.
pub mod cache;

/// Settings tree: schema handling and the materialized nodes.
pub mod data;

/// The editor façade.
pub mod editor;

/// Error types.
pub mod error;

/// Observer lists and the deferred-task queue.
pub mod observer;

/// Editor configuration.
pub mod options;

/// Path algebra.
pub mod path;

pub use cache::ResolveDepth;
pub use data::{
    directives::directive_schema,
    item::{Property, PropertyKind},
    link::LinkOption,
    menu::{Page, PageGroup},
    types::{Children, Setting, SettingNode, SettingType},
};
pub use editor::Editor;
pub use error::{Error, Result};
pub use observer::Subscription;
pub use options::EditorOptions;
pub use path::{Path, Segment};
pub use serde_json::Value;
