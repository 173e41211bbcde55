//! Directive vocabulary embedded in schema nodes.
//!
//! Directives are extra keys on a schema node that change how it is
//! materialized:
//!
//! | Key | Payload | Effect |
//! |-----|---------|--------|
//! | `Page` | `true` or [`PageDirective`] | object becomes a [`Page`](crate::data::menu::Page) |
//! | `PageGroup` | `true` or [`PageGroupDirective`] | array of pages becomes a [`PageGroup`](crate::data::menu::PageGroup) |
//! | `Prop` | [`PropDirective`] | property refinements (sub type, slug, enum names) |
//! | `PropLink` | [`LinkDirective`] | string / string array becomes a link |
//! | `Hide` | `bool` | hidden from renderers |
//! | `AdditionalProps` | `[`[`AdditionalProp`]`]` | properties stored elsewhere, shown here |

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    path::{Path, Segment},
};

pub const PAGE: &str = "Page";
pub const PAGE_GROUP: &str = "PageGroup";
pub const PROP: &str = "Prop";
pub const PROP_LINK: &str = "PropLink";
pub const HIDE: &str = "Hide";
pub const ADDITIONAL_PROPS: &str = "AdditionalProps";

/// A path written inside a directive: either `"../a/b"` or `["..", "a", "b"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PathSpec {
    Text(String),
    Segments(Vec<PathToken>),
}

/// One element of a [`PathSpec::Segments`] list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PathToken {
    Index(usize),
    Key(String),
}

impl PathSpec {
    pub fn to_path(&self) -> Path {
        match self {
            PathSpec::Text(s) => Path::parse_directive(s),
            PathSpec::Segments(tokens) => tokens
                .iter()
                .map(|t| match t {
                    PathToken::Index(i) => Segment::Index(*i),
                    PathToken::Key(k) => Segment::Key(k.clone()),
                })
                .collect(),
        }
    }
}

/// Options of the `Page` directive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PageDirective {
    /// Child property whose value is used as the page's display name.
    pub name_from_prop: Option<PathSpec>,
    /// Child property (sub type `Color`) whose value colors the page.
    pub color_from_prop: Option<PathSpec>,
}

/// Options of the `PageGroup` directive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PageGroupDirective {
    /// Property of each entry renamed on duplication. Falls back to the
    /// entry page's `nameFromProp`.
    pub name_from_prop: Option<PathSpec>,
}

/// Semantic refinements of string properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum StringSubType {
    /// Self-generated identifier, hidden from renderers.
    Id,
    Color,
    Emoji,
    /// Generated secret key.
    KeyGen,
    Multiline,
    Rich,
    Icon,
}

/// Options of the `Prop` directive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PropDirective {
    pub sub_type: Option<StringSubType>,
    /// Store `false` as an absent value.
    pub false_as_undefined: bool,
    /// String property whose slugified value this property mirrors until
    /// edited by hand.
    pub slug_from: Option<PathSpec>,
    /// Display names for `enum` values, index-aligned.
    pub enum_names: Option<Vec<String>>,
}

fn default_id_prop() -> String {
    "id".to_string()
}

fn default_display_prop() -> String {
    "name".to_string()
}

/// Options of the `PropLink` directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkDirective {
    /// Collection of link targets. May contain the `<$>` filter variable.
    pub link_path: PathSpec,
    #[serde(default = "default_id_prop")]
    pub id_prop_name: String,
    #[serde(default = "default_display_prop")]
    pub display_prop_name: String,
    #[serde(default)]
    pub color_prop_name: Option<String>,
    /// Whether `create(name)` may add new targets.
    #[serde(default)]
    pub allow_create: bool,
    /// Link, link-multi or string-array property holding the filter ids.
    #[serde(default)]
    pub filter_path: Option<PathSpec>,
    /// Id field on each filter-collection entry matched against the filter.
    #[serde(default)]
    pub filter_id_prop_name: Option<String>,
    #[serde(default)]
    pub filter_show_all_if_none: bool,
}

/// One entry of the `AdditionalProps` directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalProp {
    /// Where the property lives, relative to the owner. May contain `<&>`.
    pub prop_path: PathSpec,
    /// Sibling id property whose value replaces `<&>`.
    #[serde(default)]
    pub dynamic_id_prop_name: Option<String>,
}

/// Either `true`/`false` or a directive payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Toggle<T> {
    Flag(bool),
    Config(T),
}

/// Every directive key a schema node may carry.
///
/// Its JSON schema is published through [`directive_schema`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Directives {
    #[serde(rename = "Page", default)]
    pub page: Option<Toggle<PageDirective>>,
    #[serde(rename = "PageGroup", default)]
    pub page_group: Option<Toggle<PageGroupDirective>>,
    #[serde(rename = "Prop", default)]
    pub prop: Option<PropDirective>,
    #[serde(rename = "PropLink", default)]
    pub prop_link: Option<LinkDirective>,
    #[serde(rename = "Hide", default)]
    pub hide: Option<bool>,
    #[serde(rename = "AdditionalProps", default)]
    pub additional_props: Option<Vec<AdditionalProp>>,
}

fn toggle<T: DeserializeOwned + Default>(
    schema: &Value,
    key: &str,
    path: &Path,
) -> Result<Option<T>> {
    match schema.get(key) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Bool(true)) => Ok(Some(T::default())),
        Some(v) => parse(v, key, path).map(Some),
    }
}

fn parse<T: DeserializeOwned>(value: &Value, key: &str, path: &Path) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|e| Error::InvalidDirective {
        path: path.to_string(),
        directive: key.to_string(),
        reason: e.to_string(),
    })
}

/// `Page` directive of `schema`, if present.
pub fn page(schema: &Value, path: &Path) -> Result<Option<PageDirective>> {
    toggle(schema, PAGE, path)
}

/// `PageGroup` directive of `schema`, if present.
pub fn page_group(schema: &Value, path: &Path) -> Result<Option<PageGroupDirective>> {
    toggle(schema, PAGE_GROUP, path)
}

/// `Prop` directive of `schema`, defaulted when absent.
pub fn prop(schema: &Value, path: &Path) -> Result<PropDirective> {
    match schema.get(PROP) {
        None | Some(Value::Null) => Ok(PropDirective::default()),
        Some(v) => parse(v, PROP, path),
    }
}

/// Whether `schema` carries a `PropLink` directive. The payload itself is
/// parsed by [`link`] when options are first requested.
pub fn has_link(schema: &Value) -> bool {
    schema.get(PROP_LINK).is_some_and(|v| !v.is_null())
}

pub fn link(schema: &Value, path: &Path) -> Result<LinkDirective> {
    match schema.get(PROP_LINK) {
        Some(v) => parse(v, PROP_LINK, path).map_err(|e| Error::link_config(path, e.to_string())),
        None => Err(Error::link_config(path, "missing `PropLink` directive")),
    }
}

pub fn hide(schema: &Value) -> bool {
    schema.get(HIDE).and_then(Value::as_bool).unwrap_or(false)
}

pub fn additional_props(schema: &Value, path: &Path) -> Result<Vec<AdditionalProp>> {
    match schema.get(ADDITIONAL_PROPS) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => parse(v, ADDITIONAL_PROPS, path),
    }
}

/// JSON schema describing the directive vocabulary.
pub fn directive_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(Directives)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::path;

    #[test]
    fn test_page_toggle() {
        let p = Path::root();
        assert_eq!(page(&json!({"Page": true}), &p).unwrap(), Some(PageDirective::default()));
        assert_eq!(page(&json!({"type": "object"}), &p).unwrap(), None);
        let d = page(&json!({"Page": {"nameFromProp": "title"}}), &p)
            .unwrap()
            .unwrap();
        assert_eq!(d.name_from_prop.unwrap().to_path(), path!["title"]);
    }

    #[test]
    fn test_link_defaults() {
        let d = link(&json!({"PropLink": {"linkPath": "../../tags"}}), &Path::root()).unwrap();
        assert_eq!(d.id_prop_name, "id");
        assert_eq!(d.display_prop_name, "name");
        assert_eq!(d.link_path.to_path(), path!["..", "..", "tags"]);
        assert!(!d.allow_create);
    }

    #[test]
    fn test_broken_link_is_config_error() {
        let err = link(&json!({"PropLink": {"idPropName": "id"}}), &path!["x"]).unwrap_err();
        assert!(matches!(err, Error::LinkConfig { .. }));
    }

    #[test]
    fn test_prop_sub_type() {
        let d = prop(&json!({"Prop": {"subType": "Id"}}), &Path::root()).unwrap();
        assert_eq!(d.sub_type, Some(StringSubType::Id));
        let bad = prop(&json!({"Prop": {"subType": "Nope"}}), &Path::root());
        assert!(matches!(bad, Err(Error::InvalidDirective { .. })));
    }

    #[test]
    fn test_directive_schema_lists_keys() {
        let schema = directive_schema();
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("PropLink"));
        assert!(props.contains_key("AdditionalProps"));
    }
}
