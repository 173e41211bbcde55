//! Properties: the leaves and inline containers of the tree.
//!
//! A [`Property`] is built from its normalized schema; [`PropertyKind`]
//! carries the constraints of each variant and decides which operations
//! are available. Links and slugs keep subscriptions on the nodes they
//! read from and release them when the property is dropped.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
    sync::LazyLock,
};

use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    cache::ResolveDepth,
    data::{
        additional,
        directives::{self, AdditionalProp, LinkDirective, StringSubType},
        link::{self, LinkOption},
        schema::{self, EnumOption},
        seq,
        types::{
            NodeBase, REQUIRED_VALUE, Setting, SettingNode, SettingType, notify_change, presence,
            presence_request,
        },
    },
    editor::EditorInner,
    error::{Error, Result},
    observer::Subscription,
    path::{FILTER_VARIABLE, Path},
};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]+$").unwrap());

/// String constraints and refinements.
#[derive(Debug, Clone, Default)]
pub struct StringProp {
    /// Refinement such as `Id`, `Color` or `Textarea`.
    pub sub_type: Option<StringSubType>,
    /// Minimum length in characters.
    pub min_length: Option<usize>,
    /// Maximum length in characters.
    pub max_length: Option<usize>,
    /// Compiled `pattern` keyword.
    pub pattern: Option<Regex>,
    /// `format` keyword; `email` and `uri` are checked.
    pub format: Option<String>,
    /// Source property mirrored through `slugify`.
    pub slug_from: Option<Path>,
}

/// Numeric bounds shared by Number and Integer.
#[derive(Debug, Clone, Default)]
pub struct NumberProp {
    /// Inclusive lower bound.
    pub minimum: Option<f64>,
    /// Inclusive upper bound.
    pub maximum: Option<f64>,
    /// Exclusive lower bound.
    pub exclusive_minimum: Option<f64>,
    /// Exclusive upper bound.
    pub exclusive_maximum: Option<f64>,
}

/// Boolean refinements.
#[derive(Debug, Clone, Default)]
pub struct BooleanProp {
    /// `false` is stored as absence.
    pub false_as_undefined: bool,
}

/// A closed set of string choices.
#[derive(Debug, Clone)]
pub struct EnumProp {
    /// Choices in schema order, with their display names.
    pub options: Vec<EnumOption>,
}

/// Link configuration. A malformed directive is kept as its error and
/// reported when the options are requested.
#[derive(Debug, Clone)]
pub struct LinkProp {
    directive: Result<LinkDirective>,
}

impl LinkProp {
    /// The parsed `PropLink` directive, or the error it failed with.
    pub fn directive(&self) -> Result<&LinkDirective> {
        self.directive.as_ref().map_err(Clone::clone)
    }

    /// Whether new target entries may be created from this link.
    pub fn allow_create(&self) -> bool {
        self.directive.as_ref().is_ok_and(|d| d.allow_create)
    }
}

/// Array constraints.
#[derive(Debug, Clone, Default)]
pub struct ArrayProp {
    /// Minimum number of items.
    pub min_items: Option<usize>,
    /// Maximum number of items.
    pub max_items: Option<usize>,
    /// Items must be pairwise distinct.
    pub unique_items: bool,
}

/// Inline object with fixed properties.
#[derive(Debug, Clone, Default)]
pub struct ObjectProp;

/// Object keyed by arbitrary strings (`additionalProperties`).
#[derive(Debug, Clone, Default)]
pub struct DictProp {
    /// Minimum number of entries.
    pub min_properties: Option<usize>,
    /// Maximum number of entries.
    pub max_properties: Option<usize>,
}

/// Variant-specific part of a [`Property`].
#[derive(Debug, Clone)]
pub enum PropertyKind {
    /// Free text.
    String(StringProp),
    /// Single reference to a target entry id.
    Link(LinkProp),
    /// Array of references to target entry ids.
    LinkMulti(LinkProp),
    /// Floating point number.
    Number(NumberProp),
    /// Whole number.
    Integer(NumberProp),
    /// `true` or `false`.
    Boolean(BooleanProp),
    /// One of a fixed set of strings.
    Enum(EnumProp),
    /// Inline array of values.
    Array(ArrayProp),
    /// Inline object.
    Object(ObjectProp),
    /// String-keyed map.
    Dict(DictProp),
}

impl PropertyKind {
    /// Pick the variant for a normalized property schema.
    pub(crate) fn from_schema(sub: &Value, path: &Path) -> Result<Self> {
        let ty = schema::schema_type(sub);
        let prop = directives::prop(sub, path)?;

        if directives::has_link(sub) {
            let link = LinkProp {
                directive: directives::link(sub, path),
            };
            return match ty {
                Some("string") => Ok(PropertyKind::Link(link)),
                Some("array") => Ok(PropertyKind::LinkMulti(link)),
                other => Err(Error::UnsupportedSchema {
                    path: path.to_string(),
                    reason: format!("PropLink on {}", other.unwrap_or("untyped schema")),
                }),
            };
        }

        // enum choices are strings; numeric enums keep their numeric kind
        if matches!(ty, Some("string") | None)
            && let Some(options) = schema::enum_options(sub)
        {
            return Ok(PropertyKind::Enum(EnumProp { options }));
        }

        match ty {
            Some("string") => {
                let pattern = match sub.get("pattern").and_then(Value::as_str) {
                    Some(p) => Some(Regex::new(p).map_err(|e| Error::InvalidDirective {
                        path: path.to_string(),
                        directive: "pattern".into(),
                        reason: e.to_string(),
                    })?),
                    None => None,
                };
                Ok(PropertyKind::String(StringProp {
                    sub_type: prop.sub_type,
                    min_length: schema::count(sub, "minLength"),
                    max_length: schema::count(sub, "maxLength"),
                    pattern,
                    format: sub.get("format").and_then(Value::as_str).map(str::to_string),
                    slug_from: prop.slug_from.as_ref().map(|s| s.to_path()),
                }))
            }
            Some(t @ ("number" | "integer")) => {
                let bounds = NumberProp {
                    minimum: schema::number(sub, "minimum"),
                    maximum: schema::number(sub, "maximum"),
                    exclusive_minimum: schema::number(sub, "exclusiveMinimum"),
                    exclusive_maximum: schema::number(sub, "exclusiveMaximum"),
                };
                Ok(if t == "integer" {
                    PropertyKind::Integer(bounds)
                } else {
                    PropertyKind::Number(bounds)
                })
            }
            Some("boolean") => Ok(PropertyKind::Boolean(BooleanProp {
                false_as_undefined: prop.false_as_undefined,
            })),
            Some("array") => Ok(PropertyKind::Array(ArrayProp {
                min_items: schema::count(sub, "minItems"),
                max_items: schema::count(sub, "maxItems"),
                unique_items: sub.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false),
            })),
            Some("object") if schema::is_dict(sub) => Ok(PropertyKind::Dict(DictProp {
                min_properties: schema::count(sub, "minProperties"),
                max_properties: schema::count(sub, "maxProperties"),
            })),
            Some("object") => Ok(PropertyKind::Object(ObjectProp)),
            other => Err(Error::UnsupportedSchema {
                path: path.to_string(),
                reason: format!("unsupported type {}", other.unwrap_or("(none)")),
            }),
        }
    }

    /// Public type tag of this variant.
    pub fn setting_type(&self) -> SettingType {
        match self {
            PropertyKind::String(_) => SettingType::String,
            PropertyKind::Link(_) => SettingType::Link,
            PropertyKind::LinkMulti(_) => SettingType::LinkMulti,
            PropertyKind::Number(_) => SettingType::Number,
            PropertyKind::Integer(_) => SettingType::Integer,
            PropertyKind::Boolean(_) => SettingType::Boolean,
            PropertyKind::Enum(_) => SettingType::Enum,
            PropertyKind::Array(_) => SettingType::Array,
            PropertyKind::Object(_) => SettingType::Object,
            PropertyKind::Dict(_) => SettingType::Dict,
        }
    }

    fn link(&self) -> Option<&LinkProp> {
        match self {
            PropertyKind::Link(l) | PropertyKind::LinkMulti(l) => Some(l),
            _ => None,
        }
    }
}

#[derive(Default)]
struct LinkState {
    options: RefCell<Option<Vec<LinkOption>>>,
    dependencies: RefCell<Vec<Subscription>>,
}

#[derive(Default)]
struct SlugState {
    previous: RefCell<Option<String>>,
    subscription: RefCell<Option<Subscription>>,
}

impl Drop for LinkState {
    fn drop(&mut self) {
        for sub in self.dependencies.get_mut().drain(..) {
            sub.unsubscribe();
        }
    }
}

impl Drop for SlugState {
    fn drop(&mut self) {
        if let Some(sub) = self.subscription.get_mut().take() {
            sub.unsubscribe();
        }
    }
}

struct PropertyNode {
    base: NodeBase,
    kind: PropertyKind,
    additional: Vec<AdditionalProp>,
    children: RefCell<Option<Vec<Property>>>,
    link: LinkState,
    slug: SlugState,
}

/// A leaf value or a non-page container (array, object, dictionary).
#[derive(Clone)]
pub struct Property(Rc<PropertyNode>);

/// What a `set` call turns into.
enum Write {
    Keep,
    Put(Option<Value>),
}

impl Property {
    pub(crate) fn new(base: NodeBase, kind: PropertyKind, additional: Vec<AdditionalProp>) -> Self {
        Self(Rc::new(PropertyNode {
            base,
            kind,
            additional,
            children: RefCell::new(None),
            link: LinkState::default(),
            slug: SlugState::default(),
        }))
    }

    fn weak(&self) -> Weak<PropertyNode> {
        Rc::downgrade(&self.0)
    }

    /// Second construction phase: attach behaviour that needs the handle.
    pub(crate) fn bind(&self, editor: &EditorInner) {
        if self.0.kind.link().is_some() {
            let weak = self.weak();
            editor.defer(move || {
                if let Some(node) = weak.upgrade() {
                    Property(node).revalidate();
                }
            });
        } else {
            self.refresh_error();
        }
        if let PropertyKind::String(StringProp {
            slug_from: Some(_), ..
        }) = &self.0.kind
        {
            let weak = self.weak();
            editor.defer(move || {
                if let Some(node) = weak.upgrade() {
                    Property(node).bind_slug();
                }
            });
        }
    }

    /// Variant and constraints.
    pub fn kind(&self) -> &PropertyKind {
        &self.0.kind
    }

    /// String refinement, `None` for other kinds.
    pub fn sub_type(&self) -> Option<StringSubType> {
        match &self.0.kind {
            PropertyKind::String(s) => s.sub_type,
            _ => None,
        }
    }

    /// Choices of an Enum.
    pub fn enum_options(&self) -> Option<&[EnumOption]> {
        match &self.0.kind {
            PropertyKind::Enum(e) => Some(&e.options),
            _ => None,
        }
    }

    pub fn allow_create(&self) -> bool {
        self.0.kind.link().is_some_and(LinkProp::allow_create)
    }

    /// Current value when it is a string.
    pub fn value_str(&self) -> Option<String> {
        match self.0.base.raw_value() {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Current value when it is a number.
    pub fn value_f64(&self) -> Option<f64> {
        self.0.base.raw_value().and_then(|v| v.as_f64())
    }

    /// Current value when it is a boolean.
    pub fn value_bool(&self) -> Option<bool> {
        self.0.base.raw_value().and_then(|v| v.as_bool())
    }

    /// Selected ids of a link, or the string entries of an array.
    pub fn value_ids(&self) -> Vec<String> {
        match self.0.base.raw_value() {
            Some(Value::String(s)) => vec![s],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn unsupported(&self, op: &str) -> Error {
        Error::unsupported(self.path(), op)
    }

    /// Child properties of an Array, Object or Dict. Absent containers have
    /// none.
    pub fn child_properties(&self) -> Result<Vec<Property>> {
        if let Some(children) = self.0.children.borrow().as_ref() {
            return Ok(children.clone());
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let path = self.path();
        let raw = self.0.base.raw_value();

        let child_paths: Vec<Path> = match (&self.0.kind, &raw) {
            (PropertyKind::Object(_), Some(_)) => schema::property_keys(self.0.base.schema())
                .into_iter()
                .map(|k| path.child(k))
                .collect(),
            (PropertyKind::Array(_), Some(Value::Array(items))) => {
                (0..items.len()).map(|i| path.child(i)).collect()
            }
            (PropertyKind::Dict(_), Some(Value::Object(map))) => {
                map.keys().map(|k| path.child(k.as_str())).collect()
            }
            (PropertyKind::Array(_) | PropertyKind::Object(_) | PropertyKind::Dict(_), _) => {
                Vec::new()
            }
            _ => return Ok(Vec::new()),
        };

        let mut children = Vec::with_capacity(child_paths.len());
        for child in &child_paths {
            match editor.get(child, ResolveDepth::None)? {
                Setting::Property(p) => children.push(p),
                other => debug!("skipping {} at `{child}` below a property", other.setting_type()),
            }
        }
        if raw.is_some() && !self.0.additional.is_empty() {
            children.extend(additional::resolve(&editor, path, &self.0.additional)?);
        }
        *self.0.children.borrow_mut() = Some(children.clone());
        Ok(children)
    }

    pub(crate) fn reset_memo(&self) {
        self.0.children.borrow_mut().take();
    }

    /// Recompute `error_msg`; returns whether it changed.
    pub(crate) fn refresh_error(&self) -> bool {
        match self.validate() {
            Ok(msg) => self.0.base.set_error(msg),
            Err(e) => {
                warn!("cannot validate `{}`: {e}", self.path());
                false
            }
        }
    }

    /// Deferred re-check; notifies only when the message changed.
    fn revalidate(&self) {
        if self.refresh_error() {
            self.0.base.notify();
        }
    }

    fn validate(&self) -> Result<Option<String>> {
        let base = &self.0.base;
        let raw = base.raw_value();
        let missing = match (&self.0.kind, &raw) {
            (_, None) => true,
            (PropertyKind::String(_) | PropertyKind::Link(_), Some(Value::String(s))) => s.is_empty(),
            (PropertyKind::LinkMulti(_), Some(Value::Array(ids))) => ids.is_empty(),
            _ => false,
        };
        if missing {
            let optional_false = matches!(
                &self.0.kind,
                PropertyKind::Boolean(BooleanProp { false_as_undefined: true })
            );
            return Ok((base.required() && !optional_false).then(|| REQUIRED_VALUE.to_string()));
        }
        let Some(value) = raw else {
            return Ok(None);
        };

        let msg = match &self.0.kind {
            PropertyKind::String(s) => value.as_str().and_then(|v| validate_string(s, v)),
            PropertyKind::Number(n) => value.as_f64().and_then(|v| validate_number(n, v)),
            PropertyKind::Integer(n) => value.as_f64().and_then(|v| {
                if v.fract() != 0.0 {
                    Some("Must be a whole number".to_string())
                } else {
                    validate_number(n, v)
                }
            }),
            PropertyKind::Boolean(_) => None,
            PropertyKind::Enum(e) => {
                let known = value
                    .as_str()
                    .is_some_and(|v| e.options.iter().any(|o| o.value == v));
                (!known).then(|| "Invalid option".to_string())
            }
            PropertyKind::Link(_) | PropertyKind::LinkMulti(_) => {
                let options = self.options()?;
                let dangling = self
                    .value_ids()
                    .iter()
                    .any(|id| !options.iter().any(|o| &o.id == id));
                dangling.then(|| "Invalid reference".to_string())
            }
            PropertyKind::Array(a) => value.as_array().and_then(|items| validate_array(a, items)),
            PropertyKind::Object(_) => None,
            PropertyKind::Dict(d) => value.as_object().and_then(|map| {
                let len = map.len();
                match (d.min_properties, d.max_properties) {
                    (Some(min), _) if len < min => Some(format!("Minimum {min} entries")),
                    (_, Some(max)) if len > max => Some(format!("Maximum {max} entries")),
                    _ => None,
                }
            }),
        };
        Ok(msg)
    }

    /// Translate a `set` request into a document write.
    fn accept(&self, editor: &EditorInner, value: Option<Value>) -> Result<Write> {
        let base = &self.0.base;
        let kind = &self.0.kind;
        if self.setting_type().is_container() {
            if !presence_request(base, value)? {
                return Ok(Write::Put(None));
            }
            if base.raw_value().is_some() {
                return Ok(Write::Keep);
            }
            let initial = schema::default_value(base.schema(), &editor.schema, true).unwrap_or_else(
                || match kind {
                    PropertyKind::Array(_) => Value::Array(Vec::new()),
                    _ => Value::Object(Map::new()),
                },
            );
            return Ok(Write::Put(Some(initial)));
        }

        let Some(value) = value else {
            if base.required() {
                return Err(base.required_error());
            }
            return Ok(Write::Put(None));
        };
        let ok = match (kind, &value) {
            (PropertyKind::Boolean(b), Value::Bool(false)) if b.false_as_undefined => {
                return Ok(Write::Put(None));
            }
            (PropertyKind::Boolean(_), Value::Bool(_)) => true,
            (PropertyKind::String(_) | PropertyKind::Link(_) | PropertyKind::Enum(_), Value::String(_)) => true,
            (PropertyKind::Number(_) | PropertyKind::Integer(_), Value::Number(_)) => true,
            (PropertyKind::LinkMulti(_), Value::Array(ids)) => {
                if !ids.iter().all(Value::is_string) {
                    false
                } else {
                    let mut unique: Vec<Value> = Vec::with_capacity(ids.len());
                    for id in ids {
                        if !unique.contains(id) {
                            unique.push(id.clone());
                        }
                    }
                    return Ok(Write::Put(Some(Value::Array(unique))));
                }
            }
            _ => false,
        };
        if !ok {
            return Err(Error::invalid_value(
                self.path(),
                format!("{value} is not a valid {}", self.setting_type()),
            ));
        }
        Ok(Write::Put(Some(value)))
    }

    /// Bookkeeping after this property's value was written.
    fn changed(&self, editor: &EditorInner) {
        self.refresh_error();
        notify_change(editor, &self.0.base);
    }

    /// Run an array edit at this property's path, then notify.
    fn edit<T>(&self, op: &str, f: impl FnOnce(&EditorInner, &Path) -> Result<T>) -> Result<T> {
        if !matches!(self.0.kind, PropertyKind::Array(_)) {
            return Err(self.unsupported(op));
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let out = f(&editor, self.path())?;
        self.changed(&editor);
        Ok(out)
    }

    /// Insert a placeholder entry at `index` (append on `None`).
    pub fn insert(&self, index: Option<usize>) -> Result<usize> {
        self.edit("insert", |editor, path| seq::insert(editor, path, index))
    }

    /// Deep copy of entry `index` with fresh ids, placed after it.
    pub fn duplicate(&self, index: usize) -> Result<usize> {
        self.edit("duplicate", |editor, path| seq::duplicate(editor, path, index, None))
    }

    /// Swap entry `index` with its predecessor; a no-op at the front.
    pub fn move_up(&self, index: usize) -> Result<()> {
        self.edit("move_up", |editor, path| seq::move_up(editor, path, index).map(drop))
    }

    /// Swap entry `index` with its successor; a no-op at the back.
    pub fn move_down(&self, index: usize) -> Result<()> {
        self.edit("move_down", |editor, path| seq::move_down(editor, path, index).map(drop))
    }

    /// Remove entry `index`.
    pub fn delete(&self, index: usize) -> Result<()> {
        self.edit("delete", |editor, path| seq::delete(editor, path, index))
    }

    /// Add dictionary entry `key` with its default value. Existing keys are
    /// left untouched.
    pub fn put(&self, key: &str) -> Result<()> {
        if !matches!(self.0.kind, PropertyKind::Dict(_)) {
            return Err(self.unsupported("put"));
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let entry = self.path().child(key);
        if editor.value_at(&entry).is_some() {
            return Ok(());
        }
        let entry_schema = editor.schema_at(&entry)?;
        editor.write(&entry, Some(schema::placeholder_value(&entry_schema, &editor.schema)))?;
        self.changed(&editor);
        Ok(())
    }

    /// Remove dictionary entry `key`.
    pub fn delete_key(&self, key: &str) -> Result<()> {
        if !matches!(self.0.kind, PropertyKind::Dict(_)) {
            return Err(self.unsupported("delete_key"));
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        editor.write(&self.path().child(key), None)?;
        self.changed(&editor);
        Ok(())
    }

    /// Add `id` to a link list; already selected ids are ignored.
    pub fn insert_id(&self, id: &str) -> Result<()> {
        if !matches!(self.0.kind, PropertyKind::LinkMulti(_)) {
            return Err(self.unsupported("insert_id"));
        }
        let mut ids = self.value_ids();
        if ids.iter().any(|i| i == id) {
            return Ok(());
        }
        ids.push(id.to_string());
        self.set(Some(Value::from(ids)))
    }

    /// Remove `id` from a link list.
    pub fn delete_id(&self, id: &str) -> Result<()> {
        if !matches!(self.0.kind, PropertyKind::LinkMulti(_)) {
            return Err(self.unsupported("delete_id"));
        }
        let ids: Vec<String> = self.value_ids().into_iter().filter(|i| i != id).collect();
        if ids.is_empty() && !self.required() {
            self.set(None)
        } else {
            self.set(Some(Value::from(ids)))
        }
    }

    fn link_directive(&self) -> Result<&LinkDirective> {
        match self.0.kind.link() {
            Some(link) => link.directive(),
            None => Err(self.unsupported("options")),
        }
    }

    /// Selectable targets of a Link or LinkMulti, cached until one of the
    /// inspected settings changes.
    pub fn options(&self) -> Result<Vec<LinkOption>> {
        let directive = self.link_directive()?;
        if let Some(cached) = self.0.link.options.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let resolved = link::resolve(&editor, self.path(), directive)?;
        self.watch(resolved.dependencies);
        *self.0.link.options.borrow_mut() = Some(resolved.options.clone());
        Ok(resolved.options)
    }

    /// Replace the dependency subscriptions of the cached options.
    fn watch(&self, dependencies: Vec<Setting>) {
        let old = std::mem::take(&mut *self.0.link.dependencies.borrow_mut());
        for sub in old {
            sub.unsubscribe();
        }
        let subs: Vec<Subscription> = dependencies
            .iter()
            .map(|dep| {
                let weak = self.weak();
                dep.subscribe(move || {
                    if let Some(node) = weak.upgrade() {
                        Property(node).dependency_changed();
                    }
                })
            })
            .collect();
        *self.0.link.dependencies.borrow_mut() = subs;
    }

    fn dependency_changed(&self) {
        if self.0.link.options.borrow_mut().take().is_none() {
            return;
        }
        trace!("link `{}` options invalidated", self.path());
        let Ok(editor) = self.0.base.editor() else {
            return;
        };
        let weak = self.weak();
        editor.defer(move || {
            if let Some(node) = weak.upgrade() {
                Property(node).revalidate();
            }
        });
    }

    /// Append a new target entry named `name` and select it.
    ///
    /// Returns the id of the created entry.
    pub fn create(&self, name: &str) -> Result<String> {
        let directive = self.link_directive()?;
        let path = self.path();
        if !directive.allow_create {
            return Err(Error::link_config(path, "creating targets is not allowed"));
        }
        let collection = directive.link_path.to_path().expand_relative(path);
        if collection.contains_marker(FILTER_VARIABLE) {
            return Err(Error::link_config(path, "cannot create through a filtered link"));
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();

        let entry = match editor.get(&collection, ResolveDepth::None)? {
            Setting::PageGroup(group) => collection.child(group.insert(None)?),
            Setting::Property(prop) if prop.setting_type() == SettingType::Array => {
                collection.child(prop.insert(None)?)
            }
            other => {
                return Err(Error::link_config(
                    path,
                    format!("link target `{collection}` is a {}", other.setting_type()),
                ));
            }
        };
        editor
            .get(&entry.child(directive.display_prop_name.as_str()), ResolveDepth::None)?
            .set(Some(Value::String(name.to_string())))?;
        let id_prop = editor
            .get(&entry.child(directive.id_prop_name.as_str()), ResolveDepth::None)?
            .into_property()?;
        if id_prop.value_str().is_none() {
            id_prop.set_default()?;
        }
        let id = id_prop
            .value_str()
            .ok_or_else(|| Error::link_config(path, "created target has no id"))?;
        debug!("created link target `{id}` under `{collection}`");

        match self.0.kind {
            PropertyKind::LinkMulti(_) => self.insert_id(&id)?,
            _ => self.set(Some(Value::String(id.clone())))?,
        }
        Ok(id)
    }

    fn slug_source(&self) -> Option<Path> {
        match &self.0.kind {
            PropertyKind::String(StringProp {
                slug_from: Some(from),
                ..
            }) => Some(from.expand_relative(self.path())),
            _ => None,
        }
    }

    fn bind_slug(&self) {
        let Some(source_path) = self.slug_source() else {
            return;
        };
        let source = self
            .0
            .base
            .editor()
            .and_then(|e| e.get(&source_path, ResolveDepth::None))
            .and_then(Setting::into_property);
        let source = match source {
            Ok(s) => s,
            Err(e) => {
                warn!("slug source of `{}` unavailable: {e}", self.path());
                return;
            }
        };
        *self.0.slug.previous.borrow_mut() = source.value_str();
        let weak = self.weak();
        let sub = source.subscribe(move || {
            if let Some(node) = weak.upgrade() {
                Property(node).follow_slug_source();
            }
        });
        if let Some(old) = self.0.slug.subscription.borrow_mut().replace(sub) {
            old.unsubscribe();
        }
    }

    /// Mirror the slug source unless the slug was edited by hand.
    fn follow_slug_source(&self) {
        let Some(source_path) = self.slug_source() else {
            return;
        };
        let Ok(editor) = self.0.base.editor() else {
            return;
        };
        let next_source = editor.value_at(&source_path).and_then(|v| v.as_str().map(str::to_string));
        let previous = self.0.slug.previous.replace(next_source.clone());
        let current = self.value_str().unwrap_or_default();
        let following = current.is_empty()
            || previous.as_deref().map(slug::slugify).as_deref() == Some(current.as_str());
        if !following {
            return;
        }
        let next = next_source.map(slug::slugify).filter(|s| !s.is_empty());
        if next.as_deref().unwrap_or_default() == current {
            return;
        }
        let result = match next {
            Some(s) => self.set(Some(Value::String(s))),
            None if self.required() => Ok(()),
            None => self.set(None),
        };
        if let Err(e) = result {
            warn!("cannot update slug `{}`: {e}", self.path());
        }
    }
}

impl SettingNode for Property {
    fn base(&self) -> &NodeBase {
        &self.0.base
    }

    fn setting_type(&self) -> SettingType {
        self.0.kind.setting_type()
    }

    fn value(&self) -> Option<Value> {
        if self.setting_type().is_container() {
            presence(&self.0.base)
        } else {
            self.0.base.raw_value()
        }
    }

    fn set(&self, value: Option<Value>) -> Result<()> {
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        match self.accept(&editor, value)? {
            Write::Keep => Ok(()),
            Write::Put(v) => {
                editor.write(self.path(), v)?;
                self.changed(&editor);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("kind", &self.setting_type())
            .field("path", self.path())
            .field("value", &self.value())
            .finish()
    }
}

fn validate_string(s: &StringProp, value: &str) -> Option<String> {
    let len = value.chars().count();
    if let Some(min) = s.min_length
        && len < min
    {
        return Some(format!("Minimum length is {min}"));
    }
    if let Some(max) = s.max_length
        && len > max
    {
        return Some(format!("Maximum length is {max}"));
    }
    let format_ok = match s.format.as_deref() {
        Some("email") => EMAIL.is_match(value),
        Some("uri") => URI.is_match(value),
        _ => true,
    };
    if !format_ok || s.pattern.as_ref().is_some_and(|re| !re.is_match(value)) {
        return Some("Invalid format".to_string());
    }
    None
}

fn validate_number(n: &NumberProp, value: f64) -> Option<String> {
    let below = n.minimum.filter(|min| value < *min).or(n.exclusive_minimum.filter(|min| value <= *min));
    if let Some(min) = below {
        return Some(format!("Minimum value is {min}"));
    }
    let above = n.maximum.filter(|max| value > *max).or(n.exclusive_maximum.filter(|max| value >= *max));
    if let Some(max) = above {
        return Some(format!("Maximum value is {max}"));
    }
    None
}

fn validate_array(a: &ArrayProp, items: &[Value]) -> Option<String> {
    if let Some(min) = a.min_items
        && items.len() < min
    {
        return Some(format!("Minimum {min} items"));
    }
    if let Some(max) = a.max_items
        && items.len() > max
    {
        return Some(format!("Maximum {max} items"));
    }
    if a.unique_items
        && items
            .iter()
            .enumerate()
            .any(|(i, v)| items[..i].contains(v))
    {
        return Some("Items must be unique".to_string());
    }
    None
}
