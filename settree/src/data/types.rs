//! Setting kinds and the contract they share.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use serde_json::Value;

use crate::{
    data::{
        directives::{self, StringSubType},
        item::Property,
        menu::{Page, PageGroup},
        schema,
    },
    editor::EditorInner,
    error::{Error, Result},
    observer::{Observers, Subscription},
    path::Path,
};

/// Discriminant of a [`Setting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingType {
    Page,
    PageGroup,
    String,
    Link,
    LinkMulti,
    Number,
    Integer,
    Boolean,
    Enum,
    Array,
    Object,
    Dict,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Page => "page",
            SettingType::PageGroup => "pagegroup",
            SettingType::String => "string",
            SettingType::Link => "link",
            SettingType::LinkMulti => "linkmulti",
            SettingType::Number => "number",
            SettingType::Integer => "integer",
            SettingType::Boolean => "boolean",
            SettingType::Enum => "enum",
            SettingType::Array => "array",
            SettingType::Object => "object",
            SettingType::Dict => "dict",
        }
    }

    /// Whether the setting's value is a presence flag rather than content.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SettingType::Page
                | SettingType::PageGroup
                | SettingType::Array
                | SettingType::Object
                | SettingType::Dict
        )
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generated identifiers are never edited by hand.
fn is_id(schema: &Value, path: &Path) -> bool {
    directives::prop(schema, path).is_ok_and(|p| p.sub_type == Some(StringSubType::Id))
}

/// State shared by every setting.
pub struct NodeBase {
    key: String,
    path: Path,
    path_str: String,
    required: bool,
    schema: Value,
    hidden: Cell<bool>,
    error_msg: RefCell<Option<String>>,
    observers: Observers<()>,
    editor: Weak<EditorInner>,
}

impl NodeBase {
    pub(crate) fn new(editor: &Rc<EditorInner>, path: &Path, schema: Value, required: bool) -> Self {
        Self {
            key: schema::new_id(),
            path: path.clone(),
            path_str: editor.path_str(path),
            required,
            hidden: Cell::new(directives::hide(&schema) || is_id(&schema, path)),
            schema,
            error_msg: RefCell::new(None),
            observers: Observers::new(),
            editor: editor.weak(),
        }
    }

    pub(crate) fn editor(&self) -> Result<Rc<EditorInner>> {
        self.editor.upgrade().ok_or(Error::EditorDropped)
    }

    pub(crate) fn schema(&self) -> &Value {
        &self.schema
    }

    pub(crate) fn required(&self) -> bool {
        self.required
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
    }

    /// Store a new error message, returning whether it changed.
    pub(crate) fn set_error(&self, msg: Option<String>) -> bool {
        let mut current = self.error_msg.borrow_mut();
        if *current == msg {
            return false;
        }
        *current = msg;
        true
    }

    pub(crate) fn notify(&self) {
        trace!("notify `{}`", self.path);
        self.observers.notify(&());
    }

    /// Raw document value; `None` when the editor is gone or the value absent.
    pub(crate) fn raw_value(&self) -> Option<Value> {
        self.editor.upgrade().and_then(|e| e.value_at(&self.path))
    }

    pub(crate) fn required_error(&self) -> Error {
        Error::RequiredUnset {
            path: self.path.to_string(),
        }
    }
}

/// Behaviour common to pages, page groups and properties.
pub trait SettingNode {
    #[doc(hidden)]
    fn base(&self) -> &NodeBase;

    fn setting_type(&self) -> SettingType;

    /// Presence flag for containers, literal value for scalars.
    fn value(&self) -> Option<Value>;

    /// Write `value`; `None` removes it.
    fn set(&self, value: Option<Value>) -> Result<()>;

    /// Value written by [`set_default`](SettingNode::set_default).
    fn default_value(&self) -> Option<Value> {
        let base = self.base();
        let editor = base.editor.upgrade()?;
        schema::default_value(base.schema(), &editor.schema, base.required)
    }

    /// Write the default value. Required settings without one are left alone.
    fn set_default(&self) -> Result<()> {
        match self.default_value() {
            Some(v) => self.set(Some(v)),
            None if self.required() => Ok(()),
            None => self.set(None),
        }
    }

    /// Fresh random identity of this materialization.
    fn key(&self) -> &str {
        &self.base().key
    }

    fn path(&self) -> &Path {
        &self.base().path
    }

    fn path_str(&self) -> &str {
        &self.base().path_str
    }

    fn required(&self) -> bool {
        self.base().required
    }

    fn hidden(&self) -> bool {
        self.base().hidden.get()
    }

    fn title(&self) -> Option<String> {
        schema::title(self.base().schema())
    }

    fn description(&self) -> Option<String> {
        schema::description(self.base().schema())
    }

    /// Validation message from the last check, if invalid.
    fn error_msg(&self) -> Option<String> {
        self.base().error_msg.borrow().clone()
    }

    /// Register a callback fired after every mutation of this setting.
    fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.base().observers.subscribe(move |_| callback())
    }
}

/// Children of a page, split by kind.
#[derive(Clone, Default)]
pub struct Children {
    pub all: Vec<Setting>,
    pub pages: Vec<Page>,
    pub groups: Vec<PageGroup>,
    pub props: Vec<Property>,
}

impl Children {
    pub(crate) fn push(&mut self, setting: Setting) {
        match &setting {
            Setting::Page(p) => self.pages.push(p.clone()),
            Setting::PageGroup(g) => self.groups.push(g.clone()),
            Setting::Property(p) => self.props.push(p.clone()),
        }
        self.all.push(setting);
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// A materialized node of the tree.
#[derive(Clone)]
pub enum Setting {
    Page(Page),
    PageGroup(PageGroup),
    Property(Property),
}

impl Setting {
    fn node(&self) -> &dyn SettingNode {
        match self {
            Setting::Page(p) => p,
            Setting::PageGroup(g) => g,
            Setting::Property(p) => p,
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::TypeMismatch {
            path: self.path().to_string(),
            expected: expected.to_string(),
            actual: self.setting_type().to_string(),
        }
    }

    pub fn into_page(self) -> Result<Page> {
        match self {
            Setting::Page(p) => Ok(p),
            other => Err(other.mismatch("page")),
        }
    }

    pub fn into_page_group(self) -> Result<PageGroup> {
        match self {
            Setting::PageGroup(g) => Ok(g),
            other => Err(other.mismatch("pagegroup")),
        }
    }

    pub fn into_property(self) -> Result<Property> {
        match self {
            Setting::Property(p) => Ok(p),
            other => Err(other.mismatch("property")),
        }
    }

    pub fn as_page(&self) -> Option<&Page> {
        match self {
            Setting::Page(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_page_group(&self) -> Option<&PageGroup> {
        match self {
            Setting::PageGroup(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&Property> {
        match self {
            Setting::Property(p) => Some(p),
            _ => None,
        }
    }

    /// Direct descendants, used for eager resolution.
    pub fn child_settings(&self) -> Result<Vec<Setting>> {
        match self {
            Setting::Page(p) => Ok(p.children()?.all),
            Setting::PageGroup(g) => Ok(g.child_pages()?.into_iter().map(Setting::Page).collect()),
            Setting::Property(p) => Ok(p
                .child_properties()?
                .into_iter()
                .map(Setting::Property)
                .collect()),
        }
    }

    /// Drop memoized children (and labels sourced below `written`) after a
    /// write at or below this setting.
    pub(crate) fn reset_memo(&self, written: &Path) {
        match self {
            Setting::Page(p) => p.reset_memo(written),
            Setting::PageGroup(g) => g.reset_memo(),
            Setting::Property(p) => p.reset_memo(),
        }
    }

    pub(crate) fn refresh_error(&self) {
        match self {
            Setting::Page(p) => {
                p.refresh_error();
            }
            Setting::PageGroup(g) => {
                g.refresh_error();
            }
            Setting::Property(p) => {
                p.refresh_error();
            }
        }
    }

    pub(crate) fn notify_local(&self) {
        self.base().notify();
    }
}

impl From<Page> for Setting {
    fn from(page: Page) -> Self {
        Setting::Page(page)
    }
}

impl From<PageGroup> for Setting {
    fn from(group: PageGroup) -> Self {
        Setting::PageGroup(group)
    }
}

impl From<Property> for Setting {
    fn from(prop: Property) -> Self {
        Setting::Property(prop)
    }
}

impl SettingNode for Setting {
    fn base(&self) -> &NodeBase {
        self.node().base()
    }

    fn setting_type(&self) -> SettingType {
        self.node().setting_type()
    }

    fn value(&self) -> Option<Value> {
        self.node().value()
    }

    fn set(&self, value: Option<Value>) -> Result<()> {
        self.node().set(value)
    }

    fn default_value(&self) -> Option<Value> {
        self.node().default_value()
    }

    fn set_default(&self) -> Result<()> {
        self.node().set_default()
    }
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("type", &self.setting_type())
            .field("path", self.path())
            .field("value", &self.value())
            .field("error", &self.error_msg())
            .finish()
    }
}

/// Message recorded when a required value is absent.
pub const REQUIRED_VALUE: &str = "Required value";

/// Shared presence-flag semantics for container settings.
///
/// `Some(true)` enables, `None`/`Some(false)` disables.
pub(crate) fn presence_request(base: &NodeBase, value: Option<Value>) -> Result<bool> {
    match value {
        None | Some(Value::Bool(false)) | Some(Value::Null) => {
            if base.required {
                Err(base.required_error())
            } else {
                Ok(false)
            }
        }
        Some(Value::Bool(true)) => Ok(true),
        Some(other) => Err(Error::invalid_value(
            &base.path,
            format!("expected a presence flag, got {other}"),
        )),
    }
}

/// Presence flag of a container value.
pub(crate) fn presence(base: &NodeBase) -> Option<Value> {
    base.raw_value().map(|_| Value::Bool(true))
}

/// Notify after a setting's own value was written and its error refreshed:
/// local observers, then the parent's constraints, then global observers.
pub(crate) fn notify_change(editor: &EditorInner, base: &NodeBase) {
    base.notify();
    if let Some(parent) = base.path.parent()
        && let Some(setting) = editor.cached(&parent)
    {
        setting.refresh_error();
    }
    editor.notify(&base.path);
}
