//! Pages and page groups: the navigable structure of the tree.
//!
//! A [`Page`] is an object rendered as its own screen. A [`PageGroup`] is an
//! array whose entries are pages, with list editing (insert, duplicate,
//! reorder, delete).

use std::{cell::RefCell, fmt, rc::Rc};

use serde_json::{Map, Value};

use crate::{
    cache::ResolveDepth,
    data::{
        additional,
        directives::{self, AdditionalProp, PageDirective, PageGroupDirective, PathSpec},
        schema, seq,
        types::{
            Children, NodeBase, REQUIRED_VALUE, SettingNode, SettingType, notify_change, presence,
            presence_request,
        },
    },
    editor::EditorInner,
    error::Result,
    observer::Subscription,
    path::Path,
};

/// A memoized label read from a child property.
#[derive(Default)]
struct Label {
    value: RefCell<Option<Option<String>>>,
    source: RefCell<Option<Path>>,
    subscription: RefCell<Option<Subscription>>,
}

impl Label {
    /// Forget the label when a write at `written` replaced its source node.
    fn reset_below(&self, written: &Path) {
        let replaced = self
            .source
            .borrow()
            .as_ref()
            .is_some_and(|src| src.starts_with(written) && src != written);
        if !replaced {
            return;
        }
        self.value.take();
        self.source.take();
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
        }
    }
}

impl Drop for Label {
    fn drop(&mut self) {
        if let Some(sub) = self.subscription.get_mut().take() {
            sub.unsubscribe();
        }
    }
}

struct PageNode {
    base: NodeBase,
    directive: PageDirective,
    additional: Vec<AdditionalProp>,
    children: RefCell<Option<Children>>,
    name: Label,
    color: Label,
}

/// An object shown as a page of its own.
#[derive(Clone)]
pub struct Page(Rc<PageNode>);

impl Page {
    pub(crate) fn new(base: NodeBase, directive: PageDirective, additional: Vec<AdditionalProp>) -> Self {
        Self(Rc::new(PageNode {
            base,
            directive,
            additional,
            children: RefCell::new(None),
            name: Label::default(),
            color: Label::default(),
        }))
    }

    /// Children in schema order, followed by additional properties.
    ///
    /// An absent page has none.
    pub fn children(&self) -> Result<Children> {
        if let Some(children) = self.0.children.borrow().as_ref() {
            return Ok(children.clone());
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let path = self.path();
        let mut children = Children::default();
        if self.0.base.raw_value().is_some() {
            for key in schema::property_keys(self.0.base.schema()) {
                children.push(editor.get(&path.child(key), ResolveDepth::None)?);
            }
            for prop in additional::resolve(&editor, path, &self.0.additional)? {
                children.push(prop.into());
            }
        }
        *self.0.children.borrow_mut() = Some(children.clone());
        Ok(children)
    }

    /// Display name taken from the `nameFromProp` child.
    pub fn dynamic_name(&self) -> Result<Option<String>> {
        self.label(&self.0.name, self.0.directive.name_from_prop.as_ref())
    }

    /// Color taken from the `colorFromProp` child.
    pub fn color(&self) -> Result<Option<String>> {
        self.label(&self.0.color, self.0.directive.color_from_prop.as_ref())
    }

    fn label(&self, label: &Label, from: Option<&PathSpec>) -> Result<Option<String>> {
        if let Some(value) = label.value.borrow().as_ref() {
            return Ok(value.clone());
        }
        let Some(from) = from else {
            return Ok(None);
        };
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let source_path = from.to_path().resolve_from_owner(self.path());
        let source = editor
            .get(&source_path, ResolveDepth::None)?
            .into_property()?;
        let value = source.value_str().filter(|s| !s.is_empty());
        if label.subscription.borrow().is_none() {
            let weak = Rc::downgrade(&self.0);
            let sub = source.subscribe(move || {
                if let Some(node) = weak.upgrade() {
                    node.name.value.take();
                    node.color.value.take();
                    node.base.notify();
                }
            });
            *label.subscription.borrow_mut() = Some(sub);
            *label.source.borrow_mut() = Some(source_path);
        }
        *label.value.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    /// Replace the backing object verbatim, without writing defaults.
    pub fn set_raw(&self, value: Option<Value>) -> Result<()> {
        let base = &self.0.base;
        if value.is_none() && base.required() {
            return Err(base.required_error());
        }
        let editor = base.editor()?;
        let _op = editor.op();
        editor.write(self.path(), value)?;
        self.refresh_error();
        notify_change(&editor, base);
        Ok(())
    }

    pub(crate) fn reset_memo(&self, written: &Path) {
        self.0.children.take();
        self.0.name.reset_below(written);
        self.0.color.reset_below(written);
    }

    pub(crate) fn refresh_error(&self) -> bool {
        let base = &self.0.base;
        let missing = base.required() && base.raw_value().is_none();
        base.set_error(missing.then(|| REQUIRED_VALUE.to_string()))
    }
}

impl SettingNode for Page {
    fn base(&self) -> &NodeBase {
        &self.0.base
    }

    fn setting_type(&self) -> SettingType {
        SettingType::Page
    }

    fn value(&self) -> Option<Value> {
        presence(&self.0.base)
    }

    fn set(&self, value: Option<Value>) -> Result<()> {
        let base = &self.0.base;
        let enable = presence_request(base, value)?;
        let editor = base.editor()?;
        let _op = editor.op();
        let next = match (enable, base.raw_value()) {
            (true, Some(_)) => return Ok(()),
            (true, None) => Some(
                schema::default_value(base.schema(), &editor.schema, true)
                    .unwrap_or_else(|| Value::Object(Map::new())),
            ),
            (false, _) => None,
        };
        editor.write(self.path(), next)?;
        self.refresh_error();
        notify_change(&editor, base);
        Ok(())
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("path", self.path())
            .field("present", &self.value().is_some())
            .finish()
    }
}

struct PageGroupNode {
    base: NodeBase,
    directive: PageGroupDirective,
    pages: RefCell<Option<Vec<Page>>>,
}

/// An array of pages.
#[derive(Clone)]
pub struct PageGroup(Rc<PageGroupNode>);

impl PageGroup {
    pub(crate) fn new(base: NodeBase, directive: PageGroupDirective) -> Self {
        Self(Rc::new(PageGroupNode {
            base,
            directive,
            pages: RefCell::new(None),
        }))
    }

    pub fn child_pages(&self) -> Result<Vec<Page>> {
        if let Some(pages) = self.0.pages.borrow().as_ref() {
            return Ok(pages.clone());
        }
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let len = seq::len(&editor, self.path());
        let mut pages = Vec::with_capacity(len);
        for i in 0..len {
            pages.push(editor.get(&self.path().child(i), ResolveDepth::None)?.into_page()?);
        }
        *self.0.pages.borrow_mut() = Some(pages.clone());
        Ok(pages)
    }

    pub fn len(&self) -> usize {
        self.0
            .base
            .editor()
            .map(|e| seq::len(&e, self.path()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry-relative path of the field that names an entry.
    fn name_field(&self, editor: &EditorInner) -> Option<Path> {
        let from = match &self.0.directive.name_from_prop {
            Some(from) => from.clone(),
            None => {
                let entry = self.path().child(0usize);
                let entry_schema = editor.schema_at(&entry).ok()?;
                directives::page(&entry_schema, &entry).ok()??.name_from_prop?
            }
        };
        Some(from.to_path().resolve_from_owner(&Path::root()))
    }

    fn edit<T>(&self, f: impl FnOnce(&EditorInner, &Path) -> Result<T>) -> Result<T> {
        let editor = self.0.base.editor()?;
        let _op = editor.op();
        let out = f(&editor, self.path())?;
        self.refresh_error();
        notify_change(&editor, &self.0.base);
        Ok(out)
    }

    /// Insert a new page at `index` (append on `None`); returns its index.
    pub fn insert(&self, index: Option<usize>) -> Result<usize> {
        self.edit(|editor, path| seq::insert(editor, path, index))
    }

    /// Copy entry `index` right after itself with fresh ids and the copy
    /// suffix appended to its name.
    pub fn duplicate(&self, index: usize) -> Result<usize> {
        self.edit(|editor, path| {
            let rename = self.name_field(editor);
            seq::duplicate(editor, path, index, rename.as_ref())
        })
    }

    pub fn move_up(&self, index: usize) -> Result<()> {
        self.edit(|editor, path| seq::move_up(editor, path, index).map(drop))
    }

    pub fn move_down(&self, index: usize) -> Result<()> {
        self.edit(|editor, path| seq::move_down(editor, path, index).map(drop))
    }

    pub fn delete(&self, index: usize) -> Result<()> {
        self.edit(|editor, path| seq::delete(editor, path, index))
    }

    pub(crate) fn reset_memo(&self) {
        self.0.pages.take();
    }

    pub(crate) fn refresh_error(&self) -> bool {
        let base = &self.0.base;
        let msg = match base.raw_value() {
            None if base.required() => Some(REQUIRED_VALUE.to_string()),
            None => None,
            Some(value) => {
                let len = value.as_array().map_or(0, Vec::len);
                match (
                    schema::count(base.schema(), "minItems"),
                    schema::count(base.schema(), "maxItems"),
                ) {
                    (Some(min), _) if len < min => Some(format!("Minimum {min} items")),
                    (_, Some(max)) if len > max => Some(format!("Maximum {max} items")),
                    _ => None,
                }
            }
        };
        base.set_error(msg)
    }
}

impl SettingNode for PageGroup {
    fn base(&self) -> &NodeBase {
        &self.0.base
    }

    fn setting_type(&self) -> SettingType {
        SettingType::PageGroup
    }

    fn value(&self) -> Option<Value> {
        presence(&self.0.base)
    }

    fn set(&self, value: Option<Value>) -> Result<()> {
        let base = &self.0.base;
        let enable = presence_request(base, value)?;
        let editor = base.editor()?;
        let _op = editor.op();
        let next = match (enable, base.raw_value()) {
            (true, Some(_)) => return Ok(()),
            (true, None) => Some(
                schema::default_value(base.schema(), &editor.schema, true)
                    .unwrap_or_else(|| Value::Array(Vec::new())),
            ),
            (false, _) => None,
        };
        editor.write(self.path(), next)?;
        self.refresh_error();
        notify_change(&editor, base);
        Ok(())
    }
}

impl fmt::Debug for PageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageGroup")
            .field("path", self.path())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::{Editor, path};

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "profile": {
                    "type": "object",
                    "Page": {"nameFromProp": "title", "colorFromProp": "./tint"},
                    "properties": {
                        "title": {"type": "string"},
                        "tint": {"type": "string", "Prop": {"subType": "Color"}},
                        "extra": {"type": "object", "Page": true, "properties": {"x": {"type": "integer"}}}
                    }
                },
                "teams": {
                    "type": "array",
                    "PageGroup": {"nameFromProp": "name"},
                    "items": {
                        "type": "object",
                        "required": ["id", "name"],
                        "properties": {
                            "id": {"type": "string", "Prop": {"subType": "Id"}},
                            "name": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_children_split_by_kind() {
        let e = Editor::new(schema(), json!({"profile": {"extra": {}}, "teams": []}));
        let root = e.get_page(&path![]).unwrap();
        let children = root.children().unwrap();
        assert_eq!(children.pages.len(), 1);
        assert_eq!(children.groups.len(), 1);
        assert!(children.props.is_empty());

        let profile = e.get_page(&path!["profile"]).unwrap();
        let children = profile.children().unwrap();
        assert_eq!(children.props.len(), 2);
        assert_eq!(children.pages.len(), 1);
    }

    #[test]
    fn test_dynamic_name_follows_source() {
        let e = Editor::new(schema(), json!({"profile": {"title": "Home", "tint": "#fff"}}));
        let profile = e.get_page(&path!["profile"]).unwrap();
        assert_eq!(profile.dynamic_name().unwrap().as_deref(), Some("Home"));
        assert_eq!(profile.color().unwrap().as_deref(), Some("#fff"));

        let hits = Rc::new(std::cell::Cell::new(0));
        let h = hits.clone();
        let _sub = profile.subscribe(move || h.set(h.get() + 1));
        e.get_property(&path!["profile", "title"])
            .unwrap()
            .set(Some(json!("Work")))
            .unwrap();
        assert_eq!(profile.dynamic_name().unwrap().as_deref(), Some("Work"));
        assert!(hits.get() >= 1);
    }

    #[test]
    fn test_absent_page_has_no_children() {
        let e = Editor::new(schema(), json!({}));
        let profile = e.get_page(&path!["profile"]).unwrap();
        assert!(profile.children().unwrap().is_empty());
        profile.set(Some(json!(true))).unwrap();
        assert_eq!(profile.children().unwrap().props.len(), 2);
        profile.set(None).unwrap();
        assert!(profile.children().unwrap().is_empty());
        assert_eq!(e.config(), json!({}));
    }

    #[test]
    fn test_set_raw_skips_defaults() {
        let e = Editor::new(schema(), json!({}));
        let profile = e.get_page(&path!["profile"]).unwrap();
        profile.set_raw(Some(json!({"title": "x"}))).unwrap();
        assert_eq!(e.get_value(&path!["profile"]), Some(json!({"title": "x"})));
    }

    #[test]
    fn test_group_entries_are_pages() {
        let e = Editor::new(schema(), json!({"teams": [{"id": "a", "name": "A"}]}));
        let teams = e.get_page_group(&path!["teams"]).unwrap();
        let pages = teams.child_pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path(), &path!["teams", 0]);
        assert!(pages[0].required());
    }

    #[test]
    fn test_group_insert_generates_id() {
        let e = Editor::new(schema(), json!({"teams": []}));
        let teams = e.get_page_group(&path!["teams"]).unwrap();
        assert_eq!(teams.insert(None).unwrap(), 0);
        let id = e.get_value(&path!["teams", 0, "id"]).unwrap();
        assert_eq!(id.as_str().map(str::len), Some(32));
        assert_eq!(teams.child_pages().unwrap().len(), 1);
    }
}
