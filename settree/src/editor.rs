//! The editor façade.
//!
//! An [`Editor`] owns the schema, the backing document, the settings cache,
//! the global subscribers and the deferred-task queue. Settings obtained from
//! it hold a weak handle back to the editor and route every mutation through
//! it.

use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    rc::{Rc, Weak},
};

use serde_json::{Map, Value};

use crate::{
    cache::{Cache, ResolveDepth},
    data::{
        item::Property,
        materialize,
        menu::{Page, PageGroup},
        schema,
        types::{Setting, SettingNode},
    },
    error::{Error, Result},
    observer::{DeferredQueue, Observers, Subscription},
    options::EditorOptions,
    path::{Path, Segment},
};

/// Shared editor state. Settings keep a `Weak` to it.
pub(crate) struct EditorInner {
    pub(crate) schema: Value,
    pub(crate) options: EditorOptions,
    document: RefCell<Value>,
    cache: RefCell<Cache<Setting>>,
    observers: Observers<Path>,
    deferred: DeferredQueue,
    depth: Cell<usize>,
    resolving_links: RefCell<HashSet<Path>>,
}

/// Marks a public entry point; draining the deferred queue when the
/// outermost one returns.
pub(crate) struct OpGuard<'a> {
    editor: &'a EditorInner,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        let depth = self.editor.depth.get() - 1;
        self.editor.depth.set(depth);
        if depth == 0 {
            self.editor.drain_deferred();
        }
    }
}

/// Held while a link's options are being computed.
pub(crate) struct LinkResolution<'a> {
    editor: &'a EditorInner,
    path: Path,
}

impl Drop for LinkResolution<'_> {
    fn drop(&mut self) {
        self.editor.resolving_links.borrow_mut().remove(&self.path);
    }
}

impl EditorInner {
    pub(crate) fn op(&self) -> OpGuard<'_> {
        self.depth.set(self.depth.get() + 1);
        OpGuard { editor: self }
    }

    fn drain_deferred(&self) {
        // keep depth non-zero so tasks do not drain recursively
        self.depth.set(self.depth.get() + 1);
        self.deferred.drain();
        self.depth.set(self.depth.get() - 1);
    }

    pub(crate) fn defer(&self, task: impl FnOnce() + 'static) {
        self.deferred.push(task);
    }

    pub(crate) fn begin_link_resolution(&self, path: &Path) -> Result<LinkResolution<'_>> {
        if !self.resolving_links.borrow_mut().insert(path.clone()) {
            return Err(Error::LinkCycle {
                path: path.to_string(),
            });
        }
        Ok(LinkResolution {
            editor: self,
            path: path.clone(),
        })
    }

    pub(crate) fn path_str(&self, path: &Path) -> String {
        path.to_string_with(self.options.path_delimiter)
    }

    pub(crate) fn schema_at(&self, path: &Path) -> Result<Value> {
        schema::sub_schema(path, &self.schema)
    }

    /// Current document value at `path`; `null` reads as absent.
    pub(crate) fn value_at(&self, path: &Path) -> Option<Value> {
        let doc = self.document.borrow();
        lookup(&doc, path).filter(|v| !v.is_null()).cloned()
    }

    /// Write `value` (or remove on `None`) and invalidate affected settings.
    ///
    /// Does not notify anybody; callers notify once their own bookkeeping is
    /// done.
    pub(crate) fn write(&self, path: &Path, value: Option<Value>) -> Result<()> {
        let spliced = {
            let mut doc = self.document.borrow_mut();
            match value {
                Some(v) => {
                    assign(&mut doc, path, v)?;
                    false
                }
                None => remove(&mut doc, path),
            }
        };
        self.invalidate_after_write(path, spliced);
        Ok(())
    }

    fn invalidate_after_write(&self, path: &Path, spliced: bool) {
        let touched = {
            let mut cache = self.cache.borrow_mut();
            cache.invalidate_children(path);
            if spliced && let Some(parent) = path.parent() {
                // indices after the removed entry shifted
                cache.invalidate_children(&parent);
            }
            let mut touched = cache.ancestors(path);
            touched.extend(cache.peek(path));
            touched
        };
        debug!("invalidated below `{path}` ({} settings reset)", touched.len());
        for setting in touched {
            setting.reset_memo(path);
        }
    }

    pub(crate) fn notify(&self, path: &Path) {
        trace!("global notify `{path}`");
        self.observers.notify(path);
    }

    pub(crate) fn cached(&self, path: &Path) -> Option<Setting> {
        self.cache.borrow().peek(path)
    }

    /// Materialize (or fetch from cache) the setting at `path`.
    pub(crate) fn get(self: &Rc<Self>, path: &Path, depth: ResolveDepth) -> Result<Setting> {
        let _op = self.op();
        if let Some(hit) = self.cache.borrow().get(path, depth) {
            trace!("cache hit `{path}`");
            return Ok(hit);
        }

        let existing = self.cache.borrow().peek(path);
        let setting = match existing {
            Some(s) => s,
            None => {
                let s = materialize::materialize(self, path)?;
                debug!("materialized {} at `{path}`", s.setting_type());
                self.cache
                    .borrow_mut()
                    .insert(path, s.clone(), ResolveDepth::None);
                s
            }
        };

        let child_depth = match depth {
            ResolveDepth::None => None,
            ResolveDepth::Shallow => Some(ResolveDepth::None),
            ResolveDepth::Deep => Some(ResolveDepth::Deep),
        };
        if let Some(child_depth) = child_depth {
            for child in setting.child_settings()? {
                self.get(child.path(), child_depth)?;
            }
            // children may have been invalidated and re-created meanwhile
            if self.cache.borrow().peek(path).is_some() {
                self.cache.borrow_mut().insert(path, setting.clone(), depth);
            }
        }
        Ok(setting)
    }

    pub(crate) fn weak(self: &Rc<Self>) -> Weak<Self> {
        Rc::downgrade(self)
    }
}

/// Schema-driven settings editor over a JSON document.
///
/// `Clone` produces an independent editor over a deep copy of the document;
/// settings, cache and subscribers are not shared.
pub struct Editor {
    inner: Rc<EditorInner>,
}

impl Editor {
    /// Create an editor for `document` described by `schema`.
    pub fn new(schema: Value, document: Value) -> Self {
        Self::with_options(schema, document, EditorOptions::default())
    }

    pub fn with_options(schema: Value, document: Value, options: EditorOptions) -> Self {
        Self {
            inner: Rc::new(EditorInner {
                schema,
                options,
                document: RefCell::new(document),
                cache: RefCell::new(Cache::new()),
                observers: Observers::new(),
                deferred: DeferredQueue::default(),
                depth: Cell::new(0),
                resolving_links: RefCell::new(HashSet::new()),
            }),
        }
    }

    pub fn schema(&self) -> &Value {
        &self.inner.schema
    }

    pub fn options(&self) -> &EditorOptions {
        &self.inner.options
    }

    /// Parse a path string using the configured delimiter.
    pub fn parse_path(&self, s: &str) -> Path {
        Path::parse(s, self.inner.options.path_delimiter)
    }

    /// Setting at `path`, with descendants materialized to `depth`.
    pub fn get(&self, path: &Path, depth: ResolveDepth) -> Result<Setting> {
        self.inner.get(path, depth)
    }

    /// Setting at the document root.
    pub fn root(&self) -> Result<Setting> {
        self.get(&Path::root(), ResolveDepth::None)
    }

    pub fn get_page(&self, path: &Path) -> Result<Page> {
        self.get(path, ResolveDepth::None)?.into_page()
    }

    pub fn get_page_group(&self, path: &Path) -> Result<PageGroup> {
        self.get(path, ResolveDepth::None)?.into_page_group()
    }

    pub fn get_property(&self, path: &Path) -> Result<Property> {
        self.get(path, ResolveDepth::None)?.into_property()
    }

    /// Raw document value at `path`.
    pub fn get_value(&self, path: &Path) -> Option<Value> {
        self.inner.value_at(path)
    }

    /// Raw document value at `path`, or the schema default when absent.
    pub fn get_or_default_value(&self, path: &Path) -> Result<Option<Value>> {
        if let Some(v) = self.inner.value_at(path) {
            return Ok(Some(v));
        }
        let sub = self.inner.schema_at(path)?;
        Ok(schema::default_value(&sub, &self.inner.schema, false))
    }

    /// Write a raw value; `None` deletes the key or splices the array entry.
    ///
    /// A setting cached at exactly `path` re-validates and is notified, then
    /// the global subscribers are.
    pub fn set_value(&self, path: &Path, value: Option<Value>) -> Result<()> {
        let _op = self.inner.op();
        self.inner.write(path, value)?;
        if let Some(setting) = self.inner.cached(path) {
            setting.refresh_error();
            setting.notify_local();
        }
        self.inner.notify(path);
        Ok(())
    }

    /// Subscribe to every mutation of the document.
    pub fn subscribe(&self, callback: impl Fn(&Path) + 'static) -> Subscription {
        self.inner.observers.subscribe(callback)
    }

    /// Snapshot of the whole document.
    pub fn config(&self) -> Value {
        self.inner.document.borrow().clone()
    }

    /// Replace the whole document.
    pub fn set_config(&self, document: Value) {
        let _op = self.inner.op();
        *self.inner.document.borrow_mut() = document;
        self.inner.cache.borrow_mut().invalidate(&Path::root());
        debug!("document replaced, cache reset");
        self.inner.notify(&Path::root());
    }

    /// Replace the document with an empty object.
    pub fn clear_config(&self) {
        self.set_config(Value::Object(Map::new()));
    }

    /// Run deferred validations now.
    pub fn flush_deferred(&self) {
        let _op = self.inner.op();
    }

    /// Number of settings currently memoized.
    pub fn cached_settings(&self) -> usize {
        self.inner.cache.borrow().len()
    }
}

impl Clone for Editor {
    fn clone(&self) -> Self {
        Self::with_options(
            self.inner.schema.clone(),
            self.config(),
            self.inner.options.clone(),
        )
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("document", &self.inner.document.borrow())
            .field("cached", &self.cached_settings())
            .finish()
    }
}

pub(crate) fn lookup<'a>(doc: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = doc;
    for seg in path {
        current = match (seg, current) {
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            (Segment::Index(i), Value::Array(arr)) => arr.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn lookup_mut<'a>(doc: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut current = doc;
    for seg in path {
        current = match (seg, current) {
            (Segment::Key(k), Value::Object(map)) => map.get_mut(k)?,
            (Segment::Index(i), Value::Array(arr)) => arr.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

fn empty_container(seg: &Segment) -> Value {
    match seg {
        Segment::Key(_) => Value::Object(Map::new()),
        Segment::Index(_) => Value::Array(Vec::new()),
    }
}

/// Step into `seg`, creating the container for `next` when missing.
fn step_mut<'a>(
    current: &'a mut Value,
    seg: &Segment,
    next: &Segment,
    path: &Path,
) -> Result<&'a mut Value> {
    if current.is_null() {
        *current = empty_container(seg);
    }
    let slot = match (seg, current) {
        (Segment::Key(k), Value::Object(map)) => map
            .entry(k.clone())
            .or_insert_with(|| empty_container(next)),
        (Segment::Index(i), Value::Array(arr)) => {
            if *i == arr.len() {
                arr.push(empty_container(next));
            }
            let len = arr.len();
            arr.get_mut(*i).ok_or_else(|| Error::IndexOutOfBounds {
                path: path.to_string(),
                index: *i,
                len,
            })?
        }
        _ => {
            return Err(Error::invalid_value(
                path,
                format!("cannot step into `{seg}`: not a container"),
            ));
        }
    };
    if slot.is_null() {
        *slot = empty_container(next);
    }
    Ok(slot)
}

fn assign(doc: &mut Value, path: &Path, value: Value) -> Result<()> {
    let segs = path.segments();
    let Some((last, parents)) = segs.split_last() else {
        *doc = value;
        return Ok(());
    };
    let mut current = doc;
    for (i, seg) in parents.iter().enumerate() {
        current = step_mut(current, seg, &segs[i + 1], path)?;
    }
    if current.is_null() {
        *current = empty_container(last);
    }
    match (last, current) {
        (Segment::Key(k), Value::Object(map)) => {
            map.insert(k.clone(), value);
            Ok(())
        }
        (Segment::Index(i), Value::Array(arr)) => {
            if *i < arr.len() {
                arr[*i] = value;
                Ok(())
            } else if *i == arr.len() {
                arr.push(value);
                Ok(())
            } else {
                Err(Error::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *i,
                    len: arr.len(),
                })
            }
        }
        _ => Err(Error::invalid_value(path, "parent is not a container")),
    }
}

/// Remove the value at `path`. Returns whether an array entry was spliced.
fn remove(doc: &mut Value, path: &Path) -> bool {
    let segs = path.segments();
    let Some((last, parents)) = segs.split_last() else {
        *doc = Value::Null;
        return false;
    };
    let mut current = doc;
    for seg in parents {
        let next = match (seg, current) {
            (Segment::Key(k), Value::Object(map)) => map.get_mut(k),
            (Segment::Index(i), Value::Array(arr)) => arr.get_mut(*i),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return false,
        }
    }
    match (last, current) {
        (Segment::Key(k), Value::Object(map)) => {
            map.retain(|key, _| key != k);
            false
        }
        (Segment::Index(i), Value::Array(arr)) if *i < arr.len() => {
            arr.remove(*i);
            true
        }
        _ => false,
    }
}
