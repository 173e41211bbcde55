//! Array editing shared by page groups and array properties.
//!
//! Every operation rewrites the whole backing array through
//! [`EditorInner::write`], so the settings below it are invalidated in one
//! step. Callers notify once the write succeeded.

use serde_json::Value;

use crate::{
    data::schema,
    editor::{EditorInner, lookup_mut},
    error::{Error, Result},
    path::Path,
};

fn entries(editor: &EditorInner, path: &Path) -> Vec<Value> {
    match editor.value_at(path) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn out_of_bounds(path: &Path, index: usize, len: usize) -> Error {
    Error::IndexOutOfBounds {
        path: path.to_string(),
        index,
        len,
    }
}

/// Number of entries currently stored at `path`.
pub(crate) fn len(editor: &EditorInner, path: &Path) -> usize {
    entries(editor, path).len()
}

/// Insert a placeholder entry at `index` (append on `None`).
pub(crate) fn insert(editor: &EditorInner, path: &Path, index: Option<usize>) -> Result<usize> {
    let mut items = entries(editor, path);
    let index = index.unwrap_or(items.len());
    if index > items.len() {
        return Err(out_of_bounds(path, index, items.len()));
    }
    let item_schema = editor.schema_at(&path.child(index))?;
    items.insert(index, schema::placeholder_value(&item_schema, &editor.schema));
    editor.write(path, Some(Value::Array(items)))?;
    Ok(index)
}

/// Deep-copy entry `index` right after itself.
///
/// Ids inside the copy are regenerated; `rename`, when given, is an
/// entry-relative path to a string field that receives the copy suffix.
pub(crate) fn duplicate(
    editor: &EditorInner,
    path: &Path,
    index: usize,
    rename: Option<&Path>,
) -> Result<usize> {
    let mut items = entries(editor, path);
    let Some(original) = items.get(index) else {
        return Err(out_of_bounds(path, index, items.len()));
    };
    let mut copy = original.clone();
    let item_schema = editor.schema_at(&path.child(index))?;
    schema::regenerate_ids(&mut copy, &item_schema, &editor.schema);
    if let Some(field) = rename
        && let Some(Value::String(name)) = lookup_mut(&mut copy, field)
    {
        name.push_str(&editor.options.copy_suffix);
    }
    items.insert(index + 1, copy);
    editor.write(path, Some(Value::Array(items)))?;
    Ok(index + 1)
}

/// Swap entries `from` and `to`. Returns `false` when either is out of range.
pub(crate) fn swap(editor: &EditorInner, path: &Path, from: usize, to: usize) -> Result<bool> {
    let mut items = entries(editor, path);
    if from >= items.len() || to >= items.len() || from == to {
        return Ok(false);
    }
    items.swap(from, to);
    editor.write(path, Some(Value::Array(items)))?;
    Ok(true)
}

pub(crate) fn move_up(editor: &EditorInner, path: &Path, index: usize) -> Result<bool> {
    match index.checked_sub(1) {
        Some(to) => swap(editor, path, index, to),
        None => Ok(false),
    }
}

pub(crate) fn move_down(editor: &EditorInner, path: &Path, index: usize) -> Result<bool> {
    match index.checked_add(1) {
        Some(to) => swap(editor, path, index, to),
        None => Ok(false),
    }
}

pub(crate) fn delete(editor: &EditorInner, path: &Path, index: usize) -> Result<()> {
    let mut items = entries(editor, path);
    if index >= items.len() {
        return Err(out_of_bounds(path, index, items.len()));
    }
    items.remove(index);
    editor.write(path, Some(Value::Array(items)))
}
