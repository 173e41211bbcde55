//! `AdditionalProps` injection.
//!
//! A page or object can show properties that live elsewhere in the
//! document. `propPath` is resolved against the owner; a `<&>` marker in it
//! is replaced by the value of the owner's `dynamicIdPropName` child, which
//! lets every entry of a collection own one slot of a shared dictionary.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::{
    cache::ResolveDepth,
    data::{
        directives::{ADDITIONAL_PROPS, AdditionalProp},
        item::Property,
        schema,
        types::{SettingNode, notify_change},
    },
    editor::EditorInner,
    error::{Error, Result},
    path::{DYNAMIC_ID_VARIABLE, Path},
};

fn directive_error(owner: &Path, reason: impl Into<String>) -> Error {
    Error::InvalidDirective {
        path: owner.to_string(),
        directive: ADDITIONAL_PROPS.to_string(),
        reason: reason.into(),
    }
}

/// Materialize the additional properties of the container at `owner`.
pub(crate) fn resolve(
    editor: &Rc<EditorInner>,
    owner: &Path,
    entries: &[AdditionalProp],
) -> Result<Vec<Property>> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut path = entry.prop_path.to_path().resolve_from_owner(owner);

        if let Some(id_name) = &entry.dynamic_id_prop_name {
            let pos = path.position_of(DYNAMIC_ID_VARIABLE).ok_or_else(|| {
                directive_error(owner, format!("`{path}` has no `<&>` marker"))
            })?;
            let id = dynamic_id(editor, &owner.child(id_name.as_str()))?;
            let dict = path.prefix(pos);
            if editor.value_at(&dict).is_none() {
                create(editor, &dict, Value::Object(Map::new()))?;
            }
            let slot = dict.child(id.as_str());
            if editor.value_at(&slot).is_none() {
                let slot_schema = editor.schema_at(&slot)?;
                create(editor, &slot, schema::placeholder_value(&slot_schema, &editor.schema))?;
                debug!("created dictionary slot `{slot}` for `{owner}`");
            }
            path = path.replace_segment(pos, id);
        }

        let prop = editor.get(&path, ResolveDepth::None)?.into_property()?;
        prop.base().set_hidden(false);
        out.push(prop);
    }
    Ok(out)
}

/// Write a placeholder the document was missing.
///
/// Listeners hear about it once the enclosing read has finished.
fn create(editor: &Rc<EditorInner>, path: &Path, value: Value) -> Result<()> {
    editor.write(path, Some(value))?;
    let weak = editor.weak();
    let path = path.clone();
    editor.defer(move || {
        let Some(editor) = weak.upgrade() else {
            return;
        };
        match editor.cached(&path) {
            Some(setting) => notify_change(&editor, setting.base()),
            None => editor.notify(&path),
        }
    });
    Ok(())
}

/// Value of the id property at `path`, initializing it when unset.
fn dynamic_id(editor: &Rc<EditorInner>, path: &Path) -> Result<String> {
    let prop = editor.get(path, ResolveDepth::None)?.into_property()?;
    if prop.value_str().is_none() {
        prop.set_default()?;
    }
    prop.value_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| directive_error(path, "dynamic id property has no value"))
}
