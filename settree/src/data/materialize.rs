//! Schema-driven construction of settings.

use std::rc::Rc;

use crate::{
    data::{
        directives::{self, PageDirective},
        item::{Property, PropertyKind},
        menu::{Page, PageGroup},
        schema,
        types::{NodeBase, Setting},
    },
    editor::EditorInner,
    error::Result,
    path::{Path, Segment},
};

/// Whether the setting at `path` must be present.
///
/// The root, array entries and dictionary entries always are; object
/// properties are when listed in the parent's `required`.
fn is_required(editor: &EditorInner, path: &Path) -> Result<bool> {
    let (Some(parent), Some(last)) = (path.parent(), path.last()) else {
        return Ok(true);
    };
    match last {
        Segment::Index(_) => Ok(true),
        Segment::Key(key) => {
            let parent_schema = editor.schema_at(&parent)?;
            let declared = parent_schema
                .get("properties")
                .and_then(|p| p.get(key))
                .is_some();
            Ok(!declared || schema::is_required(&parent_schema, key))
        }
    }
}

/// The root object and the entries of a page group are pages even without
/// their own `Page` directive.
fn is_page_slot(editor: &EditorInner, path: &Path) -> Result<bool> {
    let (Some(parent), Some(Segment::Index(_))) = (path.parent(), path.last()) else {
        return Ok(path.is_empty());
    };
    let parent_schema = editor.schema_at(&parent)?;
    Ok(directives::page_group(&parent_schema, &parent)?.is_some())
}

/// Build the setting for `path` from its sub-schema.
///
/// Construction is two-phase: the node is built and wrapped first, then
/// behaviour that needs a handle to it (link validation, slug mirroring) is
/// bound through the deferred queue.
pub(crate) fn materialize(editor: &Rc<EditorInner>, path: &Path) -> Result<Setting> {
    let sub = editor.schema_at(path)?;
    let required = is_required(editor, path)?;

    let page = match directives::page(&sub, path)? {
        Some(directive) => Some(directive),
        None if schema::schema_type(&sub) == Some("object")
            && !schema::is_dict(&sub)
            && is_page_slot(editor, path)? =>
        {
            Some(PageDirective::default())
        }
        None => None,
    };
    if let Some(directive) = page {
        let additional = directives::additional_props(&sub, path)?;
        let base = NodeBase::new(editor, path, sub, required);
        let page = Page::new(base, directive, additional);
        page.refresh_error();
        return Ok(Setting::Page(page));
    }

    if schema::schema_type(&sub) == Some("array")
        && let Some(directive) = directives::page_group(&sub, path)?
    {
        let base = NodeBase::new(editor, path, sub, required);
        let group = PageGroup::new(base, directive);
        group.refresh_error();
        return Ok(Setting::PageGroup(group));
    }

    let kind = PropertyKind::from_schema(&sub, path)?;
    let additional = match kind {
        PropertyKind::Object(_) => directives::additional_props(&sub, path)?,
        _ => Vec::new(),
    };
    let base = NodeBase::new(editor, path, sub, required);
    let prop = Property::new(base, kind, additional);
    prop.bind(editor);
    Ok(Setting::Property(prop))
}
