//! Option resolution for link properties.
//!
//! A link names a collection (a page group or an array of objects) through
//! `linkPath`. Each entry of the collection becomes one [`LinkOption`] built
//! from the entry's id, display and color fields.
//!
//! When `linkPath` contains the `<$>` marker the collection is itself
//! selected through a filter: the segment before the marker addresses a
//! *values* collection, and only the entries whose `filterIdPropName` field
//! is among the filter property's ids are expanded.

use std::rc::Rc;

use serde::Serialize;

use crate::{
    cache::ResolveDepth,
    data::{
        directives::{self, LinkDirective, StringSubType},
        item::{Property, PropertyKind},
        schema,
        types::{Setting, SettingNode, SettingType},
    },
    editor::EditorInner,
    error::{Error, Result},
    path::{FILTER_VARIABLE, Path, Segment},
};

/// One selectable link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkOption {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

/// Options together with every setting inspected while computing them.
pub(crate) struct Resolved {
    pub options: Vec<LinkOption>,
    pub dependencies: Vec<Setting>,
}

/// Compute the options of the link at `owner`.
///
/// Fails with [`Error::LinkCycle`] when resolving `owner` re-enters itself
/// through a chain of filters.
pub(crate) fn resolve(
    editor: &Rc<EditorInner>,
    owner: &Path,
    directive: &LinkDirective,
) -> Result<Resolved> {
    let _resolving = editor.begin_link_resolution(owner)?;
    let link_path = directive.link_path.to_path().expand_relative(owner);
    check_target_schema(editor, owner, &link_path, directive)?;

    let mut deps = Vec::new();
    let collections = match link_path.position_of(FILTER_VARIABLE) {
        Some(pos) => filtered_collections(editor, owner, directive, &link_path, pos, &mut deps)?,
        None => vec![link_path],
    };

    let mut options = Vec::new();
    for collection in &collections {
        for target in entries(editor, owner, collection, &mut deps)? {
            if let Some(option) = extract(editor, target.path(), directive, &mut deps)? {
                options.push(option);
            }
        }
    }
    trace!("link `{owner}` resolved {} options", options.len());
    Ok(Resolved {
        options,
        dependencies: deps,
    })
}

/// Validate the field layout of the link's targets against the schema.
///
/// Works from the schema alone so that an empty collection still reports a
/// broken directive.
fn check_target_schema(
    editor: &EditorInner,
    owner: &Path,
    link_path: &Path,
    directive: &LinkDirective,
) -> Result<()> {
    let template = match link_path.position_of(FILTER_VARIABLE) {
        Some(pos) => link_path.replace_segment(pos, 0usize),
        None => link_path.clone(),
    };
    let collection = editor
        .schema_at(&template)
        .map_err(|e| Error::link_config(owner, format!("link path `{link_path}`: {e}")))?;
    if schema::schema_type(&collection) != Some("array") {
        return Err(Error::link_config(
            owner,
            format!("link path `{link_path}` is not a collection"),
        ));
    }
    let entry = template.child(0usize);

    let field = |name: &str, role: &str| -> Result<(Option<String>, Option<StringSubType>)> {
        let path = entry.child(name);
        let sub = editor
            .schema_at(&path)
            .map_err(|_| Error::link_config(owner, format!("target has no {role} field `{name}`")))?;
        let sub_type = directives::prop(&sub, &path)?.sub_type;
        Ok((schema::schema_type(&sub).map(str::to_string), sub_type))
    };

    let (ty, sub_type) = field(&directive.id_prop_name, "id")?;
    if ty.as_deref() != Some("string") || sub_type != Some(StringSubType::Id) {
        return Err(Error::link_config(
            owner,
            format!("id field `{}` must be a string with subType id", directive.id_prop_name),
        ));
    }
    let (ty, _) = field(&directive.display_prop_name, "display")?;
    if ty.as_deref() != Some("string") {
        return Err(Error::link_config(
            owner,
            format!("display field `{}` must be a string", directive.display_prop_name),
        ));
    }
    if let Some(color) = &directive.color_prop_name {
        let (ty, sub_type) = field(color, "color")?;
        if ty.as_deref() != Some("string") || sub_type != Some(StringSubType::Color) {
            return Err(Error::link_config(
                owner,
                format!("color field `{color}` must be a string with subType color"),
            ));
        }
    }
    Ok(())
}

/// Entries of the collection at `path`, as pages or object properties.
fn entries(
    editor: &Rc<EditorInner>,
    owner: &Path,
    path: &Path,
    deps: &mut Vec<Setting>,
) -> Result<Vec<Setting>> {
    let collection = editor
        .get(path, ResolveDepth::None)
        .map_err(|e| Error::link_config(owner, format!("link target `{path}`: {e}")))?;
    let entries: Vec<Setting> = match &collection {
        Setting::PageGroup(group) => group.child_pages()?.into_iter().map(Setting::Page).collect(),
        Setting::Property(prop) if prop.setting_type() == SettingType::Array => prop
            .child_properties()?
            .into_iter()
            .filter(|p| p.setting_type() == SettingType::Object)
            .map(Setting::Property)
            .collect(),
        other => {
            return Err(Error::link_config(
                owner,
                format!("link target `{path}` is a {}", other.setting_type()),
            ));
        }
    };
    deps.push(collection);
    deps.extend(entries.iter().cloned());
    Ok(entries)
}

fn field_value(
    editor: &Rc<EditorInner>,
    path: &Path,
    deps: &mut Vec<Setting>,
) -> Result<Option<String>> {
    let prop = editor.get(path, ResolveDepth::None)?.into_property()?;
    let value = prop.value_str();
    deps.push(Setting::Property(prop));
    Ok(value)
}

fn extract(
    editor: &Rc<EditorInner>,
    target: &Path,
    directive: &LinkDirective,
    deps: &mut Vec<Setting>,
) -> Result<Option<LinkOption>> {
    // entries without an id cannot be referenced yet
    let Some(id) = field_value(editor, &target.child(directive.id_prop_name.as_str()), deps)? else {
        return Ok(None);
    };
    let name = field_value(editor, &target.child(directive.display_prop_name.as_str()), deps)?
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.clone());
    let color = match &directive.color_prop_name {
        Some(field) => field_value(editor, &target.child(field.as_str()), deps)?,
        None => None,
    };
    Ok(Some(LinkOption { id, name, color }))
}

/// Ids currently selected by the filter property.
///
/// Link filters contribute only ids that still resolve; a string array
/// contributes its raw values.
fn filter_ids(owner: &Path, filter: &Property) -> Result<Vec<String>> {
    match filter.kind() {
        PropertyKind::Link(_) | PropertyKind::LinkMulti(_) => {
            let valid = filter.options()?;
            Ok(filter
                .value_ids()
                .into_iter()
                .filter(|id| valid.iter().any(|o| &o.id == id))
                .collect())
        }
        PropertyKind::Array(_) => Ok(filter.value_ids()),
        _ => Err(Error::link_config(
            owner,
            format!(
                "filter `{}` must be a link, link list or string array",
                filter.path()
            ),
        )),
    }
}

fn filtered_collections(
    editor: &Rc<EditorInner>,
    owner: &Path,
    directive: &LinkDirective,
    link_path: &Path,
    pos: usize,
    deps: &mut Vec<Setting>,
) -> Result<Vec<Path>> {
    let (Some(filter_path), Some(filter_id)) =
        (&directive.filter_path, &directive.filter_id_prop_name)
    else {
        return Err(Error::link_config(
            owner,
            "`<$>` in linkPath needs filterPath and filterIdPropName",
        ));
    };
    let filter_path = filter_path.to_path().expand_relative(owner);
    let filter = editor
        .get(&filter_path, ResolveDepth::None)
        .and_then(Setting::into_property)
        .map_err(|e| Error::link_config(owner, format!("filter `{filter_path}`: {e}")))?;
    let wanted = filter_ids(owner, &filter)?;
    deps.push(Setting::Property(filter));
    let show_all = wanted.is_empty() && directive.filter_show_all_if_none;

    let values = link_path.prefix(pos);
    let mut out = Vec::new();
    for entry in entries(editor, owner, &values, deps)? {
        let Some(Segment::Index(index)) = entry.path().last().cloned() else {
            continue;
        };
        let id = field_value(editor, &entry.path().child(filter_id.as_str()), deps)?;
        if show_all || id.is_some_and(|id| wanted.contains(&id)) {
            out.push(link_path.replace_segment(pos, index));
        }
    }
    Ok(out)
}
