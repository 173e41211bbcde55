use anyhow::Result;
use serde_json::{Value, json};
use settree::{Editor, Error, LinkOption, SettingNode, path};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tag_entry() -> Value {
    json!({
        "type": "object",
        "required": ["id", "name"],
        "properties": {
            "id": {"type": "string", "Prop": {"subType": "Id"}},
            "name": {"type": "string"},
            "color": {"type": "string", "Prop": {"subType": "Color"}}
        }
    })
}

fn tags_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tags": {"type": "array", "PageGroup": {"nameFromProp": "name"}, "items": tag_entry()},
            "primary": {
                "type": "string",
                "PropLink": {"linkPath": "/tags", "colorPropName": "color", "allowCreate": true}
            },
            "picked": {
                "type": "array",
                "items": {"type": "string"},
                "PropLink": {"linkPath": "/tags", "allowCreate": true}
            }
        }
    })
}

fn tags_doc() -> Value {
    json!({
        "tags": [
            {"id": "t1", "name": "One", "color": "#f00"},
            {"id": "t2", "name": ""}
        ],
        "primary": "t1",
        "picked": ["t1", "t2"]
    })
}

#[test]
fn test_options_from_page_group() -> Result<()> {
    init_logger();
    let editor = Editor::new(tags_schema(), tags_doc());
    let primary = editor.get_property(&path!["primary"])?;
    assert_eq!(
        primary.options()?,
        vec![
            LinkOption {
                id: "t1".into(),
                name: "One".into(),
                color: Some("#f00".into())
            },
            // empty display names fall back to the id
            LinkOption {
                id: "t2".into(),
                name: "t2".into(),
                color: None
            },
        ]
    );
    assert_eq!(primary.error_msg(), None);
    Ok(())
}

#[test]
fn test_options_follow_target_edits() -> Result<()> {
    let editor = Editor::new(tags_schema(), tags_doc());
    let primary = editor.get_property(&path!["primary"])?;
    assert_eq!(primary.options()?[0].name, "One");
    editor
        .get_property(&path!["tags", 0, "name"])?
        .set(Some(json!("Uno")))?;
    assert_eq!(primary.options()?[0].name, "Uno");
    Ok(())
}

#[test]
fn test_dangling_reference_after_delete() -> Result<()> {
    init_logger();
    let editor = Editor::new(tags_schema(), tags_doc());
    let picked = editor.get_property(&path!["picked"])?;
    assert_eq!(picked.error_msg(), None);

    editor.get_page_group(&path!["tags"])?.delete(1)?;
    editor.flush_deferred();
    assert_eq!(picked.error_msg().as_deref(), Some("Invalid reference"));

    picked.delete_id("t2")?;
    assert_eq!(picked.error_msg(), None);
    assert_eq!(editor.get_value(&path!["picked"]), Some(json!(["t1"])));
    Ok(())
}

#[test]
fn test_unknown_id_is_invalid() -> Result<()> {
    let editor = Editor::new(tags_schema(), tags_doc());
    let primary = editor.get_property(&path!["primary"])?;
    primary.set(Some(json!("missing")))?;
    assert_eq!(primary.error_msg().as_deref(), Some("Invalid reference"));
    Ok(())
}

#[test]
fn test_create_appends_target() -> Result<()> {
    init_logger();
    let editor = Editor::new(tags_schema(), tags_doc());
    let primary = editor.get_property(&path!["primary"])?;
    assert!(primary.allow_create());

    let id = primary.create("Blue")?;
    assert_eq!(id.len(), 32);
    assert_eq!(primary.value_str(), Some(id.clone()));
    assert_eq!(editor.get_value(&path!["tags", 2, "name"]), Some(json!("Blue")));
    assert!(primary.options()?.iter().any(|o| o.id == id && o.name == "Blue"));
    assert_eq!(primary.error_msg(), None);

    let picked = editor.get_property(&path!["picked"])?;
    let second = picked.create("Green")?;
    assert_eq!(picked.value_ids(), vec!["t1".to_string(), "t2".into(), second]);
    Ok(())
}

#[test]
fn test_link_multi_insert_dedupes() -> Result<()> {
    let editor = Editor::new(tags_schema(), tags_doc());
    let picked = editor.get_property(&path!["picked"])?;
    picked.insert_id("t1")?;
    assert_eq!(picked.value_ids().len(), 2);
    picked.set(Some(json!(["t2", "t2"])))?;
    assert_eq!(editor.get_value(&path!["picked"]), Some(json!(["t2"])));
    Ok(())
}

#[test]
fn test_misconfigured_target_fails_on_options_only() -> Result<()> {
    init_logger();
    let editor = Editor::new(
        json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "PageGroup": true,
                    "items": {
                        "type": "object",
                        "properties": {"id": {"type": "string"}, "name": {"type": "string"}}
                    }
                },
                "tag": {"type": "string", "PropLink": {"linkPath": "/tags"}}
            }
        }),
        json!({"tags": [], "tag": "x"}),
    );
    let tag = editor.get_property(&path!["tag"])?;
    assert!(matches!(tag.options(), Err(Error::LinkConfig { .. })));
    assert!(matches!(tag.create("x"), Err(Error::LinkConfig { .. })));
    Ok(())
}

#[test]
fn test_broken_directive_fails_on_options_only() -> Result<()> {
    let editor = Editor::new(
        json!({
            "type": "object",
            "properties": {"tag": {"type": "string", "PropLink": {"displayPropName": 3}}}
        }),
        json!({}),
    );
    let tag = editor.get_property(&path!["tag"])?;
    assert!(matches!(tag.options(), Err(Error::LinkConfig { .. })));
    Ok(())
}

fn catalog_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "categories": {
                "type": "array",
                "PageGroup": {"nameFromProp": "name"},
                "items": {
                    "type": "object",
                    "required": ["id", "name"],
                    "properties": {
                        "id": {"type": "string", "Prop": {"subType": "Id"}},
                        "name": {"type": "string"},
                        "items": {"type": "array", "items": tag_entry()}
                    }
                }
            },
            "category": {"type": "string", "PropLink": {"linkPath": "/categories"}},
            "item": {
                "type": "string",
                "PropLink": {
                    "linkPath": "/categories/<$>/items",
                    "filterPath": "/category",
                    "filterIdPropName": "id",
                    "filterShowAllIfNone": true,
                    "allowCreate": true
                }
            }
        }
    })
}

fn ids(options: &[LinkOption]) -> Vec<&str> {
    options.iter().map(|o| o.id.as_str()).collect()
}

#[test]
fn test_filtered_link() -> Result<()> {
    init_logger();
    let editor = Editor::new(
        catalog_schema(),
        json!({
            "categories": [
                {"id": "c1", "name": "Fruit", "items": [{"id": "i1", "name": "Apple"}]},
                {"id": "c2", "name": "Veg", "items": [{"id": "i2", "name": "Leek"}]}
            ],
            "category": "c2"
        }),
    );
    let item = editor.get_property(&path!["item"])?;
    assert_eq!(ids(&item.options()?), vec!["i2"]);

    let category = editor.get_property(&path!["category"])?;
    category.set(Some(json!("c1")))?;
    assert_eq!(ids(&item.options()?), vec!["i1"]);

    category.set(None)?;
    assert_eq!(ids(&item.options()?), vec!["i1", "i2"]);

    assert!(matches!(item.create("Pear"), Err(Error::LinkConfig { .. })));
    Ok(())
}

#[test]
fn test_indirect_cycle_is_detected() -> Result<()> {
    init_logger();
    let link = |filter: &str| {
        json!({
            "type": "string",
            "PropLink": {
                "linkPath": "/groups/<$>/members",
                "filterPath": filter,
                "filterIdPropName": "id"
            }
        })
    };
    let editor = Editor::new(
        json!({
            "type": "object",
            "properties": {
                "groups": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "Prop": {"subType": "Id"}},
                            "name": {"type": "string"},
                            "members": {"type": "array", "items": tag_entry()}
                        }
                    }
                },
                "a": link("/b"),
                "b": link("/a")
            }
        }),
        json!({
            "groups": [{"id": "g", "name": "G", "members": [{"id": "m", "name": "M"}]}],
            "a": "m",
            "b": "m"
        }),
    );
    let a = editor.get_property(&path!["a"])?;
    assert!(matches!(a.options(), Err(Error::LinkCycle { .. })));
    Ok(())
}

#[test]
fn test_link_inside_its_own_target() -> Result<()> {
    init_logger();
    let mut entry = tag_entry();
    entry["properties"]["parent"] = json!({"type": "string", "PropLink": {"linkPath": "/tags"}});
    let editor = Editor::new(
        json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "PageGroup": {"nameFromProp": "name"}, "items": entry}
            }
        }),
        json!({"tags": [
            {"id": "t1", "name": "Root"},
            {"id": "t2", "name": "Leaf", "parent": "t1"}
        ]}),
    );
    let leaf = editor.get_page(&path!["tags", 1])?;
    let parent = leaf
        .children()?
        .props
        .into_iter()
        .find(|p| p.path() == &path!["tags", 1, "parent"])
        .ok_or_else(|| anyhow::anyhow!("parent not materialized"))?;
    editor.flush_deferred();
    assert_eq!(parent.error_msg(), None);
    assert_eq!(ids(&parent.options()?), ["t1", "t2"]);

    parent.set(Some(json!("t9")))?;
    assert_eq!(parent.error_msg().as_deref(), Some("Invalid reference"));
    Ok(())
}

#[test]
fn test_color_field_without_color_subtype() -> Result<()> {
    let mut schema = tags_schema();
    schema["properties"]["primary"]["PropLink"]["colorPropName"] = json!("name");
    let editor = Editor::new(schema, tags_doc());
    let primary = editor.get_property(&path!["primary"])?;
    assert!(matches!(primary.options(), Err(Error::LinkConfig { .. })));
    Ok(())
}
