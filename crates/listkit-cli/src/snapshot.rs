//! JSON snapshot files.
//!
//! A flat snapshot is `[{"id": .., "value": ..}]`; a sectioned one is
//! `[{"header": {"id": .., "value": ..}, "items": [..]}]`. Identifiers may be
//! any JSON value and are compared by their string form, values by JSON
//! equality.

use std::fs;
use std::path::Path;

use anyhow::Context;
use listkit_diff::{Keyed, Section};
use serde::Deserialize;
use serde_json::Value;

pub type Item = Keyed<String, Value>;
pub type ItemSection = Section<Item, Item>;

#[derive(Deserialize)]
struct RawItem {
    id: Value,
    #[serde(default)]
    value: Value,
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        let id = match raw.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Keyed::new(id, raw.value)
    }
}

#[derive(Deserialize)]
struct RawSection {
    header: RawItem,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSnapshot {
    Sectioned(Vec<RawSection>),
    Flat(Vec<RawItem>),
}

/// Header id of the section a flat snapshot is wrapped in.
pub const FLAT_SECTION: &str = "";

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

pub fn parse_flat(json: &str) -> anyhow::Result<Vec<Item>> {
    let raw: Vec<RawItem> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(Item::from).collect())
}

pub fn parse_sections(json: &str) -> anyhow::Result<Vec<ItemSection>> {
    let raw: RawSnapshot = serde_json::from_str(json)?;
    Ok(match raw {
        RawSnapshot::Sectioned(sections) => sections
            .into_iter()
            .map(|s| {
                Section::new(
                    Item::from(s.header),
                    s.items.into_iter().map(Item::from).collect(),
                )
            })
            .collect(),
        RawSnapshot::Flat(items) => vec![Section::new(
            Keyed::new(FLAT_SECTION.to_string(), Value::Null),
            items.into_iter().map(Item::from).collect(),
        )],
    })
}

pub fn load_flat(path: &Path) -> anyhow::Result<Vec<Item>> {
    parse_flat(&read(path)?).with_context(|| format!("parsing flat snapshot {}", path.display()))
}

/// Load a sectioned snapshot; a flat file becomes a single section.
pub fn load_sections(path: &Path) -> anyhow::Result<Vec<ItemSection>> {
    parse_sections(&read(path)?)
        .with_context(|| format!("parsing sectioned snapshot {}", path.display()))
}
