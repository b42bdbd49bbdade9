use crate::{compat::DottedVersion, error::ModError};
use quick_xml::{events::Event, Reader};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Accepted manifest file names, in lookup order.
pub const MANIFEST_FILE_NAMES: [&str; 2] = ["info", "info.xml"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub known_issues: String,
    pub version: String,
    pub author: String,
    pub website: String,
    pub updates: String,
    /// Declared `modid`; `0` claims no namespace.
    pub prefix: u32,
    pub minimum_loader_version: DottedVersion,
    /// `None` when the manifest has no `gameVersions` tag at all.
    pub game_versions: Option<Vec<String>>,
}

pub fn find_manifest(mod_dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILE_NAMES
        .iter()
        .map(|name| mod_dir.join(name))
        .find(|path| path.is_file())
}

pub fn read_manifest(path: &Path) -> Result<Manifest, ModError> {
    if !path.is_file() {
        return Err(ModError::ManifestMissing {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path).map_err(|err| ModError::ManifestInvalid {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    parse_manifest(&bytes).map_err(|reason| ModError::ManifestInvalid {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parses an info document. Fields are the direct children of the root
/// element; the first occurrence of a tag wins.
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, String> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut current: Option<String> = None;
    let mut text = String::new();
    // A field's value is the text before its first child element.
    let mut field_has_child = false;
    let mut game_versions: Option<Vec<String>> = None;
    let mut in_game_versions = false;
    let mut item_text: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match depth {
                    1 => saw_root = true,
                    2 => {
                        text.clear();
                        field_has_child = false;
                        if tag == "gameVersions" && game_versions.is_none() {
                            game_versions = Some(Vec::new());
                            in_game_versions = true;
                        }
                        current = Some(tag);
                    }
                    3 => {
                        field_has_child = true;
                        if in_game_versions {
                            item_text = Some(String::new());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match depth + 1 {
                    1 => saw_root = true,
                    2 => {
                        if tag == "gameVersions" && game_versions.is_none() {
                            game_versions = Some(Vec::new());
                        }
                        fields.entry(tag).or_default();
                    }
                    3 => field_has_child = true,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let value = e.unescape().map_err(|err| err.to_string())?;
                let field = (!field_has_child).then_some(&mut text);
                push_text(depth, &value, field, item_text.as_mut());
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                let value = String::from_utf8_lossy(&raw);
                let field = (!field_has_child).then_some(&mut text);
                push_text(depth, &value, field, item_text.as_mut());
            }
            Ok(Event::End(_)) => {
                match depth {
                    2 => {
                        if let Some(tag) = current.take() {
                            fields.entry(tag).or_insert_with(|| sanitize(&text));
                        }
                        in_game_versions = false;
                    }
                    3 => {
                        if let (Some(item), Some(list)) = (item_text.take(), game_versions.as_mut())
                        {
                            if in_game_versions {
                                list.push(sanitize(&item));
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(format!(
                    "malformed XML at byte {}: {err}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err("document has no root element".to_string());
    }

    let required = |tag: &str| -> Result<String, String> {
        fields
            .get(tag)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| format!("missing <{tag}>"))
    };
    let optional = |tag: &str| fields.get(tag).cloned().unwrap_or_default();

    let name = required("name")?;
    let description = required("description")?;
    let raw_loader_version = required("minimumLoaderVersion")?;
    let minimum_loader_version = DottedVersion::parse(&raw_loader_version)
        .ok_or_else(|| format!("invalid minimumLoaderVersion '{raw_loader_version}'"))?;

    Ok(Manifest {
        name,
        description,
        known_issues: optional("knownIssues"),
        version: optional("version"),
        author: optional("author"),
        website: optional("website"),
        updates: optional("updates"),
        prefix: optional("modid").parse::<u32>().unwrap_or(0),
        minimum_loader_version,
        game_versions,
    })
}

fn push_text(depth: usize, value: &str, field: Option<&mut String>, item: Option<&mut String>) {
    match depth {
        2 => {
            if let Some(field) = field {
                field.push_str(value);
            }
        }
        3 => {
            if let Some(item) = item {
                item.push_str(value);
            }
        }
        _ => {}
    }
}

fn sanitize(value: &str) -> String {
    value.trim_matches(|ch| matches!(ch, '\r' | '\n' | '\t' | ' ')).to_string()
}
