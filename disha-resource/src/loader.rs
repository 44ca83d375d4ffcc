//! Destination and tour list loading.
//!
//! A list file is a YAML sequence of maps. The file itself must be readable
//! and must be a list; everything below that level is best effort: an entry
//! that fails to decode becomes a node carrying an `error` and its siblings
//! still load.

use crate::destination::Destination;
use crate::error::{ResourceError, Result};
use crate::i18n::Language;
use crate::reference::{Context, Referable};
use crate::source::Source;
use crate::tour::{Tour, TourDraft};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Raw list entries plus the context they should be decoded in.
fn read_list(source: &Source, lang: &Language) -> Result<(Vec<Value>, Context)> {
    let path = source.local_path(lang);
    let name = match &path {
        Some(p) => p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.pattern().to_string()),
        None => source.pattern().to_string(),
    };
    let text = match &path {
        Some(p) => fs::read_to_string(p)?,
        None => source.content(lang).ok_or_else(|| {
            ResourceError::NotFound(format!("cannot fetch {}", source.pattern()))
        })?,
    };
    parse_list(&text, path.as_deref(), &name)
}

fn parse_list(text: &str, path: Option<&Path>, name: &str) -> Result<(Vec<Value>, Context)> {
    match serde_yaml::from_str::<Value>(text)? {
        Value::Sequence(items) => Ok((items, Context::root(path, name))),
        Value::Null => Ok((Vec::new(), Context::root(path, name))),
        _ => Err(ResourceError::InvalidSource(format!("{} is not a list", name))),
    }
}

fn decode_all<T, F>(items: &[Value], ctx: &Context, invalid: F) -> Vec<T>
where
    T: Referable,
    F: Fn(&str) -> T,
{
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let location = ctx.location(i);
            match item.as_mapping() {
                Some(map) => T::decode(map, ctx, &location),
                None => invalid(&location),
            }
        })
        .collect()
}

pub fn load_destinations(source: &Source, lang: &Language) -> Result<Vec<Destination>> {
    let (items, ctx) = read_list(source, lang)?;
    let list = decode_all(&items, &ctx, |loc| Destination::invalid(loc, "not a map"));
    report(&list, |d| d.error.as_deref());
    Ok(list)
}

/// Load a destination list file directly.
pub fn load_destinations_file(path: &Path) -> Result<Vec<Destination>> {
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
    let pattern = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    load_destinations(&Source::local(dir, pattern), &Language::default())
}

pub fn load_tours(source: &Source, lang: &Language) -> Result<Vec<Arc<Tour>>> {
    let (items, ctx) = read_list(source, lang)?;
    let drafts = decode_all(&items, &ctx, |loc| TourDraft {
        error: Some(format!("{}: not a map", loc)),
        ..Default::default()
    });
    let tours: Vec<Arc<Tour>> = drafts
        .into_iter()
        .enumerate()
        .map(|(i, mut draft)| {
            if draft.id.is_empty() && draft.error.is_none() {
                draft.error = Some(format!("{}: tour has no id", ctx.location(i)));
            }
            draft.into_tour()
        })
        .collect();
    report(&tours, |t| t.error.as_deref());
    Ok(tours)
}

pub fn load_tours_file(path: &Path) -> Result<Vec<Arc<Tour>>> {
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
    let pattern = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    load_tours(&Source::local(dir, pattern), &Language::default())
}

fn report<T>(nodes: &[T], error: impl Fn(&T) -> Option<&str>) {
    for e in nodes.iter().filter_map(error) {
        log::warn!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_list_file_is_err() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.yaml");
        fs::write(&path, "title: not a list\n").unwrap();
        assert!(matches!(
            load_destinations_file(&path),
            Err(ResourceError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_missing_file_is_err() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_destinations_file(&dir.path().join("none.yaml")),
            Err(ResourceError::Io(_))
        ));
    }

    #[test]
    fn test_empty_file_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.yaml");
        fs::write(&path, "").unwrap();
        assert!(load_destinations_file(&path).unwrap().is_empty());
    }

    #[test]
    fn test_tour_without_id_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.yaml");
        fs::write(&path, "- {title: Nameless}\n- {id: ok, title: Fine}\n").unwrap();
        let tours = load_tours_file(&path).unwrap();
        assert_eq!(tours[0].error.as_deref(), Some("t.yaml[0]: tour has no id"));
        assert!(tours[1].error.is_none());
    }
}
