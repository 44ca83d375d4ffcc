//! Resource bundles and their activation.
//!
//! A resource is a directory with a `_metadata.yaml`:
//!
//! ```yaml
//! name: sample_site
//! language: en
//! i18n: i18n                       # <lang>.yaml string tables
//! destinations: {type: local, src: destinations.yaml}
//! tours: {type: local, src: tours.yaml}
//! conversation: {type: local, src: conversation.yaml}
//! custom_menus:
//!   - {title: Help, id: help, script: {type: local, src: help.js}, function: run}
//! ```
//!
//! The destination and tour graphs are built once per activation
//! ([`Resource::activate`]) and are immutable afterwards.

use crate::destination::Destination;
use crate::error::{ResourceError, Result};
use crate::i18n::{Language, StringTable};
use crate::loader::{load_destinations, load_tours};
use crate::source::Source;
use crate::tour::Tour;
use crate::yaml::{get, get_string};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub const METADATA_FILE_NAME: &str = "_metadata.yaml";
const CONTENT_SCHEME: &str = "content://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomMenu {
    pub title: String,
    pub id: String,
    pub script: Source,
    pub function: String,
}

impl CustomMenu {
    fn from_mapping(map: &Mapping, base: &Path) -> Result<Self> {
        let field = |key: &str| {
            get_string(map, key)
                .ok_or_else(|| ResourceError::InvalidSource(format!("custom menu without {}", key)))
        };
        let script = get(map, "script")
            .ok_or_else(|| ResourceError::InvalidSource("custom menu without script".into()))?;
        Ok(Self {
            title: field("title")?,
            id: field("id")?,
            script: Source::from_value(script, Some(base))?,
            function: field("function")?,
        })
    }
}

/// Parsed `_metadata.yaml`.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub identifier: String,
    pub language: Option<String>,
    pub i18n: Option<String>,
    pub destinations: Option<Source>,
    pub tours: Option<Source>,
    pub conversation: Option<Source>,
    pub custom_menus: Vec<CustomMenu>,
}

impl Metadata {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let map: Mapping = serde_yaml::from_str(&text)?;
        let base = path.parent().unwrap_or(Path::new("."));

        let identifier =
            get_string(&map, "name").ok_or_else(|| ResourceError::MissingName(path.to_path_buf()))?;

        // Optional sources that fail to decode are dropped with a warning.
        let source = |key: &str| {
            let value = get(&map, key)?;
            Source::from_value(value, Some(base))
                .map_err(|e| log::warn!("{}: {}: {}", path.display(), key, e))
                .ok()
        };

        let custom_menus = match get(&map, "custom_menus") {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_mapping)
                .filter_map(|m| {
                    CustomMenu::from_mapping(m, base)
                        .map_err(|e| log::warn!("{}: {}", path.display(), e))
                        .ok()
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            language: get_string(&map, "language"),
            i18n: get_string(&map, "i18n"),
            destinations: source("destinations"),
            tours: source("tours"),
            conversation: source("conversation"),
            custom_menus,
            identifier,
        })
    }
}

/// A resource bundle on disk.
#[derive(Debug, Clone)]
pub struct Resource {
    base: PathBuf,
    metadata: Metadata,
    strings: StringTable,
}

impl Resource {
    pub fn open(dir: &Path) -> Result<Self> {
        let metadata = Metadata::load(&dir.join(METADATA_FILE_NAME))?;
        let strings = match &metadata.i18n {
            Some(sub) => StringTable::load_dir(&dir.join(sub)),
            None => StringTable::default(),
        };
        Ok(Self {
            base: dir.to_path_buf(),
            metadata,
            strings,
        })
    }

    /// Directory of the bundle; unique per resource.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn identifier(&self) -> &str {
        &self.metadata.identifier
    }

    /// Display name: the identifier localized through the string tables.
    pub fn name(&self, lang: &Language) -> String {
        self.strings.localize(&self.metadata.identifier, lang, &[])
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Default language declared by the bundle.
    pub fn default_language(&self) -> Language {
        self.metadata
            .language
            .as_deref()
            .map(Language::new)
            .unwrap_or_default()
    }

    /// Languages with a string table, plus the default language.
    pub fn languages(&self) -> Vec<String> {
        let mut langs = self.strings.languages();
        let default = self.default_language().tag().to_string();
        if !langs.contains(&default) {
            langs.push(default);
        }
        langs
    }

    pub fn custom_menus(&self) -> &[CustomMenu] {
        &self.metadata.custom_menus
    }

    /// Build the destination and tour graphs for `lang`.
    ///
    /// Each list loads on its own: a list that cannot be read is left empty
    /// and its failure recorded in [`ActiveResource::errors`].
    pub fn activate(&self, lang: &Language) -> ActiveResource {
        let mut errors = Vec::new();
        let destinations = match &self.metadata.destinations {
            Some(source) => load_destinations(source, lang).unwrap_or_else(|e| {
                log::warn!("{}: destinations not loaded: {}", self.identifier(), e);
                errors.push(format!("destinations: {}", e));
                Vec::new()
            }),
            None => Vec::new(),
        };
        let tours = match &self.metadata.tours {
            Some(source) => load_tours(source, lang).unwrap_or_else(|e| {
                log::warn!("{}: tours not loaded: {}", self.identifier(), e);
                errors.push(format!("tours: {}", e));
                Vec::new()
            }),
            None => Vec::new(),
        };
        log::info!(
            "Activated resource {} ({} destinations, {} tours)",
            self.identifier(),
            destinations.len(),
            tours.len()
        );
        ActiveResource {
            resource: self.clone(),
            destinations,
            tours,
            errors,
        }
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

/// Graphs built for one activation.
#[derive(Debug, Clone)]
pub struct ActiveResource {
    pub resource: Resource,
    pub destinations: Vec<Destination>,
    pub tours: Vec<Arc<Tour>>,
    /// Lists that failed to load
    pub errors: Vec<String>,
}

impl ActiveResource {
    pub fn tour(&self, id: &str) -> Option<Arc<Tour>> {
        self.tours.iter().find(|t| t.id == id).cloned()
    }

    /// Destination by navigation value, searched in the top-level list.
    pub fn destination(&self, value: &str) -> Option<&Destination> {
        self.destinations
            .iter()
            .find(|d| d.value.as_deref() == Some(value))
    }
}

/// All resource bundles under one root directory.
#[derive(Debug, Default)]
pub struct ResourceManager {
    root: PathBuf,
    resources: Vec<Resource>,
}

impl ResourceManager {
    pub fn new(root: &Path, lang: &Language) -> Self {
        let mut manager = Self {
            root: root.to_path_buf(),
            resources: Vec::new(),
        };
        manager.update_resources(lang);
        manager
    }

    /// Rescan the root. Directories without metadata are skipped, bundles
    /// with broken metadata are logged and skipped.
    pub fn update_resources(&mut self, lang: &Language) {
        let mut list = Vec::new();
        match fs::read_dir(&self.root) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let dir = entry.path();
                    if !dir.join(METADATA_FILE_NAME).is_file() {
                        continue;
                    }
                    match Resource::open(&dir) {
                        Ok(resource) => list.push(resource),
                        Err(e) => log::warn!("Skipping resource {}: {}", dir.display(), e),
                    }
                }
            }
            Err(e) => log::warn!("Cannot list resources at {}: {}", self.root.display(), e),
        }
        list.sort_by_cached_key(|r| r.name(lang));
        self.resources = list;
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, identifier: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.identifier() == identifier)
    }

    /// Map `content://path` to a file under the resource root.
    /// Paths that would leave the root are rejected.
    pub fn resolve_content_url(&self, url: &str) -> Option<PathBuf> {
        let rest = url.strip_prefix(CONTENT_SCHEME)?;
        let mut path = self.root.clone();
        for component in Path::new(rest).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    log::warn!("Rejected content path {}", url);
                    return None;
                }
            }
        }
        Some(path)
    }
}
