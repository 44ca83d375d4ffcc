//! Localized text and language selection.
//!
//! Resource files carry display text and pronunciation per language using
//! the `base[-LANG][-pron]` key convention:
//!
//! ```yaml
//! title: Lobby          # Base text
//! title-pron: lobby     # Base pronunciation
//! title-ja: ロビー
//! title-ja-pron: ろびー
//! ```
//!
//! There is no process-wide "current language". Every lookup takes the
//! active [`Language`] explicitly, so a language switch takes effect on the
//! next call without rebuilding any resource.

use crate::yaml::scalar_string;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

/// Key of the language-neutral entry.
pub const BASE_LANG: &str = "Base";

const PRON_SUFFIX: &str = "-pron";
const PLACEHOLDER: &str = "%@";

/// Active language tag (`en`, `ja-JP`, `zh-Hans`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    tag: String,
}

impl Language {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag: String = tag.into();
        Self {
            tag: tag.trim().replace('_', "-"),
        }
    }

    /// Full tag as configured.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Primary language subtag (`ja` for `ja-JP`), `en` when unset.
    pub fn code(&self) -> &str {
        self.tag
            .split('-')
            .next()
            .filter(|c| !c.is_empty())
            .unwrap_or("en")
    }

    /// Keys to try, most specific first.
    fn candidates(&self) -> [&str; 3] {
        [self.tag(), self.code(), BASE_LANG]
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::new("en")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

/// Display text plus pronunciation, per language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedText {
    text: BTreeMap<String, String>,
    pron: BTreeMap<String, String>,
}

impl LocalizedText {
    /// Text with only a Base entry.
    pub fn new(base: impl Into<String>) -> Self {
        Self::default().with(BASE_LANG, base)
    }

    pub fn with(mut self, lang: &str, text: impl Into<String>) -> Self {
        self.text.insert(lang.to_string(), text.into());
        self
    }

    pub fn with_pron(mut self, lang: &str, pron: impl Into<String>) -> Self {
        self.pron.insert(lang.to_string(), pron.into());
        self
    }

    /// Collect every `base_key[-LANG][-pron]` entry of a YAML map.
    ///
    /// Keys that merely start with `base_key` (e.g. `titleColor` for
    /// `title`) are ignored, as are non-scalar values.
    pub fn from_mapping(map: &Mapping, base_key: &str) -> Self {
        let mut out = Self::default();
        for (key, value) in map {
            let Some(key) = key.as_str() else { continue };
            let Some(rest) = key.strip_prefix(base_key) else {
                continue;
            };
            if !(rest.is_empty() || rest.starts_with('-')) {
                continue;
            }
            let Some(value) = scalar_string(value) else {
                continue;
            };
            let (rest, is_pron) = match rest.strip_suffix(PRON_SUFFIX) {
                Some(stripped) => (stripped, true),
                None => (rest, false),
            };
            let lang = match rest.strip_prefix('-') {
                Some(lang) if !lang.is_empty() => lang,
                Some(_) => continue,
                None => BASE_LANG,
            };
            let target = if is_pron { &mut out.pron } else { &mut out.text };
            target.insert(lang.to_string(), value);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pron.is_empty()
    }

    /// Languages with display text, Base included.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.text.keys().map(String::as_str)
    }

    fn entry_key<'a>(&self, lang: &'a Language) -> Option<&'a str> {
        lang.candidates()
            .into_iter()
            .find(|key| self.text.contains_key(*key))
    }

    /// Display text for `lang`, falling back to Base, then to "".
    pub fn text(&self, lang: &Language) -> &str {
        self.entry_key(lang)
            .and_then(|key| self.text.get(key))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Pronunciation paired with the text [`text`](Self::text) would return.
    /// Falls back to the display text when no pronunciation is given.
    pub fn pron(&self, lang: &Language) -> &str {
        match self.entry_key(lang) {
            Some(key) => self
                .pron
                .get(key)
                .or_else(|| self.text.get(key))
                .map(String::as_str)
                .unwrap_or(""),
            None => self.pron.get(BASE_LANG).map(String::as_str).unwrap_or(""),
        }
    }
}

/// Per-language key → template tables for keyed localization.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    tables: HashMap<String, HashMap<String, String>>,
}

impl StringTable {
    /// Load every `<lang>.yaml` in `dir`. Unreadable or malformed tables are
    /// logged and skipped; a missing directory yields an empty table.
    pub fn load_dir(dir: &Path) -> Self {
        let mut table = Self::default();
        let Ok(entries) = fs::read_dir(dir) else {
            log::debug!("No string tables at {}", dir.display());
            return table;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_yaml::from_str::<Mapping>(&s).map_err(|e| e.to_string()))
            {
                Ok(map) => {
                    for (key, value) in &map {
                        if let (Some(key), Some(value)) = (key.as_str(), scalar_string(value)) {
                            table.insert(lang, key, value);
                        }
                    }
                }
                Err(e) => log::warn!("Skipping string table {}: {}", path.display(), e),
            }
        }
        table
    }

    pub fn insert(&mut self, lang: &str, key: &str, template: impl Into<String>) {
        self.tables
            .entry(lang.to_string())
            .or_default()
            .insert(key.to_string(), template.into());
    }

    /// Languages that have a table, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.tables.keys().cloned().collect();
        langs.sort();
        langs
    }

    pub fn lookup(&self, key: &str, lang: &Language) -> Option<&str> {
        lang.candidates()
            .into_iter()
            .find_map(|l| self.tables.get(l).and_then(|t| t.get(key)))
            .map(String::as_str)
    }

    /// Localize `key` for `lang` and substitute `args`. An unknown key
    /// localizes to itself, so missing translations stay readable.
    pub fn localize(&self, key: &str, lang: &Language, args: &[&str]) -> String {
        let template = self.lookup(key, lang).unwrap_or(key);
        format_template(template, args)
    }
}

/// Replace successive `%@` placeholders with `args`. Surplus placeholders
/// become empty, surplus args are ignored.
pub fn format_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut parts = template.split(PLACEHOLDER);
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for part in parts {
        if let Some(arg) = args.next() {
            out.push_str(arg);
        }
        out.push_str(part);
    }
    out
}

/// Text resolved through a [`StringTable`] when it is displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedText {
    key: String,
    args: Vec<String>,
}

impl KeyedText {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn resolve(&self, table: &StringTable, lang: &Language) -> String {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        table.localize(&self.key, lang, &args)
    }
}

impl From<&Value> for LocalizedText {
    /// A bare scalar is a Base-only text.
    fn from(value: &Value) -> Self {
        scalar_string(value).map(Self::new).unwrap_or_default()
    }
}
