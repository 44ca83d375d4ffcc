//! Content sources.
//!
//! A source points at a text document either inside the resource bundle or
//! on a remote server:
//!
//! ```yaml
//! content: {type: local, src: "lobby-%@.md"}   # %@ -> language code
//! file:    {type: remote, src: "https://example.org/menu.yaml"}
//! ```
//!
//! Local patterns are joined to the directory of the YAML file that declared
//! them. Content is read on every call; nothing is cached.

use crate::error::{ResourceError, Result};
use crate::i18n::Language;
use crate::yaml::{get_string, normalize_newlines};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const LANG_PLACEHOLDER: &str = "%@";
const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Local,
    Remote,
}

impl SourceKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    base: Option<PathBuf>,
    kind: SourceKind,
    pattern: String,
}

impl Source {
    pub fn local(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            base: Some(base.into()),
            kind: SourceKind::Local,
            pattern: pattern.into(),
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            base: None,
            kind: SourceKind::Remote,
            pattern: url.into(),
        }
    }

    /// Decode a `{type, src}` map. `base` is the directory of the file the
    /// map was read from.
    pub fn from_value(value: &Value, base: Option<&Path>) -> Result<Self> {
        let map = value
            .as_mapping()
            .ok_or_else(|| ResourceError::InvalidSource("expected a map".into()))?;
        let kind = get_string(map, "type")
            .ok_or_else(|| ResourceError::InvalidSource("missing type".into()))?;
        let kind = SourceKind::parse(&kind)
            .ok_or_else(|| ResourceError::InvalidSource(format!("unknown type '{}'", kind)))?;
        let pattern = get_string(map, "src")
            .ok_or_else(|| ResourceError::InvalidSource("missing src".into()))?;
        Ok(Self {
            base: base.map(Path::to_path_buf),
            kind,
            pattern,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Filesystem path of a local source for `lang`.
    pub fn local_path(&self, lang: &Language) -> Option<PathBuf> {
        if self.kind != SourceKind::Local {
            return None;
        }
        let name = self.pattern.replace(LANG_PLACEHOLDER, lang.code());
        let joined = self.base.as_deref()?.join(name);
        std::path::absolute(joined).ok()
    }

    pub fn resolved_url(&self, lang: &Language) -> Option<Url> {
        match self.kind {
            SourceKind::Local => Url::from_file_path(self.local_path(lang)?).ok(),
            SourceKind::Remote => Url::parse(&self.pattern).ok(),
        }
    }

    /// Text content for `lang`, or `None` if it cannot be read.
    pub fn content(&self, lang: &Language) -> Option<String> {
        let text = match self.kind {
            SourceKind::Local => {
                let path = self.local_path(lang)?;
                match fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        log::debug!("Cannot read {}: {}", path.display(), e);
                        return None;
                    }
                }
            }
            SourceKind::Remote => {
                let url = self.resolved_url(lang)?;
                match ureq::get(url.as_str())
                    .timeout(REMOTE_TIMEOUT)
                    .call()
                    .map_err(|e| e.to_string())
                    .and_then(|resp| resp.into_string().map_err(|e| e.to_string()))
                {
                    Ok(text) => text,
                    Err(e) => {
                        log::debug!("Cannot fetch {}: {}", url, e);
                        return None;
                    }
                }
            }
        };
        Some(normalize_newlines(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_pattern_uses_language_code() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("intro-ja.txt"), "ようこそ\r\n").unwrap();
        fs::write(dir.path().join("intro-en.txt"), "Welcome\r\n").unwrap();
        let source = Source::local(dir.path(), "intro-%@.txt");

        assert_eq!(source.content(&Language::new("ja-JP")).as_deref(), Some("ようこそ\n"));
        assert_eq!(source.content(&Language::new("en")).as_deref(), Some("Welcome\n"));
        assert_eq!(source.content(&Language::new("fr")), None);
    }

    #[test]
    fn test_resolved_url_is_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::local(dir.path(), "a.md");
        let url = source.resolved_url(&Language::default()).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/a.md"));
    }

    #[test]
    fn test_remote_url_is_verbatim() {
        let source = Source::remote("https://example.org/guide/menu.yaml");
        let url = source.resolved_url(&Language::new("ja")).unwrap();
        assert_eq!(url.as_str(), "https://example.org/guide/menu.yaml");
        assert_eq!(Source::remote("not a url").resolved_url(&Language::default()), None);
    }

    #[test]
    fn test_from_value() {
        let value: Value = serde_yaml::from_str("{type: local, src: d.yaml}").unwrap();
        let source = Source::from_value(&value, Some(Path::new("/res"))).unwrap();
        assert_eq!(source.kind(), SourceKind::Local);
        assert_eq!(source.pattern(), "d.yaml");

        let bad: Value = serde_yaml::from_str("{type: ftp, src: d.yaml}").unwrap();
        assert!(Source::from_value(&bad, None).is_err());
        let missing: Value = serde_yaml::from_str("{type: local}").unwrap();
        assert!(Source::from_value(&missing, None).is_err());
    }
}
