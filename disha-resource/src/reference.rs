//! Cross-file references.
//!
//! A node can borrow its attributes from an entry in another file:
//!
//! ```yaml
//! - ref: floor2.yaml/201      # destination with `value: 201` in floor2.yaml
//!   title: Meeting room       # present attributes override the target's
//! ```
//!
//! Resolution is depth-bounded so reference cycles terminate. The depth
//! counter is carried through every nested reference, including the
//! destination → subtour → destination chain, and each node type has its own
//! ceiling:
//!
//! | node        | id key  | max depth |
//! |-------------|---------|-----------|
//! | Destination | `value` | 10        |
//! | Tour        | `id`    | 5         |

use crate::yaml::get_string;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Parsed `file/value` reference. The split is at the last `/`, so the file
/// part may contain directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub file: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError;

impl FromStr for Reference {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, value) = s.trim().rsplit_once('/').ok_or(SyntaxError)?;
        if file.is_empty() || value.is_empty() {
            return Err(SyntaxError);
        }
        Ok(Self {
            file: file.to_string(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file, self.value)
    }
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
    Multiple(usize),
    TooDeep,
    Unreadable(String),
    Syntax,
}

impl<T> Resolution<T> {
    /// Human-readable failure, `None` for `Found`.
    pub fn failure(&self, reference: &str) -> Option<String> {
        match self {
            Resolution::Found(_) => None,
            Resolution::NotFound => Some(format!("{}: not found", reference)),
            Resolution::Multiple(n) => Some(format!("{}: multiple found ({})", reference, n)),
            Resolution::TooDeep => Some(format!("{}: reference too deep", reference)),
            Resolution::Unreadable(msg) => Some(format!("{}: {}", reference, msg)),
            Resolution::Syntax => Some(format!("{}: syntax error", reference)),
        }
    }
}

/// Where a node is being decoded from.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    dir: Option<PathBuf>,
    file: String,
    depth: usize,
}

impl Context {
    /// Top-level context for a file at `path`, or for remote content when
    /// `path` is `None`.
    pub(crate) fn root(path: Option<&Path>, name: &str) -> Self {
        Self {
            dir: path.and_then(Path::parent).map(Path::to_path_buf),
            file: name.to_string(),
            depth: 0,
        }
    }

    pub(crate) fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub(crate) fn location(&self, index: usize) -> String {
        format!("{}[{}]", self.file, index)
    }

    fn descend(&self, path: &Path, file: &str) -> Self {
        Self {
            dir: path.parent().map(Path::to_path_buf),
            file: file.to_string(),
            depth: self.depth + 1,
        }
    }
}

/// A node type that can be the target of a reference.
pub(crate) trait Referable: Sized {
    const MAX_DEPTH: usize;
    const ID_KEY: &'static str;

    fn decode(map: &Mapping, ctx: &Context, location: &str) -> Self;
}

pub(crate) fn resolve<T: Referable>(raw: &str, ctx: &Context) -> Resolution<T> {
    let Ok(reference) = raw.parse::<Reference>() else {
        return Resolution::Syntax;
    };
    if ctx.depth >= T::MAX_DEPTH {
        return Resolution::TooDeep;
    }
    let Some(dir) = ctx.dir() else {
        return Resolution::Unreadable("no base directory for reference".into());
    };
    let path = dir.join(&reference.file);

    let entries = match read_sequence(&path) {
        Ok(entries) => entries,
        Err(msg) => return Resolution::Unreadable(msg),
    };

    // Filter on the raw id first; only the match gets decoded.
    let matches: Vec<(usize, &Mapping)> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_mapping().map(|m| (i, m)))
        .filter(|(_, m)| get_string(m, T::ID_KEY).as_deref() == Some(reference.value.as_str()))
        .collect();

    match matches.as_slice() {
        [] => Resolution::NotFound,
        [(index, map)] => {
            let child = ctx.descend(&path, &reference.file);
            let location = child.location(*index);
            Resolution::Found(T::decode(map, &child, &location))
        }
        many => Resolution::Multiple(many.len()),
    }
}

fn read_sequence(path: &Path) -> Result<Vec<Value>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("cannot read file: {}", e))?;
    match serde_yaml::from_str::<Value>(&text) {
        Ok(Value::Sequence(seq)) => Ok(seq),
        Ok(_) => Err("file is not a list".into()),
        Err(e) => Err(format!("YAML parse error: {}", e)),
    }
}
