//! Destinations: navigable points and sub-menus.

use crate::i18n::{Language, LocalizedText};
use crate::reference::{resolve, Context, Reference, Referable, Resolution};
use crate::source::Source;
use crate::tour::{Tour, TourDraft};
use crate::yaml::{get, get_string};
use serde_yaml::{Mapping, Value};
use std::sync::{Arc, Weak};

/// Secondary point where the robot may wait for the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitingDestination {
    pub value: Option<String>,
    pub title: LocalizedText,
}

impl WaitingDestination {
    fn from_mapping(map: &Mapping) -> Self {
        Self {
            value: get_string(map, "value"),
            title: LocalizedText::from_mapping(map, "title"),
        }
    }
}

/// One entry of a destination list.
///
/// A destination with `file` is a sub-menu: its `file` lists further
/// destinations. Otherwise `value` is the navigation node id sent to the
/// robot. Resolution problems are recorded in `error` / `warning` and never
/// abort loading.
#[derive(Debug, Clone, Default)]
pub struct Destination {
    pub title: LocalizedText,
    pub value: Option<String>,
    pub file: Option<Source>,
    pub summary_message: Option<Source>,
    pub start_message: Option<Source>,
    pub arrive_messages: Vec<Source>,
    pub content: Option<Source>,
    pub waiting_destination: Option<WaitingDestination>,
    pub subtour: Option<Arc<Tour>>,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub reference: Option<Reference>,
    pub(crate) parent: Option<Weak<Tour>>,
}

impl Destination {
    /// Navigable destination with a Base title.
    pub fn new(title: &str, value: &str) -> Self {
        Self {
            title: LocalizedText::new(title),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    /// Placeholder for an entry that could not be decoded at all.
    pub(crate) fn invalid(location: &str, reason: &str) -> Self {
        Self {
            error: Some(format!("{}: {}", location, reason)),
            ..Default::default()
        }
    }

    pub fn is_submenu(&self) -> bool {
        self.file.is_some()
    }

    /// Owning tour, if this destination was loaded as part of one.
    pub fn parent(&self) -> Option<Arc<Tour>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Title for `lang`; an untitled destination inside a tour borrows the
    /// tour's title.
    pub fn display_title(&self, lang: &Language) -> String {
        let own = self.title.text(lang);
        if !own.is_empty() {
            return own.to_string();
        }
        self.parent()
            .map(|tour| tour.title.text(lang).to_string())
            .unwrap_or_default()
    }

    pub fn pron(&self, lang: &Language) -> String {
        let own = self.title.pron(lang);
        if !own.is_empty() {
            return own.to_string();
        }
        self.parent()
            .map(|tour| tour.title.pron(lang).to_string())
            .unwrap_or_default()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Fill every absent attribute from `target`.
    fn inherit_from(&mut self, target: Destination) {
        if self.title.is_empty() {
            self.title = target.title;
        }
        if self.value.is_none() {
            self.value = target.value;
        }
        if self.file.is_none() {
            self.file = target.file;
        }
        if self.summary_message.is_none() {
            self.summary_message = target.summary_message;
        }
        if self.start_message.is_none() {
            self.start_message = target.start_message;
        }
        if self.arrive_messages.is_empty() {
            self.arrive_messages = target.arrive_messages;
        }
        if self.content.is_none() {
            self.content = target.content;
        }
        if self.waiting_destination.is_none() {
            self.waiting_destination = target.waiting_destination;
        }
        if self.subtour.is_none() {
            self.subtour = target.subtour;
        }
    }
}

impl PartialEq for Destination {
    fn eq(&self, other: &Self) -> bool {
        match (&self.file, &other.file, &self.value, &other.value) {
            (Some(a), Some(b), _, _) => a.kind() == b.kind() && a.pattern() == b.pattern(),
            (_, _, Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Errors and warnings collected while decoding one node.
#[derive(Default)]
pub(crate) struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Diagnostics {
    pub(crate) fn error(&mut self, msg: String) {
        self.errors.push(msg);
    }

    pub(crate) fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    fn join(list: Vec<String>) -> Option<String> {
        (!list.is_empty()).then(|| list.join("; "))
    }

    pub(crate) fn finish(self) -> (Option<String>, Option<String>) {
        (Self::join(self.errors), Self::join(self.warnings))
    }
}

fn source_field(
    map: &Mapping,
    key: &str,
    ctx: &Context,
    location: &str,
    diag: &mut Diagnostics,
) -> Option<Source> {
    let value = get(map, key)?;
    match Source::from_value(value, ctx.dir()) {
        Ok(source) => Some(source),
        Err(e) => {
            diag.warn(format!("{}: {}: {}", location, key, e));
            None
        }
    }
}

impl Referable for Destination {
    const MAX_DEPTH: usize = 10;
    const ID_KEY: &'static str = "value";

    fn decode(map: &Mapping, ctx: &Context, location: &str) -> Self {
        let mut diag = Diagnostics::default();

        let mut dest = Destination {
            title: LocalizedText::from_mapping(map, "title"),
            value: get_string(map, "value"),
            file: source_field(map, "file", ctx, location, &mut diag),
            summary_message: source_field(map, "summaryMessage", ctx, location, &mut diag),
            start_message: source_field(map, "startMessage", ctx, location, &mut diag),
            content: source_field(map, "content", ctx, location, &mut diag),
            ..Default::default()
        };

        if let Some(list) = get(map, "arriveMessages") {
            match list {
                Value::Sequence(items) => {
                    for (i, item) in items.iter().enumerate() {
                        match Source::from_value(item, ctx.dir()) {
                            Ok(source) => dest.arrive_messages.push(source),
                            Err(e) => diag.warn(format!("{}: arriveMessages[{}]: {}", location, i, e)),
                        }
                    }
                }
                _ => diag.warn(format!("{}: arriveMessages is not a list", location)),
            }
        }

        match get(map, "waitingDestination") {
            Some(Value::Mapping(w)) => dest.waiting_destination = Some(WaitingDestination::from_mapping(w)),
            Some(_) => diag.warn(format!("{}: waitingDestination is not a map", location)),
            None => {}
        }

        match get(map, "subtour") {
            Some(Value::Mapping(t)) => {
                let draft = TourDraft::decode(t, ctx, &format!("{}.subtour", location));
                if let Some(e) = &draft.error {
                    diag.error(format!("{}: {}", location, e));
                }
                dest.subtour = Some(draft.into_tour());
            }
            Some(_) => diag.warn(format!("{}: subtour is not a map", location)),
            None => {}
        }

        if let Some(raw) = get_string(map, "ref") {
            dest.reference = raw.parse().ok();
            match resolve::<Destination>(&raw, ctx) {
                Resolution::Found(target) => {
                    if let Some(e) = &target.error {
                        diag.error(format!("{}: {}", location, e));
                    }
                    if let Some(w) = &target.warning {
                        diag.warn(format!("{}: {}", location, w));
                    }
                    dest.inherit_from(target);
                }
                failed => {
                    if let Some(msg) = failed.failure(&raw) {
                        diag.error(format!("{}: {}", location, msg));
                    }
                }
            }
        }

        if let Some(waiting) = dest.waiting_destination.as_mut() {
            if waiting.title.is_empty() {
                waiting.title = dest.title.clone();
            }
        }

        if dest.title.is_empty() && dest.value.is_none() && dest.file.is_none() {
            diag.error(format!("{}: no title, value or file", location));
        }

        (dest.error, dest.warning) = diag.finish();
        dest
    }
}
