//! Tours: ordered destination lists with an introduction.
//!
//! ```yaml
//! - id: museum
//!   title: Museum tour
//!   introduction: We will visit three rooms.
//!   currentDestination: room2          # start here instead of the first
//!   setting: {enableSubtourOnHandle: true}
//!   destinations:
//!     - {value: room1, title: Room 1}
//!     - ref: rooms.yaml/room2
//! ```

use crate::destination::{Destination, Diagnostics};
use crate::i18n::LocalizedText;
use crate::reference::{resolve, Context, Referable, Resolution};
use crate::yaml::{get, get_bool, get_string};
use serde_yaml::{Mapping, Value};
use std::sync::Arc;

/// Per-tour behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationSetting {
    /// A hardware button press on arrival may start the destination's subtour.
    pub enable_subtour_on_handle: bool,
    /// Show rich content automatically on arrival.
    pub show_content_when_arrive: bool,
}

impl NavigationSetting {
    fn from_mapping(map: &Mapping) -> Self {
        Self {
            enable_subtour_on_handle: get_bool(map, "enableSubtourOnHandle").unwrap_or(false),
            show_content_when_arrive: get_bool(map, "showContentWhenArrive").unwrap_or(false),
        }
    }
}

#[derive(Debug)]
pub struct Tour {
    pub title: LocalizedText,
    pub id: String,
    pub introduction: LocalizedText,
    pub destinations: Vec<Destination>,
    /// `value` of the destination the tour starts from.
    pub current_destination: Option<String>,
    pub error: Option<String>,
    pub setting: Option<NavigationSetting>,
}

impl Tour {
    /// Build a tour and link every destination back to it.
    pub fn new(
        id: &str,
        title: LocalizedText,
        destinations: Vec<Destination>,
    ) -> Arc<Tour> {
        TourDraft {
            title,
            id: id.to_string(),
            destinations,
            ..Default::default()
        }
        .into_tour()
    }

    pub fn start_destination(&self) -> Option<&Destination> {
        let value = self.current_destination.as_deref()?;
        self.destinations
            .iter()
            .find(|d| d.value.as_deref() == Some(value))
    }

    pub fn setting(&self) -> NavigationSetting {
        self.setting.unwrap_or_default()
    }
}

impl PartialEq for Tour {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A tour before its destinations are linked to it.
#[derive(Debug, Clone, Default)]
pub(crate) struct TourDraft {
    pub(crate) title: LocalizedText,
    pub(crate) id: String,
    pub(crate) introduction: LocalizedText,
    pub(crate) destinations: Vec<Destination>,
    pub(crate) current_destination: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) setting: Option<NavigationSetting>,
}

impl TourDraft {
    pub(crate) fn into_tour(self) -> Arc<Tour> {
        Arc::new_cyclic(|weak| {
            let destinations = self
                .destinations
                .into_iter()
                .map(|mut d| {
                    d.parent = Some(weak.clone());
                    d
                })
                .collect();
            Tour {
                title: self.title,
                id: self.id,
                introduction: self.introduction,
                destinations,
                current_destination: self.current_destination,
                error: self.error,
                setting: self.setting,
            }
        })
    }

    fn inherit_from(&mut self, target: TourDraft) {
        if self.title.is_empty() {
            self.title = target.title;
        }
        if self.id.is_empty() {
            self.id = target.id;
        }
        if self.introduction.is_empty() {
            self.introduction = target.introduction;
        }
        if self.destinations.is_empty() {
            self.destinations = target.destinations;
        }
        if self.current_destination.is_none() {
            self.current_destination = target.current_destination;
        }
        if self.setting.is_none() {
            self.setting = target.setting;
        }
    }
}

impl Referable for TourDraft {
    const MAX_DEPTH: usize = 5;
    const ID_KEY: &'static str = "id";

    fn decode(map: &Mapping, ctx: &Context, location: &str) -> Self {
        let mut diag = Diagnostics::default();
        let mut draft = TourDraft {
            title: LocalizedText::from_mapping(map, "title"),
            id: get_string(map, "id").unwrap_or_default(),
            introduction: LocalizedText::from_mapping(map, "introduction"),
            current_destination: get_string(map, "currentDestination"),
            ..Default::default()
        };

        match get(map, "setting") {
            Some(Value::Mapping(s)) => draft.setting = Some(NavigationSetting::from_mapping(s)),
            Some(_) => diag.error(format!("{}: setting is not a map", location)),
            None => {}
        }

        match get(map, "destinations") {
            Some(Value::Sequence(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let loc = format!("{}.destinations[{}]", location, i);
                    let dest = match item.as_mapping() {
                        Some(m) => Destination::decode(m, ctx, &loc),
                        None => Destination::invalid(&loc, "not a map"),
                    };
                    draft.destinations.push(dest);
                }
            }
            Some(_) => diag.error(format!("{}: destinations is not a list", location)),
            None => {}
        }

        if let Some(raw) = get_string(map, "ref") {
            match resolve::<TourDraft>(&raw, ctx) {
                Resolution::Found(target) => {
                    if let Some(e) = &target.error {
                        diag.error(format!("{}: {}", location, e));
                    }
                    draft.inherit_from(target);
                }
                failed => {
                    if let Some(msg) = failed.failure(&raw) {
                        diag.error(format!("{}: {}", location, msg));
                    }
                }
            }
        }

        if let Some(start) = &draft.current_destination {
            if !draft.destinations.iter().any(|d| d.value.as_ref() == Some(start)) {
                diag.error(format!("{}: currentDestination '{}' is not in the tour", location, start));
            }
        }

        let (error, _) = diag.finish();
        draft.error = error;
        draft
    }
}
