//! Navigation driver
//!
//! Applies robot navigation events to the session's [`TourManager`] and
//! sends each new destination through a [`CommandService`]. What the user
//! should hear or see comes back as a list of [`Reaction`]s; speaking and
//! opening content belong to the caller.
//!
//! | event         | effect                                                  |
//! |---------------|---------------------------------------------------------|
//! | `next`        | proceed to the next queued destination                  |
//! | `arrived`     | mark current as arrived, build the arrival announcement |
//! | `subtour`     | queue the arrived destination's subtour, then proceed   |
//! | `skip`        | drop current (or next) destination                      |
//! | `content`     | open the given URL                                      |
//! | `sound`       | play the named cue                                      |
//! | `getlanguage` | reply with `manage lang-<code>`                         |

use crate::messages::{
    CANCEL_DESTINATION, ManageCommand, NavigationEventRequest, NavigationEventType,
};
use crate::service::CommandService;
use disha_resource::{Destination, Language, StringTable, Tour, TourManager};
use std::sync::Arc;

/// Sound cue played when navigation starts
pub const START_SOUND: &str = "start";

/// Sound cue played on arrival
pub const ARRIVED_SOUND: &str = "arrived";

/// Output for the speech and display collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Pronunciation text to speak
    Speak(String),
    Sound(String),
    /// Content to show, after any speech in the same batch
    OpenContent(String),
    /// A settings value the robot asked for
    SettingRequested(NavigationEventType),
    /// Pause or resume speech; the new state is shared as `SpeakState`
    ToggleSpeakState,
}

pub struct Navigator {
    service: Arc<dyn CommandService>,
    tours: TourManager,
    strings: StringTable,
    lang: Language,
}

impl Navigator {
    pub fn new(service: Arc<dyn CommandService>, strings: StringTable, lang: Language) -> Self {
        Self {
            service,
            tours: TourManager::new(),
            strings,
            lang,
        }
    }

    pub fn language(&self) -> &Language {
        &self.lang
    }

    pub fn set_language(&mut self, lang: Language) {
        self.lang = lang;
    }

    pub fn tours(&self) -> &TourManager {
        &self.tours
    }

    /// Replace the queue with `tour`; navigation starts on the next `next`
    pub fn set_tour(&mut self, tour: Arc<Tour>) -> Vec<Reaction> {
        self.cancel_current();
        self.tours.set_tour(tour);
        vec![self.need_to_start()]
    }

    pub fn add_destination(&mut self, dest: Destination) -> Vec<Reaction> {
        let idle = !self.tours.has_destination();
        self.tours.add_to_last(dest);
        if idle {
            vec![self.need_to_start()]
        } else {
            Vec::new()
        }
    }

    /// Cancel the robot's current goal and keep it queued
    pub fn cancel(&mut self) -> bool {
        let sent = self.service.send_destination(CANCEL_DESTINATION);
        self.tours.stop_current();
        sent
    }

    /// Cancel and forget every destination
    pub fn clear(&mut self) -> bool {
        let sent = self.cancel_current();
        self.tours.clear_all();
        sent
    }

    pub fn handle(&mut self, request: &NavigationEventRequest) -> Vec<Reaction> {
        log::info!("Navigation event {:?} ({})", request.kind, request.request_id);
        match request.kind {
            NavigationEventType::Next => self.next(),
            NavigationEventType::Arrived => self.arrived(),
            NavigationEventType::Subtour => self.subtour(),
            NavigationEventType::Skip => self.skip(),
            NavigationEventType::Content => vec![Reaction::OpenContent(request.param.clone())],
            NavigationEventType::Sound => vec![Reaction::Sound(request.param.clone())],
            NavigationEventType::GetLanguage => {
                self.service.manage(ManageCommand::Lang, Some(self.lang.code()));
                Vec::new()
            }
            NavigationEventType::GetHandleSide
            | NavigationEventType::GetTouchMode
            | NavigationEventType::GetSpeakerAudioFiles => {
                vec![Reaction::SettingRequested(request.kind)]
            }
            NavigationEventType::ToggleSpeakState => {
                vec![Reaction::ToggleSpeakState]
            }
            NavigationEventType::ToggleConversation | NavigationEventType::Unknown => Vec::new(),
        }
    }

    pub fn next(&mut self) -> Vec<Reaction> {
        match self.tours.proceed_to_next_destination() {
            Some(dest) => self.destination_changed(&dest),
            None => vec![Reaction::Speak(self.text("No destination is selected", &[]))],
        }
    }

    fn arrived(&mut self) -> Vec<Reaction> {
        let setting = self.tours.setting();
        let Some(dest) = self.tours.arrived_current().cloned() else {
            log::debug!("Arrived with no current destination");
            return Vec::new();
        };
        let pron = dest.pron(&self.lang);
        let mut announce = self.text("You have arrived at %@. ", &[&pron]);

        if !dest.arrive_messages.is_empty() {
            for message in &dest.arrive_messages {
                announce.push_str(&message.content(&self.lang).unwrap_or_default());
            }
        } else {
            let has_content = dest
                .content
                .as_ref()
                .and_then(|c| c.content(&self.lang))
                .is_some();
            if has_content && setting.show_content_when_arrive {
                announce.push_str(&self.text("You can check detail of %@ on the phone. ", &[&pron]));
            }
            let subtour = dest
                .subtour
                .as_ref()
                .filter(|_| setting.enable_subtour_on_handle)
                .map(|tour| tour.introduction.pron(&self.lang).to_string());
            match (self.tours.next_destination(), subtour) {
                (Some(next), subtour) => {
                    let next = next.pron(&self.lang);
                    announce.push_str(&self.text(
                        "You can proceed to %@ by pressing the right button of the suitcase handle. ",
                        &[&next],
                    ));
                    if let Some(intro) = subtour {
                        announce.push_str(&self.text(
                            "Or by pressing the center button to proceed a subtour %@.",
                            &[&intro],
                        ));
                    }
                }
                (None, Some(intro)) => {
                    announce.push_str(
                        &self.text("Press the center button to proceed a subtour %@.", &[&intro]),
                    );
                }
                (None, None) => {}
            }
        }

        let mut reactions = vec![Reaction::Sound(ARRIVED_SOUND.to_string()), Reaction::Speak(announce)];
        if setting.show_content_when_arrive
            && let Some(url) = dest.content.as_ref().and_then(|c| c.resolved_url(&self.lang))
        {
            reactions.push(Reaction::OpenContent(url.to_string()));
        }
        reactions
    }

    fn subtour(&mut self) -> Vec<Reaction> {
        if !self.tours.setting().enable_subtour_on_handle {
            return Vec::new();
        }
        let subtour = self
            .tours
            .arrived_destination()
            .and_then(|d| d.subtour.clone());
        if let Some(subtour) = subtour {
            self.tours.add_subtour(&subtour);
        }
        match self.tours.proceed_to_next_destination() {
            Some(dest) => self.destination_changed(&dest),
            None => Vec::new(),
        }
    }

    fn skip(&mut self) -> Vec<Reaction> {
        let Some(skipped) = self.tours.skip_destination() else {
            return Vec::new();
        };
        let pron = skipped.pron(&self.lang);
        vec![Reaction::Speak(self.text("Skip Message %@", &[&pron]))]
    }

    fn destination_changed(&mut self, dest: &Destination) -> Vec<Reaction> {
        let mut reactions = Vec::new();
        let mut dest = dest.clone();
        // Entries without a value can never be sent; drop them
        let value = loop {
            if let Some(value) = dest.value.clone() {
                break value;
            }
            log::warn!(
                "Skipping destination {}: {}",
                dest.display_title(&self.lang),
                dest.error.as_deref().unwrap_or("no value")
            );
            self.tours.skip_destination();
            let pron = dest.pron(&self.lang);
            reactions.push(Reaction::Speak(self.text("Cannot go to %@", &[&pron])));
            match self.tours.proceed_to_next_destination() {
                Some(next) => dest = next,
                None => return reactions,
            }
        };
        if !self.service.send_destination(&value) {
            self.tours.cannot_start_current();
            reactions.push(Reaction::Speak(self.text("Suitcase may not be connected", &[])));
            return reactions;
        }

        let mut announce = self.text("Going to %@", &[&dest.pron(&self.lang)]);
        if let Some(start) = dest.start_message.as_ref().and_then(|s| s.content(&self.lang)) {
            announce.push_str(&start);
        }
        reactions.push(Reaction::Sound(START_SOUND.to_string()));
        reactions.push(Reaction::Speak(announce));
        reactions
    }

    fn cancel_current(&mut self) -> bool {
        if self.tours.current_destination().is_none() {
            return true;
        }
        self.cancel()
    }

    fn need_to_start(&self) -> Reaction {
        Reaction::Speak(self.text(
            "You can proceed by pressing the right button of the suitcase handle",
            &[],
        ))
    }

    fn text(&self, key: &str, args: &[&str]) -> String {
        self.strings.localize(key, &self.lang, args)
    }
}
