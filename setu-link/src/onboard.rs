//! First-run gate
//!
//! The app leaves onboarding once the radio is powered on and the user has
//! answered both permission prompts. A denied prompt still counts as
//! answered; only the radio has to be in one specific state.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrantState {
    #[default]
    Init,
    Granted,
    Denied,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scene {
    #[default]
    Onboard,
    ResourceSelect,
    App,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OnboardCondition {
    pub radio: RadioState,
    pub notification: GrantState,
    pub location: GrantState,
}

impl OnboardCondition {
    pub fn is_satisfied(&self) -> bool {
        let radio_ready = self.radio == RadioState::PoweredOn;
        let prompts_answered =
            self.notification != GrantState::Init && self.location != GrantState::Init;
        radio_ready && prompts_answered
    }

    /// Scene to show after a state change. A previously chosen resource
    /// skips the selection screen.
    pub fn scene(&self, current: Scene, resource_selected: bool) -> Scene {
        let scene = if self.is_satisfied() && current == Scene::Onboard {
            Scene::ResourceSelect
        } else {
            current
        };
        if scene == Scene::ResourceSelect && resource_selected {
            return Scene::App;
        }
        scene
    }
}
