//! Session-scoped navigation queue.
//!
//! The resource graph is immutable; what the user is currently doing with
//! it lives here:
//!
//! ```text
//!   queue: [d2, d3, d4]     proceed ──► current: d1 ── arrived ──► arrived: d1
//!            ▲                               │
//!            └──── cannot_start / stop ──────┘
//! ```

use crate::destination::Destination;
use crate::tour::{NavigationSetting, Tour};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct TourManager {
    tour: Option<Arc<Tour>>,
    queue: VecDeque<Destination>,
    current: Option<Destination>,
    arrived: Option<Destination>,
    setting: NavigationSetting,
}

impl TourManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with `tour`, starting from its declared start
    /// destination when it has one.
    pub fn set_tour(&mut self, tour: Arc<Tour>) {
        self.clear_all();
        let start = tour
            .current_destination
            .as_deref()
            .and_then(|value| {
                tour.destinations
                    .iter()
                    .position(|d| d.value.as_deref() == Some(value))
            })
            .unwrap_or(0);
        self.queue = tour.destinations.iter().skip(start).cloned().collect();
        self.setting = tour.setting();
        log::info!("Tour {} set with {} destinations", tour.id, self.queue.len());
        self.tour = Some(tour);
    }

    pub fn tour(&self) -> Option<&Arc<Tour>> {
        self.tour.as_ref()
    }

    pub fn setting(&self) -> NavigationSetting {
        self.setting
    }

    pub fn add_to_last(&mut self, dest: Destination) {
        self.queue.push_back(dest);
    }

    pub fn add_to_first(&mut self, dest: Destination) {
        self.queue.push_front(dest);
    }

    /// Insert a subtour's destinations ahead of the remaining queue.
    pub fn add_subtour(&mut self, subtour: &Tour) {
        for dest in subtour.destinations.iter().rev() {
            self.queue.push_front(dest.clone());
        }
    }

    /// Move the next queued destination to current. Returns it, or `None`
    /// when nothing is queued.
    pub fn proceed_to_next_destination(&mut self) -> Option<Destination> {
        if let Some(current) = self.current.take() {
            self.queue.push_front(current);
        }
        let next = self.queue.pop_front()?;
        self.arrived = None;
        self.current = Some(next.clone());
        Some(next)
    }

    pub fn arrived_current(&mut self) -> Option<&Destination> {
        self.arrived = self.current.take();
        self.arrived.as_ref()
    }

    /// Drop the current destination, or the next one when idle.
    pub fn skip_destination(&mut self) -> Option<Destination> {
        self.current.take().or_else(|| self.queue.pop_front())
    }

    /// The current destination could not be sent; queue it again.
    pub fn cannot_start_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.queue.push_front(current);
        }
    }

    /// User cancelled the current navigation; keep it queued.
    pub fn stop_current(&mut self) {
        self.cannot_start_current();
    }

    pub fn clear_all(&mut self) {
        self.tour = None;
        self.queue.clear();
        self.current = None;
        self.arrived = None;
        self.setting = NavigationSetting::default();
    }

    pub fn current_destination(&self) -> Option<&Destination> {
        self.current.as_ref()
    }

    pub fn arrived_destination(&self) -> Option<&Destination> {
        self.arrived.as_ref()
    }

    pub fn next_destination(&self) -> Option<&Destination> {
        self.queue.front()
    }

    pub fn destinations(&self) -> impl Iterator<Item = &Destination> {
        self.queue.iter()
    }

    pub fn first(&self, n: usize) -> Vec<&Destination> {
        self.queue.iter().take(n).collect()
    }

    pub fn has_destination(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }
}
