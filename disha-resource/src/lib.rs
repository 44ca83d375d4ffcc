//! # Disha-Resource: Navigable Resource Model
//!
//! Loads a site's destinations and tours from YAML resource bundles.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use disha_resource::{Language, ResourceManager};
//! use std::path::Path;
//!
//! let lang = Language::new("ja-JP");
//! let manager = ResourceManager::new(Path::new("/opt/guide/resources"), &lang);
//! if let Some(resource) = manager.resource("sample_site") {
//!     let active = resource.activate(&lang);
//!     for dest in &active.destinations {
//!         println!("{} -> {:?}", dest.display_title(&lang), dest.value);
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`i18n`]: localized text, string tables, keyed text
//! - [`source`]: local/remote content sources
//! - [`reference`]: depth-bounded `file/value` reference resolution
//! - [`destination`], [`tour`]: the graph node types
//! - [`loader`]: list file loading with per-node diagnostics
//! - [`resource`]: bundles, metadata and activation
//! - [`tour_manager`]: session navigation queue
//!
//! ## Data Flow
//!
//! ```text
//!   _metadata.yaml ──► Resource ──activate(lang)──► ActiveResource
//!                                   │                 ├─ destinations
//!                                   │                 └─ tours ──► TourManager
//!                                   ▼
//!                         loader ──► reference::resolve (depth-bounded)
//! ```

pub mod destination;
pub mod error;
pub mod i18n;
pub mod loader;
pub mod reference;
pub mod resource;
pub mod source;
pub mod tour;
pub mod tour_manager;
mod yaml;

pub use destination::{Destination, WaitingDestination};
pub use error::{ResourceError, Result};
pub use i18n::{format_template, KeyedText, Language, LocalizedText, StringTable, BASE_LANG};
pub use loader::{load_destinations, load_destinations_file, load_tours, load_tours_file};
pub use reference::{Reference, Resolution};
pub use resource::{ActiveResource, CustomMenu, Metadata, Resource, ResourceManager};
pub use source::{Source, SourceKind};
pub use tour::{NavigationSetting, Tour};
pub use tour_manager::TourManager;
