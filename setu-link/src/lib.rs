//! SetuLink - Session layer between the guide app and the robot
//!
//! Keeps a session with the robot alive over one or more links, and turns
//! navigation events into tour progress over a [`disha_resource`] graph.
//!
//! ## Architecture
//!
//! ```text
//!   TcpConnector ──► TransportClient(TCP) ───┐ TransportEvent
//!                                            ├──────────────► Dispatcher ──► Navigator
//!   SerialConnector ► TransportClient(Serial)┘  (crossbeam)   (dedup, mode)    │
//!          ▲                    ▲                                              │
//!          └──── FallbackService (sticky selection) ◄── commands ──────────────┘
//! ```
//!
//! - [`client`]: connection lifecycle, heartbeat, liveness, acks
//! - [`wire`], [`messages`]: framing and the message catalogue
//! - [`link`]: TCP, serial and mock links
//! - [`fallback`]: transport selection for outbound commands
//! - [`session`], [`dedup`]: inbound filtering across transports
//! - [`navigator`]: navigation events applied to the tour queue
//! - [`logpack`]: coalescing of repeated status logs
//! - [`upload`]: chunked log upload

pub mod address;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fallback;
pub mod link;
pub mod logpack;
pub mod messages;
pub mod navigator;
pub mod onboard;
pub mod service;
pub mod session;
pub mod status;
pub mod upload;
pub mod wire;

pub use client::{ClientEvent, ClientOptions, ConnectionState, TransportClient, TransportEvent};
pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use fallback::FallbackService;
pub use messages::{ModeType, TransportKind};
pub use navigator::{Navigator, Reaction};
pub use service::{CommandService, TransportService};
pub use session::{Dispatcher, SessionEvent};
