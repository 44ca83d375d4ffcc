//! SetuLink - guide session daemon
//!
//! Connects to the robot over every enabled link, loads the selected
//! resource bundle, and drives tours from robot navigation events.
//!
//! # Usage
//!
//! ```bash
//! setu-link --config link.toml --resource sample_site --lang ja
//! ```
//!
//! Commands are read from stdin, one per line:
//!
//! | command                  | effect                                  |
//! |--------------------------|-----------------------------------------|
//! | `tour <id>`              | replace the queue with a tour           |
//! | `go <value>`             | queue a single destination              |
//! | `next`                   | proceed to the next destination         |
//! | `cancel` / `clear`       | cancel the current goal / everything    |
//! | `summon <value>`         | call the robot to a destination         |
//! | `manage <cmd> [param]`   | send a manage command                   |
//! | `select tcp\|serial\|auto` | choose the preferred transport          |
//! | `quit`                   | exit                                    |

use clap::Parser;
use crossbeam_channel::{Receiver, never, select, unbounded};
use disha_resource::{ActiveResource, Language, ResourceManager, StringTable};
use setu_link::link::{Connector, SerialConnector, TcpConnector};
use setu_link::messages::ManageCommand;
use setu_link::{
    ClientOptions, CommandService, Dispatcher, FallbackService, LinkConfig, LinkError, Navigator,
    Reaction, Result, SessionEvent, TransportClient, TransportKind, TransportService,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "setu-link")]
#[command(about = "Guide session daemon")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "link.toml")]
    config: PathBuf,

    /// Resource identifier to activate
    #[arg(short, long)]
    resource: Option<String>,

    /// Language tag, e.g. en or ja-JP
    #[arg(short, long)]
    lang: Option<String>,

    /// Robot address, may be given twice (primary, secondary)
    #[arg(short, long)]
    address: Vec<String>,
}

/// Set up a Ctrl-C handler that clears the returned flag.
fn setup_ctrl_c_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| LinkError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;
    Ok(running)
}

fn load_config(args: &Args) -> Result<LinkConfig> {
    let mut config = if args.config.exists() {
        LinkConfig::load(&args.config)?
    } else {
        LinkConfig::default()
    };
    if let Some(resource) = &args.resource {
        config.resource.identifier = Some(resource.clone());
    }
    if let Some(lang) = &args.lang {
        config.resource.language = lang.clone();
    }
    if !args.address.is_empty() {
        config.tcp.addresses = args.address.clone();
    }
    Ok(config)
}

fn activate(config: &LinkConfig, lang: &Language) -> Option<ActiveResource> {
    let manager = ResourceManager::new(&config.resource.root, lang);
    let resource = match &config.resource.identifier {
        Some(id) => manager.resource(id),
        None => manager.resources().first(),
    };
    let Some(resource) = resource else {
        log::warn!("No resource found under {}", config.resource.root.display());
        return None;
    };
    let active = resource.activate(lang);
    log::info!(
        "Resource {}: {} destinations, {} tours",
        active.resource.name(lang),
        active.destinations.len(),
        active.tours.len()
    );
    Some(active)
}

fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn report(reactions: Vec<Reaction>) {
    for reaction in reactions {
        match reaction {
            Reaction::Speak(text) => log::info!("Speak: {}", text),
            other => log::info!("{:?}", other),
        }
    }
}

fn handle_event(event: SessionEvent, navigator: &mut Navigator) {
    match event {
        SessionEvent::Navigate(request) => report(navigator.handle(&request)),
        SessionEvent::Connection {
            transport,
            connected,
        } => {
            log::info!(
                "{} {}",
                transport,
                if connected { "connected" } else { "disconnected" }
            );
        }
        SessionEvent::Version {
            transport,
            version,
            matched: false,
        } => {
            log::warn!("{}: robot version {} does not match", transport, version);
        }
        SessionEvent::Speak(request) => log::info!("Robot speech: {}", request.text),
        other => log::debug!("{:?}", other),
    }
}

/// Returns false when the user asked to quit
fn run_command(
    line: &str,
    navigator: &mut Navigator,
    fallback: &FallbackService,
    active: Option<&ActiveResource>,
) -> bool {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return true;
    };
    let arg = parts.next();
    match (command, arg) {
        ("quit" | "exit", _) => return false,
        ("tour", Some(id)) => match active.and_then(|a| a.tour(id)) {
            Some(tour) => report(navigator.set_tour(tour)),
            None => log::warn!("Unknown tour {}", id),
        },
        ("go", Some(value)) => match active.and_then(|a| a.destination(value)) {
            Some(dest) => report(navigator.add_destination(dest.clone())),
            None => log::warn!("Unknown destination {}", value),
        },
        ("next", _) => report(navigator.next()),
        ("cancel", _) => {
            navigator.cancel();
        }
        ("clear", _) => {
            navigator.clear();
        }
        ("summon", Some(value)) => {
            fallback.summon(value);
        }
        ("manage", Some(cmd)) => match ManageCommand::parse(cmd) {
            Some(cmd) => {
                fallback.manage(cmd, parts.next());
            }
            None => log::warn!("Unknown manage command {}", cmd),
        },
        ("select", Some(kind)) => {
            let kind = match kind {
                "tcp" => Some(TransportKind::Tcp),
                "serial" => Some(TransportKind::Serial),
                _ => None,
            };
            fallback.select(kind);
            log::info!("Transport preference: {:?}", kind);
        }
        _ => log::warn!("Unknown command: {}", line),
    }
    true
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();

    log::info!("SetuLink v{} starting...", env!("CARGO_PKG_VERSION"));
    if args.config.exists() {
        log::info!("Using config: {}", args.config.display());
    } else {
        log::info!("Config {} not found, using defaults", args.config.display());
    }

    let running = setup_ctrl_c_handler()?;
    let lang = Language::new(config.resource.language.as_str());
    let active = activate(&config, &lang);
    let strings = active
        .as_ref()
        .map(|a| a.resource.strings().clone())
        .unwrap_or_else(StringTable::default);

    let (events_tx, events_rx) = unbounded();
    let mut clients: Vec<Arc<TransportClient>> = Vec::new();
    let mut links: Vec<(TransportKind, Box<dyn Connector>)> = Vec::new();
    if config.tcp.enabled {
        links.push((TransportKind::Tcp, Box::new(TcpConnector::new(config.tcp.port))));
    }
    if config.serial.enabled {
        links.push((
            TransportKind::Serial,
            Box::new(SerialConnector::new(config.serial.baud_rate)),
        ));
    }
    for (kind, connector) in links {
        let client = TransportClient::new(
            ClientOptions::from_config(kind, &config),
            connector,
            events_tx.clone(),
        );
        client.start()?;
        clients.push(Arc::new(client));
    }
    if clients.is_empty() {
        return Err(LinkError::Config("No transport enabled".to_string()));
    }

    let services: Vec<Arc<dyn TransportService>> = clients
        .iter()
        .map(|c| Arc::clone(c) as Arc<dyn TransportService>)
        .collect();
    let fallback = Arc::new(FallbackService::new(services));
    let dispatcher = Dispatcher::new(config.device.mode);
    let mut navigator = Navigator::new(fallback.clone(), strings, lang);
    let commands = stdin_lines();
    let closed = never();
    let mut stdin_open = true;
    let mut quit = false;

    while running.load(Ordering::SeqCst) && !quit {
        // Status events and stdin commands; timeout to check the running flag
        select! {
            recv(events_rx) -> event => {
                if let Ok(event) = event
                    && let Some(event) = dispatcher.filter(event)
                {
                    handle_event(event, &mut navigator);
                }
            }
            recv(if stdin_open { &commands } else { &closed }) -> line => match line {
                Ok(line) => {
                    quit = !run_command(line.trim(), &mut navigator, &fallback, active.as_ref());
                }
                Err(_) => {
                    log::debug!("stdin closed");
                    stdin_open = false;
                }
            },
            default(Duration::from_millis(200)) => {}
        }
    }

    log::info!("Shutting down...");
    for client in &clients {
        client.shutdown();
    }
    log::info!("SetuLink stopped");
    Ok(())
}
