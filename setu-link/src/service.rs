//! Command surface shared by every transport

use crate::client::TransportClient;
use crate::messages::{LogRequest, ManageCommand, Outbound, SharedInfo, TransportKind};
use crate::upload;
use std::path::PathBuf;

/// Commands the navigation layer can issue. Every operation returns
/// `false` when the command could not be queued.
pub trait CommandService: Send + Sync {
    fn is_connected(&self) -> bool;
    fn activity_log(&self, category: &str, text: &str, memo: &str) -> bool;
    /// `__cancel__` cancels the current navigation
    fn send_destination(&self, destination: &str) -> bool;
    fn summon(&self, destination: &str) -> bool;
    fn manage(&self, command: ManageCommand, param: Option<&str>) -> bool;
    fn log_request(&self, request: &LogRequest) -> bool;
    fn send_log(&self, request: &LogRequest, app_logs: &[String], files: &[PathBuf]) -> bool;
    fn share(&self, info: &SharedInfo) -> bool;
}

/// A command service bound to one link kind
pub trait TransportService: CommandService {
    fn kind(&self) -> TransportKind;
}

impl TransportClient {
    fn queue(&self, message: Outbound) -> bool {
        match self.send(&message) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("{}: {} not sent: {}", self.kind(), message.kind(), e);
                false
            }
        }
    }
}

impl TransportService for TransportClient {
    fn kind(&self) -> TransportKind {
        TransportClient::kind(self)
    }
}

impl CommandService for TransportClient {
    fn is_connected(&self) -> bool {
        TransportClient::is_connected(self)
    }

    fn activity_log(&self, category: &str, text: &str, memo: &str) -> bool {
        self.queue(Outbound::ActivityLog {
            category: category.to_string(),
            text: text.to_string(),
            memo: memo.to_string(),
        })
    }

    fn send_destination(&self, destination: &str) -> bool {
        log::info!("{}: destination {}", self.kind(), destination);
        self.queue(Outbound::Destination(destination.to_string()))
    }

    fn summon(&self, destination: &str) -> bool {
        log::info!("{}: summon {}", self.kind(), destination);
        self.queue(Outbound::Summon(destination.to_string()))
    }

    fn manage(&self, command: ManageCommand, param: Option<&str>) -> bool {
        self.queue(Outbound::Manage(command.format(param)))
    }

    fn log_request(&self, request: &LogRequest) -> bool {
        self.queue(Outbound::LogRequest(request.clone()))
    }

    fn send_log(&self, request: &LogRequest, app_logs: &[String], files: &[PathBuf]) -> bool {
        match upload::send_log(self, request, app_logs, files) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("{}: log upload failed: {}", self.kind(), e);
                false
            }
        }
    }

    fn share(&self, info: &SharedInfo) -> bool {
        self.queue(Outbound::Share(info.clone()))
    }
}
