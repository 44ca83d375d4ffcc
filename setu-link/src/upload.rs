//! Chunked log upload
//!
//! Each file goes out as base64 `log_request_chunk` frames followed by one
//! `log_request` manifest carrying `totalChunks`:
//!
//! ```text
//! chunk 0 ─► chunk 1 ─► ... ─► chunk N-1 ─► manifest {totalChunks: N}
//! ```
//!
//! Chunks use the longer chunk timeout, and every acknowledged chunk
//! refreshes the grace window that keeps the session alive while the robot
//! is busy receiving.

use crate::client::{AckAction, TransportClient};
use crate::error::Result;
use crate::messages::{LogChunk, LogRequest, Outbound, UploadManifest};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

const CHUNK_KIND: &str = "data-chunk";

/// Upload `files`, pairing each with its app-side name. Returns the number
/// of chunks queued.
///
/// Stops at the first file that cannot be read; chunks already queued are
/// not recalled.
pub fn send_log(
    client: &TransportClient,
    request: &LogRequest,
    app_logs: &[String],
    files: &[PathBuf],
) -> Result<usize> {
    client.begin_upload();
    let chunk_size = client.timing().chunk_size.max(1);
    let chunk_timeout = client.timing().chunk_timeout();
    let cabot_log_name = request.log_name.clone().unwrap_or_default();
    let mut queued = 0;

    for (app_log_name, path) in app_logs.iter().zip(files) {
        let mut file = File::open(path)?;
        let mut buffer = vec![0u8; chunk_size];
        let mut chunk_index = 0;

        loop {
            let n = read_full(&mut file, &mut buffer)?;
            if n == 0 {
                break;
            }
            let chunk = Outbound::LogChunk(LogChunk {
                kind: CHUNK_KIND,
                chunk_index,
                data: STANDARD.encode(&buffer[..n]),
                app_log_name: app_log_name.clone(),
                cabot_log_name: cabot_log_name.clone(),
            });
            client.send_with(&chunk, chunk_timeout, AckAction::ChunkDelivered)?;
            log::debug!("log_request_chunk {}:{} ({} bytes)", app_log_name, chunk_index, n);
            chunk_index += 1;
        }

        let manifest = Outbound::UploadManifest(UploadManifest {
            kind: request.kind,
            cabot_log_name: cabot_log_name.clone(),
            app_log_name: app_log_name.clone(),
            total_chunks: chunk_index,
        });
        client.send(&manifest)?;
        log::info!("Uploaded {} in {} chunks", app_log_name, chunk_index);
        queued += chunk_index;
    }

    Ok(queued)
}

/// Fill `buffer` unless the file ends first
fn read_full(file: &mut File, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
