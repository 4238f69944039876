//! Remote brick protocol server (spec §4.6): one `Reader` per dataset,
//! shared read-only across connections, plus a per-connection state
//! machine enforcing UNOPENED -> OPENED -> ERROR.
//!
//! The accept loop and per-connection task spawn follow the teacher's TCP
//! debug server shape; the per-line command dispatch is new, driven by
//! [`crate::protocol`] instead of JSON.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use brickvol_core::format::Reader;

use crate::protocol::{format_info, format_list_entry, write_frame, Command};

/// One dataset entry published by the server: an opaque id, a human
/// description for `LIST`, and the backing reader.
#[derive(Clone)]
pub struct DatasetEntry {
    pub id: String,
    pub description: String,
    pub reader: Reader,
}

/// Shared, immutable server state: the dataset catalog and protocol limits.
pub struct Server {
    datasets: HashMap<String, DatasetEntry>,
    max_bricks_per_get: usize,
}

enum ConnState {
    Unopened,
    Opened { dataset: DatasetEntry },
}

impl Server {
    pub fn new(datasets: Vec<DatasetEntry>, max_bricks_per_get: usize) -> Self {
        let datasets = datasets.into_iter().map(|d| (d.id.clone(), d)).collect();
        Server {
            datasets,
            max_bricks_per_get,
        }
    }

    /// Build a catalog from every `*.data` file directly under `dir`, using
    /// the file stem as the dataset id.
    pub fn from_directory(dir: &std::path::Path, max_bricks_per_get: usize) -> brickvol_core::error::Result<Self> {
        let mut datasets = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("data") {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("dataset")
                .to_string();
            let reader = Reader::open(&path)?;
            datasets.push(DatasetEntry {
                id: id.clone(),
                description: id,
                reader,
            });
        }
        Ok(Server::new(datasets, max_bricks_per_get))
    }

    pub async fn serve(self: Arc<Self>, addr: impl tokio::net::ToSocketAddrs) -> brickvol_core::error::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Like [`Self::serve`] but against an already-bound listener, so a
    /// caller can bind to an ephemeral port (`:0`) and read back the actual
    /// address before clients connect.
    pub async fn serve_listener(self: Arc<Self>, listener: TcpListener) -> brickvol_core::error::Result<()> {
        log::info!("brick protocol server listening on {}", listener.local_addr()?);
        loop {
            let (stream, peer) = listener.accept().await?;
            log::info!("client connected from {peer}");
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    log::warn!("connection from {peer} closed with error: {e}");
                } else {
                    log::info!("client {peer} disconnected");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> brickvol_core::error::Result<()> {
        let (reader_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader_half);
        let mut line = String::new();
        let mut state = ConnState::Unopened;
        let mut scratch: Vec<u8> = Vec::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(());
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                continue;
            }

            let cmd = match Command::parse(trimmed, self.max_bricks_per_get) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("malformed command {trimmed:?}: {e}");
                    return Err(e);
                }
            };

            match (cmd, &mut state) {
                (Command::Info, _) => {
                    let body = format_info(self.max_bricks_per_get);
                    writer.write_all(body.as_bytes()).await?;
                    writer.flush().await?;
                }
                (Command::List, _) => {
                    let mut body = String::new();
                    for entry in self.datasets.values() {
                        body.push_str(&format_list_entry(&entry.id, &entry.description));
                    }
                    body.push('\n');
                    writer.write_all(body.as_bytes()).await?;
                    writer.flush().await?;
                }
                (Command::Open { id }, conn_state) => {
                    let entry = self.datasets.get(&id).ok_or_else(|| {
                        brickvol_core::error::Error::Protocol(format!("unknown dataset id {id}"))
                    })?;
                    let blob = entry.reader.metadata().encode();
                    let mut framed = Vec::new();
                    write_frame(&mut framed, &blob)?;
                    writer.write_all(&framed).await?;
                    writer.flush().await?;
                    *conn_state = ConnState::Opened { dataset: entry.clone() };
                }
                (Command::GetBricks { indices }, ConnState::Opened { dataset }) => {
                    scratch.clear();
                    let mut raw = Vec::new();
                    for i in indices {
                        dataset.reader.raw_brick(i, &mut raw)?;
                        scratch.extend_from_slice(&raw);
                    }
                    let mut framed = Vec::new();
                    write_frame(&mut framed, &scratch)?;
                    writer.write_all(&framed).await?;
                    writer.flush().await?;
                }
                (Command::GetBricks { .. }, ConnState::Unopened) => {
                    return Err(brickvol_core::error::Error::Protocol(
                        "GETBRICKS before OPEN".into(),
                    ));
                }
            }
        }
    }
}
