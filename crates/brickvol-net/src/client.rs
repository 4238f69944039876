//! Remote brick protocol client (spec §4.7): mirrors the server's commands
//! over a single TCP connection, with a deadline per outstanding batch and
//! retry-with-smaller-batch on timeout.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use brickvol_core::error::{Error, Result};
use brickvol_core::meta::DatasetMetadata;


/// Text response from `INFO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
    pub max_bricks_per_get_request: usize,
}

/// One `LIST` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetListing {
    pub id: String,
    pub description: String,
}

/// An open connection to a brick protocol server.
pub struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Transport(format!("connect to {addr} timed out")))??;
        let (read_half, write_half) = stream.into_split();
        Ok(Client {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_text_block(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(Error::Transport("connection closed mid-response".into()));
            }
            if line == "\n" || line == "\r\n" {
                break;
            }
            out.push_str(&line);
        }
        Ok(out)
    }

    pub async fn info(&mut self) -> Result<ServerInfo> {
        self.send_line("INFO").await?;
        let body = self.read_text_block().await?;
        parse_info(&body)
    }

    pub async fn list_datasets(&mut self) -> Result<Vec<DatasetListing>> {
        self.send_line("LIST").await?;
        let body = self.read_text_block().await?;
        Ok(body
            .lines()
            .filter_map(|line| line.split_once(' '))
            .map(|(id, description)| DatasetListing {
                id: id.to_string(),
                description: description.to_string(),
            })
            .collect())
    }

    /// Open a dataset by id, returning its metadata blob decoded. The
    /// caller wraps this in [`crate::dataset::RemoteDataset`] to get a
    /// [`crate::dataset::Dataset`]-compatible handle with batching/caching.
    pub async fn open_dataset(&mut self, id: &str) -> Result<DatasetMetadata> {
        self.send_line(&format!("OPEN {id}")).await?;
        let blob = read_frame_async(&mut TokioFrameReader(&mut self.reader)).await?;
        let unique_id = brickvol_core::meta::compute_unique_id(&blob);
        DatasetMetadata::decode(&blob, unique_id)
    }

    /// Fetch a batch of raw (on-disk, possibly compressed) brick payloads
    /// in request order, with a per-request deadline. The caller is
    /// responsible for retrying with a smaller batch on timeout (spec §4.7
    /// "Request coalescing").
    pub async fn get_bricks(&mut self, indices: &[u64], deadline: Duration) -> Result<Vec<u8>> {
        let line = format!(
            "GETBRICKS {}",
            indices.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
        );
        timeout(deadline, self.send_line(&line))
            .await
            .map_err(|_| Error::Transport("GETBRICKS request timed out".into()))??;
        let payload = timeout(deadline, read_frame_async(&mut TokioFrameReader(&mut self.reader)))
            .await
            .map_err(|_| Error::Transport("GETBRICKS response timed out".into()))??;
        Ok(payload)
    }
}

fn parse_info(body: &str) -> Result<ServerInfo> {
    let mut version = None;
    let mut max_bricks = None;
    for line in body.lines() {
        if let Some(v) = line.strip_prefix("VERSION=") {
            version = Some(v.to_string());
        } else if let Some(v) = line.strip_prefix("MAX_BRICKS_PER_GET_REQUEST=") {
            max_bricks = Some(
                v.parse::<usize>()
                    .map_err(|_| Error::Protocol("malformed MAX_BRICKS_PER_GET_REQUEST".into()))?,
            );
        }
    }
    Ok(ServerInfo {
        version: version.ok_or_else(|| Error::Protocol("INFO response missing VERSION".into()))?,
        max_bricks_per_get_request: max_bricks
            .ok_or_else(|| Error::Protocol("INFO response missing MAX_BRICKS_PER_GET_REQUEST".into()))?,
    })
}

/// Adapter so the blocking-style [`read_frame`]/`write_frame` helpers in
/// [`crate::protocol`] (`std::io::Read`/`Write`) can be reused against a
/// tokio-async stream by buffering the frame synchronously in memory.
///
/// `read_frame` needs a `Read`; tokio's `BufReader` is `AsyncRead` only, so
/// this type reads the length prefix and body directly via the async API
/// and hands the bytes to a `std::io::Cursor` under the hood.
struct TokioFrameReader<'a>(&'a mut BufReader<tokio::net::tcp::OwnedReadHalf>);

async fn read_frame_async(reader: &mut TokioFrameReader<'_>) -> Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut len_buf = [0u8; 4];
    reader.0.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    reader.0.read_exact(&mut buf).await?;
    Ok(buf)
}
