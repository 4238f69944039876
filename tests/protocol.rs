//! End-to-end remote protocol scenario (spec §8 scenario 3): a server
//! hosting one dataset with a small `MAX_BRICKS_PER_GET_REQUEST`, exercised
//! through the real client over a loopback TCP connection.

use std::sync::Arc;
use std::time::Duration;

use brickvol_core::codec::{Codec, Lz4Codec};
use brickvol_core::extension::ExtensionStrategy;
use brickvol_core::format::{Reader, Writer};
use brickvol_core::geometry::build_level_table;
use brickvol_core::meta::{BrickRow, DatasetMetadata, Emptiness};
use brickvol_core::voxel::ScalarType;
use brickvol_net::client::Client;
use brickvol_net::server::{DatasetEntry, Server};
use tokio::net::TcpListener;

async fn spawn_server(max_bricks_per_get: usize) -> (std::net::SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("d1.bvf");
    let levels = build_level_table(32, 32, 32, 16, 1);
    let (mut writer, tmp) = Writer::create(&path, 1024).unwrap();

    let mut bricks = Vec::new();
    for (li, level) in levels.iter().enumerate() {
        for b in 0..level.brick_count() {
            if li == 0 && b < 4 {
                let payload = vec![(b + 1) as u8; 16 * 16 * 16];
                let compressed = Lz4Codec.encode(&payload);
                let (off, size) = writer.append_brick(&compressed).unwrap();
                bricks.push(BrickRow {
                    offset: off,
                    size,
                    emptiness: Emptiness::Normal,
                    checksum: 0,
                });
            } else {
                let (off, size) = writer.append_brick(&[]).unwrap();
                bricks.push(BrickRow {
                    offset: off,
                    size,
                    emptiness: Emptiness::Empty,
                    checksum: 0,
                });
            }
        }
    }

    let meta = DatasetMetadata {
        dims: [32, 32, 32],
        voxel_type: ScalarType::U8,
        brick_size: 16,
        overlap: 1,
        extension: ExtensionStrategy::Clamp,
        codec: brickvol_core::codec::CodecTag::Lz4,
        background: 0,
        levels,
        bricks,
        unique_id: [0; 16],
    };
    writer.finish(tmp, &path, meta).unwrap();
    let reader = Reader::open(&path).unwrap();

    let server = Arc::new(Server::new(
        vec![DatasetEntry {
            id: "d1".to_string(),
            description: "protocol test dataset".to_string(),
            reader,
        }],
        max_bricks_per_get,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve_listener(listener));
    (addr, dir)
}

#[tokio::test]
async fn getbricks_returns_exact_concatenated_payload() {
    let (addr, _dir) = spawn_server(4).await;
    let mut client = Client::connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(2))
        .await
        .unwrap();

    let metadata = client.open_dataset("d1").await.unwrap();
    let expected_len: u64 = (0..4).map(|i| metadata.bricks[i].size).sum();

    let payload = client.get_bricks(&[0, 1, 2, 3], Duration::from_secs(2)).await.unwrap();
    assert_eq!(payload.len() as u64, expected_len);
}

#[tokio::test]
async fn getbricks_over_the_limit_closes_the_connection() {
    let (addr, _dir) = spawn_server(4).await;
    let mut client = Client::connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(2))
        .await
        .unwrap();

    client.open_dataset("d1").await.unwrap();
    let result = client.get_bricks(&[0, 1, 2, 3, 4], Duration::from_secs(2)).await;
    assert!(result.is_err(), "exceeding MAX_BRICKS_PER_GET_REQUEST must fail, not succeed");
}

#[tokio::test]
async fn getbricks_before_open_fails() {
    let (addr, _dir) = spawn_server(4).await;
    let mut client = Client::connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(2))
        .await
        .unwrap();

    let result = client.get_bricks(&[0], Duration::from_secs(2)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn info_reports_configured_limit() {
    let (addr, _dir) = spawn_server(7).await;
    let mut client = Client::connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(2))
        .await
        .unwrap();

    let info = client.info().await.unwrap();
    assert_eq!(info.max_bricks_per_get_request, 7);
}
