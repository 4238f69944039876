//! Remote brick protocol: an ASCII-line command channel with binary-framed
//! payload responses, a server that holds one `Reader` per dataset, and a
//! client that presents a `Dataset` behaving like a local `Reader`.

pub mod cache;
pub mod client;
pub mod dataset;
pub mod protocol;
pub mod server;

pub use cache::LocalCache;
pub use client::Client;
pub use dataset::{Dataset, RemoteDataset};
pub use server::Server;
