// Adapters: concrete implementations of the domain ports (partner API over
// HTTP, in-memory stores with snapshots, local files) and the HTTP server.

pub mod http;
pub mod memory;
pub mod server;
pub mod storage;
