//! HTTP surface: proxy dispatcher, direct rewrite endpoints, WebSocket
//! bridging, and the static asset server.

pub mod assets;
pub mod bridge;
pub mod middleware;
pub mod proxy;
pub mod rewrite;
pub mod routes;

pub use routes::create_router;
