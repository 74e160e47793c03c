//! WebSocket bridging: after the upstream accepts the handshake, both
//! connections are upgraded to raw byte streams and spliced together.

use anyhow::{Context, anyhow};
use axum::body::Body;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

use crate::error::ProxyError;

/// Relay an upstream `101 Switching Protocols` response to the client and
/// splice the two upgraded connections.
///
/// The 101 status and the upstream's handshake headers (`Upgrade`,
/// `Connection`, `Sec-WebSocket-Accept`, subprotocols) are replayed
/// verbatim; returning that response is what makes hyper hand over the raw
/// client socket. Bytes the client sent ahead of the upgrade are preserved
/// by hyper and flushed first.
pub fn bridge_websocket(
    on_upgrade: Option<OnUpgrade>,
    upstream: reqwest::Response,
) -> Result<Response, ProxyError> {
    let on_upgrade = on_upgrade.ok_or_else(|| {
        ProxyError::BridgeFailure(anyhow!("client connection does not support upgrades"))
    })?;

    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        headers.append(name.clone(), value.clone());
    }

    tokio::spawn(async move {
        if let Err(err) = run_bridge(on_upgrade, upstream).await {
            tracing::debug!(error = ?err, "websocket bridge closed with error");
        }
    });

    Ok((status, headers, Body::empty()).into_response())
}

/// Wait for both upgrades, then copy bytes in both directions until either
/// peer closes. Dropping the halves on return releases both sockets.
async fn run_bridge(on_upgrade: OnUpgrade, upstream: reqwest::Response) -> anyhow::Result<()> {
    let mut upstream_io = upstream
        .upgrade()
        .await
        .context("upstream connection refused the upgrade")?;
    let client_io = on_upgrade.await.context("client upgrade failed")?;
    let mut client_io = TokioIo::new(client_io);

    let (to_upstream, to_client) =
        tokio::io::copy_bidirectional(&mut client_io, &mut upstream_io)
            .await
            .context("bridge copy failed")?;
    tracing::debug!(to_upstream, to_client, "websocket bridge closed");
    Ok(())
}
