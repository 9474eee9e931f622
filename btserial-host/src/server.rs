//! TCP listener serving bridge clients one at a time

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::HostError;
use crate::session::Session;

/// Accept clients on `listener` and serve each to completion
///
/// A client that arrives while another is being served waits in the
/// listener's backlog.
pub async fn serve(listener: TcpListener, backend: Backend) -> Result<(), HostError> {
    info!(
        "Bridge host listening on {} ({} backend)",
        listener.local_addr()?,
        backend.name()
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Bridge client connected from {}", peer);
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
        }

        if let Err(e) = Session::new(&backend).run(stream).await {
            warn!("Session with {} ended with error: {}", peer, e);
        }
    }
}
