use std::net::SocketAddr;
use std::sync::Arc;

use log::info;

use super::routes::routes;
use crate::error_handling::types::WebError;
use crate::explorer::FlowExplorer;

/// Web server for the HTTP API and index page
pub struct WebServer {
    explorer: Arc<FlowExplorer>,
}

impl WebServer {
    pub fn new(explorer: Arc<FlowExplorer>) -> Self {
        Self { explorer }
    }

    /// Binds `addr` and serves until the process stops.
    pub async fn start(&self, addr: SocketAddr) -> Result<(), WebError> {
        let (bound, server) = warp::serve(routes(self.explorer.clone()))
            .try_bind_ephemeral(addr)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;
        info!("Serving {} on http://{}", self.explorer.describe(), bound);
        server.await;
        Ok(())
    }
}
