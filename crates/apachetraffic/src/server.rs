use std::sync::Arc;

use pingora::prelude::*;
use pingora::server::Server as PingoraServer;
use pingora::server::configuration::Opt;
use pingora::services::background::GenBackgroundService;

use crate::error::ConfigError;
use crate::flusher::Flusher;

/// Reject `-d/--daemon`.
///
/// Pingora forks inside `run_forever`, after the stdin ingestion thread has
/// been started, and a forked child would never read the pipe Apache writes to.
pub fn ensure_foreground(opt: &Opt) -> std::result::Result<(), ConfigError> {
    if opt.daemon {
        return Err(ConfigError::Invalid(
            "daemon mode is not supported for a piped logger; run in the foreground".to_string(),
        ));
    }
    Ok(())
}

/// Pingora server hosting the traffic flusher.
///
/// Pingora owns signal handling; on graceful shutdown the flusher's
/// shutdown watch fires and it sends whatever is left in the store.
pub struct Server {
    server: PingoraServer,
}

impl Server {
    pub fn new(opt: Option<Opt>) -> Result<Self> {
        let server = PingoraServer::new(opt)?;
        Ok(Server { server })
    }

    pub fn bootstrap(&mut self, flusher: Arc<Flusher>) {
        self.server.bootstrap();

        log::info!(
            "Flushing completed traffic buckets every {:?}",
            flusher.interval()
        );
        let background = GenBackgroundService::new("traffic flusher".to_string(), flusher);
        self.server.add_service(background);
    }

    pub fn run_forever(self) {
        self.server.run_forever();
    }
}
