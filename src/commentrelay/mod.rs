pub mod broker;
pub mod config;
pub mod event;
pub mod eventlog;
pub mod model;
pub mod net;
pub mod service;
pub mod session;
pub mod store;
mod types;

use std::sync::Arc;

use log::{info, warn};
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use config::ServerConfig;
use eventlog::EventLog;
use net::routes::{router, AppState};
use net::server::run_http_server;
use service::CommentService;
use session::CommentBroker;
use store::{CommentStore, InMemoryCommentStore};
use crate::error::{CommentRelayError, Result};

/// Starts the comment service and runs until Ctrl-C
pub async fn init(config: ServerConfig) -> Result<()> {
    let broker = Arc::new(CommentBroker::new(config.endpoint_capacity));
    let store: Arc<dyn CommentStore> = Arc::new(InMemoryCommentStore::new());
    let log = build_event_log(&config)?;
    let service = Arc::new(CommentService::new(store, log, broker, config.log_topics()));

    let shutdown = CancellationToken::new();
    let state = AppState::new(service, config.heartbeat(), shutdown.clone());
    let mut server = tokio::spawn(run_http_server(config.addr.clone(), router(state), shutdown.clone()));

    tokio::select! {
        finished = &mut server => {
            return finished.map_err(|e| CommentRelayError::Other(e.to_string()))?.map_err(Into::into);
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    // Ends every open stream session, then lets in-flight requests finish
    shutdown.cancel();
    match timeout(config.shutdown_grace(), server).await {
        Ok(finished) => finished.map_err(|e| CommentRelayError::Other(e.to_string()))?.map_err(Into::into),
        Err(_) => {
            warn!("Server did not stop within {:?}", config.shutdown_grace());
            Ok(())
        }
    }
}

#[cfg(feature = "kafka")]
fn build_event_log(config: &ServerConfig) -> Result<Arc<dyn EventLog>> {
    let log = eventlog::KafkaEventLog::new(&config.kafka.brokers, &config.kafka.client_id)?;
    Ok(Arc::new(log))
}

#[cfg(not(feature = "kafka"))]
fn build_event_log(_config: &ServerConfig) -> Result<Arc<dyn EventLog>> {
    info!("Built without the kafka feature, events are written to the application log");
    Ok(Arc::new(eventlog::LoggingEventLog))
}
