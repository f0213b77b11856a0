//! The skeleton side of the bridge: executes remote queries against a
//! local provider.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use infogrid_broker::{BrokerError, BrokerResult, InfoProvider};

use crate::transport::Delivery;
use crate::wire::{QueryRequest, QueryResponse, STATUS_BAD_REQUEST, STATUS_NOT_FOUND};

/// Maps provider results onto the RPC status-code contract.
///
/// Exactly two error kinds get codes — key-not-found becomes 404 and
/// bad-argument becomes 400, both carrying the original error text. Any
/// other error is returned as-is and surfaces as a transport-level
/// failure.
pub struct ProviderSkeleton {
    provider: Arc<dyn InfoProvider>,
}

impl ProviderSkeleton {
    pub fn new(provider: Arc<dyn InfoProvider>) -> Self {
        Self { provider }
    }

    /// Execute one request.
    pub fn handle(&self, request: &QueryRequest) -> BrokerResult<QueryResponse> {
        debug!(key = %request.key, "received remote query");
        match self.provider.get(&request.key, &request.query_args()) {
            Ok(payload) => {
                debug!(key = %request.key, "successful query");
                Ok(QueryResponse::ok(payload))
            }
            Err(BrokerError::KeyNotFound(message)) => {
                debug!(key = %request.key, "key not found; responding 404");
                Ok(QueryResponse::error(STATUS_NOT_FOUND, message))
            }
            Err(BrokerError::Argument(message)) => {
                debug!(key = %request.key, "argument error; responding 400");
                Ok(QueryResponse::error(STATUS_BAD_REQUEST, message))
            }
            Err(other) => Err(other),
        }
    }
}

/// The consumer loop driving a [`ProviderSkeleton`] from a delivery
/// stream. Runs on its own task; cancellation is cooperative, checked
/// between deliveries and never pre-empting a request in flight.
pub struct SkeletonServer {
    skeleton: ProviderSkeleton,
    deliveries: mpsc::Receiver<Delivery>,
    shutdown: watch::Receiver<bool>,
}

impl SkeletonServer {
    pub fn new(
        provider: Arc<dyn InfoProvider>,
        deliveries: mpsc::Receiver<Delivery>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            skeleton: ProviderSkeleton::new(provider),
            deliveries,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("remote provider consumer started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("remote provider consumer shutting down");
                    break;
                }
                delivery = self.deliveries.recv() => {
                    let Some(delivery) = delivery else {
                        info!("delivery stream closed");
                        break;
                    };
                    match self.skeleton.handle(&delivery.request) {
                        Ok(response) => {
                            let _ = delivery.reply.send(response);
                        }
                        Err(e) => {
                            // Dropping the reply slot surfaces this to the
                            // caller as a transport failure.
                            error!(key = %delivery.request.key, error = %e, "remote query failed");
                        }
                    }
                }
            }
        }
    }
}
