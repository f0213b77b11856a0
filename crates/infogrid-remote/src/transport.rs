//! The message-transport seam.
//!
//! The actual transport implementation lives outside this workspace; the
//! bridge only assumes an asynchronous, correlated request/response
//! primitive. An in-process tokio-channel implementation is provided for
//! wiring the stub and skeleton together in one process (and in tests).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::wire::{QueryRequest, QueryResponse};

/// A transport-level failure — anything below the RPC status-code
/// contract.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// An asynchronous transport carrying one request to the remote skeleton
/// and suspending until the correlated response arrives. No timeout is
/// enforced here; callers impose their own deadline.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn round_trip(&self, request: QueryRequest) -> Result<QueryResponse, TransportError>;
}

/// One in-flight request with its reply slot. The oneshot sender is the
/// correlation: whichever task handles the delivery answers exactly this
/// caller.
pub struct Delivery {
    pub request: QueryRequest,
    pub reply: oneshot::Sender<QueryResponse>,
}

/// In-process [`QueryTransport`] over a tokio channel.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Delivery>,
}

/// Create a connected transport and its delivery stream.
pub fn channel(buffer: usize) -> (ChannelTransport, mpsc::Receiver<Delivery>) {
    let (tx, rx) = mpsc::channel(buffer);
    (ChannelTransport { tx }, rx)
}

#[async_trait]
impl QueryTransport for ChannelTransport {
    async fn round_trip(&self, request: QueryRequest) -> Result<QueryResponse, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Delivery {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError("consumer is gone".to_string()))?;
        reply_rx
            .await
            .map_err(|_| TransportError("no response for request".to_string()))
    }
}
