//! Request channel for consumers
//!
//! UI surfaces hold a [`RequestHandle`] and a snapshot receiver; they never
//! touch the controller directly. The serving loop commits each request in
//! arrival order and runs the resulting cascade as its own task, so a slow
//! fetch never blocks later requests.

use crate::controller::HierarchyController;
use crate::error::{HierarchyError, RequestError};
use crate::fetcher::Fetcher;
use hier_model::{Level, Node};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Reply = oneshot::Sender<Result<(), HierarchyError>>;

/// Messages sent to the controller
#[derive(Debug)]
pub enum HierarchyRequest {
    /// Change the selection at a level
    Select {
        level: Level,
        node: Option<Node>,
        reply: Option<Reply>,
    },
    /// Reload from the root
    Refresh { reply: Option<oneshot::Sender<bool>> },
    /// Drop all state
    Logout,
}

/// Handle for submitting requests
#[derive(Debug, Clone)]
pub struct RequestHandle {
    sender: mpsc::Sender<HierarchyRequest>,
}

impl RequestHandle {
    /// Submit a raw request
    ///
    /// # Errors
    /// - `RequestError::Closed` if the serving loop has stopped
    pub async fn send(&self, request: HierarchyRequest) -> Result<(), RequestError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| RequestError::Closed)
    }

    /// Select and wait until the cascade below settled
    ///
    /// # Errors
    /// - `RequestError::Rejected` for an invalid selection
    /// - `RequestError::Closed` if the serving loop has stopped
    pub async fn select(&self, level: Level, node: Option<Node>) -> Result<(), RequestError> {
        let (tx, rx) = oneshot::channel();
        self.send(HierarchyRequest::Select {
            level,
            node,
            reply: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| RequestError::Closed)?.map_err(RequestError::from)
    }

    /// Select without waiting for the outcome
    ///
    /// # Errors
    /// - `RequestError::Closed` if the serving loop has stopped
    pub async fn request_select(&self, level: Level, node: Option<Node>) -> Result<(), RequestError> {
        self.send(HierarchyRequest::Select {
            level,
            node,
            reply: None,
        })
        .await
    }

    /// Refresh and wait; `Ok(false)` when no session is present
    ///
    /// # Errors
    /// - `RequestError::Closed` if the serving loop has stopped
    pub async fn refresh(&self) -> Result<bool, RequestError> {
        let (tx, rx) = oneshot::channel();
        self.send(HierarchyRequest::Refresh { reply: Some(tx) }).await?;
        rx.await.map_err(|_| RequestError::Closed)
    }

    /// # Errors
    /// - `RequestError::Closed` if the serving loop has stopped
    pub async fn logout(&self) -> Result<(), RequestError> {
        self.send(HierarchyRequest::Logout).await
    }
}

impl<F: Fetcher + 'static> HierarchyController<F> {
    /// Start serving requests on the current runtime
    ///
    /// The loop ends when every [`RequestHandle`] has been dropped.
    #[must_use]
    pub fn spawn_requests(&self) -> (RequestHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(self.config().request_buffer.max(1));
        let task = tokio::spawn(serve(self.clone(), receiver));
        (RequestHandle { sender }, task)
    }
}

async fn serve<F: Fetcher + 'static>(
    controller: HierarchyController<F>,
    mut receiver: mpsc::Receiver<HierarchyRequest>,
) {
    while let Some(request) = receiver.recv().await {
        match request {
            HierarchyRequest::Select { level, node, reply } => {
                // commit now so request order decides the winner
                match controller.begin_select(level, node.as_ref()) {
                    Ok(pending) => {
                        let controller = controller.clone();
                        tokio::spawn(async move {
                            controller.run_cascade(pending).await;
                            if let Some(reply) = reply {
                                let _ = reply.send(Ok(()));
                            }
                        });
                    }
                    Err(err) => {
                        if let Some(reply) = reply {
                            let _ = reply.send(Err(err));
                        }
                    }
                }
            }
            HierarchyRequest::Refresh { reply } => {
                let pending = controller.begin_activation();
                let started = pending.is_some();
                let controller = controller.clone();
                tokio::spawn(async move {
                    controller.run_cascade(pending).await;
                    if let Some(reply) = reply {
                        let _ = reply.send(started);
                    }
                });
            }
            HierarchyRequest::Logout => controller.logout(),
        }
    }
    tracing::debug!("request channel closed");
}
