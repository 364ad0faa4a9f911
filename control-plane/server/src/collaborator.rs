//! A uniform handle for every background task the composition root stops as
//! part of shutdown (SPEC_FULL §2, item 4): the REST/health/metrics HTTP
//! listeners, the optional gRPC listener, and the Controller Manager scan
//! loop all reduce to "run until its own stop signal resolves, then join".

use async_trait::async_trait;
use tokio::task::JoinHandle;

#[async_trait]
pub trait ManagedServer: Send {
    /// Waits for the collaborator to finish shutting down. Each concrete
    /// collaborator is responsible for reacting to its own stop signal
    /// before this resolves (actix's built-in SIGTERM handling for the HTTP
    /// listeners, an explicit `oneshot` for gRPC and the Controller
    /// Manager).
    async fn join(self: Box<Self>);
}

/// Wraps an `actix-web` `Server` future, which resolves once actix's own
/// signal handling has drained it within its configured `shutdown_timeout`.
pub struct HttpCollaborator(pub actix_web::dev::Server);

#[async_trait]
impl ManagedServer for HttpCollaborator {
    async fn join(self: Box<Self>) {
        if let Err(error) = self.0.await {
            tracing::warn!(%error, "HTTP listener task ended with an error");
        }
    }
}

/// Wraps a `tokio::spawn`'d task, for collaborators (gRPC, Controller
/// Manager) that are stopped by sending on an explicit `oneshot` channel
/// before `join` is called.
pub struct TaskCollaborator<T>(pub JoinHandle<T>);

#[async_trait]
impl<T: Send + 'static> ManagedServer for TaskCollaborator<T> {
    async fn join(self: Box<Self>) {
        if let Err(error) = self.0.await {
            tracing::warn!(%error, "background task panicked while joining on shutdown");
        }
    }
}
