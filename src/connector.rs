//! Listening endpoints that can stop accepting connections
//!
//! [`bind`] splits a TCP listener into the half that is handed to
//! `axum::serve` and a [`ListenerControl`] the shutdown coordinator keeps to
//! pause it.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::serve::Listener;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::pool::WorkerPool;

/// Something that can be paused
pub trait Connector: Send + Sync + fmt::Display {
    /// Stop accepting new inbound connections
    ///
    /// Existing connections stay open and the port stays bound. Idempotent and
    /// never blocks.
    fn pause(&self);

    /// Whether [`Connector::pause`] has been called
    fn is_paused(&self) -> bool;

    /// The pool executing work accepted through this connector, if it has a
    /// drainable one
    fn worker_pool(&self) -> Option<Arc<dyn WorkerPool>> {
        None
    }
}

/// Bind a pausable listener to `address`
///
/// # Errors
///
/// Will return `Err` when the address can not be bound
pub async fn bind(
    address: SocketAddr,
    label: &str,
) -> io::Result<(PausableListener, ListenerControl)> {
    let listener = TcpListener::bind(address).await?;
    let local_addr = listener.local_addr()?;

    let (paused_tx, paused_rx) = watch::channel(false);

    let listener = PausableListener {
        inner: listener,
        paused: paused_rx,
    };

    let control = ListenerControl {
        label: format!("{label} listener on {local_addr}"),
        paused: paused_tx,
        worker_pool: None,
    };

    Ok((listener, control))
}

/// TCP listener that stops accepting while paused
pub struct PausableListener {
    inner: TcpListener,
    paused: watch::Receiver<bool>,
}

impl Listener for PausableListener {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            if *self.paused.borrow_and_update() {
                // connections queue in the backlog and are never served
                if self.paused.wait_for(|paused| !*paused).await.is_err() {
                    std::future::pending::<()>().await;
                }
                continue;
            }

            tokio::select! {
                biased;
                changed = self.paused.changed() => {
                    if changed.is_err() {
                        // control is gone, nobody can pause anymore
                        return self.accept_unpausable().await;
                    }
                }
                accepted = self.inner.accept() => match accepted {
                    Ok(accepted) => return accepted,
                    Err(err) => handle_accept_error(err).await,
                },
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

impl PausableListener {
    async fn accept_unpausable(&mut self) -> (TcpStream, SocketAddr) {
        loop {
            match self.inner.accept().await {
                Ok(accepted) => return accepted,
                Err(err) => handle_accept_error(err).await,
            }
        }
    }
}

async fn handle_accept_error(err: io::Error) {
    if matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    ) {
        return;
    }

    // mostly out of file descriptors, give the process some room
    tracing::error!("Accept error: {err}");
    tokio::time::sleep(Duration::from_secs(1)).await;
}

/// Handle to pause a [`PausableListener`]
pub struct ListenerControl {
    label: String,
    paused: watch::Sender<bool>,
    worker_pool: Option<Arc<dyn WorkerPool>>,
}

impl ListenerControl {
    /// Attach the pool that executes requests accepted by this listener
    pub fn with_worker_pool(self, worker_pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            worker_pool: Some(worker_pool),
            ..self
        }
    }
}

impl Connector for ListenerControl {
    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    fn worker_pool(&self) -> Option<Arc<dyn WorkerPool>> {
        self.worker_pool.clone()
    }
}

impl fmt::Display for ListenerControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
