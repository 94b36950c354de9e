//! Serving until the process may exit
//!
//! The coordinator bounds the wait for in-flight requests, but axum keeps
//! waiting for every open connection to close after that. Connections that
//! never finish their request head would hold the process forever, so the
//! connection wait gets its own short deadline once the drain is done.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::connector::PausableListener;
use crate::coordinator::ShutdownCoordinator;
use crate::lifecycle::ContextClosed;
use crate::lifecycle::ContextId;
use crate::signal::Termination;

/// How long open connections may linger after the drain finished
pub const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Serve `app` until the process should exit
///
/// `termination` resolves on the next termination signal. Without graceful
/// shutdown the first signal stops serving right away. With graceful shutdown
/// the first signal starts the drain, a second one interrupts it and skips
/// the wait for lingering connections.
///
/// # Errors
///
/// Will return `Err` when serving fails
pub async fn run<T, F>(
    listener: PausableListener,
    app: Router,
    context: ContextId,
    coordinator: Arc<ShutdownCoordinator>,
    termination: T,
    exit_grace: Duration,
) -> io::Result<()>
where
    T: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = Termination> + Send + 'static,
{
    let server = axum::serve(listener, app);

    if !coordinator.is_enabled() {
        tokio::select! {
            served = server.into_future() => return served,
            termination = termination() => {
                tracing::info!("{termination} received, stopping without draining");
                return Ok(());
            }
        }
    }

    let drained = CancellationToken::new();
    let stop_now = CancellationToken::new();

    let server = server.with_graceful_shutdown(drain(
        context,
        coordinator,
        Arc::new(termination),
        drained.clone(),
        stop_now.clone(),
    ));

    tokio::select! {
        served = server.into_future() => served,
        () = exit_deadline(&drained, &stop_now, exit_grace) => {
            tracing::warn!("Connections still open after graceful shutdown, exiting anyway");
            Ok(())
        }
    }
}

/// Resolves `exit_grace` after the drain, or right away on a second signal
async fn exit_deadline(drained: &CancellationToken, stop_now: &CancellationToken, exit_grace: Duration) {
    drained.cancelled().await;

    tokio::select! {
        () = tokio::time::sleep(exit_grace) => {}
        () = stop_now.cancelled() => {}
    }
}

/// Resolves once the drain after the first termination signal is done
async fn drain<T, F>(
    context: ContextId,
    coordinator: Arc<ShutdownCoordinator>,
    termination: Arc<T>,
    drained: CancellationToken,
    stop_now: CancellationToken,
) where
    T: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = Termination> + Send + 'static,
{
    let signal = (*termination)().await;
    tracing::info!("{signal} received, starting graceful shutdown");

    // stays around after the drain so a second signal also cuts the
    // connection wait short
    tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move {
            let signal = (*termination)().await;
            tracing::warn!("{signal} received again, interrupting graceful shutdown");
            coordinator.interrupt();
            stop_now.cancel();
        }
    });

    coordinator
        .on_context_closed(&ContextClosed::new(context))
        .await;

    tracing::info!("Graceful shutdown {}", coordinator.current_phase());

    drained.cancel();
}
