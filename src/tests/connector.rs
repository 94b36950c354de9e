use std::sync::Arc;
use std::time::Duration;

use axum::serve::Listener;
use tokio::net::TcpStream;

use crate::connector::Connector;
use crate::connector::bind;
use crate::pool::RequestPool;

#[tokio::test]
async fn test_accepts_until_paused() {
    let (mut listener, control) = bind("127.0.0.1:0".parse().unwrap(), "test")
        .await
        .unwrap();
    let address = listener.local_addr().unwrap();

    let _client = TcpStream::connect(address).await.unwrap();
    let accepted = tokio::time::timeout(Duration::from_secs(5), listener.accept()).await;
    assert!(accepted.is_ok());

    control.pause();
    control.pause();
    assert!(control.is_paused());

    // the port stays bound, the connection just is not picked up
    let _client = TcpStream::connect(address).await.unwrap();
    let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err());
}

#[tokio::test]
async fn test_pause_wakes_pending_accept() {
    let (mut listener, control) = bind("127.0.0.1:0".parse().unwrap(), "test")
        .await
        .unwrap();
    let address = listener.local_addr().unwrap();

    let accept = tokio::spawn(async move {
        let accepted = tokio::time::timeout(Duration::from_millis(500), listener.accept()).await;
        accepted.is_ok()
    });

    tokio::task::yield_now().await;
    control.pause();

    let _client = TcpStream::connect(address).await.unwrap();
    assert!(!accept.await.unwrap());
}

#[tokio::test]
async fn test_pause_without_listener() {
    let (listener, control) = bind("127.0.0.1:0".parse().unwrap(), "test")
        .await
        .unwrap();

    drop(listener);

    control.pause();
    assert!(control.is_paused());
}

#[tokio::test]
async fn test_label_and_pool() {
    let (listener, control) = bind("127.0.0.1:0".parse().unwrap(), "test")
        .await
        .unwrap();
    let address = listener.local_addr().unwrap();

    assert_eq!(format!("test listener on {address}"), control.to_string());
    assert!(control.worker_pool().is_none());

    let control = control.with_worker_pool(Arc::new(RequestPool::new()));
    let pool = control.worker_pool().unwrap();
    assert_eq!(0, pool.active_task_count());
}
