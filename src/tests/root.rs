use std::time::Duration;

use axum::http::StatusCode;
use tokio::time::Instant;

use crate::tests::helper;

#[tokio::test]
async fn test_root() {
    let mut test_app = helper::setup_test_app(helper::enabled(30)).await;

    let (status_code, _, body) = helper::get(&mut test_app.app, "/").await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("Hello, world!\n", body);
}

#[tokio::test(start_paused = true)]
async fn test_root_with_delay() {
    let mut test_app = helper::setup_test_app(helper::enabled(30)).await;

    let started = Instant::now();
    let (status_code, _, _) = helper::get(&mut test_app.app, "/?delayMs=2500").await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(started.elapsed() >= Duration::from_millis(2500));
}

#[tokio::test]
async fn test_root_with_invalid_delay() {
    let mut test_app = helper::setup_test_app(helper::enabled(30)).await;

    let (status_code, _, _) = helper::get(&mut test_app.app, "/?delayMs=soon").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
}
