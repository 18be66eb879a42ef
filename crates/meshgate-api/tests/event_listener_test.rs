// Integration tests for `EventListener` over real loopback sockets.
#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::pin::pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use meshgate_api::{EventListener, FrameUpdate, UpdateFrame};

const WAIT: Duration = Duration::from_secs(2);

async fn bind_loopback() -> (EventListener, SocketAddr) {
    let listener = EventListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)), Duration::from_millis(50))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn send(to: SocketAddr, payload: &[u8]) {
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(payload, to).await.unwrap();
}

#[tokio::test]
async fn test_frames_arrive_in_order() {
    let (listener, addr) = bind_loopback().await;
    let mut frames = pin!(listener.into_stream());

    send(addr, br#"{"addr":"AA:BB","data":{"stype":"single","subid":18,"status":1}}"#).await;
    send(addr, br#"{"addr":"AA:BB","data":{"stype":"all","status":[0,1,0]}}"#).await;

    let first = timeout(WAIT, frames.next()).await.unwrap().unwrap();
    assert_eq!(first, UpdateFrame::single("AA:BB", 18, 1));

    let second = timeout(WAIT, frames.next()).await.unwrap().unwrap();
    assert_eq!(second.update, FrameUpdate::All { statuses: vec![0, 1, 0] });
}

#[tokio::test]
async fn test_garbage_datagram_is_dropped() {
    let (listener, addr) = bind_loopback().await;
    let mut frames = pin!(listener.into_stream());

    send(addr, b"not json at all").await;
    send(addr, br#"{"addr":"CC:DD","data":{"stype":"single","subid":17,"status":0}}"#).await;

    let frame = timeout(WAIT, frames.next()).await.unwrap().unwrap();
    assert_eq!(frame.board_id, "CC:DD");
}

#[tokio::test]
async fn test_close_ends_stream_and_releases_socket() {
    let (listener, addr) = bind_loopback().await;
    let closer = listener.close_handle();
    let mut frames = pin!(listener.into_stream());

    closer.close();
    closer.close();
    assert!(closer.is_closed());
    assert!(timeout(WAIT, frames.next()).await.unwrap().is_none());

    // Stream finished, so the port is free again.
    let rebound = EventListener::bind(addr, Duration::from_millis(50)).await;
    assert!(rebound.is_ok());
}

#[tokio::test]
async fn test_close_before_consuming() {
    let (listener, _addr) = bind_loopback().await;
    listener.close();
    let mut frames = pin!(listener.into_stream());
    assert!(timeout(WAIT, frames.next()).await.unwrap().is_none());
}
