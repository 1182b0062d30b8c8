use super::*;
use crate::state::test_helpers;
use futures::{SinkExt, StreamExt};
use protocol::{DrawingData, StrokeSegment, WhiteboardId};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;

struct TestConn {
    conn_id: Uuid,
    subscription: Option<Subscription>,
    queue: ClientQueue,
}

impl TestConn {
    fn new() -> Self {
        Self { conn_id: Uuid::new_v4(), subscription: None, queue: ClientQueue::new(16) }
    }

    /// A connection whose queue depth follows the server configuration.
    fn for_state(state: &AppState) -> Self {
        Self { conn_id: Uuid::new_v4(), subscription: None, queue: ClientQueue::new(state.channel_capacity) }
    }

    async fn send(&mut self, state: &AppState, text: &str) -> Vec<ServerMessage> {
        process_inbound_text(state, &mut self.subscription, self.conn_id, &mut self.queue, text).await
    }
}

async fn recv_broadcast(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("broadcast receive timed out")
        .expect("channel closed")
}

async fn assert_no_broadcast(rx: &mut mpsc::Receiver<ServerMessage>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no broadcast"
    );
}

fn subscribe_text(id: &str) -> String {
    format!(r#"{{"channel":"DrawingChannel","whiteboardId":"{id}"}}"#)
}

fn red_segment_text(id: &str) -> String {
    format!(r##"{{"whiteboardId":"{id}","drawingData":{{"x1":0,"y1":0,"x2":10,"y2":10,"color":"#ff0000"}}}}"##)
}

fn red_segment() -> DrawingData {
    DrawingData::Segment(StrokeSegment::new(0.0, 0.0, 10.0, 10.0, "#ff0000"))
}

// =============================================================================
// SUBSCRIBE
// =============================================================================

#[tokio::test]
async fn subscribe_existing_whiteboard_confirms() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut conn = TestConn::new();

    let replies = conn.send(&state, &subscribe_text(id.as_str())).await;
    assert_eq!(replies, vec![ServerMessage::Confirmed { whiteboard_id: id.clone() }]);
    assert_eq!(conn.subscription.as_ref().map(|s| &s.whiteboard_id), Some(&id));
}

#[tokio::test]
async fn subscribe_unknown_whiteboard_rejects_and_keeps_no_membership() {
    let state = test_helpers::test_app_state();
    let mut conn = TestConn::new();

    let replies = conn.send(&state, &subscribe_text("999")).await;
    let [ServerMessage::Rejected { whiteboard_id, code, .. }] = replies.as_slice() else {
        panic!("expected a single rejection, got {replies:?}");
    };
    assert_eq!(whiteboard_id.as_ref(), Some(&WhiteboardId::new("999")));
    assert_eq!(code, "E_WHITEBOARD_NOT_FOUND");
    assert!(conn.subscription.is_none());
    assert!(state.partitions.read().await.is_empty());
}

#[tokio::test]
async fn subscribe_without_id_joins_default_whiteboard() {
    let state = test_helpers::test_app_state();
    let mut a = TestConn::new();
    let mut b = TestConn::new();

    let first = a.send(&state, &subscribe_text("")).await;
    let second = b.send(&state, r#"{"channel":"DrawingChannel"}"#).await;
    assert_eq!(first, second);
    let [ServerMessage::Confirmed { whiteboard_id }] = first.as_slice() else {
        panic!("expected confirmation, got {first:?}");
    };
    assert_eq!(channel::member_count(&state, whiteboard_id).await, 2);
}

#[tokio::test]
async fn resubscribe_moves_connection_between_partitions() {
    let state = test_helpers::test_app_state();
    let w1 = test_helpers::seed_whiteboard(&state, "Board One").await;
    let w2 = test_helpers::seed_whiteboard(&state, "Board Two").await;
    let mut conn = TestConn::new();

    conn.send(&state, &subscribe_text(w1.as_str())).await;
    conn.send(&state, &subscribe_text(w2.as_str())).await;

    assert_eq!(channel::member_count(&state, &w1).await, 0);
    assert_eq!(channel::member_count(&state, &w2).await, 1);
}

#[tokio::test]
async fn resubscribe_discards_broadcasts_queued_from_old_whiteboard() {
    let state = test_helpers::test_app_state();
    let w1 = test_helpers::seed_whiteboard(&state, "Board One").await;
    let w2 = test_helpers::seed_whiteboard(&state, "Board Two").await;
    let mut conn = TestConn::new();
    let mut peer = TestConn::new();
    conn.send(&state, &subscribe_text(w1.as_str())).await;
    peer.send(&state, &subscribe_text(w1.as_str())).await;

    // Queued for conn but not yet forwarded to its socket.
    peer.send(&state, &red_segment_text(w1.as_str())).await;

    let replies = conn.send(&state, &subscribe_text(w2.as_str())).await;
    assert_eq!(replies, vec![ServerMessage::Confirmed { whiteboard_id: w2.clone() }]);
    assert_no_broadcast(&mut conn.queue.rx).await;

    let mut w2_peer = TestConn::new();
    w2_peer.send(&state, &subscribe_text(w2.as_str())).await;
    w2_peer.send(&state, &red_segment_text(w2.as_str())).await;
    assert_eq!(recv_broadcast(&mut conn.queue.rx).await, ServerMessage::Broadcast(red_segment()));
}

#[tokio::test]
async fn unsubscribe_discards_queued_broadcasts() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut conn = TestConn::new();
    let mut peer = TestConn::new();
    conn.send(&state, &subscribe_text(id.as_str())).await;
    peer.send(&state, &subscribe_text(id.as_str())).await;
    peer.send(&state, &red_segment_text(id.as_str())).await;

    conn.send(&state, r#"{"channel":"DrawingChannel","command":"unsubscribe"}"#).await;
    assert_no_broadcast(&mut conn.queue.rx).await;
}

#[tokio::test]
async fn unsubscribe_leaves_partition() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut conn = TestConn::new();
    conn.send(&state, &subscribe_text(id.as_str())).await;

    let replies = conn
        .send(&state, r#"{"channel":"DrawingChannel","command":"unsubscribe"}"#)
        .await;
    assert!(replies.is_empty());
    assert!(conn.subscription.is_none());
    assert_eq!(channel::member_count(&state, &id).await, 0);
}

// =============================================================================
// PUBLISH
// =============================================================================

#[tokio::test]
async fn publish_fans_out_to_peers_only() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut a = TestConn::new();
    let mut b = TestConn::new();
    a.send(&state, &subscribe_text(id.as_str())).await;
    b.send(&state, &subscribe_text(id.as_str())).await;

    let replies = a.send(&state, &red_segment_text(id.as_str())).await;
    assert!(replies.is_empty());
    assert_eq!(recv_broadcast(&mut b.queue.rx).await, ServerMessage::Broadcast(red_segment()));
    assert_no_broadcast(&mut a.queue.rx).await;
}

#[tokio::test]
async fn publish_clear_is_relayed_unchanged() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut a = TestConn::new();
    let mut b = TestConn::new();
    a.send(&state, &subscribe_text(id.as_str())).await;
    b.send(&state, &subscribe_text(id.as_str())).await;

    let text = format!(r#"{{"whiteboardId":"{id}","drawingData":{{"action":"clear"}}}}"#);
    a.send(&state, &text).await;
    assert_eq!(recv_broadcast(&mut b.queue.rx).await, ServerMessage::Broadcast(DrawingData::Clear));
}

#[tokio::test]
async fn publish_before_join_is_dropped() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut a = TestConn::new();
    let mut b = TestConn::new();
    b.send(&state, &subscribe_text(id.as_str())).await;

    assert!(a.send(&state, &red_segment_text(id.as_str())).await.is_empty());
    assert_no_broadcast(&mut b.queue.rx).await;
}

#[tokio::test]
async fn publish_to_foreign_whiteboard_is_dropped() {
    let state = test_helpers::test_app_state();
    let w1 = test_helpers::seed_whiteboard(&state, "Board One").await;
    let w2 = test_helpers::seed_whiteboard(&state, "Board Two").await;
    let mut a = TestConn::new();
    let mut b = TestConn::new();
    a.send(&state, &subscribe_text(w1.as_str())).await;
    b.send(&state, &subscribe_text(w2.as_str())).await;

    a.send(&state, &red_segment_text(w2.as_str())).await;
    assert_no_broadcast(&mut b.queue.rx).await;
}

#[tokio::test]
async fn configured_queue_depth_bounds_pending_broadcasts() {
    let state = test_helpers::test_app_state_with_capacity(1);
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut slow = TestConn::for_state(&state);
    let mut a = TestConn::for_state(&state);
    slow.send(&state, &subscribe_text(id.as_str())).await;
    a.send(&state, &subscribe_text(id.as_str())).await;

    a.send(&state, &red_segment_text(id.as_str())).await;
    a.send(&state, &red_segment_text(id.as_str())).await;

    assert_eq!(recv_broadcast(&mut slow.queue.rx).await, ServerMessage::Broadcast(red_segment()));
    assert_no_broadcast(&mut slow.queue.rx).await;
    assert_eq!(channel::member_count(&state, &id).await, 2);
}

#[tokio::test]
async fn malformed_frames_are_dropped_and_connection_survives() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let mut a = TestConn::new();
    let mut b = TestConn::new();
    a.send(&state, &subscribe_text(id.as_str())).await;
    b.send(&state, &subscribe_text(id.as_str())).await;

    for garbage in [
        "not json",
        r#"{"drawingData":{"action":"clear"}}"#,
        r#"{"whiteboardId":"1","drawingData":{"shape":"circle"}}"#,
        r#"{"channel":"ChatChannel"}"#,
    ] {
        assert!(a.send(&state, garbage).await.is_empty());
    }
    assert_no_broadcast(&mut b.queue.rx).await;

    a.send(&state, &red_segment_text(id.as_str())).await;
    assert_eq!(recv_broadcast(&mut b.queue.rx).await, ServerMessage::Broadcast(red_segment()));
}

// =============================================================================
// END TO END
// =============================================================================

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_test_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, crate::routes::app(state)).await.expect("serve");
    });
    format!("ws://{addr}/api/ws")
}

async fn connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.expect("connect");
    stream
}

async fn send_text(stream: &mut WsStream, text: String) {
    stream.send(WsMessage::text(text)).await.expect("send");
}

async fn recv_server_message(stream: &mut WsStream, wait: Duration) -> Option<ServerMessage> {
    loop {
        let next = timeout(wait, stream.next()).await.ok()??;
        if let WsMessage::Text(text) = next.expect("ws read") {
            return Some(ServerMessage::decode(text.as_str()).expect("decodable server message"));
        }
    }
}

#[tokio::test]
async fn two_clients_on_same_whiteboard_exchange_segments() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Whiteboard 42").await;
    let url = start_test_server(state).await;

    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    send_text(&mut a, subscribe_text(id.as_str())).await;
    send_text(&mut b, subscribe_text(id.as_str())).await;
    let confirmed = ServerMessage::Confirmed { whiteboard_id: id.clone() };
    assert_eq!(recv_server_message(&mut a, Duration::from_secs(2)).await, Some(confirmed.clone()));
    assert_eq!(recv_server_message(&mut b, Duration::from_secs(2)).await, Some(confirmed));

    send_text(&mut a, red_segment_text(id.as_str())).await;

    assert_eq!(
        recv_server_message(&mut b, Duration::from_secs(2)).await,
        Some(ServerMessage::Broadcast(red_segment()))
    );
    assert_eq!(recv_server_message(&mut a, Duration::from_millis(150)).await, None);
    assert_eq!(recv_server_message(&mut b, Duration::from_millis(150)).await, None);
}

#[tokio::test]
async fn rejected_client_stays_connected() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let url = start_test_server(state).await;

    let mut a = connect(&url).await;
    send_text(&mut a, subscribe_text("999")).await;
    let Some(ServerMessage::Rejected { code, .. }) = recv_server_message(&mut a, Duration::from_secs(2)).await else {
        panic!("expected rejection");
    };
    assert_eq!(code, "E_WHITEBOARD_NOT_FOUND");

    send_text(&mut a, subscribe_text(id.as_str())).await;
    assert_eq!(
        recv_server_message(&mut a, Duration::from_secs(2)).await,
        Some(ServerMessage::Confirmed { whiteboard_id: id })
    );
}

#[tokio::test]
async fn disconnect_removes_membership() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_whiteboard(&state, "Team Board").await;
    let url = start_test_server(state.clone()).await;

    let mut a = connect(&url).await;
    send_text(&mut a, subscribe_text(id.as_str())).await;
    recv_server_message(&mut a, Duration::from_secs(2)).await;
    assert_eq!(channel::member_count(&state, &id).await, 1);

    a.close(None).await.expect("close");
    drop(a);

    timeout(Duration::from_secs(2), async {
        while channel::member_count(&state, &id).await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("membership should be removed after disconnect");
}
