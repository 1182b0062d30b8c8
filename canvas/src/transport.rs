//! Browser websocket transport for the drawing channel.
//!
//! LIFECYCLE
//! =========
//! open socket → send subscribe → pump frames until either side drops →
//! back off → reopen. A rejected subscription ends the loop for good.
//! Frames queued for a socket that dropped are discarded, never replayed.

use std::rc::Rc;

use futures::channel::mpsc;
use futures::future::Either;
use futures::{SinkExt, StreamExt};
use gloo_net::websocket::Message;
use gloo_net::websocket::futures::WebSocket;

use crate::connection::{ConnectionError, Inbound};
use crate::dom::Shared;

/// Spawn the connection lifecycle as a local task.
pub(crate) fn spawn(shared: Rc<Shared>, url: String, rx: mpsc::UnboundedReceiver<String>) {
    wasm_bindgen_futures::spawn_local(connection_loop(shared, url, rx));
}

async fn connection_loop(shared: Rc<Shared>, url: String, mut rx: mpsc::UnboundedReceiver<String>) {
    loop {
        shared.connection.borrow_mut().on_connecting();
        shared.publish_status();
        discard_stale(&mut rx);

        match connect_and_run(&url, &shared, &mut rx).await {
            Ok(()) => log::info!("websocket closed"),
            Err(ConnectionError::Rejected { code, message }) => {
                log::error!("whiteboard subscription rejected ({code}): {message}");
            }
            Err(e) => log::warn!("websocket error: {e}"),
        }

        let delay = shared.connection.borrow_mut().on_closed();
        shared.publish_status();
        let Some(delay) = delay else {
            log::warn!("not reconnecting: drawing disabled");
            return;
        };
        log::info!("reconnecting in {} ms", delay.as_millis());
        gloo_timers::future::sleep(delay).await;
    }
}

/// Drop frames produced for a connection that no longer exists.
fn discard_stale(rx: &mut mpsc::UnboundedReceiver<String>) {
    let mut dropped = 0usize;
    while let Ok(Some(_)) = rx.try_next() {
        dropped += 1;
    }
    if dropped > 0 {
        log::debug!("discarded {dropped} unsent frames");
    }
}

/// Connect, subscribe and process frames until disconnect or rejection.
async fn connect_and_run(
    url: &str,
    shared: &Shared,
    rx: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ConnectionError> {
    let ws = WebSocket::open(url).map_err(|e| ConnectionError::Transport(e.to_string()))?;
    let (mut ws_write, mut ws_read) = ws.split();

    let subscribe = shared.connection.borrow_mut().on_open();
    ws_write
        .send(Message::Text(subscribe))
        .await
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;

    // Forward outgoing frames from the local queue to the socket.
    let send_task = async {
        while let Some(text) = rx.next().await {
            if ws_write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    };

    let recv_task = async {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Text(text)) => route_inbound(shared, &text)?,
                Ok(Message::Bytes(_)) => log::debug!("ignoring binary frame"),
                Err(e) => return Err(ConnectionError::Transport(e.to_string())),
            }
        }
        Ok(())
    };

    // Whichever side finishes first ends the connection.
    match futures::future::select(Box::pin(send_task), Box::pin(recv_task)).await {
        Either::Left(((), _)) => Ok(()),
        Either::Right((result, _)) => result,
    }
}

fn route_inbound(shared: &Shared, text: &str) -> Result<(), ConnectionError> {
    let routed = shared.connection.borrow_mut().on_text(text);
    match routed {
        Ok(Some(Inbound::Joined(_))) => shared.publish_status(),
        Ok(Some(Inbound::Remote(data))) => shared.surface.borrow_mut().apply_remote(&data),
        Ok(None) => {}
        Err(ConnectionError::Codec(e)) => log::debug!("dropping malformed frame: {e}"),
        Err(e) => {
            shared.publish_status();
            return Err(e);
        }
    }
    Ok(())
}
