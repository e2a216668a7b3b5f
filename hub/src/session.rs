//! Lifecycle of one client connection, independent of the transport.
//!
//! The web layer adapts a WebSocket into a stream of inbound text frames and a sink of
//! outbound [`Frame`]s and hands both to [`serve`]. The calling task becomes the
//! connection's reader; a spawned writer task owns the sink.

use futures::{Sink, SinkExt, Stream, StreamExt};
use log::*;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};

use crate::auth::Scope;
use crate::collaborators::AuthenticatedUser;
use crate::connection::{Connection, Frame};
use crate::error::{AuthErrorKind, Error, HubErrorKind};
use crate::manager::Manager;
use crate::message::{error_frame, DirectFrame, GroupFrame, AUTHENTICATED};

const INVALID_MESSAGE: &str = "Invalid message format";

/// Authenticates, registers and serves a connection until it closes.
///
/// `inbound` must end when the client disconnects or a read fails. Exactly one
/// unregister is issued for the connection when this returns.
pub async fn serve<St, Si>(manager: Manager, scope: Scope, inbound: St, outbound: Si)
where
    St: Stream<Item = String> + Send,
    Si: Sink<Frame> + Send + 'static,
    Si::Error: Display,
{
    let mut inbound = Box::pin(inbound);
    let mut outbound = Box::pin(outbound);
    let settings = manager.settings().clone();

    if manager.is_shutting_down() {
        debug!("Refusing connection for {scope:?}: hub is shutting down");
        let _ = outbound.close().await;
        return;
    }

    let first_frame = match timeout(settings.auth_timeout, inbound.next()).await {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            debug!("Connection closed before authenticating");
            return;
        }
        Err(_) => {
            info!(
                "Connection did not authenticate within {:?}",
                settings.auth_timeout
            );
            reject(&mut outbound, &AuthErrorKind::Timeout).await;
            return;
        }
    };

    let user = match manager.gate().admit(&first_frame, scope).await {
        Ok(user) => user,
        Err(e) => {
            info!("Rejected connection for {scope:?}: {e}");
            let kind = match &e.error_kind {
                HubErrorKind::Auth(kind) => kind,
                _ => &AuthErrorKind::InvalidToken,
            };
            reject(&mut outbound, kind).await;
            return;
        }
    };

    if let Err(e) = outbound.send(Frame::Text(AUTHENTICATED.to_string())).await {
        debug!("Connection dropped before acknowledgement: {e}");
        return;
    }

    let group_id = match scope {
        Scope::User => None,
        Scope::Group(group_id) => Some(group_id),
    };
    let (connection, frames) = Connection::channel(
        user.user_id,
        user.display_name.clone(),
        group_id,
        settings.outbound_buffer,
    );
    let identity = connection.identity();
    manager.registry().register(connection.clone()).await;
    // A shutdown that began before the register above may already have run close_all.
    if manager.is_shutting_down() {
        connection.close();
    }
    info!(
        "User {} connected as {identity} (connection {})",
        user.user_id,
        connection.id()
    );

    let writer = tokio::spawn(write_frames(
        outbound,
        frames,
        connection.clone(),
        settings.ping_interval,
    ));

    loop {
        let text = tokio::select! {
            _ = connection.closed() => break,
            next = inbound.next() => match next {
                Some(text) => text,
                None => break,
            },
        };
        handle_frame(&manager, &connection, &user, scope, &text).await;
    }

    manager
        .registry()
        .unregister(identity, connection.id())
        .await;
    connection.close();
    let _ = writer.await;

    info!(
        "User {} disconnected from {identity} (connection {})",
        user.user_id,
        connection.id()
    );
}

async fn reject<Si>(outbound: &mut Pin<Box<Si>>, kind: &AuthErrorKind)
where
    Si: Sink<Frame>,
{
    let _ = outbound
        .send(Frame::Text(kind.diagnostic().to_string()))
        .await;
    let _ = outbound.close().await;
}

async fn handle_frame(
    manager: &Manager,
    connection: &Connection,
    user: &AuthenticatedUser,
    scope: Scope,
    text: &str,
) {
    match scope {
        Scope::User => {
            let outbound = serde_json::from_str::<DirectFrame>(text)
                .map_err(Error::from)
                .and_then(|frame| frame.into_outbound(user.user_id, &user.display_name));

            match outbound {
                Ok(message) => {
                    manager.dispatcher().dispatch(message).await;
                }
                Err(e) => {
                    debug!("Dropping frame from user {}: {e}", user.user_id);
                    let reply = error_frame(INVALID_MESSAGE);
                    if let Err(e) = connection
                        .send(reply, manager.settings().write_timeout)
                        .await
                    {
                        debug!("Could not report invalid frame to user {}: {e}", user.user_id);
                    }
                }
            }
        }
        Scope::Group(group_id) => {
            let frame = match serde_json::from_str::<GroupFrame>(text) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(
                        "Dropping malformed group frame from user {} in group {group_id}: {e}",
                        user.user_id
                    );
                    return;
                }
            };

            if let Err(e) = manager.group_chat().handle(user, group_id, frame).await {
                info!(
                    "Group message from user {} in group {group_id} dropped: {e}",
                    user.user_id
                );
            }
        }
    }
}

async fn write_frames<Si>(
    mut sink: Pin<Box<Si>>,
    mut frames: mpsc::Receiver<Frame>,
    connection: Connection,
    ping_interval: Option<Duration>,
) where
    Si: Sink<Frame>,
    Si::Error: Display,
{
    let mut ping = ping_interval.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    loop {
        let frame = tokio::select! {
            _ = connection.closed() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = next_ping(&mut ping) => Frame::Ping,
        };

        if let Err(e) = sink.send(frame).await {
            debug!("Write to connection {} failed: {e}", connection.id());
            break;
        }
    }

    connection.close();
    let _ = sink.close().await;
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
