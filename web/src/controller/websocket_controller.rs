use crate::error::{Error, Result, WebErrorKind};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use events::GroupId;
use futures::future::ready;
use futures::{SinkExt, StreamExt};
use hub::{session, Frame, Manager, Scope};
use log::*;
use serde::Deserialize;
use service::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct GroupChatParams {
    group_id: Option<String>,
}

/// GET /ws
/// Direct messages and notifications for the user named by the auth frame.
pub(crate) async fn user_socket(
    State(app_state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(app_state.hub, Scope::User, socket))
}

/// GET /groups/chat/ws?group_id=<id>
/// Chat for one group. The group is fixed for the lifetime of the socket.
pub(crate) async fn group_chat_socket(
    State(app_state): State<AppState>,
    Query(params): Query<GroupChatParams>,
    ws: core::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response> {
    let group_id = parse_group_id(params.group_id.as_deref())?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    debug!("Upgrading group chat socket for group {group_id}");
    Ok(ws.on_upgrade(move |socket| serve_socket(app_state.hub, Scope::Group(group_id), socket)))
}

fn parse_group_id(raw: Option<&str>) -> Result<GroupId> {
    raw.and_then(|id| id.trim().parse::<GroupId>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            warn!("Rejecting group chat upgrade with group_id {raw:?}");
            Error::new(WebErrorKind::InvalidGroupId)
        })
}

async fn serve_socket(hub: Manager, scope: Scope, socket: WebSocket) {
    let (sink, stream) = socket.split();

    // Text frames only; the stream ends on close or on the first read error.
    let inbound = stream
        .take_while(|message| ready(is_open(message)))
        .filter_map(|message| ready(into_text(message)));

    let outbound = sink.with(|frame: Frame| ready(Ok::<_, axum::Error>(into_message(frame))));

    session::serve(hub, scope, inbound, outbound).await;
}

fn is_open(message: &core::result::Result<Message, axum::Error>) -> bool {
    match message {
        Ok(Message::Close(_)) => false,
        Ok(_) => true,
        Err(e) => {
            debug!("WebSocket read failed: {e}");
            false
        }
    }
}

fn into_text(message: core::result::Result<Message, axum::Error>) -> Option<String> {
    match message {
        Ok(Message::Text(text)) => Some(text),
        _ => None,
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Ping => Message::Ping(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_id() {
        assert_eq!(parse_group_id(Some("42")).unwrap(), 42);
        assert_eq!(parse_group_id(Some(" 7 ")).unwrap(), 7);
        for raw in [None, Some(""), Some("0"), Some("-3"), Some("abc"), Some("4.2")] {
            assert_eq!(
                parse_group_id(raw).unwrap_err().error_kind,
                WebErrorKind::InvalidGroupId
            );
        }
    }

    #[test]
    fn test_only_text_frames_reach_the_session() {
        assert_eq!(
            into_text(Ok(Message::Text("hi".to_string()))),
            Some("hi".to_string())
        );
        assert_eq!(into_text(Ok(Message::Binary(vec![1, 2]))), None);
        assert_eq!(into_text(Ok(Message::Pong(Vec::new()))), None);
    }

    #[test]
    fn test_close_ends_the_inbound_stream() {
        assert!(is_open(&Ok(Message::Text("x".to_string()))));
        assert!(is_open(&Ok(Message::Ping(Vec::new()))));
        assert!(!is_open(&Ok(Message::Close(None))));
    }

    #[test]
    fn test_frames_map_to_websocket_messages() {
        assert_eq!(
            into_message(Frame::Text("authenticated".to_string())),
            Message::Text("authenticated".to_string())
        );
        assert_eq!(into_message(Frame::Ping), Message::Ping(Vec::new()));
    }
}
