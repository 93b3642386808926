//! # WebSocket Handlers
//!
//! Two sockets, both actix actors with a ping/pong heartbeat:
//!
//! ## `/ws/media/{pc_id}`: media bridge
//! The transport side of a realtime session negotiated through `/api/offer`. Opening it
//! connects the session; closing it disconnects the session.
//! - **Client → Server**: binary 16-bit PCM, text data-channel JSON
//! - **Server → Client**: text events (`bot-transcription`, `interview_complete`, `error`),
//!   tagged binary media
//!
//! ## `/ws/interview`: text-mode interview
//! - **Client → Server**: optional `{type: "setup", data}` first, then
//!   `{type: "user_message", content}` or `{type: "end_interview"}`
//! - **Server → Client**: `{type: "ai_message", content}`, finally `interview_complete`
//!   or `error`

use crate::error::AppError;
use crate::setup::SetupContext;
use crate::signaling::{SignalingManager, SESSION_ERROR_MESSAGE};
use crate::state::AppState;
use crate::summary::{InterviewSummary, SummarySynthesizer};
use crate::text_interview::{TextInterview, TurnEvent};
use crate::transport::local::{BridgeMessage, LocalPeerConnection};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Messages on the text-mode socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InterviewMessage {
    /// Interview setup, accepted only before the first answer
    #[serde(rename = "setup")]
    Setup {
        #[serde(default)]
        data: Option<SetupContext>,
    },

    #[serde(rename = "user_message")]
    UserMessage {
        #[serde(default)]
        content: String,
    },

    #[serde(rename = "end_interview")]
    EndInterview,

    #[serde(rename = "ai_message")]
    AiMessage { content: String },

    #[serde(rename = "interview_complete")]
    InterviewComplete { summary: InterviewSummary },

    #[serde(rename = "error")]
    Error { content: String },
}

/// Close the socket after everything queued so far.
#[derive(Message)]
#[rtype(result = "()")]
struct CloseSocket;

fn heartbeat<A>(ctx: &mut ws::WebsocketContext<A>, last_heartbeat: fn(&A) -> Instant)
where
    A: Actor<Context = ws::WebsocketContext<A>>,
{
    ctx.run_interval(HEARTBEAT_INTERVAL, move |act, ctx| {
        if Instant::now().duration_since(last_heartbeat(act)) > CLIENT_TIMEOUT {
            warn!("WebSocket heartbeat timeout, closing connection");
            ctx.stop();
        } else {
            ctx.ping(b"");
        }
    });
}

// ---------------------------------------------------------------------------
// Media bridge
// ---------------------------------------------------------------------------

/// One end of a local peer connection.
pub struct MediaBridgeSocket {
    pc_id: String,
    bridge: Arc<LocalPeerConnection>,
    signaling: Arc<SignalingManager>,
    outbound: Option<mpsc::UnboundedReceiver<BridgeMessage>>,
    last_heartbeat: Instant,
}

impl MediaBridgeSocket {
    pub fn new(
        pc_id: String,
        bridge: Arc<LocalPeerConnection>,
        signaling: Arc<SignalingManager>,
        outbound: mpsc::UnboundedReceiver<BridgeMessage>,
    ) -> Self {
        Self {
            pc_id,
            bridge,
            signaling,
            outbound: Some(outbound),
            last_heartbeat: Instant::now(),
        }
    }
}

impl Actor for MediaBridgeSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(pc_id = %self.pc_id, "Media bridge socket started");
        if let Some(outbound) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(outbound));
        }
        heartbeat(ctx, |act: &Self| act.last_heartbeat);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(pc_id = %self.pc_id, "Media bridge socket stopped");
        self.bridge.detach();
        // already gone when the session closed the bridge itself
        if let Err(err) = self.signaling.on_disconnect(&self.pc_id) {
            debug!(pc_id = %self.pc_id, error = %err, "Session already closed");
        }
    }
}

/// Outbound traffic from the session.
impl StreamHandler<BridgeMessage> for MediaBridgeSocket {
    fn handle(&mut self, msg: BridgeMessage, ctx: &mut Self::Context) {
        match msg {
            BridgeMessage::Text(text) => ctx.text(text),
            BridgeMessage::Binary(bytes) => ctx.binary(bytes),
            BridgeMessage::Close => {
                ctx.close(Some(ws::CloseCode::Normal.into()));
                ctx.stop();
            }
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

/// Inbound traffic from the client.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for MediaBridgeSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => self.bridge.push_audio(&data),
            Ok(ws::Message::Text(text)) => {
                if let Err(err) = self.bridge.push_message(&text) {
                    warn!(pc_id = %self.pc_id, error = %err, "Rejected data-channel message");
                }
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(pc_id = %self.pc_id, "Media bridge closed by client: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(pc_id = %self.pc_id, "Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(pc_id = %self.pc_id, "WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// GET /ws/media/{pc_id}
pub async fn media_websocket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let pc_id = path.into_inner();
    let bridge = app_state
        .connector
        .bridge(&pc_id)
        .ok_or_else(|| AppError::NotFound(format!("connection {} not found", pc_id)))?;
    // validate the upgrade before attaching, so a plain GET can't mark the peer connected
    ws::handshake(&req)?;
    let outbound = bridge
        .attach()
        .ok_or_else(|| AppError::BadRequest(format!("connection {} already has a media bridge", pc_id)))?;

    let socket = MediaBridgeSocket::new(pc_id, bridge, app_state.signaling.clone(), outbound);
    ws::start(socket, &req, stream)
}

// ---------------------------------------------------------------------------
// Text-mode interview
// ---------------------------------------------------------------------------

pub struct InterviewSocket {
    state: web::Data<AppState>,
    interview: Option<Arc<TextInterview>>,
    /// Feeds the turn worker; dropped once the interview is over
    answers: Option<mpsc::UnboundedSender<String>>,
    finished: bool,
    last_heartbeat: Instant,
}

impl InterviewSocket {
    pub fn new(state: web::Data<AppState>) -> Self {
        Self {
            state,
            interview: None,
            answers: None,
            finished: false,
            last_heartbeat: Instant::now(),
        }
    }

    fn send(ctx: &mut ws::WebsocketContext<Self>, message: &InterviewMessage) {
        match serde_json::to_string(message) {
            Ok(json) => ctx.text(json),
            Err(err) => error!("Failed to serialize interview message: {}", err),
        }
    }

    /// Create the interview, send the opening line and start the turn worker.
    fn begin(&mut self, setup: Option<SetupContext>, ctx: &mut ws::WebsocketContext<Self>) {
        let config = &self.state.config;
        let model = self.state.signaling.model();
        let summary = SummarySynthesizer::new(model.clone(), config.llm.summary_max_tokens, config.llm.temperature);
        let setup = self.state.setup_store.resolve(setup);
        let interview = Arc::new(TextInterview::new(
            setup,
            model,
            summary,
            config.llm.max_tokens,
            config.llm.temperature,
        ));

        let opening = interview.opening();
        Self::send(ctx, &InterviewMessage::AiMessage { content: opening });
        info!(
            questions = interview.conversation().interview().pool_size(),
            "Text interview started"
        );

        let (answers, events) = interview.clone().spawn_turns();
        ctx.add_stream(UnboundedReceiverStream::new(events));
        self.answers = Some(answers);
        self.interview = Some(interview);
    }

    /// Queue an answer; the worker handles them in arrival order.
    fn answer(&mut self, content: String, ctx: &mut ws::WebsocketContext<Self>) {
        let content = content.trim().to_string();
        if content.is_empty() {
            return;
        }
        if self.interview.is_none() {
            // no setup message: the first message only opens the interview
            debug!("Interview opened without setup");
            self.begin(None, ctx);
            return;
        }
        let queued = self.answers.as_ref().is_some_and(|answers| answers.send(content).is_ok());
        if !queued {
            warn!("Interview is no longer taking answers, dropping message");
        }
    }

    /// Stop taking answers. The worker finishes what is queued, then summarizes.
    fn end(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        info!("Candidate ended text interview early");
        self.finished = true;
        if self.answers.take().is_none() {
            ctx.address().do_send(CloseSocket);
        }
    }
}

impl Actor for InterviewSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Text interview socket started");
        heartbeat(ctx, |act: &Self| act.last_heartbeat);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("Text interview socket stopped");
    }
}

impl StreamHandler<TurnEvent> for InterviewSocket {
    fn handle(&mut self, event: TurnEvent, ctx: &mut Self::Context) {
        match event {
            TurnEvent::Reply(reply) => {
                Self::send(ctx, &InterviewMessage::AiMessage { content: reply.content });
                if reply.complete {
                    info!("Text interview completed, generating summary");
                    self.finished = true;
                    self.answers = None;
                }
            }
            TurnEvent::Summary(summary) => {
                match summary {
                    Ok(Some(summary)) => {
                        Self::send(ctx, &InterviewMessage::InterviewComplete { summary });
                        info!("Summary sent to client");
                    }
                    Ok(None) => info!("No answers recorded, closing without summary"),
                    Err(err) => {
                        error!(error = %err, "Summary generation failed");
                        Self::send(ctx, &InterviewMessage::Error {
                            content: SESSION_ERROR_MESSAGE.to_string(),
                        });
                    }
                }
                ctx.address().do_send(CloseSocket);
            }
        }
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        debug!("Turn worker finished");
    }
}

impl Handler<CloseSocket> for InterviewSocket {
    type Result = ();

    fn handle(&mut self, _msg: CloseSocket, ctx: &mut Self::Context) {
        ctx.close(Some(ws::CloseCode::Normal.into()));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for InterviewSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                if self.finished {
                    debug!("Interview finished, ignoring message");
                    return;
                }
                match serde_json::from_str::<InterviewMessage>(&text) {
                    Ok(InterviewMessage::Setup { data }) => {
                        if self.interview.is_some() {
                            warn!("Setup received after the interview started, ignoring");
                        } else {
                            self.begin(data, ctx);
                        }
                    }
                    Ok(InterviewMessage::UserMessage { content }) => self.answer(content, ctx),
                    Ok(InterviewMessage::EndInterview) => self.end(ctx),
                    Ok(_) => warn!("Received unexpected message type from client"),
                    Err(err) => {
                        warn!("Invalid interview message: {}", err);
                        Self::send(ctx, &InterviewMessage::Error {
                            content: format!("Invalid message: {}", err),
                        });
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => warn!("Binary frames are not supported on the text interview socket"),
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Text interview socket closed: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => warn!("Received unexpected continuation frame"),
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!("WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// GET /ws/interview
pub async fn interview_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    info!("New text interview connection from: {:?}", req.connection_info().peer_addr());
    ws::start(InterviewSocket::new(app_state), &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_interview_message_wire_format() {
        let parsed: InterviewMessage =
            serde_json::from_value(json!({"type": "setup", "data": {"jobTitle": "QA Lead"}})).unwrap();
        match parsed {
            InterviewMessage::Setup { data: Some(setup) } => assert_eq!(setup.job_title(), Some("QA Lead")),
            other => panic!("unexpected message: {:?}", other),
        }

        let parsed: InterviewMessage = serde_json::from_value(json!({"type": "end_interview"})).unwrap();
        assert!(matches!(parsed, InterviewMessage::EndInterview));

        let json = serde_json::to_string(&InterviewMessage::AiMessage { content: "Hi".to_string() }).unwrap();
        assert_eq!(json, r#"{"type":"ai_message","content":"Hi"}"#);
    }

    #[actix_web::test]
    async fn test_media_bridge_for_unknown_connection_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(2)))
                .route("/ws/media/{pc_id}", web::get().to(media_websocket)),
        )
        .await;

        let req = test::TestRequest::get().uri("/ws/media/unknown").to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
