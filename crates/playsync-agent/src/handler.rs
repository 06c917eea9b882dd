//! Agent loop: processes relay frames, embedder commands and the heartbeat
//! timer, and drives the session state machine.

use std::time::Instant;

use playsync_proto::{
    ClientFrame, ErrorBody, EventBody, ParticipantIdentity, PresenceAction, RelayedEvent,
    ServerFrame, SyncAction, epoch_ms,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::player::PlayerHandle;
use crate::session::{PlayerEvent, SessionState, SyncSession};
use crate::ws_client::{self, WsClientEvent, WsClientHandle};

/// Commands sent to the agent from the embedder.
#[derive(Debug)]
pub enum AgentCommand {
    /// Open the relay connection and join the configured room.
    Connect,
    /// Close the connection.
    Disconnect,
    /// A player became available.
    AttachPlayer(PlayerHandle),
    /// The player went away (navigation, media swap).
    DetachPlayer,
    /// A locally observed player notification.
    Player(PlayerEvent),
    /// Shut the agent down.
    Shutdown,
}

/// Notifications sent up to the embedder.
#[derive(Debug, Clone)]
pub enum AgentNotice {
    StateChanged(SessionState),
    Roster(Vec<ParticipantIdentity>),
    PeerJoined(ParticipantIdentity),
    PeerLeft(ParticipantIdentity),
    ServerError(ErrorBody),
}

/// One sync agent: a session state machine plus the connection it drives.
pub struct SyncAgent {
    config: AgentConfig,
    session: SyncSession,
    player: Option<PlayerHandle>,
    client: Option<WsClientHandle>,
    ws_events: Option<mpsc::Receiver<WsClientEvent>>,
    command_rx: mpsc::Receiver<AgentCommand>,
    notice_tx: mpsc::Sender<AgentNotice>,
}

impl SyncAgent {
    /// Create an agent and the command sender the embedder keeps.
    pub fn new(
        config: AgentConfig,
        notice_tx: mpsc::Sender<AgentNotice>,
    ) -> (Self, mpsc::Sender<AgentCommand>) {
        let (tx, rx) = mpsc::channel(32);
        let session = SyncSession::new(&config);
        (
            Self {
                config,
                session,
                player: None,
                client: None,
                ws_events: None,
                command_rx: rx,
                notice_tx,
            },
            tx,
        )
    }

    /// Run the agent loop until `Shutdown` or the command channel closes.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(AgentCommand::Connect) => self.handle_connect().await?,
                        Some(AgentCommand::Disconnect) => self.handle_disconnect().await,
                        Some(AgentCommand::AttachPlayer(player)) => {
                            self.handle_attach(player).await;
                        }
                        Some(AgentCommand::DetachPlayer) => {
                            self.player = None;
                            self.session.on_player_detached();
                        }
                        Some(AgentCommand::Player(event)) => {
                            self.handle_player_event(event).await;
                        }
                        Some(AgentCommand::Shutdown) | None => {
                            debug!("command channel closed");
                            self.handle_disconnect().await;
                            return Ok(());
                        }
                    }
                }
                event = recv_opt(&mut self.ws_events) => {
                    match event {
                        Some(WsClientEvent::Frame(frame)) => self.handle_frame(frame).await,
                        Some(WsClientEvent::Disconnected { reason }) => {
                            warn!(%reason, "relay connection lost");
                            self.drop_transport().await;
                        }
                        None => {
                            self.drop_transport().await;
                        }
                    }
                }
                _ = heartbeat.tick(), if self.session.heartbeat_enabled
                    && self.session.state == SessionState::Synced =>
                {
                    self.send_player_action(SyncAction::Heartbeat).await;
                }
            }
        }
    }

    async fn handle_connect(&mut self) -> Result<(), AgentError> {
        if self.client.is_some() {
            warn!("already connected, ignoring connect command");
            return Ok(());
        }
        self.session.on_connect_started();
        self.notify(AgentNotice::StateChanged(SessionState::Connecting))
            .await;

        let (event_tx, event_rx) = mpsc::channel(64);
        let client = match ws_client::connect(&self.config.server, event_tx).await {
            Ok(client) => client,
            Err(err) => {
                warn!(%err, "relay connect failed");
                self.session.on_transport_closed();
                self.notify(AgentNotice::StateChanged(SessionState::Disconnected))
                    .await;
                return Ok(());
            }
        };

        self.session.on_transport_open();
        self.notify(AgentNotice::StateChanged(SessionState::AwaitingAck))
            .await;

        let join = ClientFrame::Join {
            room: self.config.room.clone(),
            client_id: self.config.client_id.clone(),
            nickname: self.config.nickname.clone(),
        };
        client.send_frame(&join).await?;

        self.client = Some(client);
        self.ws_events = Some(event_rx);
        Ok(())
    }

    async fn handle_disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.close().await;
        }
        self.ws_events = None;
        if self.session.state != SessionState::Disconnected {
            self.session.on_transport_closed();
            self.notify(AgentNotice::StateChanged(SessionState::Disconnected))
                .await;
        }
    }

    async fn drop_transport(&mut self) {
        self.client = None;
        self.ws_events = None;
        self.session.on_transport_closed();
        self.notify(AgentNotice::StateChanged(SessionState::Disconnected))
            .await;
    }

    async fn handle_attach(&mut self, player: PlayerHandle) {
        self.session
            .on_player_attached(&player.descriptor().media_id);
        self.player = Some(player);

        // Catch up on events that arrived before the player existed.
        let pending = self.session.take_pending();
        if let Some(player) = &mut self.player {
            let now = Instant::now();
            let now_ms = epoch_ms();
            for event in &pending {
                self.session.apply_remote(event, player, now, now_ms);
            }
        }

        // Announce our state so peers can reconcile against it.
        if self.session.state == SessionState::Synced {
            self.send_player_action(SyncAction::Heartbeat).await;
        }
    }

    async fn handle_player_event(&mut self, event: PlayerEvent) {
        let Some(player) = &self.player else {
            return;
        };
        let paused = player.paused();
        if let Some(action) = self
            .session
            .local_player_event(event, paused, Instant::now())
        {
            self.send_action_unshaped(action).await;
        }
    }

    /// Send an action on behalf of the attached player, subject to outbound
    /// shaping.
    async fn send_player_action(&mut self, action: SyncAction) {
        if !self.session.shape_outbound(action, Instant::now()) {
            return;
        }
        self.send_action_unshaped(action).await;
    }

    /// Build and send the frame for an action already admitted by shaping.
    async fn send_action_unshaped(&mut self, action: SyncAction) {
        let Some(player) = &self.player else {
            return;
        };
        let Some(client) = &self.client else {
            return;
        };
        let body = EventBody {
            action,
            state: self.session.collect_snapshot(player),
            sent_at: Some(epoch_ms()),
        };
        let frame = match action {
            SyncAction::Heartbeat => ClientFrame::Heartbeat(body),
            _ => ClientFrame::Event(body),
        };
        if let Err(err) = client.send_frame(&frame).await {
            warn!(%err, ?action, "failed to send event");
        }
    }

    async fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Ack {
                room,
                clients,
                ..
            } => {
                info!(%room, peers = clients.len(), "joined room");
                self.session.on_ack(clients.clone());
                self.notify(AgentNotice::StateChanged(SessionState::Synced))
                    .await;
                self.notify(AgentNotice::Roster(clients)).await;
                if self.player.is_some() {
                    self.send_player_action(SyncAction::Heartbeat).await;
                }
            }
            ServerFrame::Presence {
                action,
                client_id,
                nickname,
                clients,
                ..
            } => {
                self.session.on_roster(clients.clone());
                let identity = ParticipantIdentity {
                    client_id,
                    nickname,
                };
                let notice = match action {
                    PresenceAction::Join => AgentNotice::PeerJoined(identity),
                    PresenceAction::Leave => AgentNotice::PeerLeft(identity),
                };
                self.notify(notice).await;
                self.notify(AgentNotice::Roster(clients)).await;
            }
            ServerFrame::Event(event) | ServerFrame::Heartbeat(event) => {
                self.handle_remote_event(event);
            }
            ServerFrame::Error { error } => {
                warn!(code = ?error.code, message = %error.message, "relay reported error");
                self.notify(AgentNotice::ServerError(error)).await;
            }
            ServerFrame::Pong { server_time } => {
                debug!(server_time, "pong");
            }
        }
    }

    fn handle_remote_event(&mut self, event: RelayedEvent) {
        // The relay excludes the sender from fan-out; this guards against a
        // peer reusing our id.
        if event.client_id == self.config.client_id {
            return;
        }
        match &mut self.player {
            Some(player) => {
                self.session
                    .apply_remote(&event, player, Instant::now(), epoch_ms());
            }
            None => self.session.queue_remote(event),
        }
    }

    async fn notify(&self, notice: AgentNotice) {
        if self.notice_tx.send(notice).await.is_err() {
            debug!("notice channel closed");
        }
    }
}

/// Receive from an optional channel; pends forever while there is none, so
/// it can sit in a `select!` without a connection.
async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
