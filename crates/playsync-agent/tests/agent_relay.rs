//! End-to-end test: a full agent against a real relay.
//!
//! Covers connect/join/ack, the announce heartbeat, the periodic heartbeat
//! cadence, and a remote peer's event driving the attached player.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use playsync_agent::{
    AgentCommand, AgentConfig, AgentNotice, MediaDescriptor, MediaSurface, PlayerError,
    PlayerEvent, PlayerHandle, SessionState, SyncAgent,
};
use playsync_proto::{
    ClientFrame, EventBody, PlaybackSnapshot, ServerFrame, SyncAction, encode_frame,
};
use playsync_relayd::net::ws::run_ws_listener;
use playsync_relayd::run_relay;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Default)]
struct FakeState {
    current_time: f64,
    paused: bool,
    rate: f64,
    seeks: Vec<f64>,
    plays: usize,
}

#[derive(Clone)]
struct FakeSurface(Arc<Mutex<FakeState>>);

impl MediaSurface for FakeSurface {
    fn current_time(&self) -> f64 {
        self.0.lock().expect("lock").current_time
    }
    fn set_current_time(&mut self, seconds: f64) -> Result<(), PlayerError> {
        let mut s = self.0.lock().expect("lock");
        s.current_time = seconds;
        s.seeks.push(seconds);
        Ok(())
    }
    fn paused(&self) -> bool {
        self.0.lock().expect("lock").paused
    }
    fn play(&mut self) -> Result<(), PlayerError> {
        let mut s = self.0.lock().expect("lock");
        s.paused = false;
        s.plays += 1;
        Ok(())
    }
    fn pause(&mut self) -> Result<(), PlayerError> {
        self.0.lock().expect("lock").paused = true;
        Ok(())
    }
    fn playback_rate(&self) -> f64 {
        self.0.lock().expect("lock").rate
    }
    fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlayerError> {
        self.0.lock().expect("lock").rate = rate;
        Ok(())
    }
    fn duration(&self) -> f64 {
        3600.0
    }
}

async fn spawn_test_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = mpsc::channel(1024);
    tokio::spawn(run_ws_listener(listener, tx, None));
    tokio::spawn(run_relay(rx, None));
    addr
}

async fn expect_state(
    notices: &mut mpsc::Receiver<AgentNotice>,
    expected: SessionState,
) -> anyhow::Result<()> {
    loop {
        let notice = timeout(Duration::from_secs(2), notices.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("notice channel closed"))?;
        if let AgentNotice::StateChanged(state) = notice {
            anyhow::ensure!(state == expected, "expected {expected:?}, got {state:?}");
            return Ok(());
        }
    }
}

#[tokio::test]
async fn agent_joins_and_applies_a_remote_seek() -> anyhow::Result<()> {
    let addr = spawn_test_relay().await;

    let state = Arc::new(Mutex::new(FakeState {
        current_time: 10.0,
        paused: true,
        rate: 1.0,
        ..Default::default()
    }));
    let player = PlayerHandle::new(
        Box::new(FakeSurface(state.clone())),
        MediaDescriptor {
            media_id: "m1".into(),
            locator_url: "https://example.com/m1".into(),
            title: "m1".into(),
        },
    );

    // Bare host:port on purpose; the client normalizes the scheme.
    let config = AgentConfig::new(addr.to_string(), "r1", "ada", "client-a");
    let (notice_tx, mut notices) = mpsc::channel(64);
    let (mut agent, cmd_tx) = SyncAgent::new(config, notice_tx);
    tokio::spawn(async move { agent.run().await });

    cmd_tx.send(AgentCommand::AttachPlayer(player)).await?;
    cmd_tx.send(AgentCommand::Connect).await?;

    expect_state(&mut notices, SessionState::Connecting).await?;
    expect_state(&mut notices, SessionState::AwaitingAck).await?;
    expect_state(&mut notices, SessionState::Synced).await?;

    // A raw peer joins the same room.
    let (mut peer, _) = connect_async(format!("ws://{addr}")).await?;
    peer.send(Message::text(encode_frame(&ClientFrame::Join {
        room: "r1".into(),
        client_id: "client-b".into(),
        nickname: "bob".into(),
    })?))
    .await?;

    // Peer sees its ack, then the agent's announce heartbeat.
    let mut saw_heartbeat = false;
    for _ in 0..3 {
        let msg = timeout(Duration::from_secs(2), peer.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("peer connection closed"))??;
        if let Message::Text(text) = msg
            && let Ok(ServerFrame::Heartbeat(event)) = serde_json::from_str(text.as_str())
        {
            assert_eq!(event.client_id, "client-a");
            assert_eq!(event.state.media_id, "m1");
            saw_heartbeat = true;
            break;
        }
    }
    assert!(saw_heartbeat, "agent never announced itself");

    // Agent learns about the peer.
    loop {
        let notice = timeout(Duration::from_secs(2), notices.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("notice channel closed"))?;
        if let AgentNotice::PeerJoined(identity) = notice {
            assert_eq!(identity.client_id, "client-b");
            break;
        }
    }

    // Peer plays at a far position; the agent corrects and starts playback.
    peer.send(Message::text(encode_frame(&ClientFrame::Event(EventBody {
        action: SyncAction::Play,
        state: PlaybackSnapshot {
            media_id: "m1".into(),
            current_time: 100.0,
            paused: false,
            ..Default::default()
        },
        sent_at: None,
    }))?))
    .await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        {
            let s = state.lock().expect("lock");
            if s.plays > 0 && !s.seeks.is_empty() {
                assert!(s.seeks[0] >= 100.0, "seek target {} too small", s.seeks[0]);
                assert!(!s.paused);
                break;
            }
        }
        anyhow::ensure!(
            tokio::time::Instant::now() < deadline,
            "player never driven by remote event"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    cmd_tx.send(AgentCommand::Disconnect).await?;
    expect_state(&mut notices, SessionState::Disconnected).await?;
    Ok(())
}

#[tokio::test]
async fn heartbeats_repeat_while_playing_and_stop_after_pause() -> anyhow::Result<()> {
    let addr = spawn_test_relay().await;

    let state = Arc::new(Mutex::new(FakeState {
        current_time: 10.0,
        paused: true,
        rate: 1.0,
        ..Default::default()
    }));
    let player = PlayerHandle::new(
        Box::new(FakeSurface(state.clone())),
        MediaDescriptor {
            media_id: "m1".into(),
            locator_url: "https://example.com/m1".into(),
            title: "m1".into(),
        },
    );

    let mut config = AgentConfig::new(addr.to_string(), "r1", "ada", "client-a");
    config.heartbeat_period = Duration::from_millis(100);
    let (notice_tx, mut notices) = mpsc::channel(64);
    let (mut agent, cmd_tx) = SyncAgent::new(config, notice_tx);
    tokio::spawn(async move { agent.run().await });

    cmd_tx.send(AgentCommand::AttachPlayer(player)).await?;
    cmd_tx.send(AgentCommand::Connect).await?;
    expect_state(&mut notices, SessionState::Connecting).await?;
    expect_state(&mut notices, SessionState::AwaitingAck).await?;
    expect_state(&mut notices, SessionState::Synced).await?;

    // An observer peer joins to watch the agent's outbound frames.
    let (mut peer, _) = connect_async(format!("ws://{addr}")).await?;
    peer.send(Message::text(encode_frame(&ClientFrame::Join {
        room: "r1".into(),
        client_id: "client-b".into(),
        nickname: "bob".into(),
    })?))
    .await?;

    // The local player starts playing.
    state.lock().expect("lock").paused = false;
    cmd_tx.send(AgentCommand::Player(PlayerEvent::Play)).await?;

    // While playing, the heartbeat timer fires repeatedly.
    let mut heartbeats = 0usize;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(700);
    while tokio::time::Instant::now() < deadline {
        let remaining = deadline - tokio::time::Instant::now();
        let Ok(msg) = timeout(remaining, peer.next()).await else {
            break;
        };
        let msg = msg.ok_or_else(|| anyhow::anyhow!("peer connection closed"))??;
        if let Message::Text(text) = msg
            && let Ok(ServerFrame::Heartbeat(event)) = serde_json::from_str(text.as_str())
        {
            assert_eq!(event.client_id, "client-a");
            assert!(!event.state.paused);
            heartbeats += 1;
        }
    }
    assert!(heartbeats >= 2, "only {heartbeats} heartbeats while playing");

    // The local player pauses; the cadence must stop.
    state.lock().expect("lock").paused = true;
    cmd_tx.send(AgentCommand::Player(PlayerEvent::Pause)).await?;

    // Frames arrive in send order per connection, so once the pause event
    // shows up no earlier heartbeat can still be in flight.
    loop {
        let msg = timeout(Duration::from_secs(2), peer.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("peer connection closed"))??;
        if let Message::Text(text) = msg
            && let Ok(ServerFrame::Event(event)) = serde_json::from_str(text.as_str())
            && event.action == SyncAction::Pause
        {
            break;
        }
    }
    match timeout(Duration::from_millis(400), async {
        loop {
            match peer.next().await {
                Some(Ok(Message::Text(text))) => break text.as_str().to_string(),
                Some(Ok(_)) => continue,
                other => break format!("{other:?}"),
            }
        }
    })
    .await
    {
        Err(_) => {}
        Ok(extra) => anyhow::bail!("frame after pause: {extra}"),
    }

    cmd_tx.send(AgentCommand::Disconnect).await?;
    expect_state(&mut notices, SessionState::Disconnected).await?;
    Ok(())
}

#[tokio::test]
async fn connect_while_connected_is_ignored() -> anyhow::Result<()> {
    let addr = spawn_test_relay().await;

    let config = AgentConfig::new(addr.to_string(), "r1", "ada", "client-a");
    let (notice_tx, mut notices) = mpsc::channel(64);
    let (mut agent, cmd_tx) = SyncAgent::new(config, notice_tx);
    tokio::spawn(async move { agent.run().await });

    cmd_tx.send(AgentCommand::Connect).await?;
    expect_state(&mut notices, SessionState::Connecting).await?;
    expect_state(&mut notices, SessionState::AwaitingAck).await?;
    expect_state(&mut notices, SessionState::Synced).await?;
    let notice = timeout(Duration::from_secs(2), notices.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("notice channel closed"))?;
    assert!(matches!(notice, AgentNotice::Roster(_)));

    // A second connect on a live session is a no-op, not a reconnect.
    cmd_tx.send(AgentCommand::Connect).await?;
    match timeout(Duration::from_millis(300), notices.recv()).await {
        Err(_) => {}
        Ok(notice) => anyhow::bail!("unexpected notice after duplicate connect: {notice:?}"),
    }

    cmd_tx.send(AgentCommand::Disconnect).await?;
    expect_state(&mut notices, SessionState::Disconnected).await?;
    Ok(())
}
