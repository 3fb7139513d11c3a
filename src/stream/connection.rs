//! # stream::connection
//!
//! **StreamConnection**: owns the feed session and the state machine.
//!
//! ## One task, one loop
//! ```text
//! select! { biased;
//!   command          (Connect / Disconnect from the handle, acked)
//!   reconnect timer  ── at most one, Option slot
//!   simulator timer  ── at most one, Option slot, redrawn after each firing
//!   session event    (Opened / Frame / Closed / Error)
//! }
//! ```
//!
//! Because every timer lives in a slot owned by this loop, dropping the slot
//! is the cancellation. `disconnect()` resolves only after the loop has
//! cleared the slots and dropped the session, so from that point on nothing
//! that was scheduled or received earlier can publish.

use std::collections::HashMap;
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

use crate::engine::dispatcher::FeedEvent;
use crate::engine::simulator::AlertSimulator;
use crate::error::FeedError;
use crate::models::{ConnectionState, Tick};
use crate::store::CityDirectory;
use crate::stream::feed::{decode_frame, AssetIdMapper};
use crate::stream::transport::{Transport, TransportEvent, TransportSession};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5_000);

const COMMAND_CHANNEL_SIZE: usize = 16;

type Timer = Option<Pin<Box<Sleep>>>;

// ─── Reconnect policy ─────────────────────────────────────────────────────────

/// Delay before the next connect attempt.
///
/// With `max == base` (the default) every attempt waits the same fixed delay
/// and retries never stop. With `max > base` the delay doubles per failed
/// attempt up to `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max:  Duration,
}

impl ReconnectPolicy {
    pub fn constant(delay: Duration) -> Self {
        Self { base: delay, max: delay }
    }

    /// `attempt` counts connect attempts since the last successful open (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.max <= self.base {
            return self.base;
        }
        let exponent = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1_u32 << exponent).min(self.max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::constant(DEFAULT_RECONNECT_DELAY)
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Base endpoint, e.g. `wss://ws.coincap.io/prices`.
    pub feed_url:  String,
    /// Tracked asset ids, sent as the `assets` query parameter.
    pub assets:    Vec<String>,
    /// Feed id → internal id overrides.
    pub aliases:   HashMap<String, String>,
    pub reconnect: ReconnectPolicy,
}

impl StreamConfig {
    /// `wss://host/prices?assets=bitcoin,ethereum,ripple`
    pub fn endpoint(&self) -> String {
        let separator = if self.feed_url.contains('?') { '&' } else { '?' };
        format!("{}{}assets={}", self.feed_url, separator, self.assets.join(","))
    }
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Each command carries an ack sent once the loop has fully applied it.
#[derive(Debug)]
enum Command {
    Connect(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
}

/// Caller-owned control surface of the connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<Command>,
    state:    watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Returns once the attempt has started (`Connecting`), or immediately
    /// if the connection is already active.
    pub async fn connect(&self) -> Result<(), FeedError> {
        self.send(Command::Connect).await
    }

    /// Idempotent; safe to call in any state. Returns once the state is
    /// `Idle` and the session and every pending timer have been dropped.
    pub async fn disconnect(&self) -> Result<(), FeedError> {
        self.send(Command::Disconnect).await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    async fn send(&self, build: impl FnOnce(oneshot::Sender<()>) -> Command) -> Result<(), FeedError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(build(ack_tx))
            .await
            .map_err(|_| FeedError::Stopped("connection"))?;
        ack_rx.await.map_err(|_| FeedError::Stopped("connection"))
    }
}

// ─── StreamConnection ─────────────────────────────────────────────────────────

pub struct StreamConnection<T: Transport> {
    config:          StreamConfig,
    transport:       T,
    mapper:          AssetIdMapper,
    simulator:       AlertSimulator,
    cities:          CityDirectory,
    feed_tx:         mpsc::Sender<FeedEvent>,
    state_tx:        watch::Sender<ConnectionState>,
    session:         Option<TransportSession>,
    reconnect_timer: Timer,
    simulator_timer: Timer,
    /// Connect attempts since the last successful open.
    attempts:        u32,
}

impl<T: Transport> StreamConnection<T> {
    pub fn new(
        config:    StreamConfig,
        transport: T,
        simulator: AlertSimulator,
        cities:    CityDirectory,
        feed_tx:   mpsc::Sender<FeedEvent>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let mapper = AssetIdMapper::new(config.aliases.clone());

        Self {
            config,
            transport,
            mapper,
            simulator,
            cities,
            feed_tx,
            state_tx,
            session:         None,
            reconnect_timer: None,
            simulator_timer: None,
            attempts:        0,
        }
    }

    /// Move the connection onto its own task. It starts `Idle`; nothing is
    /// opened until [`ConnectionHandle::connect`] is called. The task ends
    /// (after a disconnect) once every handle is dropped.
    pub fn spawn(self) -> (ConnectionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let handle = ConnectionHandle {
            commands: command_tx,
            state:    self.state_tx.subscribe(),
        };
        let task = tokio::spawn(self.run(command_rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                // commands first: a disconnect wins over anything ready alongside it
                biased;

                command = commands.recv() => match command {
                    Some(Command::Connect(ack)) => {
                        self.connect().await;
                        let _ = ack.send(());
                    }
                    Some(Command::Disconnect(ack)) => {
                        self.disconnect().await;
                        let _ = ack.send(());
                    }
                    None => {
                        self.disconnect().await;
                        break;
                    }
                },

                _ = expire(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    info!(attempt = self.attempts + 1, "🔁 Reconnecting to price feed");
                    self.open_session().await;
                }

                _ = expire(&mut self.simulator_timer) => {
                    self.simulator_timer = None;
                    self.fire_simulator().await;
                }

                event = next_event(&mut self.session) => {
                    self.on_transport_event(event).await;
                }
            }
        }
        debug!("Connection task finished");
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    async fn connect(&mut self) {
        let state = self.state();
        if state.is_active() {
            debug!(%state, "connect() ignored while active");
            return;
        }
        if self.reconnect_timer.take().is_some() {
            debug!("Pending reconnect replaced by explicit connect()");
        }
        self.attempts = 0;
        self.open_session().await;
    }

    async fn disconnect(&mut self) {
        self.reconnect_timer = None;
        self.stop_simulator();
        if let Some(session) = self.session.take() {
            info!(session_id = %session.id(), "Closing price feed");
            session.close();
        }
        self.attempts = 0;
        self.set_state(ConnectionState::Idle).await;
    }

    // ── Transport ─────────────────────────────────────────────────────────────

    async fn open_session(&mut self) {
        if let Some(stale) = self.session.take() {
            stale.close();
        }

        let url = self.config.endpoint();
        self.attempts = self.attempts.saturating_add(1);
        let session = self.transport.open(&url);
        info!(session_id = %session.id(), %url, attempt = self.attempts, "Connecting to price feed");

        self.session = Some(session);
        self.set_state(ConnectionState::Connecting).await;
    }

    async fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Opened) => self.on_open().await,
            Some(TransportEvent::Frame(text)) => self.on_frame(&text).await,
            Some(TransportEvent::Closed { reason }) => {
                info!(reason = reason.as_deref().unwrap_or("-"), "Price feed closed");
                self.on_close().await;
            }
            Some(TransportEvent::Error(error)) => {
                warn!(%error, "Price feed error");
                self.on_close().await;
            }
            None => {
                warn!("Price feed session ended without a close event");
                self.on_close().await;
            }
        }
    }

    async fn on_open(&mut self) {
        if self.state() != ConnectionState::Connecting {
            debug!(state = %self.state(), "Ignoring open outside Connecting");
            return;
        }
        self.reconnect_timer = None;
        self.attempts = 0;
        self.set_state(ConnectionState::Open).await;
        self.start_simulator();
    }

    async fn on_frame(&mut self, text: &str) {
        if self.state() != ConnectionState::Open {
            debug!("Ignoring frame received outside Open");
            return;
        }

        let entries = match decode_frame(text) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Dropping malformed feed frame");
                return;
            }
        };

        for (feed_id, price) in entries {
            let asset_id = self.mapper.normalize(&feed_id);
            self.publish(FeedEvent::Tick(Tick::new(asset_id, price))).await;
        }
    }

    async fn on_close(&mut self) {
        if !self.state().is_active() {
            debug!(state = %self.state(), "Close already handled, no second reconnect");
            return;
        }

        self.stop_simulator();
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.set_state(ConnectionState::Closed).await;

        let delay = self.config.reconnect.delay_for(self.attempts);
        info!(delay_ms = delay.as_millis() as u64, "⏳ Reconnect scheduled");
        self.reconnect_timer = Some(Box::pin(sleep(delay)));
    }

    // ── Simulator ─────────────────────────────────────────────────────────────

    fn start_simulator(&mut self) {
        self.stop_simulator();
        self.simulator_timer = Some(Box::pin(sleep(self.simulator.next_delay())));
    }

    fn stop_simulator(&mut self) {
        self.simulator_timer = None;
    }

    async fn fire_simulator(&mut self) {
        let cities = self.cities.list_known_cities().await;
        match self.simulator.fire(&cities) {
            Some(alert) => self.publish(FeedEvent::WeatherAlertRaised(alert)).await,
            None => debug!("No known cities, weather alert skipped"),
        }
        self.simulator_timer = Some(Box::pin(sleep(self.simulator.next_delay())));
    }

    // ── Output ────────────────────────────────────────────────────────────────

    async fn set_state(&mut self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        if previous == next {
            return;
        }
        info!(from = %previous, to = %next, "Connection state changed");
        self.publish(FeedEvent::ConnectionStateChanged { from: previous, to: next }).await;
    }

    async fn publish(&mut self, event: FeedEvent) {
        if self.feed_tx.send(event).await.is_err() {
            warn!("Dispatcher is gone, feed event dropped");
        }
    }
}

async fn next_event(session: &mut Option<TransportSession>) -> Option<TransportEvent> {
    match session {
        Some(session) => session.next_event().await,
        None => pending().await,
    }
}

async fn expire(timer: &mut Timer) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulator::SimulatorConfig;
    use crate::stream::transport::testing::ScriptedTransport;
    use crate::stream::transport::WsTransport;

    const SIM_DELAY: Duration = Duration::from_millis(1_000);

    struct Harness {
        handle:    ConnectionHandle,
        transport: ScriptedTransport,
        cities:    CityDirectory,
        feed_rx:   mpsc::Receiver<FeedEvent>,
    }

    impl Harness {
        fn new(cities: &[&str]) -> Self {
            let transport = ScriptedTransport::default();
            let cities = CityDirectory::new(cities.iter().map(|c| c.to_string()).collect());
            let (feed_tx, feed_rx) = mpsc::channel(256);

            let config = StreamConfig {
                feed_url:  "wss://feed.test/prices".into(),
                assets:    vec!["bitcoin".into(), "bitcoin-cash".into(), "ethereum".into()],
                aliases:   HashMap::new(),
                reconnect: ReconnectPolicy::default(),
            };
            // [1000, 1001) ms → always exactly one second
            let simulator = AlertSimulator::with_seed(
                SimulatorConfig { min_delay: SIM_DELAY, max_delay: SIM_DELAY + Duration::from_millis(1) },
                11,
            );
            let connection =
                StreamConnection::new(config, transport.clone(), simulator, cities.clone(), feed_tx);
            let (handle, _task) = connection.spawn();

            Self { handle, transport, cities, feed_rx }
        }

        async fn open(&mut self) {
            self.handle.connect().await.unwrap();
            settle().await;
            assert!(self.transport.emit(TransportEvent::Opened).await);
            settle().await;
            assert_eq!(self.handle.state(), ConnectionState::Open);
        }

        fn drain(&mut self) -> Vec<FeedEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.feed_rx.try_recv() {
                out.push(event);
            }
            out
        }

        fn drain_weather(&mut self) -> Vec<String> {
            self.drain()
                .into_iter()
                .filter_map(|e| match e {
                    FeedEvent::WeatherAlertRaised(alert) => Some(alert.city),
                    _ => None,
                })
                .collect()
        }
    }

    /// Let every spawned task run until it blocks, without moving the clock.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        settle().await;
    }

    #[test]
    fn test_reconnect_policy() {
        let constant = ReconnectPolicy::default();
        assert!((1..50).all(|n| constant.delay_for(n) == DEFAULT_RECONNECT_DELAY));

        let capped = ReconnectPolicy { base: Duration::from_secs(5), max: Duration::from_secs(60) };
        let delays: Vec<u64> = (1..=6).map(|n| capped.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
        assert_eq!(capped.delay_for(u32::MAX).as_secs(), 60);
    }

    #[test]
    fn test_endpoint_carries_tracked_assets() {
        let config = StreamConfig {
            feed_url:  "wss://ws.coincap.io/prices".into(),
            assets:    vec!["bitcoin".into(), "ethereum".into(), "ripple".into()],
            aliases:   HashMap::new(),
            reconnect: ReconnectPolicy::default(),
        };
        assert_eq!(config.endpoint(), "wss://ws.coincap.io/prices?assets=bitcoin,ethereum,ripple");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_and_open() {
        let mut h = Harness::new(&[]);
        assert_eq!(h.handle.state(), ConnectionState::Idle);

        h.open().await;
        assert_eq!(h.transport.opens(), 1);
        assert_eq!(
            h.transport.last_url().as_deref(),
            Some("wss://feed.test/prices?assets=bitcoin,bitcoin-cash,ethereum")
        );
        assert_eq!(
            h.drain(),
            vec![
                FeedEvent::ConnectionStateChanged { from: ConnectionState::Idle, to: ConnectionState::Connecting },
                FeedEvent::ConnectionStateChanged { from: ConnectionState::Connecting, to: ConnectionState::Open },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_when_active() {
        let mut h = Harness::new(&[]);
        h.handle.connect().await.unwrap();
        h.handle.connect().await.unwrap();
        settle().await;
        assert_eq!(h.transport.opens(), 1);
        assert_eq!(h.handle.state(), ConnectionState::Connecting);

        h.transport.emit(TransportEvent::Opened).await;
        settle().await;
        h.handle.connect().await.unwrap();
        settle().await;
        assert_eq!(h.transport.opens(), 1);
        assert_eq!(h.handle.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_become_ordered_ticks() {
        let mut h = Harness::new(&[]);
        h.open().await;
        h.drain();

        h.transport
            .emit(TransportEvent::Frame(r#"{"ethereum":"2000","bitcoin-cash":"300.5","bitcoin":"50300"}"#.into()))
            .await;
        settle().await;

        let ticks: Vec<(String, f64)> = h
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                FeedEvent::Tick(t) => Some((t.asset_id, t.price)),
                _ => None,
            })
            .collect();
        assert_eq!(
            ticks,
            vec![
                ("ethereum".to_string(), 2_000.0),
                ("bitcoincash".to_string(), 300.5),
                ("bitcoin".to_string(), 50_300.0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_keeps_connection_open() {
        let mut h = Harness::new(&[]);
        h.open().await;
        h.drain();

        h.transport.emit(TransportEvent::Frame("{not json".into())).await;
        h.transport.emit(TransportEvent::Frame(r#"{"bitcoin":"oops"}"#.into())).await;
        h.transport.emit(TransportEvent::Frame(r#"{"bitcoin":"1.5"}"#.into())).await;
        settle().await;

        assert_eq!(h.handle.state(), ConnectionState::Open);
        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], FeedEvent::Tick(t) if t.asset_id == "bitcoin" && t.price == 1.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_exactly_one_reconnect() {
        let mut h = Harness::new(&[]);
        h.open().await;

        h.transport.emit(TransportEvent::Closed { reason: None }).await;
        h.transport.emit(TransportEvent::Closed { reason: None }).await;
        h.transport.emit(TransportEvent::Error("reset".into())).await;
        settle().await;
        assert_eq!(h.handle.state(), ConnectionState::Closed);

        advance(4_999).await;
        assert_eq!(h.transport.opens(), 1);

        advance(2).await;
        assert_eq!(h.transport.opens(), 2);
        assert_eq!(h.handle.state(), ConnectionState::Connecting);

        // the new session stays silent: no further attempts pile up
        advance(60_000).await;
        assert_eq!(h.transport.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempts_retry_without_limit() {
        let h = Harness::new(&[]);
        h.handle.connect().await.unwrap();
        settle().await;

        for attempt in 1..=5 {
            assert_eq!(h.transport.opens(), attempt);
            h.transport.emit(TransportEvent::Error("refused".into())).await;
            settle().await;
            assert_eq!(h.handle.state(), ConnectionState::Closed);
            advance(5_000).await;
        }
        assert_eq!(h.transport.opens(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_connect_from_closed_replaces_pending_reconnect() {
        let h = Harness::new(&[]);
        h.handle.connect().await.unwrap();
        settle().await;
        h.transport.emit(TransportEvent::Error("refused".into())).await;
        settle().await;

        h.handle.connect().await.unwrap();
        settle().await;
        assert_eq!(h.transport.opens(), 2);

        advance(10_000).await;
        assert_eq!(h.transport.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let mut h = Harness::new(&["Tokyo"]);
        h.open().await;
        h.transport.emit(TransportEvent::Closed { reason: None }).await;
        settle().await;

        h.handle.disconnect().await.unwrap();
        h.handle.disconnect().await.unwrap();
        settle().await;
        assert_eq!(h.handle.state(), ConnectionState::Idle);
        h.drain();

        advance(120_000).await;
        assert_eq!(h.transport.opens(), 1);
        assert!(h.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_open_silences_everything() {
        let mut h = Harness::new(&["Tokyo"]);
        h.open().await;

        h.handle.disconnect().await.unwrap();
        settle().await;
        h.drain();

        // the old session is gone, so late frames cannot reach the dispatcher
        assert!(!h.transport.emit(TransportEvent::Frame(r#"{"bitcoin":"1"}"#.into())).await);

        advance(120_000).await;
        assert!(h.drain().is_empty());
        assert_eq!(h.transport.opens(), 1);

        // explicit connect() works again afterwards
        h.handle.connect().await.unwrap();
        settle().await;
        assert_eq!(h.transport.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_returns_only_after_teardown() {
        let mut h = Harness::new(&["Tokyo"]);

        for _ in 0..8 {
            h.open().await;
            h.drain();

            h.transport.emit(TransportEvent::Frame(r#"{"bitcoin":"1"}"#.into())).await;
            h.handle.disconnect().await.unwrap();
            assert_eq!(h.handle.state(), ConnectionState::Idle);

            // everything published so far ends with the Idle transition
            let before = h.drain();
            assert!(matches!(
                before.last(),
                Some(FeedEvent::ConnectionStateChanged { to: ConnectionState::Idle, .. })
            ));

            settle().await;
            advance(10_000).await;
            assert!(h.drain().is_empty());
        }
    }

    #[test]
    fn test_connection_task_is_send() {
        fn assert_send<F: Send>(_: &F) {}

        let (feed_tx, _feed_rx) = mpsc::channel(1);
        let (_command_tx, command_rx) = mpsc::channel(1);
        let config = StreamConfig {
            feed_url:  "wss://feed.test/prices".into(),
            assets:    vec!["bitcoin".into()],
            aliases:   HashMap::new(),
            reconnect: ReconnectPolicy::default(),
        };
        let connection = StreamConnection::new(
            config,
            WsTransport,
            AlertSimulator::new(SimulatorConfig::default()),
            CityDirectory::default(),
            feed_tx,
        );
        assert_send(&connection.run(command_rx));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulator_fires_and_reschedules_once() {
        let mut h = Harness::new(&["Tokyo"]);
        h.open().await;
        h.drain();

        advance(999).await;
        assert!(h.drain_weather().is_empty());

        advance(1).await;
        assert_eq!(h.drain_weather(), vec!["Tokyo".to_string()]);

        advance(1_000).await;
        assert_eq!(h.drain_weather(), vec!["Tokyo".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulator_skips_without_cities_but_keeps_ticking() {
        let mut h = Harness::new(&[]);
        h.open().await;

        advance(3_000).await;
        assert!(h.drain_weather().is_empty());

        h.cities.replace(vec!["Oslo".into()]).await;
        advance(1_000).await;
        assert_eq!(h.drain_weather(), vec!["Oslo".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_simulator() {
        let mut h = Harness::new(&["Tokyo"]);
        h.open().await;
        h.transport.emit(TransportEvent::Closed { reason: Some("bye".into()) }).await;
        settle().await;

        advance(4_000).await;
        assert!(h.drain_weather().is_empty());
    }
}
