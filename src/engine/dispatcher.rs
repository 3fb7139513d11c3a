//! # engine::dispatcher
//!
//! **Dispatcher**: the single writer of the service's shared state.
//!
//! ```text
//!  StreamConnection ──FeedEvent──┐
//!   (ticks, simulator, state)    │     ┌────────────────────────────┐
//!                                ├───▶ │ Dispatcher (one task)      │──▶ broadcast → UI
//!  HTTP handlers ────Command─────┘     │ ├─ baselines + detector    │
//!   (queries, dismiss, seed)           │ ├─ notification factory    │
//!  dismiss timers ───Command───────▶   │ ├─ notification store      │
//!                                      │ └─ price / weather history │
//!                                      └────────────────────────────┘
//! ```
//!
//! Every message is handled to completion before the next one is taken, so
//! the baseline map, the notification list and the id counter are never
//! touched from two places at once.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::detector::{severity_for, PriceChangeDetector};
use crate::engine::notifier::{self, NotificationFactory, NotificationStore};
use crate::error::FeedError;
use crate::events::UiEvent;
use crate::models::{
    ConnectionState, Notification, NotificationKind, PriceAlert, Severity, Tick, WeatherAlert,
};
use crate::store::{BaselineEntry, Baselines};

const FEED_CHANNEL_SIZE: usize = 1024;
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Extra delay after the display timeout, matching the toast fade-out.
const FADE_OUT: Duration = Duration::from_millis(300);

pub const DEFAULT_MAX_ALERT_HISTORY: usize = 500;

// ─── Messages ─────────────────────────────────────────────────────────────────

/// Events produced by the connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Tick(Tick),
    WeatherAlertRaised(WeatherAlert),
    ConnectionStateChanged {
        from: ConnectionState,
        to:   ConnectionState,
    },
}

/// Requests from the HTTP surface and from the dispatcher's own timers.
#[derive(Debug)]
pub enum Command {
    ListNotifications(oneshot::Sender<Vec<Notification>>),
    MarkDisplayed {
        id:    u64,
        reply: oneshot::Sender<bool>,
    },
    Dismiss {
        id:    u64,
        reply: Option<oneshot::Sender<bool>>,
    },
    ClearNotifications(oneshot::Sender<usize>),
    ListPriceAlerts(oneshot::Sender<Vec<PriceAlert>>),
    ListWeatherAlerts(oneshot::Sender<Vec<WeatherAlert>>),
    ClearPriceAlerts(oneshot::Sender<usize>),
    ClearWeatherAlerts(oneshot::Sender<usize>),
    ListBaselines(oneshot::Sender<Vec<BaselineEntry>>),
    SeedBaselines {
        entries: Vec<BaselineEntry>,
        reply:   oneshot::Sender<usize>,
    },
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub threshold_pct: f64,
    /// How long a displayed notification stays before it is auto-dismissed.
    pub display_timeout: Duration,
    /// Notifications kept when no UI dismisses them; the oldest is evicted.
    pub max_notifications: usize,
    /// Entries kept in each alert history.
    pub max_alert_history: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            threshold_pct:     crate::engine::detector::DEFAULT_THRESHOLD_PCT,
            display_timeout:   Duration::from_millis(5_000),
            max_notifications: notifier::DEFAULT_MAX_NOTIFICATIONS,
            max_alert_history: DEFAULT_MAX_ALERT_HISTORY,
        }
    }
}

// ─── History ──────────────────────────────────────────────────────────────────

/// Ring buffer of the most recent alerts.
#[derive(Debug)]
pub struct AlertHistory<T> {
    items:    VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> AlertHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items:    VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

pub struct Dispatcher {
    detector:        PriceChangeDetector,
    baselines:       Baselines,
    factory:         NotificationFactory,
    notifications:   NotificationStore,
    price_alerts:    AlertHistory<PriceAlert>,
    weather_alerts:  AlertHistory<WeatherAlert>,
    broadcast_tx:    broadcast::Sender<String>,
    display_timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, broadcast_tx: broadcast::Sender<String>) -> Self {
        Self {
            detector:        PriceChangeDetector::new(config.threshold_pct),
            baselines:       Baselines::new(),
            factory:         NotificationFactory::new(),
            notifications:   NotificationStore::with_capacity(config.max_notifications),
            price_alerts:    AlertHistory::new(config.max_alert_history),
            weather_alerts:  AlertHistory::new(config.max_alert_history),
            broadcast_tx,
            display_timeout: config.display_timeout,
        }
    }

    /// Move the dispatcher onto its own task.
    ///
    /// Returns the query handle, the sender producers publish [`FeedEvent`]s
    /// on, and the task handle. The task ends once every sender is dropped.
    pub fn spawn(self) -> (DispatcherHandle, mpsc::Sender<FeedEvent>, JoinHandle<()>) {
        let (feed_tx, feed_rx) = mpsc::channel(FEED_CHANNEL_SIZE);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let timers = command_tx.downgrade();

        let task = tokio::spawn(self.run(feed_rx, command_rx, timers));
        (DispatcherHandle { commands: command_tx }, feed_tx, task)
    }

    async fn run(
        mut self,
        mut feed_rx:    mpsc::Receiver<FeedEvent>,
        mut command_rx: mpsc::Receiver<Command>,
        timers:         mpsc::WeakSender<Command>,
    ) {
        info!("📬 Dispatcher started");
        loop {
            tokio::select! {
                // feed first: a query never observes a half-drained feed queue
                biased;

                Some(event) = feed_rx.recv() => {
                    self.handle_feed(event);
                }
                Some(command) = command_rx.recv() => {
                    self.handle_command(command, &timers);
                }
                else => break,
            }
        }
        info!("📬 Dispatcher stopped");
    }

    // ── Feed events ───────────────────────────────────────────────────────────

    /// Apply one producer event. Returns the notification it created, if any.
    pub fn handle_feed(&mut self, event: FeedEvent) -> Option<Notification> {
        match event {
            FeedEvent::Tick(tick) => self.on_tick(&tick),
            FeedEvent::WeatherAlertRaised(alert) => Some(self.on_weather_alert(alert)),
            FeedEvent::ConnectionStateChanged { from, to } => self.on_connection_change(from, to),
        }
    }

    fn on_tick(&mut self, tick: &Tick) -> Option<Notification> {
        let alert = self.detector.observe(&mut self.baselines, &tick.asset_id, tick.price)?;

        let name = self.baselines.display_name(&alert.asset_id);
        info!(
            asset_id       = %alert.asset_id,
            old_price      = alert.old_price,
            new_price      = alert.new_price,
            percent_change = alert.percent_change,
            "💹 Price alert"
        );

        let notification = self.notify(
            NotificationKind::PriceAlert,
            notifier::price_alert_title(&name),
            notifier::price_alert_message(&alert),
            severity_for(&alert),
        );

        self.broadcast(&UiEvent::PriceAlert { alert: Box::new(alert.clone()) });
        self.price_alerts.push(alert);
        Some(notification)
    }

    fn on_weather_alert(&mut self, alert: WeatherAlert) -> Notification {
        info!(city = %alert.city, kind = %alert.kind, "🌦️ Weather alert");

        let notification = self.notify(
            NotificationKind::WeatherAlert,
            notifier::weather_alert_title(&alert),
            alert.message.clone(),
            Severity::Warning,
        );

        self.broadcast(&UiEvent::WeatherAlert { alert: Box::new(alert.clone()) });
        self.weather_alerts.push(alert);
        notification
    }

    fn on_connection_change(
        &mut self,
        from: ConnectionState,
        to:   ConnectionState,
    ) -> Option<Notification> {
        self.broadcast(&UiEvent::ConnectionChanged { state: to });

        let (title, message) = notifier::connectivity_content(from, to)?;
        Some(self.notify(NotificationKind::Connectivity, title, message, Severity::Info))
    }

    fn notify(
        &mut self,
        kind:     NotificationKind,
        title:    impl Into<String>,
        message:  impl Into<String>,
        severity: Severity,
    ) -> Notification {
        let notification = self
            .factory
            .create(&mut self.notifications, kind, title, message, severity);
        debug!(id = notification.id, kind = ?kind, "Notification created");
        for id in self.notifications.take_evicted() {
            debug!(id, "Notification evicted, store full");
            self.broadcast(&UiEvent::NotificationRemoved { id });
        }
        self.broadcast(&UiEvent::NotificationCreated {
            notification: Box::new(notification.clone()),
        });
        notification
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn handle_command(&mut self, command: Command, timers: &mpsc::WeakSender<Command>) {
        // A dropped reply receiver just means the caller went away.
        match command {
            Command::ListNotifications(reply) => {
                let _ = reply.send(self.notifications.list());
            }
            Command::MarkDisplayed { id, reply } => {
                let flipped = self.mark_displayed(id);
                if flipped {
                    self.schedule_dismiss(id, timers);
                }
                let _ = reply.send(flipped);
            }
            Command::Dismiss { id, reply } => {
                let removed = self.dismiss(id);
                if let Some(reply) = reply {
                    let _ = reply.send(removed);
                }
            }
            Command::ClearNotifications(reply) => {
                let _ = reply.send(self.clear_notifications());
            }
            Command::ListPriceAlerts(reply) => {
                let _ = reply.send(self.price_alerts.to_vec());
            }
            Command::ListWeatherAlerts(reply) => {
                let _ = reply.send(self.weather_alerts.to_vec());
            }
            Command::ClearPriceAlerts(reply) => {
                let _ = reply.send(self.price_alerts.clear());
            }
            Command::ClearWeatherAlerts(reply) => {
                let _ = reply.send(self.weather_alerts.clear());
            }
            Command::ListBaselines(reply) => {
                let _ = reply.send(self.baselines.snapshot());
            }
            Command::SeedBaselines { entries, reply } => {
                let accepted = self.baselines.seed(entries);
                info!(accepted, "Baselines seeded");
                let _ = reply.send(accepted);
            }
        }
    }

    pub fn mark_displayed(&mut self, id: u64) -> bool {
        self.notifications.mark_displayed(id)
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let removed = self.notifications.remove(id);
        if removed {
            debug!(id, "Notification dismissed");
            self.broadcast(&UiEvent::NotificationRemoved { id });
        }
        removed
    }

    pub fn clear_notifications(&mut self) -> usize {
        let count = self.notifications.clear();
        self.broadcast(&UiEvent::NotificationsCleared);
        count
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.list()
    }

    pub fn baselines(&self) -> &Baselines {
        &self.baselines
    }

    pub fn baselines_mut(&mut self) -> &mut Baselines {
        &mut self.baselines
    }

    /// Arm the auto-dismiss timer for a notification that was just displayed.
    fn schedule_dismiss(&self, id: u64, timers: &mpsc::WeakSender<Command>) {
        let Some(tx) = timers.upgrade() else {
            return;
        };
        let after = self.display_timeout + FADE_OUT;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Command::Dismiss { id, reply: None }).await;
        });
    }

    fn broadcast(&self, event: &UiEvent) {
        // Err only means there is no UI client listening right now.
        let _ = self.broadcast_tx.send(event.to_json());
    }
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Cloneable query/command side of the dispatcher, used by HTTP handlers.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    commands: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, FeedError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| FeedError::Stopped("dispatcher"))?;
        rx.await.map_err(|_| {
            warn!("Dispatcher dropped a reply");
            FeedError::Stopped("dispatcher")
        })
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, FeedError> {
        self.request(Command::ListNotifications).await
    }

    pub async fn mark_displayed(&self, id: u64) -> Result<bool, FeedError> {
        self.request(|reply| Command::MarkDisplayed { id, reply }).await
    }

    pub async fn dismiss(&self, id: u64) -> Result<bool, FeedError> {
        self.request(|reply| Command::Dismiss { id, reply: Some(reply) }).await
    }

    pub async fn clear_notifications(&self) -> Result<usize, FeedError> {
        self.request(Command::ClearNotifications).await
    }

    pub async fn price_alerts(&self) -> Result<Vec<PriceAlert>, FeedError> {
        self.request(Command::ListPriceAlerts).await
    }

    pub async fn weather_alerts(&self) -> Result<Vec<WeatherAlert>, FeedError> {
        self.request(Command::ListWeatherAlerts).await
    }

    pub async fn clear_price_alerts(&self) -> Result<usize, FeedError> {
        self.request(Command::ClearPriceAlerts).await
    }

    pub async fn clear_weather_alerts(&self) -> Result<usize, FeedError> {
        self.request(Command::ClearWeatherAlerts).await
    }

    pub async fn baselines(&self) -> Result<Vec<BaselineEntry>, FeedError> {
        self.request(Command::ListBaselines).await
    }

    pub async fn seed_baselines(&self, entries: Vec<BaselineEntry>) -> Result<usize, FeedError> {
        self.request(|reply| Command::SeedBaselines { entries, reply }).await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
