//! Domain models shared across the whole tickwatch service.

pub mod alert;
pub mod connection;
pub mod notification;
pub mod tick;

pub use alert::{PriceAlert, WeatherAlert, WeatherKind};
pub use connection::ConnectionState;
pub use notification::{Notification, NotificationKind, Severity};
pub use tick::Tick;
