pub mod detector;
pub mod dispatcher;
pub mod notifier;
pub mod simulator;
