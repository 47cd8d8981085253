//! Outbound notification content and delivery.

pub mod dispatcher;
pub mod render;

pub use dispatcher::{Dispatcher, LogDispatcher, WebhookDispatcher};
pub use render::{enrich, render, Notification, ReportableItem};
