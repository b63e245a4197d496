//! Business facades over the authenticated retry engine.
//!
//! Provides:
//! - `SignalService` - Signal CRUD, subscriptions and paginated listings,
//!   as the bot or on behalf of a user

pub mod model;
pub mod signal;

pub use model::{
    BaseSignal, ChannelSubscriber, ChannelSubscriptionError, ChannelSubscriptionResponse, Signal,
};
pub use signal::SignalService;
