//! Notigate — one-time invite binding and rate-limited broadcast for
//! messaging platforms.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod invite;
pub mod poller;
pub mod transport;

pub use error::{Error, Result};
pub use gateway::Gateway;
pub use invite::{Binding, InviteRegistry};
