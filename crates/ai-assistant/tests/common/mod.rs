//! Shared helpers for the integration tests
//!
//! A test host with the assistant registered, a config entry builder,
//! scripted clients and a one-shot chat-completion server.

#![allow(dead_code)]

mod mock_client;
mod mock_config_entry;
mod mock_server;
mod test_hass;

pub use mock_client::*;
pub use mock_config_entry::*;
pub use mock_server::*;
pub use test_hass::*;
