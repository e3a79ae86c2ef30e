//! Coaching AI gateway: meal analysis, plans, chat, grounded search and speech
//! on top of a generative provider. The HTTP API is behind `http-server`.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod server; // HTTP API for the web client
