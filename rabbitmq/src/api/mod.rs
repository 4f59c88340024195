//! Thin typed client for the RabbitMQ HTTP management API

pub mod bindings;
pub mod client;
pub mod error;
pub mod exchanges;
pub mod limits;
pub mod queues;
pub mod users;
pub mod vhosts;

pub use client::Client;
pub use error::ApiError;
