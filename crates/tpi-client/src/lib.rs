//! Turing Pi BMC Client Library
//!
//! Provides a typed HTTP client for the board-management controller's
//! control API. The BMC speaks a small query-string protocol against a
//! single endpoint: `opt=get|set` selects the direction, `type=` the
//! subsystem, and every response is a JSON `{"response": [..]}` envelope.
//!
//! Each call is one independent request/response round trip; the client
//! holds no state beyond the endpoint URL and the connection pool, so it
//! can be cloned and called concurrently.
//!
//! # Example
//!
//! ```rust,no_run
//! use tpi_client::{Node, NodePower, OnOff, TpiClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = TpiClient::new("http://turingpi.local/api/bmc")?;
//!
//!     // Read the power flags of all four slots
//!     let power = client.power().await?.into_single()?;
//!     println!("node 1 is {}", power.node1);
//!
//!     // Power on slot 2 only
//!     let wanted = NodePower::all_off().with_node(Node::Node2, OnOff::On);
//!     client.set_power(wanted).await?;
//!
//!     // Route the USB bus to slot 3
//!     client.set_usb(OnOff::On, Node::Node3).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process mock of the BMC firmware:
//!
//! ```rust,ignore
//! use tpi_client::testing::{MockBmc, TestServer};
//!
//! let bmc = MockBmc::new();
//! let server = TestServer::start(bmc.router()).await?;
//! let power = server.client.power().await?;
//! ```

mod client;
mod error;
mod query;
pub mod testing;
mod types;

pub use client::{RequestOptions, TpiClient};
pub use error::{Result, TpiClientError};
pub use query::{GetRequest, Resource, SetRequest};
pub use types::*;
