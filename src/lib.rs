//! # sse-stream-client
//!
//! A reconnecting Server-Sent Events client: incremental parsing of the
//! WHATWG SSE wire format, exponential backoff with decorrelation jitter,
//! and a pluggable transport and error policy.
//!
//! Two consumption models are offered over the same underlying
//! [`StreamClient`]:
//!
//! - **Pull** — await [`StreamClient::read_any_event`] or
//!   [`StreamClient::read_message`] directly.
//! - **Push** — wrap the client in a [`BackgroundDriver`] and register
//!   [`Handlers`] that run on a dedicated task.
//!
//! ## Quick start (pull API)
//!
//! ```no_run
//! use sse_stream_client::{StreamClient, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StreamConfig::builder("http://localhost:8080/events").build()?;
//!     let client = StreamClient::new(config);
//!
//!     loop {
//!         match client.read_any_event().await? {
//!             sse_stream_client::Event::Message(msg) => println!("{}", msg.data),
//!             sse_stream_client::Event::Fault { error } => eprintln!("fault: {error}"),
//!             _ => {}
//!         }
//!     }
//! }
//! ```
//!
//! ## Quick start (push API)
//!
//! ```no_run
//! use sse_stream_client::{BackgroundDriver, Handlers, StreamClient, StreamConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StreamConfig::builder("http://localhost:8080/events").build()?;
//!     let client = Arc::new(StreamClient::new(config));
//!     let handlers = Handlers::builder()
//!         .on_message(|msg| async move { println!("{}", msg.data) })
//!         .build();
//!     let driver = BackgroundDriver::spawn(client, handlers);
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     driver.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod connect;
pub mod driver;
pub mod error;
pub mod error_strategy;
pub mod events;
pub mod logger;
pub mod parser;

pub use backoff::BackoffPolicy;
pub use client::StreamClient;
pub use config::{StreamConfig, StreamConfigBuilder};
pub use connect::{ConnectParams, ConnectStrategy, Connection, ReqwestConnectStrategy};
pub use driver::{BackgroundDriver, Handlers, HandlersBuilder};
pub use error::{Result, SseError};
pub use error_strategy::{AlwaysContinue, AlwaysThrow, ContinueThenThrow, Disposition, ErrorStrategy};
pub use events::{Event, Message, ReadyState};
pub use logger::{FacadeLogger, Level, Logger, NoopLogger};
pub use parser::EventParser;
