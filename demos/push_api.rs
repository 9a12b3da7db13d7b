//! Same endpoint as `pull_api`, but driven through the push API: handlers
//! run on a background task while this one just waits for Ctrl-C.
//!
//! ```text
//! cargo run --example push_api -- http://localhost:8080/events
//! ```

use sse_stream_client::{BackgroundDriver, Handlers, StreamClient, StreamConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/events".to_string());

    let config = StreamConfig::builder(uri).build()?;
    let client = Arc::new(StreamClient::new(config));

    let handlers = Handlers::builder()
        .on_open(|state| async move { println!("[open] {state:?}") })
        .on_message(|msg| async move { println!("{}: {}", msg.name, msg.data) })
        .on_comment(|text| async move { println!("[comment] {text}") })
        .on_error(|err| async move { eprintln!("[fault] {err}") })
        .on_closed(|state| async move { println!("[closed] {state:?}") })
        .build();

    let driver = BackgroundDriver::spawn(client, handlers);

    tokio::signal::ctrl_c().await?;
    driver.shutdown().await;
    Ok(())
}
