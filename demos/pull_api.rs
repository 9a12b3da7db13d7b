//! Connects to an SSE endpoint and prints every message using the pull API.
//!
//! ```text
//! cargo run --example pull_api -- http://localhost:8080/events
//! ```

use sse_stream_client::{Event, StreamClient, StreamConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/events".to_string());

    let config = StreamConfig::builder(uri)
        .read_timeout(Duration::from_secs(45))
        .response_start_timeout(Duration::from_secs(10))
        .build()?;
    let client = StreamClient::new(config);

    loop {
        match client.read_any_event().await {
            Ok(Event::Started) => println!("[connected]"),
            Ok(Event::Message(msg)) => println!("{}: {}", msg.name, msg.data),
            Ok(Event::Comment { text }) => println!("[comment] {text}"),
            Ok(Event::SetRetryDelay { duration }) => {
                println!("[server requested retry delay {duration:?}]")
            }
            Ok(Event::Fault { error }) => eprintln!("[fault] {error}"),
            Err(error) => {
                eprintln!("[closed] {error}");
                break;
            }
        }
    }

    Ok(())
}
