//! Integration tests for the reconnect loop, driven against an in-process
//! mock `ConnectStrategy`. No network I/O, matching this codebase's existing
//! reliance on mock backends over live HTTP calls.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use sse_stream_client::{
    AlwaysContinue, AlwaysThrow, ConnectParams, Connection, ConnectStrategy, Event, Result,
    SseError, StreamClient, StreamConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

enum Script {
    Chunks(Vec<&'static [u8]>),
    Fail(fn() -> SseError),
}

struct MockConnect {
    attempts: AtomicUsize,
    scripts: Vec<Script>,
    last_event_ids: Mutex<Vec<Option<String>>>,
}

impl MockConnect {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            scripts,
            last_event_ids: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConnectStrategy for MockConnect {
    async fn connect(&self, params: &ConnectParams) -> Result<Connection> {
        self.last_event_ids
            .lock()
            .unwrap()
            .push(params.last_event_id.clone());
        let idx = self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(idx) {
            Some(Script::Chunks(chunks)) => {
                let body = futures::stream::iter(
                    chunks
                        .iter()
                        .map(|c| Ok(Bytes::from_static(c)))
                        .collect::<Vec<_>>(),
                )
                .boxed();
                Ok(Connection {
                    body,
                    origin: "http://mock.test/events".to_string(),
                    closer: Box::new(|| {}),
                })
            }
            Some(Script::Fail(f)) => Err(f()),
            None => Err(SseError::HttpErrorStatus { status: 500 }),
        }
    }
}

fn fast_config(connect: std::sync::Arc<MockConnect>) -> StreamConfig {
    StreamConfig::builder("http://mock.test/events")
        .connect_strategy(connect)
        .initial_retry_delay(Duration::from_millis(1))
        .max_retry_delay(Duration::from_millis(4))
        .build()
        .unwrap()
}

#[tokio::test]
async fn single_line_event_end_to_end() {
    let connect = std::sync::Arc::new(MockConnect::new(vec![Script::Chunks(vec![
        b"data: hello\n\n",
    ])]));
    let client = StreamClient::new(fast_config(connect));

    assert!(matches!(client.read_any_event().await.unwrap(), Event::Started));
    let msg = client.read_message().await.unwrap();
    assert_eq!(msg.name, "message");
    assert_eq!(msg.data, "hello");
    assert_eq!(msg.last_event_id, None);
}

#[tokio::test]
async fn comment_then_message_end_to_end() {
    let connect = std::sync::Arc::new(MockConnect::new(vec![Script::Chunks(vec![
        b":ping\ndata: x\n\n",
    ])]));
    let client = StreamClient::new(fast_config(connect));

    client.read_any_event().await.unwrap(); // Started
    let comment = client.read_any_event().await.unwrap();
    assert!(matches!(comment, Event::Comment { text } if text == "ping"));
    let msg = client.read_message().await.unwrap();
    assert_eq!(msg.data, "x");
    assert_eq!(msg.last_event_id, None);
}

#[tokio::test]
async fn retry_directive_then_message_and_capped_backoff() {
    let connect = std::sync::Arc::new(MockConnect::new(vec![
        Script::Chunks(vec![b"retry: 7000\n\n", b"data: hi\n\n"]),
        Script::Fail(|| SseError::ClosedByServer),
    ]));
    let client = StreamClient::new(
        StreamConfig::builder("http://mock.test/events")
            .connect_strategy(connect)
            .max_retry_delay(Duration::from_secs(30))
            .build()
            .unwrap(),
    );

    client.read_any_event().await.unwrap(); // Started
    let retry = client.read_any_event().await.unwrap();
    assert!(matches!(
        retry,
        Event::SetRetryDelay { duration } if duration == Duration::from_secs(7)
    ));
    let msg = client.read_message().await.unwrap();
    assert_eq!(msg.data, "hi");

    // The stream ends after this chunk (iterator exhausted); the next read
    // observes the EOF fault. Nothing in this test asserts the next sleep's
    // exact duration (timing assertions on a live scheduler are flaky) but
    // the retry value has been folded into the backoff base; see
    // `backoff::tests::set_base_delay_changes_subsequent_caps` for that
    // arithmetic in isolation.
    let fault = client.read_any_event().await.unwrap();
    assert!(matches!(fault, Event::Fault { .. }));
}

#[tokio::test]
async fn reconnect_carries_last_event_id_header() {
    let connect = std::sync::Arc::new(MockConnect::new(vec![
        Script::Chunks(vec![b"data: one\nid: id1\n\n"]),
        Script::Chunks(vec![b"data: two\n\n"]),
    ]));
    let client = StreamClient::new(fast_config(connect.clone()));

    client.read_any_event().await.unwrap(); // Started #1
    let msg = client.read_message().await.unwrap();
    assert_eq!(msg.data, "one");

    let fault = client.read_any_event().await.unwrap();
    assert!(matches!(
        fault,
        Event::Fault { error } if matches!(*error, SseError::ClosedByServer)
    ));

    client.read_any_event().await.unwrap(); // Started #2
    let msg2 = client.read_message().await.unwrap();
    assert_eq!(msg2.data, "two");

    let seen_ids = connect.last_event_ids.lock().unwrap().clone();
    assert_eq!(seen_ids, vec![None, Some("id1".to_string())]);
}

#[tokio::test]
async fn http_500_under_always_continue_yields_fault_then_recovers() {
    let connect = std::sync::Arc::new(MockConnect::new(vec![
        Script::Fail(|| SseError::HttpErrorStatus { status: 500 }),
        Script::Chunks(vec![b"data: ok\n\n"]),
    ]));
    let client = StreamClient::new(
        StreamConfig::builder("http://mock.test/events")
            .connect_strategy(connect)
            .error_strategy(std::sync::Arc::new(AlwaysContinue))
            .initial_retry_delay(Duration::from_millis(1))
            .build()
            .unwrap(),
    );

    let fault = client.read_any_event().await.unwrap();
    assert!(matches!(
        fault,
        Event::Fault { error } if matches!(*error, SseError::HttpErrorStatus { status: 500 })
    ));
    assert!(matches!(client.read_any_event().await.unwrap(), Event::Started));
}

#[tokio::test]
async fn http_500_under_always_throw_fails_the_read() {
    let connect = std::sync::Arc::new(MockConnect::new(vec![Script::Fail(|| {
        SseError::HttpErrorStatus { status: 500 }
    })]));
    let client = StreamClient::new(
        StreamConfig::builder("http://mock.test/events")
            .connect_strategy(connect)
            .error_strategy(std::sync::Arc::new(AlwaysThrow))
            .build()
            .unwrap(),
    );

    let err = client.read_any_event().await.unwrap_err();
    assert!(matches!(err, SseError::HttpErrorStatus { status: 500 }));
}

#[tokio::test]
async fn close_is_terminal() {
    let connect = std::sync::Arc::new(MockConnect::new(vec![Script::Chunks(vec![
        b"data: x\n\n",
    ])]));
    let client = StreamClient::new(fast_config(connect));
    client.close();
    let err = client.read_any_event().await.unwrap_err();
    assert!(matches!(err, SseError::ClosedByCaller));
    // Still terminal on a second call.
    let err2 = client.read_any_event().await.unwrap_err();
    assert!(matches!(err2, SseError::ClosedByCaller));
}
