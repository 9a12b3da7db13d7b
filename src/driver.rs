//! Background Driver: converts the pull API into a push API.
//!
//! Drives a [`StreamClient`] on a dedicated `tokio` task and fans events out
//! to typed callbacks, the way [`crate::events::EventHandler`] lets a
//! payload report lifecycle events without its caller polling for them. The
//! driver awaits each callback before reading the next event, so a slow
//! handler applies backpressure; a handler wanting to overlap work detaches
//! its own task.

use crate::client::StreamClient;
use crate::error::SseError;
use crate::events::{Event, Message, ReadyState};
use crate::logger::{log_at, FacadeLogger, Level};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

type OpenHandler = Box<dyn Fn(ReadyState) -> BoxFuture<'static, ()> + Send + Sync>;
type MessageHandler = Box<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;
type CommentHandler = Box<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;
type ErrorHandler = Box<dyn Fn(Arc<SseError>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Typed callbacks invoked by a [`BackgroundDriver`] as it pulls events from
/// its [`StreamClient`]. Every field is optional; an unset handler is simply
/// skipped.
#[derive(Default)]
pub struct Handlers {
    on_open: Option<OpenHandler>,
    on_closed: Option<OpenHandler>,
    on_message: Option<MessageHandler>,
    on_comment: Option<CommentHandler>,
    on_error: Option<ErrorHandler>,
}

impl Handlers {
    /// Start building a handler set.
    pub fn builder() -> HandlersBuilder {
        HandlersBuilder::default()
    }
}

/// Builder for [`Handlers`].
#[derive(Default)]
pub struct HandlersBuilder {
    handlers: Handlers,
}

impl HandlersBuilder {
    /// Called after every transition into `Open`, with the new state.
    pub fn on_open<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ReadyState) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handlers.on_open = Some(Box::new(move |state| Box::pin(f(state))));
        self
    }

    /// Called after every transition into `Closed`, with the new state.
    pub fn on_closed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ReadyState) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handlers.on_closed = Some(Box::new(move |state| Box::pin(f(state))));
        self
    }

    /// Called for every dispatched `Message`.
    pub fn on_message<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handlers.on_message = Some(Box::new(move |msg| Box::pin(f(msg))));
        self
    }

    /// Called for every `Comment`, with the leading colon already stripped.
    pub fn on_comment<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handlers.on_comment = Some(Box::new(move |text| Box::pin(f(text))));
        self
    }

    /// Called for every `Fault`, before the matching `on_closed`.
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<SseError>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handlers.on_error = Some(Box::new(move |err| Box::pin(f(err))));
        self
    }

    /// Finish building.
    pub fn build(self) -> Handlers {
        self.handlers
    }
}

/// Drives a [`StreamClient`] on a dedicated task, invoking [`Handlers`] for
/// each event observed. Terminates when the client reaches `Shutdown`.
pub struct BackgroundDriver {
    client: Arc<StreamClient>,
    task: tokio::task::JoinHandle<()>,
}

impl BackgroundDriver {
    /// Spawn a driver over `client` with the given handlers.
    pub fn spawn(client: Arc<StreamClient>, handlers: Handlers) -> Self {
        let driven = client.clone();
        let task = tokio::spawn(async move { run(driven, handlers).await });
        Self { client, task }
    }

    /// The client being driven.
    pub fn client(&self) -> &Arc<StreamClient> {
        &self.client
    }

    /// Shut down the client and wait for the driver task to exit.
    pub async fn shutdown(self) {
        self.client.close();
        let _ = self.task.await;
    }
}

async fn run(client: Arc<StreamClient>, handlers: Handlers) {
    loop {
        let event = match client.read_any_event().await {
            Ok(event) => event,
            Err(SseError::ClosedByCaller) => break,
            Err(err) => {
                invoke_error(&handlers, Arc::new(err)).await;
                client.close();
                invoke_open_closed(&handlers, false, ReadyState::Shutdown).await;
                break;
            }
        };

        match event {
            Event::Started => invoke_open_closed(&handlers, true, ReadyState::Open).await,
            Event::Message(message) => {
                if let Some(handler) = &handlers.on_message {
                    call_guarded(&handlers, handler(message)).await;
                }
            }
            Event::Comment { text } => {
                if let Some(handler) = &handlers.on_comment {
                    call_guarded(&handlers, handler(text)).await;
                }
            }
            Event::SetRetryDelay { .. } => {}
            Event::Fault { error } => {
                invoke_error(&handlers, error).await;
                invoke_open_closed(&handlers, false, ReadyState::Closed).await;
            }
        }
    }
}

async fn invoke_open_closed(handlers: &Handlers, opened: bool, state: ReadyState) {
    let handler = if opened { &handlers.on_open } else { &handlers.on_closed };
    if let Some(handler) = handler {
        call_guarded(handlers, handler(state)).await;
    }
}

async fn invoke_error(handlers: &Handlers, error: Arc<SseError>) {
    if let Some(handler) = &handlers.on_error {
        // A throwing on_error is caught and logged only, to prevent
        // recursion back into on_error.
        if AssertUnwindSafe(handler(error)).catch_unwind().await.is_err() {
            log_at!(FacadeLogger, Level::Error, "on_error handler panicked");
        }
    }
}

/// Runs a callback future, catching a panic and forwarding it to `on_error`
/// instead of propagating it and killing the driver task.
async fn call_guarded(handlers: &Handlers, fut: BoxFuture<'static, ()>) {
    if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
        log_at!(FacadeLogger, Level::Error, "event handler panicked");
        let err = SseError::Other("event handler panicked".to_string());
        invoke_error(handlers, Arc::new(err)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::connect::{ConnectParams, Connection, ConnectStrategy};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct OneShot(&'static [u8]);

    #[async_trait]
    impl ConnectStrategy for OneShot {
        async fn connect(&self, _params: &ConnectParams) -> crate::error::Result<Connection> {
            let body = futures::stream::iter(vec![Ok(Bytes::from_static(self.0))]).boxed();
            Ok(Connection {
                body,
                origin: "http://example.test".to_string(),
                closer: Box::new(|| {}),
            })
        }
    }

    #[tokio::test]
    async fn driver_delivers_open_and_message_then_shuts_down() {
        let connect = Arc::new(OneShot(b"data: hi\n\n"));
        let config = StreamConfig::builder("http://example.test")
            .connect_strategy(connect)
            .initial_retry_delay(Duration::from_millis(1))
            .build()
            .unwrap();
        let client = Arc::new(StreamClient::new(config));

        let opened = Arc::new(AtomicUsize::new(0));
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let opened_clone = opened.clone();
        let messages_clone = messages.clone();
        let handlers = Handlers::builder()
            .on_open(move |_state| {
                let opened = opened_clone.clone();
                async move {
                    opened.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_message(move |msg| {
                let messages = messages_clone.clone();
                async move {
                    messages.lock().unwrap().push(msg.data);
                }
            })
            .build();

        let driver = BackgroundDriver::spawn(client.clone(), handlers);

        // Give the background task a chance to deliver the one message.
        for _ in 0..50 {
            if !messages.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(messages.lock().unwrap().as_slice(), ["hi".to_string()]);

        driver.shutdown().await;
    }
}
