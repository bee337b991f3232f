use crate::core::log_buffer::StreamLogBuffer;
use crate::domain::channel::ChannelSpec;
use crate::domain::model::{SessionEvent, SessionState};
use crate::domain::ports::{InboundFrame, OutboundFrame, StreamLink, StreamTransport};
use crate::utils::error::{ConsoleError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct SessionInner {
    state: SessionState,
    /// Bumped on every start and stop; frames from an older epoch are dropped.
    epoch: u64,
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
    task: Option<JoinHandle<()>>,
    /// Events queued under this lock, in the order the state changed.
    pending: VecDeque<SessionEvent>,
    dispatching: bool,
}

struct SessionShared {
    channel: ChannelSpec,
    buffer: StreamLogBuffer,
    inner: Mutex<SessionInner>,
    handlers: Mutex<Vec<(u64, Handler)>>,
    next_handler_id: AtomicU64,
}

/// Releases the dispatch flag if a handler panics.
struct DispatchGuard<'a> {
    shared: &'a SessionShared,
    finished: bool,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.inner().dispatching = false;
        }
    }
}

impl SessionShared {
    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handlers(&self) -> MutexGuard<'_, Vec<(u64, Handler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers queued events one at a time, in queue order.
    ///
    /// Only one caller drains the queue; others return at once and their
    /// events go out from the active loop. Handlers run without any session
    /// lock held, so they may call back into the session.
    fn dispatch(&self) {
        {
            let mut inner = self.inner();
            if inner.dispatching {
                return;
            }
            inner.dispatching = true;
        }

        let mut guard = DispatchGuard {
            shared: self,
            finished: false,
        };
        loop {
            let event = {
                let mut inner = self.inner();
                match inner.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        inner.dispatching = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            let handlers: Vec<Handler> = self
                .handlers()
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect();
            for handler in handlers {
                handler(&event);
            }
        }
    }

    /// Appends `line` and queues its `Message` in one critical section.
    fn deliver(&self, epoch: u64, line: &str) -> bool {
        let mut inner = self.inner();
        if inner.epoch != epoch || inner.state != SessionState::Streaming {
            return false;
        }
        self.buffer.append(line);
        inner.pending.push_back(SessionEvent::Message(line.to_string()));
        true
    }

    /// The transport went away on its own.
    fn end(&self, epoch: u64, failure: Option<String>) {
        {
            let mut inner = self.inner();
            if inner.epoch != epoch || inner.state == SessionState::Idle {
                return;
            }
            inner.state = SessionState::Idle;
            inner.epoch += 1;
            inner.outbound = None;
            inner.task = None;
            let event = match &failure {
                Some(reason) => SessionEvent::Failed {
                    reason: reason.clone(),
                },
                None => SessionEvent::Disconnected,
            };
            inner.pending.push_back(event);
        }

        match failure {
            Some(reason) => warn!("❌ Stream '{}' failed: {}", self.channel.key, reason),
            None => info!("🔌 Stream '{}' closed by remote", self.channel.key),
        }
        self.dispatch();
    }
}

/// One live stream connection feeding one console buffer.
///
/// `start` needs a tokio runtime; the connection runs on a spawned task.
/// Reconnecting after a failure is left to the caller.
pub struct StreamSession<T: StreamTransport + 'static> {
    transport: Arc<T>,
    shared: Arc<SessionShared>,
}

impl<T: StreamTransport + 'static> StreamSession<T> {
    pub fn new(transport: Arc<T>, channel: ChannelSpec, capacity: usize) -> Self {
        Self {
            transport,
            shared: Arc::new(SessionShared {
                channel,
                buffer: StreamLogBuffer::with_capacity(capacity),
                inner: Mutex::new(SessionInner {
                    state: SessionState::Idle,
                    epoch: 0,
                    outbound: None,
                    task: None,
                    pending: VecDeque::new(),
                    dispatching: false,
                }),
                handlers: Mutex::new(Vec::new()),
                next_handler_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn channel(&self) -> &ChannelSpec {
        &self.shared.channel
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner().state
    }

    pub fn buffer(&self) -> &StreamLogBuffer {
        &self.shared.buffer
    }

    pub fn snapshot(&self) -> String {
        self.shared.buffer.snapshot()
    }

    pub fn clear(&self) {
        self.shared.buffer.clear();
    }

    /// Idle -> Connecting. A new session starts with an empty buffer.
    ///
    /// Outside a tokio runtime this fails with `TransportError` and nothing changes.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| ConsoleError::TransportError {
            message: format!(
                "stream '{}' needs a running tokio runtime: {}",
                self.shared.channel.key, e
            ),
        })?;

        let mut inner = self.shared.inner();
        if inner.state != SessionState::Idle {
            return Err(ConsoleError::SessionAlreadyActive {
                channel: self.shared.channel.key.clone(),
            });
        }

        self.shared.buffer.clear();
        inner.epoch += 1;
        let epoch = inner.epoch;

        let task = runtime.spawn(run_session(
            Arc::clone(&self.transport),
            Arc::clone(&self.shared),
            epoch,
        ));
        inner.task = Some(task);
        inner.state = SessionState::Connecting;

        info!("🔌 Connecting stream '{}'", self.shared.channel.key);
        Ok(())
    }

    /// Back to Idle. Safe to call repeatedly and from inside a handler.
    /// Once this returns no frame of the stopped session reaches the buffer,
    /// and `Disconnected` is queued after every message already delivered.
    pub fn stop(&self) {
        let (outbound, task) = {
            let mut inner = self.shared.inner();
            if inner.state == SessionState::Idle {
                return;
            }
            inner.state = SessionState::Idle;
            inner.epoch += 1;
            inner.pending.push_back(SessionEvent::Disconnected);
            (inner.outbound.take(), inner.task.take())
        };

        if let Some(tx) = outbound {
            if let Some(frame) = self.shared.channel.stop_frame() {
                let _ = tx.send(OutboundFrame::Text(frame));
            }
            let _ = tx.send(OutboundFrame::Close);
        }
        if let Some(task) = task {
            task.abort();
        }

        info!("⏹️ Stopped stream '{}'", self.shared.channel.key);
        self.shared.dispatch();
    }

    /// Appends a delivered message. Ignored unless streaming.
    pub fn on_message(&self, text: &str) -> bool {
        let epoch = self.shared.inner().epoch;
        if !self.shared.deliver(epoch, text) {
            debug!("Dropping message for idle stream '{}'", self.shared.channel.key);
            return false;
        }
        self.shared.dispatch();
        true
    }

    pub fn send(&self, message: &str) -> Result<()> {
        let frame = self.shared.channel.encode_outbound(message)?;
        let inner = self.shared.inner();
        match (&inner.state, &inner.outbound) {
            (SessionState::Streaming, Some(tx)) => {
                tx.send(OutboundFrame::Text(frame))
                    .map_err(|_| ConsoleError::TransportError {
                        message: format!("connection for '{}' is closed", self.shared.channel.key),
                    })
            }
            _ => Err(ConsoleError::SessionNotStreaming {
                channel: self.shared.channel.key.clone(),
            }),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.shared.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.shared.handlers().push((id, Arc::new(handler)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<T: StreamTransport + 'static> Drop for StreamSession<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Registration token returned by [`StreamSession::subscribe`].
#[must_use = "the handler stays registered until `cancel` is called"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    shared: Weak<SessionShared>,
}

impl Subscription {
    /// Removes the handler. Returns false if the session is already gone.
    pub fn cancel(self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut handlers = shared.handlers();
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != self.id);
        handlers.len() != before
    }
}

async fn run_session<T: StreamTransport>(transport: Arc<T>, shared: Arc<SessionShared>, epoch: u64) {
    let channel = &shared.channel;

    let StreamLink {
        outbound,
        mut inbound,
    } = match transport.open(channel).await {
        Ok(link) => link,
        Err(e) => {
            shared.end(epoch, Some(e.to_string()));
            return;
        }
    };

    {
        let mut inner = shared.inner();
        if inner.epoch != epoch || inner.state != SessionState::Connecting {
            debug!("Stream '{}' stopped before it was ready", channel.key);
            let _ = outbound.send(OutboundFrame::Close);
            return;
        }
        if let Some(frame) = channel.start_frame() {
            if outbound.send(OutboundFrame::Text(frame)).is_err() {
                drop(inner);
                shared.end(epoch, Some("connection closed before start signal".to_string()));
                return;
            }
        }
        inner.state = SessionState::Streaming;
        inner.outbound = Some(outbound);
        inner.pending.push_back(SessionEvent::Connected);
    }

    info!("✅ Stream '{}' is live", channel.key);
    shared.dispatch();

    while let Some(frame) = inbound.recv().await {
        match frame {
            InboundFrame::Text(text) => {
                let Some(line) = channel.decode_inbound(&text) else {
                    debug!("Skipping frame on '{}': {}", channel.key, text);
                    continue;
                };
                if !shared.deliver(epoch, &line) {
                    return;
                }
                shared.dispatch();
            }
            InboundFrame::Closed => {
                shared.end(epoch, None);
                return;
            }
            InboundFrame::Failed(reason) => {
                shared.end(epoch, Some(reason));
                return;
            }
        }
    }

    shared.end(epoch, None);
}
