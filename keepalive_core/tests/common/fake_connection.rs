//! A deterministic **in-process stand-in** for the Socket.IO transport.
//!
//! *  **From the test's perspective**
//!    * Script how the next connection attempts end with
//!      [`FakeConnector::script`].
//!    * Push server events into connection `n` with
//!      [`FakeConnector::push`].
//!    * Inspect what the manager did through [`FakeConnector::journal`].
//!
//! It lets integration tests drive the real supervisor and manager (tasks,
//! cancellation, status channel) without opening a socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keepalive_core::connections::{
    Connection, ConnectionError, Connector, SessionIdentity, SocketEvent,
};
use serde_json::Value;
use tokio::sync::mpsc;

/// How a scripted `connect()` ends.
pub enum ConnectBehavior {
    Succeed,
    Fail(ConnectionError),
    /// Never returns; exercises the connect timeout.
    Hang,
}

type EventTx = mpsc::UnboundedSender<Result<SocketEvent, ConnectionError>>;

struct Record {
    identity: SessionIdentity,
    events: EventTx,
    disconnects: Arc<AtomicUsize>,
    crash: Arc<AtomicBool>,
}

/// Hands out [`FakeConnection`]s and remembers every one of them.
#[derive(Default)]
pub struct FakeConnector {
    journal: Arc<Mutex<Vec<String>>>,
    records: Mutex<Vec<Record>>,
    script: Mutex<VecDeque<ConnectBehavior>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the outcome of the next unscripted `connect()`. Attempts past
    /// the end of the script succeed.
    pub fn script(&self, behavior: ConnectBehavior) {
        self.script.lock().unwrap().push_back(behavior);
    }

    /// How many connections were created so far.
    pub fn created(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn identity(&self, index: usize) -> SessionIdentity {
        self.records.lock().unwrap()[index].identity.clone()
    }

    pub fn disconnects(&self, index: usize) -> usize {
        self.records.lock().unwrap()[index]
            .disconnects
            .load(Ordering::SeqCst)
    }

    /// Ordered log of `create #n`, `connect #n` and `disconnect #n`.
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Delivers an event to connection `index` as if the server sent it.
    pub fn push(&self, index: usize, event: SocketEvent) {
        let _ = self.records.lock().unwrap()[index].events.send(Ok(event));
    }

    /// Shorthand for a `notify.message` event.
    pub fn push_message(&self, index: usize, payload: Value) {
        self.push(
            index,
            SocketEvent::Event {
                name: "notify.message".into(),
                payload,
            },
        );
    }

    /// Makes the task reading connection `index` panic, leaving the
    /// connection flagged as connected.
    pub fn crash(&self, index: usize) {
        let records = self.records.lock().unwrap();
        records[index].crash.store(true, Ordering::SeqCst);
        let _ = records[index]
            .events
            .send(Ok(SocketEvent::Disconnected("crash".into())));
    }

    /// Makes `next_event` on connection `index` fail with a transport error.
    pub fn push_error(&self, index: usize, error: ConnectionError) {
        let _ = self.records.lock().unwrap()[index].events.send(Err(error));
    }
}

impl Connector for FakeConnector {
    fn create(&self, identity: &SessionIdentity) -> Box<dyn Connection> {
        let (tx, rx) = mpsc::unbounded_channel();
        let disconnects = Arc::new(AtomicUsize::new(0));
        let crash = Arc::new(AtomicBool::new(false));

        let mut records = self.records.lock().unwrap();
        let index = records.len();
        records.push(Record {
            identity: identity.clone(),
            events: tx,
            disconnects: disconnects.clone(),
            crash: crash.clone(),
        });
        self.journal.lock().unwrap().push(format!("create #{index}"));

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectBehavior::Succeed);

        Box::new(FakeConnection {
            index,
            behavior: Some(behavior),
            events: rx,
            disconnects,
            crash,
            journal: self.journal.clone(),
        })
    }
}

pub struct FakeConnection {
    index: usize,
    behavior: Option<ConnectBehavior>,
    events: mpsc::UnboundedReceiver<Result<SocketEvent, ConnectionError>>,
    disconnects: Arc<AtomicUsize>,
    crash: Arc<AtomicBool>,
    journal: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("connect #{}", self.index));
        match self.behavior.take().unwrap_or(ConnectBehavior::Succeed) {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::Fail(e) => Err(e),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.journal
            .lock()
            .unwrap()
            .push(format!("disconnect #{}", self.index));
        Ok(())
    }

    async fn next_event(&mut self) -> Result<SocketEvent, ConnectionError> {
        match self.events.recv().await {
            Some(_) if self.crash.load(Ordering::SeqCst) => {
                panic!("connection {} crashed", self.index)
            }
            Some(event) => event,
            // The connector keeps the sender alive, so this only happens
            // once the test is over.
            None => std::future::pending().await,
        }
    }
}
