//! In-process doubles of the remote agent
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde_json::{self, json, Value};
use rst_common::with_tokio::tokio::{
    self,
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

use prople_coproto_core::coprotocol::{Delivered, Event};
use prople_coproto_core::messaging::decorators::ThreadDecorator;
use prople_coproto_core::messaging::Message;

use crate::channel::{ChannelError, Frame, Link, MemoryListener, Packer, PROTECTED_FIELD};
use crate::rpc::{
    CallValue, RouterApi, RoutingBatch, RpcError, CONTEXT_TYPE, CONTROL_ADDRESS, EVENT_TYPE,
    FIELD_PROMISE, FUTURE_REPLY, PROXY_DECORATOR, PROXY_REVERSE, PROXY_SUB_PROTOCOL,
};

/// Seals envelopes by base64 encoding them
pub struct EncodingPacker;

#[async_trait]
impl Packer for EncodingPacker {
    async fn pack(&self, message: Value) -> Result<Value, ChannelError> {
        let raw = serde_json::to_vec(&message).map_err(|err| ChannelError::Codec(err.to_string()))?;
        Ok(json!({ PROTECTED_FIELD: STANDARD.encode(raw) }))
    }

    async fn unpack(&self, envelope: Value) -> Result<Value, ChannelError> {
        let sealed = envelope
            .get(PROTECTED_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Crypto("not a sealed envelope".to_string()))?;

        let raw = STANDARD
            .decode(sealed)
            .map_err(|err| ChannelError::Crypto(err.to_string()))?;
        serde_json::from_slice(&raw).map_err(|err| ChannelError::Codec(err.to_string()))
    }
}

fn future(thid: &str) -> Message {
    let mut reply = Message::new(FUTURE_REPLY);
    reply.set_thread(&ThreadDecorator::with_thid(thid));
    reply
}

pub fn value_reply(thid: &str, value: &CallValue) -> Message {
    let mut reply = future(thid);
    if let Value::Object(fields) = value.to_reply_fields() {
        for (key, field) in fields {
            reply.set(key, field);
        }
    }

    reply
}

pub fn exception_reply(thid: &str, class_name: &str, code: Option<i64>) -> Message {
    let mut reply = future(thid);
    reply.set(
        "exception",
        json!({"class_name": class_name, "printable": "remote failure", "code": code}),
    );
    reply
}

pub fn event_envelope(message: &Message, sender: Option<&str>, recipient: Option<&str>) -> Message {
    let mut envelope = Message::new(EVENT_TYPE);
    envelope.set("message", message.to_value());
    envelope.set("sender_verkey", json!(sender));
    envelope.set("recipient_verkey", json!(recipient));
    envelope
}

/// What the simulated agent does with the next request
pub enum Action {
    Reply(CallValue),
    Raise {
        class_name: String,
        code: Option<i64>,
    },
    /// Pushes the envelope on the sub-protocol tunnel, then replies with null
    Event(Message),
    Silence,
    Disconnect,
}

#[derive(Default)]
struct Recorded {
    requests: Vec<Message>,
    sealed: Vec<bool>,
}

/// `SimulatedAgent` serves the connections opened through a memory connector
///
/// Each connection gets its own proxy addresses. Requests are answered following the
/// scripted actions, in order, then with a null value once the script is exhausted
pub struct SimulatedAgent {
    script: Arc<StdMutex<VecDeque<Action>>>,
    recorded: Arc<StdMutex<Recorded>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SimulatedAgent {
    pub fn serve(listener: MemoryListener) -> Self {
        Self::start(listener, None)
    }

    /// Serves with a context message lacking the `missing` proxy
    pub fn serve_without_proxy(listener: MemoryListener, missing: &'static str) -> Self {
        Self::start(listener, Some(missing))
    }

    fn start(listener: MemoryListener, missing: Option<&'static str>) -> Self {
        let script = Arc::new(StdMutex::new(VecDeque::new()));
        let recorded = Arc::new(StdMutex::new(Recorded::default()));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(run(
            listener,
            missing,
            script.clone(),
            recorded.clone(),
            connections.clone(),
        ));

        Self {
            script,
            recorded,
            connections,
            task,
        }
    }

    pub fn script(&self, action: Action) {
        self.script.lock().unwrap().push_back(action);
    }

    pub fn requests(&self) -> Vec<Message> {
        self.recorded.lock().unwrap().requests.clone()
    }

    /// Whether each request arrived sealed
    pub fn sealed(&self) -> Vec<bool> {
        self.recorded.lock().unwrap().sealed.clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn wait_requests(&self, count: usize) {
        for _ in 0..200 {
            if self.requests().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Drop for SimulatedAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    listener: MemoryListener,
    missing: Option<&'static str>,
    script: Arc<StdMutex<VecDeque<Action>>>,
    recorded: Arc<StdMutex<Recorded>>,
    connections: Arc<AtomicUsize>,
) {
    while let Some(link) = listener.accept().await {
        let index = connections.fetch_add(1, Ordering::SeqCst) + 1;
        serve_link(link, index, missing, &script, &recorded).await;
    }
}

async fn write(link: &Link, address: &str, value: &Value) -> bool {
    let body = serde_json::to_vec(value).unwrap();
    link.outgoing.send(Frame::new(address, body)).await.is_ok()
}

async fn serve_link(
    mut link: Link,
    index: usize,
    missing: Option<&'static str>,
    script: &StdMutex<VecDeque<Action>>,
    recorded: &StdMutex<Recorded>,
) {
    let rpc = format!("rpc-{}", index);
    let events = format!("events-{}", index);

    let proxies: Vec<Value> = [(PROXY_REVERSE, &rpc), (PROXY_SUB_PROTOCOL, &events)]
        .into_iter()
        .filter(|(id, _)| Some(*id) != missing)
        .map(|(id, address)| json!({"id": id, "address": address}))
        .collect();
    let context = json!({
        "@id": format!("context-{}", index),
        "@type": CONTEXT_TYPE,
        PROXY_DECORATOR: proxies,
    });

    if !write(&link, CONTROL_ADDRESS, &context).await {
        return;
    }

    while let Some(frame) = link.incoming.recv().await {
        if frame.address != rpc {
            continue;
        }

        let mut value: Value = serde_json::from_slice(&frame.body).unwrap();
        let sealed = EncodingPacker.is_packed(&value);
        if sealed {
            value = EncodingPacker.unpack(value).await.unwrap();
        }

        let request = Message::from_value(value).unwrap();
        let promise = request
            .get(FIELD_PROMISE)
            .and_then(|promise| promise.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        {
            let mut recorded = recorded.lock().unwrap();
            recorded.requests.push(request);
            recorded.sealed.push(sealed);
        }

        let action = script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Action::Reply(CallValue::Plain(Value::Null)));

        let outcome = match action {
            Action::Disconnect => return,
            Action::Silence => continue,
            Action::Reply(value) => Ok(value),
            Action::Raise { class_name, code } => Err((class_name, code)),
            Action::Event(envelope) => {
                if !write(&link, &events, &envelope.to_value()).await {
                    return;
                }
                Ok(CallValue::Plain(Value::Null))
            }
        };

        let Some(id) = promise else {
            continue;
        };

        let reply = match outcome {
            Ok(value) => value_reply(&id, &value),
            Err((class_name, code)) => exception_reply(&id, &class_name, code),
        };

        let mut body = reply.to_value();
        if sealed {
            body = EncodingPacker.pack(body).await.unwrap();
        }

        if !write(&link, &rpc, &body).await {
            return;
        }
    }
}

/// `ScriptedRouter` answers every wait with the events pushed beforehand and records
/// the calls it receives
pub struct ScriptedRouter {
    feed: mpsc::UnboundedSender<Event>,
    events: Mutex<mpsc::UnboundedReceiver<Event>>,
    sent: StdMutex<Vec<Message>>,
    calls: StdMutex<Vec<String>>,
}

impl ScriptedRouter {
    pub fn new() -> Self {
        let (feed, events) = mpsc::unbounded_channel();
        Self {
            feed,
            events: Mutex::new(events),
            sent: StdMutex::new(Vec::new()),
            calls: StdMutex::new(Vec::new()),
        }
    }

    pub fn push(&self, event: Event) {
        self.feed.send(event).unwrap();
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RouterApi for ScriptedRouter {
    async fn send_message(
        &self,
        message: &Message,
        _batch: &RoutingBatch,
        expect_reply: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<Event>, RpcError> {
        self.sent.lock().unwrap().push(message.clone());
        self.record("send_message".to_string());

        if !expect_reply {
            return Ok(None);
        }

        self.read_event(timeout).await
    }

    async fn send_message_batched(
        &self,
        message: &Message,
        batches: Vec<RoutingBatch>,
    ) -> Result<Delivered, RpcError> {
        self.sent.lock().unwrap().push(message.clone());
        self.record(format!("send_message_batched:{}", batches.len()));
        Ok(batches
            .into_iter()
            .map(|batch| (true, batch.endpoint))
            .collect())
    }

    async fn read_event(&self, timeout: Option<Duration>) -> Result<Option<Event>, RpcError> {
        let mut events = self.events.lock().await;
        let wait = timeout.unwrap_or(Duration::from_secs(1));
        Ok(tokio::time::timeout(wait, events.recv())
            .await
            .ok()
            .flatten())
    }

    async fn start_protocol_with_threading(
        &self,
        thid: &str,
        _ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        self.record(format!("start_protocol_with_threading:{}", thid));
        Ok(())
    }

    async fn stop_protocol_with_threading(
        &self,
        thid: &str,
        _ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        self.record(format!("stop_protocol_with_threading:{}", thid));
        Ok(())
    }

    async fn start_protocol_with_threads(
        &self,
        threads: Vec<String>,
        _ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        self.record(format!("start_protocol_with_threads:{}", threads.len()));
        Ok(())
    }

    async fn stop_protocol_with_threads(
        &self,
        threads: Vec<String>,
        _ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        self.record(format!("stop_protocol_with_threads:{}", threads.len()));
        Ok(())
    }

    async fn start_protocol_for_p2p(
        &self,
        sender_verkey: &str,
        recipient_verkey: &str,
        _protocols: Vec<String>,
        _ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        self.record(format!(
            "start_protocol_for_p2p:{}:{}",
            sender_verkey, recipient_verkey
        ));
        Ok(())
    }

    async fn stop_protocol_for_p2p(
        &self,
        sender_verkey: &str,
        recipient_verkey: &str,
        _protocols: Vec<String>,
        _ttl: Option<Duration>,
    ) -> Result<(), RpcError> {
        self.record(format!(
            "stop_protocol_for_p2p:{}:{}",
            sender_verkey, recipient_verkey
        ));
        Ok(())
    }
}
