//! Shared test doubles: a scriptable transport, a target enum and a plugin
//! that records every hook call.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use courier::{
    Cancellable, HeaderMap, Method, Plugin, Progress, Request, RequestResult, RequestType,
    StatusCode, Target, Task, ValidationType,
};
use courier_core::{
    CancellableToken, HttpResponse, PreparedRequest, ProgressSink, RequestInterceptor,
    SimpleCancellable, Transport, TransportCompletion, TransportOutput, TransportTask,
};
use http::header::HeaderValue;
use tokio::sync::mpsc;

pub const ZEN: &str = "Half measures are as bad as nothing at all.";

/// Targets used across the provider tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Api {
    Zen,
    User(&'static str),
    /// Resolves to an unparsable URL.
    Broken,
    /// Accepts 2xx only.
    Strict,
}

impl Target for Api {
    fn base_url(&self) -> &str {
        match self {
            Api::Broken => "not a url",
            _ => "https://api.example.com",
        }
    }

    fn path(&self) -> String {
        match self {
            Api::Zen => "/zen".to_owned(),
            Api::User(name) => format!("/users/{name}"),
            Api::Broken => String::new(),
            Api::Strict => "/strict".to_owned(),
        }
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn sample_data(&self) -> Bytes {
        match self {
            Api::Zen => Bytes::from_static(ZEN.as_bytes()),
            Api::User(name) => Bytes::from(format!(r#"{{"login":"{name}"}}"#)),
            _ => Bytes::new(),
        }
    }

    fn task(&self) -> Task {
        Task::RequestPlain
    }

    fn validation_type(&self) -> ValidationType {
        match self {
            Api::Strict => ValidationType::SuccessCodes,
            _ => ValidationType::None,
        }
    }
}

type Responder = Arc<dyn Fn(&Request) -> TransportOutput + Send + Sync>;

/// A successful output echoing `request`.
pub fn respond(status: u16, body: &'static str) -> Responder {
    Arc::new(move |request: &Request| TransportOutput {
        response: Some(HttpResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
        )),
        request: Some(request.clone()),
        data: Some(Bytes::from_static(body.as_bytes())),
        error: None,
    })
}

struct Pending {
    id: usize,
    request: Request,
    completion: TransportCompletion,
}

struct MockState {
    responder: Responder,
    deferred: bool,
    progress: bool,
    late_progress: bool,
    drop_completions: bool,
    sends: AtomicUsize,
    cancels: AtomicUsize,
    next_id: AtomicUsize,
    sent: Mutex<Vec<Request>>,
    pending: Mutex<Vec<Pending>>,
}

/// A transport that answers from a responder.
///
/// Immediate mode completes inside `send`. Deferred mode parks every request
/// until [`MockTransport::release_all`]; cancelling a parked request completes
/// it with the cancellation output.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    fn with(responder: Responder, deferred: bool) -> Self {
        Self {
            state: Arc::new(MockState {
                responder,
                deferred,
                progress: false,
                late_progress: false,
                drop_completions: false,
                sends: AtomicUsize::new(0),
                cancels: AtomicUsize::new(0),
                next_id: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn immediate(responder: Responder) -> Self {
        Self::with(responder, false)
    }

    pub fn deferred(responder: Responder) -> Self {
        Self::with(responder, true)
    }

    /// Reports two progress updates before completing.
    pub fn with_progress(self) -> Self {
        self.map_state(|state| state.progress = true)
    }

    /// Reports one more progress update after completing.
    pub fn with_late_progress(self) -> Self {
        self.map_state(|state| state.late_progress = true)
    }

    /// Drops every completion without calling it.
    pub fn dropping_completions(self) -> Self {
        self.map_state(|state| state.drop_completions = true)
    }

    fn map_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        let mut state = Arc::try_unwrap(self.state)
            .unwrap_or_else(|_| panic!("configure the mock before sharing it"));
        f(&mut state);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn sends(&self) -> usize {
        self.state.sends.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.state.cancels.load(Ordering::SeqCst)
    }

    /// Requests as they went on the wire, after `prepare`.
    pub fn sent(&self) -> Vec<Request> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn pending(&self) -> usize {
        self.state.pending.lock().unwrap().len()
    }

    /// Completes every parked request with the responder's output.
    pub fn release_all(&self) {
        let pending: Vec<Pending> = self.state.pending.lock().unwrap().drain(..).collect();
        for pending in pending {
            let output = (self.state.responder)(&pending.request);
            pending.completion.complete(output);
        }
    }
}

impl MockState {
    fn cancel(&self, id: usize) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        let pending = {
            let mut parked = self.pending.lock().unwrap();
            parked
                .iter()
                .position(|pending| pending.id == id)
                .map(|index| parked.remove(index))
        };
        if let Some(pending) = pending {
            pending
                .completion
                .complete(TransportOutput::cancelled(Some(pending.request)));
        }
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        task: TransportTask,
        interceptor: RequestInterceptor,
        progress: Option<ProgressSink>,
        completion: TransportCompletion,
    ) -> Arc<dyn Cancellable> {
        self.state.sends.fetch_add(1, Ordering::SeqCst);
        let request = interceptor.adapt(task.request().clone());
        interceptor.will_send(&PreparedRequest::new(request.clone()));
        self.state.sent.lock().unwrap().push(request.clone());

        if self.state.drop_completions {
            drop(completion);
            return Arc::new(SimpleCancellable::new());
        }

        if let Some(progress) = progress.as_ref().filter(|_| self.state.progress) {
            progress(Progress::new(50, Some(100)));
            progress(Progress::new(100, Some(100)));
        }

        if !self.state.deferred {
            completion.complete((self.state.responder)(&request));
            if let Some(progress) = progress.filter(|_| self.state.late_progress) {
                progress(Progress::new(10, Some(10)));
            }
            return Arc::new(SimpleCancellable::new());
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.pending.lock().unwrap().push(Pending {
            id,
            request,
            completion,
        });
        let state = Arc::downgrade(&self.state);
        Arc::new(CancellableToken::new(move || {
            if let Some(state) = state.upgrade() {
                state.cancel(id);
            }
        }))
    }
}

/// Records every hook call as `"<name>.<hook>"` into a shared log.
pub struct RecordingPlugin {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingPlugin {
    pub fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            log: log.clone(),
        }
    }

    fn record(&self, hook: &str) {
        self.log.lock().unwrap().push(format!("{}.{}", self.name, hook));
    }
}

impl Plugin<Api> for RecordingPlugin {
    fn prepare(&self, request: Request, _target: &Api) -> Request {
        self.record("prepare");
        let name = format!("x-{}", self.name);
        let mut request = request;
        request.headers_mut().insert(
            http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_static("seen"),
        );
        request
    }

    fn will_send(&self, _request: &dyn RequestType, _target: &Api) {
        self.record("will_send");
    }

    fn did_receive(&self, _result: &RequestResult, _target: &Api) {
        self.record("did_receive");
    }

    fn process(&self, result: RequestResult, _target: &Api) -> RequestResult {
        self.record("process");
        result
    }
}

pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// The full hook order for plugins `names` around one dispatch.
pub fn full_order(names: &[&str]) -> Vec<String> {
    ["prepare", "will_send", "did_receive", "process"]
        .iter()
        .flat_map(|hook| names.iter().map(move |name| format!("{name}.{hook}")))
        .collect()
}

/// The hook order when nothing was sent.
pub fn receive_only_order(names: &[&str]) -> Vec<String> {
    ["did_receive", "process"]
        .iter()
        .flat_map(|hook| names.iter().map(move |name| format!("{name}.{hook}")))
        .collect()
}

/// A completion that forwards results into a channel.
pub fn completion_channel() -> (
    impl Fn() -> Box<dyn FnOnce(RequestResult) + Send> + Clone,
    mpsc::UnboundedReceiver<RequestResult>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let make = move || {
        let tx = tx.clone();
        Box::new(move |result: RequestResult| {
            let _ = tx.send(result);
        }) as Box<dyn FnOnce(RequestResult) + Send>
    };
    (make, rx)
}

/// Receives the next result or fails after five seconds.
pub async fn next_result(rx: &mut mpsc::UnboundedReceiver<RequestResult>) -> RequestResult {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a completion")
        .expect("completion channel closed")
}

/// Asserts that no further result arrives within `wait`.
pub async fn assert_no_more(rx: &mut mpsc::UnboundedReceiver<RequestResult>, wait: Duration) {
    if let Ok(Some(result)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected extra completion: {result:?}");
    }
}
