//! Integration tests for the plugin chain: hook order on every path and
//! request rewriting through `prepare`.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use common::{
    Api, MockTransport, RecordingPlugin, completion_channel, events, full_order, new_log,
    next_result, receive_only_order, respond,
};
use courier::defaults::{default_endpoint_mapping, delayed_stub, immediately_stub};
use courier::plugins::{
    AccessTokenAuthorizable, AccessTokenPlugin, AuthorizationType, NetworkActivityChangeType,
    NetworkActivityPlugin,
};
use courier::{
    Endpoint, Error, Plugin, Provider, RequestResult, Response, SampleResponse, StubClosure,
};
use http::header::AUTHORIZATION;

impl AccessTokenAuthorizable for Api {
    fn authorization_type(&self) -> Option<AuthorizationType> {
        match self {
            Api::User(_) => Some(AuthorizationType::Bearer),
            _ => None,
        }
    }
}

/// Turns every failure into a 299 response.
struct Recover;

impl Plugin<Api> for Recover {
    fn process(&self, result: RequestResult, _target: &Api) -> RequestResult {
        result.or_else(|_| Ok(Response::new(299, "recovered")))
    }
}

fn recorded(transport: MockTransport, log: &Arc<Mutex<Vec<String>>>) -> Provider<Api> {
    Provider::builder(transport)
        .plugin(RecordingPlugin::new("a", log))
        .plugin(RecordingPlugin::new("b", log))
        .build()
}

/// A stubbing provider whose endpoints answer with `sample`.
fn recorded_stub(
    stub: StubClosure<Api>,
    sample: fn() -> SampleResponse,
    log: &Arc<Mutex<Vec<String>>>,
) -> Provider<Api> {
    Provider::builder(MockTransport::immediate(respond(200, "live")))
        .stub_closure(move |target: &Api| stub(target))
        .endpoint_closure(move |target: &Api| {
            let endpoint = default_endpoint_mapping(target);
            Endpoint::new(
                endpoint.url(),
                sample,
                endpoint.method().clone(),
                endpoint.task().clone(),
                None,
            )
        })
        .plugin(RecordingPlugin::new("a", log))
        .plugin(RecordingPlugin::new("b", log))
        .build()
}

/// Test 1: A successful live request runs every hook in registration order.
#[tokio::test]
async fn test_live_success_order() {
    let log = new_log();
    let provider = recorded(MockTransport::immediate(respond(200, "ok")), &log);

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Zen, completion());
    next_result(&mut rx).await.unwrap();

    assert_eq!(events(&log), full_order(&["a", "b"]));
}

/// Test 2: A live request rejected by validation runs the same hooks.
#[tokio::test]
async fn test_live_failure_order() {
    let log = new_log();
    let provider = recorded(MockTransport::immediate(respond(500, "boom")), &log);

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Strict, completion());
    next_result(&mut rx).await.unwrap_err();

    assert_eq!(events(&log), full_order(&["a", "b"]));
}

/// Test 3: A stubbed request looks the same to plugins as a live one.
#[tokio::test]
async fn test_stub_order() {
    let log = new_log();
    let transport = MockTransport::immediate(respond(200, "ok"));
    let provider = Provider::builder(transport.clone())
        .stub_closure(immediately_stub)
        .plugin(RecordingPlugin::new("a", &log))
        .plugin(RecordingPlugin::new("b", &log))
        .build();

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Zen, completion());
    let response = next_result(&mut rx).await.unwrap();

    assert_eq!(events(&log), full_order(&["a", "b"]));
    assert_eq!(transport.sends(), 0);
    let request = response.request().unwrap();
    assert_eq!(request.headers()["x-a"], "seen");
    assert_eq!(request.headers()["x-b"], "seen");
}

/// Test 4: A request that never resolves skips `prepare` and `will_send`.
#[tokio::test]
async fn test_resolution_failure_order() {
    let log = new_log();
    let provider = recorded(MockTransport::immediate(respond(200, "ok")), &log);

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Broken, completion());
    assert!(matches!(
        next_result(&mut rx).await,
        Err(Error::RequestMapping(_))
    ));

    assert_eq!(events(&log), receive_only_order(&["a", "b"]));
}

/// Test 5: `prepare` is cumulative and its output is what goes on the wire.
#[tokio::test]
async fn test_prepare_is_cumulative() {
    let log = new_log();
    let transport = MockTransport::immediate(respond(200, "ok"));
    let provider = recorded(transport.clone(), &log);

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Zen, completion());
    next_result(&mut rx).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].headers()["x-a"], "seen");
    assert_eq!(sent[0].headers()["x-b"], "seen");
}

/// Test 6: `process` may replace the result handed to the caller.
#[tokio::test]
async fn test_process_rewrites_result() {
    let provider = Provider::builder(MockTransport::immediate(respond(500, "boom")))
        .plugin(Recover)
        .build();

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Strict, completion());

    let response = next_result(&mut rx).await.unwrap();
    assert_eq!(response.status_code(), 299);
}

/// Test 7: The access token plugin authorizes only targets that ask for it.
#[tokio::test]
async fn test_access_token_plugin() {
    let transport = MockTransport::immediate(respond(200, "ok"));
    let provider = Provider::builder(transport.clone())
        .plugin(AccessTokenPlugin::new(|_: &Api| "s3cr3t".to_owned()))
        .build();

    let (completion, mut rx) = completion_channel();
    provider.request(Api::User("ashfurrow"), completion());
    next_result(&mut rx).await.unwrap();
    provider.request(Api::Zen, completion());
    next_result(&mut rx).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0].headers()[AUTHORIZATION], "Bearer s3cr3t");
    assert!(sent[1].headers().get(AUTHORIZATION).is_none());
}

/// Test 8: The network activity plugin brackets every request.
#[tokio::test]
async fn test_network_activity_plugin() {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let provider = Provider::builder(MockTransport::immediate(respond(200, "ok")))
        .plugin(NetworkActivityPlugin::new(
            move |change, target: &Api| sink.lock().unwrap().push((change, target.clone())),
        ))
        .build();

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Zen, completion());
    next_result(&mut rx).await.unwrap();

    assert_eq!(
        *changes.lock().unwrap(),
        vec![
            (NetworkActivityChangeType::Began, Api::Zen),
            (NetworkActivityChangeType::Ended, Api::Zen),
        ]
    );
}

/// Test 9: A stubbed network error runs every hook.
#[tokio::test]
async fn test_stub_network_error_order() {
    let log = new_log();
    let provider = recorded_stub(
        Arc::new(immediately_stub::<Api>),
        || SampleResponse::NetworkError(Arc::new(std::io::Error::other("connection reset"))),
        &log,
    );

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Zen, completion());
    assert!(matches!(
        next_result(&mut rx).await,
        Err(Error::Underlying(_, None))
    ));

    assert_eq!(events(&log), full_order(&["a", "b"]));
}

/// Test 10: A stubbed status rejected by validation runs every hook.
#[tokio::test]
async fn test_stub_validation_failure_order() {
    let log = new_log();
    let provider = recorded_stub(
        Arc::new(immediately_stub::<Api>),
        || SampleResponse::NetworkResponse(500, Bytes::from_static(b"boom")),
        &log,
    );

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Strict, completion());
    assert!(matches!(
        next_result(&mut rx).await,
        Err(Error::Underlying(_, Some(_)))
    ));

    assert_eq!(events(&log), full_order(&["a", "b"]));
}

/// Test 11: A delayed stub runs every hook, with the receive half after the
/// delay.
#[tokio::test]
async fn test_delayed_stub_order() {
    let log = new_log();
    let provider = recorded_stub(
        Arc::new(delayed_stub::<Api>(Duration::from_millis(30))),
        || SampleResponse::NetworkResponse(200, Bytes::from_static(b"late")),
        &log,
    );

    let (completion, mut rx) = completion_channel();
    provider.request(Api::Zen, completion());
    assert_eq!(
        events(&log),
        ["a.prepare", "b.prepare", "a.will_send", "b.will_send"]
    );

    let response = next_result(&mut rx).await.unwrap();
    assert_eq!(response.data().as_ref(), b"late");
    assert_eq!(events(&log), full_order(&["a", "b"]));
}
