//! The request provider and its builder.

use std::fmt;
use std::sync::Arc;

use courier_core::{
    Cancellable, CancellableWrapper, Endpoint, Error, Plugin, ProgressBlock, Request,
    RequestResult, Retrier, StubBehavior, Target, Transport,
};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::defaults::{default_endpoint_mapping, default_request_mapping, never_stub};
use crate::inflight::{Admission, Completion, InflightTable};
use crate::queue::CallbackQueue;

/// Maps a target to its endpoint.
pub type EndpointClosure<T> = Arc<dyn Fn(&T) -> Endpoint + Send + Sync>;

/// Receives the outcome of request resolution.
pub type RequestResultClosure = Box<dyn FnOnce(Result<Request, Error>) + Send>;

/// Resolves an endpoint into a request and hands it to the callback.
///
/// The callback may be called later, from any thread, e.g. after signing the
/// request asynchronously. It must be called exactly once.
pub type RequestClosure = Arc<dyn Fn(Endpoint, RequestResultClosure) + Send + Sync>;

/// Decides whether a target is stubbed.
pub type StubClosure<T> = Arc<dyn Fn(&T) -> StubBehavior + Send + Sync>;

pub(crate) struct ProviderInner<T: Target> {
    pub(crate) endpoint_closure: EndpointClosure<T>,
    pub(crate) request_closure: RequestClosure,
    pub(crate) stub_closure: StubClosure<T>,
    pub(crate) plugins: Vec<Arc<dyn Plugin<T>>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) callback_queue: Option<CallbackQueue>,
    pub(crate) track_inflights: bool,
    pub(crate) retrier: Option<Arc<dyn Retrier>>,
    pub(crate) inflight: InflightTable,
}

/// Turns targets into requests and dispatches them.
///
/// A provider owns the closures that map targets to endpoints, resolve
/// endpoints into requests and decide about stubbing, the plugin chain, and
/// the transport live requests go through. Cloning is cheap and clones share
/// the in-flight table.
///
/// Every call to [`request`](Provider::request) invokes its completion
/// exactly once, whatever happens to the returned cancellable.
pub struct Provider<T: Target> {
    pub(crate) inner: Arc<ProviderInner<T>>,
}

impl<T: Target> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Target> Provider<T> {
    /// A provider with default closures and no plugins.
    pub fn new<Tr: Transport>(transport: Tr) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder<Tr: Transport>(transport: Tr) -> ProviderBuilder<T> {
        ProviderBuilder::new(Arc::new(transport))
    }

    /// The endpoint this provider builds for `target`.
    pub fn endpoint(&self, target: &T) -> Endpoint {
        (self.inner.endpoint_closure)(target)
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin<T>>] {
        &self.inner.plugins
    }

    pub fn track_inflights(&self) -> bool {
        self.inner.track_inflights
    }

    /// The callback queue used when a request does not name one.
    pub fn callback_queue(&self) -> Option<&CallbackQueue> {
        self.inner.callback_queue.as_ref()
    }

    /// Sends a request for `target`.
    pub fn request<F>(&self, target: T, completion: F) -> Arc<dyn Cancellable>
    where
        F: FnOnce(RequestResult) + Send + 'static,
    {
        self.request_with(target, None, None, completion)
    }

    /// Sends a request for `target`, with an optional callback queue and
    /// progress callback.
    ///
    /// `callback_queue` overrides the provider's queue. When neither is set,
    /// progress and completion run on whatever thread produced them.
    /// Progress updates always precede the completion.
    pub fn request_with<F>(
        &self,
        target: T,
        callback_queue: Option<CallbackQueue>,
        progress: Option<ProgressBlock>,
        completion: F,
    ) -> Arc<dyn Cancellable>
    where
        F: FnOnce(RequestResult) + Send + 'static,
    {
        let target = Arc::new(target);
        let callback_queue = callback_queue.or_else(|| self.inner.callback_queue.clone());
        let endpoint = self.endpoint(&target);
        let stub_behavior = (self.inner.stub_closure)(&target);
        let token = Arc::new(CancellableWrapper::new());
        debug!(
            url = endpoint.url(),
            method = %endpoint.method(),
            ?stub_behavior,
            "request"
        );

        let plugins_with_completion: Completion = {
            let provider = self.clone();
            let target = target.clone();
            Box::new(move |result| completion(provider.process(result, &target)))
        };

        let network_completion: Completion = if self.inner.track_inflights {
            match self.inner.inflight.join(&endpoint, plugins_with_completion) {
                Admission::Follower => return token,
                Admission::Leader => {
                    let provider = self.clone();
                    let endpoint = endpoint.clone();
                    Box::new(move |result| provider.inner.inflight.complete(&endpoint, result))
                }
            }
        } else {
            plugins_with_completion
        };

        let perform_networking: RequestResultClosure = {
            let provider = self.clone();
            let endpoint = endpoint.clone();
            let token = token.clone();
            Box::new(move |request| {
                provider.perform_networking(
                    target,
                    request,
                    callback_queue,
                    progress,
                    endpoint,
                    stub_behavior,
                    token,
                    network_completion,
                )
            })
        };
        (self.inner.request_closure)(endpoint, perform_networking);

        token
    }
}

impl<T: Target> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("plugins", &self.inner.plugins.len())
            .field("callback_queue", &self.inner.callback_queue)
            .field("track_inflights", &self.inner.track_inflights)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Provider`].
///
/// Every closure defaults to the matching function in
/// [`defaults`](crate::defaults).
pub struct ProviderBuilder<T: Target> {
    endpoint_closure: EndpointClosure<T>,
    request_closure: RequestClosure,
    stub_closure: StubClosure<T>,
    plugins: Vec<Arc<dyn Plugin<T>>>,
    transport: Arc<dyn Transport>,
    callback_queue: Option<CallbackQueue>,
    track_inflights: bool,
    retrier: Option<Arc<dyn Retrier>>,
}

impl<T: Target> ProviderBuilder<T> {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint_closure: Arc::new(|target: &T| default_endpoint_mapping(target)),
            request_closure: Arc::new(|endpoint: Endpoint, done: RequestResultClosure| {
                default_request_mapping(endpoint, done)
            }),
            stub_closure: Arc::new(|target: &T| never_stub(target)),
            plugins: Vec::new(),
            transport,
            callback_queue: None,
            track_inflights: false,
            retrier: None,
        }
    }

    pub fn endpoint_closure<F>(mut self, closure: F) -> Self
    where
        F: Fn(&T) -> Endpoint + Send + Sync + 'static,
    {
        self.endpoint_closure = Arc::new(closure);
        self
    }

    pub fn request_closure<F>(mut self, closure: F) -> Self
    where
        F: Fn(Endpoint, RequestResultClosure) + Send + Sync + 'static,
    {
        self.request_closure = Arc::new(closure);
        self
    }

    pub fn stub_closure<F>(mut self, closure: F) -> Self
    where
        F: Fn(&T) -> StubBehavior + Send + Sync + 'static,
    {
        self.stub_closure = Arc::new(closure);
        self
    }

    /// Appends a plugin. Plugins run in the order they were added.
    pub fn plugin<P>(mut self, plugin: P) -> Self
    where
        P: Plugin<T> + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Appends already shared plugins.
    pub fn plugins<I>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Plugin<T>>>,
    {
        self.plugins.extend(plugins);
        self
    }

    pub fn callback_queue(mut self, queue: CallbackQueue) -> Self {
        self.callback_queue = Some(queue);
        self
    }

    pub fn track_inflights(mut self, track_inflights: bool) -> Self {
        self.track_inflights = track_inflights;
        self
    }

    /// Retry policy handed to the transport with every live request.
    pub fn retrier<R>(mut self, retrier: R) -> Self
    where
        R: Retrier + 'static,
    {
        self.retrier = Some(Arc::new(retrier));
        self
    }

    /// Applies `config`, replacing the stub closure and the in-flight flag.
    pub fn config(mut self, config: &ProviderConfig) -> Self {
        let behavior = StubBehavior::from(config.stub);
        self.stub_closure = Arc::new(move |_: &T| behavior);
        self.track_inflights = config.track_inflights;
        self
    }

    pub fn build(self) -> Provider<T> {
        Provider {
            inner: Arc::new(ProviderInner {
                endpoint_closure: self.endpoint_closure,
                request_closure: self.request_closure,
                stub_closure: self.stub_closure,
                plugins: self.plugins,
                transport: self.transport,
                callback_queue: self.callback_queue,
                track_inflights: self.track_inflights,
                retrier: self.retrier,
                inflight: InflightTable::new(),
            }),
        }
    }
}
