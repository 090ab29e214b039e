//! The dispatch pipeline behind [`Provider::request_with`].
//!
//! After the endpoint has been resolved, a call takes one of three paths:
//!
//! - **live**: the request goes to the transport, wrapped in an interceptor
//!   that runs the `prepare` and `will_send` hooks per attempt
//! - **immediate stub**: plugins are told about a request that is never sent,
//!   then the sample response is evaluated right away (or on the callback
//!   queue)
//! - **delayed stub**: as above, after a timer
//!
//! All three report through `did_receive`, then the caller's `process` chain
//! and completion. Failures before dispatch (resolution errors and early
//! cancellation) skip `prepare` and `will_send`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use courier_core::{
    Cancellable, CancellableToken, CancellableWrapper, Endpoint, Error, MethodExt, Progress,
    ProgressBlock, ProgressResponse, ProgressSink, Request, RequestInterceptor, RequestResult,
    RequestType, Response, SampleResponse, StubBehavior, Target, Task, TransportCompletion,
    TransportTask, ValidationType, convert_response_to_result,
};
use tracing::{debug, trace};

use crate::inflight::Completion;
use crate::metrics::{record_cancellation, record_dispatch, record_live_duration};
use crate::provider::Provider;
use crate::queue::{Alarm, CallbackQueue, deliver, run_after};

/// Progress seen for one live call.
///
/// Once closed by the transport completion, later updates are dropped.
#[derive(Default)]
struct Reported {
    last: Option<Progress>,
    closed: bool,
}

impl Reported {
    fn close(&mut self) -> Option<Progress> {
        self.closed = true;
        self.last
    }
}

/// Turns a response outside the target's accepted codes into a failure.
pub(crate) fn validate(result: RequestResult, validation: &ValidationType) -> RequestResult {
    match result {
        Ok(response) if !validation.accepts(response.status_code()) => Err(Error::Underlying(
            Arc::new(Error::StatusCode(response.clone())),
            Some(response),
        )),
        other => other,
    }
}

impl<T: Target> Provider<T> {
    pub(crate) fn prepare(&self, request: Request, target: &T) -> Request {
        self.inner
            .plugins
            .iter()
            .fold(request, |request, plugin| plugin.prepare(request, target))
    }

    pub(crate) fn will_send(&self, request: &dyn RequestType, target: &T) {
        for plugin in &self.inner.plugins {
            plugin.will_send(request, target);
        }
    }

    pub(crate) fn did_receive(&self, result: &RequestResult, target: &T) {
        if let Err(error) = result
            && error.is_cancelled()
        {
            record_cancellation();
        }
        for plugin in &self.inner.plugins {
            plugin.did_receive(result, target);
        }
    }

    pub(crate) fn process(&self, result: RequestResult, target: &T) -> RequestResult {
        self.inner
            .plugins
            .iter()
            .fold(result, |result, plugin| plugin.process(result, target))
    }

    /// Reports the canonical cancellation failure.
    fn cancel_completion<F>(&self, completion: F, target: &T)
    where
        F: FnOnce(RequestResult),
    {
        debug!("request cancelled before it produced a result");
        let result = Err(Error::cancelled());
        self.did_receive(&result, target);
        completion(result);
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn perform_networking(
        &self,
        target: Arc<T>,
        request: Result<Request, Error>,
        callback_queue: Option<CallbackQueue>,
        progress: Option<ProgressBlock>,
        endpoint: Endpoint,
        stub_behavior: StubBehavior,
        token: Arc<CancellableWrapper>,
        completion: Completion,
    ) {
        if token.is_cancelled() {
            let provider = self.clone();
            deliver(callback_queue.as_ref(), move || {
                provider.cancel_completion(completion, &target)
            });
            return;
        }

        let request = match request {
            Ok(request) => request,
            Err(error) => {
                debug!(url = endpoint.url(), %error, "request resolution failed");
                let provider = self.clone();
                deliver(callback_queue.as_ref(), move || {
                    let result = Err(error);
                    provider.did_receive(&result, &target);
                    completion(result);
                });
                return;
            }
        };

        let cancellable = self.perform_request(
            target,
            request,
            callback_queue,
            progress,
            completion,
            endpoint,
            stub_behavior,
            &token,
        );
        token.arm(cancellable);
    }

    #[allow(clippy::too_many_arguments)]
    fn perform_request(
        &self,
        target: Arc<T>,
        request: Request,
        callback_queue: Option<CallbackQueue>,
        progress: Option<ProgressBlock>,
        completion: Completion,
        endpoint: Endpoint,
        stub_behavior: StubBehavior,
        token: &Arc<CancellableWrapper>,
    ) -> Arc<dyn Cancellable> {
        if stub_behavior.is_stubbed() {
            return self.stub_request(
                target,
                request,
                callback_queue,
                completion,
                endpoint,
                stub_behavior,
            );
        }

        let task = match endpoint.task() {
            Task::RequestPlain
            | Task::RequestData(_)
            | Task::RequestJsonEncodable(_)
            | Task::RequestParameters { .. }
            | Task::RequestCompositeData { .. }
            | Task::RequestCompositeParameters { .. } => TransportTask::Data(request),
            Task::UploadFile(file) => TransportTask::UploadFile {
                request,
                file: file.clone(),
            },
            Task::UploadMultipart(parts) | Task::UploadCompositeMultipart(parts, _) => {
                if parts.is_empty() || !endpoint.method().supports_multipart() {
                    panic!(
                        "{} {} is not a multipart upload target",
                        endpoint.method(),
                        endpoint.url()
                    );
                }
                TransportTask::UploadMultipart {
                    request,
                    parts: parts.clone(),
                }
            }
            Task::DownloadDestination(destination)
            | Task::DownloadParameters { destination, .. } => TransportTask::Download {
                request,
                destination: destination.clone(),
            },
        };
        self.send_request(target, task, callback_queue, progress, token, completion)
    }

    fn send_request(
        &self,
        target: Arc<T>,
        task: TransportTask,
        callback_queue: Option<CallbackQueue>,
        progress: Option<ProgressBlock>,
        token: &Arc<CancellableWrapper>,
        completion: Completion,
    ) -> Arc<dyn Cancellable> {
        let reported = Arc::new(Mutex::new(Reported::default()));
        let progress_sink = progress.clone().map(|block| {
            let queue = callback_queue.clone();
            let token = token.clone();
            let reported = reported.clone();
            Arc::new(move |update: Progress| {
                // Held across delivery so a concurrent completion queues behind us.
                let mut reported = reported.lock().unwrap_or_else(PoisonError::into_inner);
                if reported.closed || token.is_cancelled() {
                    trace!(?update, "dropping progress update");
                    return;
                }
                reported.last = Some(update);
                let block = block.clone();
                deliver(queue.as_ref(), move || {
                    block(ProgressResponse::new(Some(update), None))
                });
            }) as ProgressSink
        });

        let kind = task.kind();
        let url = task.request().url().clone();
        let started = Instant::now();
        let interceptor = self.interceptor(&target);
        let transport_completion = {
            let provider = self.clone();
            let token = token.clone();
            TransportCompletion::new(move |output| {
                let last = reported.lock().unwrap_or_else(PoisonError::into_inner).close();
                let result =
                    validate(convert_response_to_result(output), &target.validation_type());
                record_live_duration(started.elapsed(), result.is_ok());
                debug!(
                    %url,
                    kind,
                    elapsed = ?started.elapsed(),
                    status = result.as_ref().ok().map(Response::status_code),
                    "transport completed"
                );
                deliver(callback_queue.as_ref(), move || {
                    provider.did_receive(&result, &target);
                    if let Some(block) = progress
                        && !token.is_cancelled()
                    {
                        block(ProgressResponse::new(last, result.as_ref().ok().cloned()));
                    }
                    completion(result);
                });
            })
        };

        record_dispatch("live");
        self.inner
            .transport
            .send(task, interceptor, progress_sink, transport_completion)
    }

    fn interceptor(&self, target: &Arc<T>) -> RequestInterceptor {
        let adapt = {
            let provider = self.clone();
            let target = target.clone();
            move |request| provider.prepare(request, &target)
        };
        let will_send = {
            let provider = self.clone();
            let target = target.clone();
            move |request: &dyn RequestType| provider.will_send(request, &target)
        };
        RequestInterceptor::new()
            .with_adapt(adapt)
            .with_will_send(will_send)
            .with_retrier(self.inner.retrier.clone())
    }

    /// Serves `request` from the endpoint's sample response.
    ///
    /// Plugins see the prepared request through `prepare` and `will_send` as
    /// if it were sent. `completion` receives the result after `did_receive`
    /// and is not passed through `process`.
    ///
    /// # Panics
    ///
    /// Panics if `stub_behavior` is [`StubBehavior::Never`].
    pub fn stub_request<F>(
        &self,
        target: Arc<T>,
        request: Request,
        callback_queue: Option<CallbackQueue>,
        completion: F,
        endpoint: Endpoint,
        stub_behavior: StubBehavior,
    ) -> Arc<dyn Cancellable>
    where
        F: FnOnce(RequestResult) + Send + 'static,
    {
        assert!(
            stub_behavior.is_stubbed(),
            "stub_request called for a target that is not stubbed"
        );
        let callback_queue = callback_queue.or_else(|| self.inner.callback_queue.clone());
        let alarm = Arc::new(Alarm::new());
        let token = Arc::new(CancellableToken::new({
            let alarm = alarm.clone();
            move || alarm.ring()
        }));
        let request = self.notify_plugins_of_impending_stub(request, &target);
        let stub = self.stub_function(token.clone(), target, completion, endpoint, request);

        record_dispatch("stub");
        match stub_behavior {
            StubBehavior::Immediate => deliver(callback_queue.as_ref(), stub),
            StubBehavior::Delayed(delay) => {
                trace!(?delay, "scheduling delayed stub");
                run_after(delay, alarm, callback_queue, stub);
            }
            StubBehavior::Never => unreachable!("checked above"),
        }
        token
    }

    fn notify_plugins_of_impending_stub(&self, request: Request, target: &T) -> Request {
        let request = self.prepare(request, target);
        let unsent = self.inner.transport.unsent(request.clone());
        self.will_send(unsent.as_ref(), target);
        request
    }

    fn stub_function<F>(
        &self,
        token: Arc<CancellableToken>,
        target: Arc<T>,
        completion: F,
        endpoint: Endpoint,
        request: Request,
    ) -> impl FnOnce() + Send + 'static
    where
        F: FnOnce(RequestResult) + Send + 'static,
    {
        let provider = self.clone();
        move || {
            if token.is_cancelled() {
                provider.cancel_completion(completion, &target);
                return;
            }
            let validation = target.validation_type();
            let result = match endpoint.sample_response() {
                SampleResponse::NetworkResponse(status_code, data) => validate(
                    Ok(Response::new(status_code, data).with_request(Some(request))),
                    &validation,
                ),
                SampleResponse::Response(response, data) => validate(
                    Ok(Response::new(response.status().as_u16(), data)
                        .with_request(Some(request))
                        .with_response(Some(response))),
                    &validation,
                ),
                SampleResponse::NetworkError(error) => Err(Error::Underlying(error, None)),
            };
            provider.did_receive(&result, &target);
            completion(result);
        }
    }
}
