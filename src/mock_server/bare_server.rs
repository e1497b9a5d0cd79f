use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::mock_server::hyper::run_server;
use crate::reporter::{Failure, RecordingReporter, Reporter};
use crate::request::BodyPrintLimit;
use crate::verification::FulfillmentAuditor;
use crate::{Expectation, ExpectationId, ExpectationRegistry, HeaderFilter, Request};
use http::StatusCode;
use log::{debug, error};
use std::fmt::{Debug, Formatter};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

/// Where failures go.
pub(super) enum FailureSink {
    /// Failures are collected and turned into a panic when the server is verified.
    Collect(Arc<RecordingReporter>),
    /// Failures are handed over to a user-provided reporter.
    Forward(Arc<dyn Reporter>),
}

impl FailureSink {
    fn reporter(&self) -> Arc<dyn Reporter> {
        match self {
            FailureSink::Collect(recorder) => recorder.clone() as Arc<dyn Reporter>,
            FailureSink::Forward(reporter) => reporter.clone(),
        }
    }
}

/// Everything a [`BareMockServer`] needs to know before it starts listening.
pub(super) struct ServerConfig {
    pub(super) header_filter: HeaderFilter,
    pub(super) recording: RequestRecording,
    pub(super) body_print_limit: BodyPrintLimit,
    pub(super) unmatched_status: StatusCode,
    pub(super) reporter: Option<Arc<dyn Reporter>>,
}

/// The state shared between the [`BareMockServer`] handle and the HTTP server running in the
/// background.
pub(super) struct MockServerState {
    dispatcher: Dispatcher,
    received_requests: Option<Mutex<Vec<Request>>>,
    failure_sink: FailureSink,
    verified: bool,
}

impl MockServerState {
    /// Requests are served under a read lock: concurrent requests only contend on the
    /// registry's own guard.
    pub(super) fn handle_request(&self, request: Request) -> DispatchOutcome {
        let outcome = self.dispatcher.handle(&request);
        if let Some(received_requests) = &self.received_requests {
            received_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);
        }
        outcome
    }

    fn registry(&self) -> &ExpectationRegistry {
        self.dispatcher.registry()
    }
}

/// An HTTP web-server running in the background to behave as one of your dependencies using
/// [`Expectation`]s for testing purposes.
///
/// `BareMockServer` is the actual mock server behind the publicly-exposed `MockApi`, which
/// is instead a thin facade over a `BareMockServer` retrieved from a pool - see `get_pooled_mock_server`
/// for more details.
pub(crate) struct BareMockServer {
    state: Arc<RwLock<MockServerState>>,
    server_address: SocketAddr,
    server_thread: std::thread::JoinHandle<()>,
    // When `_shutdown_trigger` gets dropped the listening server terminates gracefully.
    _shutdown_trigger: tokio::sync::oneshot::Sender<()>,
}

/// Whether incoming requests are kept around for later inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RequestRecording {
    Enabled,
    Disabled,
}

impl BareMockServer {
    /// Start a new instance of a `BareMockServer` listening on the specified
    /// [`TcpListener`](std::net::TcpListener).
    pub(super) fn start(listener: TcpListener, config: ServerConfig) -> Self {
        let (shutdown_trigger, shutdown_receiver) = tokio::sync::oneshot::channel();
        let received_requests = match config.recording {
            RequestRecording::Enabled => Some(Mutex::new(Vec::new())),
            RequestRecording::Disabled => None,
        };
        let failure_sink = match config.reporter {
            Some(reporter) => FailureSink::Forward(reporter),
            None => FailureSink::Collect(Arc::new(RecordingReporter::new())),
        };
        let dispatcher = Dispatcher::new(
            Arc::new(ExpectationRegistry::new()),
            failure_sink.reporter(),
        )
        .header_filter(config.header_filter)
        .unmatched_status(config.unmatched_status)
        .body_print_limit(config.body_print_limit);
        let state = Arc::new(RwLock::new(MockServerState {
            dispatcher,
            received_requests,
            failure_sink,
            verified: false,
        }));

        let server_address = listener
            .local_addr()
            .expect("Failed to get server address.");

        // The listener is already bound: connections attempted before the accept loop
        // starts wait in the OS backlog.
        let server_state = state.clone();
        let server_thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Cannot build local tokio runtime");

            if let Err(e) = runtime.block_on(run_server(listener, server_state, shutdown_receiver))
            {
                error!("Mock API server failed: {}", e);
            }
        });

        Self {
            state,
            server_address,
            server_thread,
            _shutdown_trigger: shutdown_trigger,
        }
    }

    /// Register an [`Expectation`] on an instance of `BareMockServer`.
    pub(crate) async fn register(&self, expectation: Expectation) -> ExpectationId {
        self.state.write().await.registry().register(expectation)
    }

    /// Replace the set of headers ignored for matching and diagnostics.
    pub(crate) async fn set_header_filter(&self, header_filter: HeaderFilter) {
        self.state
            .write()
            .await
            .dispatcher
            .set_header_filter(header_filter);
    }

    /// Drop all mounted expectations, recorded requests and pending failures from an instance
    /// of `BareMockServer`.
    ///
    /// It *must* be called if you plan to reuse a `BareMockServer` instance (i.e. in our
    /// `MockServerPoolManager`).
    pub(crate) async fn reset(&self) {
        let mut state = self.state.write().await;
        state.registry().reset();
        state.dispatcher.set_header_filter(HeaderFilter::empty());
        if let Some(received_requests) = &state.received_requests {
            received_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        if let FailureSink::Collect(recorder) = &state.failure_sink {
            recorder.take();
        }
        state.verified = false;
    }

    /// Audit every mounted expectation, then hand over the failures collected so far.
    ///
    /// The audit runs once: later calls only return the unmatched requests received since the
    /// previous call. The result is always empty if failures are forwarded to a user-provided
    /// reporter.
    pub(crate) async fn verify(&self) -> Vec<Failure> {
        let mut state = self.state.write().await;
        if state.verified {
            debug!("Expectations have already been audited.");
        } else {
            state.verified = true;
            let reporter = state.failure_sink.reporter();
            FulfillmentAuditor::verify(state.registry(), reporter.as_ref());
        }
        match &state.failure_sink {
            FailureSink::Collect(recorder) => recorder.take(),
            FailureSink::Forward(_) => Vec::new(),
        }
    }

    /// How many requests the expectation matched so far.
    pub(crate) async fn call_count(&self, id: ExpectationId) -> Option<u64> {
        self.state.read().await.registry().call_count(id)
    }

    /// Return the base uri of this running instance of `BareMockServer`, e.g. `http://127.0.0.1:4372`.
    ///
    /// Use this method to compose uris when interacting with this instance of `BareMockServer` via
    /// an HTTP client.
    pub(crate) fn uri(&self) -> String {
        format!("http://{}", self.server_address)
    }

    /// Return the socket address of this running instance of `BareMockServer`, e.g. `127.0.0.1:4372`.
    ///
    /// Use this method to interact with the `BareMockServer` using `TcpStream`s.
    pub(crate) fn address(&self) -> &SocketAddr {
        &self.server_address
    }

    /// Return the list of requests received by this instance of `BareMockServer`, `None` if
    /// request recording has been disabled.
    pub(crate) async fn received_requests(&self) -> Option<Vec<Request>> {
        let state = self.state.read().await;
        state.received_requests.as_ref().map(|received_requests| {
            received_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// The recorded requests as they appear in diagnostics, `None` if request recording has
    /// been disabled.
    pub(crate) async fn printed_received_requests(&self) -> Option<Vec<String>> {
        let state = self.state.read().await;
        state.received_requests.as_ref().map(|received_requests| {
            received_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|request| state.dispatcher.print_request(request))
                .collect()
        })
    }

    /// `false` once the background server has stopped accepting connections.
    pub(crate) fn is_running(&self) -> bool {
        !self.server_thread.is_finished()
    }
}

impl Debug for BareMockServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BareMockServer {{ address: {} }}", self.address())
    }
}
