use crate::mock_server::bare_server::MockServerState;
use crate::request::DynError;
use http::{Response, StatusCode};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use log::debug;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// The actual HTTP server answering incoming requests according to the mounted expectations.
pub(super) async fn run_server(
    listener: std::net::TcpListener,
    server_state: Arc<RwLock<MockServerState>>,
    mut shutdown_signal: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), DynError> {
    listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(listener)?;

    let request_handler = move |request: hyper::Request<Incoming>| {
        let server_state = server_state.clone();
        async move {
            let request = match crate::Request::from_hyper(request).await {
                Ok(request) => request,
                Err(e) => return Ok::<_, Infallible>(bad_request(e)),
            };
            let outcome = server_state.read().await.handle_request(request);

            // We do not wait for the delay while holding on to the server state: configuration
            // changes and verification must not hang until every delayed reply has gone out.
            if let Some(delay) = outcome.delay {
                tokio::time::sleep(delay).await;
            }

            Ok::<_, Infallible>(outcome.into_response())
        }
    };

    loop {
        let (stream, _) = tokio::select! {
            // This resolves when either:
            // - the sender half of the channel gets dropped (i.e. the server handle is dropped)
            // - the sender is used, therefore sending a poison pill willingly as a shutdown signal
            _ = &mut shutdown_signal => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    debug!("Failed to accept an incoming connection: {}", e);
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let request_handler = request_handler.clone();
        tokio::task::spawn(async move {
            let http_server = Builder::new(TokioExecutor::new());
            if let Err(e) = http_server
                .serve_connection(io, service_fn(request_handler))
                .await
            {
                debug!("Failed to serve an incoming connection: {}", e);
            }
        });
    }

    Ok(())
}

fn bad_request(error: DynError) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!(
        "Failed to read the incoming request: {}",
        error
    ))));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}
