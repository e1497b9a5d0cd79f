//! `MockApi::start` hands out servers from a process-wide pool instead of binding a new port
//! for every test.
//!
//! Only default-configured servers live in the pool: anything built through
//! [`MockApiBuilder`](crate::MockApiBuilder) gets a dedicated server. A server coming back to
//! the pool is reset - expectations, recorded requests, pending failures, filtered headers -
//! and discarded if its background thread is gone.
use crate::mock_server::bare_server::BareMockServer;
use crate::MockApi;
use deadpool::managed::{Manager, Metrics, Object, Pool, RecycleError, RecycleResult};
use log::debug;
use once_cell::sync::Lazy;
use std::convert::Infallible;

/// Tests never wait for a server to be returned: the cap only bounds how many idle servers
/// (and open ports) we keep around.
const MAX_POOLED_SERVERS: usize = 1000;

static SERVER_POOL: Lazy<Pool<ServerRecycler>> = Lazy::new(|| {
    Pool::builder(ServerRecycler)
        .max_size(MAX_POOLED_SERVERS)
        .build()
        .expect("A pool without timeouts can always be built")
});

pub(crate) type PooledMockServer = Object<ServerRecycler>;

/// Borrow a default-configured server.
pub(crate) async fn get_pooled_mock_server() -> PooledMockServer {
    SERVER_POOL
        .get()
        .await
        .expect("Creating a mock API server cannot fail")
}

#[derive(Debug)]
pub(crate) struct ServerRecycler;

impl Manager for ServerRecycler {
    type Type = BareMockServer;
    type Error = Infallible;

    async fn create(&self) -> Result<BareMockServer, Infallible> {
        Ok(MockApi::builder().build_bare().await)
    }

    async fn recycle(
        &self,
        server: &mut BareMockServer,
        _metrics: &Metrics,
    ) -> RecycleResult<Infallible> {
        if !server.is_running() {
            debug!("Discarding pooled mock API server {}: it stopped.", server.address());
            return Err(RecycleError::message("the mock API server stopped"));
        }
        server.reset().await;
        Ok(())
    }
}
