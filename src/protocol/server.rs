use std::{
    io::{Read, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    command::{CommandError, dispatch},
    config::{ListenMode, ServerConfig},
    job::{JobRunner, WorkflowRunner},
    protocol::{ProtocolTransport, Response, thread::DEFAULT_WORKERS},
};

use super::{
    ThreadPool,
    listener::{Connection, Listener, loopback_for},
    transport::TransportError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to listen on {endpoint}: {source}")]
    Bind {
        endpoint: ListenMode,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Stops a running [`Server`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    wake: ListenMode,
}

impl ShutdownHandle {
    /// Ask the accept loop to return. Connections already queued are still served.
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);

        // accept() only returns on a connection, so dial in to unblock it.
        if let Err(e) = Connection::connect(&self.wake) {
            warn!("failed to wake listener at {}: {e}", self.wake);
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Accept loop feeding one-shot request handlers to a worker pool.
pub struct Server {
    listener: Listener,
    endpoint: ListenMode,
    runner: Arc<dyn JobRunner>,
    send_response: bool,
    shutdown: ShutdownHandle,
    pool: ThreadPool,
}

impl Server {
    /// Bind using the configured workflow script as the job runner.
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        Self::with_runner(config, Arc::new(WorkflowRunner::new(config)), DEFAULT_WORKERS)
    }

    pub fn with_runner(
        config: &ServerConfig,
        runner: Arc<dyn JobRunner>,
        workers: usize,
    ) -> Result<Self, ServerError> {
        let bind_err = |source: std::io::Error| ServerError::Bind {
            endpoint: config.listen.clone(),
            source,
        };
        let listener = Listener::bind(&config.listen).map_err(bind_err)?;
        let endpoint = listener.local_endpoint().map_err(bind_err)?;

        Ok(Self {
            shutdown: ShutdownHandle {
                requested: Arc::new(AtomicBool::new(false)),
                wake: loopback_for(&endpoint),
            },
            listener,
            endpoint,
            runner,
            send_response: config.send_response,
            pool: ThreadPool::new(workers),
        })
    }

    /// The bound endpoint; an ephemeral TCP port is resolved.
    pub fn endpoint(&self) -> &ListenMode {
        &self.endpoint
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shut down, then drain the queued ones.
    ///
    /// The connection that observes the shutdown request is still queued; it is
    /// either a real client or the wake-up dial, which fails its read harmlessly.
    pub fn listen(self) {
        info!(
            "listening at {} with {} workers",
            self.endpoint,
            self.pool.size()
        );

        loop {
            let accepted = self.listener.accept();
            let stopping = self.shutdown.is_triggered();

            match accepted {
                Ok(stream) => {
                    let runner = Arc::clone(&self.runner);
                    let send_response = self.send_response;
                    let queued = self.pool.execute(move || {
                        handle_connection(stream, runner.as_ref(), send_response);
                    });
                    if let Err(e) = queued {
                        warn!("dropping connection: {e}");
                    }
                }
                Err(e) => warn!("broken connection: {e:?}"),
            }

            if stopping {
                info!("shutdown requested, draining queued connections");
                break;
            }
        }
    }
}

/// Serve exactly one request on `stream`, then close it.
///
/// Every failure is logged and answered with [`Response::Fail`] (when replies
/// are enabled); nothing here propagates past the connection.
pub fn handle_connection<T: Read + Write>(
    stream: T,
    runner: &dyn JobRunner,
    send_response: bool,
) -> Response {
    let mut transport = ProtocolTransport::new(stream);

    let result = transport
        .read_request()
        .map_err(ConnectionError::from)
        .and_then(|req| {
            info!("received request: {req:?}");
            Ok(dispatch(&req, runner)?)
        });

    match &result {
        Ok(command) => info!("handled {} request", command.kind().name()),
        Err(e) => warn!("rejected request: {e}"),
    }

    let resp = Response::from(&result);
    if send_response {
        if let Err(e) = transport.write_response(resp) {
            warn!("failed to write response: {e}");
        }
    }

    debug!("closing connection");
    resp
}
