//! TCP listener spawning one thread per connection.

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use doculite_engine::Engine;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::dispatch::Dispatcher;
use crate::error::{ServerError, ServerResult};

/// The DocuLite TCP server.
///
/// Every accepted connection owns its socket and runs an independent
/// blocking request loop on its own thread; the engine is shared behind
/// the dispatcher.
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Binds the listener and builds the dispatch table.
    pub fn new(config: ServerConfig, engine: Engine) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).map_err(|e| ServerError::BindFailed {
            addr: config.bind_addr,
            source: e,
        })?;
        info!(addr = %config.bind_addr, "server listening");

        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(engine)),
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever. Accept errors are logged and do not
    /// stop the loop.
    pub fn run(&self) -> ServerResult<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    thread::spawn(move || {
                        if let Err(e) = Connection::new(stream, dispatcher).serve() {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
        Ok(())
    }
}
