//! Command Bridge TCP Server
//!
//! Operators connect, send one request line, get one response line, and the
//! connection is closed. Requests are serialized: the "trigger radio, wait,
//! format" section runs under an async mutex, so a connection never sees
//! another request's outcome.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use flasher_bridge_protocol::{
    invalid_argument, transmit_failed, unrecognized_command, BridgeCommandSet, BridgeError,
    LineCodec, Request, NO_RESPONSE,
};
use flasher_metrics::metric_defs;
use flasher_radio::RadioError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::{FlasherConfig, RadioConfig, RadioHandle};

/// Handles request lines on behalf of all connections.
pub struct BridgeServer {
    commands: Mutex<BridgeCommandSet>,
    names: Vec<&'static str>,
    radio: RadioHandle,
    timing: RadioConfig,
    settle_delay: Duration,
    read_timeout: Duration,
}

impl BridgeServer {
    pub fn new(config: &FlasherConfig, radio: RadioHandle) -> Self {
        let commands = BridgeCommandSet::new(config.bridge.default_flash_secs);
        BridgeServer {
            names: commands.names(),
            commands: Mutex::new(commands),
            radio,
            timing: config.radio.clone(),
            settle_delay: config.bridge.settle_delay(),
            read_timeout: config.bridge.read_timeout(),
        }
    }

    /// Produce the response line for one request line.
    pub async fn handle_line(&self, line: &str) -> String {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(BridgeError::UnknownCommand { input }) => {
                debug!("unrecognized command: {:?}", input);
                metrics::counter!(metric_defs::BRIDGE_UNKNOWN_COMMANDS.name).increment(1);
                return unrecognized_command(&input, &self.names);
            }
            Err(BridgeError::InvalidArgument { input, token }) => {
                return invalid_argument(&input, &token);
            }
        };

        let command_label = vec![("command", request.name.as_str().to_string())];
        metrics::counter!(metric_defs::BRIDGE_REQUESTS.name, &command_label).increment(1);
        let started = Instant::now();

        let mut commands = self.commands.lock().await;
        let command = commands.get_mut(request.name);
        let action = command.validate(&request.args);
        let budget = self.timing.budget(action).saturating_add(self.settle_delay);
        info!("{} -> {:?} (budget {:?})", request.input, action, budget);

        let reply = match tokio::time::timeout(budget, self.radio.run(action)).await {
            Ok(Ok(message)) => command.format_reply(&message, Utc::now()),
            Ok(Err(RadioError::Transmit(e))) => transmit_failed(&e.0),
            Ok(Err(e)) => {
                warn!("{} failed: {}", request.input, e);
                NO_RESPONSE.to_string()
            }
            Err(_) => {
                warn!("{} timed out after {:?}", request.input, budget);
                NO_RESPONSE.to_string()
            }
        };
        drop(commands);

        if reply == NO_RESPONSE {
            metrics::counter!(metric_defs::BRIDGE_NO_RESPONSE.name, &command_label).increment(1);
        }
        metrics::histogram!(metric_defs::BRIDGE_REQUEST_LATENCY.name, &command_label)
            .record(started.elapsed().as_secs_f64());
        reply
    }

    /// Accept connections until `shutdown` is notified.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: Arc<Notify>,
    ) -> io::Result<()> {
        info!("command bridge listening on {}", listener.local_addr()?);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!("connection from {}", peer);
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            debug!("connection from {} ended: {}", peer, e);
                        }
                    });
                }
                _ = shutdown.notified() => {
                    info!("command bridge shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Read one request, answer it, close.
    async fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let mut codec = LineCodec::new();
        let mut read_buf = [0u8; 1024];

        let line = loop {
            if let Some(line) = codec.decode_line() {
                break Some(line);
            }
            let read = tokio::time::timeout(self.read_timeout, stream.read(&mut read_buf)).await;
            let n = match read {
                Ok(result) => result?,
                // Clients that never send a newline still get an answer.
                Err(_) => break codec.take_remaining(),
            };
            if n == 0 {
                break codec.take_remaining();
            }
            if let Err(e) = codec.push(&read_buf[..n]) {
                stream.write_all(&LineCodec::encode_reply(&e.to_string())).await?;
                return stream.shutdown().await;
            }
        };

        let Some(line) = line else {
            return Ok(());
        };
        let reply = self.handle_line(&line).await;
        stream.write_all(&LineCodec::encode_reply(&reply)).await?;
        stream.flush().await?;
        stream.shutdown().await
    }
}

/// Send one request line to a bridge and return the full response.
pub async fn send_request(addr: &str, line: &str) -> io::Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(&LineCodec::encode_reply(line.trim())).await?;
    stream.flush().await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}
