//! Loopback TCP server: one thread per connection, one JSON object per line.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, bounded, select};
use serde::Serialize;

use crate::error::RpcError;
use crate::model::AliasEvent;
use crate::rpc::{METHOD_SUBSCRIBE, Notification, Request, Response, RpcContext, handle};

pub struct ServerHandle {
    local_addr: SocketAddr,
    thread: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until the accept loop exits (it normally never does).
    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!("RPC accept loop panicked");
        }
    }
}

/// Bind `address` (must be loopback) and serve on a background thread.
pub fn spawn(ctx: Arc<RpcContext>, address: &str) -> Result<ServerHandle> {
    let addr = address
        .to_socket_addrs()
        .with_context(|| format!("invalid rpc address {}", address))?
        .next()
        .with_context(|| format!("rpc address {} resolved to nothing", address))?;
    if !addr.ip().is_loopback() {
        bail!("rpc address {} is not a loopback address", address);
    }

    let listener =
        TcpListener::bind(addr).with_context(|| format!("failed to bind rpc socket {}", addr))?;
    let local_addr = listener.local_addr()?;
    log::info!("RPC listening on {}", local_addr);

    let thread = thread::Builder::new()
        .name("rpc-accept".into())
        .spawn(move || accept_loop(listener, ctx))
        .context("failed to start rpc thread")?;

    Ok(ServerHandle { local_addr, thread })
}

fn accept_loop(listener: TcpListener, ctx: Arc<RpcContext>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let ctx = ctx.clone();
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "?".into());
                let spawned = thread::Builder::new()
                    .name(format!("rpc-{}", peer))
                    .spawn(move || {
                        if let Err(e) = handle_connection(stream, &ctx) {
                            log::debug!("RPC connection {} closed: {:#}", peer, e);
                        }
                    });
                if let Err(e) = spawned {
                    log::error!("Failed to start connection thread: {}", e);
                }
            }
            Err(e) => log::warn!("RPC accept error: {}", e),
        }
    }
}

type SharedWriter = Arc<Mutex<TcpStream>>;

fn write_line<T: Serialize>(writer: &SharedWriter, message: &T) -> Result<()> {
    let mut line = serde_json::to_vec(message).context("failed to serialize message")?;
    line.push(b'\n');
    // Whole lines under the lock so responses and notifications never interleave.
    let mut stream = writer.lock().unwrap_or_else(PoisonError::into_inner);
    stream.write_all(&line).context("failed to write message")?;
    stream.flush().context("failed to flush message")?;
    Ok(())
}

fn handle_connection(stream: TcpStream, ctx: &RpcContext) -> Result<()> {
    let reader = BufReader::new(stream.try_clone().context("failed to clone rpc stream")?);
    let writer: SharedWriter = Arc::new(Mutex::new(stream));

    // Dropped when this function returns, which stops the forwarder.
    let (closed_tx, closed_rx) = bounded::<()>(0);
    let mut forwarding = false;

    for line in reader.lines() {
        let line = line.context("failed reading rpc request")?;
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                let error = RpcError::bad_request(format!("invalid request JSON: {}", e));
                write_line(&writer, &Response::err(0, error))?;
                continue;
            }
        };

        // Subscribe before acknowledging so no event slips between the two.
        if request.method == METHOD_SUBSCRIBE && !forwarding {
            let events = ctx.service.subscribe();
            let writer = writer.clone();
            let closed = closed_rx.clone();
            thread::Builder::new()
                .name("rpc-notify".into())
                .spawn(move || forward_events(events, closed, writer))
                .context("failed to start notification thread")?;
            forwarding = true;
        }

        let response = handle(ctx, &request);
        write_line(&writer, &response)?;
    }

    drop(closed_tx);
    Ok(())
}

fn forward_events(events: Receiver<AliasEvent>, closed: Receiver<()>, writer: SharedWriter) {
    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { return };
                if let Err(e) = write_line(&writer, &Notification::from(&event)) {
                    log::debug!("Dropping subscriber: {:#}", e);
                    return;
                }
            }
            recv(closed) -> _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::error::RpcErrorKind;
    use crate::rpc::tests::context;

    fn start() -> (tempfile::TempDir, Arc<RpcContext>, SocketAddr) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(context(&dir, false));
        let handle = spawn(ctx.clone(), "127.0.0.1:0").unwrap();
        (dir, ctx, handle.local_addr())
    }

    fn read_json(reader: &mut BufReader<TcpStream>) -> Value {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[test]
    fn refuses_non_loopback_address() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(context(&dir, false));
        assert!(spawn(ctx, "0.0.0.0:0").is_err());
    }

    #[test]
    fn malformed_line_gets_bad_request_and_connection_survives() {
        let (_dir, _ctx, addr) = start();
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);

        writer.write_all(b"{not json\n").unwrap();
        let response: Response = serde_json::from_value(read_json(&mut reader)).unwrap();
        assert_eq!(response.id, 0);
        assert_eq!(response.error.unwrap().kind, RpcErrorKind::BadRequest);

        writer
            .write_all(b"{\"id\":2,\"method\":\"getAliases\"}\n")
            .unwrap();
        assert_eq!(read_json(&mut reader), json!({ "id": 2, "result": [] }));
    }

    #[test]
    fn subscriber_receives_alias_changes() {
        let (_dir, ctx, addr) = start();
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);

        writer
            .write_all(b"{\"id\":1,\"method\":\"subscribe\"}\n")
            .unwrap();
        assert_eq!(read_json(&mut reader), json!({ "id": 1, "result": true }));

        ctx.service
            .add_alias(crate::model::NewAlias {
                key: "gg".into(),
                action_kind: crate::model::ActionKind::RunCommand,
                target: "echo hi".into(),
                comment: None,
            })
            .unwrap();

        let notification = read_json(&mut reader);
        assert_eq!(notification["event"], "aliasesChanged");
        assert_eq!(notification["data"][0]["key"], "gg");
    }
}
