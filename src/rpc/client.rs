//! Blocking client for the RPC server, used by the CLI.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::rpc::{Notification, Request, Response};

const IO_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    next_id: u64,
    pending: VecDeque<Notification>,
}

impl Client {
    pub fn connect(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .with_context(|| format!("failed to connect to {} (is `spaceboot run` up?)", address))?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        let writer = stream.try_clone().context("failed to clone rpc stream")?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            next_id: 1,
            pending: VecDeque::new(),
        })
    }

    /// Send one request and wait for its response. Notifications arriving in
    /// between are queued for `next_notification`.
    pub fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request {
            id,
            method: method.to_string(),
            params,
        };
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        self.writer.write_all(&line).context("failed to send request")?;

        loop {
            let value = self.read_message()?;
            if value.get("event").is_some() {
                let notification =
                    serde_json::from_value(value).context("malformed notification")?;
                self.pending.push_back(notification);
                continue;
            }
            let response: Response =
                serde_json::from_value(value).context("malformed rpc response")?;
            if response.id != id {
                log::debug!("Ignoring response #{} while waiting for #{}", response.id, id);
                continue;
            }
            return response
                .into_result()
                .map_err(|e| anyhow!("{} ({:?})", e.message, e.kind));
        }
    }

    /// Block until the next notification. Only useful after `subscribe`.
    pub fn next_notification(&mut self) -> Result<Notification> {
        if let Some(notification) = self.pending.pop_front() {
            return Ok(notification);
        }
        loop {
            let value = self.read_message()?;
            if value.get("event").is_some() {
                return serde_json::from_value(value).context("malformed notification");
            }
        }
    }

    fn read_message(&mut self) -> Result<Value> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("failed to read from rpc server")?;
        if read == 0 {
            return Err(anyhow!("rpc server closed the connection"));
        }
        serde_json::from_str(&line).context("rpc server sent invalid JSON")
    }
}

/// One-shot request on a fresh connection.
pub fn call(address: &str, method: &str, params: Value) -> Result<Value> {
    Client::connect(address)?.call(method, params)
}
