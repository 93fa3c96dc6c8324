// src/exec/output.rs

//! Consumers for child process output.
//!
//! Child pipes must always be drained or the child blocks once the OS
//! buffer fills up.

use std::collections::VecDeque;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read the next line, decoding invalid UTF-8 lossily. `None` at EOF.
///
/// Read errors are logged and skipped; the pipe keeps being drained so the
/// child never sees a closed reader.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>, source: &str, stream: &str) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        buf.clear();
        match reader.read_until(b'\n', buf).await {
            Ok(0) => return None,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                return Some(String::from_utf8_lossy(buf).into_owned());
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(source, stream, error = %e, "failed to read child output");
                // A persistent error would spin; give up once nothing is buffered.
                if reader.fill_buf().await.map(|b| b.is_empty()).unwrap_or(true) {
                    return None;
                }
            }
        }
    }
}

/// Log level used when relaying child output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayLevel {
    Debug,
    Info,
    Warn,
}

/// Relay every line of `reader` to the log under `source`.
pub fn relay_lines<R>(reader: R, source: String, stream: &'static str, level: RelayLevel) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        while let Some(line) = next_line(&mut reader, &mut buf, &source, stream).await {
            match level {
                RelayLevel::Debug => debug!(source = %source, stream, "{}", line),
                RelayLevel::Info => info!(source = %source, stream, "{}", line),
                RelayLevel::Warn => warn!(source = %source, stream, "{}", line),
            }
        }
        debug!(source = %source, stream, "output stream closed");
    })
}

/// Relay lines at debug level and keep the last `keep` of them, for error
/// messages.
pub fn collect_tail<R>(reader: R, source: String, keep: usize) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(keep);
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        while let Some(line) = next_line(&mut reader, &mut buf, &source, "stderr").await {
            debug!(source = %source, stream = "stderr", "{}", line);
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect()
    })
}

/// Await a tail collector and join its lines, tolerating a panicked task.
pub async fn join_tail(handle: Option<JoinHandle<Vec<String>>>) -> String {
    match handle {
        Some(h) => h.await.unwrap_or_default().join("\n"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_utf8_does_not_stop_the_relay() {
        let input: &[u8] = b"first\nbad \xff byte\r\nlast line";
        let tail = collect_tail(input, "test".to_string(), 10).await.unwrap();
        assert_eq!(tail, vec!["first", "bad \u{fffd} byte", "last line"]);
    }

    #[tokio::test]
    async fn tail_keeps_only_the_last_lines() {
        let input: &[u8] = b"1\n2\n3\n4\n";
        let tail = collect_tail(input, "test".to_string(), 2).await.unwrap();
        assert_eq!(tail, vec!["3", "4"]);
    }
}
