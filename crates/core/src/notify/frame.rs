use crate::domain::notification::Notification;
use anyhow::Context;

/// Largest unterminated event block the decoder will hold.
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum PushFrame {
    Connected,
    Heartbeat,
    /// Any other control line; ignored by consumers.
    Comment(String),
    Notification(Notification),
}

/// Classifies one push payload. Control frames start with `:`; everything else
/// must be a JSON-encoded notification.
pub fn parse_frame(payload: &str) -> anyhow::Result<PushFrame> {
    let trimmed = payload.trim();
    if let Some(control) = trimmed.strip_prefix(':') {
        return Ok(match control.trim() {
            "connected" => PushFrame::Connected,
            "heartbeat" => PushFrame::Heartbeat,
            other => PushFrame::Comment(other.to_string()),
        });
    }

    let notification = serde_json::from_str::<Notification>(trimmed)
        .with_context(|| format!("push frame is not a notification: {trimmed}"))?;
    Ok(PushFrame::Notification(notification))
}

/// Incremental `text/event-stream` splitter.
///
/// Bytes go in as they arrive; complete event blocks (terminated by a blank
/// line) come out as payload strings. A block with `data:` lines yields the
/// joined data; a block made only of comments yields its first comment line
/// verbatim (e.g. `:heartbeat`), so `parse_frame` can classify it.
///
/// Fails once more than [`MAX_PENDING_BYTES`] accumulate without a
/// terminator; the buffered bytes are dropped and the stream should be closed.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buf: Vec<u8>,
    // Prefix of `buf` already known not to contain a terminator.
    scanned: usize,
}

impl EventStreamDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> anyhow::Result<Vec<String>> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut out = Vec::new();
        loop {
            // Back up one byte so a terminator split across chunks is found.
            let from = self.scanned.saturating_sub(1);
            let Some(rel) = self.buf[from..].windows(2).position(|w| w == b"\n\n") else {
                self.scanned = self.buf.len();
                break;
            };
            let end = from + rel;
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            self.scanned = 0;
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(payload) = block_payload(&text) {
                out.push(payload);
            }
        }

        if self.buf.len() > MAX_PENDING_BYTES {
            let pending = self.buf.len();
            self.buf = Vec::new();
            self.scanned = 0;
            anyhow::bail!(
                "event block exceeds {MAX_PENDING_BYTES} bytes without a terminator ({pending} pending)"
            );
        }
        Ok(out)
    }

    #[cfg(test)]
    fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

fn block_payload(block: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();
    let mut first_comment: Option<&str> = None;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.starts_with(':') && first_comment.is_none() {
            first_comment = Some(line);
        }
        // `event:`, `id:` and `retry:` fields carry nothing we use.
    }

    if !data.is_empty() {
        return Some(data.join("\n"));
    }
    first_comment.map(str::to_string)
}
