use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::host::{EventReceiver, Host};
use crate::protocol::messages::{InboundCommand, OutboundEvent};

/// Maximum accepted command line: 1 MiB.
const MAX_LINE_SIZE: usize = 1_048_576;

/// One frame read from the command stream.
#[derive(Debug, PartialEq, Eq)]
enum CommandFrame {
    Line(String),
    /// A line longer than [`MAX_LINE_SIZE`]; its bytes were discarded.
    Oversized,
}

/// Newline-delimited commands with a bounded line length.
///
/// An oversized line becomes [`CommandFrame::Oversized`] instead of
/// ending the stream; the codec skips ahead to the next newline.
struct CommandCodec {
    lines: LinesCodec,
}

impl CommandCodec {
    fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_SIZE),
        }
    }

    fn frame(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<CommandFrame>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(CommandFrame::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(CommandFrame::Oversized)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for CommandCodec {
    type Item = CommandFrame;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<CommandFrame>, LinesCodecError> {
        Self::frame(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<CommandFrame>, LinesCodecError> {
        Self::frame(self.lines.decode_eof(buf))
    }
}

/// Run the NDJSON loop over an arbitrary async reader/writer.
///
/// Commands from `reader` (one per line) are applied to `host`; engine
/// events from `events` are written to `writer` as they arrive. The loop
/// exits when the reader reaches EOF, the cancellation token is triggered,
/// or an I/O error occurs.
pub async fn run_transport_loop<R, W>(
    reader: R,
    writer: &mut W,
    host: &mut Host,
    events: &mut EventReceiver,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWriteExt + Unpin,
{
    // Partial lines stay buffered in the codec while events are written.
    let mut commands = FramedRead::new(reader, CommandCodec::new());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Shutdown signal received, exiting transport loop");
                break;
            }

            frame = commands.next() => {
                let Some(frame) = frame else {
                    debug!("Reader closed (EOF), exiting transport loop");
                    break;
                };

                let reply = match frame? {
                    CommandFrame::Line(line) => handle_line(line.trim(), host),
                    CommandFrame::Oversized => {
                        warn!("Command exceeds 1 MiB limit");
                        Some(OutboundEvent::error("Command exceeds 1 MiB size limit"))
                    }
                };
                if let Some(reply) = reply {
                    write_json(writer, &reply).await?;
                }
            }

            Some(event) = events.recv() => {
                write_json(writer, &event).await?;
            }
        }
    }

    Ok(())
}

/// Apply one command line, returning the reply to send (if any).
fn handle_line(line: &str, host: &mut Host) -> Option<OutboundEvent> {
    if line.is_empty() {
        return None;
    }

    debug!("Received: {line}");
    match serde_json::from_str::<InboundCommand>(line) {
        Ok(command) => Some(host.apply(command)),
        Err(e) => {
            warn!("Failed to parse command: {e}");
            Some(OutboundEvent::error(format!("Parse error: {e}")))
        }
    }
}

/// Write a value as one NDJSON line and flush.
pub async fn write_json<W, T>(writer: &mut W, value: &T) -> anyhow::Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: serde::Serialize,
{
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use termsampler_core::config::EngineConfig;
    use termsampler_core::session::Environment;

    use super::*;

    fn idle_host() -> (Host, EventReceiver) {
        Host::start(&EngineConfig::default(), Environment::new())
    }

    fn lines(buf: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(buf)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn write_json_appends_newline() {
        let mut buf: Vec<u8> = Vec::new();
        write_json(&mut buf, &OutboundEvent::Paused { paused: true })
            .await
            .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(output, "{\"event\":\"paused\",\"paused\":true}\n");
    }

    #[tokio::test]
    async fn commands_are_applied_until_eof() {
        let (mut host, mut events) = idle_host();
        let input = b"{\"command\":\"pause\"}\n\n{\"command\":\"toggle\"}\n";
        let mut output: Vec<u8> = Vec::new();

        run_transport_loop(
            &input[..],
            &mut output,
            &mut host,
            &mut events,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let replies = lines(&output);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["paused"], true);
        assert_eq!(replies[1]["paused"], false);
        assert!(!host.is_paused());
        host.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_command_gets_error_reply() {
        let (mut host, mut events) = idle_host();
        let input = b"not json\n{\"command\":\"reboot\"}\n";
        let mut output: Vec<u8> = Vec::new();

        run_transport_loop(
            &input[..],
            &mut output,
            &mut host,
            &mut events,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let replies = lines(&output);
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r["event"] == "error"));
        host.shutdown().await;
    }

    #[tokio::test]
    async fn engine_events_are_streamed() {
        let config = EngineConfig::from_json(
            r#"{"components":[{"title":"T","rate-ms":5000,"items":[{"sample":"echo 7"}]}]}"#,
        )
        .unwrap();
        let (mut host, mut events) = Host::start(&config, Environment::new());

        // A reader that never yields keeps the loop alive until cancelled.
        let (client, server) = tokio::io::duplex(64);
        let mut output: Vec<u8> = Vec::new();
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        run_transport_loop(server, &mut output, &mut host, &mut events, shutdown)
            .await
            .unwrap();
        drop(client);

        let streamed = lines(&output);
        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0]["event"], "sample");
        assert_eq!(streamed[0]["value"], "7");
        assert_eq!(streamed[0]["numeric"], 7.0);
        host.shutdown().await;
    }

    #[tokio::test]
    async fn oversized_command_is_rejected_and_reading_continues() {
        let (mut host, mut events) = idle_host();
        let mut input = vec![b'x'; MAX_LINE_SIZE + 10];
        input.extend_from_slice(b"\n{\"command\":\"pause\"}\n");
        let mut output: Vec<u8> = Vec::new();

        run_transport_loop(
            &input[..],
            &mut output,
            &mut host,
            &mut events,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let replies = lines(&output);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["event"], "error");
        assert_eq!(replies[1]["event"], "paused");
        assert_eq!(replies[1]["paused"], true);
        host.shutdown().await;
    }

    #[tokio::test]
    async fn command_split_across_writes_survives_streaming() {
        let config = EngineConfig::from_json(
            r#"{"components":[{"title":"T","rate-ms":20,"items":[{"sample":"echo 1"}]}]}"#,
        )
        .unwrap();
        let (mut host, mut events) = Host::start(&config, Environment::new());

        let (mut client, server) = tokio::io::duplex(1024);
        let mut output: Vec<u8> = Vec::new();
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        let client_task = tokio::spawn(async move {
            client.write_all(b"{\"command\":").await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            client.write_all(b"\"pause\"}\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
            client
        });

        run_transport_loop(server, &mut output, &mut host, &mut events, shutdown)
            .await
            .unwrap();
        drop(client_task.await.unwrap());

        let replies = lines(&output);
        assert!(
            replies.iter().all(|r| r["event"] != "error"),
            "replies: {replies:?}"
        );
        let samples = replies.iter().filter(|r| r["event"] == "sample").count();
        assert!(samples >= 2, "samples: {samples}");
        let paused: Vec<_> = replies.iter().filter(|r| r["event"] == "paused").collect();
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0]["paused"], true);
        assert!(host.is_paused());
        host.shutdown().await;
    }
}
