// ABOUTME: Consumption of streamed build/push/pull output.
// ABOUTME: Splits log chunks into lines for a sink and accumulates in-stream errors.

use futures::StreamExt;

use super::traits::{ProgressChunk, ProgressStream};

/// Drain a progress stream, passing every log line to `sink`.
///
/// Resolves when the stream ends. Any error chunk makes the whole operation
/// fail with the accumulated error text, but the stream is still read to the
/// end so the sink sees everything the engine sent. A transport error stops
/// reading immediately.
pub async fn drain_progress<F>(mut stream: ProgressStream, mut sink: F) -> Result<(), String>
where
    F: FnMut(&str),
{
    let mut errors: Vec<String> = Vec::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(ProgressChunk::Log(text)) => {
                for line in text.lines() {
                    let line = line.trim_end();
                    if !line.is_empty() {
                        sink(line);
                    }
                }
            }
            Ok(ProgressChunk::Error(message)) => {
                let message = message.trim().to_string();
                sink(&message);
                errors.push(message);
            }
            Err(transport) => {
                errors.push(transport);
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("\n"))
    }
}
