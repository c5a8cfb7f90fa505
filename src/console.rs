//! Console driver — reads lines, answers each through the pipeline, writes
//! the reply.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C) or input is closed.
//! Generic over reader/writer so tests can drive it from in-memory buffers.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::pipeline::{ChatResponse, ResponsePipeline};

/// How replies are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `[<messageType>] <content>`
    #[default]
    Text,
    /// The `ChatResponse` as one line of JSON.
    Json,
}

pub fn render(response: &ChatResponse, format: OutputFormat) -> Result<String, AppError> {
    match format {
        OutputFormat::Text => Ok(format!("[{}] {}", response.message_type, response.content)),
        OutputFormat::Json => Ok(serde_json::to_string(response).map_err(std::io::Error::from)?),
    }
}

/// Answer one message and write the rendered reply.
pub async fn answer_once<W: AsyncWrite + Unpin>(
    pipeline: &ResponsePipeline,
    conversation_id: &str,
    message: &str,
    format: OutputFormat,
    output: &mut W,
) -> Result<ChatResponse, AppError> {
    let response = pipeline.respond(conversation_id, message).await;
    let line = render(&response, format)?;
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(response)
}

/// Interactive loop. Blank lines are skipped; every other line gets exactly
/// one reply. Returns the number of messages answered.
pub async fn run_console<R, W>(
    pipeline: &ResponsePipeline,
    conversation_id: &str,
    format: OutputFormat,
    input: R,
    output: &mut W,
    shutdown: CancellationToken,
) -> Result<usize, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(%conversation_id, "console started. Type a question and press Enter. Ctrl-C to quit.");
    let mut lines = input.lines();
    let mut answered = 0usize;

    loop {
        if format == OutputFormat::Text {
            output.write_all(b"> ").await?;
            output.flush().await?;
        }

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console input closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim();
                        if input.is_empty() { continue; }

                        debug!(input_len = input.len(), "console received line");
                        answer_once(pipeline, conversation_id, input, format, output).await?;
                        answered += 1;
                    }
                }
            }
        }
    }

    if format == OutputFormat::Text {
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(answered)
}
