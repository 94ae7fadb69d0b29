//! Host wire protocol
//!
//! One JSON object per line: inputs arrive on the reader, frames leave on
//! the writer. `ready` is emitted exactly once before the first input is
//! accepted. A malformed line costs the host one error frame, nothing more;
//! a failed turn likewise. EOF ends the loop cleanly.

use komatachi_agent::{Agent, AgentError};
use komatachi_core::ModelClient;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Frames the host sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostFrame {
    Input { text: String },
}

/// Frames the agent emits.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentFrame {
    Ready,
    Output { text: String },
    Error { message: String },
}

impl AgentFrame {
    pub fn turn_error(err: &AgentError) -> Self {
        Self::Error {
            message: format!("{}: {}", err.kind(), err),
        }
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &AgentFrame,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

/// Serve turns until EOF.
pub async fn serve<M, R, W>(agent: &mut Agent<M>, reader: R, mut writer: W) -> std::io::Result<()>
where
    M: ModelClient + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_frame(&mut writer, &AgentFrame::Ready).await?;

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let frame: HostFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                write_frame(
                    &mut writer,
                    &AgentFrame::Error {
                        message: format!("malformed input: {err}"),
                    },
                )
                .await?;
                continue;
            }
        };

        let HostFrame::Input { text } = frame;
        match agent.process_turn(&text).await {
            Ok(text) => write_frame(&mut writer, &AgentFrame::Output { text }).await?,
            Err(err) => {
                tracing::error!(kind = err.kind(), error = %err, "turn failed");
                write_frame(&mut writer, &AgentFrame::turn_error(&err)).await?;
            }
        }
    }
    Ok(())
}
