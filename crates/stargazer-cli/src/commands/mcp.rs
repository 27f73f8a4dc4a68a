use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use stargazer_lib::SearchConfig;
use stargazer_mcp::McpServerState;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::select;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::GlobalOptions;

/// Responses queued for the writer before request tasks wait on it.
const RESPONSE_BUFFER: usize = 64;

/// Newline-delimited JSON-RPC frames from a reader.
pub struct FrameReader<R> {
    lines: Lines<R>,
}

impl<R> FrameReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    ///
    /// Cancel-safe: a frame interrupted by another `select!` branch is
    /// picked up by the next call.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .context("failed to read from client")
    }
}

/// Writes one JSON message per line and flushes after each.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// A closed pipe surfaces as an `io::Error` of kind `BrokenPipe`.
    pub async fn send(&mut self, message: &Value) -> Result<()> {
        let mut frame = serde_json::to_vec(message)?;
        frame.push(b'\n');
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

fn is_disconnect(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == ErrorKind::BrokenPipe)
}

/// Drain `responses` into the writer until every sender is gone.
async fn write_responses<W>(writer: W, mut responses: mpsc::Receiver<Value>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = FrameWriter::new(writer);
    while let Some(response) = responses.recv().await {
        if let Err(e) = writer.send(&response).await {
            if is_disconnect(&e) {
                tracing::info!("Client disconnected (broken pipe)");
                return Ok(());
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Answer requests until end of input, a closed pipe or Ctrl-C.
///
/// Every request runs as its own task and responses are written in
/// completion order, so a slow search never holds up a ping or a cache hit.
/// At end of input the requests still running are answered before
/// returning; Ctrl-C aborts them.
pub async fn serve<R, W>(reader: R, writer: W, server: Arc<McpServerState>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tracing::info!("MCP server initialized, waiting for requests...");

    let mut frames = FrameReader::new(reader);
    let (responses, outbox) = mpsc::channel(RESPONSE_BUFFER);
    let mut writer_task = tokio::spawn(write_responses(writer, outbox));
    let mut requests = JoinSet::new();
    let mut reading = true;

    while reading || !requests.is_empty() {
        select! {
            _ = signal::ctrl_c() => {
                tracing::info!(
                    in_flight = requests.len(),
                    "Received shutdown signal, exiting gracefully"
                );
                requests.abort_all();
                break;
            }
            frame = frames.next_frame(), if reading => match frame {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let server = Arc::clone(&server);
                    let responses = responses.clone();
                    requests.spawn(async move {
                        if let Some(response) = server.handle_line(&line).await {
                            // A closed channel means the writer is gone.
                            let _ = responses.send(response).await;
                        }
                    });
                }
                Ok(None) => {
                    tracing::info!(in_flight = requests.len(), "Client disconnected (EOF)");
                    reading = false;
                }
                Err(e) => {
                    tracing::error!(error = %e, "transport error");
                    requests.abort_all();
                    return Err(e);
                }
            },
            Some(joined) = requests.join_next() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(error = %e, "request handler panicked");
                    }
                }
            }
            written = &mut writer_task => {
                requests.abort_all();
                return written.context("response writer failed")?;
            }
        }
    }

    drop(responses);
    writer_task.await.context("response writer failed")?
}

/// Load the dataset and serve MCP over stdio.
pub async fn run_mcp_server(global: &GlobalOptions) -> Result<()> {
    let paths = global.dataset_paths();
    tracing::info!(
        dem = ?paths.dem,
        roads = ?paths.roads,
        light = ?paths.light,
        "Resolving dataset..."
    );

    let server = McpServerState::load(&paths, SearchConfig::from_env())
        .context("Failed to initialize MCP server state")?;
    let server = Arc::new(server);

    let outcome = serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        Arc::clone(&server),
    )
    .await;
    server.shutdown();
    tracing::info!("Shutdown complete");
    outcome
}
