// Line reader over the sensor's serial link
use crate::infrastructure::config::SerialConfig;
use async_stream::stream;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_serial::SerialPortBuilderExt;

/// Port value that selects stdin, for replaying a captured serial log
pub const STDIN_PORT: &str = "-";

/// Lines from the configured serial port, reopening it whenever it fails or closes.
///
/// Never ends for a real port: open and read errors are logged and retried
/// after `reconnect_delay`. With [`STDIN_PORT`] the stream ends at EOF.
pub fn serial_lines(config: SerialConfig) -> impl Stream<Item = String> + Send + 'static {
    stream! {
        if config.port == STDIN_PORT {
            tracing::info!("Reading sensor lines from stdin");
            let lines = read_lines(tokio::io::stdin());
            futures::pin_mut!(lines);
            while let Some(line) = lines.next().await {
                yield line;
            }
            return;
        }

        loop {
            tracing::info!(
                port = %config.port,
                baud_rate = config.baud_rate,
                "Connecting to serial port"
            );

            match tokio_serial::new(&config.port, config.baud_rate).open_native_async() {
                Ok(port) => {
                    tracing::info!(port = %config.port, "Serial port opened");
                    let lines = read_lines(port);
                    futures::pin_mut!(lines);
                    while let Some(line) = lines.next().await {
                        yield line;
                    }
                    tracing::warn!(port = %config.port, "Serial connection closed");
                }
                Err(e) => {
                    tracing::error!(port = %config.port, error = %e, "Serial error");
                }
            }

            tokio::time::sleep(config.reconnect_delay).await;
        }
    }
}

/// Longest frame accepted from the sensor. Real frames are well under 64 bytes,
/// anything longer is noise from a baud mismatch or a stuck line.
pub const MAX_LINE_BYTES: usize = 1024;

/// Split a byte stream on `\n` into trimmed, non-blank lines.
///
/// Invalid UTF-8 is replaced rather than dropping the connection. Lines over
/// [`MAX_LINE_BYTES`] are discarded up to the next newline. The stream ends at
/// EOF or on the first read error.
pub fn read_lines<R>(reader: R) -> impl Stream<Item = String> + Send + 'static
where
    R: AsyncRead + Send + 'static,
{
    read_lines_capped(reader, MAX_LINE_BYTES)
}

fn read_lines_capped<R>(reader: R, max_len: usize) -> impl Stream<Item = String> + Send + 'static
where
    R: AsyncRead + Send + 'static,
{
    stream! {
        let mut reader = BufReader::new(Box::pin(reader));
        let mut line: Vec<u8> = Vec::with_capacity(64);
        let mut overlong = false;

        loop {
            let (consumed, complete) = match reader.fill_buf().await {
                Ok([]) => break,
                Ok(chunk) => {
                    let newline = chunk.iter().position(|b| *b == b'\n');
                    let end = newline.unwrap_or(chunk.len());
                    if !overlong {
                        line.extend_from_slice(&chunk[..end.min(max_len + 1 - line.len())]);
                    }
                    (newline.map_or(end, |i| i + 1), newline.is_some())
                }
                Err(e) => {
                    tracing::error!(error = %e, "Serial read failed");
                    break;
                }
            };
            reader.consume(consumed);

            if !overlong && line.len() > max_len {
                tracing::warn!(max_len, "Discarding overlong serial line");
                overlong = true;
                line.clear();
            }

            if complete {
                let text = String::from_utf8_lossy(&line).trim().to_string();
                line.clear();
                if std::mem::take(&mut overlong) || text.is_empty() {
                    continue;
                }
                yield text;
            }
        }

        if !overlong {
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                yield text;
            }
        }
    }
}
