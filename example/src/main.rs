use anyhow::{Context, Result};
use clap::Parser;
use minws::{
    websocket::status_text, Connection, ConnectionState, HttpRequest, OpCode, Server,
    ServerConfig, WsConfig,
};
use std::{
    net::TcpStream,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

/// Websocket echo server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "MINWS_ADDR", default_value = "127.0.0.1:5001")]
    addr: String,

    /// Log level (trace, debug, info, warn, error), `RUST_LOG` takes precedence
    #[arg(short, long, env = "MINWS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Drop connections that stay silent for this long
    #[arg(long, env = "MINWS_READ_TIMEOUT_SECS")]
    read_timeout_secs: Option<u64>,

    /// Largest frame payload accepted from a client, in bytes
    #[arg(long, env = "MINWS_MAX_PAYLOAD_LEN")]
    max_payload_len: Option<u64>,

    /// Accept frames from clients that didn't mask them
    #[arg(long)]
    allow_unmasked: bool,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut ws = WsConfig::default().require_masked_frames(!self.allow_unmasked);
        if let Some(max) = self.max_payload_len {
            ws = ws.max_payload_len(max);
        }

        ServerConfig::default()
            .read_timeout(self.read_timeout_secs.map(Duration::from_secs))
            .ws(ws)
    }
}

struct State {
    messages: AtomicU64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();

    let config = args.server_config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        ?config,
        "starting echo server"
    );

    let server = Server::new(
        State {
            messages: AtomicU64::new(0),
        },
        echo,
    )
    .with_config(config);

    server
        .start(args.addr.as_str())
        .with_context(|| format!("Failed to serve on {}", args.addr))
}

fn echo(state: Arc<State>, req: &HttpRequest, mut conn: Connection<TcpStream>) {
    info!(uri = %req.uri, "websocket connected");

    while conn.state() != ConnectionState::Closed {
        let frame = match conn.read_message() {
            Ok(frame) => frame,
            Err(err) => {
                if err.is_fatal() {
                    debug!(error = %err, "connection lost");
                } else {
                    warn!(error = %err, "read failed");
                }
                break;
            }
        };

        let count = state.messages.fetch_add(1, Ordering::Relaxed) + 1;

        let sent = match frame.opcode {
            OpCode::Text => {
                let msg = String::from_utf8_lossy(frame.payload());
                info!(count, %msg, "text message");
                conn.send_text(&format!("echoed: {msg}"))
            }
            OpCode::Binary => {
                info!(count, len = frame.payload_len(), "binary message");
                let mut reply = Vec::with_capacity(frame.payload().len() + 1);
                reply.push(0x01);
                reply.extend_from_slice(frame.payload());

                conn.send_binary(&reply).and_then(|_| conn.close())
            }
            OpCode::Close => {
                let code = frame.close_code();
                info!(
                    count,
                    code,
                    reason = code.and_then(status_text),
                    "client closed the connection"
                );
                Ok(())
            }
            OpCode::Ping => {
                debug!(count, "ping");
                Ok(())
            }
            OpCode::Pong => {
                debug!(count, "pong");
                Ok(())
            }
            opcode => {
                warn!(count, %opcode, "unsupported opcode");
                Ok(())
            }
        };

        if let Err(err) = sent {
            warn!(error = %err, "failed to answer");
            break;
        }
    }

    if let Err(err) = conn.close() {
        debug!(error = %err, "close on exit failed");
    }
    info!(uri = %req.uri, "websocket disconnected");
}
