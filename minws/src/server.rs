use crate::{
    consts::headers::CONNECTION,
    http::{parse_request, write_response, HttpRequest, HttpResponse, StatusCode},
    websocket::{websocket_handshake, Connection, StatusRegistry, WsConfig},
    Error,
};
use std::{
    io,
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

/// Runs on the worker thread once the upgrade went through. The connection is
/// dropped (and the socket with it) when the handler returns.
pub type Handler<State> = fn(Arc<State>, &HttpRequest, Connection<TcpStream>);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// Applied to every accepted socket, covers both the HTTP request and later frames
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub ws: WsConfig,
}

impl ServerConfig {
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn ws(mut self, ws: WsConfig) -> Self {
        self.ws = ws;
        self
    }
}

pub struct Server<State: 'static + Send + Sync> {
    state: Arc<State>,
    handler: Handler<State>,
    config: ServerConfig,
    thread_counter: AtomicU64,
}

impl<State: 'static + Send + Sync> std::fmt::Debug for Server<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("thread_counter", &self.thread_counter)
            .finish_non_exhaustive()
    }
}

impl<State: 'static + Send + Sync> Server<State> {
    pub fn new(state: State, handler: Handler<State>) -> Self {
        Self {
            state: Arc::new(state),
            handler,
            config: ServerConfig::default(),
            thread_counter: AtomicU64::new(0),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn start(&self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        info!(addr = %listener.local_addr()?, "minws server listening");

        self.serve(listener)
    }

    /// Accepts connections until the listener fails. Every connection gets its own thread.
    pub fn serve(&self, listener: TcpListener) -> io::Result<()> {
        let registry = StatusRegistry::global();
        debug!(codes = registry.len(), "close status registry ready");

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    continue;
                }
            };

            let peer = match stream.peer_addr() {
                Ok(peer) => peer,
                Err(err) => {
                    warn!(error = %err, "dropping connection without peer address");
                    continue;
                }
            };

            let state = self.state.clone();
            let handler = self.handler;
            let config = self.config;

            let thread_id = self.thread_counter.fetch_add(1, Ordering::SeqCst);
            std::thread::Builder::new()
                .name(format!("minws worker #{thread_id} for {peer}"))
                .spawn(move || {
                    debug!(%peer, "accepted connection");

                    if let Err(err) = handle_connection(stream, state, handler, config) {
                        warn!(%peer, error = %err, "connection failed before reaching the handler");
                    }
                })?;
        }

        info!("stopping server");
        Ok(())
    }
}

fn handle_connection<State>(
    mut stream: TcpStream,
    state: Arc<State>,
    handler: Handler<State>,
    config: ServerConfig,
) -> Result<(), Error> {
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)?;

    let req = match parse_request(&mut stream) {
        Ok(req) => req,
        Err(err) => {
            let response = HttpResponse::builder(StatusCode::BadRequest)
                .header(CONNECTION, "close".to_owned())
                .text(format!("Error processing HTTP: {err}\n"))
                .build();
            write_response(&mut stream, response)?;

            return Err(err);
        }
    };

    debug!(method = %req.method, uri = %req.uri, "received upgrade request");
    let conn = websocket_handshake(&req, stream, config.ws)?;

    // Actual handler gets run here
    handler(state, &req, conn);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::websocket::{ConnectionState, DataFrame, OpCode};
    use std::{
        io::{Read, Write},
        net::SocketAddr,
    };

    fn echo_upper(_: Arc<()>, _: &HttpRequest, mut conn: Connection<TcpStream>) {
        while conn.state() != ConnectionState::Closed {
            match conn.read_message() {
                Ok(frame) if frame.opcode == OpCode::Text => {
                    let text = String::from_utf8_lossy(frame.payload()).to_uppercase();
                    if conn.send_text(&text).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }

    fn spawn_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let config = ServerConfig::default().read_timeout(Some(Duration::from_secs(5)));
        std::thread::spawn(move || {
            Server::new((), echo_upper)
                .with_config(config)
                .serve(listener)
                .unwrap()
        });

        addr
    }

    fn read_head(stream: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut byte = [0u8];

        while !head.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).unwrap();
            head.push(byte[0]);
        }

        String::from_utf8(head).unwrap()
    }

    #[test]
    fn loopback_echo_and_close() {
        let mut client = TcpStream::connect(spawn_server()).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        client
            .write_all(
                b"GET /ws HTTP/1.1\r\n\
                  Host: localhost\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                  Sec-WebSocket-Version: 13\r\n\r\n",
            )
            .unwrap();

        let head = read_head(&mut client);
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(head.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

        DataFrame::text("hello").masked_random().write(&mut client).unwrap();
        let reply = DataFrame::parse(&mut client, u64::MAX).unwrap();
        assert_eq!(reply.opcode, OpCode::Text);
        assert!(!reply.is_masked());
        assert_eq!(reply.payload(), b"HELLO");

        DataFrame::close(1000).masked_random().write(&mut client).unwrap();
        let close = DataFrame::parse(&mut client, u64::MAX).unwrap();
        assert_eq!(close.opcode, OpCode::Close);
        assert_eq!(close.close_code(), Some(1000));

        // the server released the socket after answering
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn loopback_rejects_plain_request() {
        let mut client = TcpStream::connect(spawn_server()).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).unwrap();

        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.ends_with("Must send header Connection: Upgrade\n"));
    }
}
