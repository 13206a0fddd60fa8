pub(crate) const CHUNK_END: &[u8; 4] = b"\r\n\r\n";
pub(crate) const CRLF: &str = "\r\n";

pub const HTTP_VER_STR: &str = "HTTP/1.1";

/// Upper bound for the request line plus all header lines
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

pub mod headers {
    pub const CONTENT_LEN: &str = "Content-Length";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONNECTION: &str = "Connection";
}
