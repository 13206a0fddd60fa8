use super::{header::HeaderMap, Method, Version};

/// The parts of a request line and header block the upgrade needs. Bodies are never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    pub version: Version,
    pub headers: HeaderMap,
}
