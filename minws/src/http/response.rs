use super::{header::HeaderMap, StatusCode};
use crate::consts::headers::CONTENT_TYPE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

pub struct HttpResponseBuilder {
    status: StatusCode,
    header: HeaderMap,
    body: Option<Vec<u8>>,
}

impl HttpResponse {
    pub fn builder(status: StatusCode) -> HttpResponseBuilder {
        HttpResponseBuilder {
            status,
            header: HeaderMap::empty(),
            body: None,
        }
    }
}

impl HttpResponseBuilder {
    pub fn header(mut self, key: &str, value: String) -> Self {
        self.header.insert(key, value);
        self
    }

    pub fn text(mut self, text: String) -> Self {
        self.body = Some(text.into_bytes());
        self.header
            .insert(CONTENT_TYPE, "text/plain; charset=utf-8".to_owned());
        self
    }

    pub fn build(self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            headers: self.header,
            body: self.body,
        }
    }
}
