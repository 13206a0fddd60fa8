use super::{
    consts::{
        headers::{
            CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_EXTENSIONS, SEC_WEBSOCKET_KEY,
            SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION, UPGRADE,
        },
        WEBSOCKET_GUID,
    },
    Connection, Transport, WsConfig,
};
use crate::http::{self, HttpRequest, HttpResponse, Method, StatusCode, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Why an upgrade request was refused. The message is sent to the client as the 400 body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("Must be HTTP/1.1")]
    UnsupportedVersion(Version),

    #[error("Must be GET Request")]
    InvalidMethod(Method),

    #[error("Must send header Connection: Upgrade")]
    MissingConnectionUpgrade,

    #[error("Must send header Upgrade: websocket")]
    MissingUpgradeWebsocket,

    #[error("Must send header Sec-WebSocket-Key")]
    MissingKey,

    #[error("Must send header Sec-WebSocket-Version")]
    MissingVersion,
}

impl HandshakeError {
    /// The 400 response that aborts the upgrade
    pub fn response(&self) -> HttpResponse {
        HttpResponse::builder(StatusCode::BadRequest)
            .header(CONNECTION, "close".to_owned())
            .text(format!("{self}\n"))
            .build()
    }
}

/// What a valid upgrade request asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    pub key: String,
    pub accept: String,
    /// `Sec-WebSocket-Version` as sent. Only its presence is checked.
    pub version: String,
    /// Echoed back verbatim, no sub-protocol is actually selected
    pub protocol: Option<String>,
    /// Accepted but never activated
    pub extensions: Option<String>,
}

/// `Sec-WebSocket-Accept` for a client key (RFC 6455 section 1.3)
pub fn accept_key(key: &str) -> String {
    let mut sha = Sha1::new();
    sha.update(key.as_bytes());
    sha.update(WEBSOCKET_GUID.as_bytes());

    STANDARD.encode(sha.finalize())
}

fn validate_request(req: &HttpRequest) -> Result<HandshakeResult, HandshakeError> {
    if req.version != Version::HTTP_1_1 {
        return Err(HandshakeError::UnsupportedVersion(req.version));
    }

    if req.method != Method::Get {
        return Err(HandshakeError::InvalidMethod(req.method.clone()));
    }

    if req.headers.get(CONNECTION) != Some("Upgrade") {
        return Err(HandshakeError::MissingConnectionUpgrade);
    }

    let upgrades_to_websocket = req.headers.get(UPGRADE).is_some_and(|upgrade| {
        upgrade
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
    });
    if !upgrades_to_websocket {
        return Err(HandshakeError::MissingUpgradeWebsocket);
    }

    let key = req
        .headers
        .get(SEC_WEBSOCKET_KEY)
        .ok_or(HandshakeError::MissingKey)?;

    // any value is accepted, not just 13
    let version = req
        .headers
        .get(SEC_WEBSOCKET_VERSION)
        .ok_or(HandshakeError::MissingVersion)?;

    Ok(HandshakeResult {
        key: key.to_owned(),
        accept: accept_key(key),
        version: version.to_owned(),
        protocol: req.headers.get(SEC_WEBSOCKET_PROTOCOL).map(str::to_owned),
        extensions: req.headers.get(SEC_WEBSOCKET_EXTENSIONS).map(str::to_owned),
    })
}

/// Validates an upgrade request and builds the `101 Switching Protocols` answer
pub fn negotiate(req: &HttpRequest) -> Result<(HandshakeResult, HttpResponse), HandshakeError> {
    let result = validate_request(req)?;

    let mut response = HttpResponse::builder(StatusCode::SwitchingProtocols)
        .header(UPGRADE, "websocket".to_owned())
        .header(CONNECTION, "Upgrade".to_owned())
        .header(SEC_WEBSOCKET_ACCEPT, result.accept.clone());

    if let Some(protocol) = &result.protocol {
        response = response.header(SEC_WEBSOCKET_PROTOCOL, protocol.clone());
    }

    Ok((result, response.build()))
}

/// Answers an upgrade request on `stream` and, if it was valid, turns the stream into a websocket.
///
/// A rejected request gets its 400 response, the stream is released and the
/// handshake error is returned. No connection is created in that case.
pub fn websocket_handshake<S: Transport>(
    req: &HttpRequest,
    mut stream: S,
    config: WsConfig,
) -> Result<Connection<S>, crate::Error> {
    match negotiate(req) {
        Ok((result, response)) => {
            http::write_response(&mut stream, response)?;

            debug!(
                uri = %req.uri,
                version = %result.version,
                protocol = result.protocol.as_deref(),
                "websocket upgrade accepted"
            );
            if let Some(extensions) = &result.extensions {
                debug!(%extensions, "requested extensions are not supported, ignoring");
            }

            Ok(Connection::new(stream, config))
        }
        Err(err) => {
            warn!(reason = %err, method = %req.method, uri = %req.uri, "rejecting websocket upgrade");

            http::write_response(&mut stream, err.response())?;
            if let Err(io_err) = stream.release() {
                trace!(error = %io_err, "failed to shut down rejected stream");
            }

            Err(err.into())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{http::HeaderMap, testing::MockStream, websocket::ConnectionState};

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn upgrade_request(headers: &[(&str, &str)]) -> HttpRequest {
        let mut map = HeaderMap::empty();
        for (key, value) in headers {
            map.append(key, (*value).to_owned());
        }

        HttpRequest {
            method: Method::Get,
            uri: "/chat".to_owned(),
            version: Version::HTTP_1_1,
            headers: map,
        }
    }

    fn valid_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Host", "server.example.com"),
            ("Upgrade", "websocket"),
            ("Connection", "Upgrade"),
            ("Sec-WebSocket-Key", SAMPLE_KEY),
            ("Sec-WebSocket-Version", "13"),
        ]
    }

    fn without(header: &str) -> HttpRequest {
        let headers = valid_headers()
            .into_iter()
            .filter(|(key, _)| *key != header)
            .collect::<Vec<_>>();
        upgrade_request(&headers)
    }

    #[test]
    fn test_accept_key_rfc_sample() {
        assert_eq!(accept_key(SAMPLE_KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_negotiate_success() {
        let (result, response) = negotiate(&upgrade_request(&valid_headers())).unwrap();

        assert_eq!(result.accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(result.version, "13");
        assert_eq!(response.status, StatusCode::SwitchingProtocols);
        assert_eq!(
            response.headers,
            HeaderMap::from([
                ("Upgrade", "websocket"),
                ("Connection", "Upgrade"),
                ("Sec-WebSocket-Accept", "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="),
            ])
        );
        assert!(response.body.is_none());
    }

    #[test]
    fn test_protocol_echoed_extensions_ignored() {
        let mut headers = valid_headers();
        headers.push(("Sec-WebSocket-Protocol", "chat, superchat"));
        headers.push(("Sec-WebSocket-Extensions", "permessage-deflate"));

        let (result, response) = negotiate(&upgrade_request(&headers)).unwrap();

        assert_eq!(
            response.headers.get("Sec-WebSocket-Protocol"),
            Some("chat, superchat")
        );
        assert!(!response.headers.contains("Sec-WebSocket-Extensions"));
        assert_eq!(result.extensions.as_deref(), Some("permessage-deflate"));
    }

    #[test]
    fn test_any_version_value_accepted() {
        let mut headers = valid_headers();
        headers.retain(|(key, _)| *key != "Sec-WebSocket-Version");
        headers.push(("Sec-WebSocket-Version", "8"));

        assert!(negotiate(&upgrade_request(&headers)).is_ok());
    }

    #[test]
    fn test_upgrade_token_in_list() {
        let mut headers = valid_headers();
        headers.retain(|(key, _)| *key != "Upgrade");
        headers.push(("Upgrade", "h2c, WebSocket"));

        assert!(negotiate(&upgrade_request(&headers)).is_ok());
    }

    #[test]
    fn test_rejections_in_order() {
        let mut old = upgrade_request(&valid_headers());
        old.version = Version { major: 1, minor: 0 };
        assert_eq!(
            negotiate(&old).unwrap_err(),
            HandshakeError::UnsupportedVersion(Version { major: 1, minor: 0 })
        );

        // version is checked before the method
        let mut post = upgrade_request(&[]);
        post.method = Method::Post;
        post.version = Version { major: 2, minor: 0 };
        assert!(matches!(
            negotiate(&post).unwrap_err(),
            HandshakeError::UnsupportedVersion(_)
        ));
        post.version = Version::HTTP_1_1;
        assert_eq!(
            negotiate(&post).unwrap_err(),
            HandshakeError::InvalidMethod(Method::Post)
        );

        assert_eq!(
            negotiate(&without("Connection")).unwrap_err(),
            HandshakeError::MissingConnectionUpgrade
        );
        assert_eq!(
            negotiate(&without("Upgrade")).unwrap_err(),
            HandshakeError::MissingUpgradeWebsocket
        );
        assert_eq!(
            negotiate(&without("Sec-WebSocket-Key")).unwrap_err(),
            HandshakeError::MissingKey
        );
        assert_eq!(
            negotiate(&without("Sec-WebSocket-Version")).unwrap_err(),
            HandshakeError::MissingVersion
        );
    }

    #[test]
    fn test_connection_must_equal_upgrade() {
        let mut headers = valid_headers();
        headers.retain(|(key, _)| *key != "Connection");
        headers.push(("Connection", "keep-alive"));

        assert_eq!(
            negotiate(&upgrade_request(&headers)).unwrap_err(),
            HandshakeError::MissingConnectionUpgrade
        );
    }

    #[test]
    fn test_handshake_writes_upgrade_response() {
        let stream = MockStream::new(Vec::new());

        let conn = websocket_handshake(
            &upgrade_request(&valid_headers()),
            stream.clone(),
            WsConfig::default(),
        )
        .unwrap();

        assert_eq!(conn.state(), ConnectionState::Established);
        assert!(!stream.is_released());
        assert_eq!(
            String::from_utf8(stream.written()).unwrap(),
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
        );
    }

    #[test]
    fn test_handshake_missing_key_is_rejected() {
        let stream = MockStream::new(Vec::new());

        let result = websocket_handshake(
            &without("Sec-WebSocket-Key"),
            stream.clone(),
            WsConfig::default(),
        );

        assert!(matches!(
            result,
            Err(crate::Error::Handshake(HandshakeError::MissingKey))
        ));
        assert!(stream.is_released());

        let written = String::from_utf8(stream.written()).unwrap();
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(written.contains("Connection: close\r\n"));
        assert!(written.ends_with("\r\n\r\nMust send header Sec-WebSocket-Key\n"));
    }
}
