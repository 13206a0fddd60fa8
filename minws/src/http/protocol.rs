use super::{header::HeaderMap, request::HttpRequest, HttpResponse, Method, Version};
use crate::{
    consts::{headers::CONTENT_LEN, CHUNK_END, CRLF, HTTP_VER_STR, MAX_HEADER_SIZE},
    Error,
};
use std::io::{Read, Write};

/// Reads a request line and header block off the stream.
///
/// The stream is consumed one byte at a time and reading stops right after the
/// blank line, so anything the client pipelines behind the header (such as the
/// first websocket frame) is left in the stream.
pub fn parse_request(stream: &mut impl Read) -> Result<HttpRequest, Error> {
    let header_chunk = read_header(stream)?;
    if header_chunk.is_empty() {
        return Err(Error::Empty);
    }

    let header_chunk = String::from_utf8_lossy(&header_chunk);
    let mut lines = header_chunk.lines();

    let first = lines.next().ok_or(Error::Empty)?;
    let mut first_line = first.split(' ');

    let (Some(method), Some(uri), Some(version), None) = (
        first_line.next(),
        first_line.next(),
        first_line.next(),
        first_line.next(),
    ) else {
        return Err(Error::InvalidRequestLine {
            line: first.to_owned(),
        });
    };

    if method.is_empty() || uri.is_empty() {
        return Err(Error::InvalidRequestLine {
            line: first.to_owned(),
        });
    }

    let version = Version::parse(version).ok_or_else(|| Error::InvalidVersion {
        recieved: version.to_owned(),
    })?;

    let mut headers = HeaderMap::empty();
    for header_line in lines {
        let invalid = || Error::InvalidHeader {
            line: header_line.to_owned(),
        };

        let (key, value) = header_line.split_once(':').ok_or_else(invalid)?;
        if key.is_empty() {
            return Err(invalid());
        }

        headers.append(key, value.trim_start_matches([' ', '\t']).to_owned());
    }

    Ok(HttpRequest {
        method: Method::parse(method),
        uri: uri.to_owned(),
        version,
        headers,
    })
}

fn read_header(stream: &mut impl Read) -> Result<Vec<u8>, Error> {
    let mut total: Vec<u8> = Vec::with_capacity(128);

    let mut current = [0; 4];

    loop {
        let mut latest = [0];
        let got = stream.read(&mut latest)?;
        if got == 0 {
            // nothing at all is an empty request, anything else was cut off
            if total.is_empty() {
                return Ok(total);
            }
            return Err(Error::Incomplete);
        }
        total.push(latest[0]);

        current[0] = current[1];
        current[1] = current[2];
        current[2] = current[3];
        current[3] = latest[0];

        if &current == CHUNK_END {
            total.truncate(total.len() - CHUNK_END.len());
            return Ok(total);
        }

        if total.len() > MAX_HEADER_SIZE {
            return Err(Error::HeaderTooLarge);
        }
    }
}

/// Serializes the response and writes it in one go
pub fn write_response(mut stream: impl Write, mut response: HttpResponse) -> Result<(), Error> {
    if let Some(body) = &response.body {
        response
            .headers
            .insert(CONTENT_LEN, body.len().to_string());
    }

    let mut head = format!("{} {}{CRLF}", HTTP_VER_STR, response.status);
    for (key, value) in response.headers.iter() {
        head.push_str(&format!("{key}: {value}{CRLF}"));
    }
    head.push_str(CRLF);

    let mut out = head.into_bytes();
    if let Some(body) = response.body {
        out.extend(body);
    }

    stream.write_all(&out)?;
    stream.flush()?;

    Ok(())
}
