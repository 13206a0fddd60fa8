//! In-memory transport for unit tests

use crate::websocket::Transport;
use std::{
    cell::RefCell,
    io::{self, Cursor, Read, Write},
    rc::Rc,
};

#[derive(Debug, Default)]
struct Inner {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
    released: bool,
    fail_writes: bool,
}

/// Reads from a fixed buffer and records everything written.
///
/// Clones share the same buffers, so a test can keep a handle after moving
/// the stream into a connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockStream {
    inner: Rc<RefCell<Inner>>,
}

impl MockStream {
    pub(crate) fn new(input: Vec<u8>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                input: Cursor::new(input),
                ..Default::default()
            })),
        }
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.inner.borrow().output.clone()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.inner.borrow().released
    }

    pub(crate) fn fail_writes(&self) {
        self.inner.borrow_mut().fail_writes = true;
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.borrow_mut().input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if inner.released {
            return Err(io::ErrorKind::NotConnected.into());
        }

        inner.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockStream {
    fn release(&mut self) -> io::Result<()> {
        self.inner.borrow_mut().released = true;
        Ok(())
    }
}
