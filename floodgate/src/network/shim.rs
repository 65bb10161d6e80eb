//! Fault-injecting and stall-observing stream wrappers.
//!
//! Both wrappers are injected as [`StreamDecorator`]s at server
//! construction time, so fault behavior is configuration rather than a
//! subclassed endpoint.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::{BoxedByteStream, StreamDecorator};
use crate::sync::StarvationSignal;

/// Fails every write after the first one.
///
/// The first write call forwards its buffer (the response head) to the
/// underlying transport and succeeds; every later write fails with a
/// synthetic I/O error. The peer therefore observes a truncated stream,
/// partial but well-formed bytes followed by EOF, never a protocol
/// corruption. The failure is terminal for the connection; nothing at
/// this layer retries.
#[derive(Debug, Clone, Default)]
pub struct HeadOnlyWriteFault;

impl HeadOnlyWriteFault {
    /// Create the decorator.
    pub fn new() -> Self {
        Self
    }
}

impl StreamDecorator for HeadOnlyWriteFault {
    fn decorate(&self, stream: BoxedByteStream) -> BoxedByteStream {
        Box::new(TruncatingStream {
            inner: stream,
            wrote_once: false,
        })
    }
}

struct TruncatingStream {
    inner: BoxedByteStream,
    wrote_once: bool,
}

impl AsyncRead for TruncatingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TruncatingStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.wrote_once {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        let result = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = result {
            if n > 0 {
                self.wrote_once = true;
            }
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Raises a [`StarvationSignal`] the first time a write cannot complete.
///
/// A write returning [`Poll::Pending`] means the kernel send buffer is
/// full and the writing worker is now pinned behind the peer, which is
/// exactly the backpressure condition saturation scenarios wait for.
/// Only the first stalled flush raises the signal.
#[derive(Debug, Clone)]
pub struct WriteStallProbe {
    signal: StarvationSignal,
}

impl WriteStallProbe {
    /// Create a probe that raises `signal` on the first stalled write.
    pub fn new(signal: StarvationSignal) -> Self {
        Self { signal }
    }
}

impl StreamDecorator for WriteStallProbe {
    fn decorate(&self, stream: BoxedByteStream) -> BoxedByteStream {
        Box::new(StallObservingStream {
            inner: stream,
            signal: self.signal.clone(),
        })
    }
}

struct StallObservingStream {
    inner: BoxedByteStream,
    signal: StarvationSignal,
}

impl AsyncRead for StallObservingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for StallObservingStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let result = Pin::new(&mut self.inner).poll_write(cx, buf);
        if result.is_pending() {
            self.signal.raise();
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
