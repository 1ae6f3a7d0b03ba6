use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame};
use tokio::io::{AsyncRead, ReadBuf};

pub type OutBody = BoxBody<Bytes, std::io::Error>;

const READ_CHUNK: usize = 64 * 1024;

/// Adapts any `AsyncRead` (a file, or the internal FLV back-channel socket) into a hyper
/// `Body` by hand, reading fixed-size chunks directly off `poll_read`.
pub struct AsyncReadBody<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> AsyncReadBody<R> {
    pub fn new(inner: R) -> Self {
        AsyncReadBody { inner }
    }

    pub fn boxed(self) -> OutBody
    where
        R: Send + 'static,
    {
        BodyExt::boxed(self)
    }
}

impl<R: AsyncRead + Unpin> Body for AsyncReadBody<R> {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, std::io::Error>>> {
        let this = self.get_mut();
        let mut chunk = BytesMut::zeroed(READ_CHUNK);
        let mut read_buf = ReadBuf::new(&mut chunk);

        match Pin::new(&mut this.inner).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(Frame::data(Bytes::copy_from_slice(read_buf.filled())))))
                }
            }
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub fn full_body(bytes: impl Into<Bytes>) -> OutBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| -> std::io::Error { match never {} })
        .boxed()
}

pub fn empty_body() -> OutBody {
    full_body(Bytes::new())
}
