//! Streaming decoder over a byte stream
//!
//! Turns a stream of body chunks holding one JSON array into a stream of
//! `(index, element)` pairs, pulling more input only when the buffered bytes
//! do not contain a complete element.

use super::scanner::ArrayScanner;
use crate::error::{Error, Result};
use crate::types::DecodedRecord;
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::debug;

pin_project! {
    /// Lazy, finite, non-restartable sequence of array elements
    ///
    /// After the closing `]` the underlying stream is still drained to its
    /// end, so a transfer error that arrives after the last element surfaces
    /// as a decode failure instead of being dropped.
    pub struct JsonArrayStream<S> {
        #[pin]
        inner: S,
        scanner: ArrayScanner,
        inner_done: bool,
        finished: bool,
    }
}

impl<S> JsonArrayStream<S>
where
    S: Stream<Item = Result<Bytes>>,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            scanner: ArrayScanner::new(),
            inner_done: false,
            finished: false,
        }
    }

    /// Elements emitted so far
    pub fn emitted(&self) -> usize {
        self.scanner.emitted()
    }

    /// Bytes currently held by the decoder
    pub fn buffered(&self) -> usize {
        self.scanner.buffered()
    }
}

impl<S> Stream for JsonArrayStream<S>
where
    S: Stream<Item = Result<Bytes>>,
{
    type Item = Result<DecodedRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.finished {
                return Poll::Ready(None);
            }

            match this.scanner.next_element() {
                Ok(Some(item)) => return Poll::Ready(Some(Ok(item))),
                Ok(None) => {}
                Err(e) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }

            if *this.inner_done {
                *this.finished = true;
                return match this.scanner.finish() {
                    Ok(()) => {
                        debug!(
                            elements = this.scanner.emitted(),
                            bytes = this.scanner.consumed(),
                            "JSON array stream complete"
                        );
                        Poll::Ready(None)
                    }
                    Err(e) => Poll::Ready(Some(Err(e))),
                };
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.scanner.feed(&chunk),
                Some(Err(e)) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(Error::decode(format!(
                        "byte stream failed after {} element(s): {e}",
                        this.scanner.emitted()
                    )))));
                }
                None => *this.inner_done = true,
            }
        }
    }
}
