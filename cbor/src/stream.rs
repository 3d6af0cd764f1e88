//! Streaming encode and decode over `io::Write` / `io::Read`.

use std::io::{Read, Write};

use thiserror::Error;

use crate::decode::{self, FromCbor};
use crate::encode::{self, ToCbor};
use crate::value::{self, DecodeOptions, Value};
use crate::wellformed;

/// Refills append at least this many bytes unless the source ends first.
const MIN_READ: usize = 512;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] encode::Error),

    #[error(transparent)]
    Decode(#[from] decode::Error),

    #[error("cbor: encoder has already failed")]
    Poisoned,
}

/// Writes one fully-encoded value to the sink per [`encode`](Encoder::encode)
/// call. The first failure is sticky and short-circuits later calls.
pub struct Encoder<W> {
    w: W,
    failed: bool,
}

impl<W: Write> Encoder<W> {
    pub fn new(w: W) -> Self {
        Encoder { w, failed: false }
    }

    pub fn encode<T: ToCbor + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        if self.failed {
            return Err(Error::Poisoned);
        }
        let data = match encode::emit(value) {
            Ok(data) => data,
            Err(e) => {
                self.failed = true;
                return Err(e.into());
            }
        };
        match self.w.write_all(&data) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failed = true;
                Err(e.into())
            }
        }
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

/// Reads one value at a time from a byte source.
///
/// The well-formedness checker determines where the next item ends; when the
/// buffered bytes fall short, the source is asked for more. End of input in
/// the middle of an item is an unexpected-end error, end of input between
/// items is a clean `None`.
pub struct Decoder<R> {
    r: R,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
    options: DecodeOptions,
}

impl<R: Read> Decoder<R> {
    pub fn new(r: R) -> Self {
        Decoder {
            r,
            buf: Vec::new(),
            pos: 0,
            eof: false,
            options: DecodeOptions::default(),
        }
    }

    /// Accept any well-formed map key when decoding generically.
    pub fn use_any_key(&mut self) -> &mut Self {
        self.options.use_any_key = true;
        self
    }

    /// Accept integers outside the `i64` range when decoding generically.
    pub fn use_integer(&mut self) -> &mut Self {
        self.options.use_integer = true;
        self
    }

    fn refill(&mut self) -> Result<(), Error> {
        if self.pos > 0 && self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
        let target = self.buf.len() + MIN_READ;
        let mut chunk = [0u8; MIN_READ];
        while self.buf.len() < target {
            let n = self.r.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn next_item(&mut self) -> Result<Option<(usize, usize)>, Error> {
        loop {
            if self.pos == self.buf.len() {
                if self.eof {
                    return Ok(None);
                }
                self.refill()?;
                continue;
            }
            match wellformed::item(&self.buf[self.pos..]) {
                Ok(n) => {
                    let start = self.pos;
                    self.pos += n;
                    return Ok(Some((start, n)));
                }
                Err(decode::Error::UnexpectedEnd(_)) if !self.eof => self.refill()?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Decodes the next value, or `None` at clean end of input.
    pub fn decode<T>(&mut self) -> Result<Option<T>, Error>
    where
        T: FromCbor<Error = decode::Error>,
    {
        match self.next_item()? {
            Some((start, n)) => {
                let (v, _, _) = T::from_cbor(&self.buf[start..start + n])?;
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    /// Decodes the next value generically, honouring the decoder options.
    pub fn decode_value(&mut self) -> Result<Option<Value>, Error> {
        match self.next_item()? {
            Some((start, n)) => {
                let mut deferred = None;
                let (v, _, _) = value::decode_value(
                    &self.buf[start..start + n],
                    self.options,
                    crate::MAX_DEPTH,
                    false,
                    &mut deferred,
                )?;
                match deferred {
                    Some(e) => Err(e.into()),
                    None => Ok(Some(v)),
                }
            }
            None => Ok(None),
        }
    }
}
