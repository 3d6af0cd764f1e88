//! CBOR bytes to EDN text.

use std::fmt::Write as _;

use super::Error;

pub(crate) fn format(data: &[u8]) -> Result<String, Error> {
    let mut w = Writer {
        data,
        off: 0,
        out: String::new(),
    };
    w.item()?;
    if w.off != data.len() {
        return Err(Error::Syntax(
            "unexpected data after top-level value".into(),
            w.off,
        ));
    }
    Ok(w.out)
}

struct Writer<'a> {
    data: &'a [u8],
    off: usize,
    out: String,
}

impl<'a> Writer<'a> {
    fn read_u8(&mut self) -> Result<u8, Error> {
        let b = *self.data.get(self.off).ok_or(Error::UnexpectedEnd)?;
        self.off += 1;
        Ok(b)
    }

    fn peek(&self) -> Result<u8, Error> {
        self.data.get(self.off).copied().ok_or(Error::UnexpectedEnd)
    }

    fn take(&mut self, n: u64) -> Result<&'a [u8], Error> {
        let n = usize::try_from(n).map_err(|_| Error::UnexpectedEnd)?;
        let end = self
            .off
            .checked_add(n)
            .filter(|e| *e <= self.data.len())
            .ok_or(Error::UnexpectedEnd)?;
        let s = &self.data[self.off..end];
        self.off = end;
        Ok(s)
    }

    fn arg(&mut self, minor: u8) -> Result<u64, Error> {
        match minor {
            v if v < 24 => Ok(v as u64),
            24 => Ok(self.read_u8()? as u64),
            25 => Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()) as u64),
            26 => Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()) as u64),
            27 => Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap())),
            v => Err(Error::Syntax(
                format!("reserved additional information {v}"),
                self.off,
            )),
        }
    }

    fn item(&mut self) -> Result<(), Error> {
        let ib = self.read_u8()?;
        let minor = ib & 0x1F;
        match ib >> 5 {
            0 => {
                let n = self.arg(minor)?;
                write!(self.out, "{n}").unwrap();
            }
            1 => {
                let n = self.arg(minor)?;
                write!(self.out, "-{}", n as u128 + 1).unwrap();
            }
            2 => {
                if minor == 31 {
                    self.string_chunks(2)?;
                } else {
                    let n = self.arg(minor)?;
                    let b = self.take(n)?;
                    write!(self.out, "h'{}'", hex::encode(b)).unwrap();
                }
            }
            3 => {
                if minor == 31 {
                    self.string_chunks(3)?;
                } else {
                    let n = self.arg(minor)?;
                    let start = self.off;
                    let b = self.take(n)?;
                    let s = std::str::from_utf8(b)
                        .map_err(|_| Error::Syntax("invalid UTF-8 string".into(), start))?;
                    self.out.push('"');
                    escape_into(s, &mut self.out);
                    self.out.push('"');
                }
            }
            4 => {
                if minor == 31 {
                    self.out.push_str("[_ ");
                    let mut first = true;
                    loop {
                        if self.peek()? == 0xFF {
                            self.off += 1;
                            break;
                        }
                        if !first {
                            self.out.push_str(", ");
                        }
                        first = false;
                        self.item()?;
                    }
                    self.out.push(']');
                } else {
                    let n = self.arg(minor)?;
                    self.out.push('[');
                    for i in 0..n {
                        if i > 0 {
                            self.out.push_str(", ");
                        }
                        self.item()?;
                    }
                    self.out.push(']');
                }
            }
            5 => {
                if minor == 31 {
                    self.out.push_str("{_ ");
                    let mut first = true;
                    loop {
                        if self.peek()? == 0xFF {
                            self.off += 1;
                            break;
                        }
                        if !first {
                            self.out.push_str(", ");
                        }
                        first = false;
                        self.item()?;
                        self.out.push_str(": ");
                        self.item()?;
                    }
                    self.out.push('}');
                } else {
                    let n = self.arg(minor)?;
                    self.out.push('{');
                    for i in 0..n {
                        if i > 0 {
                            self.out.push_str(", ");
                        }
                        self.item()?;
                        self.out.push_str(": ");
                        self.item()?;
                    }
                    self.out.push('}');
                }
            }
            6 => {
                let n = self.arg(minor)?;
                write!(self.out, "{n}(").unwrap();
                self.item()?;
                self.out.push(')');
            }
            7 => match minor {
                0..=19 => write!(self.out, "simple({minor})").unwrap(),
                20 => self.out.push_str("false"),
                21 => self.out.push_str("true"),
                22 => self.out.push_str("null"),
                23 => self.out.push_str("undefined"),
                24 => {
                    let v = self.read_u8()?;
                    if v < 32 {
                        return Err(Error::Syntax(
                            format!("invalid simple value {v}"),
                            self.off - 1,
                        ));
                    }
                    write!(self.out, "simple({v})").unwrap();
                }
                25 => {
                    let w = u16::from_be_bytes(self.take(2)?.try_into().unwrap());
                    self.float(f64::from(half::f16::from_bits(w)));
                }
                26 => {
                    let v = f32::from_be_bytes(self.take(4)?.try_into().unwrap());
                    self.float(v as f64);
                }
                27 => {
                    let v = f64::from_be_bytes(self.take(8)?.try_into().unwrap());
                    self.float(v);
                }
                31 => {
                    return Err(Error::Syntax("unexpected break code".into(), self.off - 1));
                }
                v => {
                    return Err(Error::Syntax(
                        format!("reserved additional information {v}"),
                        self.off - 1,
                    ));
                }
            },
            _ => unreachable!(),
        }
        Ok(())
    }

    fn string_chunks(&mut self, major: u8) -> Result<(), Error> {
        if self.peek()? == 0xFF {
            self.off += 1;
            self.out.push_str(if major == 2 { "''_" } else { "\"\"_" });
            return Ok(());
        }
        self.out.push_str("(_ ");
        let mut first = true;
        loop {
            let b = self.peek()?;
            if b == 0xFF {
                self.off += 1;
                break;
            }
            if b >> 5 != major || b & 0x1F == 31 {
                return Err(Error::Syntax(
                    "invalid indefinite-length chunk".into(),
                    self.off,
                ));
            }
            if !first {
                self.out.push_str(", ");
            }
            first = false;
            self.item()?;
        }
        self.out.push(')');
        Ok(())
    }

    fn float(&mut self, v: f64) {
        if v.is_nan() {
            self.out.push_str("NaN");
        } else if v == f64::INFINITY {
            self.out.push_str("Infinity");
        } else if v == f64::NEG_INFINITY {
            self.out.push_str("-Infinity");
        } else if v == v.trunc() && v.abs() < 1e15 {
            // Integer-valued floats keep a trailing digit so they stay
            // floats when read back.
            write!(self.out, "{v:.1}").unwrap();
        } else {
            let s = format!("{v}");
            if s.contains('.') {
                self.out.push_str(&s);
            } else {
                // A bare digit string would read back as an integer.
                write!(self.out, "{v:e}").unwrap();
            }
        }
    }
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                write!(out, "\\u{:04x}", c as u32).unwrap();
            }
            c => out.push(c),
        }
    }
}
