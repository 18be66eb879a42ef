//! DNS message decoding for gateway discovery responses.
//!
//! Implements just enough of the RFC 1035 wire format to pull TXT metadata
//! out of a multicast DNS response: the fixed header, compressed names,
//! and resource-record framing. Every read is bounds-checked, and
//! compression pointers are followed to a fixed depth so a corrupt or
//! hostile datagram can only ever produce [`Error::MalformedRecord`].

use std::collections::HashMap;

use crate::error::Error;

// ── Wire constants ───────────────────────────────────────────────────

pub const HEADER_LEN: usize = 12;
const RR_FIXED_LEN: usize = 10;
const QUESTION_FIXED_LEN: usize = 4;

pub const TYPE_PTR: u16 = 12;
pub const TYPE_TXT: u16 = 16;
const CLASS_IN: u16 = 1;

/// Upper bound on chained compression pointers within one name.
pub const MAX_POINTER_DEPTH: usize = 16;

const LABEL_KIND_MASK: u8 = 0xC0;
const MAX_LABEL_LEN: usize = 63;

/// Decoded TXT metadata: key → value, as advertised by the gateway.
pub type TxtRecord = HashMap<String, String>;

// ── Header ───────────────────────────────────────────────────────────

/// The fixed 12-byte DNS message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub id: u16,
    pub flags: u16,
    pub questions: u16,
    pub answers: u16,
    pub authorities: u16,
    pub additionals: u16,
}

impl MessageHeader {
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(buf, 0);
        if buf.len() < HEADER_LEN {
            return Err(Error::malformed(buf.len(), "truncated header"));
        }
        Ok(Self {
            id: cursor.u16()?,
            flags: cursor.u16()?,
            questions: cursor.u16()?,
            answers: cursor.u16()?,
            authorities: cursor.u16()?,
            additionals: cursor.u16()?,
        })
    }

    /// Total resource records following the question section.
    pub fn record_count(&self) -> usize {
        usize::from(self.answers) + usize::from(self.authorities) + usize::from(self.additionals)
    }
}

// ── Resource records ─────────────────────────────────────────────────

/// One resource record, borrowing its payload from the datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord<'a> {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub data: &'a [u8],
    /// Absolute offset of `data` within the datagram.
    pub data_offset: usize,
}

/// Bounds-checked big-endian reader over a datagram.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| Error::malformed(self.pos, "length overflow"))?;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| Error::malformed(self.pos, "truncated record"))?;
        self.pos = end;
        Ok(bytes)
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn name(&mut self) -> Result<String, Error> {
        let (name, next) = read_name(self.buf, self.pos, 0)?;
        self.pos = next;
        Ok(name)
    }

    fn skip_question(&mut self) -> Result<(), Error> {
        self.name()?;
        self.take(QUESTION_FIXED_LEN)?;
        Ok(())
    }

    fn record(&mut self) -> Result<ResourceRecord<'a>, Error> {
        let name = self.name()?;
        if self.buf.len().saturating_sub(self.pos) < RR_FIXED_LEN {
            return Err(Error::malformed(self.pos, "truncated record header"));
        }
        let rtype = self.u16()?;
        let class = self.u16()?;
        let ttl = self.u32()?;
        let len = self.u16()?;
        let data_offset = self.pos;
        let data = self.take(usize::from(len))?;
        Ok(ResourceRecord {
            name,
            rtype,
            class,
            ttl,
            data,
            data_offset,
        })
    }
}

/// Read a possibly-compressed domain name starting at `pos`.
///
/// Returns the dotted name and the offset just past the name *at its
/// original location* (a pointer consumes two bytes regardless of how long
/// the name it references is).
fn read_name(buf: &[u8], mut pos: usize, depth: usize) -> Result<(String, usize), Error> {
    if depth > MAX_POINTER_DEPTH {
        return Err(Error::malformed(pos, "compression pointer chain too deep"));
    }

    let mut labels: Vec<String> = Vec::new();
    loop {
        let len = *buf
            .get(pos)
            .ok_or_else(|| Error::malformed(pos, "truncated name"))?;

        match len & LABEL_KIND_MASK {
            0x00 => {
                pos += 1;
                if len == 0 {
                    break;
                }
                let end = pos + usize::from(len);
                let label = buf
                    .get(pos..end)
                    .ok_or_else(|| Error::malformed(pos, "truncated label"))?;
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos = end;
            }
            LABEL_KIND_MASK => {
                let low = *buf
                    .get(pos + 1)
                    .ok_or_else(|| Error::malformed(pos, "truncated compression pointer"))?;
                let target = usize::from(u16::from_be_bytes([len & !LABEL_KIND_MASK, low]));
                if target >= buf.len() {
                    return Err(Error::malformed(pos, "compression pointer out of range"));
                }
                let (suffix, _) = read_name(buf, target, depth + 1)?;
                if !suffix.is_empty() {
                    labels.push(suffix);
                }
                pos += 2;
                break;
            }
            _ => return Err(Error::malformed(pos, "reserved label type")),
        }
    }

    Ok((labels.join("."), pos))
}

// ── TXT payloads ─────────────────────────────────────────────────────

/// Decode a TXT payload: a run of length-prefixed `key=value` strings.
///
/// Each string is split once on `=`; a bare key maps to an empty value.
/// `base` is the payload's offset in the datagram, used for error reporting.
pub fn decode_txt(data: &[u8], base: usize) -> Result<TxtRecord, Error> {
    let mut entries = TxtRecord::new();
    let mut pos = 0;
    while pos < data.len() {
        let len = usize::from(data[pos]);
        pos += 1;
        let raw = data
            .get(pos..pos + len)
            .ok_or_else(|| Error::malformed(base + pos, "truncated TXT string"))?;
        pos += len;

        if raw.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(raw);
        let (key, value) = text.split_once('=').unwrap_or((&text, ""));
        entries.insert(key.to_string(), value.to_string());
    }
    Ok(entries)
}

// ── Entry points ─────────────────────────────────────────────────────

/// Parse every resource record in a datagram (answers, then authority,
/// then additional).
pub fn parse_records(buf: &[u8]) -> Result<Vec<ResourceRecord<'_>>, Error> {
    let header = MessageHeader::parse(buf)?;
    let mut cursor = Cursor::new(buf, HEADER_LEN);
    for _ in 0..header.questions {
        cursor.skip_question()?;
    }
    (0..header.record_count()).map(|_| cursor.record()).collect()
}

/// Extract the first TXT record carrying `identity_key`.
///
/// Answers are scanned first; scanning continues into the authority and
/// additional sections, where responders commonly attach TXT data. Records
/// are decoded lazily, so corruption *after* a qualifying record does not
/// fail the parse. Returns `Ok(None)` when no TXT record qualifies.
pub fn parse_txt(buf: &[u8], identity_key: &str) -> Result<Option<TxtRecord>, Error> {
    let header = MessageHeader::parse(buf)?;
    let mut cursor = Cursor::new(buf, HEADER_LEN);
    for _ in 0..header.questions {
        cursor.skip_question()?;
    }

    for _ in 0..header.record_count() {
        let record = cursor.record()?;
        if record.rtype != TYPE_TXT {
            continue;
        }
        let txt = decode_txt(record.data, record.data_offset)?;
        if txt.contains_key(identity_key) {
            return Ok(Some(txt));
        }
    }
    Ok(None)
}

/// Build a one-question PTR query for `service` (e.g. `_toyama._tcp.local`).
///
/// Labels longer than 63 bytes are truncated; empty labels are skipped.
pub fn build_ptr_query(service: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + service.len() + 6);
    packet.extend_from_slice(&0u16.to_be_bytes()); // id
    packet.extend_from_slice(&0x0100u16.to_be_bytes()); // flags: standard query
    packet.extend_from_slice(&1u16.to_be_bytes()); // questions
    packet.extend_from_slice(&[0; 6]); // answer / authority / additional

    for label in service.split('.').filter(|l| !l.is_empty()) {
        let bytes = &label.as_bytes()[..label.len().min(MAX_LABEL_LEN)];
        // Bounded by MAX_LABEL_LEN above.
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        packet.push(bytes.len() as u8);
        packet.extend_from_slice(bytes);
    }
    packet.push(0);
    packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());
    packet
}

// ── Tests ────────────────────────────────────────────────────────────
