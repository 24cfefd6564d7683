//! The FITS primary header and data unit.
//!
//! Only the features needed to read image metadata and simple 2-d images are supported:
//! a single HDU, `BITPIX` of 16, 32 or -32, and `BSCALE`/`BZERO` scaling.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use hifitime::Epoch;
use ndarray::{ArrayD, IxDyn};
use tracing::{debug, trace, warn};

use crate::block::{padding, Blocks, BLOCK_LEN};
use crate::card::{self, is_log_key, Record, CARD_LEN};
use crate::extract::{unquote, FieldValue};
use crate::{Error, Result};

/// Cards written first, in this order.
pub const HEAD_KEYS: [&str; 18] = [
    "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "EXTEND", "COMMENT", "CREATOR", "OBSERVAT",
    "TELESCOP", "LATITUDE", "LONGITUD", "INSTRUME", "DETECTOR", "INSTID", "OBSERVER", "OBJECT",
    "EXPTIME",
];
/// Cards written last, in this order.
pub const TAIL_KEYS: [&str; 8] = [
    "CCDTEMP", "GAIN", "FILENAME", "BSCALE", "BZERO", "HIERARCH", "HISTORY", "END",
];

/// Maximum characters of a single HISTORY card's text.
const HISTORY_WIDTH: usize = 70;
/// Maximum HISTORY cards a single logged line may occupy.
const HISTORY_PIECES: usize = 7;

/// Header values and comments.
///
/// Values are kept as raw card text, including any enclosing quotes. The comments map
/// holds inline comments by key, and the newline separated text of every `COMMENT`,
/// `HISTORY` and `HIERARCH` card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    values: BTreeMap<String, String>,
    comments: BTreeMap<String, String>,
}

impl Header {
    /// Raw value text for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Inline comment for `key`, or the log text for a log keyword.
    #[must_use]
    pub fn comment(&self, key: &str) -> Option<&str> {
        self.comments.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn set_comment(&mut self, key: &str, comment: &str) {
        self.comments.insert(key.to_string(), comment.to_string());
    }

    /// Remove a key's value and comment.
    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
        self.comments.remove(key);
    }

    /// All value keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.comments.is_empty()
    }

    /// The value as a number if it is one, otherwise as unquoted text.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.get(key).map(FieldValue::from_raw)
    }

    /// The value with enclosing quotes and surrounding whitespace removed.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| unquote(v).to_string())
    }

    /// The value if it is a bare number.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    fn number_or_missing(&self, key: &str) -> Result<i64> {
        let raw = self
            .get(key)
            .ok_or_else(|| Error::MissingCard(key.to_string()))?;
        raw.trim().parse().map_err(|_| Error::InvalidCard {
            key: key.to_string(),
            value: raw.to_string(),
        })
    }

    /// Lines of a log keyword.
    pub fn log(&self, key: &str) -> impl Iterator<Item = &str> {
        self.comment(key).into_iter().flat_map(|text| text.split('\n'))
    }

    /// Append a line to a log keyword.
    pub fn append_log(&mut self, key: &str, line: &str) {
        match self.comments.get_mut(key) {
            Some(text) => {
                text.push('\n');
                text.push_str(line);
            }
            None => {
                self.comments.insert(key.to_string(), line.to_string());
            }
        }
    }

    /// Append time-stamped text to the HISTORY log.
    ///
    /// Each line of `text` is prefixed with `YYYY/MM/DD HH:MM:SS ` and split over as
    /// many as 7 cards of 70 characters; anything longer is dropped.
    pub fn add_history(&mut self, at: Epoch, text: &str) {
        let (y, mo, d, h, mi, s, _) = at.to_gregorian_utc();
        let stamped = format!("{y:04}/{mo:02}/{d:02} {h:02}:{mi:02}:{s:02} {text}");
        for line in stamped.split('\n') {
            let chars: Vec<char> = line.chars().collect();
            if chars.is_empty() {
                self.append_log("HISTORY", "");
            }
            for piece in chars.chunks(HISTORY_WIDTH).take(HISTORY_PIECES) {
                self.append_log("HISTORY", &piece.iter().collect::<String>());
            }
        }
    }

    fn push(&mut self, record: Record) {
        match record {
            Record::Log { key, text } => self.append_log(&key, &text),
            Record::Value {
                key,
                value,
                comment,
            } => {
                if let Some(comment) = comment {
                    self.comments.insert(key.clone(), comment);
                }
                self.values.insert(key, value);
            }
            Record::End | Record::Blank => {}
        }
    }

    fn emit(&self, key: &str, out: &mut Vec<String>) {
        if key == "END" {
            out.push(card::format_end());
        } else if is_log_key(key) {
            out.extend(self.log(key).map(|line| card::format_log(key, line)));
        } else if let Some(value) = self.get(key) {
            out.push(card::format_value(key, value, self.comment(key)));
        }
    }

    /// The header as 80 byte cards in write order, ending with `END`.
    ///
    /// The cards named in [HEAD_KEYS] come first, then every other card sorted by key,
    /// then those in [TAIL_KEYS].
    #[must_use]
    pub fn cards(&self) -> Vec<String> {
        let mut out = Vec::new();
        for key in HEAD_KEYS {
            self.emit(key, &mut out);
        }
        for key in self
            .keys()
            .filter(|k| !HEAD_KEYS.contains(k) && !TAIL_KEYS.contains(k))
        {
            self.emit(key, &mut out);
        }
        for key in TAIL_KEYS {
            self.emit(key, &mut out);
        }
        out
    }
}

/// On disk representation of data values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    I16,
    I32,
    F32,
    /// Write the header only.
    HeaderOnly,
}

impl ElementKind {
    /// Element kind for a `BITPIX` value; 0 selects [ElementKind::HeaderOnly].
    ///
    /// # Errors
    /// [Error::UnsupportedBitpix] for anything but 16, 32, -32 or 0.
    pub fn from_bitpix(bitpix: i64) -> Result<Self> {
        match bitpix {
            16 => Ok(ElementKind::I16),
            32 => Ok(ElementKind::I32),
            -32 => Ok(ElementKind::F32),
            0 => Ok(ElementKind::HeaderOnly),
            other => Err(Error::UnsupportedBitpix(other)),
        }
    }

    #[must_use]
    pub fn bitpix(self) -> i64 {
        match self {
            ElementKind::I16 => 16,
            ElementKind::I32 => 32,
            ElementKind::F32 => -32,
            ElementKind::HeaderOnly => 0,
        }
    }

    /// Bytes per element.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            ElementKind::I16 => 2,
            ElementKind::I32 | ElementKind::F32 => 4,
            ElementKind::HeaderOnly => 0,
        }
    }

    /// Largest stored integer magnitude used when scaling; one less than the type
    /// maximum at each end.
    fn integer_limit(self) -> Option<f64> {
        match self {
            ElementKind::I16 => Some(32767.0),
            ElementKind::I32 => Some(2_147_483_647.0),
            _ => None,
        }
    }

    fn decode(self, dat: &[u8]) -> Vec<f64> {
        match self {
            ElementKind::I16 => dat
                .chunks_exact(2)
                .map(|b| f64::from(i16::from_be_bytes([b[0], b[1]])))
                .collect(),
            ElementKind::I32 => dat
                .chunks_exact(4)
                .map(|b| f64::from(i32::from_be_bytes([b[0], b[1], b[2], b[3]])))
                .collect(),
            ElementKind::F32 => dat
                .chunks_exact(4)
                .map(|b| f64::from(f32::from_be_bytes([b[0], b[1], b[2], b[3]])))
                .collect(),
            ElementKind::HeaderOnly => Vec::new(),
        }
    }

    fn encode(self, value: f64, out: &mut Vec<u8>) {
        match self {
            ElementKind::I16 => out.extend_from_slice(&(value as i16).to_be_bytes()),
            ElementKind::I32 => out.extend_from_slice(&(value as i32).to_be_bytes()),
            ElementKind::F32 => out.extend_from_slice(&(value as f32).to_be_bytes()),
            ElementKind::HeaderOnly => {}
        }
    }
}

/// A header and optional data array.
#[derive(Debug, Clone, Default)]
pub struct Fits {
    pub header: Header,
    /// Physical values, axes in memory order (the reverse of `NAXISn`).
    pub data: Option<ArrayD<f64>>,
}

fn read_cards<R: Read>(blocks: &mut Blocks<R>) -> Result<Header> {
    let mut header = Header::default();
    let mut buf = [0u8; CARD_LEN];
    let mut cards = 0;
    loop {
        if !blocks.fill(&mut buf)? {
            return Err(Error::MissingEnd { cards });
        }
        cards += 1;
        let record = Record::parse(&buf);
        trace!(?record, "card {cards}");
        if record == Record::End {
            debug!(cards, "read header");
            return Ok(header);
        }
        header.push(record);
    }
}

fn pad_to_block(buf: &mut Vec<u8>, fill: u8) {
    buf.resize(buf.len() + padding(buf.len()), fill);
}

impl Fits {
    #[must_use]
    pub fn new(header: Header, data: Option<ArrayD<f64>>) -> Self {
        Self { header, data }
    }

    /// Read only the header from `reader`.
    ///
    /// # Errors
    /// [Error::MissingEnd] if the stream ends before an `END` card, or on any IO error.
    pub fn read_header<R: Read>(reader: R) -> Result<Header> {
        read_cards(&mut Blocks::new(reader))
    }

    /// Open `path` and read only its header.
    ///
    /// # Errors
    /// See [Fits::read_header].
    pub fn open_header<P: AsRef<Path>>(path: P) -> Result<Header> {
        Self::read_header(BufReader::new(File::open(path)?))
    }

    /// Read a header and its data array.
    ///
    /// The data array is absent when `NAXIS` is 0.
    ///
    /// # Errors
    /// [Error::MissingEnd], [Error::MissingCard] for missing `BITPIX` or axis cards,
    /// [Error::UnsupportedBitpix], and [Error::DataLength] if there are fewer data bytes
    /// than the axes require.
    pub fn read<R: Read>(reader: R) -> Result<Fits> {
        let mut blocks = Blocks::new(reader);
        let header = read_cards(&mut blocks)?;

        let bitpix = header.number_or_missing("BITPIX")?;
        let kind = match ElementKind::from_bitpix(bitpix)? {
            ElementKind::HeaderOnly => return Err(Error::UnsupportedBitpix(bitpix)),
            kind => kind,
        };

        let naxis = header.number_or_missing("NAXIS")?;
        if naxis <= 0 {
            return Ok(Fits::new(header, None));
        }
        let mut shape = Vec::new();
        for n in 1..=naxis {
            let key = format!("NAXIS{n}");
            let len = header.number_or_missing(&key)?;
            let len = usize::try_from(len).map_err(|_| Error::InvalidCard {
                key,
                value: len.to_string(),
            })?;
            shape.push(len);
        }
        shape.reverse();

        let expected = shape
            .iter()
            .try_fold(kind.size(), |acc, len| acc.checked_mul(*len))
            .ok_or_else(|| Error::InvalidCard {
                key: "NAXIS".to_string(),
                value: naxis.to_string(),
            })?;
        let dat = if blocks.align()? {
            blocks.take(expected)?
        } else {
            Vec::new()
        };
        if dat.len() != expected {
            return Err(Error::DataLength {
                actual: dat.len(),
                expected,
            });
        }
        debug!(?shape, bitpix, offset = blocks.offset(), "read data");

        let mut data = ArrayD::from_shape_vec(IxDyn(&shape), kind.decode(&dat)).map_err(|_| {
            Error::InvalidCard {
                key: "NAXIS".to_string(),
                value: naxis.to_string(),
            }
        })?;
        if let (Some(bscale), Some(bzero)) = (header.number("BSCALE"), header.number("BZERO")) {
            data.mapv_inplace(|v| v * bscale + bzero);
        }

        Ok(Fits::new(header, Some(data)))
    }

    /// Open and read the file at `path`.
    ///
    /// # Errors
    /// See [Fits::read].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Fits> {
        Self::read(BufReader::new(File::open(path)?))
    }

    /// Update the structural cards for writing the data array as `kind`, returning the
    /// values to store.
    fn prepare(&mut self, kind: ElementKind) -> Result<Vec<f64>> {
        let data = self.data.as_ref().ok_or(Error::NoData)?;

        let stored = match kind.integer_limit() {
            Some(fmax) => {
                let fmin = -fmax;
                let (dmin, dmax) = data
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(*v), hi.max(*v))
                    });
                let (bscale, bzero) = if !dmin.is_finite() || !dmax.is_finite() {
                    if !data.is_empty() {
                        warn!("data range is not finite, writing unscaled");
                    }
                    (1.0, 0.0)
                } else if dmax > dmin {
                    (
                        (dmax - dmin) / (fmax - fmin),
                        (dmin * fmax - dmax * fmin) / (fmax - fmin),
                    )
                } else {
                    (1.0, dmin)
                };
                if data.iter().any(|v| v.is_nan()) {
                    warn!("NaN values are stored as 0");
                }
                self.header.set("BSCALE", &format!("{bscale:?}"));
                self.header.set("BZERO", &format!("{bzero:?}"));
                data.iter()
                    .map(|x| ((x + bscale / 2.0 - bzero) / bscale).floor())
                    .collect()
            }
            None => {
                self.header.set("BSCALE", "1");
                self.header.set("BZERO", "0");
                data.iter().copied().collect()
            }
        };

        let shape = data.shape().to_vec();
        if self.header.get("SIMPLE").is_none() {
            self.header.set("SIMPLE", "T");
        }
        self.header.set("BITPIX", &kind.bitpix().to_string());
        let stale: Vec<String> = self
            .header
            .keys()
            .filter(|k| {
                k.strip_prefix("NAXIS")
                    .is_some_and(|n| n.parse::<usize>().is_ok_and(|n| n > shape.len()))
            })
            .map(str::to_string)
            .collect();
        for key in stale {
            self.header.remove(&key);
        }
        self.header.set("NAXIS", &shape.len().to_string());
        for (n, len) in shape.iter().rev().enumerate() {
            self.header.set(&format!("NAXIS{}", n + 1), &len.to_string());
        }

        Ok(stored)
    }

    /// Write the header, and the data array unless `kind` is
    /// [ElementKind::HeaderOnly].
    ///
    /// Integer kinds rescale the data to use the full range of the type and record
    /// `BSCALE`/`BZERO`; [ElementKind::F32] writes the values unscaled. `BITPIX` and the
    /// axis cards are updated to match the array.
    ///
    /// # Errors
    /// [Error::NoData] when writing data without a data array, or on any IO error.
    pub fn write<W: Write>(&mut self, mut writer: W, kind: ElementKind) -> Result<()> {
        let stored = match kind {
            ElementKind::HeaderOnly => {
                if self.data.is_some() {
                    warn!("writing header only, data array is not written");
                }
                None
            }
            kind => Some(self.prepare(kind)?),
        };

        let mut buf: Vec<u8> = Vec::with_capacity(BLOCK_LEN);
        for card in self.header.cards() {
            buf.extend_from_slice(card.as_bytes());
        }
        pad_to_block(&mut buf, b' ');
        writer.write_all(&buf)?;

        if let Some(stored) = stored {
            let mut buf = Vec::with_capacity(stored.len() * kind.size());
            for v in stored {
                kind.encode(v, &mut buf);
            }
            pad_to_block(&mut buf, 0);
            writer.write_all(&buf)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write to a new file at `path`, replacing any existing file.
    ///
    /// # Errors
    /// See [Fits::write].
    pub fn save<P: AsRef<Path>>(&mut self, path: P, kind: ElementKind) -> Result<()> {
        self.write(BufWriter::new(File::create(path)?), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn header_bytes(cards: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for c in cards {
            buf.extend_from_slice(format!("{c:<80}").as_bytes());
        }
        pad_to_block(&mut buf, b' ');
        buf
    }

    #[test]
    fn header_logs_accumulate() {
        let dat = header_bytes(&[
            "SIMPLE  =                    T",
            "COMMENT first",
            "HISTORY one",
            "EXPTIME =                120.0 / seconds",
            "HISTORY two",
            "        blank key is ignored",
            "END",
        ]);
        let h = Fits::read_header(&dat[..]).unwrap();

        assert_eq!(h.get("SIMPLE"), Some("T"));
        assert_eq!(h.number("EXPTIME"), Some(120.0));
        assert_eq!(h.comment("EXPTIME"), Some("seconds"));
        assert_eq!(h.log("HISTORY").collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(h.comment("COMMENT"), Some("first"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn header_without_end() {
        let dat = header_bytes(&["SIMPLE  =                    T"]);
        let err = Fits::read_header(&dat[..]).unwrap_err();
        assert!(matches!(err, Error::MissingEnd { cards: 36 }), "{err:?}");

        // partial trailing card
        let dat = b"SIMPLE  =                    T";
        let err = Fits::read_header(&dat[..]).unwrap_err();
        assert!(matches!(err, Error::MissingEnd { cards: 0 }), "{err:?}");
    }

    #[test]
    fn accessors() {
        let mut h = Header::default();
        h.set("OBJECT", "' M31 '");
        h.set("EXPTIME", "120");
        assert_eq!(h.text("OBJECT").as_deref(), Some("M31"));
        assert_eq!(h.number("OBJECT"), None);
        assert_eq!(h.field("EXPTIME"), Some(FieldValue::Number(120.0)));
        assert_eq!(h.field("OBJECT"), Some(FieldValue::Text("M31".to_string())));
        h.remove("EXPTIME");
        assert_eq!(h.get("EXPTIME"), None);
    }

    #[test]
    fn cards_in_zone_order() {
        let mut h = Header::default();
        h.set("BZERO", "0");
        h.set("ZEBRA", "1");
        h.set("AARDVARK", "2");
        h.set("NAXIS", "0");
        h.set("SIMPLE", "T");
        h.append_log("HISTORY", "done");
        let keys: Vec<String> = h
            .cards()
            .iter()
            .map(|c| c[..8].trim().to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["SIMPLE", "NAXIS", "AARDVARK", "ZEBRA", "BZERO", "HISTORY", "END"]
        );
        assert!(h.cards().iter().all(|c| c.len() == CARD_LEN));
    }

    #[test]
    fn history_is_stamped_and_split() {
        let mut h = Header::default();
        let at = Epoch::from_gregorian_utc_hms(2024, 3, 5, 6, 7, 8);
        h.add_history(at, &"x".repeat(1000));
        let lines: Vec<&str> = h.log("HISTORY").collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("2024/03/05 06:07:08 xxx"));
        assert!(lines.iter().all(|l| l.chars().count() == 70));

        h.add_history(at, "short");
        assert_eq!(h.log("HISTORY").last(), Some("2024/03/05 06:07:08 short"));
    }

    #[test]
    fn header_only_write_is_padded() {
        let mut h = Header::default();
        h.set("SIMPLE", "T");
        let mut fits = Fits::new(h, None);
        let mut out = Vec::new();
        fits.write(&mut out, ElementKind::HeaderOnly).unwrap();
        assert_eq!(out.len(), BLOCK_LEN);
        assert!(out.starts_with(b"SIMPLE  =                    T"));
    }

    #[test]
    fn write_data_without_array() {
        let mut fits = Fits::default();
        let err = fits.write(Vec::new(), ElementKind::I16).unwrap_err();
        assert!(matches!(err, Error::NoData));
    }

    #[test]
    fn write_read_i16() {
        let data = Array2::from_shape_fn((3, 5), |(r, c)| (r * 5 + c) as f64 * 1.5 - 4.0);
        let mut fits = Fits::new(Header::default(), Some(data.clone().into_dyn()));
        let mut out = Vec::new();
        fits.write(&mut out, ElementKind::I16).unwrap();
        assert_eq!(out.len() % BLOCK_LEN, 0);
        assert_eq!(fits.header.get("NAXIS1"), Some("5"));
        assert_eq!(fits.header.get("NAXIS2"), Some("3"));

        let got = Fits::read(&out[..]).unwrap();
        let bscale = got.header.number("BSCALE").unwrap();
        let got_data = got.data.unwrap();
        assert_eq!(got_data.shape(), &[3, 5]);
        for (a, b) in got_data.iter().zip(data.iter()) {
            assert!((a - b).abs() <= bscale, "{a} {b}");
        }
    }

    #[test]
    fn integer_write_without_finite_range() {
        let empty = Array2::<f64>::zeros((0, 3)).into_dyn();
        let mut fits = Fits::new(Header::default(), Some(empty));
        fits.write(Vec::new(), ElementKind::I16).unwrap();
        assert_eq!(fits.header.get("BSCALE"), Some("1.0"));
        assert_eq!(fits.header.get("BZERO"), Some("0.0"));

        let data = Array2::from_shape_vec((1, 3), vec![1.0, f64::INFINITY, 3.0])
            .unwrap()
            .into_dyn();
        let mut fits = Fits::new(Header::default(), Some(data));
        let mut out = Vec::new();
        fits.write(&mut out, ElementKind::I32).unwrap();
        assert_eq!(fits.header.get("BSCALE"), Some("1.0"));
        assert_eq!(fits.header.get("BZERO"), Some("0.0"));
        let got = Fits::read(&out[..]).unwrap().data.unwrap();
        assert_eq!(got[[0, 0]], 1.0);
        assert_eq!(got[[0, 2]], 3.0);
    }

    #[test]
    fn constant_data_scales_by_one() {
        let data = Array2::from_elem((2, 2), 7.5).into_dyn();
        let mut fits = Fits::new(Header::default(), Some(data));
        let mut out = Vec::new();
        fits.write(&mut out, ElementKind::I16).unwrap();
        assert_eq!(fits.header.get("BSCALE"), Some("1.0"));
        assert_eq!(fits.header.get("BZERO"), Some("7.5"));
        let got = Fits::read(&out[..]).unwrap().data.unwrap();
        assert!(got.iter().all(|v| (v - 7.5).abs() <= 1.0));
    }

    #[test]
    fn stale_axes_removed() {
        let mut h = Header::default();
        h.set("NAXIS3", "7");
        let data = Array2::<f64>::zeros((2, 2)).into_dyn();
        let mut fits = Fits::new(h, Some(data));
        fits.write(Vec::new(), ElementKind::F32).unwrap();
        assert_eq!(fits.header.get("NAXIS3"), None);
        assert_eq!(fits.header.get("NAXIS"), Some("2"));
    }

    #[test]
    fn element_kinds() {
        assert_eq!(ElementKind::from_bitpix(-32).unwrap(), ElementKind::F32);
        assert_eq!(ElementKind::from_bitpix(0).unwrap(), ElementKind::HeaderOnly);
        assert!(matches!(
            ElementKind::from_bitpix(8),
            Err(Error::UnsupportedBitpix(8))
        ));
        assert_eq!(ElementKind::I16.size(), 2);
    }
}
