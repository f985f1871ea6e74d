//! NumPy `.npy` arrays of byte-string tokens
//!
//! Image requests arrive as one-dimensional NumPy arrays whose elements are
//! base85 text. Only fixed-width byte strings (`|S`) and unicode strings
//! (`<U`, `>U`) are understood; object arrays need a Python unpickler and
//! are rejected.

use thiserror::Error;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NpyError {
    #[error("not a .npy payload: missing magic string")]
    BadMagic,

    #[error("unsupported .npy format version {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("truncated .npy payload: {0}")]
    Truncated(&'static str),

    #[error("malformed .npy header: {0}")]
    BadHeader(String),

    #[error("unsupported .npy dtype '{0}'; expected byte or unicode strings")]
    UnsupportedDtype(String),
}

/// Element layout of a string array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    Bytes { width: usize },
    Unicode { width: usize, big_endian: bool },
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self, NpyError> {
        let unsupported = || NpyError::UnsupportedDtype(descr.to_string());
        if !descr.is_ascii() {
            return Err(unsupported());
        }
        let (order, rest) = descr.split_at(descr.len().min(1));
        let (kind, width) = rest.split_at(rest.len().min(1));
        let width: usize = width.parse().map_err(|_| unsupported())?;
        match (order, kind) {
            ("|", "S") | ("|", "V") => Ok(Dtype::Bytes { width }),
            ("<", "U") | ("=", "U") | (">", "U") if width.checked_mul(4).is_none() => {
                Err(unsupported())
            }
            ("<", "U") | ("=", "U") => Ok(Dtype::Unicode { width, big_endian: false }),
            (">", "U") => Ok(Dtype::Unicode { width, big_endian: true }),
            _ => Err(unsupported()),
        }
    }

    fn item_size(&self) -> usize {
        match self {
            Dtype::Bytes { width } => *width,
            Dtype::Unicode { width, .. } => width * 4,
        }
    }
}

#[derive(Debug)]
struct Header {
    dtype: Dtype,
    shape: Vec<usize>,
}

/// Decode a `.npy` string array into its elements in C order.
///
/// Trailing NUL padding is stripped from each element, as NumPy does when
/// indexing fixed-width string arrays.
pub fn decode_tokens(payload: &[u8]) -> Result<Vec<Vec<u8>>, NpyError> {
    let (header, data) = read_header(payload)?;
    let count = header
        .shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| NpyError::BadHeader(format!("shape {:?} overflows", header.shape)))?;
    let item_size = header.dtype.item_size();

    // Zero-width elements leave the count unbounded by the data length
    if item_size == 0 {
        if count > 0 {
            return Err(NpyError::BadHeader(format!(
                "zero-width elements with shape {:?}",
                header.shape
            )));
        }
        return Ok(Vec::new());
    }

    let needed = count
        .checked_mul(item_size)
        .ok_or(NpyError::Truncated("element data"))?;
    if data.len() < needed {
        return Err(NpyError::Truncated("element data"));
    }

    let tokens = data[..needed]
        .chunks(item_size)
        .map(|raw| match header.dtype {
            Dtype::Bytes { .. } => {
                let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                raw[..end].to_vec()
            }
            Dtype::Unicode { big_endian, .. } => {
                let text: String = raw
                    .chunks(4)
                    .map(|c| {
                        let bytes = [c[0], c[1], c[2], c[3]];
                        if big_endian {
                            u32::from_be_bytes(bytes)
                        } else {
                            u32::from_le_bytes(bytes)
                        }
                    })
                    .take_while(|&code| code != 0)
                    .filter_map(char::from_u32)
                    .collect();
                text.into_bytes()
            }
        })
        .collect();

    Ok(tokens)
}

/// Encode tokens as a one-dimensional `|S` array in format version 1.0
pub fn encode_tokens<T: AsRef<[u8]>>(tokens: &[T]) -> Vec<u8> {
    let width = tokens
        .iter()
        .map(|t| t.as_ref().len())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut header = format!(
        "{{'descr': '|S{}', 'fortran_order': False, 'shape': ({},), }}",
        width,
        tokens.len()
    );
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let pad = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(pad));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + width * tokens.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for token in tokens {
        let token = token.as_ref();
        out.extend_from_slice(token);
        out.resize(out.len() + (width - token.len()), 0);
    }
    out
}

fn read_header(payload: &[u8]) -> Result<(Header, &[u8]), NpyError> {
    if payload.len() < MAGIC.len() + 2 || &payload[..MAGIC.len()] != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let (major, minor) = (payload[6], payload[7]);
    let (header_len, offset) = match major {
        1 => {
            let raw = payload.get(8..10).ok_or(NpyError::Truncated("header length"))?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 10)
        }
        2 | 3 => {
            let raw = payload.get(8..12).ok_or(NpyError::Truncated("header length"))?;
            (u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize, 12)
        }
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };

    let raw_header = payload
        .get(offset..offset + header_len)
        .ok_or(NpyError::Truncated("header"))?;
    let text = std::str::from_utf8(raw_header)
        .map_err(|e| NpyError::BadHeader(e.to_string()))?;

    let descr = dict_value(text, "descr")?;
    let descr = descr
        .strip_prefix('\'')
        .and_then(|d| d.split('\'').next())
        .ok_or_else(|| NpyError::UnsupportedDtype(descr.to_string()))?;
    let dtype = Dtype::parse(descr)?;

    let shape = dict_value(text, "shape")?;
    let shape = shape
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(|| NpyError::BadHeader(format!("bad shape {}", shape)))?;
    let shape = shape
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| NpyError::BadHeader(format!("bad dimension '{}'", dim)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((Header { dtype, shape }, &payload[offset + header_len..]))
}

/// Text following `'key':` in the header dictionary literal
fn dict_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let needle = format!("'{}':", key);
    header
        .find(&needle)
        .map(|pos| header[pos + needle.len()..].trim_start())
        .ok_or_else(|| NpyError::BadHeader(format!("missing '{}'", key)))
}
