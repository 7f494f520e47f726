//! `data:` URI handling for rendered surfaces.
//!
//! A surface is serialized to `data:<mime>[;base64],<payload>` and converted
//! back into raw bytes before upload. The payload after the first comma is
//! base64 when the header mentions `base64`, percent-encoded otherwise.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use facegate_types::{capture::ImagePayload, Result};
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::encoding_error;

pub const DEFAULT_MIME: &str = "text/plain";

const SCHEME: &str = "data:";

/// RFC 3986 unreserved characters stay as they are.
const PAYLOAD_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Base64,
    Percent,
}

/// Borrowed view over the parts of a data URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub encoding: PayloadEncoding,
    pub payload: &'a str,
}

impl<'a> DataUri<'a> {
    pub fn parse(uri: &'a str) -> Result<Self> {
        let Some(rest) = uri.strip_prefix(SCHEME) else {
            return Err(encoding_error("data URI must start with 'data:'"));
        };
        let Some((header, payload)) = rest.split_once(',') else {
            return Err(encoding_error("data URI has no ',' before its payload"));
        };
        let mime = header.split(';').next().unwrap_or_default().trim();
        let encoding = if header.contains("base64") {
            PayloadEncoding::Base64
        } else {
            PayloadEncoding::Percent
        };
        Ok(Self {
            mime: if mime.is_empty() { DEFAULT_MIME } else { mime },
            encoding,
            payload,
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        match self.encoding {
            PayloadEncoding::Base64 => {
                let compact: String = self
                    .payload
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                STANDARD
                    .decode(compact)
                    .map_err(|err| encoding_error(format!("invalid base64 payload: {err}")))
            }
            PayloadEncoding::Percent => Ok(percent_decode_str(self.payload).collect()),
        }
    }
}

/// Converts a data URI into an upload payload tagged with its MIME type.
pub fn to_payload(uri: &str) -> Result<ImagePayload> {
    let parsed = DataUri::parse(uri)?;
    let bytes = parsed.decode()?;
    Ok(ImagePayload::new(parsed.mime, bytes))
}

pub fn encode(mime: &str, bytes: &[u8], encoding: PayloadEncoding) -> String {
    match encoding {
        PayloadEncoding::Base64 => format!("{SCHEME}{mime};base64,{}", STANDARD.encode(bytes)),
        PayloadEncoding::Percent => {
            format!("{SCHEME}{mime},{}", percent_encode(bytes, PAYLOAD_SET))
        }
    }
}
