//! Incremental, lossy decoding of child output.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

use crate::error::RunError;
use crate::Result;

/// Locale variables consulted for the default encoding, in priority order.
const LOCALE_VARS: [&str; 3] = ["LC_ALL", "LC_CTYPE", "LANG"];

/// Resolve an encoding label, or derive one from the locale when absent.
pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            RunError::InvalidOption(format!("encoding: unknown encoding '{label}'"))
        }),
        None => Ok(locale_encoding()),
    }
}

/// Encoding named by the process locale, UTF-8 when it names none.
pub fn locale_encoding() -> &'static Encoding {
    let locale = LOCALE_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty());

    locale
        .as_deref()
        .and_then(encoding_from_locale)
        .unwrap_or(UTF_8)
}

/// Extract the codeset of a locale string such as `en_US.ISO-8859-1@euro`.
fn encoding_from_locale(locale: &str) -> Option<&'static Encoding> {
    let (_, codeset) = locale.split_once('.')?;
    let codeset = codeset.split('@').next().unwrap_or(codeset);
    Encoding::for_label(codeset.as_bytes())
}

/// Stateful decoder for one stream.
///
/// Bytes of a multi-byte sequence split across reads are held back until
/// the rest arrives. Invalid sequences become U+FFFD instead of errors.
pub struct StreamDecoder {
    decoder: Decoder,
}

impl StreamDecoder {
    /// Create a decoder for the given encoding.
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder_without_bom_handling(),
        }
    }

    /// Decode one chunk, holding back a trailing partial sequence.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.decode_chunk(bytes, false)
    }

    /// Flush whatever is held back, replacing an incomplete sequence.
    pub fn finish(mut self) -> String {
        self.decode_chunk(&[], true)
    }

    fn decode_chunk(&mut self, bytes: &[u8], last: bool) -> String {
        let mut text = String::new();
        let mut src = bytes;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len() * 3 + 16);
            text.reserve(needed);
            let (result, read, _) = self.decoder.decode_to_string(src, &mut text, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => return text,
                CoderResult::OutputFull => continue,
            }
        }
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("encoding", &self.decoder.encoding().name())
            .finish()
    }
}
