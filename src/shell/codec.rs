//! Text encoding for the game's stdin and stdout.

use encoding_rs::Encoding;

use super::ShellError;

/// Look up an encoding by WHATWG label (`utf-8`, `gbk`, `windows-1252`, ...).
#[must_use]
pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Decoder for output lines and encoder for command lines.
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    read: &'static Encoding,
    write: &'static Encoding,
}

impl TextCodec {
    /// Create a codec from encoding labels.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::UnknownEncoding` if either label is not recognised.
    pub fn new(read_label: &str, write_label: &str) -> Result<Self, ShellError> {
        let lookup = |label: &str| {
            resolve_encoding(label).ok_or_else(|| ShellError::UnknownEncoding(label.to_string()))
        };
        Ok(Self {
            read: lookup(read_label)?,
            write: lookup(write_label)?,
        })
    }

    #[must_use]
    pub fn utf8() -> Self {
        Self {
            read: encoding_rs::UTF_8,
            write: encoding_rs::UTF_8,
        }
    }

    /// Decode raw output bytes into a line with trailing whitespace removed.
    /// Malformed sequences are replaced, never rejected.
    #[must_use]
    pub fn decode_line(&self, bytes: &[u8]) -> String {
        let (text, _) = self.read.decode_without_bom_handling(bytes);
        text.trim_end().to_string()
    }

    /// Encode a command followed by a newline.
    #[must_use]
    pub fn encode_command(&self, command: &str) -> Vec<u8> {
        let line = format!("{command}\n");
        let (bytes, _, _) = self.write.encode(&line);
        bytes.into_owned()
    }

    #[must_use]
    pub fn read_encoding(&self) -> &'static str {
        self.read.name()
    }

    #[must_use]
    pub fn write_encoding(&self) -> &'static str {
        self.write.name()
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::utf8()
    }
}
