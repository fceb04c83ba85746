/*
 * text.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of urlloader, a callback-based URL loading library.
 *
 * urlloader is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * urlloader is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with urlloader.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Text view of received bytes.
//!
//! The charset comes from the response's Content-Type. A byte order mark wins over the
//! declared label; an absent or unknown label falls back to UTF-8. Decoding is strict:
//! malformed input is a `Decode` error, never replacement characters.

use encoding_rs::{Encoding, UTF_8};

use crate::error::{LoaderError, Result};

pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<String> {
    let declared = charset.and_then(|label| {
        let encoding = Encoding::for_label(label.trim().as_bytes());
        if encoding.is_none() {
            log::debug!("unknown charset {:?}, decoding as UTF-8", label);
        }
        encoding
    });
    let (encoding, bom_len) = match Encoding::for_bom(bytes) {
        Some((encoding, len)) => (encoding, len),
        None => (declared.unwrap_or(UTF_8), 0),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .map(|text| text.into_owned())
        .ok_or(LoaderError::Decode {
            encoding: encoding.name(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_utf8() {
        assert_eq!(decode_text("h\u{e9}llo".as_bytes(), None).unwrap(), "h\u{e9}llo");
        assert_eq!(decode_text(b"", None).unwrap(), "");
    }

    #[test]
    fn honours_declared_charset() {
        assert_eq!(decode_text(b"caf\xe9", Some("ISO-8859-1")).unwrap(), "caf\u{e9}");
        assert_eq!(
            decode_text(b"\x82\xa0", Some("Shift_JIS")).unwrap(),
            "\u{3042}"
        );
    }

    #[test]
    fn unknown_label_falls_back_to_utf8() {
        assert_eq!(decode_text(b"plain", Some("x-no-such-charset")).unwrap(), "plain");
    }

    #[test]
    fn bom_overrides_label() {
        let bytes = b"\xff\xfeh\x00i\x00";
        assert_eq!(decode_text(bytes, Some("utf-8")).unwrap(), "hi");
    }

    #[test]
    fn malformed_input_is_an_error() {
        let err = decode_text(b"caf\xe9", Some("utf-8")).unwrap_err();
        match err {
            LoaderError::Decode { encoding } => assert_eq!(encoding, "UTF-8"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
