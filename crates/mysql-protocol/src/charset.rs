//! Character encoding lookup for string primitives.
//!
//! String-valued wire fields are decoded with an encoding chosen by the
//! caller, usually derived from the connection's character set. Names are
//! accepted both as MySQL character set names (`utf8mb4`, `latin1`, `sjis`)
//! and as WHATWG labels (`utf-8`, `windows-1252`, `shift_jis`).
//!
//! | MySQL name | Encoding |
//! |------------|----------|
//! | `utf8`, `utf8mb3`, `utf8mb4` | UTF-8 |
//! | `latin1` | Windows-1252 (MySQL's latin1 is cp1252) |
//! | `latin2` | ISO-8859-2 |
//! | `ascii`, `binary` | Windows-1252 |
//! | `cp1250`, `cp1251`, `cp1256`, `cp1257` | matching Windows code page |
//! | `sjis`, `cp932` | Shift_JIS |
//! | `ujis`, `eucjpms` | EUC-JP |
//! | `gbk`, `gb2312`, `gb18030` | GB18030 / GBK |
//! | `big5` | Big5 |
//! | `euckr` | EUC-KR |
//! | `koi8r`, `koi8u` | KOI8-R / KOI8-U |
//! | `greek`, `hebrew` | ISO-8859-7 / ISO-8859-8 |

use std::borrow::Cow;

use encoding_rs::Encoding;

use crate::error::{ProtocolError, Result};

/// Resolve a character set name to an encoding.
///
/// Fails with [`ProtocolError::UnsupportedEncoding`] naming the offending
/// encoding when neither table knows it.
pub fn encoding_for_name(name: &str) -> Result<&'static Encoding> {
    let lower = name.trim().to_ascii_lowercase();

    let mysql = match lower.as_str() {
        "utf8" | "utf8mb3" | "utf8mb4" => Some(encoding_rs::UTF_8),
        "latin1" | "ascii" | "binary" => Some(encoding_rs::WINDOWS_1252),
        "latin2" => Some(encoding_rs::ISO_8859_2),
        "cp1250" => Some(encoding_rs::WINDOWS_1250),
        "cp1251" => Some(encoding_rs::WINDOWS_1251),
        "cp1256" => Some(encoding_rs::WINDOWS_1256),
        "cp1257" => Some(encoding_rs::WINDOWS_1257),
        "sjis" | "cp932" => Some(encoding_rs::SHIFT_JIS),
        "ujis" | "eucjpms" => Some(encoding_rs::EUC_JP),
        "gbk" | "gb2312" => Some(encoding_rs::GBK),
        "gb18030" => Some(encoding_rs::GB18030),
        "big5" => Some(encoding_rs::BIG5),
        "euckr" => Some(encoding_rs::EUC_KR),
        "koi8r" => Some(encoding_rs::KOI8_R),
        "koi8u" => Some(encoding_rs::KOI8_U),
        "greek" => Some(encoding_rs::ISO_8859_7),
        "hebrew" => Some(encoding_rs::ISO_8859_8),
        _ => None,
    };

    mysql
        .or_else(|| Encoding::for_label(lower.as_bytes()))
        .ok_or_else(|| ProtocolError::UnsupportedEncoding(name.to_string()))
}

/// Decode bytes with the named encoding.
///
/// Malformed input is an error rather than being replaced with U+FFFD.
pub fn decode(bytes: &[u8], encoding_name: &str) -> Result<String> {
    let encoding = encoding_for_name(encoding_name)?;
    decode_with(bytes, encoding)
}

/// Decode bytes with an already resolved encoding.
pub fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
        .ok_or(ProtocolError::MalformedString {
            encoding: encoding.name(),
        })
}

/// Encode a string with the named encoding.
///
/// Characters that the target encoding cannot represent are written as
/// HTML numeric character references, which is what `encoding_rs` does.
pub fn encode<'a>(s: &'a str, encoding_name: &str) -> Result<Cow<'a, [u8]>> {
    let encoding = encoding_for_name(encoding_name)?;
    let (bytes, _, _) = encoding.encode(s);
    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_names() {
        assert_eq!(encoding_for_name("utf8mb4").unwrap(), encoding_rs::UTF_8);
        assert_eq!(encoding_for_name("latin1").unwrap(), encoding_rs::WINDOWS_1252);
        assert_eq!(encoding_for_name("SJIS").unwrap(), encoding_rs::SHIFT_JIS);
    }

    #[test]
    fn test_whatwg_labels() {
        assert_eq!(encoding_for_name("utf-8").unwrap(), encoding_rs::UTF_8);
        assert_eq!(
            encoding_for_name("windows-1251").unwrap(),
            encoding_rs::WINDOWS_1251
        );
    }

    #[test]
    fn test_unsupported_names_the_encoding() {
        let err = encoding_for_name("klingon").unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedEncoding("klingon".into()));
        assert!(err.is_configuration());
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode(&[0x63, 0x61, 0x66, 0xE9], "latin1").unwrap(), "café");
    }

    #[test]
    fn test_decode_rejects_malformed_utf8() {
        let err = decode(&[0xC3, 0x28], "utf8").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedString { .. }));
    }

    #[test]
    fn test_encode_sjis() {
        let bytes = encode("日本", "sjis").unwrap();
        assert_eq!(decode(&bytes, "sjis").unwrap(), "日本");
    }
}
