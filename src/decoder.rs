//! 增量 UTF-8 解码模块
//!
//! 传输层按任意边界切分字节流，多字节字符可能被拆到两个块中。
//! `Utf8Decoder` 会暂存末尾不完整的字节序列，直到后续块将其补齐。
use crate::error::{ChatError, Result};
use bytes::BytesMut;
use log::warn;

/// 增量 UTF-8 解码器
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: BytesMut,
    lossy: bool,
    consumed: usize,
}

impl Utf8Decoder {
    /// 严格模式：非法字节序列返回 `ChatError::Decode`
    pub fn new() -> Self {
        Self::default()
    }

    /// 宽松模式：非法字节序列替换为 U+FFFD
    pub fn lossy() -> Self {
        Self {
            lossy: true,
            ..Self::default()
        }
    }

    /// 暂存的未解码字节数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 解码一个块，返回本次新增的文本
    ///
    /// 末尾不完整的字符不会出现在返回值中。
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(chunk);
        let buf = self.pending.split();
        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    self.consumed += rest.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid])?);
                    self.consumed += valid;
                    match e.error_len() {
                        // 不完整的尾部，留给下一个块
                        None => {
                            self.pending.extend_from_slice(&rest[valid..]);
                            break;
                        }
                        Some(len) if self.lossy => {
                            warn!("replacing {} invalid byte(s) at offset {}", len, self.consumed);
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.consumed += len;
                            rest = &rest[valid + len..];
                        }
                        Some(len) => {
                            return Err(ChatError::Decode(format!(
                                "invalid byte sequence of length {} at offset {}",
                                len, self.consumed
                            )));
                        }
                    }
                }
            }
        }

        Ok(out)
    }

    /// 以 final 模式冲刷剩余字节
    ///
    /// 流结束时仍未补齐的字符在严格模式下是错误。
    pub fn finish(&mut self) -> Result<String> {
        if self.pending.is_empty() {
            return Ok(String::new());
        }
        let leftover = self.pending.split();
        if self.lossy {
            warn!("stream ended inside a character, {} byte(s) replaced", leftover.len());
            Ok(char::REPLACEMENT_CHARACTER.to_string())
        } else {
            Err(ChatError::Decode(format!(
                "stream ended with {} byte(s) of an incomplete character",
                leftover.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello ").unwrap(), "hello ");
        assert_eq!(decoder.decode(b"world").unwrap(), "world");
        assert_eq!(decoder.finish().unwrap(), "");
    }

    /// A 3-byte character delivered as 1 byte then 2 bytes is held back until complete.
    #[test]
    fn test_three_byte_char_split_one_two() {
        let bytes = "€".as_bytes();
        assert_eq!(bytes.len(), 3);

        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]).unwrap(), "");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(&bytes[1..]).unwrap(), "€");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_every_split_point_reassembles() {
        let text = "你好, wörld 🌊!";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut out = decoder.decode(&bytes[..split]).unwrap();
            out.push_str(&decoder.decode(&bytes[split..]).unwrap());
            out.push_str(&decoder.finish().unwrap());
            assert_eq!(out, text, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let text = "🌊 ocean";
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(b)).unwrap());
        }
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_sequence_is_error_in_strict_mode() {
        let mut decoder = Utf8Decoder::new();
        let err = decoder.decode(&[b'a', 0xFF, b'b']).unwrap_err();
        assert!(matches!(err, ChatError::Decode(_)));
    }

    #[test]
    fn test_invalid_sequence_is_replaced_in_lossy_mode() {
        let mut decoder = Utf8Decoder::lossy();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b']).unwrap(), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_with_incomplete_tail() {
        let bytes = "€".as_bytes();

        let mut strict = Utf8Decoder::new();
        assert_eq!(strict.decode(&bytes[..2]).unwrap(), "");
        assert!(matches!(strict.finish(), Err(ChatError::Decode(_))));

        let mut lossy = Utf8Decoder::lossy();
        assert_eq!(lossy.decode(&bytes[..2]).unwrap(), "");
        assert_eq!(lossy.finish().unwrap(), "\u{FFFD}");
    }
}
