//! 記述子やテーブルに含まれる文字列のデコード。

use crate::utils::BytesExt;

/// DVBの文字列（ETSI EN 300 468 付属書A）をデコードする。
///
/// 先頭の文字コード選択バイトに応じて、UTF-16（BMP）・UTF-8・ISO/IEC 8859-1として読む。
/// それ以外の1バイト文字コードと既定の文字コード（ISO/IEC 6937）は、
/// ASCIIの範囲を除き1バイトを1文字として近似する。
pub fn decode_dvb(data: &[u8]) -> String {
    let Some(&first) = data.first() else {
        return String::new();
    };

    match first {
        0x01..=0x0B => decode_single_byte(&data[1..]),
        0x10 => decode_single_byte(data.get(3..).unwrap_or_default()),
        0x11 => decode_utf16_be(&data[1..]),
        0x15 => String::from_utf8_lossy(&data[1..])
            .chars()
            .filter(|c| !c.is_control() || *c == '\n')
            .collect(),
        0x1F => decode_single_byte(data.get(2..).unwrap_or_default()),
        0x00..=0x1F => {
            log::debug!("unsupported dvb character table: {:02X}", first);
            decode_single_byte(&data[1..])
        }
        _ => decode_single_byte(data),
    }
}

fn decode_single_byte(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len());
    for &b in data {
        match b {
            // 強調の開始・終了
            0x86 | 0x87 => {}
            // CR/LF
            0x8A => s.push('\n'),
            0x00..=0x1F | 0x7F..=0x9F => {}
            b => s.push(b as char),
        }
    }
    s
}

/// UTF-16（ビッグエンディアン）の文字列をデコードする。
///
/// 末尾のNUL文字は取り除く。
pub fn decode_utf16_be(data: &[u8]) -> String {
    let units = data.chunks_exact(2).map(|c| c.read_be_16());
    let s: String = char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    s.trim_end_matches('\0').to_owned()
}

/// ATSCのマルチプル文字列構造（ATSC A/65 6.10）における文字列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtscString {
    /// ISO 639の言語コード。
    pub language: [u8; 3],
    /// 文字列。
    pub text: String,
}

/// ATSCのマルチプル文字列構造を読み取る。
///
/// 非圧縮のセグメントのみデコードし、圧縮されたセグメントは読み飛ばす。
/// 構造として不正な場合は`None`を返す。
pub fn decode_atsc_multiple_string(data: &[u8]) -> Option<Vec<AtscString>> {
    let Some((&number_strings, mut data)) = data.split_first() else {
        return Some(Vec::new());
    };

    let mut strings = Vec::with_capacity(number_strings as usize);
    for _ in 0..number_strings {
        let [l1, l2, l3, number_segments, ref rem @ ..] = *data else {
            log::debug!("invalid AtscString");
            return None;
        };
        data = rem;

        let mut text = String::new();
        for _ in 0..number_segments {
            let [compression_type, mode, number_bytes, ref rem @ ..] = *data else {
                log::debug!("invalid AtscString::segment");
                return None;
            };
            let (bytes, rem) = rem.split_at_checked(number_bytes as usize)?;
            data = rem;

            match (compression_type, mode) {
                (0x00, 0x3F) => text.push_str(&decode_utf16_be(bytes)),
                (0x00, 0x00..=0x33) => {
                    text.extend(
                        bytes
                            .iter()
                            .filter_map(|&b| char::from_u32((mode as u32) << 8 | b as u32)),
                    );
                }
                _ => log::debug!(
                    "unsupported AtscString segment: compression={:02X}, mode={:02X}",
                    compression_type,
                    mode,
                ),
            }
        }

        strings.push(AtscString {
            language: [l1, l2, l3],
            text,
        });
    }

    Some(strings)
}
