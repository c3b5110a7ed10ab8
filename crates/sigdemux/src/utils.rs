use std::fmt;

/// バイト列用拡張トレイト。
pub trait BytesExt {
    /// ビッグエンディアンで16ビット符号無し整数を読み込む。
    ///
    /// 事前に長さが2以上あると分かるようなコードであれば最適化が期待できる。
    fn read_be_16(&self) -> u16;

    /// ビッグエンディアンで24ビット符号無し整数を読み込む。
    fn read_be_24(&self) -> u32;

    /// ビッグエンディアンで32ビット符号無し整数を読み込む。
    ///
    /// 事前に長さが4以上あると分かるようなコードであれば最適化が期待できる。
    fn read_be_32(&self) -> u32;
}

impl BytesExt for [u8] {
    #[inline]
    fn read_be_16(&self) -> u16 {
        u16::from_be_bytes([self[0], self[1]])
    }

    #[inline]
    fn read_be_24(&self) -> u32 {
        u32::from_be_bytes([0, self[0], self[1], self[2]])
    }

    #[inline]
    fn read_be_32(&self) -> u32 {
        u32::from_be_bytes([self[0], self[1], self[2], self[3]])
    }
}

impl<const N: usize> BytesExt for [u8; N] {
    #[inline]
    fn read_be_16(&self) -> u16 {
        self[..].read_be_16()
    }

    #[inline]
    fn read_be_24(&self) -> u32 {
        self[..].read_be_24()
    }

    #[inline]
    fn read_be_32(&self) -> u32 {
        self[..].read_be_32()
    }
}

/// BCDで表された2桁の値を読み込む。
#[inline]
pub fn read_bcd_digit(n: u8) -> u8 {
    (n >> 4) * 10 + (n & 0x0F)
}

/// 要素数`N`のヒープに確保される配列を、`f`を呼び出した戻り値で生成する。
pub fn boxed_array<T, const N: usize, F>(f: F) -> Box<[T; N]>
where
    F: FnMut(usize) -> T,
{
    let slice = (0..N).map(f).collect::<Vec<T>>().into_boxed_slice();

    // Safety: 要素数の分かっている`Box<[T]>`から`Box<[T; N]>`への変換でしかない
    unsafe { Box::from_raw(Box::into_raw(slice) as *mut [T; N]) }
}

/// 大文字小文字と空白を無視して2つの文字列が等しいかどうかを返す。
pub fn similar(a: &str, b: &str) -> bool {
    let mut a = a.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase);
    let mut b = b.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x == y => {}
            _ => return false,
        }
    }
}

/// 10進数または`0x`で始まる16進数の文字列を`u16`として読み取る。
///
/// 前後の空白と3桁区切りの`,`は無視する。
pub fn parse_u16(s: &str) -> Option<u16> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };

    let digits: String = digits.chars().filter(|&c| c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u16::from_str_radix(&digits, radix).ok()
}

/// 値を大文字の16進数で表示するためのラッパー。
pub struct UpperHex<T>(pub T);

impl<T: fmt::UpperHex> fmt::Debug for UpperHex<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// 条件が常に一致しているものとして事前条件を示す。
///
/// 後続する処理ではこの条件が満たされることを前提とした最適化が行われる可能性がある。
///
/// # Safety
///
/// この条件が満たされない場合の動作は未定義である。
macro_rules! assume {
    ($cond:expr) => {{
        if cfg!(debug_assertions) {
            assert!($cond);
        } else if !($cond) {
            std::hint::unreachable_unchecked();
        }
    }};
}

/// 内包する整数の書式指定を委譲する。
macro_rules! delegate_fmt {
    ($name:ident) => {
        impl std::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.get(), f)
            }
        }

        impl std::fmt::Binary for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Binary::fmt(&self.get(), f)
            }
        }

        impl std::fmt::Octal for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Octal::fmt(&self.get(), f)
            }
        }

        impl std::fmt::LowerHex for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::LowerHex::fmt(&self.get(), f)
            }
        }

        impl std::fmt::UpperHex for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::UpperHex::fmt(&self.get(), f)
            }
        }
    };
}

// マクロはpub useできない
pub(crate) use assume;
pub(crate) use delegate_fmt;
