//! 記述子の定義。

mod base;
mod dvb;
mod lcn;
mod mpeg;

pub use base::*;
pub use dvb::*;
pub use lcn::*;
pub use mpeg::*;

/// ストリームの分類に用いる記述子のタグ。
pub mod tag {
    /// 登録記述子。
    pub const REGISTRATION: u8 = 0x05;
    /// 限定受信記述子。
    pub const CA: u8 = 0x09;
    /// ISO 639言語記述子。
    pub const ISO_639_LANGUAGE: u8 = 0x0A;
    /// サービス記述子。
    pub const SERVICE: u8 = 0x48;
    /// VBIテレテキスト記述子。
    pub const VBI_TELETEXT: u8 = 0x46;
    /// テレテキスト記述子。
    pub const TELETEXT: u8 = 0x56;
    /// 字幕記述子。
    pub const SUBTITLING: u8 = 0x59;
    /// 私的データ指定子記述子。
    pub const PRIVATE_DATA_SPECIFIER: u8 = 0x5F;
    /// AC-3記述子。
    pub const AC3: u8 = 0x6A;
    /// 拡張AC-3記述子。
    pub const ENHANCED_AC3: u8 = 0x7A;
    /// DTS記述子。
    pub const DTS: u8 = 0x7B;
    /// AAC記述子。
    pub const AAC: u8 = 0x7C;
    /// 拡張記述子。
    pub const EXTENSION: u8 = 0x7F;
}
