//! MPEG2-TSにおける時刻。

use std::fmt::{self, Write};

use crate::utils::{read_bcd_digit, BytesExt};

fn write_hundreds<W: Write>(w: &mut W, n: u8) -> fmt::Result {
    let h = b'0' + n / 10;
    let l = b'0' + n % 10;
    w.write_char(h as char)?;
    w.write_char(l as char)
}

/// PCR・PTS・DTSで用いられるタイムスタンプ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// 90kHz単位の値（33ビット）。
    pub base: u64,
    /// 27MHz単位の拡張（9ビット、0～299）。PTS・DTSでは常に0。
    pub extension: u16,
}

impl Timestamp {
    /// 基本部の最大値。
    pub const MAX_BASE: u64 = (1 << 33) - 1;

    /// `Timestamp`を生成する。
    #[inline]
    pub const fn new(base: u64, extension: u16) -> Timestamp {
        Timestamp { base, extension }
    }

    /// アダプテーションフィールド内の6バイトからPCRを読み取る。
    ///
    /// 拡張部が範囲外の場合は`None`を返す。
    pub fn read_pcr(data: &[u8; 6]) -> Option<Timestamp> {
        let base = ((data[0..=3].read_be_32() as u64) << 1) | (data[4] >> 7) as u64;
        let extension = ((data[4] & 0b00000001) as u16) << 8 | data[5] as u16;
        if extension >= 300 {
            return None;
        }

        Some(Timestamp { base, extension })
    }

    /// PESヘッダ内の5バイトからPTS・DTSを読み取る。
    ///
    /// マーカービットが不正な場合は`None`を返す。
    pub fn read_pts(data: &[u8; 5]) -> Option<Timestamp> {
        if data[0] & 0x01 == 0 || data[2] & 0x01 == 0 || data[4] & 0x01 == 0 {
            return None;
        }

        let base = ((data[0] as u64 & 0b00001110) << 29)
            | ((data[1] as u64) << 22)
            | ((data[2] as u64 & 0b11111110) << 14)
            | ((data[3] as u64) << 7)
            | ((data[4] as u64) >> 1);
        Some(Timestamp { base, extension: 0 })
    }

    /// 27MHz単位の値を返す。
    #[inline]
    pub const fn full(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }
}

/// 協定世界時による日付時刻。
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    /// 年（西暦）。
    pub year: u16,
    /// 月（1月＝1、12月＝12）。
    pub month: u8,
    /// 日（1～31）。
    pub day: u8,
    /// 時（0～23）。
    pub hour: u8,
    /// 分（0～59）。
    pub minute: u8,
    /// 秒（0～60）。
    pub second: u8,
}

impl DateTime {
    /// 1970年1月1日から数えたUNIX日における修正ユリウス日。
    const MJD_UNIX_EPOCH: i64 = 40587;
    /// GPSエポック（1980年1月6日）のUNIX時刻。
    const GPS_EPOCH: i64 = 315_964_800;

    /// 修正ユリウス日とBCDの時分秒からなる5バイト（ETSI EN 300 468 付属書C）を読み取る。
    pub fn read_mjd(data: &[u8; 5]) -> DateTime {
        let mjd = data[0..=1].read_be_16() as i64;
        let (year, month, day) = civil_from_days(mjd - Self::MJD_UNIX_EPOCH);

        DateTime {
            year,
            month,
            day,
            hour: read_bcd_digit(data[2]),
            minute: read_bcd_digit(data[3]),
            second: read_bcd_digit(data[4]),
        }
    }

    /// UNIX時刻（1970年1月1日からの秒数）から`DateTime`を生成する。
    ///
    /// 範囲外の値は1970年1月1日として扱う。
    pub fn from_unix(secs: i64) -> DateTime {
        let secs = secs.max(0);
        let (year, month, day) = civil_from_days(secs.div_euclid(86400));
        let rem = secs.rem_euclid(86400);

        DateTime {
            year,
            month,
            day,
            hour: (rem / 3600) as u8,
            minute: (rem % 3600 / 60) as u8,
            second: (rem % 60) as u8,
        }
    }

    /// GPSエポックからの秒数とGPS・UTC間のうるう秒補正からUTCの`DateTime`を生成する。
    #[inline]
    pub fn from_gps(gps_seconds: u32, gps_utc_offset: u8) -> DateTime {
        Self::from_unix(Self::GPS_EPOCH + gps_seconds as i64 - gps_utc_offset as i64)
    }

    /// UNIX時刻（1970年1月1日からの秒数）を返す。
    pub fn to_unix(&self) -> i64 {
        days_from_civil(self.year, self.month, self.day) * 86400
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        f.write_char('-')?;
        write_hundreds(f, self.month)?;
        f.write_char('-')?;
        write_hundreds(f, self.day)?;
        f.write_char(' ')?;

        write_hundreds(f, self.hour)?;
        f.write_char(':')?;
        write_hundreds(f, self.minute)?;
        f.write_char(':')?;
        write_hundreds(f, self.second)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// 1970年1月1日からの日数を年月日に変換する。
// http://howardhinnant.github.io/date_algorithms.html
fn civil_from_days(days: i64) -> (u16, u8, u8) {
    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

    (year as u16, month, day)
}

fn days_from_civil(year: u16, month: u8, day: u8) -> i64 {
    let year = year as i64 - if month <= 2 { 1 } else { 0 };
    let era = year.div_euclid(400);
    let yoe = year.rem_euclid(400);
    let month = month as i64;
    let doy = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    era * 146097 + doe - 719468
}
