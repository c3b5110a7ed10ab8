//! MPEG2-TSのパケット。

use std::fmt;
use std::io::{self, Read};

use crate::pid::Pid;
use crate::time::Timestamp;

/// 同期バイト。
pub const SYNC_BYTE: u8 = 0x47;
/// TSパケットの大きさ。
pub const PACKET_SIZE: usize = 188;

/// MPEG2-TSのパケット。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Packet(pub [u8; PACKET_SIZE]);

impl Packet {
    /// `r`からTSパケットを順次読み込むイテレーターを生成する。
    ///
    /// # サンプル
    ///
    /// ```
    /// # fn main() -> std::io::Result<()> {
    /// # let file = &mut (&[] as &[u8]);
    /// for packet in sigdemux::Packet::iter(file) {
    ///     let packet = packet?;
    ///
    ///     // 同期バイトは常に正しい
    ///     assert_eq!(packet.sync_byte(), 0x47);
    ///     println!("PID：{:04X}", packet.pid());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    #[must_use]
    pub fn iter<R: Read>(r: R) -> PacketIter<R> {
        PacketIter { r }
    }

    /// `r`からTSパケットを読み込む。
    ///
    /// 原則として188バイトずつ読み込むが、同期バイトが見つからない部分は読み飛ばす。
    /// 入力の終端に達した場合は`None`を返す。
    pub fn read<R: Read>(r: R) -> io::Result<Option<Packet>> {
        fn read_inner<R: Read>(mut r: R) -> io::Result<Packet> {
            let mut packet = Packet([0; PACKET_SIZE]);
            r.read_exact(&mut packet.0)?;
            if packet.0[0] == SYNC_BYTE {
                return Ok(packet);
            }

            let mut may_resync = false;
            let pos = loop {
                if let Some(pos) = memchr::memchr(SYNC_BYTE, &packet.0) {
                    break pos;
                }

                r.read_exact(&mut packet.0)?;
                may_resync = true;
            };

            packet.0.copy_within(pos.., 0);
            r.read_exact(&mut packet.0[PACKET_SIZE - pos..])?;

            if may_resync || pos > 16 {
                // 同期バイトに見えて実はペイロードだった場合、次の同期バイト候補から読み直す
                while !packet.is_normal() {
                    let Some(pos) = memchr::memchr(SYNC_BYTE, &packet.0[1..]) else {
                        break;
                    };
                    let pos = pos + 1;

                    packet.0.copy_within(pos.., 0);
                    r.read_exact(&mut packet.0[PACKET_SIZE - pos..])?;
                }
            }
            Ok(packet)
        }

        match read_inner(r) {
            Ok(packet) => Ok(Some(packet)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// パケットが正常かどうかを返す。
    ///
    /// 同期バイトやトランスポートエラーインジケーターに加え、
    /// 制御値としてあり得ない状態であることも判断材料である。
    pub fn is_normal(&self) -> bool {
        if self.sync_byte() != SYNC_BYTE {
            return false;
        }
        if self.error_indicator() {
            return false;
        }
        if self.scrambling_control() == 0x01 {
            // 未定義スクランブル制御値
            return false;
        }
        match (self.adaptation_field_control(), self.adaptation_field_length_raw()) {
            (0b00, _) => false,
            (0b10, len) if len > 183 => false,
            (0b11, len) if len > 182 => false,
            _ => true,
        }
    }

    /// 同期バイトを返す。
    #[inline]
    pub fn sync_byte(&self) -> u8 {
        self.0[0]
    }

    /// トランスポートエラーインジケーターを返す。
    #[inline]
    pub fn error_indicator(&self) -> bool {
        self.0[1] & 0b10000000 != 0
    }

    /// ペイロードユニット開始インジケーターを返す。
    #[inline]
    pub fn unit_start_indicator(&self) -> bool {
        self.0[1] & 0b01000000 != 0
    }

    /// トランスポート優先度を返す。
    #[inline]
    pub fn priority(&self) -> bool {
        self.0[1] & 0b00100000 != 0
    }

    /// PIDを返す。
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid::read(&self.0[1..])
    }

    /// トランスポートスクランブル制御（2ビット）を返す。
    #[inline]
    pub fn scrambling_control(&self) -> u8 {
        (self.0[3] & 0b11000000) >> 6
    }

    /// パケットがスクランブル処理されているかを返す。
    #[inline]
    pub fn is_scrambled(&self) -> bool {
        self.scrambling_control() != 0
    }

    /// アダプテーションフィールド制御（2ビット）を返す。
    #[inline]
    pub fn adaptation_field_control(&self) -> u8 {
        (self.0[3] & 0b00110000) >> 4
    }

    /// 連続性指標（4ビット）を返す。
    #[inline]
    pub fn continuity_counter(&self) -> u8 {
        self.0[3] & 0b00001111
    }

    /// パケットがアダプテーションフィールドを含むかどうかを返す。
    #[inline]
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control() & 0b10 != 0
    }

    #[inline]
    fn adaptation_field_length_raw(&self) -> u8 {
        self.0[4]
    }

    /// アダプテーションフィールドがある場合、adaptation_field_lengthを返す。
    #[inline]
    pub fn adaptation_field_length(&self) -> Option<u8> {
        self.has_adaptation_field()
            .then(|| self.adaptation_field_length_raw())
    }

    /// アダプテーションフィールドを返す。
    #[inline]
    pub fn adaptation_field(&self) -> Option<AdaptationField> {
        AdaptationField::new(self)
    }

    /// パケットがペイロードを含むかどうかを返す。
    #[inline]
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control() & 0b01 != 0
    }

    /// ペイロードを返す。
    pub fn payload(&self) -> Option<&[u8]> {
        if !self.has_payload() {
            None
        } else if let Some(afl) = self.adaptation_field_length() {
            let offset = 4 + 1 + afl as usize;
            self.0.get(offset..).filter(|p| !p.is_empty())
        } else {
            self.0.get(4..)
        }
    }

    /// アダプテーションフィールドにPCRがあればそれを返す。
    #[inline]
    pub fn pcr(&self) -> Option<Timestamp> {
        self.adaptation_field().and_then(|af| af.pcr())
    }

    /// ペイロードがPESパケットの先頭であれば、そのPESヘッダを返す。
    pub fn pes_header(&self) -> Option<PesHeader> {
        if !self.unit_start_indicator() {
            return None;
        }
        PesHeader::read(self.payload()?)
    }

    /// PESヘッダにPTSがあればそれを返す。
    #[inline]
    pub fn pts(&self) -> Option<Timestamp> {
        self.pes_header().and_then(|h| h.pts)
    }

    /// PESヘッダにDTSがあればそれを返す。
    #[inline]
    pub fn dts(&self) -> Option<Timestamp> {
        self.pes_header().and_then(|h| h.dts)
    }

    /// 前回の連続性指標である`last_cc`を元にパケット順の正当性を確認する。
    ///
    /// `last_cc`の初期値は`0x10`以上とする。
    pub fn validate_cc(&self, last_cc: &mut u8) -> bool {
        let pid = self.pid();
        let cc = if self.has_payload() {
            self.continuity_counter()
        } else {
            0x10
        };
        let is_discontinuity = self
            .adaptation_field()
            .map_or(false, |af| af.discontinuity_indicator());
        let cc_ok = pid == Pid::NULL
            || is_discontinuity
            || cc >= 0x10
            || *last_cc >= 0x10
            || (*last_cc + 1) & 0x0F == cc;
        *last_cc = cc;

        cc_ok
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Packet")
            .field("error_indicator", &self.error_indicator())
            .field("unit_start_indicator", &self.unit_start_indicator())
            .field("pid", &self.pid())
            .field("scrambling_control", &self.scrambling_control())
            .field("adaptation_field_control", &self.adaptation_field_control())
            .field("continuity_counter", &self.continuity_counter())
            .finish_non_exhaustive()
    }
}

/// TSパケット内のアダプテーションフィールド。
#[derive(Debug)]
pub struct AdaptationField<'a>(&'a [u8]);

impl<'a> AdaptationField<'a> {
    #[inline]
    fn new(packet: &'a Packet) -> Option<AdaptationField<'a>> {
        packet
            .adaptation_field_length()
            .filter(|&length| length >= 1)
            .and_then(|length| packet.0.get(5..5 + length as usize))
            .map(AdaptationField)
    }

    #[inline]
    fn flags(&self) -> u8 {
        self.0[0]
    }

    /// 不連続性インジケーターを返す。
    #[inline]
    pub fn discontinuity_indicator(&self) -> bool {
        self.flags() & 0b10000000 != 0
    }

    /// ランダムアクセスインジケーターを返す。
    #[inline]
    pub fn random_access_indicator(&self) -> bool {
        self.flags() & 0b01000000 != 0
    }

    /// PCRフラグを返す。
    #[inline]
    pub fn pcr_flag(&self) -> bool {
        self.flags() & 0b00010000 != 0
    }

    /// オリジナルPCRフラグを返す。
    #[inline]
    pub fn original_pcr_flag(&self) -> bool {
        self.flags() & 0b00001000 != 0
    }

    fn read_pcr_at(&self, offset: usize) -> Option<Timestamp> {
        let data = self.0.get(offset..offset + 6)?;
        Timestamp::read_pcr(data.try_into().ok()?)
    }

    /// PCRを返す。
    pub fn pcr(&self) -> Option<Timestamp> {
        if !self.pcr_flag() {
            return None;
        }
        self.read_pcr_at(1)
    }

    /// オリジナルPCRを返す。
    pub fn original_pcr(&self) -> Option<Timestamp> {
        if !self.original_pcr_flag() {
            return None;
        }
        self.read_pcr_at(if self.pcr_flag() { 1 + 6 } else { 1 })
    }
}

/// PESパケットのヘッダ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesHeader {
    /// stream_id。
    pub stream_id: u8,
    /// PTS。
    pub pts: Option<Timestamp>,
    /// DTS。
    pub dts: Option<Timestamp>,
    /// PESヘッダ以降のデータの先頭位置。
    pub payload_offset: usize,
}

impl PesHeader {
    /// `data`の先頭にあるPESヘッダを読み取る。
    pub fn read(data: &[u8]) -> Option<PesHeader> {
        let [0x00, 0x00, 0x01, stream_id, _, _, ref rem @ ..] = *data else {
            return None;
        };

        // program_stream_map, padding_stream, private_stream_2, ECM, EMM,
        // program_stream_directory, DSMCC_stream, ITU-T Rec. H.222.1 type E
        // はオプショナルヘッダを持たない
        if matches!(stream_id, 0xBC | 0xBE | 0xBF | 0xF0 | 0xF1 | 0xFF | 0xF2 | 0xF8) {
            return Some(PesHeader {
                stream_id,
                pts: None,
                dts: None,
                payload_offset: 6,
            });
        }

        let [flags1, flags2, header_length, ref rem @ ..] = *rem else {
            return None;
        };
        if flags1 & 0b11000000 != 0b10000000 {
            return None;
        }
        let header = rem.get(..header_length as usize)?;

        let (pts, dts) = match flags2 >> 6 {
            0b10 => (Some(Timestamp::read_pts(header.get(0..5)?.try_into().ok()?)?), None),
            0b11 => (
                Some(Timestamp::read_pts(header.get(0..5)?.try_into().ok()?)?),
                Some(Timestamp::read_pts(header.get(5..10)?.try_into().ok()?)?),
            ),
            _ => (None, None),
        };

        Some(PesHeader {
            stream_id,
            pts,
            dts,
            payload_offset: 9 + header_length as usize,
        })
    }
}

/// [`Packet::iter`]から返される。TSパケットを順次読み込むイテレーター。
#[derive(Debug)]
pub struct PacketIter<R> {
    r: R,
}

impl<R: Read> Iterator for PacketIter<R> {
    type Item = io::Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        Packet::read(&mut self.r).transpose()
    }
}
