//! 論理チャンネル番号を運ぶ各種の私的記述子。

use crate::utils::BytesExt;

use super::base::RawDescriptor;
use super::dvb::pds;

/// 論理チャンネル番号の1項目。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcnEntry {
    /// サービス識別。
    pub service_id: u16,
    /// 論理チャンネル番号。
    pub lcn: u16,
    /// 表示可能かどうか。
    pub visible: bool,
    /// 記述子自体が指定するトランスポートストリーム識別。
    pub transport_stream_id: Option<u16>,
    /// 記述子自体が指定するオリジナルネットワーク識別。
    pub original_network_id: Option<u16>,
}

impl LcnEntry {
    #[inline]
    fn new(service_id: u16, lcn: u16, visible: bool) -> LcnEntry {
        LcnEntry {
            service_id,
            lcn,
            visible,
            transport_stream_id: None,
            original_network_id: None,
        }
    }
}

/// 論理チャンネル番号記述子の種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalChannelDescriptor<'a> {
    /// EACEM・EICTA・DTGの論理チャンネル記述子（タグ0x83）。
    Eacem(&'a [u8]),
    /// EACEMのHDサイマルキャスト論理チャンネル記述子（タグ0x88）。
    HdSimulcast(&'a [u8]),
    /// NorDigの論理チャンネル記述子バージョン1（タグ0x83）。
    NorDigV1(&'a [u8]),
    /// NorDigの論理チャンネル記述子バージョン2（タグ0x87）。
    NorDigV2(&'a [u8]),
    /// Eutelsatのチャンネル番号記述子（タグ0x83）。
    Eutelsat(&'a [u8]),
    /// BSkyBの論理チャンネル番号記述子（タグ0xB1）。
    Sky(&'a [u8]),
}

impl<'a> LogicalChannelDescriptor<'a> {
    /// 私的データ指定子`pds`の下にある`desc`が論理チャンネル番号記述子であればそれを返す。
    ///
    /// 私的データ指定子のない（`pds`が0の）タグ0x83はEACEMのものとみなす。
    pub fn new(pds: u32, desc: &RawDescriptor<'a>) -> Option<LogicalChannelDescriptor<'a>> {
        let data = desc.data;
        match (desc.tag, pds) {
            (0x83, 0 | pds::EACEM | pds::OFCOM) => Some(LogicalChannelDescriptor::Eacem(data)),
            (0x83, pds::NORDIG) => Some(LogicalChannelDescriptor::NorDigV1(data)),
            (0x83, pds::EUTELSAT) => Some(LogicalChannelDescriptor::Eutelsat(data)),
            (0x88, pds::EACEM) => Some(LogicalChannelDescriptor::HdSimulcast(data)),
            (0x87, pds::NORDIG) => Some(LogicalChannelDescriptor::NorDigV2(data)),
            (0xB1, pds::BSKYB) => Some(LogicalChannelDescriptor::Sky(data)),
            _ => None,
        }
    }

    /// 記述子に含まれる論理チャンネル番号を返す。
    ///
    /// 末尾の不完全な項目は無視する。
    pub fn entries(&self) -> Vec<LcnEntry> {
        match *self {
            LogicalChannelDescriptor::Eacem(data) | LogicalChannelDescriptor::HdSimulcast(data) => {
                data.chunks_exact(4)
                    .map(|c| {
                        LcnEntry::new(c[0..=1].read_be_16(), c[2..=3].read_be_16() & 0x03FF, c[2] & 0x80 != 0)
                    })
                    .collect()
            }
            LogicalChannelDescriptor::NorDigV1(data) => data
                .chunks_exact(4)
                .map(|c| LcnEntry::new(c[0..=1].read_be_16(), c[2..=3].read_be_16() & 0x3FFF, c[2] & 0x80 != 0))
                .collect(),
            LogicalChannelDescriptor::NorDigV2(data) => read_nordig_v2(data),
            LogicalChannelDescriptor::Eutelsat(data) => data
                .chunks_exact(8)
                .map(|c| LcnEntry {
                    service_id: c[4..=5].read_be_16(),
                    lcn: c[6..=7].read_be_16() & 0x0FFF,
                    visible: true,
                    transport_stream_id: Some(c[2..=3].read_be_16()),
                    original_network_id: Some(c[0..=1].read_be_16()),
                })
                .collect(),
            LogicalChannelDescriptor::Sky(data) => data
                .get(2..)
                .unwrap_or_default()
                .chunks_exact(9)
                .map(|c| LcnEntry::new(c[0..=1].read_be_16(), c[5..=6].read_be_16(), true))
                .collect(),
        }
    }
}

fn read_nordig_v2(mut data: &[u8]) -> Vec<LcnEntry> {
    let mut entries = Vec::new();
    // channel_list_id、channel_list_name、country_code、descriptor_lengthの繰り返し
    while let [_channel_list_id, name_length, ref rem @ ..] = *data {
        let Some(rem) = rem.get(name_length as usize + 3..) else {
            break;
        };
        let Some((&length, rem)) = rem.split_first() else {
            break;
        };
        let Some((list, rem)) = rem.split_at_checked(length as usize) else {
            log::debug!("invalid NorDig logical channel descriptor v2");
            break;
        };
        data = rem;

        entries.extend(list.chunks_exact(4).map(|c| {
            LcnEntry::new(c[0..=1].read_be_16(), c[2..=3].read_be_16() & 0x03FF, c[2] & 0x80 != 0)
        }));
    }
    entries
}
