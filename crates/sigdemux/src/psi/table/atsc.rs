//! ATSC A/65（PSIP）で規定されるテーブルの定義。

use crate::pid::Pid;
use crate::psi::desc::{DescriptorBlock, DescriptorList};
use crate::psi::{CompleteTable, PsiSection, PsiTable};
use crate::text::AtscString;
use crate::time::DateTime;
use crate::utils::BytesExt;

use super::{check_table, tid};

/// 10ビットの長さに続く記述子群を`data`から読み取る。
fn read_descriptors_10(data: &[u8]) -> Option<(DescriptorBlock, &[u8])> {
    if data.len() < 2 {
        return None;
    }
    let length = data[0..=1].read_be_16() & 0x03FF;
    DescriptorBlock::read_with_len(&data[2..], length)
}

/// 単一のセクションからなるテーブルのデータ部を返す。
///
/// MGTとRRTは複数のセクションに分割されない。
fn single_section<'a>(table: &'a CompleteTable, name: &str) -> Option<&'a [u8]> {
    if table.sections.len() != 1 {
        log::debug!("{} has {} sections", name, table.sections.len());
        return None;
    }
    Some(table.sections[0].data())
}

/// MGTで示されるテーブル。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MgtTable {
    /// テーブル種別。
    pub table_type: u16,
    /// テーブルを運ぶPID。
    pub pid: Pid,
    /// テーブルのバージョン番号。
    pub version: u8,
    /// テーブルのバイト数。
    pub number_bytes: u32,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

/// MGT（Master Guide Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mgt {
    /// プロトコルバージョン。
    pub protocol_version: u8,
    /// テーブルを格納する配列。
    pub tables: Vec<MgtTable>,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

impl PsiTable for Mgt {
    fn read(table: &CompleteTable) -> Option<Mgt> {
        if !check_table(table, &[tid::MGT], "Mgt") {
            return None;
        }

        let data = single_section(table, "Mgt")?;
        if data.len() < 3 {
            log::debug!("invalid Mgt");
            return None;
        }
        let protocol_version = data[0];
        let tables_defined = data[1..=2].read_be_16();

        let mut data = &data[3..];
        let mut tables = Vec::with_capacity(tables_defined as usize);
        for _ in 0..tables_defined {
            if data.len() < 11 {
                log::debug!("invalid MgtTable");
                return None;
            }

            let table_type = data[0..=1].read_be_16();
            let pid = Pid::read(&data[2..=3]);
            let version = data[4] & 0b00011111;
            let number_bytes = data[5..=8].read_be_32();
            let Some((block, rem)) = DescriptorBlock::read(&data[9..]) else {
                log::debug!("invalid MgtTable::descriptors");
                return None;
            };
            data = rem;

            tables.push(MgtTable {
                table_type,
                pid,
                version,
                number_bytes,
                descriptors: block.into(),
            });
        }

        let Some((block, _)) = DescriptorBlock::read(data) else {
            log::debug!("invalid Mgt::descriptors");
            return None;
        };

        Some(Mgt {
            protocol_version,
            tables,
            descriptors: block.into(),
        })
    }
}

/// VCTの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VctKind {
    /// 地上波（TVCT）。
    Terrestrial,
    /// ケーブル（CVCT）。
    Cable,
}

/// VCTに含まれる仮想チャンネル。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VctChannel {
    /// 短いチャンネル名。
    pub short_name: String,
    /// メジャーチャンネル番号。
    pub major_channel_number: u16,
    /// マイナーチャンネル番号。
    pub minor_channel_number: u16,
    /// 変調方式。
    pub modulation_mode: u8,
    /// 搬送波周波数。
    pub carrier_frequency: u32,
    /// チャンネルを運ぶトランスポートストリームの識別。
    pub channel_tsid: u16,
    /// 放送番組番号（サービス識別）。
    pub program_number: u16,
    /// ETMの位置。
    pub etm_location: u8,
    /// 限定受信されるかどうか。
    pub access_controlled: bool,
    /// 隠しチャンネルかどうか。
    pub hidden: bool,
    /// ケーブルのパス選択。
    pub path_select: bool,
    /// ケーブルの帯域外で運ばれるかどうか。
    pub out_of_band: bool,
    /// 番組表で隠すかどうか。
    pub hide_guide: bool,
    /// サービス種別。
    pub service_type: u8,
    /// ソース識別。
    pub source_id: u16,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

/// VCT（Virtual Channel Table）。TVCTとCVCTで共通の形式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vct {
    /// VCTの種類。
    pub kind: VctKind,
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// プロトコルバージョン。
    pub protocol_version: u8,
    /// 仮想チャンネルを格納する配列。
    pub channels: Vec<VctChannel>,
    /// 追加の記述子群。
    pub descriptors: DescriptorList,
}

impl PsiTable for Vct {
    fn read(table: &CompleteTable) -> Option<Vct> {
        if !check_table(table, &[tid::TVCT, tid::CVCT], "Vct") {
            return None;
        }

        let mut protocol_version = 0;
        let mut channels = Vec::new();
        let mut descriptors = DescriptorList::new();
        for data in table.payloads() {
            let [version, num_channels, ref data @ ..] = *data else {
                log::debug!("invalid Vct");
                return None;
            };
            protocol_version = version;

            let mut data = data;
            for _ in 0..num_channels {
                let Some((channel, rem)) = read_channel(data) else {
                    log::debug!("invalid VctChannel");
                    return None;
                };
                data = rem;
                channels.push(channel);
            }

            let Some((block, _)) = read_descriptors_10(data) else {
                log::debug!("invalid Vct::additional_descriptors");
                return None;
            };
            for desc in block.iter() {
                descriptors.push(desc.tag, desc.data);
            }
        }

        Some(Vct {
            kind: if table.table_id == tid::TVCT {
                VctKind::Terrestrial
            } else {
                VctKind::Cable
            },
            transport_stream_id: table.table_id_extension,
            protocol_version,
            channels,
            descriptors,
        })
    }
}

fn read_channel(data: &[u8]) -> Option<(VctChannel, &[u8])> {
    if data.len() < 32 {
        return None;
    }

    let short_name = crate::text::decode_utf16_be(&data[0..14]);
    let major_channel_number = ((data[14] as u16 & 0x0F) << 6) | (data[15] as u16 >> 2);
    let minor_channel_number = ((data[15] as u16 & 0x03) << 8) | data[16] as u16;
    let (descriptors, rem) = read_descriptors_10(&data[30..])?;

    let channel = VctChannel {
        short_name,
        major_channel_number,
        minor_channel_number,
        modulation_mode: data[17],
        carrier_frequency: data[18..=21].read_be_32(),
        channel_tsid: data[22..=23].read_be_16(),
        program_number: data[24..=25].read_be_16(),
        etm_location: data[26] >> 6,
        access_controlled: data[26] & 0b00100000 != 0,
        hidden: data[26] & 0b00010000 != 0,
        path_select: data[26] & 0b00001000 != 0,
        out_of_band: data[26] & 0b00000100 != 0,
        hide_guide: data[26] & 0b00000010 != 0,
        service_type: data[27] & 0b00111111,
        source_id: data[28..=29].read_be_16(),
        descriptors: descriptors.into(),
    };
    Some((channel, rem))
}

/// RRTの格付け値。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrtValue {
    /// 省略した格付け値。
    pub abbrev_rating_value: Vec<AtscString>,
    /// 格付け値。
    pub rating_value: Vec<AtscString>,
}

/// RRTの格付けの次元。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrtDimension {
    /// 次元の名前。
    pub name: Vec<AtscString>,
    /// 段階的な尺度かどうか。
    pub graduated_scale: bool,
    /// 格付け値を格納する配列。
    pub values: Vec<RrtValue>,
}

/// RRT（Rating Region Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rrt {
    /// 格付け地域。
    pub rating_region: u8,
    /// プロトコルバージョン。
    pub protocol_version: u8,
    /// 格付け地域の名前。
    pub name: Vec<AtscString>,
    /// 次元を格納する配列。
    pub dimensions: Vec<RrtDimension>,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

/// 8ビットの長さに続くマルチプル文字列構造を読み取る。
fn read_mss(data: &[u8]) -> Option<(Vec<AtscString>, &[u8])> {
    let (&length, rem) = data.split_first()?;
    let (mss, rem) = rem.split_at_checked(length as usize)?;
    Some((crate::text::decode_atsc_multiple_string(mss)?, rem))
}

impl PsiTable for Rrt {
    fn read(table: &CompleteTable) -> Option<Rrt> {
        if !check_table(table, &[tid::RRT], "Rrt") {
            return None;
        }

        let data = single_section(table, "Rrt")?;
        let Some((&protocol_version, data)) = data.split_first() else {
            log::debug!("invalid Rrt");
            return None;
        };
        let Some((name, data)) = read_mss(data) else {
            log::debug!("invalid Rrt::rating_region_name");
            return None;
        };
        let Some((&dimensions_defined, mut data)) = data.split_first() else {
            log::debug!("invalid Rrt::dimensions_defined");
            return None;
        };

        let mut dimensions = Vec::with_capacity(dimensions_defined as usize);
        for _ in 0..dimensions_defined {
            let Some((name, rem)) = read_mss(data) else {
                log::debug!("invalid RrtDimension::name");
                return None;
            };
            let Some((&flags, mut rem)) = rem.split_first() else {
                log::debug!("invalid RrtDimension");
                return None;
            };

            let values_defined = flags & 0b00001111;
            let mut values = Vec::with_capacity(values_defined as usize);
            for _ in 0..values_defined {
                let Some((abbrev_rating_value, r)) = read_mss(rem) else {
                    log::debug!("invalid RrtValue::abbrev_rating_value");
                    return None;
                };
                let Some((rating_value, r)) = read_mss(r) else {
                    log::debug!("invalid RrtValue::rating_value");
                    return None;
                };
                rem = r;
                values.push(RrtValue {
                    abbrev_rating_value,
                    rating_value,
                });
            }
            data = rem;

            dimensions.push(RrtDimension {
                name,
                graduated_scale: flags & 0b00010000 != 0,
                values,
            });
        }

        let Some((block, _)) = read_descriptors_10(data) else {
            log::debug!("invalid Rrt::descriptors");
            return None;
        };

        Some(Rrt {
            rating_region: table.table_id_extension as u8,
            protocol_version,
            name,
            dimensions,
            descriptors: block.into(),
        })
    }
}

/// STT（System Time Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stt {
    /// プロトコルバージョン。
    pub protocol_version: u8,
    /// GPSエポックからの秒数。
    pub system_time: u32,
    /// GPSとUTCの間のうるう秒補正。
    pub gps_utc_offset: u8,
    /// 夏時間の状態。
    pub daylight_saving: u16,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

impl Stt {
    /// 単一のセクションから`Stt`を読み取る。
    ///
    /// STTはバージョン番号を変えずに内容が変わるため、テーブルとしてではなくセクションごとに読み取る。
    pub fn read_section(psi: &PsiSection) -> Option<Stt> {
        if psi.table_id != tid::STT || psi.syntax.is_none() {
            log::debug!("invalid Stt::table_id: {:02X}", psi.table_id);
            return None;
        }

        let data = psi.data;
        if data.len() < 8 {
            log::debug!("invalid Stt");
            return None;
        }

        Some(Stt {
            protocol_version: data[0],
            system_time: data[1..=4].read_be_32(),
            gps_utc_offset: data[5],
            daylight_saving: data[6..=7].read_be_16(),
            descriptors: DescriptorBlock::new(&data[8..]).into(),
        })
    }

    /// UTCでの現在時刻を返す。
    #[inline]
    pub fn utc_time(&self) -> DateTime {
        DateTime::from_gps(self.system_time, self.gps_utc_offset)
    }
}

impl PsiTable for Stt {
    fn read(table: &CompleteTable) -> Option<Stt> {
        if !check_table(table, &[tid::STT], "Stt") {
            return None;
        }
        Stt::read_section(&table.sections[0].as_psi())
    }
}
