//! ETSI EN 300 468で規定されるテーブルの定義。

use crate::psi::desc::{DescriptorBlock, DescriptorList};
use crate::psi::{CompleteTable, PsiTable};
use crate::time::DateTime;
use crate::utils::BytesExt;

use super::{check_table, tid};

/// 進行状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunningStatus {
    /// 未定義。
    Undefined,
    /// 非実行中。
    NotRunning,
    /// 数秒以内に開始。
    StartsSoon,
    /// 停止中。
    Pausing,
    /// 実行中。
    Running,
    /// 放送休止中。
    OffAir,
    /// 予約。
    Reserved(u8),
}

impl From<u8> for RunningStatus {
    #[inline]
    fn from(value: u8) -> RunningStatus {
        match value {
            0 => RunningStatus::Undefined,
            1 => RunningStatus::NotRunning,
            2 => RunningStatus::StartsSoon,
            3 => RunningStatus::Pausing,
            4 => RunningStatus::Running,
            5 => RunningStatus::OffAir,
            v => RunningStatus::Reserved(v),
        }
    }
}

/// NITやBATに含まれるトランスポートストリーム。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStream {
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// オリジナルネットワーク識別。
    pub original_network_id: u16,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

/// NITとBATに共通する、記述子群とトランスポートストリームループ。
fn read_network_loops(
    table: &CompleteTable,
    name: &str,
) -> Option<(DescriptorList, Vec<TransportStream>)> {
    let mut descriptors = DescriptorList::new();
    let mut transports = Vec::new();
    for data in table.payloads() {
        let Some((block, data)) = DescriptorBlock::read(data) else {
            log::debug!("invalid {}::descriptors", name);
            return None;
        };
        for desc in block.iter() {
            descriptors.push(desc.tag, desc.data);
        }

        let Some((ts_loop, _)) = DescriptorBlock::read(data) else {
            log::debug!("invalid {}::transport_stream_loop_length", name);
            return None;
        };
        let mut data = ts_loop.as_bytes();
        while !data.is_empty() {
            if data.len() < 6 {
                log::debug!("invalid {}::transport_stream", name);
                return None;
            }

            let transport_stream_id = data[0..=1].read_be_16();
            let original_network_id = data[2..=3].read_be_16();
            let Some((block, rem)) = DescriptorBlock::read(&data[4..]) else {
                log::debug!("invalid {}::transport_descriptors", name);
                return None;
            };
            data = rem;

            transports.push(TransportStream {
                transport_stream_id,
                original_network_id,
                descriptors: block.into(),
            });
        }
    }

    Some((descriptors, transports))
}

/// NIT（Network Information Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nit {
    /// 自ネットワークのNITかどうか。
    pub is_actual: bool,
    /// ネットワーク識別。
    pub network_id: u16,
    /// バージョン番号。
    pub version: u8,
    /// ネットワーク記述子群。
    pub descriptors: DescriptorList,
    /// トランスポートストリームを格納する配列。
    pub transports: Vec<TransportStream>,
}

impl PsiTable for Nit {
    fn read(table: &CompleteTable) -> Option<Nit> {
        if !check_table(table, &[tid::NIT_ACT, tid::NIT_OTH], "Nit") {
            return None;
        }

        let (descriptors, transports) = read_network_loops(table, "Nit")?;
        Some(Nit {
            is_actual: table.table_id == tid::NIT_ACT,
            network_id: table.table_id_extension,
            version: table.version,
            descriptors,
            transports,
        })
    }
}

/// BAT（Bouquet Association Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bat {
    /// ブーケ識別。
    pub bouquet_id: u16,
    /// ブーケ記述子群。
    pub descriptors: DescriptorList,
    /// トランスポートストリームを格納する配列。
    pub transports: Vec<TransportStream>,
}

impl PsiTable for Bat {
    fn read(table: &CompleteTable) -> Option<Bat> {
        if !check_table(table, &[tid::BAT], "Bat") {
            return None;
        }

        let (descriptors, transports) = read_network_loops(table, "Bat")?;
        Some(Bat {
            bouquet_id: table.table_id_extension,
            descriptors,
            transports,
        })
    }
}

/// SDTに含まれるサービス。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdtService {
    /// サービス識別。
    pub service_id: u16,
    /// EIT［スケジュール］フラグ。
    pub eit_schedule_flag: bool,
    /// EIT［現在／次］フラグ。
    pub eit_present_following_flag: bool,
    /// 進行状態。
    pub running_status: RunningStatus,
    /// スクランブル。
    pub free_ca_mode: bool,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

/// SDT（Service Description Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdt {
    /// 自ストリームのSDTかどうか。
    pub is_actual: bool,
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// オリジナルネットワーク識別。
    pub original_network_id: u16,
    /// サービスを格納する配列。
    pub services: Vec<SdtService>,
}

impl PsiTable for Sdt {
    fn read(table: &CompleteTable) -> Option<Sdt> {
        if !check_table(table, &[tid::SDT_ACT, tid::SDT_OTH], "Sdt") {
            return None;
        }

        let mut original_network_id = 0;
        let mut services = Vec::new();
        for (i, data) in table.payloads().enumerate() {
            if data.len() < 3 {
                log::debug!("invalid Sdt");
                return None;
            }
            if i == 0 {
                original_network_id = data[0..=1].read_be_16();
            }

            let mut data = &data[3..];
            while !data.is_empty() {
                if data.len() < 5 {
                    log::debug!("invalid SdtService");
                    return None;
                }

                let service_id = data[0..=1].read_be_16();
                let eit_schedule_flag = data[2] & 0b00000010 != 0;
                let eit_present_following_flag = data[2] & 0b00000001 != 0;
                let running_status = ((data[3] & 0b11100000) >> 5).into();
                let free_ca_mode = data[3] & 0b00010000 != 0;
                let Some((block, rem)) = DescriptorBlock::read(&data[3..]) else {
                    log::debug!("invalid SdtService::descriptors");
                    return None;
                };
                data = rem;

                services.push(SdtService {
                    service_id,
                    eit_schedule_flag,
                    eit_present_following_flag,
                    running_status,
                    free_ca_mode,
                    descriptors: block.into(),
                });
            }
        }

        Some(Sdt {
            is_actual: table.table_id == tid::SDT_ACT,
            transport_stream_id: table.table_id_extension,
            original_network_id,
            services,
        })
    }
}

/// RSTに含まれるイベントの進行状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstEvent {
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// オリジナルネットワーク識別。
    pub original_network_id: u16,
    /// サービス識別。
    pub service_id: u16,
    /// イベント識別。
    pub event_id: u16,
    /// 進行状態。
    pub running_status: RunningStatus,
}

/// RST（Running Status Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rst {
    /// イベントを格納する配列。
    pub events: Vec<RstEvent>,
}

impl PsiTable for Rst {
    fn read(table: &CompleteTable) -> Option<Rst> {
        if !check_table(table, &[tid::RST], "Rst") {
            return None;
        }

        let events = table
            .payloads()
            .flat_map(|data| data.chunks_exact(9))
            .map(|c| RstEvent {
                transport_stream_id: c[0..=1].read_be_16(),
                original_network_id: c[2..=3].read_be_16(),
                service_id: c[4..=5].read_be_16(),
                event_id: c[6..=7].read_be_16(),
                running_status: (c[8] & 0b00000111).into(),
            })
            .collect();
        Some(Rst { events })
    }
}

/// TDT（Time and Date Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tdt {
    /// 現在日付、現在時刻（UTC）。
    pub utc_time: DateTime,
}

impl PsiTable for Tdt {
    fn read(table: &CompleteTable) -> Option<Tdt> {
        if !check_table(table, &[tid::TDT], "Tdt") {
            return None;
        }

        let Some(utc_time) = table.sections[0].data().get(0..5) else {
            log::debug!("invalid Tdt::utc_time");
            return None;
        };
        Some(Tdt {
            utc_time: DateTime::read_mjd(utc_time.try_into().ok()?),
        })
    }
}

/// TOT（Time Offset Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tot {
    /// 現在日付、現在時刻（UTC）。
    pub utc_time: DateTime,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

impl PsiTable for Tot {
    fn read(table: &CompleteTable) -> Option<Tot> {
        if !check_table(table, &[tid::TOT], "Tot") {
            return None;
        }

        let section = &table.sections[0];
        if !crate::crc::verify32(section.raw()) {
            log::debug!("invalid Tot::crc32");
            return None;
        }

        let data = section.data();
        if data.len() < 5 + 2 + 4 {
            log::debug!("invalid Tot");
            return None;
        }
        let utc_time = DateTime::read_mjd(data[0..5].try_into().ok()?);
        let Some((block, _)) = DescriptorBlock::read(&data[5..data.len() - 4]) else {
            log::debug!("invalid Tot::descriptors");
            return None;
        };

        Some(Tot {
            utc_time,
            descriptors: block.into(),
        })
    }
}

/// SAT（Satellite Access Table）。
///
/// 本体は衛星テーブル識別ごとに構造が異なるため、未加工のまま保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sat {
    /// 衛星テーブル識別（6ビット）。
    pub satellite_table_id: u8,
    /// テーブル数（10ビット）。
    pub table_count: u16,
    /// 全セクションのデータ部を連結したもの。
    pub body: Vec<u8>,
}

impl PsiTable for Sat {
    fn read(table: &CompleteTable) -> Option<Sat> {
        if !check_table(table, &[tid::SAT], "Sat") {
            return None;
        }

        Some(Sat {
            satellite_table_id: (table.table_id_extension >> 10) as u8,
            table_count: table.table_id_extension & 0x03FF,
            body: table.payloads().flatten().copied().collect(),
        })
    }
}

/// SGTに含まれるサービス。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgtService {
    /// サービス識別。
    pub service_id: u16,
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// オリジナルネットワーク識別。
    pub original_network_id: u16,
    /// 論理チャンネル番号（14ビット）。
    pub logical_channel_number: u16,
    /// 視聴者に見せるサービスかどうか。
    pub visible_service_flag: bool,
    /// 新しいサービスかどうか。
    pub new_service_flag: bool,
    /// ジャンル。
    pub genre_code: u16,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

/// SES Astraで運用されるSGT（Service Guide Table）。
///
/// PMTでストリーム形式種別0x05とされたPIDで運ばれ、サービスごとの論理チャンネル番号を持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sgt {
    /// サービスリスト識別。
    pub service_list_id: u16,
    /// バージョン番号。
    pub version: u8,
    /// 記述子群。
    pub descriptors: DescriptorList,
    /// サービスを格納する配列。
    pub services: Vec<SgtService>,
}

impl PsiTable for Sgt {
    fn read(table: &CompleteTable) -> Option<Sgt> {
        if !check_table(table, &[tid::SGT], "Sgt") {
            return None;
        }

        let mut descriptors = DescriptorList::new();
        let mut services = Vec::new();
        for data in table.payloads() {
            // 先頭2バイトは予約
            let Some((block, data)) = data.get(2..).and_then(DescriptorBlock::read) else {
                log::debug!("invalid Sgt::descriptors");
                return None;
            };
            for desc in block.iter() {
                descriptors.push(desc.tag, desc.data);
            }

            let Some((service_loop, _)) = DescriptorBlock::read(data) else {
                log::debug!("invalid Sgt::service_loop_length");
                return None;
            };
            let mut data = service_loop.as_bytes();
            while !data.is_empty() {
                if data.len() < 12 {
                    log::debug!("invalid SgtService");
                    return None;
                }

                let Some((block, rem)) = DescriptorBlock::read(&data[10..]) else {
                    log::debug!("invalid SgtService::descriptors");
                    return None;
                };
                services.push(SgtService {
                    service_id: data[0..=1].read_be_16(),
                    transport_stream_id: data[2..=3].read_be_16(),
                    original_network_id: data[4..=5].read_be_16(),
                    logical_channel_number: data[6..=7].read_be_16() >> 2,
                    visible_service_flag: data[7] & 0b00000010 != 0,
                    new_service_flag: data[7] & 0b00000001 != 0,
                    genre_code: data[8..=9].read_be_16(),
                    descriptors: block.into(),
                });
                data = rem;
            }
        }

        Some(Sgt {
            service_list_id: table.table_id_extension,
            version: table.version,
            descriptors,
            services,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::Pid;
    use crate::testing::{self, complete_table};
    use assert_matches::assert_matches;

    #[test]
    fn test_nit() {
        let payload = [
            testing::descriptor_loop(&[testing::descriptor(0x40, b"NET")]),
            vec![0xF0, 0x0C],
            hex_literal::hex!("00 01 22 33 F0 06 83 04 00 10 FC 05").to_vec(),
        ]
        .concat();
        let table = complete_table(Pid::NIT, &[testing::section(0x40, 0x3001, 4, 0, 0, &payload)]);
        let nit = Nit::read(&table).unwrap();
        assert!(nit.is_actual);
        assert_eq!(nit.network_id, 0x3001);
        assert_eq!(nit.version, 4);
        assert!(nit.descriptors.contains(0x40));
        assert_eq!(nit.transports.len(), 1);
        assert_eq!(nit.transports[0].transport_stream_id, 0x0001);
        assert_eq!(nit.transports[0].original_network_id, 0x2233);
        assert!(nit.transports[0].descriptors.contains(0x83));

        let table = complete_table(Pid::NIT, &[testing::section(0x41, 0x3002, 0, 0, 0, &payload)]);
        assert!(!Nit::read(&table).unwrap().is_actual);

        // トランスポートストリームループが途中で切れている
        let table = complete_table(
            Pid::NIT,
            &[testing::section(0x40, 0x3001, 0, 0, 0, &payload[..payload.len() - 2])],
        );
        assert!(Nit::read(&table).is_none());
    }

    #[test]
    fn test_bat() {
        let payload = hex_literal::hex!("F0 00 F0 06 00 02 00 03 F0 00");
        let table = complete_table(Pid::BAT, &[testing::section(0x4A, 0x1234, 0, 0, 0, &payload)]);
        let bat = Bat::read(&table).unwrap();
        assert_eq!(bat.bouquet_id, 0x1234);
        assert!(bat.descriptors.is_empty());
        assert_eq!(bat.transports.len(), 1);
        assert_eq!(bat.transports[0].original_network_id, 0x0003);
    }

    #[test]
    fn test_sdt() {
        let service = testing::descriptor(0x48, b"\x01\x03ABC\x04Chan");
        let payload = [
            &hex_literal::hex!("00 20 FF")[..],
            &hex_literal::hex!("00 01 FF 90")[..],
            &[service.len() as u8],
            &service[..],
            &hex_literal::hex!("00 02 FC 20 00"),
        ]
        .concat();
        let table = complete_table(Pid::SDT, &[testing::section(0x42, 0x0010, 0, 0, 0, &payload)]);
        let sdt = Sdt::read(&table).unwrap();
        assert!(sdt.is_actual);
        assert_eq!(sdt.transport_stream_id, 0x0010);
        assert_eq!(sdt.original_network_id, 0x0020);
        assert_eq!(sdt.services.len(), 2);

        let s = &sdt.services[0];
        assert_eq!(s.service_id, 0x0001);
        assert!(s.eit_schedule_flag);
        assert!(s.eit_present_following_flag);
        assert_eq!(s.running_status, RunningStatus::Running);
        assert!(s.free_ca_mode);
        assert!(s.descriptors.contains(0x48));

        let s = &sdt.services[1];
        assert!(!s.eit_schedule_flag);
        assert!(!s.eit_present_following_flag);
        assert_eq!(s.running_status, RunningStatus::NotRunning);
        assert!(!s.free_ca_mode);
    }

    #[test]
    fn test_rst() {
        let payload = hex_literal::hex!("00 01 00 02 00 03 00 04 FC 00 05");
        let table = complete_table(Pid::RST, &[testing::short_section(0x71, &payload)]);
        let rst = Rst::read(&table).unwrap();
        assert_eq!(
            rst.events,
            [RstEvent {
                transport_stream_id: 1,
                original_network_id: 2,
                service_id: 3,
                event_id: 4,
                running_status: RunningStatus::Running,
            }],
        );
    }

    #[test]
    fn test_tdt_tot() {
        let table = complete_table(
            Pid::TDT,
            &[testing::short_section(0x70, &hex_literal::hex!("C0 79 12 45 00"))],
        );
        let tdt = Tdt::read(&table).unwrap();
        assert_eq!(tdt.utc_time.to_string(), "1993-10-13 12:45:00");

        let table = complete_table(Pid::TDT, &[testing::short_section(0x70, &[0xC0, 0x79])]);
        assert!(Tdt::read(&table).is_none());

        let payload = [
            &hex_literal::hex!("C0 79 12 45 00")[..],
            &testing::descriptor_loop(&[testing::descriptor(0x58, &[0; 13])])[..],
        ]
        .concat();
        let section = testing::short_section_with_crc(0x73, &payload);
        let table = complete_table(Pid::TOT, &[section.clone()]);
        let tot = Tot::read(&table).unwrap();
        assert_eq!(tot.utc_time.to_string(), "1993-10-13 12:45:00");
        assert!(tot.descriptors.contains(0x58));

        let mut broken = section;
        broken[4] ^= 0x01;
        let table = complete_table(Pid::TOT, &[broken]);
        assert_matches!(Tot::read(&table), None);
    }

    #[test]
    fn test_sat() {
        let table = complete_table(
            Pid::SAT,
            &[
                testing::section(0x4D, 0x0805, 0, 0, 1, &[0x01, 0x02]),
                testing::section(0x4D, 0x0805, 0, 1, 1, &[0x03]),
            ],
        );
        let sat = Sat::read(&table).unwrap();
        assert_eq!(sat.satellite_table_id, 2);
        assert_eq!(sat.table_count, 5);
        assert_eq!(sat.body, [0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_sgt() {
        let payload = [
            &hex_literal::hex!("FF FF F0 00 F0 18")[..],
            // LCN 101、表示、新規ではない
            &hex_literal::hex!("00 01 04 01 00 01 01 96 00 00 F0 00"),
            // LCN 3、非表示、新規
            &hex_literal::hex!("00 02 04 01 00 01 00 0D 12 34 F0 00"),
        ]
        .concat();
        let table = complete_table(Pid::new(0x0200), &[testing::section(0x91, 0x0007, 2, 0, 0, &payload)]);
        let sgt = Sgt::read(&table).unwrap();
        assert_eq!(sgt.service_list_id, 0x0007);
        assert_eq!(sgt.version, 2);
        assert_eq!(sgt.services.len(), 2);

        let s = &sgt.services[0];
        assert_eq!(s.service_id, 0x0001);
        assert_eq!(s.transport_stream_id, 0x0401);
        assert_eq!(s.original_network_id, 0x0001);
        assert_eq!(s.logical_channel_number, 101);
        assert!(s.visible_service_flag);
        assert!(!s.new_service_flag);

        let s = &sgt.services[1];
        assert_eq!(s.logical_channel_number, 3);
        assert!(!s.visible_service_flag);
        assert!(s.new_service_flag);
        assert_eq!(s.genre_code, 0x1234);

        // サービスループが途中で切れている
        let table = complete_table(
            Pid::new(0x0200),
            &[testing::section(0x91, 0x0007, 0, 0, 0, &payload[..payload.len() - 3])],
        );
        assert!(Sgt::read(&table).is_none());
    }
}
