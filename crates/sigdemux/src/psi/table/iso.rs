//! ISO/IEC 13818-1で規定されるテーブルの定義。

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::pid::Pid;
use crate::psi::desc::{DescriptorBlock, DescriptorList};
use crate::psi::{CompleteTable, PsiTable};
use crate::stream::StreamType;
use crate::utils::BytesExt;

use super::{check_table, tid};

/// PAT（Program Association Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// NITのPID。
    pub network_pid: Option<Pid>,
    /// サービス識別とPMTのPIDの組。PAT内の順序を保つ。
    pub pmts: IndexMap<u16, Pid, FxBuildHasher>,
}

impl Pat {
    /// NITのPIDを返す。PATで指定されていない場合は既定のPIDを返す。
    #[inline]
    pub fn nit_pid(&self) -> Pid {
        self.network_pid.unwrap_or(Pid::NIT)
    }
}

impl PsiTable for Pat {
    fn read(table: &CompleteTable) -> Option<Pat> {
        if !check_table(table, &[tid::PAT], "Pat") {
            return None;
        }

        let mut network_pid = None;
        let mut pmts = IndexMap::default();
        for data in table.payloads() {
            for chunk in data.chunks_exact(4) {
                let program_number = chunk[0..=1].read_be_16();
                let pid = Pid::read(&chunk[2..=3]);

                if program_number == 0 {
                    network_pid = Some(pid);
                } else {
                    pmts.insert(program_number, pid);
                }
            }
        }

        Some(Pat {
            transport_stream_id: table.table_id_extension,
            network_pid,
            pmts,
        })
    }
}

/// CAT（Conditional Access Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cat {
    /// 記述子群。
    pub descriptors: DescriptorList,
}

impl PsiTable for Cat {
    fn read(table: &CompleteTable) -> Option<Cat> {
        if !check_table(table, &[tid::CAT], "Cat") {
            return None;
        }

        Some(Cat {
            descriptors: concat_descriptors(table),
        })
    }
}

/// TSDT（Transport Stream Description Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tsdt {
    /// 記述子群。
    pub descriptors: DescriptorList,
}

impl PsiTable for Tsdt {
    fn read(table: &CompleteTable) -> Option<Tsdt> {
        if !check_table(table, &[tid::TSDT], "Tsdt") {
            return None;
        }

        Some(Tsdt {
            descriptors: concat_descriptors(table),
        })
    }
}

fn concat_descriptors(table: &CompleteTable) -> DescriptorList {
    let mut descriptors = DescriptorList::new();
    for data in table.payloads() {
        for desc in DescriptorBlock::new(data).iter() {
            descriptors.push(desc.tag, desc.data);
        }
    }
    descriptors
}

/// 各サービスを構成するストリーム。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    /// ストリーム形式種別。
    pub stream_type: StreamType,
    /// エレメンタリーPID。
    pub elementary_pid: Pid,
    /// 記述子群。
    pub descriptors: DescriptorList,
}

/// PMT（Program Map Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    /// 放送番組番号識別（サービス識別）。
    pub service_id: u16,
    /// PCRのPID。
    pub pcr_pid: Pid,
    /// 記述子群。
    pub descriptors: DescriptorList,
    /// ストリームを格納する配列。
    pub streams: Vec<PmtStream>,
}

impl PsiTable for Pmt {
    fn read(table: &CompleteTable) -> Option<Pmt> {
        if !check_table(table, &[tid::PMT], "Pmt") {
            return None;
        }

        let mut pcr_pid = Pid::NULL;
        let mut descriptors = DescriptorList::new();
        let mut streams = Vec::new();
        for (i, data) in table.payloads().enumerate() {
            if data.len() < 4 {
                log::debug!("invalid Pmt");
                return None;
            }

            if i == 0 {
                pcr_pid = Pid::read(&data[0..=1]);
            }
            let Some((block, mut data)) = DescriptorBlock::read(&data[2..]) else {
                log::debug!("invalid Pmt::descriptors");
                return None;
            };
            for desc in block.iter() {
                descriptors.push(desc.tag, desc.data);
            }

            while !data.is_empty() {
                if data.len() < 5 {
                    log::debug!("invalid PmtStream");
                    return None;
                }

                let stream_type = StreamType(data[0]);
                let elementary_pid = Pid::read(&data[1..=2]);
                let Some((block, rem)) = DescriptorBlock::read(&data[3..]) else {
                    log::debug!("invalid PmtStream::descriptors");
                    return None;
                };
                data = rem;

                streams.push(PmtStream {
                    stream_type,
                    elementary_pid,
                    descriptors: block.into(),
                });
            }
        }

        Some(Pmt {
            service_id: table.table_id_extension,
            pcr_pid,
            descriptors,
            streams,
        })
    }
}
