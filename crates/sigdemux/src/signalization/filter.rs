//! フィルターするテーブル識別とサービスの集合。

use fxhash::FxHashSet;

use crate::pid::Pid;
use crate::psi::table::tid;
use crate::utils;

/// PIDを共有するテーブル識別のまとまり。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TableGroup {
    Pat,
    Cat,
    Pmt,
    Tsdt,
    Nit,
    SdtBat,
    Rst,
    Time,
    Atsc,
    Sat,
}

impl TableGroup {
    /// `table_id`が属するまとまりを返す。対応しないテーブル識別には`None`を返す。
    pub fn of(table_id: u8) -> Option<TableGroup> {
        let group = match table_id {
            tid::PAT => TableGroup::Pat,
            tid::CAT => TableGroup::Cat,
            tid::PMT => TableGroup::Pmt,
            tid::TSDT => TableGroup::Tsdt,
            tid::NIT_ACT | tid::NIT_OTH => TableGroup::Nit,
            tid::SDT_ACT | tid::SDT_OTH | tid::BAT => TableGroup::SdtBat,
            tid::RST => TableGroup::Rst,
            tid::TDT | tid::TOT => TableGroup::Time,
            tid::MGT | tid::CVCT | tid::TVCT | tid::RRT | tid::STT => TableGroup::Atsc,
            tid::SAT => TableGroup::Sat,
            _ => return None,
        };
        Some(group)
    }

    /// まとまりに属するテーブル識別。
    pub fn members(self) -> &'static [u8] {
        match self {
            TableGroup::Pat => &[tid::PAT],
            TableGroup::Cat => &[tid::CAT],
            TableGroup::Pmt => &[tid::PMT],
            TableGroup::Tsdt => &[tid::TSDT],
            TableGroup::Nit => &[tid::NIT_ACT, tid::NIT_OTH],
            TableGroup::SdtBat => &[tid::SDT_ACT, tid::SDT_OTH, tid::BAT],
            TableGroup::Rst => &[tid::RST],
            TableGroup::Time => &[tid::TDT, tid::TOT],
            TableGroup::Atsc => &[tid::MGT, tid::CVCT, tid::TVCT, tid::RRT, tid::STT],
            TableGroup::Sat => &[tid::SAT],
        }
    }

    /// 固定のPIDで運ばれるまとまりであればそのPIDを返す。
    ///
    /// PMTとNITはPATの内容によってPIDが決まるため`None`を返す。
    pub fn fixed_pid(self) -> Option<Pid> {
        match self {
            TableGroup::Pat => Some(Pid::PAT),
            TableGroup::Cat => Some(Pid::CAT),
            TableGroup::Tsdt => Some(Pid::TSDT),
            TableGroup::SdtBat => Some(Pid::SDT),
            TableGroup::Rst => Some(Pid::RST),
            TableGroup::Time => Some(Pid::TDT),
            TableGroup::Atsc => Some(Pid::PSIP),
            TableGroup::Sat => Some(Pid::SAT),
            TableGroup::Pmt | TableGroup::Nit => None,
        }
    }
}

/// フィルターの設定。
#[derive(Debug, Default, Clone)]
pub(super) struct Filters {
    pub table_ids: FxHashSet<u8>,
    pub service_ids: FxHashSet<u16>,
    pub service_names: Vec<String>,
    /// 構築時に既定のフィルターを設定したかどうか。
    pub full: bool,
}

impl Filters {
    /// 既定で発見に用いるテーブル識別。
    pub const FULL_TABLE_IDS: &'static [u8] = &[
        tid::PAT,
        tid::CAT,
        tid::PMT,
        tid::NIT_ACT,
        tid::SDT_ACT,
        tid::TDT,
        tid::TOT,
        tid::MGT,
        tid::CVCT,
        tid::TVCT,
        tid::STT,
    ];

    #[inline]
    pub fn has_table_id(&self, table_id: u8) -> bool {
        self.table_ids.contains(&table_id)
    }

    /// `group`のテーブル識別がひとつでもフィルターされているかどうかを返す。
    #[inline]
    pub fn has_group(&self, group: TableGroup) -> bool {
        group.members().iter().any(|t| self.table_ids.contains(t))
    }

    #[inline]
    pub fn has_service_id(&self, service_id: u16) -> bool {
        self.service_ids.contains(&service_id)
    }

    /// `name`と似た名前がフィルターされているかどうかを返す。
    #[inline]
    pub fn has_similar_name(&self, name: &str) -> bool {
        self.service_names.iter().any(|n| utils::similar(n, name))
    }

    /// `name`と似た名前をすべて取り除き、取り除いたかどうかを返す。
    pub fn remove_similar_names(&mut self, name: &str) -> bool {
        let len = self.service_names.len();
        self.service_names.retain(|n| !utils::similar(n, name));
        self.service_names.len() != len
    }

    /// フィルターを消去する。`full`は保持する。
    pub fn clear(&mut self) {
        self.table_ids.clear();
        self.service_ids.clear();
        self.service_names.clear();
    }
}
