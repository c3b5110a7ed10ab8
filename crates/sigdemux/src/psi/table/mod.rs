//! PSIテーブルの定義。

mod atsc;
mod dvb;
mod iso;

pub use atsc::*;
pub use dvb::*;
pub use iso::*;

use super::CompleteTable;

/// テーブル識別。
pub mod tid {
    /// PAT。
    pub const PAT: u8 = 0x00;
    /// CAT。
    pub const CAT: u8 = 0x01;
    /// PMT。
    pub const PMT: u8 = 0x02;
    /// TSDT。
    pub const TSDT: u8 = 0x03;
    /// 自ネットワークのNIT。
    pub const NIT_ACT: u8 = 0x40;
    /// 他ネットワークのNIT。
    pub const NIT_OTH: u8 = 0x41;
    /// 自ストリームのSDT。
    pub const SDT_ACT: u8 = 0x42;
    /// 他ストリームのSDT。
    pub const SDT_OTH: u8 = 0x46;
    /// BAT。
    pub const BAT: u8 = 0x4A;
    /// SAT。
    pub const SAT: u8 = 0x4D;
    /// TDT。
    pub const TDT: u8 = 0x70;
    /// RST。
    pub const RST: u8 = 0x71;
    /// TOT。
    pub const TOT: u8 = 0x73;
    /// SES AstraのSGT。
    pub const SGT: u8 = 0x91;
    /// ATSCのMGT。
    pub const MGT: u8 = 0xC7;
    /// ATSCの地上波VCT。
    pub const TVCT: u8 = 0xC8;
    /// ATSCのケーブルVCT。
    pub const CVCT: u8 = 0xC9;
    /// ATSCのRRT。
    pub const RRT: u8 = 0xCA;
    /// ATSCのSTT。
    pub const STT: u8 = 0xCD;
}

/// `table`のテーブル識別が`table_ids`のいずれかであり、セクションが一つ以上あることを確認する。
fn check_table(table: &CompleteTable, table_ids: &[u8], name: &str) -> bool {
    if !table_ids.contains(&table.table_id) {
        log::debug!("invalid {}::table_id: {:02X}", name, table.table_id);
        return false;
    }
    if table.sections.is_empty() {
        log::debug!("empty {}", name);
        return false;
    }
    true
}
