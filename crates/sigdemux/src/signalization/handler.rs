//! シグナリング情報を受け取るハンドラ。

use crate::pid::Pid;
use crate::psi::table::{Bat, Cat, Mgt, Nit, Pat, Pmt, Rrt, Rst, Sat, Sdt, Stt, Tdt, Tot, Tsdt, Vct};
use crate::service::Service;
use crate::time::DateTime;

/// [`SignalizationDemux`][super::SignalizationDemux]から通知を受け取るトレイト。
///
/// テーブルごとのメソッドは、そのテーブル識別がフィルターされている場合に
/// テーブルと受信したPIDを引数として呼ばれる。
/// 既定の実装は何もしない。
#[allow(unused_variables)]
pub trait SignalizationHandler {
    /// PATを受信した。
    fn on_pat(&mut self, pat: &Pat, pid: Pid) {}

    /// CATを受信した。
    fn on_cat(&mut self, cat: &Cat, pid: Pid) {}

    /// PMTを受信した。
    ///
    /// PMTのテーブル識別またはサービス識別がフィルターされている場合に呼ばれる。
    fn on_pmt(&mut self, pmt: &Pmt, pid: Pid) {}

    /// TSDTを受信した。
    fn on_tsdt(&mut self, tsdt: &Tsdt, pid: Pid) {}

    /// NITを受信した。
    fn on_nit(&mut self, nit: &Nit, pid: Pid) {}

    /// SDTを受信した。
    fn on_sdt(&mut self, sdt: &Sdt, pid: Pid) {}

    /// BATを受信した。
    fn on_bat(&mut self, bat: &Bat, pid: Pid) {}

    /// RSTを受信した。
    fn on_rst(&mut self, rst: &Rst, pid: Pid) {}

    /// TDTを受信した。
    fn on_tdt(&mut self, tdt: &Tdt, pid: Pid) {}

    /// TOTを受信した。
    fn on_tot(&mut self, tot: &Tot, pid: Pid) {}

    /// MGTを受信した。
    fn on_mgt(&mut self, mgt: &Mgt, pid: Pid) {}

    /// 地上波またはケーブルのVCTを受信した。
    ///
    /// [`on_tvct`][SignalizationHandler::on_tvct]または
    /// [`on_cvct`][SignalizationHandler::on_cvct]の後に呼ばれる。
    fn on_vct(&mut self, vct: &Vct, pid: Pid) {}

    /// 地上波VCTを受信した。
    fn on_tvct(&mut self, vct: &Vct, pid: Pid) {}

    /// ケーブルVCTを受信した。
    fn on_cvct(&mut self, vct: &Vct, pid: Pid) {}

    /// RRTを受信した。
    fn on_rrt(&mut self, rrt: &Rrt, pid: Pid) {}

    /// SATを受信した。
    fn on_sat(&mut self, sat: &Sat, pid: Pid) {}

    /// STTを受信した。
    ///
    /// バージョン番号が変わらなくてもセクションを受信するたびに呼ばれる。
    fn on_stt(&mut self, stt: &Stt, pid: Pid) {}

    /// TDT・TOT・STTから現在時刻を得た。
    ///
    /// テーブル識別のフィルターによらず呼ばれる。
    fn on_utc(&mut self, utc: &DateTime, table_id: u8) {}

    /// トランスポートストリーム識別が判明または変化した。
    fn on_ts_id(&mut self, ts_id: u16, table_id: u8) {}

    /// サービスが変化した、または削除された。
    ///
    /// `ts_id`は現在のトランスポートストリーム識別、`pmt`はサービスの最新のPMTである。
    fn on_service(&mut self, ts_id: Option<u16>, service: &Service, pmt: Option<&Pmt>, removed: bool) {
    }
}

impl SignalizationHandler for () {}

impl<T: SignalizationHandler + ?Sized> SignalizationHandler for &mut T {
    #[inline]
    fn on_pat(&mut self, pat: &Pat, pid: Pid) {
        (**self).on_pat(pat, pid)
    }

    #[inline]
    fn on_cat(&mut self, cat: &Cat, pid: Pid) {
        (**self).on_cat(cat, pid)
    }

    #[inline]
    fn on_pmt(&mut self, pmt: &Pmt, pid: Pid) {
        (**self).on_pmt(pmt, pid)
    }

    #[inline]
    fn on_tsdt(&mut self, tsdt: &Tsdt, pid: Pid) {
        (**self).on_tsdt(tsdt, pid)
    }

    #[inline]
    fn on_nit(&mut self, nit: &Nit, pid: Pid) {
        (**self).on_nit(nit, pid)
    }

    #[inline]
    fn on_sdt(&mut self, sdt: &Sdt, pid: Pid) {
        (**self).on_sdt(sdt, pid)
    }

    #[inline]
    fn on_bat(&mut self, bat: &Bat, pid: Pid) {
        (**self).on_bat(bat, pid)
    }

    #[inline]
    fn on_rst(&mut self, rst: &Rst, pid: Pid) {
        (**self).on_rst(rst, pid)
    }

    #[inline]
    fn on_tdt(&mut self, tdt: &Tdt, pid: Pid) {
        (**self).on_tdt(tdt, pid)
    }

    #[inline]
    fn on_tot(&mut self, tot: &Tot, pid: Pid) {
        (**self).on_tot(tot, pid)
    }

    #[inline]
    fn on_mgt(&mut self, mgt: &Mgt, pid: Pid) {
        (**self).on_mgt(mgt, pid)
    }

    #[inline]
    fn on_vct(&mut self, vct: &Vct, pid: Pid) {
        (**self).on_vct(vct, pid)
    }

    #[inline]
    fn on_tvct(&mut self, vct: &Vct, pid: Pid) {
        (**self).on_tvct(vct, pid)
    }

    #[inline]
    fn on_cvct(&mut self, vct: &Vct, pid: Pid) {
        (**self).on_cvct(vct, pid)
    }

    #[inline]
    fn on_rrt(&mut self, rrt: &Rrt, pid: Pid) {
        (**self).on_rrt(rrt, pid)
    }

    #[inline]
    fn on_sat(&mut self, sat: &Sat, pid: Pid) {
        (**self).on_sat(sat, pid)
    }

    #[inline]
    fn on_stt(&mut self, stt: &Stt, pid: Pid) {
        (**self).on_stt(stt, pid)
    }

    #[inline]
    fn on_utc(&mut self, utc: &DateTime, table_id: u8) {
        (**self).on_utc(utc, table_id)
    }

    #[inline]
    fn on_ts_id(&mut self, ts_id: u16, table_id: u8) {
        (**self).on_ts_id(ts_id, table_id)
    }

    #[inline]
    fn on_service(&mut self, ts_id: Option<u16>, service: &Service, pmt: Option<&Pmt>, removed: bool) {
        (**self).on_service(ts_id, service, pmt, removed)
    }
}
