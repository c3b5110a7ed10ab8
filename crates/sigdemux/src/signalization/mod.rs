//! TSパケットからシグナリング情報を集め、PIDとサービスの状態を保持する。

mod context;
mod filter;
mod handler;

pub use context::{PidContext, PidPoint, ServiceContext, ServiceContextMap};
pub use handler::SignalizationHandler;

use fxhash::FxHashSet;

use crate::demux::{self, Demuxer};
use crate::lcn::{LogicalChannelNumbers, Replacement};
use crate::packet::Packet;
use crate::pid::{Pid, PidTable};
use crate::psi::desc::{ConditionalAccessDescriptor, ServiceDescriptor};
use crate::psi::table::{
    tid, Bat, Cat, Mgt, Nit, Pat, Pmt, Rrt, Rst, Sat, Sdt, Sgt, Stt, Tdt, Tot, Tsdt, Vct,
    VctKind,
};
use crate::psi::{CompleteTable, PsiSection, PsiTable, Repository};
use crate::service::Service;
use crate::stream::{self, CodecType, PidClass, StreamType};
use crate::time::DateTime;
use crate::utils;

use context::{CreateService, ServiceContextMapView};
use filter::{Filters, TableGroup};

/// シグナリング情報の分離器。
///
/// TSパケットを一つずつ受け取り、PSI/SI・PSIPのテーブルを組み立て、
/// PIDごとの統計とサービスの属性を更新して[`SignalizationHandler`]に通知する。
/// テーブルを分離するPIDは、フィルターされたテーブル識別とサービスから自動で決まる。
pub struct SignalizationDemux<H = ()> {
    demux: Demuxer,
    core: Core<H>,
}

struct Core<H> {
    handler: H,
    repo: Repository,
    filters: Filters,
    last_pat: Option<Pat>,
    last_pat_handled: bool,
    last_nit: Option<Nit>,
    last_nit_handled: bool,
    ts_id: Option<u16>,
    network_id: Option<u16>,
    onid: Option<u16>,
    last_utc: Option<DateTime>,
    pid_contexts: PidTable<Option<Box<PidContext>>>,
    services: ServiceContextMap,
}

impl<H: SignalizationHandler> SignalizationDemux<H> {
    /// 既定のテーブル識別をフィルターした`SignalizationDemux`を生成する。
    ///
    /// 既定のテーブル識別はPAT・CAT・PMT・NIT［自］・SDT［自］・TDT・TOT・MGT・CVCT・TVCT・STTで、
    /// すべてのサービスの変化が通知される。
    pub fn new(handler: H) -> SignalizationDemux<H> {
        let mut demux = SignalizationDemux::with_table_ids(handler, &[]);
        demux.add_full_filters();
        demux
    }

    /// `table_ids`のテーブル識別だけをフィルターした`SignalizationDemux`を生成する。
    pub fn with_table_ids(handler: H, table_ids: &[u8]) -> SignalizationDemux<H> {
        let mut demux = SignalizationDemux {
            demux: Demuxer::new(),
            core: Core {
                handler,
                repo: Repository::new(),
                filters: Filters::default(),
                last_pat: None,
                last_pat_handled: false,
                last_nit: None,
                last_nit_handled: false,
                ts_id: None,
                network_id: None,
                onid: None,
                last_utc: None,
                pid_contexts: PidTable::from_fn(|_| None),
                services: ServiceContextMap::default(),
            },
        };
        demux.add_filtered_table_ids(table_ids);
        demux
    }

    /// ハンドラへの参照を返す。
    #[inline]
    pub fn handler(&self) -> &H {
        &self.core.handler
    }

    /// ハンドラへの可変参照を返す。
    #[inline]
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.core.handler
    }

    /// ハンドラを置き換え、以前のハンドラを返す。
    #[inline]
    pub fn set_handler(&mut self, handler: H) -> H {
        std::mem::replace(&mut self.core.handler, handler)
    }

    /// `SignalizationDemux`を消費してハンドラを返す。
    #[inline]
    pub fn into_handler(self) -> H {
        self.core.handler
    }

    /// TSパケットを処理する。
    pub fn feed_packet(&mut self, packet: &Packet) {
        self.core.pid_context_mut(packet.pid()).record_packet(packet);
        self.demux.feed(packet, &mut self.core);
    }

    /// すべての状態を消去する。
    ///
    /// [`new`][SignalizationDemux::new]で生成された場合は既定のフィルターを再設定する。
    pub fn reset(&mut self) {
        let table = self.demux.table_mut();
        table.clear();
        self.core.reset();
        if self.core.filters.full {
            self.add_full_filters();
        }
    }

    /// 既定のテーブル識別をフィルターし、すべてのサービスの変化を通知するようにする。
    pub fn add_full_filters(&mut self) {
        self.core.filters.full = true;
        self.add_filtered_table_ids(Filters::FULL_TABLE_IDS);
    }

    /// テーブル識別をフィルターする。
    ///
    /// 対応しないテーブル識別の場合は`false`を返す。
    #[inline]
    pub fn add_filtered_table_id(&mut self, table_id: u8) -> bool {
        self.core.add_filtered_table_id(self.demux.table_mut(), table_id)
    }

    /// 複数のテーブル識別をフィルターする。
    ///
    /// 一つでも対応しないテーブル識別があった場合は`false`を返す。
    pub fn add_filtered_table_ids(&mut self, table_ids: &[u8]) -> bool {
        table_ids
            .iter()
            .fold(true, |ok, &t| self.add_filtered_table_id(t) && ok)
    }

    /// テーブル識別のフィルターを解除する。
    ///
    /// フィルターされていなかった場合は`false`を返す。
    #[inline]
    pub fn remove_filtered_table_id(&mut self, table_id: u8) -> bool {
        self.core
            .remove_filtered_table_id(self.demux.table_mut(), table_id)
    }

    /// 複数のテーブル識別のフィルターを解除する。
    ///
    /// 一つでもフィルターされていなかったテーブル識別があった場合は`false`を返す。
    pub fn remove_filtered_table_ids(&mut self, table_ids: &[u8]) -> bool {
        table_ids
            .iter()
            .fold(true, |ok, &t| self.remove_filtered_table_id(t) && ok)
    }

    /// テーブル識別がフィルターされているかどうかを返す。
    #[inline]
    pub fn is_filtered_table_id(&self, table_id: u8) -> bool {
        self.core.filters.has_table_id(table_id)
    }

    /// サービス識別をフィルターし、そのサービスのPMTと変化が通知されるようにする。
    ///
    /// 既にフィルターされていた場合は`false`を返す。
    #[inline]
    pub fn add_filtered_service_id(&mut self, service_id: u16) -> bool {
        self.core
            .add_filtered_service_id(self.demux.table_mut(), service_id)
    }

    /// サービス識別のフィルターを解除する。
    ///
    /// フィルターされていなかった場合は`false`を返す。
    #[inline]
    pub fn remove_filtered_service_id(&mut self, service_id: u16) -> bool {
        self.core
            .remove_filtered_service_id(self.demux.table_mut(), service_id)
    }

    /// サービス識別がフィルターされているかどうかを返す。
    #[inline]
    pub fn is_filtered_service_id(&self, service_id: u16) -> bool {
        self.core.filters.has_service_id(service_id)
    }

    /// サービス識別またはサービス名でサービスをフィルターする。
    ///
    /// 整数として解釈できる場合はサービス識別として扱う。
    /// サービス名は既知のサービスに加えて、今後変化したサービスとも照合する。
    /// 既にフィルターされていた場合は`false`を返す。
    #[inline]
    pub fn add_filtered_service(&mut self, name: &str) -> bool {
        self.core.add_filtered_service(self.demux.table_mut(), name)
    }

    /// サービス識別またはサービス名によるサービスのフィルターを解除する。
    ///
    /// フィルターされていなかった場合は`false`を返す。
    #[inline]
    pub fn remove_filtered_service(&mut self, name: &str) -> bool {
        self.core.remove_filtered_service(self.demux.table_mut(), name)
    }

    /// サービス識別またはサービス名がフィルターされているかどうかを返す。
    pub fn is_filtered_service_name(&self, name: &str) -> bool {
        match utils::parse_u16(name) {
            Some(id) => self.core.filters.has_service_id(id),
            None => self.core.filters.has_similar_name(name),
        }
    }

    /// サービスのフィルターをすべて解除する。
    #[inline]
    pub fn remove_all_filtered_services(&mut self) {
        self.core
            .remove_all_filtered_services(self.demux.table_mut())
    }

    /// パケットを受信したPIDを返す。
    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.core
            .pid_contexts
            .entries()
            .filter(|(_, ctx)| matches!(ctx, Some(ctx) if ctx.packets > 0))
            .map(|(pid, _)| pid)
    }

    /// PIDごとに蓄積した情報を返す。
    #[inline]
    pub fn pid_context(&self, pid: Pid) -> Option<&PidContext> {
        self.core.pid_contexts[pid].as_deref()
    }

    /// NITのPIDを返す。
    #[inline]
    pub fn nit_pid(&self) -> Pid {
        self.core.nit_pid()
    }

    /// PIDの分類を返す。
    #[inline]
    pub fn pid_class(&self, pid: Pid) -> PidClass {
        self.pid_context(pid)
            .map_or(PidClass::Undefined, |ctx| ctx.pid_class)
    }

    /// PIDの符号化方式を返す。
    #[inline]
    pub fn codec_type(&self, pid: Pid) -> CodecType {
        self.pid_context(pid)
            .map_or(CodecType::Undefined, |ctx| ctx.codec)
    }

    /// PIDのストリーム形式種別を返す。
    #[inline]
    pub fn stream_type(&self, pid: Pid) -> Option<StreamType> {
        self.pid_context(pid).and_then(|ctx| ctx.stream_type)
    }

    /// PIDで最後に受信したパケットがイントラフレームの始まりを含んでいたかどうかを返す。
    #[inline]
    pub fn at_intra_frame(&self, pid: Pid) -> bool {
        self.pid_context(pid).map_or(false, PidContext::at_intra_frame)
    }

    /// PIDが`service_id`のサービスを構成するかどうかを返す。
    #[inline]
    pub fn in_service(&self, pid: Pid, service_id: u16) -> bool {
        self.pid_context(pid)
            .map_or(false, |ctx| ctx.services.contains(&service_id))
    }

    /// PIDが`service_ids`のいずれかのサービスを構成するかどうかを返す。
    pub fn in_any_service(&self, pid: Pid, service_ids: &[u16]) -> bool {
        self.pid_context(pid)
            .map_or(false, |ctx| service_ids.iter().any(|id| ctx.services.contains(id)))
    }

    /// PIDを構成要素とするサービスのうち、サービス識別が最も小さいものを返す。
    #[inline]
    pub fn service_id_of(&self, pid: Pid) -> Option<u16> {
        self.pid_context(pid)
            .and_then(|ctx| ctx.services.first().copied())
    }

    /// PIDを構成要素とするサービスのサービス識別を返す。
    pub fn service_ids_of(&self, pid: Pid) -> impl Iterator<Item = u16> + '_ {
        self.pid_context(pid)
            .into_iter()
            .flat_map(|ctx| ctx.services.iter().copied())
    }

    /// PIDを構成要素とするサービスのPMTのPIDを返す。
    pub fn reference_pmt_pid(&self, pid: Pid) -> Option<Pid> {
        let service_id = self.service_id_of(pid)?;
        self.core.services.get(&service_id)?.service.pmt_pid()
    }

    /// 既知のサービスのサービス識別を返す。
    #[inline]
    pub fn service_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.core.services.keys().copied()
    }

    /// 既知のサービスを返す。
    #[inline]
    pub fn services(&self) -> impl Iterator<Item = &Service> + '_ {
        self.core.services.values().map(|ctx| &ctx.service)
    }

    /// サービスを返す。
    #[inline]
    pub fn service(&self, service_id: u16) -> Option<&Service> {
        self.core.services.get(&service_id).map(|ctx| &ctx.service)
    }

    /// サービスの最新のPMTを返す。
    #[inline]
    pub fn pmt(&self, service_id: u16) -> Option<&Pmt> {
        self.core.services.get(&service_id)?.pmt.as_ref()
    }

    /// トランスポートストリーム識別を返す。
    #[inline]
    pub fn ts_id(&self) -> Option<u16> {
        self.core.ts_id
    }

    /// 自ネットワークのネットワーク識別を返す。
    #[inline]
    pub fn network_id(&self) -> Option<u16> {
        self.core.network_id
    }

    /// オリジナルネットワーク識別を返す。
    #[inline]
    pub fn original_network_id(&self) -> Option<u16> {
        self.core.onid
    }

    /// TDT・TOT・STTから最後に得た現在時刻を返す。
    #[inline]
    pub fn last_utc(&self) -> Option<&DateTime> {
        self.core.last_utc.as_ref()
    }

    /// 最後に受信したPATを返す。
    #[inline]
    pub fn last_pat(&self) -> Option<&Pat> {
        self.core.last_pat.as_ref()
    }

    /// 最後に受信した自ネットワークのNITを返す。
    #[inline]
    pub fn last_nit(&self) -> Option<&Nit> {
        self.core.last_nit.as_ref()
    }
}

impl<H: SignalizationHandler + Default> Default for SignalizationDemux<H> {
    fn default() -> Self {
        SignalizationDemux::new(H::default())
    }
}

impl<H> std::fmt::Debug for SignalizationDemux<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SignalizationDemux")
            .field("ts_id", &self.core.ts_id)
            .field("network_id", &self.core.network_id)
            .field("onid", &self.core.onid)
            .field("services", &self.core.services.len())
            .finish_non_exhaustive()
    }
}

/// PIDの分離を止め、組み立て中のテーブルも破棄する。
fn unsubscribe(table: &mut demux::Table, repo: &mut Repository, pid: Pid) {
    if table.remove_pid(pid) {
        repo.remove_pid(pid);
    }
}

impl<H: SignalizationHandler> Core<H> {
    fn reset(&mut self) {
        self.repo.clear();
        self.filters.clear();
        self.last_pat = None;
        self.last_pat_handled = false;
        self.last_nit = None;
        self.last_nit_handled = false;
        self.ts_id = None;
        self.network_id = None;
        self.onid = None;
        self.last_utc = None;
        self.pid_contexts.iter_mut().for_each(|ctx| *ctx = None);
        self.services.clear();
    }

    fn nit_pid(&self) -> Pid {
        self.last_pat
            .as_ref()
            .and_then(|pat| pat.network_pid)
            .filter(|&pid| pid != Pid::NULL)
            .unwrap_or(Pid::NIT)
    }

    fn pid_context_mut(&mut self, pid: Pid) -> &mut PidContext {
        self.pid_contexts[pid].get_or_insert_with(|| Box::new(PidContext::new(pid)))
    }

    fn set_cas(&mut self, ca: &ConditionalAccessDescriptor, class: PidClass) -> &mut PidContext {
        let ctx = self.pid_context_mut(ca.ca_pid);
        ctx.pid_class = class;
        ctx.cas_id = Some(ca.ca_system_id);
        ctx
    }

    fn service_context(&mut self, service_id: u16, create: CreateService) -> Option<&mut ServiceContext> {
        let create = match create {
            CreateService::Always => true,
            CreateService::IfMayExist => self
                .last_pat
                .as_ref()
                .map_or(true, |pat| pat.pmts.contains_key(&service_id)),
            CreateService::Never => false,
        };
        if create {
            Some(
                self.services
                    .entry(service_id)
                    .or_insert_with(|| ServiceContext::new(service_id)),
            )
        } else {
            self.services.get_mut(&service_id)
        }
    }

    fn add_filtered_table_id(&mut self, table: &mut demux::Table, table_id: u8) -> bool {
        let Some(group) = TableGroup::of(table_id) else {
            log::debug!("unsupported table id: {:02X}", table_id);
            return false;
        };
        if !self.filters.table_ids.insert(table_id) {
            return true;
        }

        match group {
            TableGroup::Pat => {
                table.add_pid(Pid::PAT);
                // 受信済みで未通知のPAT
                if let Some(pat) = &self.last_pat {
                    if !self.last_pat_handled {
                        self.last_pat_handled = true;
                        self.handler.on_pat(pat, Pid::PAT);
                    }
                }
            }
            TableGroup::Pmt => {
                table.add_pid(Pid::PAT);
                if let Some(pat) = &self.last_pat {
                    for &pid in pat.pmts.values() {
                        table.add_pid(pid);
                    }
                }
            }
            TableGroup::Nit => {
                table.add_pid(Pid::PAT);
                table.add_pid(self.nit_pid());
            }
            _ => {
                if let Some(pid) = group.fixed_pid() {
                    table.add_pid(pid);
                }
            }
        }
        true
    }

    fn remove_filtered_table_id(&mut self, table: &mut demux::Table, table_id: u8) -> bool {
        if !self.filters.table_ids.remove(&table_id) {
            return false;
        }
        let Some(group) = TableGroup::of(table_id) else {
            return true;
        };
        if self.filters.has_group(group) {
            // 同じPIDを使うテーブル識別が残っている
            return true;
        }

        match group {
            TableGroup::Pat => {
                if !self.filters.has_table_id(tid::PMT)
                    && self.filters.service_ids.is_empty()
                    && self.filters.service_names.is_empty()
                    && !self.filters.has_group(TableGroup::Nit)
                {
                    unsubscribe(table, &mut self.repo, Pid::PAT);
                }
            }
            TableGroup::Pmt => {
                if let Some(pat) = &self.last_pat {
                    // 個別にフィルターされたサービスのPMTのPIDは残す
                    let needed: FxHashSet<Pid> = self
                        .filters
                        .service_ids
                        .iter()
                        .filter_map(|id| pat.pmts.get(id).copied())
                        .collect();
                    for &pid in pat.pmts.values() {
                        if !needed.contains(&pid) {
                            unsubscribe(table, &mut self.repo, pid);
                        }
                    }
                }
            }
            TableGroup::Nit => {
                let pid = self.nit_pid();
                unsubscribe(table, &mut self.repo, pid);
            }
            _ => {
                if let Some(pid) = group.fixed_pid() {
                    unsubscribe(table, &mut self.repo, pid);
                }
            }
        }
        true
    }

    fn add_filtered_service_id(&mut self, table: &mut demux::Table, service_id: u16) -> bool {
        if !self.filters.service_ids.insert(service_id) {
            return false;
        }

        table.add_pid(Pid::PAT);
        if let Some(&pid) = self.last_pat.as_ref().and_then(|pat| pat.pmts.get(&service_id)) {
            table.add_pid(pid);
        }
        true
    }

    fn remove_filtered_service_id(&mut self, table: &mut demux::Table, service_id: u16) -> bool {
        if !self.filters.service_ids.remove(&service_id) {
            return false;
        }

        if let Some(pat) = &self.last_pat {
            if !self.filters.has_table_id(tid::PMT) {
                if let Some(&pid) = pat.pmts.get(&service_id) {
                    // 同じPMTのPIDを持つ別のサービスがフィルターされていれば残す
                    let shared = self
                        .filters
                        .service_ids
                        .iter()
                        .any(|id| pat.pmts.get(id) == Some(&pid));
                    if !shared {
                        unsubscribe(table, &mut self.repo, pid);
                    }
                }
            }
        }
        true
    }

    fn add_filtered_service(&mut self, table: &mut demux::Table, name: &str) -> bool {
        if let Some(id) = utils::parse_u16(name) {
            return self.add_filtered_service_id(table, id);
        }
        if self.filters.has_similar_name(name) {
            return false;
        }

        self.filters.service_names.push(name.to_owned());
        let ids: Vec<u16> = self
            .services
            .iter()
            .filter(|(_, ctx)| ctx.service.matches(name))
            .map(|(&id, _)| id)
            .collect();
        if ids.is_empty() {
            // サービスを見つけるためのテーブル
            for table_id in [tid::SDT_ACT, tid::MGT, tid::CVCT, tid::TVCT] {
                self.add_filtered_table_id(table, table_id);
            }
        } else {
            for id in ids {
                self.add_filtered_service_id(table, id);
            }
        }
        true
    }

    fn remove_filtered_service(&mut self, table: &mut demux::Table, name: &str) -> bool {
        if let Some(id) = utils::parse_u16(name) {
            return self.remove_filtered_service_id(table, id);
        }

        let removed = self.filters.remove_similar_names(name);
        let ids: Vec<u16> = self
            .services
            .iter()
            .filter(|(_, ctx)| ctx.service.matches(name))
            .map(|(&id, _)| id)
            .collect();
        for id in ids {
            self.remove_filtered_service_id(table, id);
        }
        removed
    }

    fn remove_all_filtered_services(&mut self, table: &mut demux::Table) {
        if let Some(pat) = &self.last_pat {
            if !self.filters.has_table_id(tid::PMT) {
                for &pid in pat.pmts.values() {
                    unsubscribe(table, &mut self.repo, pid);
                }
            }
        }
        self.filters.service_ids.clear();
        self.filters.service_names.clear();
    }

    /// サービスの変化を通知する。
    ///
    /// `if_modified`が`true`の場合は変更済みのサービスのみを通知する。
    fn handle_service(
        &mut self,
        table: &mut demux::Table,
        service_id: u16,
        if_modified: bool,
        removed: bool,
    ) {
        let Some(ctx) = self.services.get(&service_id) else {
            return;
        };
        if ctx.service.is_modified()
            && !self.filters.has_service_id(service_id)
            && self
                .filters
                .service_names
                .iter()
                .any(|name| ctx.service.matches(name))
        {
            log::debug!("service {} matches a filtered name", ctx.service);
            self.add_filtered_service_id(table, service_id);
        }

        let Some(ctx) = self.services.get_mut(&service_id) else {
            return;
        };
        if (!if_modified || ctx.service.is_modified())
            && (self.filters.full || self.filters.service_ids.contains(&service_id))
        {
            self.handler
                .on_service(self.ts_id, &ctx.service, ctx.pmt.as_ref(), removed);
            ctx.service.clear_modified();
        }
    }

    fn handle_ts_id(&mut self, ts_id: u16, table_id: u8) {
        if self.ts_id != Some(ts_id) {
            log::debug!("transport stream id: {:04X}", ts_id);
            self.ts_id = Some(ts_id);
            self.handler.on_ts_id(ts_id, table_id);
        }
    }

    fn handle_table(&mut self, table: &mut demux::Table, complete: &CompleteTable) {
        let pid = complete.pid;
        match complete.table_id {
            tid::PAT if pid == Pid::PAT => {
                if let Some(pat) = Pat::read(complete) {
                    self.handle_pat(table, pat);
                }
            }
            tid::CAT if pid == Pid::CAT => {
                if let Some(cat) = Cat::read(complete) {
                    self.handle_cat(&cat, pid);
                }
            }
            tid::PMT => {
                if let Some(pmt) = Pmt::read(complete) {
                    self.handle_pmt(table, pmt, pid);
                }
            }
            tid::TSDT if pid == Pid::TSDT => {
                if let Some(tsdt) = Tsdt::read(complete) {
                    if self.filters.has_table_id(tid::TSDT) {
                        self.handler.on_tsdt(&tsdt, pid);
                    }
                }
            }
            tid::NIT_ACT | tid::NIT_OTH if pid == self.nit_pid() => {
                if let Some(nit) = Nit::read(complete) {
                    self.handle_nit(table, nit, pid);
                }
            }
            tid::SDT_ACT | tid::SDT_OTH if pid == Pid::SDT => {
                if let Some(sdt) = Sdt::read(complete) {
                    self.handle_sdt(table, &sdt, pid);
                }
            }
            tid::BAT if pid == Pid::BAT => {
                if let Some(bat) = Bat::read(complete) {
                    if self.filters.has_table_id(tid::BAT) {
                        self.handler.on_bat(&bat, pid);
                    }
                }
            }
            tid::RST if pid == Pid::RST => {
                if let Some(rst) = Rst::read(complete) {
                    if self.filters.has_table_id(tid::RST) {
                        self.handler.on_rst(&rst, pid);
                    }
                }
            }
            tid::TDT if pid == Pid::TDT => {
                if let Some(tdt) = Tdt::read(complete) {
                    self.last_utc = Some(tdt.utc_time.clone());
                    if self.filters.has_table_id(tid::TDT) {
                        self.handler.on_tdt(&tdt, pid);
                    }
                    self.handler.on_utc(&tdt.utc_time, tid::TDT);
                }
            }
            tid::TOT if pid == Pid::TOT => {
                if let Some(tot) = Tot::read(complete) {
                    self.last_utc = Some(tot.utc_time.clone());
                    if self.filters.has_table_id(tid::TOT) {
                        self.handler.on_tot(&tot, pid);
                    }
                    self.handler.on_utc(&tot.utc_time, tid::TOT);
                }
            }
            tid::MGT if pid == Pid::PSIP => {
                if let Some(mgt) = Mgt::read(complete) {
                    self.handle_mgt(&mgt, pid);
                }
            }
            tid::TVCT | tid::CVCT if pid == Pid::PSIP => {
                if let Some(vct) = Vct::read(complete) {
                    self.handle_vct(table, &vct, pid);
                }
            }
            tid::RRT if pid == Pid::PSIP => {
                if let Some(rrt) = Rrt::read(complete) {
                    if self.filters.has_table_id(tid::RRT) {
                        self.handler.on_rrt(&rrt, pid);
                    }
                }
            }
            tid::SAT if pid == Pid::SAT => {
                if let Some(sat) = Sat::read(complete) {
                    if self.filters.has_table_id(tid::SAT) {
                        self.handler.on_sat(&sat, pid);
                    }
                }
            }
            tid::SGT => {
                if let Some(sgt) = Sgt::read(complete) {
                    self.handle_sgt(table, &sgt);
                }
            }
            table_id => {
                log::trace!("ignored table: pid={:?}, table_id={:02X}", pid, table_id);
            }
        }
    }

    fn handle_pat(&mut self, table: &mut demux::Table, pat: Pat) {
        // 無くなったか変わったPMTのPID
        if let Some(old) = &self.last_pat {
            if self.filters.has_table_id(tid::PMT) || !self.filters.service_ids.is_empty() {
                for (service_id, &pid) in &old.pmts {
                    if pat.pmts.get(service_id) != Some(&pid) {
                        unsubscribe(table, &mut self.repo, pid);
                    }
                }
            }
        }

        let ts_id = pat.transport_stream_id;
        let pmts: Vec<(u16, Pid)> = pat.pmts.iter().map(|(&id, &pid)| (id, pid)).collect();
        self.last_pat = Some(pat);
        self.last_pat_handled = false;
        self.handle_ts_id(ts_id, tid::PAT);

        for &(service_id, pmt_pid) in &pmts {
            if self.filters.has_table_id(tid::PMT) || self.filters.has_service_id(service_id) {
                table.add_pid(pmt_pid);
            }

            if let Some(ctx) = self.service_context(service_id, CreateService::Always) {
                ctx.service.set_pmt_pid(pmt_pid);
                ctx.service.set_ts_id(ts_id);
            }
            self.handle_service(table, service_id, true, false);
        }

        if self.filters.has_group(TableGroup::Nit) {
            table.add_pid(self.nit_pid());
        }

        if self.filters.has_table_id(tid::PAT) {
            if let Some(pat) = &self.last_pat {
                self.last_pat_handled = true;
                self.handler.on_pat(pat, Pid::PAT);
            }
        }

        // PATから無くなったサービス
        let removed: Vec<u16> = self
            .services
            .keys()
            .copied()
            .filter(|id| !pmts.iter().any(|&(sid, _)| sid == *id))
            .collect();
        for service_id in removed {
            self.handle_service(table, service_id, false, true);
            self.services.shift_remove(&service_id);
            for ctx in self.pid_contexts.iter_mut().flatten() {
                ctx.services.remove(&service_id);
            }
        }

        // PATより先に受信したNIT
        if !self.last_nit_handled {
            if let Some(nit) = self.last_nit.take() {
                let pid = self.nit_pid();
                self.handle_nit(table, nit, pid);
            }
        }
    }

    fn handle_cat(&mut self, cat: &Cat, pid: Pid) {
        if self.filters.has_table_id(tid::CAT) {
            self.handler.on_cat(cat, pid);
        }

        for ca in cat.descriptors.get_all::<ConditionalAccessDescriptor>() {
            self.set_cas(&ca, PidClass::Emm);
        }
    }

    fn handle_pmt(&mut self, table: &mut demux::Table, pmt: Pmt, pid: Pid) {
        let service_id = pmt.service_id;
        if self.service_context(service_id, CreateService::Never).is_none() {
            log::debug!("pmt for unknown service: {:04X}", service_id);
            return;
        }

        // 構成要素が変わっている場合に備えて作り直す
        for ctx in self.pid_contexts.iter_mut().flatten() {
            ctx.services.remove(&service_id);
        }

        let ctx = self.pid_context_mut(pid);
        ctx.pid_class = PidClass::Psi;
        ctx.services.insert(service_id);

        if pmt.pcr_pid != Pid::NULL {
            let ctx = self.pid_context_mut(pmt.pcr_pid);
            if ctx.pid_class == PidClass::Undefined {
                ctx.pid_class = PidClass::PcrOnly;
            }
        }

        for ca in pmt.descriptors.get_all::<ConditionalAccessDescriptor>() {
            self.set_cas(&ca, PidClass::Ecm).services.insert(service_id);
        }

        for es in &pmt.streams {
            let (class, codec) = stream::classify(es.stream_type, &es.descriptors);
            let ctx = self.pid_context_mut(es.elementary_pid);
            ctx.pid_class = class;
            ctx.codec = codec;
            ctx.stream_type = Some(es.stream_type);
            ctx.services.insert(service_id);

            for ca in es.descriptors.get_all::<ConditionalAccessDescriptor>() {
                self.set_cas(&ca, PidClass::Ecm).services.insert(service_id);
            }

            // 論理チャンネル番号を運ぶSGTを集める
            if es.stream_type == StreamType::PRIVATE_SECTIONS {
                table.add_pid(es.elementary_pid);
            }
        }

        if self.filters.has_table_id(tid::PMT) || self.filters.has_service_id(service_id) {
            self.handler.on_pmt(&pmt, pid);
        }

        if let Some(ctx) = self.services.get_mut(&service_id) {
            ctx.service.set_pmt_pid(pid);
            ctx.pmt = Some(pmt);
        }
        // 構成要素の変化は属性に現れないため常に通知する
        self.handle_service(table, service_id, false, false);
    }

    fn handle_nit(&mut self, table: &mut demux::Table, nit: Nit, pid: Pid) {
        if nit.is_actual {
            self.network_id = Some(nit.network_id);
            self.last_nit_handled = false;
            if self.last_pat.is_none() {
                // トランスポートストリーム識別が分かるまで保留
                self.last_nit = Some(nit);
                return;
            }
        }

        let table_id = if nit.is_actual {
            tid::NIT_ACT
        } else {
            tid::NIT_OTH
        };
        if self.filters.has_table_id(table_id) {
            if nit.is_actual {
                self.last_nit_handled = true;
            }
            self.handler.on_nit(&nit, pid);
        }

        if nit.is_actual {
            let mut lcns = LogicalChannelNumbers::new();
            lcns.add_from_nit(&nit, self.ts_id, None);
            self.last_nit = Some(nit);
            self.process_lcn(table, &lcns);
        }
    }

    fn process_lcn(&mut self, table: &mut demux::Table, lcns: &LogicalChannelNumbers) {
        let mut view = ServiceContextMapView {
            services: &mut self.services,
            ts_id: self.ts_id,
            onid: self.onid,
        };
        lcns.update_services(&mut view, Replacement::UPDATE);

        let ids: Vec<u16> = self.services.keys().copied().collect();
        for service_id in ids {
            self.handle_service(table, service_id, true, false);
        }
    }

    fn handle_sgt(&mut self, table: &mut demux::Table, sgt: &Sgt) {
        let mut lcns = LogicalChannelNumbers::new();
        lcns.add_from_sgt(sgt, self.ts_id, None);
        self.process_lcn(table, &lcns);
    }

    fn handle_sdt(&mut self, table: &mut demux::Table, sdt: &Sdt, pid: Pid) {
        let table_id = if sdt.is_actual {
            tid::SDT_ACT
        } else {
            tid::SDT_OTH
        };
        if self.filters.has_table_id(table_id) {
            self.handler.on_sdt(sdt, pid);
        }
        if !sdt.is_actual {
            return;
        }

        self.handle_ts_id(sdt.transport_stream_id, tid::SDT_ACT);
        self.onid = Some(sdt.original_network_id);

        for s in &sdt.services {
            let Some(ctx) = self.service_context(s.service_id, CreateService::IfMayExist) else {
                continue;
            };
            let service = &mut ctx.service;
            service.set_ts_id(sdt.transport_stream_id);
            service.set_onid(sdt.original_network_id);
            service.set_eits_present(s.eit_schedule_flag);
            service.set_eitpf_present(s.eit_present_following_flag);
            service.set_ca_controlled(s.free_ca_mode);
            service.set_running_status(s.running_status);
            if let Some(sd) = s.descriptors.get::<ServiceDescriptor>() {
                service.set_type_dvb(sd.service_type);
                service.set_name(sd.service_name);
                service.set_provider(sd.provider_name);
            }

            self.handle_service(table, s.service_id, true, false);
        }
    }

    fn handle_mgt(&mut self, mgt: &Mgt, pid: Pid) {
        if self.filters.has_table_id(tid::MGT) {
            self.handler.on_mgt(mgt, pid);
        }

        for t in &mgt.tables {
            self.pid_context_mut(t.pid).pid_class = PidClass::Psi;
        }
    }

    fn handle_vct(&mut self, table: &mut demux::Table, vct: &Vct, pid: Pid) {
        let table_id = match vct.kind {
            VctKind::Terrestrial => tid::TVCT,
            VctKind::Cable => tid::CVCT,
        };
        self.handle_ts_id(vct.transport_stream_id, table_id);

        if self.filters.has_table_id(table_id) {
            match vct.kind {
                VctKind::Terrestrial => self.handler.on_tvct(vct, pid),
                VctKind::Cable => self.handler.on_cvct(vct, pid),
            }
            self.handler.on_vct(vct, pid);
        }

        for ch in &vct.channels {
            let Some(ctx) = self.service_context(ch.program_number, CreateService::IfMayExist)
            else {
                continue;
            };
            let service = &mut ctx.service;
            service.set_ts_id(ch.channel_tsid);
            service.set_name(ch.short_name.as_str());
            service.set_major_id_atsc(ch.major_channel_number);
            service.set_minor_id_atsc(ch.minor_channel_number);
            service.set_type_atsc(ch.service_type);
            service.set_ca_controlled(ch.access_controlled);
            service.set_hidden(ch.hidden);

            self.handle_service(table, ch.program_number, true, false);
        }
    }

    fn handle_stt(&mut self, psi: &PsiSection, pid: Pid) {
        let Some(stt) = Stt::read_section(psi) else {
            return;
        };

        let utc = stt.utc_time();
        self.last_utc = Some(utc.clone());
        if self.filters.has_table_id(tid::STT) {
            self.handler.on_stt(&stt, pid);
        }
        self.handler.on_utc(&utc, tid::STT);
    }
}

impl<H: SignalizationHandler> demux::Filter for Core<H> {
    fn on_psi_section(&mut self, ctx: &mut demux::Context, psi: &PsiSection) {
        let pid = ctx.packet().pid();

        // STTはバージョン番号が変わらないまま内容が変わる
        if psi.table_id == tid::STT && pid == Pid::PSIP {
            self.handle_stt(psi, pid);
            return;
        }

        if let Some(complete) = self.repo.push(pid, psi) {
            self.handle_table(ctx.table(), &complete);
        }
    }
}

#[cfg(test)]
mod tests;
