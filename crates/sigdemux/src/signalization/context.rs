//! PIDとサービスごとに蓄積する情報。

use std::collections::BTreeSet;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::lcn::ServiceContainer;
use crate::packet::Packet;
use crate::pid::Pid;
use crate::psi::table::Pmt;
use crate::service::Service;
use crate::stream::{CodecType, PidClass, StreamType};
use crate::time::Timestamp;

/// ある時点のパケットの情報。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidPoint {
    /// PID内でのパケットの番号（0始まり）。
    pub packet_index: u64,
    /// PCR。
    pub pcr: Option<Timestamp>,
    /// PTS。
    pub pts: Option<Timestamp>,
    /// DTS。
    pub dts: Option<Timestamp>,
    /// 連続性指標。
    pub continuity_counter: u8,
}

/// PIDごとに蓄積する情報。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidContext {
    /// 一度でもスクランブルされたパケットがあったかどうか。
    pub scrambled: bool,
    /// PIDの分類。
    pub pid_class: PidClass,
    /// 符号化方式。
    pub codec: CodecType,
    /// PMTで示されたストリーム形式種別。
    pub stream_type: Option<StreamType>,
    /// CA記述子で示された限定受信方式識別。
    pub cas_id: Option<u16>,
    /// パケット数。
    pub packets: u64,
    /// ペイロードユニット開始指示のあるパケット数。
    pub pusi_count: u64,
    /// イントラフレームの始まりを含むパケット数。
    pub intra_count: u64,
    /// 最初のペイロードユニット開始。
    pub first_pusi: Option<PidPoint>,
    /// 最後のペイロードユニット開始。
    pub last_pusi: Option<PidPoint>,
    /// 最初のイントラフレーム。
    pub first_intra: Option<PidPoint>,
    /// 最後のイントラフレーム。
    pub last_intra: Option<PidPoint>,
    /// このPIDを構成要素とするサービスのサービス識別。
    pub services: BTreeSet<u16>,
}

impl PidContext {
    /// `pid`の`PidContext`を生成する。
    ///
    /// ヌルパケットのPIDはスタッフィング、予約されたPIDはPSIとして分類される。
    pub fn new(pid: Pid) -> PidContext {
        let pid_class = if pid == Pid::NULL {
            PidClass::Stuffing
        } else if pid.is_reserved_signalization() {
            PidClass::Psi
        } else {
            PidClass::Undefined
        };

        PidContext {
            scrambled: false,
            pid_class,
            codec: CodecType::Undefined,
            stream_type: None,
            cas_id: None,
            packets: 0,
            pusi_count: 0,
            intra_count: 0,
            first_pusi: None,
            last_pusi: None,
            first_intra: None,
            last_intra: None,
            services: BTreeSet::new(),
        }
    }

    /// パケットの統計を更新する。
    pub(super) fn record_packet(&mut self, packet: &Packet) {
        if packet.unit_start_indicator() {
            let pes_header = packet.pes_header();
            let point = PidPoint {
                packet_index: self.packets,
                pcr: packet.pcr(),
                pts: pes_header.as_ref().and_then(|h| h.pts),
                dts: pes_header.as_ref().and_then(|h| h.dts),
                continuity_counter: packet.continuity_counter(),
            };
            self.pusi_count += 1;
            self.last_pusi = Some(point);
            self.first_pusi.get_or_insert(point);

            if let Some(payload) = packet.payload() {
                let data = match &pes_header {
                    Some(h) => payload.get(h.payload_offset..).unwrap_or_default(),
                    None => payload,
                };
                if crate::stream::find_intra_image(data, self.codec) {
                    self.intra_count += 1;
                    self.last_intra = Some(point);
                    self.first_intra.get_or_insert(point);
                }
            }
        }

        self.packets += 1;
        if packet.is_scrambled() {
            self.scrambled = true;
        }
    }

    /// 最後のパケットがイントラフレームの始まりを含んでいたかどうかを返す。
    #[inline]
    pub fn at_intra_frame(&self) -> bool {
        self.last_intra
            .map_or(false, |p| p.packet_index + 1 == self.packets)
    }
}

/// サービスごとに蓄積する情報。
#[derive(Debug, Clone)]
pub struct ServiceContext {
    /// サービスの属性。
    pub service: Service,
    /// 最後に受信したPMT。
    pub pmt: Option<Pmt>,
}

impl ServiceContext {
    /// `service_id`の`ServiceContext`を生成する。
    ///
    /// サービス識別の設定により、生成直後のサービスは変更済みとなる。
    pub fn new(service_id: u16) -> ServiceContext {
        let mut service = Service::default();
        service.set_id(service_id);
        ServiceContext { service, pmt: None }
    }
}

/// サービス識別から[`ServiceContext`]を得るための、順序を保持する連想配列。
pub type ServiceContextMap = IndexMap<u16, ServiceContext, FxBuildHasher>;

/// [`ServiceContext`]を生成する条件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CreateService {
    /// 常に生成する。
    Always,
    /// PATを受信していないか、PATにサービスがある場合に生成する。
    IfMayExist,
    /// 生成しない。
    Never,
}

/// [`ServiceContextMap`]を[`ServiceContainer`]として扱うためのビュー。
///
/// 追加されるサービスは、現在のトランスポートストリームのものだけを受け入れる。
pub(super) struct ServiceContextMapView<'a> {
    pub services: &'a mut ServiceContextMap,
    pub ts_id: Option<u16>,
    pub onid: Option<u16>,
}

impl<'a> ServiceContainer for ServiceContextMapView<'a> {
    fn for_each_service(&mut self, f: &mut dyn FnMut(&mut Service)) {
        for ctx in self.services.values_mut() {
            f(&mut ctx.service);
        }
    }

    fn push_service(&mut self, service: Service) {
        let Some(ts_id) = self.ts_id else {
            return;
        };
        let Some(id) = service.id() else {
            return;
        };
        if service.ts_id().map_or(false, |id| id != ts_id) {
            return;
        }
        if let (Some(a), Some(b)) = (self.onid, service.onid()) {
            if a != b {
                return;
            }
        }

        self.services
            .entry(id)
            .or_insert_with(|| ServiceContext::new(id))
            .service = service;
    }
}
