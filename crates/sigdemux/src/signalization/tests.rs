use std::collections::HashMap;

use super::*;
use crate::testing;

#[derive(Default)]
struct Recorder {
    pats: usize,
    cats: usize,
    pmts: Vec<(u16, Pid)>,
    nits: usize,
    sdts: usize,
    mgts: usize,
    tvcts: usize,
    vcts: usize,
    stts: usize,
    utcs: Vec<(DateTime, u8)>,
    ts_ids: Vec<(u16, u8)>,
    services: Vec<(Option<u16>, Service, bool, bool)>,
}

impl Recorder {
    fn removed(&self) -> Vec<u16> {
        self.services
            .iter()
            .filter(|s| s.2)
            .filter_map(|s| s.1.id())
            .collect()
    }
}

impl SignalizationHandler for Recorder {
    fn on_pat(&mut self, _: &Pat, _: Pid) {
        self.pats += 1;
    }

    fn on_cat(&mut self, _: &Cat, _: Pid) {
        self.cats += 1;
    }

    fn on_pmt(&mut self, pmt: &Pmt, pid: Pid) {
        self.pmts.push((pmt.service_id, pid));
    }

    fn on_nit(&mut self, _: &Nit, _: Pid) {
        self.nits += 1;
    }

    fn on_sdt(&mut self, _: &Sdt, _: Pid) {
        self.sdts += 1;
    }

    fn on_mgt(&mut self, _: &Mgt, _: Pid) {
        self.mgts += 1;
    }

    fn on_vct(&mut self, _: &Vct, _: Pid) {
        self.vcts += 1;
    }

    fn on_tvct(&mut self, _: &Vct, _: Pid) {
        self.tvcts += 1;
    }

    fn on_stt(&mut self, _: &Stt, _: Pid) {
        self.stts += 1;
    }

    fn on_utc(&mut self, utc: &DateTime, table_id: u8) {
        self.utcs.push((utc.clone(), table_id));
    }

    fn on_ts_id(&mut self, ts_id: u16, table_id: u8) {
        self.ts_ids.push((ts_id, table_id));
    }

    fn on_service(&mut self, ts_id: Option<u16>, service: &Service, pmt: Option<&Pmt>, removed: bool) {
        self.services
            .push((ts_id, service.clone(), removed, pmt.is_some()));
    }
}

/// PIDごとの連続性指標を管理しつつセクションを流し込む。
#[derive(Default)]
struct Feeder {
    cc: HashMap<Pid, u8>,
}

impl Feeder {
    fn feed<H: SignalizationHandler>(
        &mut self,
        demux: &mut SignalizationDemux<H>,
        pid: u16,
        section: &[u8],
    ) {
        let pid = Pid::new(pid);
        let cc = self.cc.entry(pid).or_insert(0);
        for packet in testing::packetize(pid, section, cc) {
            demux.feed_packet(&packet);
        }
    }
}

fn pat(ts_id: u16, version: u8, programs: &[(u16, u16)]) -> Vec<u8> {
    let payload: Vec<u8> = programs
        .iter()
        .flat_map(|&(id, pid)| {
            let [a, b] = id.to_be_bytes();
            [a, b, 0xE0 | (pid >> 8) as u8, pid as u8]
        })
        .collect();
    testing::section(0x00, ts_id, version, 0, 0, &payload)
}

fn pmt(service_id: u16, version: u8, pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
    let mut payload = vec![0xE0 | (pcr_pid >> 8) as u8, pcr_pid as u8, 0xF0, 0x00];
    for &(stream_type, pid) in streams {
        payload.extend_from_slice(&[stream_type, 0xE0 | (pid >> 8) as u8, pid as u8, 0xF0, 0x00]);
    }
    testing::section(0x02, service_id, version, 0, 0, &payload)
}

fn nit(network_id: u16, ts_id: u16, onid: u16, lcns: &[(u16, u16)]) -> Vec<u8> {
    let entries: Vec<u8> = lcns
        .iter()
        .flat_map(|&(id, lcn)| {
            let [a, b] = id.to_be_bytes();
            [a, b, 0xFC | (lcn >> 8) as u8, lcn as u8]
        })
        .collect();
    let ts = [
        &ts_id.to_be_bytes()[..],
        &onid.to_be_bytes(),
        &testing::descriptor_loop(&[testing::descriptor(0x83, &entries)])[..],
    ]
    .concat();
    let payload = [
        &testing::descriptor_loop(&[])[..],
        &[0xF0 | (ts.len() >> 8) as u8, ts.len() as u8],
        &ts[..],
    ]
    .concat();
    testing::section(0x40, network_id, 0, 0, 0, &payload)
}

fn sdt(ts_id: u16, onid: u16, service_id: u16, name: &str) -> Vec<u8> {
    let body = [&[0x01, 0x00, name.len() as u8][..], name.as_bytes()].concat();
    let desc = testing::descriptor(0x48, &body);
    let payload = [
        &onid.to_be_bytes()[..],
        &[0xFF],
        &service_id.to_be_bytes(),
        &[0xFD, 0x80, desc.len() as u8],
        &desc[..],
    ]
    .concat();
    testing::section(0x42, ts_id, 0, 0, 0, &payload)
}

fn sgt(service_list_id: u16, entries: &[(u16, u16, u16, u16, bool)]) -> Vec<u8> {
    let services: Vec<u8> = entries
        .iter()
        .flat_map(|&(id, ts_id, onid, lcn, visible)| {
            let lcn = lcn << 2 | if visible { 0b10 } else { 0 };
            [
                &id.to_be_bytes()[..],
                &ts_id.to_be_bytes(),
                &onid.to_be_bytes(),
                &lcn.to_be_bytes(),
                &[0x00, 0x00, 0xF0, 0x00],
            ]
            .concat()
        })
        .collect();
    let payload = [
        &[0xFF, 0xFF][..],
        &testing::descriptor_loop(&[])[..],
        &[0xF0 | (services.len() >> 8) as u8, services.len() as u8],
        &services[..],
    ]
    .concat();
    testing::section(0x91, service_list_id, 0, 0, 0, &payload)
}

fn stt(system_time: u32) -> Vec<u8> {
    let payload = [&[0x00][..], &system_time.to_be_bytes(), &[0x12, 0x00, 0x00]].concat();
    testing::section(0xCD, 0x0000, 0, 0, 0, &payload)
}

fn tvct(ts_id: u16, version: u8, name: &str, major: u16, minor: u16, program: u16) -> Vec<u8> {
    let mut ch: Vec<u8> = name.encode_utf16().flat_map(u16::to_be_bytes).collect();
    ch.resize(14, 0);
    ch.push(0xF0 | (major >> 6) as u8);
    ch.push((major << 2) as u8 | (minor >> 8) as u8);
    ch.push(minor as u8);
    ch.push(0x04);
    ch.extend_from_slice(&[0, 0, 0, 0]);
    ch.extend_from_slice(&ts_id.to_be_bytes());
    ch.extend_from_slice(&program.to_be_bytes());
    ch.push(0x0D);
    ch.push(0xC2);
    ch.extend_from_slice(&[0x00, 0x01]);
    ch.extend_from_slice(&[0xFC, 0x00]);

    let payload = [&[0x00, 0x01][..], &ch[..], &[0xFC, 0x00]].concat();
    testing::section(0xC8, ts_id, version, 0, 0, &payload)
}

#[test]
fn test_pat_pmt() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100)]));
    assert_eq!(demux.ts_id(), Some(0x0010));
    assert_eq!(demux.handler().pats, 1);
    assert_eq!(demux.handler().ts_ids, [(0x0010, tid::PAT)]);
    assert_eq!(demux.handler().services.len(), 1);
    assert!(demux.demux.table().has_pid(Pid::new(0x0100)));

    demux.handler_mut().services.clear();
    feeder.feed(
        &mut demux,
        0x0100,
        &pmt(0x0001, 0, 0x0101, &[(0x02, 0x0101), (0x0F, 0x0102)]),
    );

    let services = &demux.handler().services;
    assert_eq!(services.len(), 1);
    let (ts_id, service, removed, has_pmt) = &services[0];
    assert_eq!(*ts_id, Some(0x0010));
    assert_eq!(service.id(), Some(0x0001));
    assert_eq!(service.pmt_pid(), Some(Pid::new(0x0100)));
    assert!(!removed);
    assert!(has_pmt);
    assert_eq!(demux.handler().pmts, [(0x0001, Pid::new(0x0100))]);

    assert_eq!(demux.pid_class(Pid::new(0x0100)), PidClass::Psi);
    assert_eq!(demux.pid_class(Pid::new(0x0101)), PidClass::Video);
    assert_eq!(demux.codec_type(Pid::new(0x0101)), CodecType::Mpeg2Video);
    assert_eq!(demux.pid_class(Pid::new(0x0102)), PidClass::Audio);
    assert_eq!(demux.stream_type(Pid::new(0x0102)), Some(StreamType(0x0F)));
    assert_eq!(demux.service_ids_of(Pid::new(0x0101)).collect::<Vec<_>>(), [0x0001]);
    assert!(demux.in_service(Pid::new(0x0102), 0x0001));
    assert!(demux.in_any_service(Pid::new(0x0102), &[0x0005, 0x0001]));
    assert_eq!(demux.service_id_of(Pid::new(0x0100)), Some(0x0001));
    assert_eq!(demux.reference_pmt_pid(Pid::new(0x0102)), Some(Pid::new(0x0100)));
    assert_eq!(demux.pmt(0x0001).map(|pmt| pmt.streams.len()), Some(2));

    let pids: Vec<Pid> = demux.pids().collect();
    assert_eq!(pids, [Pid::PAT, Pid::new(0x0100)]);
    assert_eq!(demux.pid_context(Pid::PAT).unwrap().packets, 1);
    assert_eq!(demux.pid_context(Pid::PAT).unwrap().pusi_count, 1);
}

#[test]
fn test_pmt_for_unknown_service() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100)]));
    demux.handler_mut().services.clear();

    // PATにないサービスのPMT
    feeder.feed(&mut demux, 0x0100, &pmt(0x0002, 0, 0x1FFF, &[(0x02, 0x0201)]));
    assert!(demux.handler().services.is_empty());
    assert!(demux.handler().pmts.is_empty());
    assert_eq!(demux.pid_class(Pid::new(0x0201)), PidClass::Undefined);
    assert!(demux.service(0x0002).is_none());
}

#[test]
fn test_pat_idempotence() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();
    let programs = [(0x0001, 0x0100), (0x0002, 0x0200)];

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &programs));
    assert_eq!(demux.handler().services.len(), 2);
    assert_eq!(demux.handler().pats, 1);

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &programs));
    assert_eq!(demux.handler().services.len(), 2);
    assert_eq!(demux.handler().pats, 1);

    // バージョンだけが変わったPAT
    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 1, &programs));
    assert_eq!(demux.handler().services.len(), 2);
    assert_eq!(demux.handler().pats, 2);
    assert_eq!(demux.service_ids().collect::<Vec<_>>(), [0x0001, 0x0002]);
}

#[test]
fn test_service_removal() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100), (0x0002, 0x0200)]));
    feeder.feed(&mut demux, 0x0200, &pmt(0x0002, 0, 0x0201, &[(0x1B, 0x0201)]));
    assert!(demux.in_service(Pid::new(0x0201), 0x0002));
    assert!(demux.handler().removed().is_empty());

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 1, &[(0x0001, 0x0100)]));
    assert_eq!(demux.handler().removed(), [0x0002]);
    assert!(demux.service(0x0002).is_none());
    assert!(!demux.in_service(Pid::new(0x0201), 0x0002));
    assert!(!demux.demux.table().has_pid(Pid::new(0x0200)));
    assert!(demux.demux.table().has_pid(Pid::new(0x0100)));
}

#[test]
fn test_nit_ordering() {
    let programs = [(0x0001, 0x0100), (0x0002, 0x0200)];
    let nit = nit(0x3001, 0x0010, 0x0020, &[(0x0001, 5), (0x0002, 6), (0x0003, 7)]);

    // NITが先
    let mut a = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();
    feeder.feed(&mut a, 0x0010, &nit);
    assert_eq!(a.network_id(), Some(0x3001));
    assert_eq!(a.handler().nits, 0);
    assert!(a.service(0x0001).is_none());
    feeder.feed(&mut a, 0x0000, &pat(0x0010, 0, &programs));
    assert_eq!(a.handler().nits, 1);

    // PATが先
    let mut b = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();
    feeder.feed(&mut b, 0x0000, &pat(0x0010, 0, &programs));
    feeder.feed(&mut b, 0x0010, &nit);
    assert_eq!(b.handler().nits, 1);

    for demux in [&a, &b] {
        assert_eq!(demux.service(0x0001).and_then(Service::lcn), Some(5));
        assert_eq!(demux.service(0x0002).and_then(Service::lcn), Some(6));
        assert_eq!(demux.service(0x0001).and_then(Service::hidden), Some(false));
        // 更新のみでサービスは追加しない
        assert!(demux.service(0x0003).is_none());
        assert_eq!(demux.last_nit().map(|nit| nit.network_id), Some(0x3001));
    }

    // 論理チャンネル番号の設定も通知される
    let notified = b
        .handler()
        .services
        .iter()
        .filter(|s| s.1.lcn().is_some())
        .count();
    assert_eq!(notified, 2);
}

#[test]
fn test_filter_minimality() {
    let mut demux = SignalizationDemux::with_table_ids(Recorder::default(), &[tid::PAT]);
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100), (0x0002, 0x0200)]));
    // 既定のフィルターでなければサービスは通知しない
    assert!(demux.handler().services.is_empty());
    assert!(!demux.demux.table().has_pid(Pid::new(0x0100)));

    assert!(demux.add_filtered_service_id(0x0001));
    assert!(!demux.add_filtered_service_id(0x0001));
    assert!(demux.demux.table().has_pid(Pid::new(0x0100)));
    assert!(!demux.demux.table().has_pid(Pid::new(0x0200)));

    assert!(demux.remove_filtered_service_id(0x0001));
    assert!(!demux.remove_filtered_service_id(0x0001));
    assert!(!demux.demux.table().has_pid(Pid::new(0x0100)));
    assert!(demux.demux.table().has_pid(Pid::PAT));
}

#[test]
fn test_table_id_filters() {
    let mut demux = SignalizationDemux::with_table_ids((), &[]);
    let table = |demux: &SignalizationDemux| -> Vec<Pid> { demux.demux.table().pids().collect() };
    assert!(table(&demux).is_empty());

    assert!(!demux.add_filtered_table_id(0x4E));
    assert!(!demux.is_filtered_table_id(0x4E));

    assert!(demux.add_filtered_table_id(tid::SDT_ACT));
    assert!(demux.add_filtered_table_id(tid::BAT));
    assert_eq!(table(&demux), [Pid::SDT]);

    assert!(demux.remove_filtered_table_id(tid::SDT_ACT));
    assert_eq!(table(&demux), [Pid::SDT]);
    assert!(demux.remove_filtered_table_id(tid::BAT));
    assert!(table(&demux).is_empty());
    assert!(!demux.remove_filtered_table_id(tid::BAT));

    assert!(demux.add_filtered_table_ids(&[tid::NIT_OTH, tid::TOT, tid::STT]));
    assert_eq!(table(&demux), [Pid::PAT, Pid::NIT, Pid::TOT, Pid::PSIP]);
    assert!(demux.remove_filtered_table_ids(&[tid::NIT_OTH, tid::TOT, tid::STT]));
    assert_eq!(table(&demux), [Pid::PAT]);
    assert!(!demux.remove_filtered_table_id(tid::PAT));
}

#[test]
fn test_pending_pat() {
    let mut demux = SignalizationDemux::with_table_ids(Recorder::default(), &[tid::PMT]);
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100)]));
    assert_eq!(demux.handler().pats, 0);
    assert!(demux.last_pat().is_some());

    assert!(demux.add_filtered_table_id(tid::PAT));
    assert_eq!(demux.handler().pats, 1);
    assert!(demux.add_filtered_table_id(tid::PAT));
    assert_eq!(demux.handler().pats, 1);
}

#[test]
fn test_stt_every_section() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    for time in [0x4B36_E312, 0x4B36_E313, 0x4B36_E314] {
        feeder.feed(&mut demux, 0x1FFB, &stt(time));
    }

    let handler = demux.handler();
    assert_eq!(handler.stts, 3);
    assert_eq!(
        handler.utcs,
        [
            (DateTime::from_gps(0x4B36_E312, 0x12), tid::STT),
            (DateTime::from_gps(0x4B36_E313, 0x12), tid::STT),
            (DateTime::from_gps(0x4B36_E314, 0x12), tid::STT),
        ]
    );
    assert_eq!(demux.last_utc(), Some(&DateTime::from_gps(0x4B36_E314, 0x12)));
}

#[test]
fn test_tdt() {
    let mut demux = SignalizationDemux::with_table_ids(Recorder::default(), &[]);
    let mut feeder = Feeder::default();
    demux.add_filtered_table_id(tid::TOT);

    // TDTはフィルターされていなくても時刻を通知する
    let tdt = testing::short_section(0x70, &hex_literal::hex!("C0 79 12 45 00"));
    feeder.feed(&mut demux, 0x0014, &tdt);
    feeder.feed(&mut demux, 0x0014, &tdt);
    assert_eq!(demux.handler().utcs.len(), 2);
    assert_eq!(demux.handler().utcs[0].1, tid::TDT);
    assert_eq!(
        demux.last_utc(),
        Some(&DateTime::read_mjd(&hex_literal::hex!("C0 79 12 45 00")))
    );
}

#[test]
fn test_name_filter() {
    let mut demux = SignalizationDemux::with_table_ids(Recorder::default(), &[tid::PAT]);
    let mut feeder = Feeder::default();

    assert!(demux.add_filtered_service("Chan One"));
    assert!(!demux.add_filtered_service("chan  one"));
    assert!(demux.is_filtered_service_name("CHANONE"));
    for table_id in [tid::SDT_ACT, tid::MGT, tid::CVCT, tid::TVCT] {
        assert!(demux.is_filtered_table_id(table_id));
    }

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100), (0x0002, 0x0200)]));
    assert!(demux.handler().services.is_empty());

    feeder.feed(&mut demux, 0x0011, &sdt(0x0010, 0x0020, 0x0001, "Chan One"));
    assert_eq!(demux.handler().sdts, 1);
    assert_eq!(demux.original_network_id(), Some(0x0020));
    assert!(demux.is_filtered_service_id(0x0001));
    assert!(!demux.is_filtered_service_id(0x0002));
    assert!(demux.demux.table().has_pid(Pid::new(0x0100)));

    let services = &demux.handler().services;
    assert_eq!(services.len(), 1);
    let service = &services[0].1;
    assert_eq!(service.name(), Some("Chan One"));
    assert_eq!(service.type_dvb(), Some(0x01));
    assert_eq!(service.onid(), Some(0x0020));
    assert_eq!(service.eits_present(), Some(false));
    assert_eq!(service.eitpf_present(), Some(true));
    assert_eq!(service.running_status(), Some(crate::psi::table::RunningStatus::Running));

    assert!(demux.remove_filtered_service("Chan One"));
    assert!(!demux.is_filtered_service_name("Chan One"));
    assert!(!demux.is_filtered_service_id(0x0001));
    assert!(!demux.demux.table().has_pid(Pid::new(0x0100)));
}

#[test]
fn test_vct() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    // PATより先のVCTもサービスを作る
    feeder.feed(&mut demux, 0x1FFB, &tvct(0x0ABC, 0, "KCET", 28, 1, 0x0003));
    assert_eq!(demux.handler().tvcts, 1);
    assert_eq!(demux.handler().vcts, 1);
    assert_eq!(demux.handler().ts_ids, [(0x0ABC, tid::TVCT)]);

    let service = demux.service(0x0003).unwrap();
    assert_eq!(service.name(), Some("KCET"));
    assert_eq!(service.major_id_atsc(), Some(28));
    assert_eq!(service.minor_id_atsc(), Some(1));
    assert_eq!(service.type_atsc(), Some(0x02));
    assert_eq!(service.ts_id(), Some(0x0ABC));
    assert_eq!(demux.handler().services.len(), 1);

    feeder.feed(&mut demux, 0x0000, &pat(0x0ABC, 0, &[(0x0004, 0x0040)]));
    assert_eq!(demux.handler().removed(), [0x0003]);
    assert_eq!(demux.handler().ts_ids.len(), 1);

    // PATにないサービスは作らない
    feeder.feed(&mut demux, 0x1FFB, &tvct(0x0ABC, 1, "KCET", 28, 2, 0x0005));
    assert_eq!(demux.handler().tvcts, 2);
    assert!(demux.service(0x0005).is_none());
}

#[test]
fn test_cat() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    let payload = testing::descriptor(0x09, &hex_literal::hex!("00 05 E1 23"));
    feeder.feed(&mut demux, 0x0001, &testing::section(0x01, 0xFFFF, 0, 0, 0, &payload));
    assert_eq!(demux.handler().cats, 1);
    assert_eq!(demux.pid_class(Pid::new(0x0123)), PidClass::Emm);
    assert_eq!(demux.pid_context(Pid::new(0x0123)).unwrap().cas_id, Some(0x0005));
}

#[test]
fn test_reset() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100)]));
    assert!(demux.demux.table().has_pid(Pid::new(0x0100)));

    demux.reset();
    assert!(demux.ts_id().is_none());
    assert!(demux.last_pat().is_none());
    assert_eq!(demux.service_ids().count(), 0);
    assert_eq!(demux.pids().count(), 0);
    assert!(!demux.demux.table().has_pid(Pid::new(0x0100)));
    assert!(demux.demux.table().has_pid(Pid::PAT));
    assert!(demux.is_filtered_table_id(tid::STT));

    // 同じPATも改めて処理される
    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100)]));
    assert_eq!(demux.handler().pats, 2);
    assert_eq!(demux.ts_id(), Some(0x0010));
}

#[test]
fn test_pmt_filter_shared_pid() {
    let mut demux = SignalizationDemux::with_table_ids(Recorder::default(), &[tid::PAT, tid::PMT]);
    let mut feeder = Feeder::default();
    let has_pid = |demux: &SignalizationDemux<Recorder>, pid| demux.demux.table().has_pid(Pid::new(pid));

    // サービス1と2は同じPMTのPIDを使う
    feeder.feed(
        &mut demux,
        0x0000,
        &pat(0x0010, 0, &[(0x0001, 0x0100), (0x0002, 0x0100), (0x0003, 0x0300)]),
    );
    assert!(has_pid(&demux, 0x0100));
    assert!(has_pid(&demux, 0x0300));

    assert!(demux.add_filtered_service_id(0x0001));
    assert!(demux.remove_filtered_table_id(tid::PMT));
    assert!(has_pid(&demux, 0x0100));
    assert!(!has_pid(&demux, 0x0300));

    assert!(demux.remove_filtered_service_id(0x0001));
    assert!(!has_pid(&demux, 0x0100));
    assert!(has_pid(&demux, 0x0000));
}

#[test]
fn test_pmt_ca() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100)]));
    let payload = hex_literal::hex!(
        "
        E1 01 F0 06
        09 04 05 00 E1 50
        02 E1 01 F0 06
        09 04 06 00 E1 51
        "
    );
    feeder.feed(&mut demux, 0x0100, &testing::section(0x02, 0x0001, 0, 0, 0, &payload));
    assert_eq!(demux.handler().pmts, [(0x0001, Pid::new(0x0100))]);

    // サービス単位のECM
    let ctx = demux.pid_context(Pid::new(0x0150)).unwrap();
    assert_eq!(ctx.pid_class, PidClass::Ecm);
    assert_eq!(ctx.cas_id, Some(0x0500));
    assert!(demux.in_service(Pid::new(0x0150), 0x0001));

    // 構成要素単位のECM
    let ctx = demux.pid_context(Pid::new(0x0151)).unwrap();
    assert_eq!(ctx.pid_class, PidClass::Ecm);
    assert_eq!(ctx.cas_id, Some(0x0600));
    assert_eq!(demux.service_ids_of(Pid::new(0x0151)).collect::<Vec<_>>(), [0x0001]);

    assert_eq!(demux.pid_class(Pid::new(0x0101)), PidClass::Video);
    assert_eq!(demux.pid_context(Pid::new(0x0101)).unwrap().cas_id, None);
}

#[test]
fn test_pcr_only() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100)]));
    feeder.feed(&mut demux, 0x0100, &pmt(0x0001, 0, 0x0105, &[(0x02, 0x0101)]));
    assert_eq!(demux.pid_class(Pid::new(0x0105)), PidClass::PcrOnly);
    assert_eq!(demux.pid_class(Pid::new(0x0101)), PidClass::Video);

    // 構成要素になったPCRのPIDは分類し直す
    feeder.feed(
        &mut demux,
        0x0100,
        &pmt(0x0001, 1, 0x0105, &[(0x02, 0x0101), (0x0F, 0x0105)]),
    );
    assert_eq!(demux.pid_class(Pid::new(0x0105)), PidClass::Audio);
    assert!(demux.in_service(Pid::new(0x0105), 0x0001));

    // 映像と同じPCRのPIDは映像のまま
    feeder.feed(&mut demux, 0x0100, &pmt(0x0001, 2, 0x0101, &[(0x02, 0x0101)]));
    assert_eq!(demux.pid_class(Pid::new(0x0101)), PidClass::Video);
}

#[test]
fn test_mgt() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();
    assert_eq!(demux.pid_class(Pid::new(0x01D0)), PidClass::Undefined);

    let payload = hex_literal::hex!(
        "
        00 00 02
        00 00 FF FB E1 00 00 01 00 F0 00
        01 00 E1 D0 E3 00 00 02 00 F0 00
        F0 00
        "
    );
    feeder.feed(&mut demux, 0x1FFB, &testing::section(0xC7, 0x0000, 0, 0, 0, &payload));
    assert_eq!(demux.handler().mgts, 1);
    assert_eq!(demux.pid_class(Pid::new(0x01D0)), PidClass::Psi);
    assert_eq!(demux.pid_class(Pid::PSIP), PidClass::Psi);

    // フィルターされていなくても分類はする
    let mut demux = SignalizationDemux::with_table_ids(Recorder::default(), &[tid::STT]);
    let mut feeder = Feeder::default();
    feeder.feed(&mut demux, 0x1FFB, &testing::section(0xC7, 0x0000, 0, 0, 0, &payload));
    assert_eq!(demux.handler().mgts, 0);
    assert_eq!(demux.pid_class(Pid::new(0x01D0)), PidClass::Psi);
}

#[test]
fn test_sgt_lcn() {
    let mut demux = SignalizationDemux::new(Recorder::default());
    let mut feeder = Feeder::default();

    feeder.feed(&mut demux, 0x0000, &pat(0x0010, 0, &[(0x0001, 0x0100), (0x0002, 0x0200)]));
    // ストリーム形式種別0x05のPIDでSGTを集める
    feeder.feed(&mut demux, 0x0100, &pmt(0x0001, 0, 0x1FFF, &[(0x05, 0x0500)]));
    assert!(demux.demux.table().has_pid(Pid::new(0x0500)));
    demux.handler_mut().services.clear();

    let sgt = sgt(
        0x0001,
        &[
            (0x0001, 0x0010, 0x0001, 101, true),
            (0x0002, 0x0010, 0x0001, 102, false),
            (0x0001, 0x0011, 0x0001, 999, true),
        ],
    );
    feeder.feed(&mut demux, 0x0500, &sgt);
    assert_eq!(demux.service(0x0001).and_then(Service::lcn), Some(101));
    assert_eq!(demux.service(0x0001).and_then(Service::hidden), Some(false));
    assert_eq!(demux.service(0x0002).and_then(Service::lcn), Some(102));
    assert_eq!(demux.service(0x0002).and_then(Service::hidden), Some(true));

    let notified: Vec<u16> = demux
        .handler()
        .services
        .iter()
        .filter_map(|s| s.1.id())
        .collect();
    assert_eq!(notified, [0x0001, 0x0002]);
}
