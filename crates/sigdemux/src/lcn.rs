//! 論理チャンネル番号の収集とサービスへの反映。

use std::ops;

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::psi::desc::{DescriptorList, LogicalChannelDescriptor};
use crate::psi::table::{Bat, Nit, Sgt, TransportStream};
use crate::service::Service;

/// [`LogicalChannelNumbers::update_services`]でサービスに反映する方法。
///
/// ビットの組み合わせで指定する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Replacement(u8);

impl Replacement {
    /// どのサービスにも一致しない論理チャンネル番号を新しいサービスとして追加する。
    pub const ADD: Replacement = Replacement(0x01);
    /// 論理チャンネル番号を持たないサービスに設定する。
    pub const UPDATE: Replacement = Replacement(0x02);
    /// 論理チャンネル番号を持つサービスでも上書きする。
    pub const REPLACE: Replacement = Replacement(0x04);
    /// すべて。
    pub const ALL: Replacement = Replacement(0x07);

    /// `other`のビットをすべて含むかどうかを返す。
    #[inline]
    pub fn contains(self, other: Replacement) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for Replacement {
    type Output = Replacement;

    #[inline]
    fn bitor(self, rhs: Replacement) -> Replacement {
        Replacement(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for Replacement {
    #[inline]
    fn bitor_assign(&mut self, rhs: Replacement) {
        self.0 |= rhs.0;
    }
}

/// [`LogicalChannelNumbers::update_services`]の対象となるサービスの集まり。
pub trait ServiceContainer {
    /// すべてのサービスに対して`f`を呼び出す。
    fn for_each_service(&mut self, f: &mut dyn FnMut(&mut Service));

    /// サービスを追加する。
    fn push_service(&mut self, service: Service);
}

impl ServiceContainer for Vec<Service> {
    fn for_each_service(&mut self, f: &mut dyn FnMut(&mut Service)) {
        self.iter_mut().for_each(f);
    }

    #[inline]
    fn push_service(&mut self, service: Service) {
        self.push(service);
    }
}

impl<T: ServiceContainer + ?Sized> ServiceContainer for &mut T {
    #[inline]
    fn for_each_service(&mut self, f: &mut dyn FnMut(&mut Service)) {
        (**self).for_each_service(f)
    }

    #[inline]
    fn push_service(&mut self, service: Service) {
        (**self).push_service(service)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LcnValue {
    lcn: u16,
    ts_id: u16,
    // `None`は不明
    onid: Option<u16>,
    visible: bool,
}

impl LcnValue {
    #[inline]
    fn matches(&self, ts_id: u16, onid: Option<u16>) -> bool {
        self.ts_id == ts_id && (onid.is_none() || self.onid.is_none() || self.onid == onid)
    }
}

/// 記述子から集めた論理チャンネル番号。
///
/// 同じサービス識別が別のトランスポートストリームにも存在しうるため、
/// サービス識別ごとに複数の値を持つ。
#[derive(Debug, Default, Clone)]
pub struct LogicalChannelNumbers {
    lcns: FxHashMap<u16, SmallVec<[LcnValue; 1]>>,
    default_pds: u32,
}

impl LogicalChannelNumbers {
    /// 空の`LogicalChannelNumbers`を生成する。
    #[inline]
    pub fn new() -> LogicalChannelNumbers {
        LogicalChannelNumbers::default()
    }

    /// 私的データ指定子記述子が現れる前の記述子に適用する私的データ指定子を設定する。
    ///
    /// 既定値は0で、この場合タグ0x83の記述子はEACEMのものとみなされる。
    #[inline]
    pub fn set_default_pds(&mut self, pds: u32) {
        self.default_pds = pds;
    }

    /// 収集した論理チャンネル番号をすべて消去する。
    #[inline]
    pub fn clear(&mut self) {
        self.lcns.clear();
    }

    /// 収集した論理チャンネル番号が無いかどうかを返す。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lcns.is_empty()
    }

    /// 収集した論理チャンネル番号の数を返す。
    pub fn len(&self) -> usize {
        self.lcns.values().map(SmallVec::len).sum()
    }

    /// 論理チャンネル番号を一つ追加する。
    ///
    /// サービス識別・トランスポートストリーム識別・オリジナルネットワーク識別が同じ値は上書きする。
    pub fn add_lcn(
        &mut self,
        lcn: u16,
        service_id: u16,
        ts_id: u16,
        onid: Option<u16>,
        visible: bool,
    ) {
        let values = self.lcns.entry(service_id).or_default();
        let value = LcnValue {
            lcn,
            ts_id,
            onid,
            visible,
        };
        match values
            .iter_mut()
            .find(|v| v.ts_id == ts_id && v.onid == onid)
        {
            Some(v) => *v = value,
            None => values.push(value),
        }
    }

    /// 記述子群に含まれる論理チャンネル番号記述子から論理チャンネル番号を集め、その数を返す。
    ///
    /// 記述子が自身でトランスポートストリームを指定しない場合は`ts_id`と`onid`のものとみなす。
    pub fn add_from_descriptors(
        &mut self,
        descriptors: &DescriptorList,
        ts_id: u16,
        onid: Option<u16>,
    ) -> usize {
        let mut count = 0;
        for (pds, desc) in descriptors.iter_with_pds(self.default_pds) {
            let Some(lcd) = LogicalChannelDescriptor::new(pds, &desc) else {
                continue;
            };
            for entry in lcd.entries() {
                self.add_lcn(
                    entry.lcn,
                    entry.service_id,
                    entry.transport_stream_id.unwrap_or(ts_id),
                    entry.original_network_id.or(onid),
                    entry.visible,
                );
                count += 1;
            }
        }
        count
    }

    fn add_from_transports(
        &mut self,
        transports: &[TransportStream],
        ts_id: Option<u16>,
        onid: Option<u16>,
    ) -> usize {
        transports
            .iter()
            .filter(|ts| ts_id.map_or(true, |id| id == ts.transport_stream_id))
            .filter(|ts| onid.map_or(true, |id| id == ts.original_network_id))
            .map(|ts| {
                self.add_from_descriptors(
                    &ts.descriptors,
                    ts.transport_stream_id,
                    Some(ts.original_network_id),
                )
            })
            .sum()
    }

    /// NITから論理チャンネル番号を集め、その数を返す。
    ///
    /// `ts_id`や`onid`が`Some`の場合、一致するトランスポートストリームのものだけを集める。
    #[inline]
    pub fn add_from_nit(&mut self, nit: &Nit, ts_id: Option<u16>, onid: Option<u16>) -> usize {
        self.add_from_transports(&nit.transports, ts_id, onid)
    }

    /// BATから論理チャンネル番号を集め、その数を返す。
    ///
    /// `ts_id`や`onid`が`Some`の場合、一致するトランスポートストリームのものだけを集める。
    #[inline]
    pub fn add_from_bat(&mut self, bat: &Bat, ts_id: Option<u16>, onid: Option<u16>) -> usize {
        self.add_from_transports(&bat.transports, ts_id, onid)
    }

    /// SGTから論理チャンネル番号を集め、その数を返す。
    ///
    /// `ts_id`や`onid`が`Some`の場合、一致するトランスポートストリームのサービスだけを集める。
    pub fn add_from_sgt(&mut self, sgt: &Sgt, ts_id: Option<u16>, onid: Option<u16>) -> usize {
        let mut count = 0;
        for s in &sgt.services {
            if ts_id.is_some_and(|id| id != s.transport_stream_id)
                || onid.is_some_and(|id| id != s.original_network_id)
            {
                continue;
            }
            self.add_lcn(
                s.logical_channel_number,
                s.service_id,
                s.transport_stream_id,
                Some(s.original_network_id),
                s.visible_service_flag,
            );
            count += 1;
        }
        count
    }

    fn find(&self, service_id: u16, ts_id: u16, onid: Option<u16>) -> Option<&LcnValue> {
        self.lcns
            .get(&service_id)?
            .iter()
            .find(|v| v.matches(ts_id, onid))
    }

    /// サービスの論理チャンネル番号を返す。
    ///
    /// `onid`が`None`の場合はオリジナルネットワーク識別を問わない。
    #[inline]
    pub fn lcn(&self, service_id: u16, ts_id: u16, onid: Option<u16>) -> Option<u16> {
        self.find(service_id, ts_id, onid).map(|v| v.lcn)
    }

    /// サービスが表示可能かどうかを返す。
    ///
    /// `onid`が`None`の場合はオリジナルネットワーク識別を問わない。
    #[inline]
    pub fn visible(&self, service_id: u16, ts_id: u16, onid: Option<u16>) -> Option<bool> {
        self.find(service_id, ts_id, onid).map(|v| v.visible)
    }

    /// 収集した論理チャンネル番号を`services`に反映する。
    ///
    /// サービス識別とトランスポートストリーム識別が一致し、
    /// 双方がオリジナルネットワーク識別を持つ場合はそれも一致するサービスに論理チャンネル番号を設定する。
    /// どのサービスにも一致しない論理チャンネル番号は、
    /// [`Replacement::ADD`]が指定された場合に新しいサービスとして追加する。
    pub fn update_services<C: ServiceContainer + ?Sized>(
        &self,
        services: &mut C,
        replacement: Replacement,
    ) {
        let update = replacement.contains(Replacement::UPDATE);
        let replace = replacement.contains(Replacement::REPLACE);

        for (&service_id, values) in &self.lcns {
            for value in values {
                let mut found = false;
                services.for_each_service(&mut |srv| {
                    if srv.id() != Some(service_id) || srv.ts_id() != Some(value.ts_id) {
                        return;
                    }
                    if let (Some(a), Some(b)) = (srv.onid(), value.onid) {
                        if a != b {
                            return;
                        }
                    }

                    found = true;
                    if (update && !srv.has_lcn()) || replace {
                        srv.set_lcn(value.lcn);
                        srv.set_hidden(!value.visible);
                    }
                });

                if !found && replacement.contains(Replacement::ADD) {
                    let mut srv = Service::new(service_id);
                    srv.set_ts_id(value.ts_id);
                    if let Some(onid) = value.onid {
                        srv.set_onid(onid);
                    }
                    srv.set_lcn(value.lcn);
                    srv.set_hidden(!value.visible);
                    services.push_service(srv);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::desc::pds;
    use crate::psi::table::SgtService;

    fn service(id: u16, ts_id: u16, lcn: Option<u16>) -> Service {
        let mut srv = Service::new(id);
        srv.set_ts_id(ts_id);
        if let Some(lcn) = lcn {
            srv.set_lcn(lcn);
        }
        srv.clear_modified();
        srv
    }

    #[test]
    fn test_add_and_lookup() {
        let mut lcns = LogicalChannelNumbers::new();
        assert!(lcns.is_empty());

        lcns.add_lcn(1, 0x0101, 0x0010, Some(0x0020), true);
        lcns.add_lcn(5, 0x0101, 0x0011, None, false);
        assert_eq!(lcns.len(), 2);

        assert_eq!(lcns.lcn(0x0101, 0x0010, None), Some(1));
        assert_eq!(lcns.lcn(0x0101, 0x0010, Some(0x0020)), Some(1));
        assert_eq!(lcns.lcn(0x0101, 0x0010, Some(0x0021)), None);
        assert_eq!(lcns.lcn(0x0101, 0x0011, Some(0x0021)), Some(5));
        assert_eq!(lcns.visible(0x0101, 0x0011, None), Some(false));
        assert_eq!(lcns.lcn(0x0102, 0x0010, None), None);

        // 同じ組は上書き
        lcns.add_lcn(2, 0x0101, 0x0010, Some(0x0020), true);
        assert_eq!(lcns.len(), 2);
        assert_eq!(lcns.lcn(0x0101, 0x0010, None), Some(2));

        lcns.clear();
        assert!(lcns.is_empty());
        assert_eq!(lcns.len(), 0);
    }

    #[test]
    fn test_add_from_descriptors() {
        let mut descriptors = DescriptorList::new();
        descriptors.push(0x83, &[0x00, 0x01, 0xFC, 0x01, 0x00, 0x02, 0x7C, 0x02]);
        descriptors.push(0x5F, &pds::NORDIG.to_be_bytes());
        descriptors.push(0x87, &[0x01, 0x00, 0x41, 0x42, 0x43, 0x04, 0x00, 0x03, 0x80, 0x03]);
        descriptors.push(0x48, &[0x01, 0x00, 0x00]);

        let mut lcns = LogicalChannelNumbers::new();
        assert_eq!(lcns.add_from_descriptors(&descriptors, 0x0010, Some(0x0020)), 3);
        assert_eq!(lcns.lcn(0x0001, 0x0010, None), Some(1));
        assert_eq!(lcns.visible(0x0002, 0x0010, None), Some(false));
        assert_eq!(lcns.lcn(0x0003, 0x0010, Some(0x0020)), Some(3));
    }

    #[test]
    fn test_add_from_nit() {
        let mut first = DescriptorList::new();
        first.push(0x83, &[0x00, 0x01, 0xFC, 0x0A]);
        let mut second = DescriptorList::new();
        second.push(0x83, &[0x00, 0x01, 0xFC, 0x14]);

        let nit = Nit {
            is_actual: true,
            network_id: 0x0020,
            version: 0,
            descriptors: DescriptorList::new(),
            transports: vec![
                TransportStream {
                    transport_stream_id: 0x0010,
                    original_network_id: 0x0020,
                    descriptors: first,
                },
                TransportStream {
                    transport_stream_id: 0x0011,
                    original_network_id: 0x0020,
                    descriptors: second,
                },
            ],
        };

        let mut lcns = LogicalChannelNumbers::new();
        assert_eq!(lcns.add_from_nit(&nit, Some(0x0011), None), 1);
        assert_eq!(lcns.lcn(0x0001, 0x0010, None), None);
        assert_eq!(lcns.lcn(0x0001, 0x0011, None), Some(20));

        lcns.clear();
        assert_eq!(lcns.add_from_nit(&nit, None, Some(0x0020)), 2);
        assert_eq!(lcns.lcn(0x0001, 0x0010, None), Some(10));

        let bat = Bat {
            bouquet_id: 1,
            descriptors: DescriptorList::new(),
            transports: nit.transports.clone(),
        };
        lcns.clear();
        assert_eq!(lcns.add_from_bat(&bat, None, Some(0x0021)), 0);
    }

    #[test]
    fn test_add_from_sgt() {
        let sgt_service = |service_id, ts_id, lcn, visible| SgtService {
            service_id,
            transport_stream_id: ts_id,
            original_network_id: 0x0001,
            logical_channel_number: lcn,
            visible_service_flag: visible,
            new_service_flag: false,
            genre_code: 0,
            descriptors: DescriptorList::new(),
        };
        let sgt = Sgt {
            service_list_id: 1,
            version: 0,
            descriptors: DescriptorList::new(),
            services: vec![
                sgt_service(0x0001, 0x0401, 101, true),
                sgt_service(0x0002, 0x0401, 102, false),
                sgt_service(0x0001, 0x0402, 201, true),
            ],
        };

        let mut lcns = LogicalChannelNumbers::new();
        assert_eq!(lcns.add_from_sgt(&sgt, Some(0x0401), None), 2);
        assert_eq!(lcns.lcn(0x0001, 0x0401, Some(0x0001)), Some(101));
        assert_eq!(lcns.visible(0x0002, 0x0401, None), Some(false));
        assert_eq!(lcns.lcn(0x0001, 0x0402, None), None);

        lcns.clear();
        assert_eq!(lcns.add_from_sgt(&sgt, None, None), 3);
        assert_eq!(lcns.add_from_sgt(&sgt, None, Some(0x0002)), 0);
    }

    #[test]
    fn test_update_services() {
        let mut lcns = LogicalChannelNumbers::new();
        lcns.add_lcn(7, 0x0001, 0x0010, None, true);
        lcns.add_lcn(8, 0x0002, 0x0010, None, false);
        lcns.add_lcn(9, 0x0003, 0x0010, None, true);

        let mut services = vec![service(0x0001, 0x0010, Some(1)), service(0x0002, 0x0010, None)];
        lcns.update_services(&mut services, Replacement::UPDATE);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].lcn(), Some(1));
        assert!(!services[0].is_modified());
        assert_eq!(services[1].lcn(), Some(8));
        assert_eq!(services[1].hidden(), Some(true));
        assert!(services[1].is_modified());

        lcns.update_services(&mut services, Replacement::REPLACE);
        assert_eq!(services[0].lcn(), Some(7));
        assert_eq!(services[0].hidden(), Some(false));

        lcns.update_services(&mut services, Replacement::UPDATE | Replacement::ADD);
        assert_eq!(services.len(), 3);
        assert_eq!(services[2].id(), Some(0x0003));
        assert_eq!(services[2].ts_id(), Some(0x0010));
        assert_eq!(services[2].lcn(), Some(9));
    }

    #[test]
    fn test_update_services_onid() {
        let mut lcns = LogicalChannelNumbers::new();
        lcns.add_lcn(7, 0x0001, 0x0010, Some(0x0020), true);

        let mut other = service(0x0001, 0x0010, None);
        other.set_onid(0x0021);
        let mut services = vec![other, service(0x0001, 0x0011, None)];
        lcns.update_services(&mut services, Replacement::ALL);
        assert_eq!(services.len(), 3);
        assert_eq!(services[0].lcn(), None);
        assert_eq!(services[1].lcn(), None);
        assert_eq!(services[2].onid(), Some(0x0020));

        let mut services = vec![service(0x0001, 0x0010, None)];
        lcns.update_services(&mut services, Replacement::UPDATE);
        assert_eq!(services[0].lcn(), Some(7));
    }
}
