//! サービスの属性を保持する型。

use std::fmt;

use crate::pid::Pid;
use crate::psi::table::RunningStatus;
use crate::utils;

/// `Copy`な属性の取得・設定・消去を行うメソッドを生成する。
macro_rules! service_property {
    ($name:ident, $has:ident, $set:ident, $clear:ident: $ty:ty, $label:literal) => {
        #[doc = concat!($label, "を返す。")]
        #[inline]
        pub fn $name(&self) -> Option<$ty> {
            self.$name
        }

        #[doc = concat!($label, "があるかどうかを返す。")]
        #[inline]
        pub fn $has(&self) -> bool {
            self.$name.is_some()
        }

        #[doc = concat!($label, "を設定する。値が変わった場合は変更済みとなる。")]
        #[inline]
        pub fn $set(&mut self, value: $ty) {
            if self.$name != Some(value) {
                self.$name = Some(value);
                self.modified = true;
            }
        }

        #[doc = concat!($label, "を消去する。値があった場合は変更済みとなる。")]
        #[inline]
        pub fn $clear(&mut self) {
            if self.$name.take().is_some() {
                self.modified = true;
            }
        }
    };
}

/// 文字列の属性の取得・設定・消去を行うメソッドを生成する。
macro_rules! service_string_property {
    ($name:ident, $has:ident, $set:ident, $clear:ident, $label:literal) => {
        #[doc = concat!($label, "を返す。")]
        #[inline]
        pub fn $name(&self) -> Option<&str> {
            self.$name.as_deref()
        }

        #[doc = concat!($label, "があるかどうかを返す。")]
        #[inline]
        pub fn $has(&self) -> bool {
            self.$name.is_some()
        }

        #[doc = concat!($label, "を設定する。値が変わった場合は変更済みとなる。")]
        pub fn $set<S: Into<String> + AsRef<str>>(&mut self, value: S) {
            if self.$name.as_deref() != Some(value.as_ref()) {
                self.$name = Some(value.into());
                self.modified = true;
            }
        }

        #[doc = concat!($label, "を消去する。値があった場合は変更済みとなる。")]
        #[inline]
        pub fn $clear(&mut self) {
            if self.$name.take().is_some() {
                self.modified = true;
            }
        }
    };
}

/// サービスの属性。
///
/// 各属性は独立して有無を持つ。
/// 異なる値を設定すると変更済みとなり、同じ値の設定では何も起きない。
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Service {
    id: Option<u16>,
    ts_id: Option<u16>,
    onid: Option<u16>,
    lcn: Option<u16>,
    pmt_pid: Option<Pid>,
    type_dvb: Option<u8>,
    type_atsc: Option<u8>,
    running_status: Option<RunningStatus>,
    eits_present: Option<bool>,
    eitpf_present: Option<bool>,
    ca_controlled: Option<bool>,
    major_id_atsc: Option<u16>,
    minor_id_atsc: Option<u16>,
    hidden: Option<bool>,
    name: Option<String>,
    provider: Option<String>,
    modified: bool,
}

impl Service {
    /// サービス識別だけを持つ`Service`を生成する。
    #[inline]
    pub fn new(id: u16) -> Service {
        Service {
            id: Some(id),
            ..Service::default()
        }
    }

    service_property!(id, has_id, set_id, clear_id: u16, "サービス識別");
    service_property!(ts_id, has_ts_id, set_ts_id, clear_ts_id: u16, "トランスポートストリーム識別");
    service_property!(onid, has_onid, set_onid, clear_onid: u16, "オリジナルネットワーク識別");
    service_property!(lcn, has_lcn, set_lcn, clear_lcn: u16, "論理チャンネル番号");
    service_property!(pmt_pid, has_pmt_pid, set_pmt_pid, clear_pmt_pid: Pid, "PMTのPID");
    service_property!(type_dvb, has_type_dvb, set_type_dvb, clear_type_dvb: u8, "DVBのサービス形式種別");
    service_property!(type_atsc, has_type_atsc, set_type_atsc, clear_type_atsc: u8, "ATSCのサービス種別");
    service_property!(
        running_status,
        has_running_status,
        set_running_status,
        clear_running_status: RunningStatus,
        "進行状態"
    );
    service_property!(
        eits_present,
        has_eits_present,
        set_eits_present,
        clear_eits_present: bool,
        "EIT［スケジュール］が存在するかどうか"
    );
    service_property!(
        eitpf_present,
        has_eitpf_present,
        set_eitpf_present,
        clear_eitpf_present: bool,
        "EIT［現在／次］が存在するかどうか"
    );
    service_property!(
        ca_controlled,
        has_ca_controlled,
        set_ca_controlled,
        clear_ca_controlled: bool,
        "限定受信されるかどうか"
    );
    service_property!(
        major_id_atsc,
        has_major_id_atsc,
        set_major_id_atsc,
        clear_major_id_atsc: u16,
        "ATSCのメジャーチャンネル番号"
    );
    service_property!(
        minor_id_atsc,
        has_minor_id_atsc,
        set_minor_id_atsc,
        clear_minor_id_atsc: u16,
        "ATSCのマイナーチャンネル番号"
    );
    service_property!(hidden, has_hidden, set_hidden, clear_hidden: bool, "隠しサービスかどうか");
    service_string_property!(name, has_name, set_name, clear_name, "サービス名");
    service_string_property!(provider, has_provider, set_provider, clear_provider, "事業者名");

    /// 前回の[`clear_modified`][Service::clear_modified]以降に属性が変わったかどうかを返す。
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// 変更済みの状態を解除する。
    #[inline]
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// すべての属性を消去する。
    pub fn clear(&mut self) {
        *self = Service {
            modified: true,
            ..Service::default()
        };
    }

    /// サービスが`ident`で示されるものかどうかを返す。
    ///
    /// `ident`は次のいずれかで解釈する。
    ///
    /// - 10進数または`0x`で始まる16進数の整数：サービス識別と比較する。
    /// - `メジャー.マイナー`：ATSCのチャンネル番号と比較する。
    /// - それ以外：大文字小文字と空白を無視してサービス名と比較する。
    pub fn matches(&self, ident: &str) -> bool {
        if let Some(id) = utils::parse_u16(ident) {
            return self.id == Some(id);
        }

        if let Some((major, minor)) = ident.split_once('.') {
            if let (Some(major), Some(minor)) = (utils::parse_u16(major), utils::parse_u16(minor)) {
                return self.major_id_atsc == Some(major) && self.minor_id_atsc == Some(minor);
            }
        }

        self.name.as_deref().map_or(false, |name| utils::similar(name, ident))
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn field<T: fmt::Debug>(s: &mut fmt::DebugStruct, name: &str, value: &Option<T>) {
            if let Some(v) = value {
                s.field(name, v);
            }
        }

        let mut s = f.debug_struct("Service");
        field(&mut s, "id", &self.id);
        field(&mut s, "ts_id", &self.ts_id);
        field(&mut s, "onid", &self.onid);
        field(&mut s, "lcn", &self.lcn);
        field(&mut s, "pmt_pid", &self.pmt_pid);
        field(&mut s, "type_dvb", &self.type_dvb);
        field(&mut s, "type_atsc", &self.type_atsc);
        field(&mut s, "running_status", &self.running_status);
        field(&mut s, "eits_present", &self.eits_present);
        field(&mut s, "eitpf_present", &self.eitpf_present);
        field(&mut s, "ca_controlled", &self.ca_controlled);
        field(&mut s, "major_id_atsc", &self.major_id_atsc);
        field(&mut s, "minor_id_atsc", &self.minor_id_atsc);
        field(&mut s, "hidden", &self.hidden);
        field(&mut s, "name", &self.name);
        field(&mut s, "provider", &self.provider);
        s.field("modified", &self.modified);
        s.finish()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "0x{:04X} ({})", id, id)?,
            None => f.write_str("unknown")?,
        }
        if let (Some(major), Some(minor)) = (self.major_id_atsc, self.minor_id_atsc) {
            write!(f, ", {}.{}", major, minor)?;
        }
        if let Some(name) = &self.name {
            write!(f, ", \"{}\"", name)?;
        }
        Ok(())
    }
}
