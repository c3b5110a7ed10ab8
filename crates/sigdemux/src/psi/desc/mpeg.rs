//! ISO/IEC 13818-1で規定される記述子の定義。

use crate::pid::Pid;
use crate::utils::BytesExt;

use super::base::Descriptor;

/// 登録記述子。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationDescriptor<'a> {
    /// 形式識別子。
    pub format_identifier: u32,
    /// 追加の識別情報。
    pub additional_identification_info: &'a [u8],
}

impl<'a> RegistrationDescriptor<'a> {
    /// AC-3（ATSC A/52）。
    pub const AC3: u32 = u32::from_be_bytes(*b"AC-3");
    /// 拡張AC-3（ATSC A/52）。
    pub const EAC3: u32 = u32::from_be_bytes(*b"EAC3");
    /// HEVC。
    pub const HEVC: u32 = u32::from_be_bytes(*b"HEVC");
    /// SCTEの字幕。
    pub const SCTE_SUBTITLE: u32 = u32::from_be_bytes(*b"SCTE");
}

impl<'a> Descriptor<'a> for RegistrationDescriptor<'a> {
    const TAG: u8 = super::tag::REGISTRATION;

    fn read(data: &'a [u8]) -> Option<RegistrationDescriptor<'a>> {
        if data.len() < 4 {
            log::debug!("invalid RegistrationDescriptor");
            return None;
        }

        Some(RegistrationDescriptor {
            format_identifier: data[0..=3].read_be_32(),
            additional_identification_info: &data[4..],
        })
    }
}

/// 限定受信記述子。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalAccessDescriptor<'a> {
    /// 限定受信方式識別。
    pub ca_system_id: u16,
    /// ECMまたはEMMを運ぶPID。
    pub ca_pid: Pid,
    /// プライベートデータ。
    pub private_data: &'a [u8],
}

impl<'a> Descriptor<'a> for ConditionalAccessDescriptor<'a> {
    const TAG: u8 = super::tag::CA;

    fn read(data: &'a [u8]) -> Option<ConditionalAccessDescriptor<'a>> {
        if data.len() < 4 {
            log::debug!("invalid ConditionalAccessDescriptor");
            return None;
        }

        let ca_system_id = data[0..=1].read_be_16();
        let ca_pid = Pid::read(&data[2..=3]);
        let private_data = &data[4..];

        Some(ConditionalAccessDescriptor {
            ca_system_id,
            ca_pid,
            private_data,
        })
    }
}
