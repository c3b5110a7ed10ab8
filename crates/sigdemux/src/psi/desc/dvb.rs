//! ETSI EN 300 468で規定される記述子の定義。

use crate::utils::BytesExt;

use super::base::Descriptor;

/// 私的データ指定子（ETSI TS 101 162）。
pub mod pds {
    /// EACEM・EICTA。
    pub const EACEM: u32 = 0x0000_0028;
    /// NorDig。
    pub const NORDIG: u32 = 0x0000_0029;
    /// BSkyB。
    pub const BSKYB: u32 = 0x0000_0002;
    /// Eutelsat。
    pub const EUTELSAT: u32 = 0x0000_055F;
    /// Ofcom（英国DTG）。
    pub const OFCOM: u32 = 0x0000_233A;
}

/// 私的データ指定子記述子。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateDataSpecifierDescriptor {
    /// 私的データ指定子。
    pub private_data_specifier: u32,
}

impl Descriptor<'_> for PrivateDataSpecifierDescriptor {
    const TAG: u8 = super::tag::PRIVATE_DATA_SPECIFIER;

    fn read(data: &[u8]) -> Option<PrivateDataSpecifierDescriptor> {
        if data.len() != 4 {
            log::debug!("invalid PrivateDataSpecifierDescriptor");
            return None;
        }

        Some(PrivateDataSpecifierDescriptor {
            private_data_specifier: data.read_be_32(),
        })
    }
}

/// サービス記述子。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// サービス形式種別。
    pub service_type: u8,
    /// 事業者名。
    pub provider_name: String,
    /// サービス名。
    pub service_name: String,
}

impl Descriptor<'_> for ServiceDescriptor {
    const TAG: u8 = super::tag::SERVICE;

    fn read(data: &[u8]) -> Option<ServiceDescriptor> {
        let [service_type, provider_name_length, ref rem @ ..] = *data else {
            log::debug!("invalid ServiceDescriptor");
            return None;
        };
        let Some((provider_name, rem)) = rem.split_at_checked(provider_name_length as usize)
        else {
            log::debug!("invalid ServiceDescriptor::provider_name");
            return None;
        };
        let Some((&service_name_length, rem)) = rem.split_first() else {
            log::debug!("invalid ServiceDescriptor::service_name_length");
            return None;
        };
        let Some(service_name) = rem.get(..service_name_length as usize) else {
            log::debug!("invalid ServiceDescriptor::service_name");
            return None;
        };

        Some(ServiceDescriptor {
            service_type,
            provider_name: crate::text::decode_dvb(provider_name),
            service_name: crate::text::decode_dvb(service_name),
        })
    }
}
