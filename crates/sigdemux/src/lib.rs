//! MPEG2-TSのシグナリング情報（PSI/SI・PSIP）を分離し、PIDとサービスの状態を保持するためのクレート。

#![deny(missing_docs)]

pub mod crc;
pub mod demux;
pub mod lcn;
pub mod packet;
pub mod pid;
pub mod psi;
pub mod service;
pub mod signalization;
pub mod stream;
pub mod text;
pub mod time;
mod utils;

#[cfg(test)]
mod testing;

pub use lcn::{LogicalChannelNumbers, Replacement, ServiceContainer};
pub use packet::Packet;
pub use pid::Pid;
pub use service::Service;
pub use signalization::{SignalizationDemux, SignalizationHandler};
