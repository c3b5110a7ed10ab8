//! テスト用にセクションやパケットを組み立てる関数群。

use crate::packet::{Packet, PACKET_SIZE, SYNC_BYTE};
use crate::pid::Pid;
use crate::psi::{CompleteTable, PsiSection, Repository};

/// 長形式セクションを組み立てる。
pub fn section(
    table_id: u8,
    table_id_extension: u16,
    version: u8,
    section_number: u8,
    last_section_number: u8,
    payload: &[u8],
) -> Vec<u8> {
    let len = 5 + payload.len() + 4;
    let mut buf = vec![
        table_id,
        0xB0 | (len >> 8) as u8,
        len as u8,
        (table_id_extension >> 8) as u8,
        table_id_extension as u8,
        0xC1 | (version & 0x1F) << 1,
        section_number,
        last_section_number,
    ];
    buf.extend_from_slice(payload);
    let crc = crate::crc::calc32(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

/// `sections`を順に`pid`のセクションとして蓄積し、揃ったテーブルを返す。
pub fn complete_table(pid: Pid, sections: &[Vec<u8>]) -> CompleteTable {
    let mut repo = Repository::new();
    let mut result = None;
    for section in sections {
        let psi = PsiSection::parse(section).unwrap().0;
        result = repo.push(pid, &psi);
    }
    result.unwrap()
}

/// CRCを持たない短形式セクションを組み立てる。
pub fn short_section(table_id: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut buf = vec![table_id, 0x70 | (len >> 8) as u8, len as u8];
    buf.extend_from_slice(payload);
    buf
}

/// CRCを末尾に持つ短形式セクションを組み立てる。
pub fn short_section_with_crc(table_id: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() + 4;
    let mut buf = vec![table_id, 0x70 | (len >> 8) as u8, len as u8];
    buf.extend_from_slice(payload);
    let crc = crate::crc::calc32(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

/// 記述子を組み立てる。
pub fn descriptor(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut buf = vec![tag, body.len() as u8];
    buf.extend_from_slice(body);
    buf
}

/// 12ビット長の付いた記述子ループを組み立てる。
pub fn descriptor_loop(descriptors: &[Vec<u8>]) -> Vec<u8> {
    let body = descriptors.concat();
    let mut buf = vec![0xF0 | (body.len() >> 8) as u8, body.len() as u8];
    buf.extend_from_slice(&body);
    buf
}

/// セクションをTSパケットに分割する。
///
/// `cc`は次に使う連続性指標で、パケットごとに更新される。
pub fn packetize(pid: Pid, section: &[u8], cc: &mut u8) -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut data = section;
    let mut first = true;
    while first || !data.is_empty() {
        let mut packet = Packet([0xFF; PACKET_SIZE]);
        let [hi, lo] = pid.get().to_be_bytes();
        packet.0[0] = SYNC_BYTE;
        packet.0[1] = (if first { 0x40 } else { 0x00 }) | hi;
        packet.0[2] = lo;
        packet.0[3] = 0x10 | (*cc & 0x0F);
        *cc = (*cc + 1) & 0x0F;

        let mut offset = 4;
        if first {
            packet.0[offset] = 0;
            offset += 1;
        }
        let len = std::cmp::min(PACKET_SIZE - offset, data.len());
        packet.0[offset..offset + len].copy_from_slice(&data[..len]);
        data = &data[len..];

        packets.push(packet);
        first = false;
    }
    packets
}
