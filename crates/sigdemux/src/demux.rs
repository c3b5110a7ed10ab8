//! MPEG2-TSのパケットからPSIセクションを分離するためのモジュール。

use arrayvec::ArrayVec;

use crate::packet::Packet;
use crate::pid::{Pid, PidTable};
use crate::psi::{PsiError, PsiSection};

/// PSIセクションとして分離するPIDを設定するテーブル。
#[derive(Clone)]
pub struct Table(PidTable<Option<PacketState>>);

impl Table {
    /// 何も設定されていない空のテーブルを生成する。
    #[inline]
    pub fn new() -> Table {
        Table(PidTable::from_fn(|_| None))
    }

    /// `pid`のパケットをPSIとして分離するよう設定されているかどうかを返す。
    #[inline]
    pub fn has_pid(&self, pid: Pid) -> bool {
        self.0[pid].is_some()
    }

    /// `pid`のパケットをPSIとして分離するよう設定する。
    ///
    /// 既に設定されている場合は何もせず、組み立て中のセクションも維持する。
    /// 新たに設定した場合は`true`を返す。
    pub fn add_pid(&mut self, pid: Pid) -> bool {
        if self.0[pid].is_some() {
            return false;
        }

        log::trace!("demux: add pid {:04X}", pid);
        self.0[pid] = Some(PacketState::new());
        true
    }

    /// `pid`のパケットを分離しないよう設定を解除する。
    ///
    /// 設定されていた場合は`true`を返す。
    pub fn remove_pid(&mut self, pid: Pid) -> bool {
        if self.0[pid].is_none() {
            return false;
        }

        log::trace!("demux: remove pid {:04X}", pid);
        self.0[pid] = None;
        true
    }

    /// 分離するよう設定されたPIDを昇順に返す。
    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.0
            .entries()
            .filter(|(_, state)| state.is_some())
            .map(|(pid, _)| pid)
    }

    /// 全ての設定を解除する。
    pub fn clear(&mut self) {
        for state in &mut self.0 {
            *state = None;
        }
    }
}

impl Default for Table {
    #[inline]
    fn default() -> Table {
        Table::new()
    }
}

/// パケットの分離における状況。
pub struct Context<'a> {
    packet: &'a Packet,
    table: &'a mut Table,
}

impl<'a> Context<'a> {
    /// 分離対象のパケットを返す。
    #[inline]
    pub fn packet(&self) -> &Packet {
        self.packet
    }

    /// 分離するPIDを設定するテーブルを返す。
    ///
    /// セクション処理中に設定を変更してもよい。
    #[inline]
    pub fn table(&mut self) -> &mut Table {
        self.table
    }
}

/// [`Demuxer`]に渡すフィルターで、PSIセクションを分離するたびに呼ばれる。
pub trait Filter {
    /// PSIセクションを分離した際に呼ばれる。
    fn on_psi_section(&mut self, ctx: &mut Context, psi: &PsiSection);
}

impl<T: Filter + ?Sized> Filter for &mut T {
    #[inline]
    fn on_psi_section(&mut self, ctx: &mut Context, psi: &PsiSection) {
        (**self).on_psi_section(ctx, psi)
    }
}

/// TSパケットからPSIセクションを分離する。
#[derive(Default)]
pub struct Demuxer {
    table: Table,
}

impl Demuxer {
    /// `Demuxer`を生成する。
    #[inline]
    pub fn new() -> Demuxer {
        Demuxer::default()
    }

    /// 分離するPIDを設定するテーブルを返す。
    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// 分離するPIDを設定するテーブルを可変参照で返す。
    #[inline]
    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }

    /// [`Packet`]を処理し、分離したPSIセクションを`filter`に渡す。
    pub fn feed<F: Filter + ?Sized>(&mut self, packet: &Packet, filter: &mut F) {
        if !packet.is_normal() {
            return;
        }

        let pid = packet.pid();
        let Some(state) = self.table.0[pid].as_mut() else {
            return;
        };

        let cc_ok = packet.validate_cc(&mut state.last_cc);

        // 所有権を切り離すためにパケット処理中はTempを設定
        let mut store = std::mem::replace(&mut state.store, PacketStore::Temp);

        let mut ctx = Context {
            packet,
            table: &mut self.table,
        };
        if let PacketStore::Psi(psi) = &mut store {
            match packet.payload() {
                Some(payload) if packet.unit_start_indicator() => {
                    let len = payload[0] as usize;
                    if let Some((prev, next)) = payload[1..].split_at_checked(len) {
                        if !prev.is_empty() && cc_ok {
                            psi.write(filter, &mut ctx, prev, false);
                        }
                        if !next.is_empty() && ctx.table.has_pid(pid) {
                            psi.write(filter, &mut ctx, next, true);
                        }
                    } else {
                        log::debug!("invalid pointer field: {:?}", pid);
                        psi.buffer.clear();
                    }
                }
                Some(payload) => {
                    if cc_ok {
                        psi.write(filter, &mut ctx, payload, false);
                    } else {
                        // 途中のパケットが欠落したセクションは捨てる
                        psi.buffer.clear();
                    }
                }
                None => {}
            }
        }

        // フィルター内でテーブルの設定がされていなければ値を戻す
        if let Some(
            state @ PacketState {
                store: PacketStore::Temp,
                ..
            },
        ) = &mut self.table.0[pid]
        {
            state.store = store;
        }
    }
}

#[derive(Clone)]
struct PacketState {
    last_cc: u8,
    store: PacketStore,
}

impl PacketState {
    #[inline]
    fn new() -> PacketState {
        PacketState {
            last_cc: 0x10,
            store: PacketStore::Psi(PartialPsiSection {
                buffer: Box::new(ArrayVec::new()),
            }),
        }
    }
}

#[derive(Clone)]
enum PacketStore {
    /// PSIセクション用。
    Psi(PartialPsiSection),
    /// パケット処理中に設定しておく一時的な値。
    Temp,
}

#[derive(Clone)]
struct PartialPsiSection {
    // 最大のセクション長（4096バイト）に複数セクション分の余裕を持たせる
    buffer: Box<ArrayVec<u8, { 2 * 4096 }>>,
}

impl PartialPsiSection {
    fn write<F: Filter + ?Sized>(
        &mut self,
        filter: &mut F,
        ctx: &mut Context,
        data: &[u8],
        is_start: bool,
    ) {
        if is_start {
            self.buffer.clear();
        }

        // バッファに収まる形でdataを追記
        let len = std::cmp::min(self.buffer.remaining_capacity(), data.len());
        let _result = self.buffer.try_extend_from_slice(&data[..len]);
        debug_assert!(_result.is_ok());

        let mut buf = self.buffer.as_slice();
        loop {
            let psi_len = match PsiSection::parse(buf) {
                Err(PsiError::InsufficientLength) => break,
                Err(PsiError::EndOfPsi) => {
                    // 残りはスタッフィング
                    buf = &[];
                    break;
                }
                Err(PsiError::Corrupted(psi_len)) => {
                    log::debug!("psi section corrupted: {:?}", ctx.packet.pid());
                    psi_len
                }
                Err(PsiError::Crc32(psi_len)) => {
                    log::debug!("psi section crc32 error: {:?}", ctx.packet.pid());
                    psi_len
                }
                Ok((psi, psi_len)) => {
                    filter.on_psi_section(ctx, &psi);
                    if !ctx.table.has_pid(ctx.packet.pid()) {
                        // フィルター内でPIDの分離が解除された
                        self.buffer.clear();
                        return;
                    }
                    psi_len
                }
            };

            // 読み込んだPSIセクションの分バッファを進める
            buf = &buf[psi_len..];
        }

        if buf.len() < self.buffer.len() {
            // 処理した部分を捨てる
            let remaining = buf.len();
            let offset = self.buffer.len() - remaining;
            self.buffer.copy_within(offset.., 0);
            self.buffer.truncate(remaining);
        }
    }
}
