//! PID関連。

use std::fmt;
use std::ops;

use crate::utils::BytesExt;

/// MPEG2-TSのPID（13ビット）。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u16);

// 定数はISO/IEC 13818-1、ETSI EN 300 468、ATSC A/65による。
impl Pid {
    /// PIDの最大値。
    pub const MAX: u16 = 0x1FFF;

    /// プログラムアソシエーションテーブル（Program Association Table）。
    pub const PAT: Pid = Pid::new(0x0000);
    /// 限定受信テーブル（Conditional Access Table）。
    pub const CAT: Pid = Pid::new(0x0001);
    /// トランスポートストリーム記述テーブル（Transport Stream Description Table）。
    pub const TSDT: Pid = Pid::new(0x0002);

    /// ネットワーク情報テーブル（Network Information Table）の既定のPID。
    pub const NIT: Pid = Pid::new(0x0010);
    /// サービス記述テーブル（Service Description Table）。
    pub const SDT: Pid = Pid::new(0x0011);
    /// ブーケアソシエーションテーブル（Bouquet Association Table）。
    pub const BAT: Pid = Pid::new(0x0011);
    /// イベント情報テーブル（Event Information Table）。
    pub const EIT: Pid = Pid::new(0x0012);
    /// 進行状態テーブル（Running Status Table）。
    pub const RST: Pid = Pid::new(0x0013);
    /// 時刻日付テーブル（Time and Date Table）。
    pub const TDT: Pid = Pid::new(0x0014);
    /// 時刻日付オフセットテーブル（Time Offset Table）。
    pub const TOT: Pid = Pid::new(0x0014);
    /// 衛星アクセステーブル（Satellite Access Table）。
    pub const SAT: Pid = Pid::new(0x001B);

    /// ISDBで予約されたPIDの最終値。
    pub const ISDB_LAST: Pid = Pid::new(0x002F);
    /// ATSCで予約されたPIDの先頭値。
    pub const ATSC_FIRST: Pid = Pid::new(0x1FF0);
    /// ATSCのPSIPベースPID（MGT・VCT・RRT・STTなど）。
    pub const PSIP: Pid = Pid::new(0x1FFB);

    /// ヌルパケット（Null packet）。
    pub const NULL: Pid = Pid::new(0x1FFF);

    /// `Pid`を生成する。
    ///
    /// # パニック
    ///
    /// `pid`の値が範囲外の際はパニックする。
    #[inline]
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= Pid::MAX);
        Pid(pid)
    }

    /// `pid`がPIDとして範囲内であれば`Pid`を生成する。
    #[inline]
    pub const fn try_new(pid: u16) -> Option<Pid> {
        if pid > Pid::MAX {
            None
        } else {
            Some(Pid(pid))
        }
    }

    /// `data`からPIDを読み出す。
    ///
    /// # パニック
    ///
    /// `data`の長さが2未満の場合、このメソッドはパニックする。
    #[inline]
    pub fn read(data: &[u8]) -> Pid {
        Pid(data[0..=1].read_be_16() & 0x1FFF)
    }

    /// PIDを`u16`で返す。
    #[inline]
    pub const fn get(&self) -> u16 {
        // Safety: `Pid`を生成できている時点で値は範囲内
        unsafe { crate::utils::assume!(self.0 <= Pid::MAX) }
        self.0
    }

    /// 規格上シグナリング用に予約されたPIDかどうかを返す。
    #[inline]
    pub const fn is_reserved_signalization(&self) -> bool {
        self.0 <= Pid::ISDB_LAST.0 || (self.0 >= Pid::ATSC_FIRST.0 && self.0 != Pid::NULL.0)
    }
}

impl Default for Pid {
    fn default() -> Self {
        Pid::NULL
    }
}

impl From<Pid> for u16 {
    fn from(value: Pid) -> Self {
        value.get()
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pid(0x{:04X})", self.0)
    }
}

crate::utils::delegate_fmt!(Pid);

/// [`Pid`]をキーにして値`V`にアクセスができるテーブル。
///
/// データはヒープに確保される。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PidTable<V>(Box<[V; Pid::MAX as usize + 1]>);

impl<V> PidTable<V> {
    /// `f`を呼び出した戻り値から`PidTable`を生成する。
    #[inline]
    pub fn from_fn<F: FnMut(Pid) -> V>(mut f: F) -> PidTable<V> {
        PidTable(crate::utils::boxed_array(|i| f(Pid(i as u16))))
    }

    /// テーブルを回すイテレーターを返す。
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<V> {
        self.0.iter()
    }

    /// テーブルを可変で回すイテレーターを返す。
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<V> {
        self.0.iter_mut()
    }

    /// PIDと値の組を回すイテレーターを返す。
    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = (Pid, &V)> {
        self.0.iter().enumerate().map(|(i, v)| (Pid(i as u16), v))
    }

    /// PIDと値の組を可変で回すイテレーターを返す。
    #[inline]
    pub fn entries_mut(&mut self) -> impl Iterator<Item = (Pid, &mut V)> {
        self.0.iter_mut().enumerate().map(|(i, v)| (Pid(i as u16), v))
    }
}

impl<'a, V> IntoIterator for &'a PidTable<V> {
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, V> IntoIterator for &'a mut PidTable<V> {
    type Item = &'a mut V;
    type IntoIter = std::slice::IterMut<'a, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<V> ops::Index<Pid> for PidTable<V> {
    type Output = V;

    #[inline]
    fn index(&self, pid: Pid) -> &Self::Output {
        &self.0[pid.get() as usize]
    }
}

impl<V> ops::IndexMut<Pid> for PidTable<V> {
    #[inline]
    fn index_mut(&mut self, pid: Pid) -> &mut Self::Output {
        &mut self.0[pid.get() as usize]
    }
}
