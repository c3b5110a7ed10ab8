//! PSI用のモジュール。

pub mod desc;
pub mod table;

use fxhash::FxHashMap;
use thiserror::Error;

use crate::pid::Pid;
use crate::utils::BytesExt;

/// [`PsiSection::parse`]で発生するエラー。
///
/// セクション長が確定したあとで発生するエラーにはセクション長が付随する。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PsiError {
    /// PSIセクションの長さが足りない。
    #[error("insufficient length of a PSI section")]
    InsufficientLength,

    /// PSIの終端に到達した。
    #[error("reached to end of PSI sections")]
    EndOfPsi,

    /// PSIセクションに最低限必要なバイト数がなく、壊れたセクションである。
    ///
    /// 内包する`usize`にはPSIのセクション長が入る。
    #[error("corrupt section")]
    Corrupted(usize),

    /// PSIセクションのCRC32が一致しない。
    ///
    /// 内包する`usize`にはPSIのセクション長が入る。
    #[error("crc32 error")]
    Crc32(usize),
}

/// PSIのセクション。
#[derive(Debug, Clone, Copy)]
pub struct PsiSection<'a> {
    /// テーブル識別。
    pub table_id: u8,
    /// セクションシンタクス。
    pub syntax: Option<PsiSectionSyntax>,
    /// PSIのデータ。
    ///
    /// セクションシンタクスがある場合はCRCを含まず、ない場合はセクション末尾までを含む。
    pub data: &'a [u8],
    /// ヘッダやCRCを含むセクション全体。
    pub raw: &'a [u8],
}

impl<'a> PsiSection<'a> {
    /// PSIセクションをパースし、[`PsiSection`]とセクション長を返す。
    ///
    /// セクションシンタクスを持つ長形式セクションではCRC32を検査する。
    /// 短形式セクションのCRC32の有無はテーブルごとに異なるため、ここでは検査しない。
    pub fn parse(buf: &'a [u8]) -> Result<(PsiSection<'a>, usize), PsiError> {
        if buf.len() < 3 {
            return Err(PsiError::InsufficientLength);
        }

        let table_id = buf[0];
        if table_id == 0xFF {
            return Err(PsiError::EndOfPsi);
        }
        let section_syntax_indicator = buf[1] & 0b10000000 != 0;
        let section_length = buf[1..=2].read_be_16() & 0b0000_1111_1111_1111;

        let Some(psi) = buf.get(..3 + section_length as usize) else {
            return Err(PsiError::InsufficientLength);
        };

        let (syntax, data) = if section_syntax_indicator {
            if psi.len() < 3 + 5 + 4 {
                return Err(PsiError::Corrupted(psi.len()));
            }
            if !crate::crc::verify32(psi) {
                return Err(PsiError::Crc32(psi.len()));
            }

            let ss = PsiSectionSyntax {
                table_id_extension: psi[3..=4].read_be_16(),
                version_number: (psi[5] & 0b00111110) >> 1,
                current_next_indicator: psi[5] & 0b00000001 != 0,
                section_number: psi[6],
                last_section_number: psi[7],
            };
            if ss.section_number > ss.last_section_number {
                return Err(PsiError::Corrupted(psi.len()));
            }
            (Some(ss), &psi[8..psi.len() - 4])
        } else {
            (None, &psi[3..])
        };

        Ok((
            PsiSection {
                table_id,
                syntax,
                data,
                raw: psi,
            },
            psi.len(),
        ))
    }

    /// 所有権を持つ[`Section`]に変換する。
    #[inline]
    pub fn to_section(&self) -> Section {
        Section {
            table_id: self.table_id,
            syntax: self.syntax,
            raw: self.raw.into(),
        }
    }
}

/// PSIセクションのシンタクス。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsiSectionSyntax {
    /// テーブル識別拡張。
    pub table_id_extension: u16,
    /// バージョン番号（5ビット）。
    pub version_number: u8,
    /// カレントネクスト指示。
    pub current_next_indicator: bool,
    /// セクション番号。
    pub section_number: u8,
    /// 最終セクション番号。
    pub last_section_number: u8,
}

/// 所有権を持つPSIセクション。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// テーブル識別。
    pub table_id: u8,
    /// セクションシンタクス。
    pub syntax: Option<PsiSectionSyntax>,
    raw: Box<[u8]>,
}

impl Section {
    /// ヘッダやCRCを含むセクション全体を返す。
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// セクションのデータ部を返す。
    ///
    /// [`PsiSection::data`]と同じ範囲である。
    #[inline]
    pub fn data(&self) -> &[u8] {
        if self.syntax.is_some() {
            &self.raw[8..self.raw.len() - 4]
        } else {
            &self.raw[3..]
        }
    }

    /// 借用する[`PsiSection`]として返す。
    #[inline]
    pub fn as_psi(&self) -> PsiSection {
        PsiSection {
            table_id: self.table_id,
            syntax: self.syntax,
            data: self.data(),
            raw: &self.raw,
        }
    }
}

/// 全セクションが揃ったPSIテーブル。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteTable {
    /// テーブルを運んだPID。
    pub pid: Pid,
    /// テーブル識別。
    pub table_id: u8,
    /// テーブル識別拡張。短形式セクションでは0。
    pub table_id_extension: u16,
    /// バージョン番号。短形式セクションでは0。
    pub version: u8,
    /// セクション番号順に並んだセクション。
    pub sections: Vec<Section>,
}

impl CompleteTable {
    /// 短形式セクションからなるテーブルかどうかを返す。
    #[inline]
    pub fn is_short(&self) -> bool {
        self.sections.first().map_or(true, |s| s.syntax.is_none())
    }

    /// 各セクションのデータ部を順に回すイテレーターを返す。
    #[inline]
    pub fn payloads(&self) -> impl Iterator<Item = &[u8]> {
        self.sections.iter().map(Section::data)
    }
}

/// PSIテーブルを表すトレイト。
pub trait PsiTable: Sized {
    /// 全セクションの揃ったテーブルから読み取る。
    ///
    /// テーブルとして不正な場合は`None`を返す。
    fn read(table: &CompleteTable) -> Option<Self>;
}

#[derive(Debug, Clone)]
struct Subtable {
    version: u8,
    sections: Vec<Option<Section>>,
    delivered: bool,
}

/// PSIセクションからテーブルを組み立てる。
///
/// サブテーブル（PID・テーブル識別・テーブル識別拡張の組）ごとに、
/// 現在のバージョンの全セクションが揃った時点で一度だけテーブルを返す。
/// 同一バージョンのサブテーブルはバージョンが変わるまで再度返さない。
#[derive(Debug, Default, Clone)]
pub struct Repository {
    subtables: FxHashMap<(Pid, u8, u16), Subtable>,
}

impl Repository {
    /// 空の`Repository`を生成する。
    #[inline]
    pub fn new() -> Repository {
        Repository::default()
    }

    /// `pid`で受け取った`psi`を蓄積し、テーブルが揃った場合はそれを返す。
    ///
    /// 短形式セクションは受け取るたびにテーブルとして返す。
    /// カレントネクスト指示が0のセクションは無視する。
    pub fn push(&mut self, pid: Pid, psi: &PsiSection) -> Option<CompleteTable> {
        let Some(syntax) = psi.syntax else {
            return Some(CompleteTable {
                pid,
                table_id: psi.table_id,
                table_id_extension: 0,
                version: 0,
                sections: vec![psi.to_section()],
            });
        };
        if !syntax.current_next_indicator {
            return None;
        }

        let len = syntax.last_section_number as usize + 1;
        let idx = syntax.section_number as usize;
        if idx >= len {
            return None;
        }

        let subtable = self
            .subtables
            .entry((pid, psi.table_id, syntax.table_id_extension))
            .or_insert_with(|| Subtable {
                version: syntax.version_number,
                sections: Vec::new(),
                delivered: false,
            });

        if subtable.version != syntax.version_number
            || (!subtable.delivered && subtable.sections.len() != len)
        {
            // 新しいバージョンか、セクション数が変わった
            subtable.version = syntax.version_number;
            subtable.sections.clear();
            subtable.sections.resize(len, None);
            subtable.delivered = false;
        } else if subtable.delivered {
            return None;
        }

        if subtable.sections[idx].is_none() {
            subtable.sections[idx] = Some(psi.to_section());
        }
        if subtable.sections.iter().any(Option::is_none) {
            return None;
        }

        let sections: Vec<Section> = subtable.sections.drain(..).flatten().collect();
        subtable.delivered = true;

        log::trace!(
            "table complete: pid={:04X}, table_id={:02X}, ext={:04X}, version={}",
            pid,
            psi.table_id,
            syntax.table_id_extension,
            syntax.version_number,
        );
        Some(CompleteTable {
            pid,
            table_id: psi.table_id,
            table_id_extension: syntax.table_id_extension,
            version: syntax.version_number,
            sections,
        })
    }

    /// `pid`で組み立て中および組み立て済みのサブテーブルを破棄する。
    pub fn remove_pid(&mut self, pid: Pid) {
        self.subtables.retain(|&(p, _, _), _| p != pid);
    }

    /// `Repository`の内容を消去して初期化する。
    #[inline]
    pub fn clear(&mut self) {
        self.subtables.clear();
    }
}
