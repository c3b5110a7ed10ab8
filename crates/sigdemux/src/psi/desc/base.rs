//! 記述子に関する基礎の型。

use std::fmt;

use crate::utils::BytesExt;

/// 記述子を表すトレイト。
pub trait Descriptor<'a>: Sized {
    /// この記述子のタグ。
    const TAG: u8;

    /// `data`から記述子を読み取る。
    ///
    /// `data`には`descriptor_tag`と`descriptor_length`は含まない。
    fn read(data: &'a [u8]) -> Option<Self>;
}

/// パース前の記述子。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    /// 記述子のタグ。
    pub tag: u8,

    /// 記述子の内容。
    pub data: &'a [u8],
}

impl<'a> fmt::Debug for RawDescriptor<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct PrintBytes<'a>(&'a [u8]);
        impl<'a> fmt::Debug for PrintBytes<'a> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{} bytes", self.0.len())
            }
        }

        f.debug_struct("RawDescriptor")
            .field("tag", &crate::utils::UpperHex(self.tag))
            .field("data", &PrintBytes(self.data))
            .finish()
    }
}

/// 複数の記述子からなる記述子群。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBlock<'a>(&'a [u8]);

impl<'a> DescriptorBlock<'a> {
    /// `data`全体を記述子群とする。
    #[inline]
    pub fn new(data: &'a [u8]) -> DescriptorBlock<'a> {
        DescriptorBlock(data)
    }

    /// `data`から`length`バイト分の記述子群を読み取り後続データと共に返す。
    ///
    /// データ長が不足している場合は`None`を返す。
    pub fn read_with_len(data: &'a [u8], length: u16) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        let (block, rem) = data.split_at_checked(length as usize)?;
        Some((DescriptorBlock(block), rem))
    }

    /// 12ビットの長さに続く記述子群を`data`から読み取り後続データと共に返す。
    ///
    /// データ長が不足している場合は`None`を返す。
    #[inline]
    pub fn read(data: &'a [u8]) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        if data.len() < 2 {
            return None;
        }

        let length = data[0..=1].read_be_16() & 0b0000_1111_1111_1111;
        DescriptorBlock::read_with_len(&data[2..], length)
    }

    /// 記述子群のバイト列を返す。
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// 内包する記述子群のイテレーターを返す。
    #[inline]
    pub fn iter(&self) -> DescriptorIter<'a> {
        DescriptorIter(self.0)
    }

    /// 直前の私的データ指定子記述子で指定された私的データ指定子と共に記述子を回すイテレーターを返す。
    ///
    /// 私的データ指定子がまだ現れていない位置では`default_pds`を返す。
    #[inline]
    pub fn iter_with_pds(&self, default_pds: u32) -> PdsIter<'a> {
        PdsIter {
            inner: self.iter(),
            pds: default_pds,
        }
    }

    /// 内包する記述子群から`T`のタグと一致する記述子を読み取って返す。
    ///
    /// `T`のタグと一致する記述子がない場合は`None`を返す。
    pub fn get<T: Descriptor<'a>>(&self) -> Option<T> {
        self.iter()
            .find(|d| d.tag == T::TAG)
            .and_then(|d| T::read(d.data))
    }

    /// 内包する記述子群から`T`のタグと一致する記述子をすべて読み取って返す。
    pub fn get_all<T: Descriptor<'a>>(&self) -> impl Iterator<Item = T> + 'a {
        self.iter().filter_map(|d| {
            if d.tag == T::TAG {
                T::read(d.data)
            } else {
                None
            }
        })
    }

    /// `tag`の記述子が含まれるかどうかを返す。
    #[inline]
    pub fn contains(&self, tag: u8) -> bool {
        self.iter().any(|d| d.tag == tag)
    }
}

impl<'a> fmt::Debug for DescriptorBlock<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("DescriptorBlock(")?;
        f.debug_list().entries(self).finish()?;
        f.write_str(")")
    }
}

impl<'a> IntoIterator for &DescriptorBlock<'a> {
    type Item = RawDescriptor<'a>;
    type IntoIter = DescriptorIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// [`DescriptorBlock`]のイテレーター。
#[derive(Clone)]
pub struct DescriptorIter<'a>(&'a [u8]);

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = RawDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let [tag, length, ref rem @ ..] = *self.0 else {
            return None;
        };
        let Some((data, tail)) = rem.split_at_checked(length as usize) else {
            log::debug!("truncated descriptor: tag={:02X}", tag);
            self.0 = &[];
            return None;
        };

        self.0 = tail;
        Some(RawDescriptor { tag, data })
    }
}

impl<'a> std::iter::FusedIterator for DescriptorIter<'a> {}

impl<'a> fmt::Debug for DescriptorIter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DescriptorIter(")?;
        f.debug_list().entries(self.clone()).finish()?;
        f.write_str(")")
    }
}

/// [`DescriptorBlock::iter_with_pds`]から返されるイテレーター。
#[derive(Debug, Clone)]
pub struct PdsIter<'a> {
    inner: DescriptorIter<'a>,
    pds: u32,
}

impl<'a> Iterator for PdsIter<'a> {
    type Item = (u32, RawDescriptor<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let desc = self.inner.next()?;
        if desc.tag == super::PrivateDataSpecifierDescriptor::TAG {
            if let Some(pds) = super::PrivateDataSpecifierDescriptor::read(desc.data) {
                self.pds = pds.private_data_specifier;
            }
        }
        Some((self.pds, desc))
    }
}

impl<'a> std::iter::FusedIterator for PdsIter<'a> {}

/// 所有権を持つ記述子群。
///
/// テーブルの寿命がセクションより長くなるため、デコード済みのテーブルはこの型で記述子を保持する。
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorList(Vec<u8>);

impl DescriptorList {
    /// 空の記述子群を生成する。
    #[inline]
    pub fn new() -> DescriptorList {
        DescriptorList::default()
    }

    /// 借用する記述子群から生成する。
    #[inline]
    pub fn from_block(block: DescriptorBlock) -> DescriptorList {
        DescriptorList(block.0.to_vec())
    }

    /// 記述子を末尾に追加する。
    ///
    /// 記述子の内容が255バイトを超える場合は何もせず`false`を返す。
    pub fn push(&mut self, tag: u8, data: &[u8]) -> bool {
        let Ok(len) = u8::try_from(data.len()) else {
            return false;
        };
        self.0.push(tag);
        self.0.push(len);
        self.0.extend_from_slice(data);
        true
    }

    /// 借用する記述子群として返す。
    #[inline]
    pub fn as_block(&self) -> DescriptorBlock {
        DescriptorBlock(&self.0)
    }

    /// 記述子群のイテレーターを返す。
    #[inline]
    pub fn iter(&self) -> DescriptorIter {
        DescriptorIter(&self.0)
    }

    /// 私的データ指定子と共に記述子を回すイテレーターを返す。
    #[inline]
    pub fn iter_with_pds(&self, default_pds: u32) -> PdsIter {
        self.as_block().iter_with_pds(default_pds)
    }

    /// `T`のタグと一致する最初の記述子を読み取って返す。
    #[inline]
    pub fn get<'a, T: Descriptor<'a>>(&'a self) -> Option<T> {
        DescriptorBlock(&self.0).get()
    }

    /// `T`のタグと一致する記述子をすべて読み取って返す。
    #[inline]
    pub fn get_all<'a, T: Descriptor<'a>>(&'a self) -> impl Iterator<Item = T> + 'a {
        DescriptorBlock(&self.0).get_all()
    }

    /// `tag`の記述子が含まれるかどうかを返す。
    #[inline]
    pub fn contains(&self, tag: u8) -> bool {
        self.as_block().contains(tag)
    }

    /// 記述子群のバイト数を返す。
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 記述子が一つもないかどうかを返す。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> From<DescriptorBlock<'a>> for DescriptorList {
    #[inline]
    fn from(block: DescriptorBlock<'a>) -> DescriptorList {
        DescriptorList::from_block(block)
    }
}

impl fmt::Debug for DescriptorList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("DescriptorList(")?;
        f.debug_list().entries(self.iter()).finish()?;
        f.write_str(")")
    }
}
