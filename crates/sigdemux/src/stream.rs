//! エレメンタリーストリームの種別と分類。

use crate::psi::desc::{tag, Descriptor, DescriptorList, RegistrationDescriptor};

/// PMTにおけるストリーム形式種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamType(pub u8);

// ISO/IEC 13818-1およびATSC A/53・A/65による。
impl StreamType {
    /// ISO/IEC 11172-2映像（MPEG-1 Video）。
    pub const MPEG1_VIDEO: StreamType = StreamType(0x01);
    /// ISO/IEC 13818-2映像（MPEG-2 Video）。
    pub const MPEG2_VIDEO: StreamType = StreamType(0x02);
    /// ISO/IEC 11172-3音声（MPEG-1 Audio）。
    pub const MPEG1_AUDIO: StreamType = StreamType(0x03);
    /// ISO/IEC 13818-3音声（MPEG-2 Audio）。
    pub const MPEG2_AUDIO: StreamType = StreamType(0x04);
    /// プライベートセクション。
    pub const PRIVATE_SECTIONS: StreamType = StreamType(0x05);
    /// 独立PESパケット。
    pub const PES_PRIVATE_DATA: StreamType = StreamType(0x06);
    /// DSM-CCのU-Nメッセージ。
    pub const DSMCC_UN_MESSAGES: StreamType = StreamType(0x0B);
    /// DSM-CCのストリーム記述子。
    pub const DSMCC_STREAM_DESCRIPTORS: StreamType = StreamType(0x0C);
    /// DSM-CCのセクション。
    pub const DSMCC_SECTIONS: StreamType = StreamType(0x0D);
    /// ISO/IEC 13818-7音声（ADTS）。
    pub const AAC: StreamType = StreamType(0x0F);
    /// ISO/IEC 14496-2映像（MPEG-4 Visual）。
    pub const MPEG4_VIDEO: StreamType = StreamType(0x10);
    /// ISO/IEC 14496-3音声（LATM）。
    pub const AAC_LATM: StreamType = StreamType(0x11);
    /// ITU-T Rec. H.264映像。
    pub const AVC: StreamType = StreamType(0x1B);
    /// ITU-T Rec. H.265映像。
    pub const HEVC: StreamType = StreamType(0x24);
    /// ITU-T Rec. H.266映像。
    pub const VVC: StreamType = StreamType(0x33);
    /// ATSCのAC-3音声。
    pub const ATSC_AC3: StreamType = StreamType(0x81);
    /// SCTE 35のスプライス情報。
    pub const SCTE35_SPLICE: StreamType = StreamType(0x86);
    /// ATSCの拡張AC-3音声。
    pub const ATSC_EAC3: StreamType = StreamType(0x87);

    /// 映像ストリームかどうかを返す。
    #[inline]
    pub fn is_video(&self) -> bool {
        matches!(self.0, 0x01 | 0x02 | 0x10 | 0x1B | 0x20 | 0x24 | 0x33)
    }

    /// 音声ストリームかどうかを返す。
    #[inline]
    pub fn is_audio(&self) -> bool {
        matches!(self.0, 0x03 | 0x04 | 0x0F | 0x11 | 0x1C | 0x81 | 0x87)
    }

    /// セクション形式でデータを運ぶストリームかどうかを返す。
    #[inline]
    pub fn is_section(&self) -> bool {
        matches!(self.0, 0x05 | 0x0B..=0x0D | 0x86)
    }
}

/// 符号化方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecType {
    /// 不明。
    #[default]
    Undefined,
    /// MPEG-1 Video。
    Mpeg1Video,
    /// MPEG-2 Video。
    Mpeg2Video,
    /// MPEG-4 Visual。
    Mpeg4Video,
    /// H.264（AVC）。
    Avc,
    /// H.265（HEVC）。
    Hevc,
    /// H.266（VVC）。
    Vvc,
    /// MPEG-1 Audio。
    Mpeg1Audio,
    /// MPEG-2 Audio。
    Mpeg2Audio,
    /// AAC（ADTS）。
    Aac,
    /// HE-AAC（LATM）。
    HeAac,
    /// AC-3。
    Ac3,
    /// 拡張AC-3。
    Eac3,
    /// DTS。
    Dts,
    /// テレテキスト。
    Teletext,
    /// DVB字幕。
    DvbSubtitles,
}

impl CodecType {
    /// 映像の符号化方式かどうかを返す。
    #[inline]
    pub fn is_video(&self) -> bool {
        matches!(
            self,
            CodecType::Mpeg1Video
                | CodecType::Mpeg2Video
                | CodecType::Mpeg4Video
                | CodecType::Avc
                | CodecType::Hevc
                | CodecType::Vvc
        )
    }
}

/// PIDの分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PidClass {
    /// 不明。
    #[default]
    Undefined,
    /// PCRのみを運ぶ。
    PcrOnly,
    /// データ。
    Data,
    /// 映像のPES。
    Video,
    /// 音声のPES。
    Audio,
    /// 字幕。
    Subtitles,
    /// ECM。
    Ecm,
    /// EMM。
    Emm,
    /// PSI・SI。
    Psi,
    /// スタッフィング（ヌルパケット）。
    Stuffing,
}

/// ストリーム形式種別と記述子からPMTの構成要素を分類する。
pub fn classify(stream_type: StreamType, descriptors: &DescriptorList) -> (PidClass, CodecType) {
    let codec = match stream_type {
        StreamType::MPEG1_VIDEO => CodecType::Mpeg1Video,
        StreamType::MPEG2_VIDEO => CodecType::Mpeg2Video,
        StreamType::MPEG4_VIDEO => CodecType::Mpeg4Video,
        StreamType::AVC => CodecType::Avc,
        StreamType::HEVC => CodecType::Hevc,
        StreamType::VVC => CodecType::Vvc,
        StreamType::MPEG1_AUDIO => CodecType::Mpeg1Audio,
        StreamType::MPEG2_AUDIO => CodecType::Mpeg2Audio,
        StreamType::AAC => CodecType::Aac,
        StreamType::AAC_LATM => CodecType::HeAac,
        StreamType::ATSC_AC3 => CodecType::Ac3,
        StreamType::ATSC_EAC3 => CodecType::Eac3,
        _ => codec_from_descriptors(descriptors),
    };

    let class = match codec {
        _ if stream_type.is_video() || codec.is_video() => PidClass::Video,
        CodecType::Teletext | CodecType::DvbSubtitles => PidClass::Subtitles,
        CodecType::Undefined if stream_type.is_audio() => PidClass::Audio,
        CodecType::Undefined => PidClass::Data,
        _ => PidClass::Audio,
    };
    (class, codec)
}

fn codec_from_descriptors(descriptors: &DescriptorList) -> CodecType {
    for desc in descriptors.iter() {
        let codec = match desc.tag {
            tag::AC3 => CodecType::Ac3,
            tag::ENHANCED_AC3 => CodecType::Eac3,
            tag::DTS => CodecType::Dts,
            tag::AAC => CodecType::HeAac,
            tag::TELETEXT => CodecType::Teletext,
            tag::SUBTITLING => CodecType::DvbSubtitles,
            tag::REGISTRATION => match RegistrationDescriptor::read(desc.data) {
                Some(reg) if reg.format_identifier == RegistrationDescriptor::AC3 => {
                    CodecType::Ac3
                }
                Some(reg) if reg.format_identifier == RegistrationDescriptor::EAC3 => {
                    CodecType::Eac3
                }
                Some(reg) if reg.format_identifier == RegistrationDescriptor::HEVC => {
                    CodecType::Hevc
                }
                _ => continue,
            },
            _ => continue,
        };
        return codec;
    }
    CodecType::Undefined
}

/// PESペイロードの先頭部分`data`にイントラ符号化された画像の開始が含まれるかどうかを返す。
pub fn find_intra_image(data: &[u8], codec: CodecType) -> bool {
    memchr::memmem::find_iter(data, &[0x00, 0x00, 0x01]).any(|pos| {
        let nal = &data[pos + 3..];
        match codec {
            CodecType::Mpeg1Video | CodecType::Mpeg2Video => match nal {
                // シーケンスヘッダ
                [0xB3, ..] => true,
                // Iピクチャ
                [0x00, _, b, ..] => (b >> 3) & 0x07 == 1,
                _ => false,
            },
            CodecType::Avc => match nal {
                // IDRスライスまたはSPS
                [b, ..] => matches!(b & 0x1F, 5 | 7),
                _ => false,
            },
            CodecType::Hevc => match nal {
                // IRAPまたはVPS・SPS
                [b, ..] => matches!((b >> 1) & 0x3F, 16..=23 | 32 | 33),
                _ => false,
            },
            CodecType::Vvc => match nal {
                // IRAPまたはVPS・SPS
                [_, b, ..] => matches!(b >> 3, 7..=9 | 14 | 15),
                _ => false,
            },
            _ => false,
        }
    })
}
