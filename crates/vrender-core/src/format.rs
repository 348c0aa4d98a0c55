//! Pixel format descriptors for decoded video frames.
//!
//! Every supported pixel type owns one row in a static layout table
//! ([`PixelType::layout`]). The row describes which frame plane feeds each
//! texture slot, the texel format of the slot, how the slot's dimensions
//! derive from the plane byte dimensions, and how the fragment program
//! samples luma and chroma. Texture allocation, plane upload and shader
//! generation all read the same row.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Maximum number of planes (and texture slots) per frame.
pub const MAX_PLANES: usize = 3;

/// Pixel layout of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelType {
    /// No frame yet.
    #[default]
    Empty,
    /// Y, U and V in three separate planes, chroma subsampled 2x2.
    PlanarYuv420,
    /// Y plane plus one interleaved UV plane.
    SemiPlanarNv12,
    /// Y plane plus one interleaved VU plane.
    SemiPlanarNv21,
    /// Single plane, Y0 U Y1 V.
    PackedYuy2,
    /// Single plane, U Y0 V Y1.
    PackedUyvy,
    /// Single plane, R G B A.
    PackedRgba,
    /// Single plane, B G R A.
    PackedBgra,
}

/// Texel format of a texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexelFormat {
    /// One 8-bit component.
    R8,
    /// Two 8-bit components.
    Rg8,
    /// Four 8-bit components, RGBA order.
    Rgba8,
    /// Four 8-bit components, BGRA order.
    Bgra8,
}

impl TexelFormat {
    /// Bytes occupied by one texel.
    #[inline]
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::Rg8 => 2,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }
}

/// One texture dimension: a plane byte dimension shifted right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub plane: usize,
    pub shift: u32,
}

impl Extent {
    const fn of(plane: usize, shift: u32) -> Self {
        Self { plane, shift }
    }
}

/// How the fragment program reconstructs YCbCr/RGB from the slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSampling {
    /// Y from slot 0, U from slot 1, V from slot 2 (all `.r`).
    Planar,
    /// Y from slot 0, chroma pair from slot 1 (`.rg`), optionally swapped.
    SemiPlanar { swap_uv: bool },
    /// Luma from the 2-component slot 0, chroma pair from the 4-component slot 1.
    Packed { luma_first: bool },
    /// Already RGB in slot 0.
    Rgb,
}

/// Layout of a single texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    /// Frame plane whose bytes are uploaded into this slot.
    pub source_plane: usize,
    pub texel: TexelFormat,
    pub width: Extent,
    pub height: Extent,
    /// Divisor used when computing the stride correction of this slot.
    /// `None` for slots whose rows are aligned with the luma plane.
    pub stride_divisor: Option<u32>,
}

/// Table row describing a pixel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLayout {
    pub plane_count: usize,
    /// Bytes per logical pixel in plane 0; used to derive the draw width.
    pub plane0_bytes_per_pixel: u32,
    pub slots: &'static [SlotLayout],
    pub sampling: ChromaSampling,
}

const fn slot(
    source_plane: usize,
    texel: TexelFormat,
    width: Extent,
    height: Extent,
    stride_divisor: Option<u32>,
) -> SlotLayout {
    SlotLayout {
        source_plane,
        texel,
        width,
        height,
        stride_divisor,
    }
}

const EMPTY_LAYOUT: FormatLayout = FormatLayout {
    plane_count: 0,
    plane0_bytes_per_pixel: 1,
    slots: &[],
    sampling: ChromaSampling::Rgb,
};

const YUV420_SLOTS: [SlotLayout; 3] = [
    slot(0, TexelFormat::R8, Extent::of(0, 0), Extent::of(0, 0), None),
    slot(1, TexelFormat::R8, Extent::of(1, 0), Extent::of(1, 0), Some(2)),
    slot(2, TexelFormat::R8, Extent::of(2, 0), Extent::of(2, 0), Some(2)),
];

const SEMI_PLANAR_SLOTS: [SlotLayout; 2] = [
    slot(0, TexelFormat::R8, Extent::of(0, 0), Extent::of(0, 0), None),
    slot(1, TexelFormat::Rg8, Extent::of(1, 1), Extent::of(1, 0), Some(1)),
];

// Both slots alias plane 0: the same row bytes read as (Y, C) pairs and as
// (Y0, C0, Y1, C1) quads.
const PACKED_YUV_SLOTS: [SlotLayout; 2] = [
    slot(0, TexelFormat::Rg8, Extent::of(0, 1), Extent::of(0, 0), None),
    slot(0, TexelFormat::Rgba8, Extent::of(0, 2), Extent::of(0, 0), None),
];

const RGBA_SLOTS: [SlotLayout; 1] = [slot(
    0,
    TexelFormat::Rgba8,
    Extent::of(0, 2),
    Extent::of(0, 0),
    None,
)];

const BGRA_SLOTS: [SlotLayout; 1] = [slot(
    0,
    TexelFormat::Bgra8,
    Extent::of(0, 2),
    Extent::of(0, 0),
    None,
)];

impl PixelType {
    /// All pixel types that can carry image data.
    pub const SUPPORTED: [PixelType; 7] = [
        Self::PlanarYuv420,
        Self::SemiPlanarNv12,
        Self::SemiPlanarNv21,
        Self::PackedYuy2,
        Self::PackedUyvy,
        Self::PackedRgba,
        Self::PackedBgra,
    ];

    /// The layout table row for this pixel type.
    pub fn layout(self) -> &'static FormatLayout {
        const YUV420: FormatLayout = FormatLayout {
            plane_count: 3,
            plane0_bytes_per_pixel: 1,
            slots: &YUV420_SLOTS,
            sampling: ChromaSampling::Planar,
        };
        const NV12: FormatLayout = FormatLayout {
            plane_count: 2,
            plane0_bytes_per_pixel: 1,
            slots: &SEMI_PLANAR_SLOTS,
            sampling: ChromaSampling::SemiPlanar { swap_uv: false },
        };
        const NV21: FormatLayout = FormatLayout {
            plane_count: 2,
            plane0_bytes_per_pixel: 1,
            slots: &SEMI_PLANAR_SLOTS,
            sampling: ChromaSampling::SemiPlanar { swap_uv: true },
        };
        const YUY2: FormatLayout = FormatLayout {
            plane_count: 1,
            plane0_bytes_per_pixel: 2,
            slots: &PACKED_YUV_SLOTS,
            sampling: ChromaSampling::Packed { luma_first: true },
        };
        const UYVY: FormatLayout = FormatLayout {
            plane_count: 1,
            plane0_bytes_per_pixel: 2,
            slots: &PACKED_YUV_SLOTS,
            sampling: ChromaSampling::Packed { luma_first: false },
        };
        const RGBA: FormatLayout = FormatLayout {
            plane_count: 1,
            plane0_bytes_per_pixel: 4,
            slots: &RGBA_SLOTS,
            sampling: ChromaSampling::Rgb,
        };
        const BGRA: FormatLayout = FormatLayout {
            plane_count: 1,
            plane0_bytes_per_pixel: 4,
            slots: &BGRA_SLOTS,
            sampling: ChromaSampling::Rgb,
        };

        match self {
            Self::Empty => &EMPTY_LAYOUT,
            Self::PlanarYuv420 => &YUV420,
            Self::SemiPlanarNv12 => &NV12,
            Self::SemiPlanarNv21 => &NV21,
            Self::PackedYuy2 => &YUY2,
            Self::PackedUyvy => &UYVY,
            Self::PackedRgba => &RGBA,
            Self::PackedBgra => &BGRA,
        }
    }

    /// Whether frames of this type are stored as YCbCr.
    pub fn is_yuv(self) -> bool {
        !matches!(self, Self::Empty | Self::PackedRgba | Self::PackedBgra)
    }

    /// Tight (unpadded) byte dimensions of each plane for a logical size.
    pub fn plane_byte_sizes(self, width: u32, height: u32) -> SmallVec<[(u32, u32); MAX_PLANES]> {
        let cw = width.div_ceil(2);
        let ch = height.div_ceil(2);
        match self {
            Self::Empty => SmallVec::new(),
            Self::PlanarYuv420 => {
                smallvec::smallvec![(width, height), (cw, ch), (cw, ch)]
            }
            Self::SemiPlanarNv12 | Self::SemiPlanarNv21 => {
                smallvec::smallvec![(width, height), (cw * 2, ch)]
            }
            Self::PackedYuy2 | Self::PackedUyvy => smallvec::smallvec![(cw * 4, height)],
            Self::PackedRgba | Self::PackedBgra => smallvec::smallvec![(width * 4, height)],
        }
    }
}

impl PixelType {
    /// Short lowercase name, as accepted by [`str::parse`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::PlanarYuv420 => "i420",
            Self::SemiPlanarNv12 => "nv12",
            Self::SemiPlanarNv21 => "nv21",
            Self::PackedYuy2 => "yuy2",
            Self::PackedUyvy => "uyvy",
            Self::PackedRgba => "rgba",
            Self::PackedBgra => "bgra",
        }
    }
}

impl std::str::FromStr for PixelType {
    type Err = crate::VRenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "yuv420p" => return Ok(Self::PlanarYuv420),
            "yuyv" => return Ok(Self::PackedYuy2),
            _ => {}
        }
        Self::SUPPORTED
            .into_iter()
            .find(|ty| ty.name() == lower)
            .ok_or_else(|| crate::VRenderError::UnsupportedFormat(s.to_string()))
    }
}

/// Descriptor of a decoded frame's layout.
///
/// Equality compares the pixel type and logical size only; it is what the
/// presenter uses to decide that the format changed. Row padding differences
/// are caught later as a texture/plane mismatch.
#[derive(Debug, Clone, Default)]
pub struct VideoFormat {
    pixel_type: PixelType,
    width: u32,
    height: u32,
    byte_widths: SmallVec<[u32; MAX_PLANES]>,
    byte_heights: SmallVec<[u32; MAX_PLANES]>,
}

impl PartialEq for VideoFormat {
    fn eq(&self, other: &Self) -> bool {
        self.pixel_type == other.pixel_type
            && self.width == other.width
            && self.height == other.height
    }
}

impl Eq for VideoFormat {}

impl VideoFormat {
    /// The empty format: no frame presented yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Describe a frame with tightly packed rows.
    pub fn new(pixel_type: PixelType, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::empty();
        }
        let sizes = pixel_type.plane_byte_sizes(width, height);
        Self {
            pixel_type,
            width,
            height,
            byte_widths: sizes.iter().map(|s| s.0).collect(),
            byte_heights: sizes.iter().map(|s| s.1).collect(),
        }
    }

    /// Describe a frame whose planes carry decoder-specific row strides.
    ///
    /// Strides narrower than the tight row size are widened to it.
    pub fn with_strides(pixel_type: PixelType, width: u32, height: u32, strides: &[u32]) -> Self {
        let mut format = Self::new(pixel_type, width, height);
        for (bw, stride) in format.byte_widths.iter_mut().zip(strides) {
            *bw = (*bw).max(*stride);
        }
        format
    }

    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True iff the format carries no planes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.byte_widths.is_empty()
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.byte_widths.len()
    }

    /// Row size in bytes of `plane`, padding included. Zero past the last plane.
    #[inline]
    pub fn byte_width(&self, plane: usize) -> u32 {
        self.byte_widths.get(plane).copied().unwrap_or(0)
    }

    /// Number of rows of `plane`. Zero past the last plane.
    #[inline]
    pub fn byte_height(&self, plane: usize) -> u32 {
        self.byte_heights.get(plane).copied().unwrap_or(0)
    }

    /// GPU-visible row width in pixels, padding included.
    pub fn draw_width(&self) -> u32 {
        self.byte_width(0) / self.pixel_type.layout().plane0_bytes_per_pixel
    }

    #[inline]
    pub fn draw_height(&self) -> u32 {
        self.byte_height(0)
    }

    /// Raw pixel aspect ratio (width / height).
    pub fn pixel_aspect(&self) -> f64 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f64 / self.height as f64
    }

    /// The layout table row for this format.
    #[inline]
    pub fn layout(&self) -> &'static FormatLayout {
        self.pixel_type.layout()
    }

    /// Texture dimensions of slot `index`, in texels.
    pub fn slot_size(&self, index: usize) -> Option<(u32, u32)> {
        let slot = self.layout().slots.get(index)?;
        Some((
            self.byte_width(slot.width.plane) >> slot.width.shift,
            self.byte_height(slot.height.plane) >> slot.height.shift,
        ))
    }

    /// Per-slot stride correction factors for slots 1 and 2.
    ///
    /// A factor is `luma_byte_width / (chroma_byte_width * divisor)`; it is
    /// 1.0 when the chroma rows carry no extra padding relative to luma.
    pub fn stride_correction(&self) -> [f32; 2] {
        let mut sc = [1.0f32; 2];
        let luma = self.byte_width(0) as f64;
        for (i, slot) in self.layout().slots.iter().enumerate().skip(1).take(2) {
            if let Some(divisor) = slot.stride_divisor {
                let chroma = self.byte_width(slot.source_plane) as f64 * divisor as f64;
                if chroma > 0.0 {
                    sc[i - 1] = (luma / chroma) as f32;
                }
            }
        }
        sc
    }
}
