//! Video effect flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Effects applied while presenting a frame.
    ///
    /// Flips only change texture coordinates. Filter and kernel effects
    /// change the generated fragment program.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Effects: u32 {
        const FLIP_VERTICALLY = 1 << 0;
        const FLIP_HORIZONTALLY = 1 << 1;
        const GRAYSCALE = 1 << 2;
        const INVERT_COLOR = 1 << 3;
        const REMAP_LUMA = 1 << 4;
        const BLUR = 1 << 5;
        const SHARPEN = 1 << 6;
        /// Suspends every other flag without clearing it.
        const IGNORE_EFFECT = 1 << 7;

        const FILTER_EFFECTS = Self::GRAYSCALE.bits() | Self::INVERT_COLOR.bits() | Self::REMAP_LUMA.bits();
        const KERNEL_EFFECTS = Self::BLUR.bits() | Self::SHARPEN.bits();
    }
}

impl Effects {
    /// Flags that are actually in force, taking `IGNORE_EFFECT` into account.
    #[inline]
    pub fn active(self) -> Self {
        if self.contains(Self::IGNORE_EFFECT) {
            Self::empty()
        } else {
            self
        }
    }

    /// Whether any color filter is in force.
    #[inline]
    pub fn has_filter(self) -> bool {
        self.active().intersects(Self::FILTER_EFFECTS)
    }

    /// Whether any convolution kernel is in force.
    #[inline]
    pub fn has_kernel(self) -> bool {
        self.active().intersects(Self::KERNEL_EFFECTS)
    }

    /// The subset of flags that influences fragment program generation.
    #[inline]
    pub fn program_key(self) -> Self {
        self.active() & (Self::FILTER_EFFECTS | Self::KERNEL_EFFECTS)
    }
}
