//! Symmetric 3x3 convolution kernels used by the blur and sharpen effects.

use vrender_core::Effects;

/// A 3x3 kernel described by its center, edge-neighbour and diagonal weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel3x3 {
    pub center: f32,
    pub neighbor: f32,
    pub diagonal: f32,
}

impl Kernel3x3 {
    pub const IDENTITY: Self = Self {
        center: 1.0,
        neighbor: 0.0,
        diagonal: 0.0,
    };

    /// 3x3 Gaussian approximation (1 2 1 / 2 4 2 / 1 2 1) / 16.
    pub const BLUR: Self = Self {
        center: 4.0 / 16.0,
        neighbor: 2.0 / 16.0,
        diagonal: 1.0 / 16.0,
    };

    /// Unsharp mask: twice the identity minus the blur.
    pub const SHARPEN: Self = Self {
        center: 2.0 - 4.0 / 16.0,
        neighbor: -2.0 / 16.0,
        diagonal: -1.0 / 16.0,
    };

    /// Average of the kernels selected by `effects`; identity when none are.
    pub fn for_effects(effects: Effects) -> Self {
        let active = effects.active();
        let selected: Vec<Self> = [
            (Effects::BLUR, Self::BLUR),
            (Effects::SHARPEN, Self::SHARPEN),
        ]
        .into_iter()
        .filter(|(flag, _)| active.contains(*flag))
        .map(|(_, k)| k)
        .collect();

        if selected.is_empty() {
            return Self::IDENTITY;
        }
        let n = selected.len() as f32;
        selected.iter().fold(
            Self {
                center: 0.0,
                neighbor: 0.0,
                diagonal: 0.0,
            },
            |acc, k| Self {
                center: acc.center + k.center / n,
                neighbor: acc.neighbor + k.neighbor / n,
                diagonal: acc.diagonal + k.diagonal / n,
            },
        )
    }

    /// Sum of all nine weights.
    pub fn sum(&self) -> f32 {
        self.center + 4.0 * self.neighbor + 4.0 * self.diagonal
    }
}
