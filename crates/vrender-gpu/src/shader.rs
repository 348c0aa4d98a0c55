//! Color-correction state and WGSL program generation.
//!
//! The generated module depends only on the pixel type's sampling mode and
//! on the effect flags that alter the fragment stage
//! ([`Effects::program_key`]). Everything else (color property, YCbCr
//! matrix, kernel weights, stride correction) travels in [`VideoUniforms`].

use std::fmt::Write as _;

use bytemuck::{Pod, Zeroable};
use vrender_color::{ColorProperty, ColorRange, Kernel3x3, YuvColorSpace, YuvToRgb};
use vrender_core::{ChromaSampling, Effects, PixelType, VideoFormat};

/// Luma range stretched to [0, 1] by `REMAP_LUMA`.
const Y_MIN: f32 = 16.0 / 255.0;
const Y_MAX: f32 = 235.0 / 255.0;

/// Uniform block shared by every video program.
///
/// Layout matches the WGSL `VideoUniforms` struct (std140-compatible).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VideoUniforms {
    /// Columns of the YCbCr → RGB matrix.
    pub yuv_matrix: [[f32; 4]; 3],
    pub yuv_offset: [f32; 4],
    /// brightness, contrast, sat_hue.x, sat_hue.y
    pub adjust: [f32; 4],
    pub rgb_c: [f32; 4],
    /// rgb_0, y_tan, y_b, unused
    pub fx: [f32; 4],
    /// kern_c, kern_n, kern_d, unused
    pub kern: [f32; 4],
    /// 1/draw_width, 1/draw_height, -1/draw_width, 0
    pub dxy: [f32; 4],
    /// Stride correction of slots 1 and 2.
    pub sc: [f32; 4],
}

impl Default for VideoUniforms {
    fn default() -> Self {
        ShaderParameterSet::default().uniforms(&VideoFormat::empty(), [1.0, 1.0])
    }
}

impl VideoUniforms {
    #[inline]
    pub fn brightness(&self) -> f32 {
        self.adjust[0]
    }

    #[inline]
    pub fn contrast(&self) -> f32 {
        self.adjust[1]
    }

    #[inline]
    pub fn sat_hue(&self) -> [f32; 2] {
        [self.adjust[2], self.adjust[3]]
    }

    #[inline]
    pub fn stride_correction(&self) -> [f32; 2] {
        [self.sc[0], self.sc[1]]
    }
}

/// Identifies a generated program: equal keys yield identical source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub pixel_type: PixelType,
    pub effects: Effects,
}

/// Effect flags plus color coefficients for the video program.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShaderParameterSet {
    effects: Effects,
    color: ColorProperty,
    space: YuvColorSpace,
    range: ColorRange,
}

impl ShaderParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn effects(&self) -> Effects {
        self.effects
    }

    #[inline]
    pub fn color(&self) -> ColorProperty {
        self.color
    }

    #[inline]
    pub fn color_space(&self) -> (YuvColorSpace, ColorRange) {
        (self.space, self.range)
    }

    /// Replace the effect flags. Returns true if they differ from the
    /// current ones; the caller decides whether the program must be rebuilt
    /// by comparing [`ShaderParameterSet::program_key`]s.
    pub fn set_effects(&mut self, effects: Effects) -> bool {
        if self.effects == effects {
            return false;
        }
        self.effects = effects;
        true
    }

    /// Replace the color property (clamped). Only uniforms change.
    pub fn set_color(&mut self, color: ColorProperty) -> bool {
        let color = color.clamped();
        if self.color == color {
            return false;
        }
        self.color = color;
        true
    }

    /// Select the YCbCr matrix and range. Only uniforms change.
    pub fn set_color_space(&mut self, space: YuvColorSpace, range: ColorRange) -> bool {
        if (self.space, self.range) == (space, range) {
            return false;
        }
        self.space = space;
        self.range = range;
        true
    }

    /// Key of the program generated for `pixel_type` with the current effects.
    pub fn program_key(&self, pixel_type: PixelType) -> ProgramKey {
        ProgramKey {
            pixel_type,
            effects: self.effects.program_key(),
        }
    }

    /// Complete WGSL module for `pixel_type`, or `None` for types that carry
    /// no image.
    pub fn fragment_source(&self, pixel_type: PixelType) -> Option<String> {
        program_source(self.program_key(pixel_type))
    }

    /// Uniform values for drawing `format`.
    pub fn uniforms(&self, format: &VideoFormat, stride_correction: [f32; 2]) -> VideoUniforms {
        let matrix = YuvToRgb::new(self.space, self.range);
        let coeff = self.color.coefficients();
        let active = self.effects.active();

        let (rgb_c, rgb_0) = if active.contains(Effects::INVERT_COLOR) {
            (-1.0, 1.0)
        } else {
            (1.0, 0.0)
        };
        let y_tan = 1.0 / (Y_MAX - Y_MIN);
        let kernel = Kernel3x3::for_effects(active);

        let dx = 1.0 / format.draw_width().max(1) as f32;
        let dy = 1.0 / format.draw_height().max(1) as f32;

        VideoUniforms {
            yuv_matrix: matrix.matrix_columns(),
            yuv_offset: matrix.offset.extend(0.0).to_array(),
            adjust: [
                coeff.brightness,
                coeff.contrast,
                coeff.sat_hue[0],
                coeff.sat_hue[1],
            ],
            rgb_c: [rgb_c, rgb_c, rgb_c, 0.0],
            fx: [rgb_0, y_tan, -Y_MIN * y_tan, 0.0],
            kern: [kernel.center, kernel.neighbor, kernel.diagonal, 0.0],
            dxy: [dx, dy, -dx, 0.0],
            sc: [stride_correction[0], stride_correction[1], 0.0, 0.0],
        }
    }
}

const PRELUDE: &str = "\
struct VideoUniforms {
    yuv_matrix: mat3x3<f32>,
    yuv_offset: vec4<f32>,
    adjust: vec4<f32>,
    rgb_c: vec4<f32>,
    fx: vec4<f32>,
    kern: vec4<f32>,
    dxy: vec4<f32>,
    sc: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex: vec2<f32>,
}

@group(0) @binding(0) var p1: texture_2d<f32>;
@group(0) @binding(1) var p2: texture_2d<f32>;
@group(0) @binding(2) var p3: texture_2d<f32>;
@group(0) @binding(3) var samp: sampler;
@group(0) @binding(4) var<uniform> u: VideoUniforms;

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) tex: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 0.0, 1.0);
    out.tex = tex;
    return out;
}
";

/// Pass-through program for the RGBA overlay layer.
pub fn overlay_source() -> String {
    let mut src = String::from(PRELUDE);
    src.push_str(
        "
@fragment
fn fs_main(v: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(p1, samp, v.tex);
}
",
    );
    src
}

fn program_source(key: ProgramKey) -> Option<String> {
    if !PixelType::SUPPORTED.contains(&key.pixel_type) {
        return None;
    }
    let sampling = key.pixel_type.layout().sampling;
    let fx = key.effects;
    let yuv = !matches!(sampling, ChromaSampling::Rgb);

    let mut src = String::with_capacity(4096);
    let _ = writeln!(src, "// {:?} {:?}", key.pixel_type, fx);
    src.push_str(PRELUDE);

    // fetch(): one sample of (Y, Cb, Cr) or RGB.
    src.push_str("\nfn fetch(tc: vec2<f32>) -> vec3<f32> {\n");
    match sampling {
        ChromaSampling::Planar => src.push_str(
            "    let cb = textureSample(p2, samp, vec2<f32>(tc.x * u.sc.x, tc.y)).r;
    let cr = textureSample(p3, samp, vec2<f32>(tc.x * u.sc.y, tc.y)).r;
    return vec3<f32>(textureSample(p1, samp, tc).r, cb, cr);
",
        ),
        ChromaSampling::SemiPlanar { swap_uv } => {
            let swizzle = if swap_uv { "gr" } else { "rg" };
            let _ = write!(
                src,
                "    let c = textureSample(p2, samp, vec2<f32>(tc.x * u.sc.x, tc.y)).{swizzle};
    return vec3<f32>(textureSample(p1, samp, tc).r, c.x, c.y);
"
            );
        }
        ChromaSampling::Packed { luma_first } => {
            let (luma, chroma) = if luma_first { ("r", "ga") } else { ("g", "rb") };
            let _ = write!(
                src,
                "    let c = textureSample(p2, samp, tc).{chroma};
    return vec3<f32>(textureSample(p1, samp, tc).{luma}, c.x, c.y);
"
            );
        }
        ChromaSampling::Rgb => src.push_str("    return textureSample(p1, samp, tc).rgb;\n"),
    }
    src.push_str("}\n");

    // sample_at(): optional 3x3 convolution around tc.
    src.push_str("\nfn sample_at(tc: vec2<f32>) -> vec3<f32> {\n");
    if fx.intersects(Effects::KERNEL_EFFECTS) {
        src.push_str(
            "    let d = u.dxy;
    var c = fetch(tc) * u.kern.x;
    c += (fetch(tc + vec2<f32>(d.x, 0.0)) + fetch(tc - vec2<f32>(d.x, 0.0))
        + fetch(tc + vec2<f32>(0.0, d.y)) + fetch(tc - vec2<f32>(0.0, d.y))) * u.kern.y;
    c += (fetch(tc + d.xy) + fetch(tc - d.xy) + fetch(tc + d.zy) + fetch(tc - d.zy)) * u.kern.z;
    return c;
",
        );
    } else {
        src.push_str("    return fetch(tc);\n");
    }
    src.push_str("}\n");

    // adjust(): brightness, contrast, saturation and hue.
    let grayscale = fx.contains(Effects::GRAYSCALE);
    src.push_str("\nfn adjust(c: vec3<f32>) -> vec3<f32> {\n");
    if yuv {
        src.push_str("    let y = c.x * u.adjust.y + u.adjust.x;\n");
        if grayscale {
            src.push_str("    let uv = vec2<f32>(0.0, 0.0);\n");
        } else {
            src.push_str(
                "    let d = c.yz - vec2<f32>(128.0 / 255.0);
    let uv = vec2<f32>(d.x * u.adjust.z - d.y * u.adjust.w, d.x * u.adjust.w + d.y * u.adjust.z);
",
            );
        }
        src.push_str(
            "    let yuv = vec3<f32>(y, uv + vec2<f32>(128.0 / 255.0));
    return u.yuv_matrix * yuv + u.yuv_offset.xyz;
",
        );
    } else {
        src.push_str("    let luma = dot(c, vec3<f32>(0.299, 0.587, 0.114));\n");
        if grayscale {
            src.push_str("    let rgb = vec3<f32>(luma);\n");
        } else {
            src.push_str("    let rgb = mix(vec3<f32>(luma), c, length(u.adjust.zw));\n");
        }
        src.push_str("    return rgb * u.adjust.y + vec3<f32>(u.adjust.x);\n");
    }
    src.push_str("}\n");

    src.push_str(
        "
@fragment
fn fs_main(v: VertexOutput) -> @location(0) vec4<f32> {
    var rgb = adjust(sample_at(v.tex));
",
    );
    if fx.intersects(Effects::FILTER_EFFECTS | Effects::KERNEL_EFFECTS) {
        src.push_str("    rgb = u.rgb_c.xyz * rgb + vec3<f32>(u.fx.x);\n");
        if fx.contains(Effects::REMAP_LUMA) {
            src.push_str("    rgb = rgb * u.fx.y + vec3<f32>(u.fx.z);\n");
        }
    }
    src.push_str(
        "    return vec4<f32>(clamp(rgb, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
",
    );
    Some(src)
}
