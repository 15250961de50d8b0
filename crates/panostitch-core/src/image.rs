/// Rec. 601 luma weights for `R`, `G`, `B`.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Interleaved 8-bit RGB buffer, row-major, `len = w*h*3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, [0, 0, 0])
    }

    pub fn filled(width: usize, height: usize, color: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap a raw interleaved buffer, checking its length.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        let expected = width.checked_mul(height)?.checked_mul(3)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, px: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&px);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rec. 601 luma conversion, rounded to the nearest integer.
    pub fn to_gray(&self) -> GrayImage {
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| luminance([px[0], px[1], px[2]]).round().clamp(0.0, 255.0) as u8)
            .collect();
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// One decoded input photograph.
///
/// `index` is the ordinal position in the input collection and stays stable for
/// the whole run; `name` is only used for diagnostics and the alignment store.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub index: usize,
    pub name: String,
    pub pixels: RgbImage,
}

impl SourceImage {
    pub fn new(index: usize, name: impl Into<String>, pixels: RgbImage) -> Self {
        Self {
            index,
            name: name.into(),
            pixels,
        }
    }
}

#[inline]
pub fn luminance(px: [u8; 3]) -> f32 {
    LUMA_WEIGHTS[0] * px[0] as f32 + LUMA_WEIGHTS[1] * px[1] as f32 + LUMA_WEIGHTS[2] * px[2] as f32
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample with zero padding outside the image.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear RGB sample with edge clamping.
///
/// Integer coordinates inside the image return the stored pixel exactly.
#[inline]
pub fn sample_rgb_clamped(src: &RgbImage, x: f64, y: f64) -> [f32; 3] {
    let max_x = (src.width - 1) as f64;
    let max_y = (src.height - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let row0 = y0 * src.width;
    let row1 = y1 * src.width;
    let mut out = [0.0f32; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let p00 = src.data[(row0 + x0) * 3 + c] as f32;
        let p10 = src.data[(row0 + x1) * 3 + c] as f32;
        let p01 = src.data[(row1 + x0) * 3 + c] as f32;
        let p11 = src.data[(row1 + x1) * 3 + c] as f32;
        let a = p00 + fx * (p10 - p00);
        let b = p01 + fx * (p11 - p01);
        *o = a + fy * (b - a);
    }
    out
}

/// Resize a grayscale image with bilinear interpolation (pixel-center aligned).
pub fn resize_bilinear(src: &GrayImageView<'_>, out_w: usize, out_h: usize) -> GrayImage {
    let mut out = GrayImage::new(out_w, out_h);
    if src.width == 0 || src.height == 0 || out_w == 0 || out_h == 0 {
        return out;
    }
    let sx = src.width as f32 / out_w as f32;
    let sy = src.height as f32 / out_h as f32;
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;

    for y in 0..out_h {
        let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        for x in 0..out_w {
            let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            out.data[y * out_w + x] = (sample_bilinear(src, fx, fy) + 0.5).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Shrink by an integer `factor`, averaging each `factor`×`factor` block.
///
/// The output is `width / factor` by `height / factor`; trailing rows and
/// columns that do not fill a block are dropped. A factor of 0 or 1 copies.
pub fn downsample_area(src: &RgbImage, factor: usize) -> RgbImage {
    if factor <= 1 {
        return src.clone();
    }
    let (out_w, out_h) = (src.width / factor, src.height / factor);
    let mut out = RgbImage::new(out_w, out_h);
    let area = (factor * factor) as u32;
    for y in 0..out_h {
        for x in 0..out_w {
            let mut sum = [0u32; 3];
            for sy in y * factor..(y + 1) * factor {
                let start = (sy * src.width + x * factor) * 3;
                let row = &src.data[start..start + factor * 3];
                for px in row.chunks_exact(3) {
                    for c in 0..3 {
                        sum[c] += px[c] as u32;
                    }
                }
            }
            out.set_pixel(x, y, sum.map(|v| ((v + area / 2) / area) as u8));
        }
    }
    out
}
