//! Gaussian and Laplacian pyramids over interleaved float images.
//!
//! Reduction uses the separable binomial kernel `[1 4 6 4 1] / 16` with
//! clamped borders; expansion is its transpose (zero insertion followed by the
//! same kernel scaled by 2), so `collapse(laplacian(img)) == img` up to float
//! rounding for any image size.

const TAPS: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

#[derive(Clone, Debug, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

impl FloatImage {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width * height * channels],
        }
    }

    pub fn from_vec(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height * channels).then_some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[(y * self.width + x) * self.channels + c]
    }

    fn transposed(&self) -> Self {
        let mut out = Self::new(self.height, self.width, self.channels);
        let ch = self.channels;
        for y in 0..self.height {
            for x in 0..self.width {
                let src = (y * self.width + x) * ch;
                let dst = (x * self.height + y) * ch;
                out.data[dst..dst + ch].copy_from_slice(&self.data[src..src + ch]);
            }
        }
        out
    }

    /// Blur and drop every other column.
    fn reduce_x(&self) -> Self {
        let w = self.width.div_ceil(2);
        let ch = self.channels;
        let mut out = Self::new(w, self.height, ch);
        for y in 0..self.height {
            let row = &self.data[y * self.width * ch..(y + 1) * self.width * ch];
            for x in 0..w {
                let dst = (y * w + x) * ch;
                for (k, &tap) in TAPS.iter().enumerate() {
                    let sx = clamp_index(2 * x as isize + k as isize - 2, self.width);
                    for c in 0..ch {
                        out.data[dst + c] += tap * row[sx * ch + c];
                    }
                }
            }
        }
        out
    }

    /// Insert zero columns up to `width` and interpolate.
    fn expand_x(&self, width: usize) -> Self {
        let ch = self.channels;
        let mut out = Self::new(width, self.height, ch);
        if self.width == 0 {
            return out;
        }
        for y in 0..self.height {
            let row = &self.data[y * self.width * ch..(y + 1) * self.width * ch];
            for x in 0..width {
                let dst = (y * width + x) * ch;
                let i = (x / 2) as isize;
                for c in 0..ch {
                    let s = |j: isize| row[clamp_index(j, self.width) * ch + c];
                    out.data[dst + c] = if x % 2 == 0 {
                        (s(i - 1) + 6.0 * s(i) + s(i + 1)) / 8.0
                    } else {
                        (s(i) + s(i + 1)) / 2.0
                    };
                }
            }
        }
        out
    }

    /// Half-resolution level, `ceil(w/2) × ceil(h/2)`.
    pub fn pyr_down(&self) -> Self {
        if self.width == 0 || self.height == 0 {
            return self.clone();
        }
        self.reduce_x().transposed().reduce_x().transposed()
    }

    /// Upsample to exactly `width × height`.
    pub fn pyr_up(&self, width: usize, height: usize) -> Self {
        if self.width == 0 || self.height == 0 {
            return Self::new(width, height, self.channels);
        }
        self.expand_x(width)
            .transposed()
            .expand_x(height)
            .transposed()
    }

    fn zip_with(&self, other: &Self, op: impl Fn(f32, f32) -> f32) -> Self {
        debug_assert_eq!(self.data.len(), other.data.len());
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| op(a, b))
                .collect(),
        }
    }
}

/// `levels + 1` images from full resolution down.
pub fn gaussian_pyramid(image: &FloatImage, levels: usize) -> Vec<FloatImage> {
    let mut pyr = Vec::with_capacity(levels + 1);
    pyr.push(image.clone());
    for l in 0..levels {
        let next = pyr[l].pyr_down();
        pyr.push(next);
    }
    pyr
}

/// Band-pass levels followed by the coarsest Gaussian residual.
pub fn laplacian_pyramid(image: &FloatImage, levels: usize) -> Vec<FloatImage> {
    let gauss = gaussian_pyramid(image, levels);
    let mut lap = Vec::with_capacity(levels + 1);
    for l in 0..levels {
        let fine = &gauss[l];
        let up = gauss[l + 1].pyr_up(fine.width, fine.height);
        lap.push(fine.zip_with(&up, |a, b| a - b));
    }
    if let Some(last) = gauss.into_iter().last() {
        lap.push(last);
    }
    lap
}

/// Inverse of [`laplacian_pyramid`].
pub fn collapse(pyramid: &[FloatImage]) -> Option<FloatImage> {
    let (coarsest, bands) = pyramid.split_last()?;
    let mut img = coarsest.clone();
    for band in bands.iter().rev() {
        img = img
            .pyr_up(band.width, band.height)
            .zip_with(band, |a, b| a + b);
    }
    Some(img)
}

/// Number of halvings before the shorter side would drop below `min_side`.
pub fn max_levels(width: usize, height: usize, min_side: usize) -> usize {
    let mut side = width.min(height);
    let mut levels = 0;
    while side.div_ceil(2) >= min_side.max(1) && side > 1 {
        side = side.div_ceil(2);
        levels += 1;
    }
    levels
}
