//! Exact Euclidean distance transform (Felzenszwalb & Huttenlocher).

const FAR: f32 = 1e20;

/// 1-D squared distance transform of `f` into `d` via the lower envelope of parabolas.
fn edt_1d(f: &[f32], d: &mut [f32], v: &mut [usize], z: &mut [f32]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let mut k = 0usize;
    v[0] = 0;
    z[0] = f32::NEG_INFINITY;
    z[1] = f32::INFINITY;
    let intersect = |q: usize, p: usize| {
        let (qf, pf) = (q as f32, p as f32);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };
    for q in 1..n {
        let mut s = intersect(q, v[k]);
        // z[0] is -inf, so this never pops below k == 0
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f32::INFINITY;
    }
    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        let qf = q as f32;
        while z[k + 1] < qf {
            k += 1;
        }
        let p = v[k] as f32;
        *out = (qf - p) * (qf - p) + f[v[k]];
    }
}

/// Distance from every covered pixel to the nearest uncovered one; zero on
/// uncovered pixels. Positions outside the buffer do not count as uncovered,
/// so a fully covered mask yields `None`.
pub fn distance_to_uncovered(coverage: &[bool], width: usize, height: usize) -> Option<Vec<f32>> {
    if width == 0 || height == 0 || coverage.iter().all(|&c| c) {
        return None;
    }
    let n = width.max(height);
    let mut f = vec![0.0f32; n];
    let mut d = vec![0.0f32; n];
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f32; n + 1];

    let mut grid: Vec<f32> = coverage.iter().map(|&c| if c { FAR } else { 0.0 }).collect();
    for x in 0..width {
        for y in 0..height {
            f[y] = grid[y * width + x];
        }
        edt_1d(&f[..height], &mut d[..height], &mut v, &mut z);
        for y in 0..height {
            grid[y * width + x] = d[y];
        }
    }
    for y in 0..height {
        let row = &mut grid[y * width..(y + 1) * width];
        f[..width].copy_from_slice(row);
        edt_1d(&f[..width], &mut d[..width], &mut v, &mut z);
        for (out, &sq) in row.iter_mut().zip(&d[..width]) {
            *out = sq.sqrt();
        }
    }
    Some(grid)
}
