// neuquant.rs
//
// Copyright (c) 2020-2023  Douglas Lau
//
//! NeuQuant neural-net color quantizer.
//!
//! A Kohonen self-organizing map of 256 color prototypes, after Anthony
//! Dekker, "Kohonen neural networks for optimal colour quantization",
//! Network: Computation in Neural Systems, Vol. 5 (1994), pp 351-367.
//! All training happens in fixed-point integer arithmetic, so identical input
//! always produces an identical palette.

/// Number of colors in the network
const NET_SIZE: usize = 256;

/// Last network position
const MAX_NET_POS: usize = NET_SIZE - 1;

/// Number of learning cycles
const CYCLES: usize = 100;

/// Bias for color values
const NET_BIAS_SHIFT: i32 = 4;

/// Bias for fractions
const INT_BIAS_SHIFT: i32 = 16;
const INT_BIAS: i32 = 1 << INT_BIAS_SHIFT;

/// Frequency / bias learning rates (beta = 1/1024)
const GAMMA_SHIFT: i32 = 10;
const BETA_SHIFT: i32 = 10;
const BETA: i32 = INT_BIAS >> BETA_SHIFT;
const BETA_GAMMA: i32 = INT_BIAS << (GAMMA_SHIFT - BETA_SHIFT);

/// Radius starts at 32.0, biased by 6 bits, and shrinks by 1/30 each cycle
const INIT_RAD: usize = NET_SIZE >> 3;
const RADIUS_BIAS_SHIFT: i32 = 6;
const RADIUS_BIAS: i32 = 1 << RADIUS_BIAS_SHIFT;
const INIT_RADIUS: i32 = INIT_RAD as i32 * RADIUS_BIAS;
const RADIUS_DEC: i32 = 30;

/// Alpha starts at 1.0, biased by 10 bits
const ALPHA_BIAS_SHIFT: i32 = 10;
const INIT_ALPHA: i32 = 1 << ALPHA_BIAS_SHIFT;

/// Radial power bias
const RAD_BIAS_SHIFT: i32 = 8;
const RAD_BIAS: i32 = 1 << RAD_BIAS_SHIFT;
const ALPHA_RAD_BIAS: i32 = 1 << (ALPHA_BIAS_SHIFT + RAD_BIAS_SHIFT);

/// Primes near 500 for the sampling stride; no image length is assumed to
/// be divisible by all four
const PRIMES: [usize; 4] = [499, 491, 487, 503];

/// Images smaller than this are sampled on every pixel
const MIN_PICTURE_BYTES: usize = 3 * PRIMES[3];

/// Set of palette entries referenced by an indexed image
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorUsage {
    bits: [u64; 4],
}

impl ColorUsage {
    /// Mark an entry as used
    pub fn insert(&mut self, idx: u8) {
        self.bits[usize::from(idx >> 6)] |= 1 << (idx & 0x3F);
    }

    /// Check whether an entry is used
    pub fn contains(&self, idx: u8) -> bool {
        self.bits[usize::from(idx >> 6)] & (1 << (idx & 0x3F)) != 0
    }

    /// Count used entries
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }
}

/// Palette of RGB colors, up to 256 entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    /// Flat RGB triplets
    colors: Vec<u8>,
}

impl Palette {
    /// Create a palette from flat RGB triplets.
    ///
    /// A trailing partial triplet and entries past 256 are dropped.
    pub fn with_colors(colors: &[u8]) -> Self {
        let len = (colors.len() / 3).min(NET_SIZE) * 3;
        Palette {
            colors: colors[..len].to_vec(),
        }
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.colors.len() / 3
    }

    /// Check if the palette has no entries
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Get flat RGB triplets
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }

    /// Get one entry
    pub fn entry(&self, idx: usize) -> Option<(u8, u8, u8)> {
        self.colors
            .chunks_exact(3)
            .nth(idx)
            .map(|c| (c[0], c[1], c[2]))
    }

    /// Find the used entry closest to a color (squared distance).
    ///
    /// Returns 0 if no entry is used.
    pub fn find_closest(&self, r: u8, g: u8, b: u8, usage: &ColorUsage) -> u8 {
        let mut best = 0;
        let mut best_d = i32::MAX;
        for (i, c) in self.colors.chunks_exact(3).enumerate() {
            let dr = i32::from(r) - i32::from(c[0]);
            let dg = i32::from(g) - i32::from(c[1]);
            let db = i32::from(b) - i32::from(c[2]);
            let d = dr * dr + dg * dg + db * db;
            if usage.contains(i as u8) && d < best_d {
                best_d = d;
                best = i as u8;
            }
        }
        best
    }
}

/// Result of quantizing one image
#[derive(Clone, Debug)]
pub struct Quantized {
    /// Palette built for the image
    pub palette: Palette,
    /// One palette index per pixel
    pub indices: Vec<u8>,
    /// Entries referenced by `indices`
    pub usage: ColorUsage,
}

/// Quantize flat RGB pixels to a 256-color palette
pub fn quantize(rgb: &[u8], sample_fac: u32) -> Quantized {
    let mut nq = NeuQuant::new(rgb, sample_fac);
    nq.build_palette();
    let mut usage = ColorUsage::default();
    let indices = rgb
        .chunks_exact(3)
        .map(|p| {
            let idx = nq.lookup(p[0], p[1], p[2]);
            usage.insert(idx);
            idx
        })
        .collect();
    Quantized {
        palette: nq.palette(),
        indices,
        usage,
    }
}

/// NeuQuant color quantizer network
pub struct NeuQuant<'a> {
    /// Flat RGB training pixels
    pixels: &'a [u8],
    /// Sampling factor (1 is best quality)
    sample_fac: u32,
    /// Prototypes: red, green, blue, original position
    network: [[i32; 4]; NET_SIZE],
    /// Search start position for each green value
    net_index: [usize; 256],
    /// Bias for each prototype
    bias: [i32; NET_SIZE],
    /// Frequency for each prototype
    freq: [i32; NET_SIZE],
    /// Neighbor update strength by distance
    rad_power: [i32; INIT_RAD],
}

impl<'a> NeuQuant<'a> {
    /// Create an untrained network for flat RGB pixels.
    ///
    /// Until [build_palette](#method.build_palette) is called, the network is
    /// a gray ramp.
    pub fn new(pixels: &'a [u8], sample_fac: u32) -> Self {
        let mut network = [[0; 4]; NET_SIZE];
        let mut net_index = [0; 256];
        for (i, n) in network.iter_mut().enumerate() {
            let v = i as i32;
            *n = [v, v, v, v];
            net_index[i] = i;
        }
        NeuQuant {
            pixels,
            sample_fac: sample_fac.max(1),
            network,
            net_index,
            bias: [0; NET_SIZE],
            freq: [0; NET_SIZE],
            rad_power: [0; INIT_RAD],
        }
    }

    /// Train the network and build the search index.
    ///
    /// Training always starts over from the initial gray ramp.
    pub fn build_palette(&mut self) {
        self.init();
        self.learn();
        self.unbias();
        self.build_index();
    }

    /// Get palette in original prototype order
    pub fn palette(&self) -> Palette {
        let mut index = [0; NET_SIZE];
        for (i, n) in self.network.iter().enumerate() {
            index[n[3] as usize] = i;
        }
        let mut colors = Vec::with_capacity(NET_SIZE * 3);
        for i in index.iter() {
            let n = &self.network[*i];
            colors.push(n[0] as u8);
            colors.push(n[1] as u8);
            colors.push(n[2] as u8);
        }
        Palette { colors }
    }

    /// Find the palette index closest to a color (Manhattan distance)
    pub fn lookup(&self, r: u8, g: u8, b: u8) -> u8 {
        let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
        let mut best_d = 1000; // larger than any possible distance (765)
        let mut best = 0;
        // start at the green index and search outward both ways
        let mut i = self.net_index[g as usize] as isize;
        let mut j = i - 1;
        while i < NET_SIZE as isize || j >= 0 {
            if i < NET_SIZE as isize {
                let p = &self.network[i as usize];
                let dist = p[1] - g;
                if dist >= best_d {
                    i = NET_SIZE as isize;
                } else {
                    i += 1;
                    let dist = dist.abs() + (p[0] - r).abs();
                    if dist < best_d {
                        let dist = dist + (p[2] - b).abs();
                        if dist < best_d {
                            best_d = dist;
                            best = p[3];
                        }
                    }
                }
            }
            if j >= 0 {
                let p = &self.network[j as usize];
                let dist = g - p[1];
                if dist >= best_d {
                    j = -1;
                } else {
                    j -= 1;
                    let dist = dist.abs() + (p[0] - r).abs();
                    if dist < best_d {
                        let dist = dist + (p[2] - b).abs();
                        if dist < best_d {
                            best_d = dist;
                            best = p[3];
                        }
                    }
                }
            }
        }
        best as u8
    }

    /// Initialize prototypes along the gray diagonal
    fn init(&mut self) {
        for i in 0..NET_SIZE {
            let v = ((i as i32) << (NET_BIAS_SHIFT + 8)) / NET_SIZE as i32;
            self.network[i] = [v, v, v, 0];
            self.freq[i] = INT_BIAS / NET_SIZE as i32;
            self.bias[i] = 0;
        }
    }

    /// Main learning loop
    fn learn(&mut self) {
        let len = self.pixels.len() - self.pixels.len() % 3;
        let (sample_fac, step) = if len < MIN_PICTURE_BYTES {
            (1, 3)
        } else {
            let prime = PRIMES
                .iter()
                .copied()
                .find(|p| len % p != 0)
                .unwrap_or(PRIMES[3]);
            (self.sample_fac as usize, 3 * prime)
        };
        let alpha_dec = 30 + ((sample_fac - 1) / 3) as i32;
        let samples = len / (3 * sample_fac);
        let delta = (samples / CYCLES).max(1);
        trace!("neuquant: {} samples, step {}", samples, step);
        let mut alpha = INIT_ALPHA;
        let mut radius = INIT_RADIUS;
        let mut rad = Self::radius_pixels(radius);
        self.set_rad_power(rad, alpha);
        let mut pos = 0;
        for i in 1..=samples {
            let r = i32::from(self.pixels[pos]) << NET_BIAS_SHIFT;
            let g = i32::from(self.pixels[pos + 1]) << NET_BIAS_SHIFT;
            let b = i32::from(self.pixels[pos + 2]) << NET_BIAS_SHIFT;
            let j = self.contest(r, g, b);
            self.alter_single(alpha, j, r, g, b);
            if rad > 0 {
                self.alter_neighbors(rad, j, r, g, b);
            }
            pos += step;
            if pos >= len {
                pos -= len;
            }
            if i % delta == 0 {
                alpha -= alpha / alpha_dec;
                radius -= radius / RADIUS_DEC;
                rad = Self::radius_pixels(radius);
                self.set_rad_power(rad, alpha);
            }
        }
    }

    /// Get unbiased neighbor radius (radius of 1 or less disables neighbors)
    fn radius_pixels(radius: i32) -> usize {
        let rad = radius >> RADIUS_BIAS_SHIFT;
        if rad <= 1 {
            0
        } else {
            rad as usize
        }
    }

    /// Precompute neighbor update strength
    fn set_rad_power(&mut self, rad: usize, alpha: i32) {
        let rad = rad as i32;
        let rr = rad * rad;
        for i in 0..rad {
            self.rad_power[i as usize] = alpha * (((rr - i * i) * RAD_BIAS) / rr);
        }
    }

    /// Find the best prototype for a biased color, updating frequencies.
    ///
    /// The closest prototype gains frequency; the returned prototype is the
    /// one closest after subtracting bias, which favors rarely used ones.
    fn contest(&mut self, r: i32, g: i32, b: i32) -> usize {
        let mut best_d = i32::MAX;
        let mut best_bias_d = best_d;
        let mut best_pos = 0;
        let mut best_bias_pos = 0;
        for i in 0..NET_SIZE {
            let n = &self.network[i];
            let dist = (n[0] - r).abs() + (n[1] - g).abs() + (n[2] - b).abs();
            if dist < best_d {
                best_d = dist;
                best_pos = i;
            }
            let bias_dist =
                dist - (self.bias[i] >> (INT_BIAS_SHIFT - NET_BIAS_SHIFT));
            if bias_dist < best_bias_d {
                best_bias_d = bias_dist;
                best_bias_pos = i;
            }
            let beta_freq = self.freq[i] >> BETA_SHIFT;
            self.freq[i] -= beta_freq;
            self.bias[i] += beta_freq << GAMMA_SHIFT;
        }
        self.freq[best_pos] += BETA;
        self.bias[best_pos] -= BETA_GAMMA;
        best_bias_pos
    }

    /// Move prototype `i` toward a biased color by `alpha`
    fn alter_single(&mut self, alpha: i32, i: usize, r: i32, g: i32, b: i32) {
        let n = &mut self.network[i];
        n[0] -= (alpha * (n[0] - r)) / INIT_ALPHA;
        n[1] -= (alpha * (n[1] - g)) / INIT_ALPHA;
        n[2] -= (alpha * (n[2] - b)) / INIT_ALPHA;
    }

    /// Move prototypes within `rad` of `i` toward a biased color
    fn alter_neighbors(&mut self, rad: usize, i: usize, r: i32, g: i32, b: i32) {
        let (i, rad) = (i as isize, rad as isize);
        let lo = (i - rad).max(-1);
        let hi = (i + rad).min(NET_SIZE as isize);
        let mut j = i + 1;
        let mut k = i - 1;
        let mut m = 1;
        while j < hi || k > lo {
            let a = self.rad_power[m];
            m += 1;
            if j < hi {
                let p = &mut self.network[j as usize];
                p[0] -= (a * (p[0] - r)) / ALPHA_RAD_BIAS;
                p[1] -= (a * (p[1] - g)) / ALPHA_RAD_BIAS;
                p[2] -= (a * (p[2] - b)) / ALPHA_RAD_BIAS;
                j += 1;
            }
            if k > lo {
                let p = &mut self.network[k as usize];
                p[0] -= (a * (p[0] - r)) / ALPHA_RAD_BIAS;
                p[1] -= (a * (p[1] - g)) / ALPHA_RAD_BIAS;
                p[2] -= (a * (p[2] - b)) / ALPHA_RAD_BIAS;
                k -= 1;
            }
        }
    }

    /// Scale prototypes back to 0-255 and record their positions
    fn unbias(&mut self) {
        for (i, n) in self.network.iter_mut().enumerate() {
            for c in n.iter_mut().take(3) {
                *c = (*c >> NET_BIAS_SHIFT).max(0).min(255);
            }
            n[3] = i as i32;
        }
    }

    /// Sort prototypes by green and build the green index
    fn build_index(&mut self) {
        let mut previous_col = 0;
        let mut start_pos = 0;
        for i in 0..NET_SIZE {
            let mut small_pos = i;
            let mut small_val = self.network[i][1];
            for j in (i + 1)..NET_SIZE {
                if self.network[j][1] < small_val {
                    small_pos = j;
                    small_val = self.network[j][1];
                }
            }
            self.network.swap(i, small_pos);
            let small_val = small_val as usize;
            if small_val != previous_col {
                self.net_index[previous_col] = (start_pos + i) >> 1;
                for j in (previous_col + 1)..small_val {
                    self.net_index[j] = i;
                }
                previous_col = small_val;
                start_pos = i;
            }
        }
        self.net_index[previous_col] = (start_pos + MAX_NET_POS) >> 1;
        for j in (previous_col + 1)..256 {
            self.net_index[j] = MAX_NET_POS;
        }
    }
}
