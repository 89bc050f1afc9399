//! Random sources for the Monte Carlo engine.
//!
//! Pseudo-random draws come from a xoshiro256** generator with jump-based
//! stream splitting so parallel path batches stay deterministic. Quasi
//! mode substitutes a Halton low-discrepancy sequence mapped to normals
//! through the inverse CDF.

use statrs::distribution::{ContinuousCDF, Normal};

/// xoshiro256** PRNG for deterministic parallel simulation.
#[derive(Debug, Clone)]
pub struct Xoshiro256 {
    s: [u64; 4],
}

impl Xoshiro256 {
    /// Seed all four state words via SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut z = seed;
        let mut s = [0u64; 4];
        for item in &mut s {
            z = z.wrapping_add(0x9e3779b97f4a7c15);
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            *item = z ^ (z >> 31);
        }
        Self { s }
    }

    /// Jump function: advances state by 2^128 calls, yielding a
    /// non-overlapping stream for the next batch.
    pub fn jump(&mut self) {
        const JUMP: [u64; 4] =
            [0x180ec6d33cfd0aba, 0xd5a61266f0c9392c, 0xa9582618e03fc9aa, 0x39abdc4529b1661c];
        let mut s0: u64 = 0;
        let mut s1: u64 = 0;
        let mut s2: u64 = 0;
        let mut s3: u64 = 0;
        for j in &JUMP {
            for b in 0..64 {
                if j & (1u64 << b) != 0 {
                    s0 ^= self.s[0];
                    s1 ^= self.s[1];
                    s2 ^= self.s[2];
                    s3 ^= self.s[3];
                }
                self.next_u64();
            }
        }
        self.s = [s0, s1, s2, s3];
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.s[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Standard normal via Box-Muller.
    pub fn next_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Unit-variance Student-t scale factor for one simulated day.
    ///
    /// `df` is rounded to the nearest integer (minimum 3) so the
    /// chi-squared draw (sum of k squared normals) and the variance
    /// renormalization use the same degrees of freedom k. The resulting
    /// sqrt((k-2)/chi2) keeps the shock variance at 1 so sigma stays
    /// calibrated.
    pub fn next_t_scale(&mut self, df: f64) -> f64 {
        let k = df.round().max(3.0);
        let chi2: f64 = (0..k as usize).map(|_| self.next_normal().powi(2)).sum();
        ((k - 2.0) / chi2.max(1e-12)).sqrt()
    }
}

/// First `n` primes by trial division; each Halton dimension must use a
/// distinct base or two dimensions emit identical streams.
fn first_primes(n: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(n);
    let mut candidate: u64 = 2;
    while primes.len() < n {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

/// Initial sequence indices skipped to avoid the degenerate early points.
const HALTON_BURN_IN: u64 = 20;

/// Halton low-discrepancy sampler producing quasi-random normal vectors.
///
/// One point per simulated day, one coordinate per asset, with the first
/// `dims` primes as per-dimension bases. Low-discrepancy points trade the
/// strict independence of pseudo-random draws for better uniform coverage
/// of the sample space; in high dimensions the large prime bases correlate
/// at low indices, which the burn-in only partially mitigates.
#[derive(Debug, Clone)]
pub struct HaltonSampler {
    bases: Vec<u64>,
    index: u64,
    normal: Normal,
}

impl HaltonSampler {
    /// Create a sampler with one dimension per asset.
    pub fn new(dims: usize) -> Self {
        Self {
            bases: first_primes(dims),
            index: HALTON_BURN_IN,
            normal: Normal::new(0.0, 1.0).expect("unit normal"),
        }
    }

    /// Skip ahead `n` points, used to give each path batch its own
    /// deterministic slice of the sequence.
    pub fn skip(&mut self, n: u64) {
        self.index += n;
    }

    /// Radical inverse of `i` in the given base.
    fn radical_inverse(base: u64, mut i: u64) -> f64 {
        let mut result = 0.0;
        let mut f = 1.0 / base as f64;
        while i > 0 {
            result += f * (i % base) as f64;
            i /= base;
            f /= base as f64;
        }
        result
    }

    /// Next point of standard normals, one per dimension.
    pub fn next_normals(&mut self) -> Vec<f64> {
        let i = self.index;
        self.index += 1;
        self.bases
            .iter()
            .map(|&b| {
                let u = Self::radical_inverse(b, i).clamp(1e-12, 1.0 - 1e-12);
                self.normal.inverse_cdf(u)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xoshiro_deterministic() {
        let mut a = Xoshiro256::new(7);
        let mut b = Xoshiro256::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_jump_separates_streams() {
        let mut a = Xoshiro256::new(7);
        let mut b = a.clone();
        b.jump();
        let same = (0..100).filter(|_| a.next_u64() == b.next_u64()).count();
        assert_eq!(same, 0);
    }

    #[test]
    fn test_normal_moments() {
        let mut rng = Xoshiro256::new(42);
        let n = 100_000;
        let draws: Vec<f64> = (0..n).map(|_| rng.next_normal()).collect();

        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.02);
        assert!((var - 1.0).abs() < 0.03);
    }

    #[test]
    fn test_t_scale_unit_variance() {
        let mut rng = Xoshiro256::new(42);
        let df = 5.0;
        let n = 100_000;
        // Shock = z * scale should have variance ~1 after normalization.
        let var = (0..n)
            .map(|_| {
                let z = rng.next_normal();
                let s = rng.next_t_scale(df);
                (z * s).powi(2)
            })
            .sum::<f64>()
            / n as f64;
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn test_t_scale_fat_tails() {
        let mut rng = Xoshiro256::new(123);
        let n = 200_000;
        let threshold = 4.0;

        let t_exceed = (0..n)
            .filter(|_| {
                let z = rng.next_normal();
                let s = rng.next_t_scale(4.0);
                (z * s).abs() > threshold
            })
            .count();
        let gauss_exceed = (0..n)
            .filter(|_| rng.next_normal().abs() > threshold)
            .count();

        assert!(t_exceed > gauss_exceed, "{t_exceed} vs {gauss_exceed}");
    }

    #[test]
    fn test_t_scale_unit_variance_fractional_df() {
        let mut rng = Xoshiro256::new(42);
        let df = 4.5;
        let n = 100_000;
        let var = (0..n)
            .map(|_| {
                let z = rng.next_normal();
                let s = rng.next_t_scale(df);
                (z * s).powi(2)
            })
            .sum::<f64>()
            / n as f64;
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn test_halton_bases_distinct_beyond_25_dims() {
        let dims = 30;
        let mut sampler = HaltonSampler::new(dims);
        let point = sampler.next_normals();
        // Every dimension draws from its own prime base, so no two
        // coordinates of a point coincide.
        for i in 0..dims {
            for j in (i + 1)..dims {
                assert_ne!(point[i], point[j], "dims {i} and {j} coincide");
            }
        }
    }

    #[test]
    fn test_first_primes() {
        assert_eq!(first_primes(10), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        let primes = first_primes(30);
        assert_eq!(primes.len(), 30);
        assert_eq!(primes[29], 113);
    }

    #[test]
    fn test_halton_uniform_coverage() {
        let mut sampler = HaltonSampler::new(2);
        let n = 4096;
        let mut sum = [0.0f64; 2];
        for _ in 0..n {
            let point = sampler.next_normals();
            sum[0] += point[0];
            sum[1] += point[1];
        }
        // Quasi-random normals center tightly on zero.
        assert!((sum[0] / n as f64).abs() < 0.05);
        assert!((sum[1] / n as f64).abs() < 0.05);
    }

    #[test]
    fn test_halton_skip_matches_sequential() {
        let mut a = HaltonSampler::new(3);
        let mut b = HaltonSampler::new(3);
        for _ in 0..10 {
            a.next_normals();
        }
        b.skip(10);
        assert_eq!(a.next_normals(), b.next_normals());
    }
}
