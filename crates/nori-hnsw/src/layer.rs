//! Level assignment for new nodes.

use rand::Rng;

/// Highest level a node can be assigned.
pub const MAX_LEVEL: u16 = 15;

/// Draw a level from `rng`.
///
/// Uses the formula: floor(-ln(uniform(0,1)) * m_L)
/// where m_L = 1/ln(M)
///
/// The probability of reaching level L is roughly 1/M^L.
pub fn random_layer_with<R: Rng + ?Sized>(rng: &mut R, m: u16) -> u16 {
    // m_L = 1/ln(M)
    let m_l = 1.0 / (m.max(2) as f64).ln();

    // gen::<f64>() is in [0, 1); flip to (0, 1] so ln never sees 0
    let uniform = 1.0 - rng.gen::<f64>();

    let layer = (-uniform.ln() * m_l).floor();
    (layer as u16).min(MAX_LEVEL)
}

/// Draw a level from a fresh thread-local random source.
pub fn random_layer(m: u16) -> u16 {
    random_layer_with(&mut rand::thread_rng(), m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_layer_distribution() {
        const SAMPLES: usize = 50_000;
        let m = 3u16;

        let mut layer_counts = vec![0usize; MAX_LEVEL as usize + 1];
        for _ in 0..SAMPLES {
            let layer = random_layer(m);
            assert!(layer <= MAX_LEVEL);
            layer_counts[layer as usize] += 1;
        }

        let max_observed = layer_counts.iter().rposition(|&c| c > 0).unwrap();

        // Expected frequency of level i is proportional to exp(-i * ln(m)) = m^-i
        let total: f64 = (0..=max_observed).map(|i| (m as f64).powi(-(i as i32))).sum();
        let lower = (max_observed + 1) / 3;
        for (i, &count) in layer_counts.iter().enumerate().take(lower.max(1)) {
            let expected = SAMPLES as f64 * (m as f64).powi(-(i as i32)) / total;
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(
                deviation <= 0.1,
                "level {}: {} samples, expected {:.0}",
                i,
                count,
                expected
            );
        }
    }

    #[test]
    fn test_random_layer_with_seed_is_reproducible() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let left: Vec<_> = (0..100).map(|_| random_layer_with(&mut a, 16)).collect();
        let right: Vec<_> = (0..100).map(|_| random_layer_with(&mut b, 16)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_random_layer_decays() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut layer_counts = [0usize; 3];
        for _ in 0..10_000 {
            let layer = random_layer_with(&mut rng, 16) as usize;
            if layer < 3 {
                layer_counts[layer] += 1;
            }
        }
        assert!(layer_counts[0] > layer_counts[1]);
        assert!(layer_counts[1] > layer_counts[2]);
    }
}
