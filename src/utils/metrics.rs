//! Reconstruction quality metrics
//!
//! Used to compare a reconstruction against the ground-truth susceptibility.
//! Masked variants only consider voxels where `mask[i] > 0`.

use super::simd_ops::sum_f64;

/// RMSE between two arrays within mask
pub fn rmse(a: &[f64], b: &[f64], mask: &[u8]) -> f64 {
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for i in 0..a.len() {
        if mask[i] > 0 {
            let diff = a[i] - b[i];
            sum_sq += diff * diff;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt()
}

/// RMSE normalized by the range of `b` within mask
pub fn nrmse(a: &[f64], b: &[f64], mask: &[u8]) -> f64 {
    let rmse_val = rmse(a, b, mask);

    let mut min_b = f64::INFINITY;
    let mut max_b = f64::NEG_INFINITY;
    for i in 0..b.len() {
        if mask[i] > 0 {
            min_b = min_b.min(b[i]);
            max_b = max_b.max(b[i]);
        }
    }

    let range = max_b - min_b;
    if range == 0.0 {
        return 0.0;
    }
    rmse_val / range
}

/// Pearson correlation coefficient within mask
pub fn correlation(a: &[f64], b: &[f64], mask: &[u8]) -> f64 {
    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    let mut sum_ab = 0.0;
    let mut sum_a2 = 0.0;
    let mut sum_b2 = 0.0;
    let mut n = 0usize;

    for i in 0..a.len() {
        if mask[i] > 0 {
            sum_a += a[i];
            sum_b += b[i];
            sum_ab += a[i] * b[i];
            sum_a2 += a[i] * a[i];
            sum_b2 += b[i] * b[i];
            n += 1;
        }
    }

    if n == 0 {
        return 0.0;
    }

    let n = n as f64;
    let numerator = n * sum_ab - sum_a * sum_b;
    let denominator = ((n * sum_a2 - sum_a * sum_a) * (n * sum_b2 - sum_b * sum_b)).sqrt();

    if denominator == 0.0 {
        return 0.0;
    }

    numerator / denominator
}

/// Mean of `a` within mask
pub fn masked_mean(a: &[f64], mask: &[u8]) -> f64 {
    let (sum, count) = a
        .iter()
        .zip(mask.iter())
        .filter(|(_, &m)| m > 0)
        .fold((0.0, 0usize), |(s, c), (&v, _)| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(a: &[f64]) -> f64 {
    if a.len() < 2 {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean = sum_f64(a) / n;
    let var = a.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Binary mask of voxels whose value differs from zero
pub fn support_mask(a: &[f64]) -> Vec<u8> {
    a.iter().map(|&v| u8::from(v != 0.0)).collect()
}
