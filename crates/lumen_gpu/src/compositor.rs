//! Merging per-device accumulators into one image.

use lumen_math::Vec3;

use crate::device::DeviceOutput;

/// Average radiance per pixel over every device's completed samples.
///
/// Pixels that received no samples on any device are black.
pub fn composite(outputs: &[Vec<Vec3>], counts: &[Vec<u32>]) -> Vec<Vec3> {
    let pixels = outputs.iter().map(Vec::len).max().unwrap_or(0);
    let mut sums = vec![Vec3::ZERO; pixels];
    let mut totals = vec![0u64; pixels];

    for (output, count) in outputs.iter().zip(counts) {
        for (i, (&c, &n)) in output.iter().zip(count).enumerate() {
            sums[i] += c;
            totals[i] += n as u64;
        }
    }

    sums.into_iter()
        .zip(totals)
        .map(|(sum, total)| if total == 0 { Vec3::ZERO } else { sum / total as f32 })
        .collect()
}

pub fn composite_devices(outputs: &[DeviceOutput]) -> Vec<Vec3> {
    let colors: Vec<Vec<Vec3>> = outputs.iter().map(|o| o.output.clone()).collect();
    let counts: Vec<Vec<u32>> = outputs.iter().map(|o| o.counts.clone()).collect();
    composite(&colors, &counts)
}

/// Gamma-correct (gamma 2) and quantize to RGBA8, row 0 on top.
pub fn to_rgba8(pixels: &[Vec3]) -> Vec<u8> {
    pixels
        .iter()
        .flat_map(|c| {
            let c = c.max(Vec3::ZERO).powf(0.5).clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
            [c.x as u8, c.y as u8, c.z as u8, 255]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_weights_by_sample_count() {
        let c1 = Vec3::new(5.0, 2.0, 1.0);
        let c2 = Vec3::new(1.0, 1.0, 4.0);
        let image = composite(&[vec![c1, Vec3::ZERO], vec![c2, Vec3::ZERO]], &[vec![10, 0], vec![5, 0]]);

        assert!((image[0] - (c1 + c2) / 15.0).length() < 1e-6);
        assert_eq!(image[1], Vec3::ZERO);
    }

    #[test]
    fn test_composite_devices_single() {
        let out = DeviceOutput {
            output: vec![Vec3::splat(3.0)],
            counts: vec![2],
        };
        assert_eq!(composite_devices(&[out]), vec![Vec3::splat(1.5)]);
        assert!(composite_devices(&[]).is_empty());
    }

    #[test]
    fn test_to_rgba8_gamma_and_clamp() {
        let bytes = to_rgba8(&[Vec3::new(0.25, 4.0, -1.0), Vec3::ONE]);
        assert_eq!(bytes, vec![127, 255, 0, 255, 255, 255, 255, 255]);
    }
}
