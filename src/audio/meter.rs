use super::Frame;

/// Root-mean-square loudness of a frame, in raw sample units.
///
/// Returns 0.0 for an empty frame.
pub fn rms(frame: &Frame) -> f64 {
    rms_samples(frame.samples())
}

pub(crate) fn rms_samples(samples: impl Iterator<Item = i16>) -> f64 {
    let mut count = 0usize;
    let mut energy = 0.0f64;
    for sample in samples {
        let value = f64::from(sample);
        energy += value * value;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (energy / count as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_handles_empty() {
        assert_eq!(rms(&Frame::default()), 0.0);
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&Frame::from_samples(&[0; 2048])), 0.0);
    }

    #[test]
    fn rms_of_constant_magnitude_is_that_magnitude() {
        let frame = Frame::from_samples(&[1000, -1000, 1000, -1000]);
        assert!((rms(&frame) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn rms_is_never_negative() {
        let samples: Vec<i16> = (0..512).map(|i| if i % 2 == 0 { i16::MIN } else { -7 }).collect();
        assert!(rms(&Frame::from_samples(&samples)) >= 0.0);
    }

    #[test]
    fn rms_of_full_scale_does_not_overflow() {
        let frame = Frame::from_samples(&[i16::MIN; 4096]);
        assert!((rms(&frame) - 32_768.0).abs() < 1e-6);
    }
}
