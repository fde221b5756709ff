use std::f64::consts::PI;

/// Produces the samples carried in DATA_PACKET frames.
pub trait SampleSource: Send {
    /// Fill `out` with consecutive samples for `channel`, the first taken at
    /// `timestamp` milliseconds.
    fn fill(&mut self, channel: u8, timestamp: u32, out: &mut [i16]);
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn fill(&mut self, channel: u8, timestamp: u32, out: &mut [i16]) {
        (**self).fill(channel, timestamp, out)
    }
}

/// A sine wave with a small amount of deterministic noise on top.
///
/// Sample `i` is `amplitude * sin(2π * frequency * t) + noise` with
/// `t = (timestamp + i) ms`, and noise in `[-noise, noise)`.
#[derive(Debug, Clone, Copy)]
pub struct SineNoise {
    pub amplitude: f64,
    pub frequency_hz: f64,
    pub noise: i32,
}

impl Default for SineNoise {
    fn default() -> Self {
        Self {
            amplitude: 1000.0,
            frequency_hz: 50.0,
            noise: 50,
        }
    }
}

impl SampleSource for SineNoise {
    fn fill(&mut self, channel: u8, timestamp: u32, out: &mut [i16]) {
        for (i, sample) in out.iter_mut().enumerate() {
            let t = (f64::from(timestamp) + i as f64) * 0.001;
            let wave = self.amplitude * (2.0 * PI * self.frequency_hz * t).sin();
            let jitter = noise(timestamp, i as u32, channel, self.noise);
            let value = wave.round() as i32 + jitter;
            *sample = value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        }
    }
}

fn noise(timestamp: u32, index: u32, channel: u8, span: i32) -> i32 {
    if span <= 0 {
        return 0;
    }
    // splitmix64 finalizer
    let mut h = (u64::from(timestamp) << 32) ^ (u64::from(index) << 8) ^ u64::from(channel);
    h = h.wrapping_add(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    (h % (2 * span as u64)) as i32 - span
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_in_band() {
        let mut source = SineNoise::default();
        let mut out = [0i16; 100];
        source.fill(0, 12_345, &mut out);
        assert!(out.iter().all(|&s| (-1050..=1050).contains(&s)));
    }

    #[test]
    fn output_is_deterministic() {
        let mut a = [0i16; 100];
        let mut b = [0i16; 100];
        SineNoise::default().fill(1, 500, &mut a);
        SineNoise::default().fill(1, 500, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn noiseless_wave_matches_formula() {
        let mut source = SineNoise {
            noise: 0,
            ..SineNoise::default()
        };
        let mut out = [0i16; 20];
        source.fill(0, 0, &mut out);
        // 50 Hz sampled at 1 kHz: zero crossings every 10 samples, peak at 5.
        assert_eq!(out[0], 0);
        assert_eq!(out[5], 1000);
        assert_eq!(out[15], -1000);
    }

    #[test]
    fn channels_get_different_noise() {
        let mut a = [0i16; 100];
        let mut b = [0i16; 100];
        SineNoise::default().fill(0, 77, &mut a);
        SineNoise::default().fill(1, 77, &mut b);
        assert_ne!(a, b);
    }
}
