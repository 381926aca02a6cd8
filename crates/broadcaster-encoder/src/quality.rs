//! Recording quality presets and CRF targeting.

use broadcaster_media::Resolution;

/// Diagonal (in pixels) at and above which no resolution adjustment applies.
const CROSS_DIST_CUTOFF: f64 = 2000.0;

const CRF_DEFAULT: i32 = 23;
const CRF_HIGH_QUALITY: i32 = 16;

/// Simple-mode recording quality (`SimpleOutput.RecQuality`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingQuality {
    /// Record with the streaming encoder.
    Stream,
    /// Indistinguishable quality, large files.
    Small,
    /// High quality, medium files.
    HighQuality,
    /// Lossless UtVideo/PCM in AVI.
    Lossless,
}

impl RecordingQuality {
    /// Parse a config value; unrecognized values mean the small-file preset.
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            None | Some("Stream") => Self::Stream,
            Some("Lossless") => Self::Lossless,
            Some("HQ") => Self::HighQuality,
            Some(_) => Self::Small,
        }
    }

    pub fn base_crf(self) -> i32 {
        match self {
            Self::HighQuality => CRF_HIGH_QUALITY,
            _ => CRF_DEFAULT,
        }
    }
}

/// CRF target for a recording at `output` resolution.
///
/// Smaller outputs get a lower (better) CRF, by up to 10 steps; low-CPU
/// x264 takes two further steps off the base.
pub fn calc_crf(base: i32, low_cpu: bool, output: Resolution) -> i32 {
    let crf = if low_cpu { base - 2 } else { base };

    let cx = output.width as f64;
    let cy = output.height as f64;
    let cross_dist = (cx * cx + cy * cy).sqrt();
    let reduction = (1.0 - cross_dist.min(CROSS_DIST_CUTOFF) / CROSS_DIST_CUTOFF) * 10.0;

    crf - reduction as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_parsing() {
        assert_eq!(RecordingQuality::from_config(None), RecordingQuality::Stream);
        assert_eq!(RecordingQuality::from_config(Some("HQ")), RecordingQuality::HighQuality);
        assert_eq!(RecordingQuality::from_config(Some("Lossless")), RecordingQuality::Lossless);
        assert_eq!(RecordingQuality::from_config(Some("Small")), RecordingQuality::Small);
        assert_eq!(RecordingQuality::from_config(Some("whatever")), RecordingQuality::Small);
    }

    #[test]
    fn test_crf_no_adjustment_beyond_cutoff() {
        let big = Resolution::new(2560, 1440);
        assert_eq!(calc_crf(23, false, big), 23);
        assert_eq!(calc_crf(16, false, big), 16);
        assert_eq!(calc_crf(16, true, big), 14);
    }

    #[test]
    fn test_crf_at_720p() {
        // diagonal ~1468.6 -> reduction (1 - 0.7343) * 10 = 2.65 -> 2
        assert_eq!(calc_crf(23, false, Resolution::new(1280, 720)), 21);
        assert_eq!(calc_crf(23, false, Resolution::new(0, 0)), 13);
    }

    #[test]
    fn test_crf_monotonic_in_resolution() {
        let mut previous = i32::MIN;
        for width in (0..=4000).step_by(16) {
            let height = width * 9 / 16;
            let crf = calc_crf(23, false, Resolution::new(width, height));
            assert!(crf >= previous, "crf decreased at {width}x{height}");
            previous = crf;
        }
    }

    #[test]
    fn test_low_cpu_is_two_below() {
        for (w, h) in [(640, 360), (1280, 720), (1920, 1080), (3840, 2160)] {
            let res = Resolution::new(w, h);
            for base in [CRF_DEFAULT, CRF_HIGH_QUALITY] {
                assert_eq!(calc_crf(base, true, res), calc_crf(base, false, res) - 2);
            }
        }
    }
}
