//! Quality scoring of a guidance image against its source.
//!
//! - Mismatched dimensions score 0.
//! - A near-uniform candidate scores 0.1 (degenerate output).
//! - Otherwise `0.3 + 0.7 × min(1, E_cand / E_src)`, where `E` is the mean
//!   Sobel magnitude, plus capped bonuses for adaptive, multi-scale and
//!   model-based methods.
use crate::config::QualityConfig;
use crate::edges::mean_magnitude;
use crate::image::ImageF32;

pub const DEGENERATE_SCORE: f32 = 0.1;

#[derive(Clone, Debug, Default)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, source: &ImageF32, candidate: &ImageF32, method: &str) -> f32 {
        if source.w != candidate.w || source.h != candidate.h || candidate.is_empty() {
            return 0.0;
        }
        let (_, std) = candidate.mean_std();
        if std * 255.0 < self.config.uniform_std_threshold {
            return DEGENERATE_SCORE;
        }

        let e_src = mean_magnitude(source);
        let e_cand = mean_magnitude(candidate);
        let detail = if e_src <= f32::EPSILON {
            1.0
        } else {
            (e_cand / e_src).min(1.0)
        };
        let score = 0.3 + 0.7 * detail + self.bonus(method);
        score.clamp(0.0, 1.0)
    }

    fn bonus(&self, method: &str) -> f32 {
        let mut bonus = 0.0;
        if method.contains("adaptive") {
            bonus += self.config.adaptive_bonus;
        }
        if method.contains("multi_scale") {
            bonus += self.config.multi_scale_bonus;
        }
        if ["hed", "pidinet", "ai_"].iter().any(|tag| method.contains(tag)) {
            bonus += self.config.model_bonus;
        }
        bonus.min(self.config.max_bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(n: usize) -> ImageF32 {
        ImageF32::from_fn(n, n, |x, y| ((x / 4 + y / 4) % 2) as f32)
    }

    #[test]
    fn blank_output_is_degenerate() {
        let scorer = QualityScorer::default();
        let blank = ImageF32::new(32, 32);
        assert_eq!(scorer.score(&checker(32), &blank, "adaptive_canny"), DEGENERATE_SCORE);
    }

    #[test]
    fn mismatched_size_scores_zero() {
        let scorer = QualityScorer::default();
        assert_eq!(scorer.score(&checker(32), &checker(16), "opencv_canny"), 0.0);
    }

    #[test]
    fn identical_detail_scores_full_and_bonus_is_capped() {
        let scorer = QualityScorer::default();
        let img = checker(32);
        assert!((scorer.score(&img, &img, "opencv_canny") - 1.0).abs() < 1e-6);
        let weak = img.map(|v| v * 0.2 + 0.4);
        let base = scorer.score(&img, &weak, "opencv_canny");
        let boosted = scorer.score(&img, &weak, "adaptive_multi_scale_hed");
        assert!((boosted - base - 0.1).abs() < 1e-5);
        assert!((0.0..=1.0).contains(&boosted));
    }
}
