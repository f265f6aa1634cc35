//! Uniform frame sampling

/// Pick up to `sequence_length` frame indices spread across `total_frames`
///
/// Index `i` maps to `floor(i * total / length)`, so the first sample is
/// always frame 0 and the stride is `total / length`. When the clip has no
/// more frames than requested, every frame is used.
pub fn sample_indices(total_frames: usize, sequence_length: usize) -> Vec<usize> {
    if total_frames == 0 || sequence_length == 0 {
        return Vec::new();
    }
    if sequence_length >= total_frames {
        return (0..total_frames).collect();
    }
    (0..sequence_length)
        .map(|i| i * total_frames / sequence_length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_count_when_enough_frames() {
        for &(total, length) in &[(300, 10), (300, 100), (101, 100), (20, 20)] {
            let indices = sample_indices(total, length);
            assert_eq!(indices.len(), length);
            assert_eq!(indices[0], 0);
            assert!(indices.windows(2).all(|w| w[0] < w[1]));
            assert!(*indices.last().unwrap() < total);
        }
    }

    #[test]
    fn test_short_clip_uses_every_frame() {
        assert_eq!(sample_indices(7, 20), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(sample_indices(1, 100), vec![0]);
    }

    #[test]
    fn test_stride() {
        assert_eq!(sample_indices(100, 10), vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[test]
    fn test_empty() {
        assert!(sample_indices(0, 10).is_empty());
    }
}
