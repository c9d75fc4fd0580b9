//! Greedy per-class non-maximum suppression.
//!
//! Within a class, candidates are visited by descending score with ties broken
//! by ascending raw index. Each visited candidate is kept and suppresses every
//! later one whose IoU with it is strictly greater than the threshold. Classes
//! never suppress each other and are emitted in ascending class id order.

use crate::processing::decode::Candidate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub fn per_class(candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    let mut by_class: BTreeMap<u32, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        by_class.entry(candidate.class_id).or_default().push(candidate);
    }

    let mut kept = Vec::new();
    for (_, mut group) in by_class {
        group.sort_by(by_score_then_index);
        suppress(&group, iou_threshold, &mut kept);
    }
    kept
}

/// Descending score, then ascending raw index.
fn by_score_then_index(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.index.cmp(&b.index))
}

fn suppress(sorted: &[Candidate], iou_threshold: f32, kept: &mut Vec<Candidate>) {
    let mut suppressed = vec![false; sorted.len()];

    for i in 0..sorted.len() {
        if suppressed[i] {
            continue;
        }
        let current = sorted[i];
        kept.push(current);

        for j in (i + 1)..sorted.len() {
            if !suppressed[j] && current.bbox.iou(&sorted[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preprocess::BoundingBox;

    fn candidate(index: usize, class_id: u32, score: f32, bbox: [f32; 4]) -> Candidate {
        Candidate {
            index,
            class_id,
            score,
            bbox: BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        }
    }

    #[test]
    fn test_overlapping_same_class_keeps_higher_score() {
        let kept = per_class(
            vec![
                candidate(0, 0, 0.6, [0.0, 0.0, 10.0, 10.0]),
                candidate(1, 0, 0.9, [1.0, 1.0, 11.0, 11.0]),
            ],
            0.5,
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 1);
    }

    #[test]
    fn test_overlapping_different_classes_both_survive() {
        let kept = per_class(
            vec![
                candidate(0, 0, 0.6, [0.0, 0.0, 10.0, 10.0]),
                candidate(1, 1, 0.9, [0.0, 0.0, 10.0, 10.0]),
            ],
            0.5,
        );

        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_iou_equal_to_threshold_is_not_suppressed() {
        // IoU = 50 / 150 = 1/3
        let a = candidate(0, 0, 0.9, [0.0, 0.0, 10.0, 10.0]);
        let b = candidate(1, 0, 0.8, [5.0, 0.0, 15.0, 10.0]);
        let iou = a.bbox.iou(&b.bbox);

        assert_eq!(per_class(vec![a, b], iou).len(), 2);
        assert_eq!(per_class(vec![a, b], iou - 1e-3).len(), 1);
    }

    #[test]
    fn test_score_ties_broken_by_raw_index() {
        let kept = per_class(
            vec![
                candidate(7, 0, 0.8, [0.0, 0.0, 10.0, 10.0]),
                candidate(3, 0, 0.8, [0.0, 0.0, 10.0, 10.0]),
                candidate(5, 0, 0.8, [0.0, 0.0, 10.0, 10.0]),
            ],
            0.5,
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 3);
    }

    #[test]
    fn test_output_ordered_by_class_then_score() {
        let kept = per_class(
            vec![
                candidate(0, 2, 0.70, [0.0, 0.0, 10.0, 10.0]),
                candidate(1, 0, 0.60, [100.0, 100.0, 110.0, 110.0]),
                candidate(2, 2, 0.95, [50.0, 50.0, 60.0, 60.0]),
                candidate(3, 0, 0.90, [0.0, 0.0, 10.0, 10.0]),
                candidate(4, 1, 0.50, [0.0, 0.0, 10.0, 10.0]),
            ],
            0.5,
        );

        let order: Vec<(u32, usize)> = kept.iter().map(|c| (c.class_id, c.index)).collect();
        assert_eq!(order, vec![(0, 3), (0, 1), (1, 4), (2, 2), (2, 0)]);
    }

    #[test]
    fn test_suppressed_candidate_does_not_suppress_others() {
        // B overlaps A and C; A does not overlap C. B is removed by A, so C survives.
        let a = candidate(0, 0, 0.9, [0.0, 0.0, 10.0, 10.0]);
        let b = candidate(1, 0, 0.8, [4.0, 0.0, 14.0, 10.0]);
        let c = candidate(2, 0, 0.7, [8.0, 0.0, 18.0, 10.0]);

        let kept = per_class(vec![a, b, c], 0.3);
        let indices: Vec<usize> = kept.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(per_class(Vec::new(), 0.5).is_empty());
    }
}
