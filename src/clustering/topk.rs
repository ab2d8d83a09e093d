use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<I, F> {
    id: I,
    score: F,
}

impl<I, F: PartialOrd> PartialEq for Entry<I, F> {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl<I, F: PartialOrd> Eq for Entry<I, F> {}

impl<I, F: PartialOrd> PartialOrd for Entry<I, F> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I, F: PartialOrd> Ord for Entry<I, F> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.partial_cmp(&other.score).unwrap_or(Ordering::Equal)
    }
}

/// Fixed-capacity best-k selector over (id, score) pairs, smaller score is
/// better. Backed by a bounded max-heap keyed on score, so the current worst
/// sits on top: insertions cost O(log k), appropriate since k is far smaller
/// than the number of candidate centers scanned in the soft-assignment path.
pub struct TopK<I, F> {
    k: usize,
    heap: BinaryHeap<Entry<I, F>>,
}

impl<I, F: PartialOrd> TopK<I, F> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1)),
        }
    }

    /// Under capacity the pair is always kept; at capacity it replaces the
    /// current worst only if strictly better.
    pub fn insert(&mut self, id: I, score: F) {
        if self.heap.len() < self.k {
            self.heap.push(Entry { id, score });
        } else if let Some(worst) = self.heap.peek() {
            if score < worst.score {
                self.heap.pop();
                self.heap.push(Entry { id, score });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drains into an ascending (best-first) sequence, consuming the selector.
    pub fn finalize(self) -> Vec<(I, F)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| (entry.id, entry.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_best_k_ascending() {
        let mut topk: TopK<usize, f64> = TopK::new(3);
        for (id, score) in [(0, 5.0), (1, 1.0), (2, 4.0), (3, 2.0), (4, 3.0)] {
            topk.insert(id, score);
        }

        let result = topk.finalize();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], (1, 1.0));
        assert_eq!(result[1], (3, 2.0));
        assert_eq!(result[2], (4, 3.0));
    }

    #[test]
    fn test_under_capacity_returns_all_inserted() {
        let mut topk: TopK<usize, f64> = TopK::new(10);
        topk.insert(7, 2.0);
        topk.insert(3, 1.0);

        let result = topk.finalize();
        assert_eq!(result, vec![(3, 1.0), (7, 2.0)]);
    }

    #[test]
    fn test_equal_score_does_not_replace() {
        let mut topk: TopK<usize, f64> = TopK::new(1);
        topk.insert(0, 5.0);
        topk.insert(1, 5.0);

        assert_eq!(topk.finalize(), vec![(0, 5.0)]);
    }

    #[test]
    fn test_every_kept_score_beats_every_discarded() {
        let mut topk: TopK<usize, f64> = TopK::new(4);
        let scores: Vec<f64> = (0..20).map(|i| ((i * 7) % 20) as f64).collect();
        for (id, &score) in scores.iter().enumerate() {
            topk.insert(id, score);
        }

        let kept = topk.finalize();
        assert_eq!(kept.len(), 4);
        let worst_kept = kept.last().unwrap().1;
        let discarded_best = scores
            .iter()
            .enumerate()
            .filter(|(id, _)| !kept.iter().any(|&(kid, _)| kid == *id))
            .map(|(_, &s)| s)
            .fold(f64::INFINITY, f64::min);
        assert!(worst_kept <= discarded_best);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut topk: TopK<usize, f64> = TopK::new(0);
        topk.insert(0, 1.0);

        assert!(topk.is_empty());
        assert!(topk.finalize().is_empty());
    }
}
