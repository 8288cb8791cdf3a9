//! Divisor-based batch sizing.
//!
//! The batch count grows with the decimal magnitude of the dataset: a dataset of
//! `n` items is cut into roughly `d^(digits(n) - 1)` batches, where `d` is the
//! least divisor of `n` greater than one. Single-digit datasets form one batch.

use serde::Serialize;

use crate::core::errors::PipelineError;

/// Batch layout derived for one dataset length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    pub dataset_size: usize,
    /// Least divisor found by the search (after the prime retry).
    pub least_divisor: usize,
    pub exponent: u32,
    pub divisor: usize,
    pub batch_size: usize,
    /// `dataset_size % divisor`.
    pub remainder: usize,
}

impl BatchPlan {
    /// Plan with a caller-chosen batch size instead of the divisor search.
    pub fn fixed(dataset_size: usize, batch_size: usize) -> Result<Self, PipelineError> {
        if dataset_size == 0 {
            return Err(PipelineError::invalid("dataset size must be positive"));
        }
        if batch_size == 0 {
            return Err(PipelineError::invalid("batch size must be positive"));
        }
        let batch_size = batch_size.min(dataset_size);
        Ok(Self {
            dataset_size,
            least_divisor: 1,
            exponent: 0,
            divisor: dataset_size / batch_size,
            batch_size,
            remainder: dataset_size % batch_size,
        })
    }

    /// Number of batches the splitter will yield for this plan.
    pub fn batch_count(&self) -> usize {
        self.dataset_size.div_ceil(self.batch_size)
    }

    /// Length of the trailing batch.
    pub fn last_batch_len(&self) -> usize {
        match self.dataset_size % self.batch_size {
            0 => self.batch_size,
            tail => tail,
        }
    }
}

/// Least integer `d > 1` dividing both some `i` in `1..=n` and `n` itself.
///
/// The first `i > 1` dividing `n` is its smallest prime factor, so the search
/// reduces to trial division. Returns `None` for `n < 2`.
pub fn least_common_divisor(n: usize) -> Option<usize> {
    if n < 2 {
        return None;
    }
    if n % 2 == 0 {
        return Some(2);
    }
    let mut candidate = 3usize;
    while candidate <= n / candidate {
        if n % candidate == 0 {
            return Some(candidate);
        }
        candidate += 2;
    }
    Some(n)
}

pub fn digit_count(n: usize) -> u32 {
    n.checked_ilog10().map_or(1, |log| log + 1)
}

/// Derive the batch plan for a dataset of `n` items.
pub fn plan_batches(n: usize) -> Result<BatchPlan, PipelineError> {
    if n == 0 {
        return Err(PipelineError::invalid("dataset size must be positive"));
    }

    // A prime length divides only by itself, so search its predecessor instead.
    let least_divisor = match least_common_divisor(n) {
        Some(d) if d == n => least_common_divisor(n - 1),
        found => found,
    }
    .unwrap_or(1);

    let exponent = digit_count(n) - 1;
    let divisor = least_divisor.checked_pow(exponent).unwrap_or(usize::MAX);
    let batch_size = (n / divisor).clamp(1, n);

    Ok(BatchPlan {
        dataset_size: n,
        least_divisor,
        exponent,
        divisor,
        batch_size,
        remainder: n % divisor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Literal nested-loop divisor search, kept as the golden reference.
    fn reference_least_common_divisor(num: usize) -> Option<usize> {
        for i in 1..=num {
            if num % i == 0 {
                for divisor in 2..=i {
                    if i % divisor == 0 && num % divisor == 0 {
                        return Some(divisor);
                    }
                }
            }
        }
        None
    }

    #[test]
    fn divisor_search_matches_reference() {
        for n in 1..=2000 {
            assert_eq!(
                least_common_divisor(n),
                reference_least_common_divisor(n),
                "divergence at n={n}"
            );
        }
    }

    #[test]
    fn digit_counts() {
        assert_eq!(digit_count(1), 1);
        assert_eq!(digit_count(9), 1);
        assert_eq!(digit_count(10), 2);
        assert_eq!(digit_count(999), 3);
        assert_eq!(digit_count(1000), 4);
    }

    #[test]
    fn golden_plans() {
        let cases = [
            // (n, least divisor, exponent, divisor, batch size, remainder)
            (1, 1, 0, 1, 1, 0),
            (2, 1, 0, 1, 2, 0),
            (7, 2, 0, 1, 7, 0),
            (10, 2, 1, 2, 5, 0),
            (11, 2, 1, 2, 5, 1),
            (15, 3, 1, 3, 5, 0),
            (97, 2, 1, 2, 48, 1),
            (100, 2, 2, 4, 25, 0),
            (1000, 2, 3, 8, 125, 0),
            (1001, 7, 3, 343, 2, 315),
        ];
        for (n, d, exp, divisor, batch, rem) in cases {
            let plan = plan_batches(n).unwrap();
            assert_eq!(plan.least_divisor, d, "least divisor for n={n}");
            assert_eq!(plan.exponent, exp, "exponent for n={n}");
            assert_eq!(plan.divisor, divisor, "divisor for n={n}");
            assert_eq!(plan.batch_size, batch, "batch size for n={n}");
            assert_eq!(plan.remainder, rem, "remainder for n={n}");
        }
    }

    #[test]
    fn zero_is_invalid() {
        assert!(matches!(
            plan_batches(0),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn batch_size_stays_within_bounds() {
        // 9797 = 97 * 101: 97^3 exceeds n, so the quotient would be zero.
        for n in (1..=3000).chain([9797, 10_007, 123_457, 1_000_000]) {
            let plan = plan_batches(n).unwrap();
            assert!(plan.batch_size >= 1 && plan.batch_size <= n, "n={n}");
            assert_eq!(
                plan.batch_size * (plan.batch_count() - 1) + plan.last_batch_len(),
                n
            );
        }
    }

    #[test]
    fn fixed_plan_clamps_to_dataset() {
        let plan = BatchPlan::fixed(7, 3).unwrap();
        assert_eq!(plan.batch_count(), 3);
        assert_eq!(plan.last_batch_len(), 1);

        let plan = BatchPlan::fixed(4, 10).unwrap();
        assert_eq!(plan.batch_size, 4);
        assert_eq!(plan.batch_count(), 1);

        assert!(BatchPlan::fixed(4, 0).is_err());
    }
}
