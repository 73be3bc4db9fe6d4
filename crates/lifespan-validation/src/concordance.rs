//! Harrell's concordance index for risk scores.

use crate::CrossValidationError;

/// Fraction of comparable pairs whose risk scores are ordered correctly.
///
/// A pair `(i, j)` is comparable when `durations[i] < durations[j]` and
/// subject `i` had an observed event. It is concordant when
/// `risks[i] > risks[j]` (the subject that failed first was rated riskier)
/// and counts one half when the risks are tied. Pairs with tied durations
/// are never comparable.
///
/// A score of 1 means a perfect ranking, 0.5 is no better than chance.
///
/// # Errors
///
/// Returns [`CrossValidationError::LengthMismatch`] if the three slices
/// differ in length and [`CrossValidationError::NoComparablePairs`] if no pair
/// is comparable.
///
/// # Examples
///
/// ```
/// # use lifespan_validation::concordance::concordance_index;
/// let durations = [1.0, 2.0, 3.0];
/// let events = [true, true, false];
///
/// let perfect = concordance_index(&durations, &events, &[3.0, 2.0, 1.0]).unwrap();
/// assert_eq!(perfect, 1.0);
///
/// let reversed = concordance_index(&durations, &events, &[1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(reversed, 0.0);
///
/// let tied = concordance_index(&durations, &events, &[1.0, 1.0, 1.0]).unwrap();
/// assert_eq!(tied, 0.5);
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn concordance_index(
    durations: &[f64],
    events: &[bool],
    risks: &[f64],
) -> Result<f64, CrossValidationError> {
    if durations.len() != events.len() || durations.len() != risks.len() {
        return Err(CrossValidationError::length_mismatch(format!(
            "{} durations, {} events and {} risk scores",
            durations.len(),
            events.len(),
            risks.len()
        )));
    }

    // Counted in halves so ties stay exact.
    let mut concordant_halves = 0u64;
    let mut comparable = 0u64;
    for (i, (&d_i, &r_i)) in durations.iter().zip(risks).enumerate() {
        if !events[i] {
            continue;
        }
        for (&d_j, &r_j) in durations.iter().zip(risks) {
            if d_i >= d_j {
                continue;
            }
            comparable += 1;
            if r_i > r_j {
                concordant_halves += 2;
            } else if r_i == r_j {
                concordant_halves += 1;
            }
        }
    }

    if comparable == 0 {
        return Err(CrossValidationError::NoComparablePairs);
    }
    Ok(concordant_halves as f64 / (2 * comparable) as f64)
}
