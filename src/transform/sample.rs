use crate::error::TrajError;
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;

/// Which frames of a trajectory to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every n-th frame, starting with the first.
    Stride(NonZeroUsize),
    /// Explicit frame indices; indices past the end are ignored.
    Indices(Vec<usize>),
    /// `n` distinct frames drawn uniformly, reproducible with a seed.
    Random { n: usize, seed: Option<u64> },
}

impl Selection {
    /// Resolves the selection against a trajectory of `total` frames.
    pub fn resolve(&self, total: usize) -> Result<BTreeSet<usize>, TrajError> {
        match self {
            Selection::Stride(stride) => Ok((0..total).step_by(stride.get()).collect()),
            Selection::Indices(indices) => {
                let (kept, ignored): (BTreeSet<usize>, BTreeSet<usize>) =
                    indices.iter().partition(|&&i| i < total);
                if !ignored.is_empty() {
                    warn!("ignoring frame indices {ignored:?}, the trajectory has {total} frames");
                }
                Ok(kept)
            }
            Selection::Random { n, seed } => {
                if *n > total {
                    return Err(TrajError::InvalidArgument(format!(
                        "cannot select {n} frames out of {total}"
                    )));
                }
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(*seed),
                    None => StdRng::from_entropy(),
                };
                Ok(rand::seq::index::sample(&mut rng, total, *n)
                    .into_iter()
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride() {
        let selection = Selection::Stride(NonZeroUsize::new(3).unwrap());
        assert_eq!(selection.resolve(7).unwrap(), BTreeSet::from([0, 3, 6]));
        assert!(selection.resolve(0).unwrap().is_empty());
    }

    #[test]
    fn indices() {
        let selection = Selection::Indices(vec![2, 0, 2, 9]);
        assert_eq!(selection.resolve(3).unwrap(), BTreeSet::from([0, 2]));
    }

    #[test]
    fn random() {
        let all = Selection::Random { n: 5, seed: None };
        assert_eq!(all.resolve(5).unwrap(), (0..5).collect());

        let seeded = Selection::Random { n: 4, seed: Some(42) };
        let picked = seeded.resolve(100).unwrap();
        assert_eq!(picked.len(), 4);
        assert_eq!(picked, seeded.resolve(100).unwrap());
        assert!(picked.iter().all(|&i| i < 100));

        let too_many = Selection::Random { n: 6, seed: None };
        assert!(matches!(too_many.resolve(5), Err(TrajError::InvalidArgument(_))));
    }
}
