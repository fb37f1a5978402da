//! Candidate enumeration and evaluation shared by every search mode

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::Result;
use crate::regimen::RegimenEffect;
use crate::simulator::tumor::Trajectory;

/// Every admissible combination of one option per slot, depth first
///
/// `options[i]` lists the choices for slot `i`. A choice rejected by
/// `admissible` is never extended, so nothing below it is visited. The
/// combinations come out in lexicographic order of option indices, and the
/// second value is the number of rejected choices.
pub(crate) fn enumerate<O, F>(options: &[Vec<O>], admissible: F) -> (Vec<Vec<O>>, usize)
where
    O: Clone,
    F: Fn(usize, &O) -> bool,
{
    let mut combinations = Vec::new();
    let mut pruned = 0;
    if options.is_empty() {
        return (combinations, pruned);
    }

    let mut path: Vec<usize> = Vec::with_capacity(options.len());
    let mut next: Vec<usize> = vec![0];
    while let Some(top) = next.last_mut() {
        let depth = next.len() - 1;
        if *top >= options[depth].len() {
            next.pop();
            path.pop();
            continue;
        }
        let index = *top;
        *top += 1;

        if !admissible(depth, &options[depth][index]) {
            pruned += 1;
            continue;
        }
        if depth + 1 == options.len() {
            let combination = path
                .iter()
                .enumerate()
                .map(|(slot, &i)| options[slot][i].clone())
                .chain(std::iter::once(options[depth][index].clone()))
                .collect();
            combinations.push(combination);
        } else {
            path.push(index);
            next.push(0);
        }
    }
    (combinations, pruned)
}

/// The winning candidate of [`evaluate`]
#[derive(Debug, Clone)]
pub(crate) struct Best {
    pub index: usize,
    pub score: f64,
    pub effect: RegimenEffect,
    pub trajectory: Trajectory,
}

pub(crate) struct Evaluation {
    pub best: Option<Best>,
    pub evaluated: usize,
    pub truncated: bool,
}

/// Lower score wins, then the earlier candidate
fn better(a: Best, b: Best) -> Best {
    match a.score.total_cmp(&b.score).then(a.index.cmp(&b.index)) {
        std::cmp::Ordering::Greater => b,
        _ => a,
    }
}

/// Simulate every candidate and keep the best one
///
/// `simulate` returns the effect and trajectory of a candidate, `score` rates a
/// trajectory. The result does not depend on `parallel`. Candidates not started
/// before `deadline` are skipped and the evaluation is marked truncated. The
/// first error aborts the evaluation.
pub(crate) fn evaluate<C, S, F>(
    candidates: &[C],
    parallel: bool,
    deadline: Option<Instant>,
    simulate: S,
    score: F,
) -> Result<Evaluation>
where
    C: Sync,
    S: Fn(&C) -> Result<(RegimenEffect, Trajectory)> + Sync,
    F: Fn(&Trajectory) -> f64 + Sync,
{
    let evaluated = AtomicUsize::new(0);
    let truncated = AtomicBool::new(false);

    let run = |index: usize, candidate: &C| -> Result<Option<Best>> {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                truncated.store(true, Ordering::Relaxed);
                return Ok(None);
            }
        }
        let (effect, trajectory) = simulate(candidate)?;
        evaluated.fetch_add(1, Ordering::Relaxed);
        let score = score(&trajectory);
        tracing::debug!("Candidate {}: score {:.6}", index, score);
        Ok(Some(Best {
            index,
            score,
            effect,
            trajectory,
        }))
    };

    let best = if parallel {
        candidates
            .par_iter()
            .enumerate()
            .map(|(index, candidate)| run(index, candidate))
            .try_reduce(
                || None,
                |a, b| {
                    Ok(match (a, b) {
                        (Some(a), Some(b)) => Some(better(a, b)),
                        (a, None) => a,
                        (None, b) => b,
                    })
                },
            )?
    } else {
        let mut incumbent: Option<Best> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if let Some(challenger) = run(index, candidate)? {
                incumbent = Some(match incumbent {
                    Some(current) => better(current, challenger),
                    None => challenger,
                });
            }
        }
        incumbent
    };

    Ok(Evaluation {
        best,
        evaluated: evaluated.into_inner(),
        truncated: truncated.into_inner(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OncoError;
    use crate::simulator::tumor::Components;

    fn flat(volume: f64) -> Trajectory {
        Trajectory {
            time: vec![0.0, 1.0],
            volume: vec![1.0, volume],
            components: Components::NoResistance {
                viable: vec![1.0, volume],
                necrotic: vec![0.0, 0.0],
            },
        }
    }

    #[test]
    fn enumeration_is_lexicographic() {
        let options = vec![vec![1, 2], vec![10, 20, 30]];
        let (combinations, pruned) = enumerate(&options, |_, _| true);
        assert_eq!(pruned, 0);
        assert_eq!(
            combinations,
            vec![
                vec![1, 10],
                vec![1, 20],
                vec![1, 30],
                vec![2, 10],
                vec![2, 20],
                vec![2, 30]
            ]
        );
    }

    #[test]
    fn pruned_choices_are_not_extended() {
        let options = vec![vec![1, 2, 3], vec![10, 20]];
        let (combinations, pruned) =
            enumerate(&options, |depth, &o| !(depth == 0 && o == 2) && o != 20);
        assert_eq!(combinations, vec![vec![1, 10], vec![3, 10]]);
        // 2 at depth 0, then 20 under 1 and under 3
        assert_eq!(pruned, 3);

        let (none, _) = enumerate(&options, |depth, _| depth != 1);
        assert!(none.is_empty());
        let (empty, _) = enumerate::<i32, _>(&[], |_, _| true);
        assert!(empty.is_empty());
    }

    #[test]
    fn ties_keep_the_first_candidate_in_both_modes() {
        let volumes = vec![5.0, 2.0, 3.0, 2.0, 2.0, 9.0];
        for parallel in [false, true] {
            let evaluation = evaluate(
                &volumes,
                parallel,
                None,
                |&v| Ok((RegimenEffect::default(), flat(v))),
                |t| t.final_volume(),
            )
            .unwrap();
            let best = evaluation.best.unwrap();
            assert_eq!(best.index, 1);
            assert_eq!(best.score, 2.0);
            assert_eq!(evaluation.evaluated, 6);
            assert!(!evaluation.truncated);
        }
    }

    #[test]
    fn expired_deadline_skips_everything() {
        let volumes = vec![1.0, 2.0];
        let evaluation = evaluate(
            &volumes,
            false,
            Some(Instant::now()),
            |&v| Ok((RegimenEffect::default(), flat(v))),
            |t| t.final_volume(),
        )
        .unwrap();
        assert!(evaluation.best.is_none());
        assert!(evaluation.truncated);
        assert_eq!(evaluation.evaluated, 0);
    }

    #[test]
    fn errors_propagate() {
        let volumes = vec![1.0, -1.0];
        let result = evaluate(
            &volumes,
            true,
            None,
            |&v| {
                if v < 0.0 {
                    Err(OncoError::IntegrationFailure {
                        time: 0.0,
                        reason: "negative".into(),
                    })
                } else {
                    Ok((RegimenEffect::default(), flat(v)))
                }
            },
            |t| t.final_volume(),
        );
        assert!(result.is_err());
    }
}
