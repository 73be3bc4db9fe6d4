use std::path::PathBuf;

use anyhow::{Context as _, ensure};
use clap::Args;
use rand::{Rng, SeedableRng as _};
use rand_distr::{Distribution as _, Exp};
use rand_pcg::Pcg64;

use crate::{schema::record::SubjectRecord, util::Output};

#[derive(Debug, Clone, Args)]
pub(crate) struct SimulateArg {
    /// Number of subjects in each group (comma-separated)
    #[arg(long, value_delimiter = ',', default_values_t = [250, 200])]
    groups: Vec<usize>,
    /// Event rate of each group, or a single rate shared by all groups
    #[arg(long, value_delimiter = ',', default_values_t = [0.1])]
    rate: Vec<f64>,
    /// Rate of exponential censoring; 0 disables censoring
    #[arg(long, default_value_t = 0.05)]
    censor_rate: f64,
    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl SimulateArg {
    fn group_rates(&self) -> anyhow::Result<Vec<f64>> {
        let rates = match self.rate.as_slice() {
            [rate] => vec![*rate; self.groups.len()],
            rates if rates.len() == self.groups.len() => rates.to_vec(),
            rates => anyhow::bail!(
                "Expected 1 or {} rates, got {}",
                self.groups.len(),
                rates.len()
            ),
        };
        if let Some(rate) = rates.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            anyhow::bail!("Event rates must be positive, got {rate}");
        }
        Ok(rates)
    }
}

/// Draws `size` exponential lifetimes, censored by an independent exponential
/// clock when `censoring` is given.
fn simulate_group<R>(
    rng: &mut R,
    group: &str,
    size: usize,
    lifetime: &Exp<f64>,
    censoring: Option<&Exp<f64>>,
) -> Vec<SubjectRecord>
where
    R: Rng + ?Sized,
{
    (0..size)
        .map(|_| {
            let time = lifetime.sample(rng);
            let censor = censoring.map_or(f64::INFINITY, |c| c.sample(rng));
            SubjectRecord {
                duration: time.min(censor),
                event: time <= censor,
                entry: None,
                group: Some(group.to_owned()),
            }
        })
        .collect()
}

pub(crate) fn run(arg: &SimulateArg) -> anyhow::Result<()> {
    let rates = arg.group_rates()?;
    ensure!(
        arg.censor_rate.is_finite() && arg.censor_rate >= 0.0,
        "Censoring rate must be non-negative, got {}",
        arg.censor_rate
    );
    let censoring = if arg.censor_rate > 0.0 {
        Some(Exp::new(arg.censor_rate).context("Invalid censoring rate")?)
    } else {
        None
    };

    let mut rng = Pcg64::seed_from_u64(arg.seed);
    let mut records = Vec::with_capacity(arg.groups.iter().sum());
    for (i, (&size, &rate)) in arg.groups.iter().zip(&rates).enumerate() {
        let lifetime = Exp::new(rate).with_context(|| format!("Invalid event rate: {rate}"))?;
        let group = simulate_group(&mut rng, &i.to_string(), size, &lifetime, censoring.as_ref());
        let events = group.iter().filter(|r| r.event).count();
        eprintln!("Group {i}: {size} subjects, rate {rate}, {events} events");
        records.extend(group);
    }

    Output::save_json(&records, arg.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(groups: Vec<usize>, rate: Vec<f64>) -> SimulateArg {
        SimulateArg {
            groups,
            rate,
            censor_rate: 0.05,
            seed: 0,
            output: None,
        }
    }

    #[test]
    fn test_group_rates() {
        assert_eq!(arg(vec![3, 4], vec![0.2]).group_rates().unwrap(), [0.2, 0.2]);
        assert_eq!(
            arg(vec![3, 4], vec![0.2, 0.5]).group_rates().unwrap(),
            [0.2, 0.5]
        );
        assert!(arg(vec![3, 4], vec![0.2, 0.5, 0.1]).group_rates().is_err());
        assert!(arg(vec![3], vec![0.0]).group_rates().is_err());
    }

    #[test]
    fn test_simulated_records() {
        let mut rng = Pcg64::seed_from_u64(5);
        let lifetime = Exp::new(1.0).unwrap();
        let uncensored = simulate_group(&mut rng, "a", 50, &lifetime, None);
        assert_eq!(uncensored.len(), 50);
        assert!(uncensored.iter().all(|r| r.event && r.duration >= 0.0));
        assert!(uncensored.iter().all(|r| r.group.as_deref() == Some("a")));

        let censoring = Exp::new(10.0).unwrap();
        let censored = simulate_group(&mut rng, "b", 200, &lifetime, Some(&censoring));
        let events = censored.iter().filter(|r| r.event).count();
        // P(event) = 1 / 11.
        assert!(events < 60, "{events} events");
    }
}
