use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};
use human_repr::{HumanCount, HumanDuration, HumanThroughput};
use tracing::info;

use hashaudit_core::{
    Algorithm, AttackConfig, Benchmark as AlgorithmBenchmark, EngineConfigBuilder, Feasibility,
};

use crate::Benchmark;

pub fn benchmark(bench: Benchmark) -> Result<()> {
    let algorithms = if bench.algorithms.is_empty() {
        Algorithm::all().collect()
    } else {
        bench
            .algorithms
            .iter()
            .map(|name| name.parse::<Algorithm>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid algorithm")?
    };

    let mut builder = EngineConfigBuilder::new();
    if let Some(workers) = bench.workers {
        builder = builder.workers(workers as usize);
    }
    let config = builder.build().context("Invalid engine settings")?;

    let candidates = match &bench.mask {
        Some(pattern) => {
            let attack = AttackConfig::Mask {
                pattern: pattern.clone(),
                min_length: bench.min_length,
                max_length: bench.max_length,
            };

            let count = attack
                .candidate_count(&config)
                .context("Invalid mask")?
                .context("The mask space is too large")?;

            info!(
                "The mask {pattern} holds {} candidates, estimated on {} worker(s)",
                count.human_count_bare(),
                config.workers
            );
            Some(count)
        }
        None => None,
    };

    let min_duration = Duration::from_millis(bench.duration);

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);

    let mut header = vec!["Algorithm", "Rate (1 thread)"];
    if candidates.is_some() {
        header.extend(["Exhaustive search", "Feasibility"]);
    }
    display_table.set_header(header);

    for algorithm in algorithms {
        let work_factor = match algorithm {
            Algorithm::Bcrypt => bench.bcrypt_cost,
            Algorithm::Pbkdf2 => bench.pbkdf2_iterations,
            Algorithm::Digest(_) => None,
        };

        info!("Benchmarking {algorithm}");
        let result = AlgorithmBenchmark::algorithm(algorithm, work_factor, min_duration)
            .with_context(|| format!("Unable to benchmark {algorithm}"))?;

        let mut row = vec![
            Cell::new(algorithm),
            Cell::new(result.rate().human_throughput("H")),
        ];

        if let Some(candidates) = candidates {
            let estimate = result.estimate(candidates, config.workers);

            let duration = estimate
                .duration
                .map(|duration| duration.human_duration().to_string())
                .unwrap_or_else(|| "never".to_owned());

            let color = match estimate.feasibility {
                Feasibility::Immediate | Feasibility::VeryQuick | Feasibility::Quick => Color::Red,
                Feasibility::Moderate | Feasibility::Slow => Color::Yellow,
                Feasibility::VerySlow | Feasibility::Impractical => Color::Green,
            };

            row.push(Cell::new(duration));
            row.push(Cell::new(estimate.feasibility).fg(color));
        }

        display_table.add_row(row);
    }

    println!("{display_table}");

    Ok(())
}
