use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};
use human_repr::{HumanCount, HumanDuration, HumanThroughput};
use tracing::info;

use hashaudit_core::{
    AttackConfig, CrackResult, EngineConfig, Event, FileWordlist, HashTarget, HashVerifier,
    HybridOptions, ProgressSnapshot, RuleEngine, WorkScheduler,
};

use crate::{Dictionary, Engine, Hybrid, Mask, Target};

pub fn dictionary(dict: Dictionary) -> Result<()> {
    let rules = if dict.no_rules {
        None
    } else if dict.rules.is_empty() {
        Some(RuleEngine::default().dedup(dict.dedup))
    } else {
        Some(
            RuleEngine::from_names(&dict.rules)
                .context("Invalid rule list")?
                .dedup(dict.dedup),
        )
    };

    let attack = AttackConfig::Dictionary {
        source: Arc::new(FileWordlist::new(&dict.wordlist).encoding(dict.encoding.into())),
        rules,
    };

    run(&dict.target, &dict.engine, attack)
}

pub fn mask(mask: Mask) -> Result<()> {
    let attack = AttackConfig::Mask {
        pattern: mask.pattern,
        min_length: mask.min_length,
        max_length: mask.max_length,
    };

    run(&mask.target, &mask.engine, attack)
}

pub fn hybrid(hyb: Hybrid) -> Result<()> {
    let mut options = HybridOptions {
        order: hyb.order.into(),
        insertion_points: hyb.insertion_points.into_iter().map(Into::into).collect(),
        ..Default::default()
    };

    if !hyb.rules.is_empty() {
        options.rules = RuleEngine::from_names(&hyb.rules).context("Invalid rule list")?;
    }

    let attack = AttackConfig::Hybrid {
        mode: hyb.mode.into(),
        source: Arc::new(FileWordlist::new(&hyb.wordlist).encoding(hyb.encoding.into())),
        pattern: hyb.pattern,
        options,
    };

    run(&hyb.target, &hyb.engine, attack)
}

/// Audits every target one after the other and prints the outcome.
fn run(target: &Target, engine: &Engine, attack: AttackConfig) -> Result<()> {
    let targets = target.parse()?;
    let config: EngineConfig = engine.config()?;

    if let [target] = targets.as_slice() {
        let result = audit(target.clone(), config, engine.quiet, attack)?;

        match &result {
            CrackResult::Found { candidate, .. } => println!("{candidate}"),
            CrackResult::NotFound { .. } => eprintln!("No password found for the given digest"),
            CrackResult::TimedOut { .. } => {
                eprintln!("The audit timed out before finding the password")
            }
            CrackResult::Cancelled { cause, .. } => eprintln!("The audit was cancelled: {cause}"),
        }

        return Ok(());
    }

    let total = targets.len();
    info!("Auditing {total} hashes");

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec!["Hash", "Password"]);

    let mut found = 0;

    for target in targets {
        let digest = target.digest().to_owned();
        let result = audit(target, config.clone(), engine.quiet, attack.clone())?;

        let password = match result {
            CrackResult::Found { candidate, .. } => {
                found += 1;
                println!("{digest}:{candidate}");
                Cell::new(candidate).fg(Color::Green)
            }
            CrackResult::NotFound { .. } => Cell::new("No password found").fg(Color::Red),
            CrackResult::TimedOut { .. } => Cell::new("Timed out").fg(Color::Grey),
            CrackResult::Cancelled { cause, .. } => Cell::new(cause).fg(Color::Grey),
        };

        display_table.add_row(vec![Cell::new(digest), password]);
    }

    eprintln!("{display_table}");
    info!("{found}/{total} hashes cracked");

    Ok(())
}

/// Runs the attack against a single target in the background,
/// rendering its progress until it ends.
fn audit(
    target: HashTarget,
    config: EngineConfig,
    quiet: bool,
    attack: AttackConfig,
) -> Result<CrackResult> {
    let verifier = HashVerifier::new(target);

    info!(
        "Auditing a {} hash with {} worker(s)",
        verifier.target().algorithm(),
        config.workers
    );

    let mut handle = WorkScheduler::new(verifier, config).spawn(attack);
    let mut stderr = io::stderr();
    let mut progress_shown = false;

    while let Some(event) = handle.recv() {
        match event {
            Event::Progress(snapshot) if !quiet => {
                write!(stderr, "\r{:<80}", render(&snapshot))?;
                stderr.flush()?;
                progress_shown = true;
            }
            Event::Phase {
                phase_number,
                phase_count,
                generator,
                candidates,
            } if phase_count > 1 => {
                if progress_shown {
                    writeln!(stderr)?;
                    progress_shown = false;
                }

                match candidates {
                    Some(count) => info!(
                        "Phase {phase_number}/{phase_count}: {generator}, {} candidates",
                        count.human_count_bare()
                    ),
                    None => info!("Phase {phase_number}/{phase_count}: {generator}"),
                }
            }
            _ => (),
        }
    }

    if progress_shown {
        writeln!(stderr)?;
    }

    let result = handle.join().context("The audit failed")?;

    info!(
        "{} candidates tried in {}",
        result.attempts().human_count_bare(),
        result.elapsed().human_duration()
    );

    Ok(result)
}

/// Formats a progress snapshot on a single line.
fn render(snapshot: &ProgressSnapshot) -> String {
    let mut line = format!(
        "{} candidates, {}",
        snapshot.attempts.human_count_bare(),
        snapshot.throughput.human_throughput("H")
    );

    if let Some(percent) = snapshot.percent() {
        line.push_str(&format!(", {percent:.2}%"));
    }

    line.push_str(&format!(", {}", snapshot.elapsed.human_duration()));
    line
}
