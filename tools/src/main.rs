//! panel-runner: generate a simulated app-install panel and estimate the
//! install effect per cohort and outcome.
//!
//! Usage:
//!   panel-runner --preset mock --seed 42 --out panel.csv
//!   panel-runner --config sim.json --estimate --db runs.db
//!   panel-runner --input panel.csv --outcome log_discretionary_spending --cohort X
//!   panel-runner --preset category --users 200 --estimate --json

use anyhow::{bail, Context, Result};
use mindtheapp_core::{
    config::SimConfig,
    error::ErrorKind,
    estimator::{estimate_with, EstimationResult, EstimatorSpec},
    event_study::{event_study, EventStudy, DEFAULT_REFERENCE},
    panel::PanelTable,
    presets::MOCK_NOISE_LEVEL,
    simulator,
    store::PanelStore,
    summary::{group_means, GroupMean},
    table_io,
};
use std::env;

#[derive(serde::Serialize)]
struct EstimateLine {
    #[serde(flatten)]
    result: EstimationResult,
    injected: Option<f64>,
}

#[derive(serde::Serialize)]
struct SkippedEstimate {
    cohort: String,
    outcome: String,
    reason: String,
}

#[derive(serde::Serialize)]
struct RunReport {
    run_id: String,
    seed: Option<u64>,
    rows: usize,
    users: usize,
    group_means: Vec<GroupMean>,
    estimates: Vec<EstimateLine>,
    skipped: Vec<SkippedEstimate>,
    event_studies: Vec<EventStudy>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let json = has_flag(&args, "--json");
    let run_id = format!("run-{}", uuid::Uuid::new_v4());

    let (table, config) = match arg_value(&args, "--input") {
        Some(path) => (table_io::read_csv(path)?, None),
        None => {
            let config = build_config(&args)?;
            let table = simulator::generate(&config)?;
            (table, Some(config))
        }
    };

    if !json {
        println!("Mind the App: panel-runner");
        println!("  run_id:  {run_id}");
        if let Some(cfg) = &config {
            println!("  seed:    {}", cfg.seed);
            println!("  window:  {}..={}", cfg.window.start, cfg.window.end);
        }
        println!("  rows:    {}", table.len());
        println!("  users:   {}", table.user_count());
        println!("  cohorts: {}", table.cohorts().join(", "));
        println!();
    }

    let outcomes = outcome_columns(&args, &table, config.as_ref());
    let outcome_refs: Vec<&str> = outcomes.iter().map(String::as_str).collect();
    let means = group_means(&table, &outcome_refs)?;
    if !json {
        print_group_means(&means);
    }

    if let Some(out) = arg_value(&args, "--out") {
        table_io::write_csv(&table, out)?;
        if !json {
            println!("Wrote {out}");
        }
    }

    let store = match arg_value(&args, "--db") {
        Some(db) => {
            let store = PanelStore::open(db)?;
            store.migrate()?;
            match &config {
                Some(cfg) => {
                    store.insert_run(&run_id, cfg, env!("CARGO_PKG_VERSION"))?;
                    store.insert_panel(&run_id, &table)?;
                    Some(store)
                }
                None => {
                    log::warn!("--db ignored: runs loaded from --input carry no configuration");
                    None
                }
            }
        }
        None => None,
    };

    let mut estimates = Vec::new();
    let mut skipped = Vec::new();
    let mut studies = Vec::new();
    if has_flag(&args, "--estimate") || arg_value(&args, "--input").is_some() {
        let spec = estimator_spec(&args, &table);
        let reference = parse_arg(&args, "--reference", DEFAULT_REFERENCE)?;
        let cohorts: Vec<String> = match arg_value(&args, "--cohort") {
            Some(c) => vec![c.to_string()],
            None => table.cohorts().into_iter().map(str::to_string).collect(),
        };

        for cohort in &cohorts {
            for outcome in &outcomes {
                match estimate_with(&table, outcome, cohort, &spec) {
                    Ok(result) => {
                        let injected = config.as_ref().and_then(|c| c.injected_effect(cohort, outcome));
                        if let Some(store) = &store {
                            store.insert_estimate(&run_id, &result)?;
                        }
                        estimates.push(EstimateLine { result, injected });
                    }
                    Err(e) if e.kind() == ErrorKind::Absorption => {
                        log::warn!("{cohort}/{outcome}: {e}");
                        skipped.push(SkippedEstimate {
                            cohort: cohort.clone(),
                            outcome: outcome.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e).with_context(|| format!("estimating {cohort}/{outcome}")),
                }

                if has_flag(&args, "--event-study") {
                    match event_study(&table, outcome, cohort, reference) {
                        Ok(study) => studies.push(study),
                        Err(e) => log::warn!("event study {cohort}/{outcome}: {e}"),
                    }
                }
            }
        }

        if !json {
            print_estimates(&spec, &estimates, &skipped);
            for study in &studies {
                print_event_study(study);
            }
        }
    }

    if json {
        let report = RunReport {
            run_id,
            seed: config.as_ref().map(|c| c.seed),
            rows: table.len(),
            users: table.user_count(),
            group_means: means,
            estimates,
            skipped,
            event_studies: studies,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn build_config(args: &[String]) -> Result<SimConfig> {
    let preset = arg_value(args, "--preset");
    let is_mock = matches!(preset, Some("mock" | "mock_levels"));
    if arg_value(args, "--noise-level").is_some() && !is_mock {
        bail!("--noise-level only applies to --preset mock");
    }
    let mut config = match (arg_value(args, "--config"), preset) {
        (Some(_), Some(_)) => bail!("--config and --preset are mutually exclusive"),
        (Some(path), None) => SimConfig::load(path)?,
        (None, Some("mock")) | (None, Some("mock_levels")) => {
            SimConfig::mock_levels(parse_arg(args, "--noise-level", MOCK_NOISE_LEVEL)?)
        }
        (None, Some(name)) => match SimConfig::preset(name) {
            Some(cfg) => cfg,
            None => bail!("unknown preset '{name}' (expected category, spending or mock)"),
        },
        (None, None) => SimConfig::category_spending(),
    };
    if let Some(seed) = arg_value(args, "--seed") {
        config = config.with_seed(seed.parse().context("--seed expects an integer")?);
    }
    if let Some(users) = arg_value(args, "--users") {
        config = config.with_users(users.parse().context("--users expects an integer")?);
    }
    if let Some(spread) = arg_value(args, "--install-spread") {
        let spread: u32 = spread.parse().context("--install-spread expects an integer")?;
        for cohort in &mut config.cohorts {
            cohort.install_spread = spread;
        }
    }
    config.validate()?;
    Ok(config)
}

/// `--outcome` if given, else every outcome column the config produces,
/// else every value column of the loaded table.
fn outcome_columns(args: &[String], table: &PanelTable, config: Option<&SimConfig>) -> Vec<String> {
    if let Some(outcome) = arg_value(args, "--outcome") {
        return vec![outcome.to_string()];
    }
    match config {
        Some(cfg) => {
            let covariates: Vec<&str> = cfg.covariates.iter().map(|c| c.name.as_str()).collect();
            cfg.column_names()
                .into_iter()
                .filter(|n| !covariates.contains(&n.as_str()))
                .collect()
        }
        None => table.columns().iter().map(|c| c.name.clone()).collect(),
    }
}

/// Time effects are only identified when installs are staggered; the flags
/// override the default either way.
fn estimator_spec(args: &[String], table: &PanelTable) -> EstimatorSpec {
    let time_effects = if has_flag(args, "--no-time-effects") {
        false
    } else if has_flag(args, "--time-effects") {
        true
    } else {
        table.is_staggered()
    };
    EstimatorSpec::default().with_time_effects(time_effects)
}

fn print_group_means(means: &[GroupMean]) {
    println!("=== GROUP MEANS (pre / post) ===");
    for pre in means.iter().filter(|m| !m.post) {
        let post = means
            .iter()
            .find(|m| m.post && m.cohort == pre.cohort && m.column == pre.column);
        match post {
            Some(post) => println!(
                "  {:<4} {:<32} {:>12.4} {:>12.4}",
                pre.cohort, pre.column, pre.mean, post.mean
            ),
            None => println!("  {:<4} {:<32} {:>12.4} {:>12}", pre.cohort, pre.column, pre.mean, "-"),
        }
    }
    println!();
}

fn print_estimates(spec: &EstimatorSpec, estimates: &[EstimateLine], skipped: &[SkippedEstimate]) {
    println!(
        "=== ESTIMATES (user effects: {}, time effects: {}) ===",
        spec.entity_effects, spec.time_effects
    );
    for line in estimates {
        let r = &line.result;
        let injected = line
            .injected
            .map(|v| format!("{v:>10.4}"))
            .unwrap_or_else(|| format!("{:>10}", "-"));
        println!(
            "  {:<4} {:<32} est {:>10.4} (se {:.4}, p {:.3})  injected {injected}",
            r.cohort, r.outcome, r.coefficient, r.std_error, r.p_value
        );
    }
    for s in skipped {
        println!("  {:<4} {:<32} absorbed: {}", s.cohort, s.outcome, s.reason);
    }
    println!();
}

fn print_event_study(study: &EventStudy) {
    println!(
        "=== EVENT STUDY {}/{} (reference month {}) ===",
        study.cohort, study.outcome, study.reference
    );
    for p in &study.points {
        println!(
            "  {:>4} {:>10.4}  [{:.4}, {:.4}]",
            p.event_month, p.coefficient, p.ci_lower, p.ci_upper
        );
    }
    println!();
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match arg_value(args, flag) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{flag} got '{raw}', which does not parse")),
        None => Ok(default),
    }
}
