//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Same seed, same configuration: the generated panel must be identical,
//! down to the bytes of the written CSV. Any divergence is a blocker.

use mindtheapp_core::{
    config::SimConfig,
    rng::RngBank,
    simulator::{generate, PanelSimulator},
    table_io::write_csv_to,
};

fn csv_bytes(cfg: &SimConfig) -> Vec<u8> {
    let table = generate(cfg).expect("generate");
    let mut buf = Vec::new();
    write_csv_to(&table, &mut buf).expect("write csv");
    buf
}

#[test]
fn same_seed_produces_identical_tables() {
    let cfg = SimConfig::default_test();
    let a = generate(&cfg).unwrap();
    let b = generate(&cfg).unwrap();
    assert_eq!(a, b, "two runs with seed {} diverged", cfg.seed);
}

#[test]
fn same_seed_produces_identical_csv_bytes() {
    let cfg = SimConfig::mock_levels(0.05).with_users(40);
    let a = csv_bytes(&cfg);
    let b = csv_bytes(&cfg);
    assert_eq!(a.len(), b.len(), "CSV lengths differ: {} vs {}", a.len(), b.len());
    assert!(a == b, "CSV output diverged for identical seeds");
}

#[test]
fn a_bank_can_be_reused_across_runs() {
    let cfg = SimConfig::default_test();
    let bank = RngBank::new(cfg.seed);
    let sim = PanelSimulator::new(&cfg).unwrap();
    let first = sim.generate(&bank).unwrap();
    let second = sim.generate(&bank).unwrap();
    assert_eq!(first, second, "generation must not leave state behind in the bank");
}

#[test]
fn different_seeds_produce_different_tables() {
    let a = generate(&SimConfig::default_test()).unwrap();
    let b = generate(&SimConfig::default_test().with_seed(8)).unwrap();
    assert_ne!(a, b, "seeds 7 and 8 produced the same panel");
}

#[test]
fn changing_one_outcomes_noise_leaves_other_columns_untouched() {
    let base = SimConfig::default_test();
    let mut quieter = base.clone();
    quieter.outcomes[1].noise_sd = 0.0;

    let a = generate(&base).unwrap();
    let b = generate(&quieter).unwrap();
    let logins = a.column_index("logins").unwrap();
    let spend = a.column_index("log_spend").unwrap();

    for (ra, rb) in a.rows().iter().zip(b.rows()) {
        assert_eq!(
            ra.values[logins], rb.values[logins],
            "logins changed for {} at month {}",
            ra.user_id, ra.event_month
        );
    }
    assert!(
        a.rows().iter().zip(b.rows()).any(|(ra, rb)| ra.values[spend] != rb.values[spend]),
        "log_spend should change when its noise is switched off"
    );
}
