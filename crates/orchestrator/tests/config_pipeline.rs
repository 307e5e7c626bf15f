//! End-to-end setup pipeline from a config file on disk.

use orchestrator::create_simulation;

#[test]
fn sample_config_builds_a_runner() {
    let path = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../configs/uniform-box.json"
    );
    let mut runner = create_simulation(path).expect("sample config must build");

    runner.run(3).expect("short run");
    assert_eq!(runner.step_count(), 3);

    let mut count = 0;
    runner
        .simulator()
        .for_each(&mut |_| count += 1, kernel::IterateBehavior::Owned);
    assert_eq!(count, 1000, "all scenario particles survive");
}
