//! Single-test execution: timing, panic containment, and PASS/FAIL logging.

use super::TestResult;
use super::harness::measure_elapsed_ms;

/// Run one test closure, converting a panic into [`TestResult::Fail`] instead
/// of taking down the whole suite.
pub fn run_single_test(name: &str, f: impl FnOnce() -> TestResult) -> TestResult {
    let start = crate::tsc::rdtsc();

    let outcome = crate::catch_panic!({
        match f() {
            TestResult::Pass | TestResult::Skipped => 0,
            TestResult::Fail | TestResult::Panic => -1,
        }
    });

    let elapsed = measure_elapsed_ms(start, crate::tsc::rdtsc());

    if outcome == 0 {
        crate::klog_info!("  [PASS] {} ({} ms)", name, elapsed);
        TestResult::Pass
    } else {
        crate::klog_info!("  [FAIL] {} ({} ms)", name, elapsed);
        TestResult::Fail
    }
}
