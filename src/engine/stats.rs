//! Execution statistics and per-cycle reports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{ExecutionClass, ExecutionResult};

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Running totals across both backends. Single writer: the monitor loop.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    local_executions: u64,
    remote_executions: u64,
    successful_executions: u64,
    failed_executions: u64,
    total_profit: Decimal,
    cycles_completed: u64,
    cycles_failed: u64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one dispatch. Only successful results add profit.
    pub fn record(&mut self, class: ExecutionClass, result: &ExecutionResult) {
        match class {
            ExecutionClass::Remote => self.remote_executions += 1,
            ExecutionClass::Local => self.local_executions += 1,
        }
        if result.is_success() {
            self.successful_executions += 1;
            self.total_profit += result.profit;
        } else {
            self.failed_executions += 1;
        }
    }

    pub fn record_cycle(&mut self, completed: bool) {
        if completed {
            self.cycles_completed += 1;
        } else {
            self.cycles_failed += 1;
        }
    }

    pub fn local_executions(&self) -> u64 {
        self.local_executions
    }

    pub fn remote_executions(&self) -> u64 {
        self.remote_executions
    }

    pub fn total_profit(&self) -> Decimal {
        self.total_profit
    }

    pub fn total_executions(&self) -> u64 {
        self.local_executions + self.remote_executions
    }

    /// Copy with the derived values filled in.
    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total_executions();
        StatsSnapshot {
            local_executions: self.local_executions,
            remote_executions: self.remote_executions,
            successful_executions: self.successful_executions,
            failed_executions: self.failed_executions,
            total_profit: self.total_profit,
            ratio: ratio(self.local_executions, self.remote_executions),
            avg_profit_per_execution: self.total_profit / Decimal::from(total.max(1)),
            success_rate: ratio(self.successful_executions, total),
            cycles_completed: self.cycles_completed,
            cycles_failed: self.cycles_failed,
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> Decimal {
    Decimal::from(numerator) / Decimal::from(denominator.max(1))
}

/// Point-in-time stats as published to the dashboard and the final log.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct StatsSnapshot {
    pub local_executions: u64,
    pub remote_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub total_profit: Decimal,
    /// local / max(remote, 1)
    pub ratio: Decimal,
    pub avg_profit_per_execution: Decimal,
    pub success_rate: Decimal,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of one fetch → analyze → validate → dispatch pass.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub symbols_scanned: usize,
    pub candidates: usize,
    pub rejected: usize,
    pub dispatched_local: usize,
    pub dispatched_remote: usize,
    pub failed: usize,
    pub cycle_profit: Decimal,
    /// Set when the cycle aborted; counts are whatever was reached.
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CycleReport {
    pub fn new(cycle_number: u64) -> Self {
        Self {
            cycle_number,
            symbols_scanned: 0,
            candidates: 0,
            rejected: 0,
            dispatched_local: 0,
            dispatched_remote: 0,
            failed: 0,
            cycle_profit: Decimal::ZERO,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(cycle_number: u64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(cycle_number)
        }
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched_local + self.dispatched_remote
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_stats_derive_zeroes() {
        let snap = StatsAggregator::new().snapshot();
        assert_eq!(snap.ratio, Decimal::ZERO);
        assert_eq!(snap.avg_profit_per_execution, Decimal::ZERO);
        assert_eq!(snap.success_rate, Decimal::ZERO);
    }

    #[test]
    fn test_record_counts_and_profit() {
        let mut stats = StatsAggregator::new();
        stats.record(
            ExecutionClass::Local,
            &ExecutionResult::success(dec!(8.8), None),
        );
        stats.record(
            ExecutionClass::Local,
            &ExecutionResult::success(dec!(1.2), None),
        );
        stats.record(ExecutionClass::Remote, &ExecutionResult::error("timeout"));

        let snap = stats.snapshot();
        assert_eq!(snap.local_executions, 2);
        assert_eq!(snap.remote_executions, 1);
        assert_eq!(snap.successful_executions, 2);
        assert_eq!(snap.failed_executions, 1);
        assert_eq!(snap.total_profit, dec!(10));
        assert_eq!(snap.ratio, dec!(2));
        assert_eq!(snap.avg_profit_per_execution.round_dp(4), dec!(3.3333));
        assert_eq!(snap.success_rate.round_dp(4), dec!(0.6667));
    }

    #[test]
    fn test_ratio_without_remote_uses_one() {
        let mut stats = StatsAggregator::new();
        for _ in 0..3 {
            stats.record(
                ExecutionClass::Local,
                &ExecutionResult::success(dec!(1), None),
            );
        }
        assert_eq!(stats.snapshot().ratio, dec!(3));
    }

    #[test]
    fn test_cycle_counters() {
        let mut stats = StatsAggregator::new();
        stats.record_cycle(true);
        stats.record_cycle(true);
        stats.record_cycle(false);
        let snap = stats.snapshot();
        assert_eq!(snap.cycles_completed, 2);
        assert_eq!(snap.cycles_failed, 1);
    }

    #[test]
    fn test_failed_report() {
        let report = CycleReport::failed(4, "venues down");
        assert!(!report.is_ok());
        assert_eq!(report.cycle_number, 4);
        assert_eq!(report.dispatched(), 0);
    }
}
