//! Fee policy — how much to sweep and how much to hold back.
//!
//! Three modes share one component:
//! - `Fixed`: gas budget is the configured minimum `G`; the reserve `R`
//!   stays behind. `amount_to_send + G + R == total`.
//! - `Dynamic`: aggressive drain. The budget is `max(G, total − R)` and
//!   `amount_to_send = total − budget`, i.e. `min(R, total − G)`. Everything
//!   not sent is gas budget; unspent budget stays with the signer as change.
//! - `PerCoin`: like `Fixed`, but the budget scales with the number of coins
//!   being merged and never drops below `G`.
//!
//! In every mode the plan satisfies `amount_to_send + gas_budget + reserve == total`.

use serde::Deserialize;
use tracing::debug;

use crate::types::SuiAddress;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    Fixed,
    Dynamic,
    PerCoin,
}

impl std::str::FromStr for FeeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(FeeMode::Fixed),
            "dynamic" => Ok(FeeMode::Dynamic),
            "per_coin" | "per-coin" | "percoin" => Ok(FeeMode::PerCoin),
            other => anyhow::bail!("Unknown fee mode: {other} (expected fixed|dynamic|per_coin)"),
        }
    }
}

/// Fee policy configuration. All amounts in MIST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeConfig {
    pub mode: FeeMode,
    /// Balance intentionally left unswept (`Fixed`, `PerCoin`); the most a
    /// single `Dynamic` sweep sends.
    pub reserve: u64,
    /// Minimum gas budget.
    pub min_gas: u64,
    /// Per-coin gas allowance used by `PerCoin` mode.
    pub gas_per_coin: u64,
    /// Plans sending less than this are skipped. 0 disables the check.
    pub min_sweep: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            mode: FeeMode::Fixed,
            reserve: 0,
            min_gas: 1_000_000,    // 0.001 SUI
            gas_per_coin: 250_000, // merge cost allowance per input coin
            min_sweep: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// What one sweep would do, computed fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub total: u64,
    pub amount_to_send: u64,
    pub gas_budget: u64,
    pub reserve: u64,
    pub coin_count: usize,
    pub destination: SuiAddress,
}

/// Outcome of the fee policy. `Insufficient` is the normal "nothing to do".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDecision {
    Sweep(SweepPlan),
    Insufficient { total: u64, required: u64 },
}

impl PlanDecision {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, PlanDecision::Insufficient { .. })
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub struct FeePolicy {
    config: FeeConfig,
    destination: SuiAddress,
}

impl FeePolicy {
    pub fn new(config: FeeConfig, destination: SuiAddress) -> Self {
        Self {
            config,
            destination,
        }
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// Gas budget for sweeping `total` held in `coin_count` coins.
    pub fn gas_budget(&self, total: u64, coin_count: usize) -> u64 {
        let g = self.config.min_gas;
        match self.config.mode {
            FeeMode::Fixed => g,
            FeeMode::Dynamic => total.saturating_sub(self.config.reserve).max(g),
            FeeMode::PerCoin => self
                .config
                .gas_per_coin
                .saturating_mul(coin_count as u64)
                .max(g),
        }
    }

    /// Decide whether `total` spread over `coin_count` coins is worth sweeping.
    pub fn plan(&self, total: u64, coin_count: usize) -> PlanDecision {
        let gas_budget = self.gas_budget(total, coin_count);

        // Dynamic mode folds the reserve into the budget.
        let reserve = match self.config.mode {
            FeeMode::Dynamic => 0,
            FeeMode::Fixed | FeeMode::PerCoin => self.config.reserve,
        };

        let Some(withheld) = reserve.checked_add(gas_budget) else {
            return PlanDecision::Insufficient {
                total,
                required: u64::MAX,
            };
        };

        if total <= withheld || coin_count == 0 {
            return PlanDecision::Insufficient {
                total,
                required: self.required_total(withheld),
            };
        }

        let amount_to_send = total - withheld;
        if amount_to_send < self.config.min_sweep {
            debug!(
                amount_to_send,
                min_sweep = self.config.min_sweep,
                "Sweep amount below minimum"
            );
            return PlanDecision::Insufficient {
                total,
                required: withheld.saturating_add(self.config.min_sweep),
            };
        }

        PlanDecision::Sweep(SweepPlan {
            total,
            amount_to_send,
            gas_budget,
            reserve,
            coin_count,
            destination: self.destination,
        })
    }

    /// Smallest total that would produce a sweep, for logging.
    fn required_total(&self, withheld: u64) -> u64 {
        match self.config.mode {
            // Sends min(R, total − G): nothing ever moves with R = 0.
            FeeMode::Dynamic if self.config.reserve == 0 => u64::MAX,
            FeeMode::Dynamic => self.config.min_gas.saturating_add(1),
            FeeMode::Fixed | FeeMode::PerCoin => withheld.saturating_add(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> SuiAddress {
        "0xd".parse().unwrap()
    }

    fn fixed(reserve: u64, min_gas: u64) -> FeePolicy {
        FeePolicy::new(
            FeeConfig {
                mode: FeeMode::Fixed,
                reserve,
                min_gas,
                ..FeeConfig::default()
            },
            dest(),
        )
    }

    fn expect_sweep(decision: PlanDecision) -> SweepPlan {
        match decision {
            PlanDecision::Sweep(plan) => plan,
            other => panic!("expected sweep, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_balance_is_insufficient() {
        let policy = fixed(0, 1_000_000);
        assert!(policy.plan(0, 0).is_insufficient());
        assert!(policy.plan(0, 1).is_insufficient());
    }

    #[test]
    fn test_reference_scenario() {
        let plan = expect_sweep(fixed(0, 1_000_000).plan(5_000_000, 1));
        assert_eq!(plan.amount_to_send, 4_000_000);
        assert_eq!(plan.gas_budget, 1_000_000);
        assert_eq!(plan.destination, dest());
    }

    #[test]
    fn test_boundary_is_insufficient() {
        let policy = fixed(500, 1_000);
        assert!(policy.plan(1_500, 1).is_insufficient());
        let plan = expect_sweep(policy.plan(1_501, 1));
        assert_eq!(plan.amount_to_send, 1);
    }

    #[test]
    fn test_insufficient_iff_below_threshold_grid() {
        for (reserve, gas) in [(0u64, 1_000_000u64), (250_000, 1_000_000), (3, 7), (0, 0)] {
            let policy = fixed(reserve, gas);
            for total in [0u64, 1, 7, 10, 999_999, 1_000_000, 1_250_000, 1_250_001, 9_000_000] {
                match policy.plan(total, 2) {
                    PlanDecision::Insufficient { .. } => assert!(total <= reserve + gas),
                    PlanDecision::Sweep(plan) => {
                        assert!(total > reserve + gas);
                        assert!(plan.amount_to_send > 0);
                        assert_eq!(plan.amount_to_send + reserve + gas, total);
                    }
                }
            }
        }
    }

    #[test]
    fn test_reserve_is_left_behind() {
        let plan = expect_sweep(fixed(2_000_000, 1_000_000).plan(10_000_000, 3));
        assert_eq!(plan.amount_to_send, 7_000_000);
        assert_eq!(plan.reserve, 2_000_000);
    }

    fn dynamic(reserve: u64, min_gas: u64) -> FeePolicy {
        FeePolicy::new(
            FeeConfig {
                mode: FeeMode::Dynamic,
                reserve,
                min_gas,
                ..FeeConfig::default()
            },
            dest(),
        )
    }

    #[test]
    fn test_dynamic_drains_up_to_reserve() {
        let plan = expect_sweep(dynamic(1_000_000, 1_000_000).plan(5_000_000, 1));
        assert_eq!(plan.gas_budget, 4_000_000);
        assert_eq!(plan.amount_to_send, 1_000_000);
        assert_eq!(plan.reserve, 0);
    }

    #[test]
    fn test_dynamic_falls_back_to_min_gas() {
        // total − R < G: budget is G and the rest is sent.
        let plan = expect_sweep(dynamic(4_500_000, 1_000_000).plan(5_000_000, 2));
        assert_eq!(plan.gas_budget, 1_000_000);
        assert_eq!(plan.amount_to_send, 4_000_000);
    }

    #[test]
    fn test_dynamic_degenerate_values_are_insufficient() {
        // R = 0: the budget swallows the whole balance.
        assert!(matches!(
            dynamic(0, 1_000_000).plan(5_000_000, 1),
            PlanDecision::Insufficient { required: u64::MAX, .. }
        ));
        // total ≤ G
        assert!(dynamic(1_000_000, 1_000_000).plan(1_000_000, 1).is_insufficient());
        assert!(dynamic(1_000_000, 1_000_000).plan(0, 0).is_insufficient());
    }

    #[test]
    fn test_dynamic_amount_is_total_minus_change_grid() {
        for (reserve, gas) in [(1u64, 1u64), (1_000_000, 1_000_000), (250_000, 7), (9, 3_000_000)] {
            let policy = dynamic(reserve, gas);
            for total in [0u64, 1, 2, 7, 10, 999_999, 1_000_000, 1_000_001, 3_000_001, 9_000_000] {
                let budget = total.saturating_sub(reserve).max(gas);
                match policy.plan(total, 3) {
                    PlanDecision::Insufficient { .. } => assert!(total <= budget),
                    PlanDecision::Sweep(plan) => {
                        assert!(plan.amount_to_send > 0);
                        assert_eq!(plan.gas_budget, budget);
                        assert_eq!(plan.amount_to_send, total - budget);
                        assert_eq!(plan.amount_to_send, reserve.min(total - gas));
                        assert_eq!(plan.amount_to_send + plan.gas_budget + plan.reserve, total);
                    }
                }
            }
        }
    }

    #[test]
    fn test_per_coin_budget_scales_with_coins() {
        let policy = FeePolicy::new(
            FeeConfig {
                mode: FeeMode::PerCoin,
                reserve: 0,
                min_gas: 1_000_000,
                gas_per_coin: 250_000,
                min_sweep: 0,
            },
            dest(),
        );
        assert_eq!(policy.gas_budget(5_000_000, 1), 1_000_000);
        assert_eq!(policy.gas_budget(5_000_000, 8), 2_000_000);

        let plan = expect_sweep(policy.plan(5_000_000, 8));
        assert_eq!(plan.gas_budget, 2_000_000);
        assert_eq!(plan.amount_to_send + plan.gas_budget + plan.reserve, plan.total);
        assert_eq!(plan.amount_to_send, 3_000_000);
    }

    #[test]
    fn test_per_coin_insufficient_when_budget_eats_balance() {
        let policy = FeePolicy::new(
            FeeConfig {
                mode: FeeMode::PerCoin,
                gas_per_coin: 1_000_000,
                ..FeeConfig::default()
            },
            dest(),
        );
        // 5 coins → 5_000_000 budget
        assert!(policy.plan(5_000_000, 5).is_insufficient());
        assert!(!policy.plan(5_000_001, 5).is_insufficient());
    }

    #[test]
    fn test_min_sweep_threshold() {
        let policy = FeePolicy::new(
            FeeConfig {
                min_sweep: 10_000_000,
                ..FeeConfig::default()
            },
            dest(),
        );
        assert!(policy.plan(5_000_000, 1).is_insufficient());
        assert!(!policy.plan(11_000_000, 1).is_insufficient());
    }

    #[test]
    fn test_overflowing_withhold_is_insufficient() {
        let policy = fixed(u64::MAX, 1);
        assert!(policy.plan(u64::MAX, 1).is_insufficient());
    }

    #[test]
    fn test_fee_mode_parse() {
        assert_eq!("fixed".parse::<FeeMode>().unwrap(), FeeMode::Fixed);
        assert_eq!(" Dynamic ".parse::<FeeMode>().unwrap(), FeeMode::Dynamic);
        assert_eq!("per_coin".parse::<FeeMode>().unwrap(), FeeMode::PerCoin);
        assert_eq!("per-coin".parse::<FeeMode>().unwrap(), FeeMode::PerCoin);
        assert!("aggressive".parse::<FeeMode>().is_err());
    }
}
