//! Fee selection and escalation for submissions

use crate::chain::FeeData;
use crate::error::{UtilitiesError, UtilitiesResult};

use ethers::types::U256;
use tracing::debug;

/// Fee-escalation policy of a chain
#[derive(Debug, Clone, PartialEq)]
pub struct FeePolicy {
    /// Priority fee (or legacy price floor) per gas
    pub min_adaptable_fee_per_gas: U256,
    /// Ceiling for the total fee per gas, `None` when uncapped
    pub max_total_fee_per_gas: Option<U256>,
    /// Multiplier applied on each resubmission
    pub adaptable_fee_increase_factor: f64,
    /// Blocks to wait for inclusion before resubmitting
    pub blocks_until_resubmission: u64,
}

impl FeePolicy {
    /// A configured cap of zero means no cap
    pub fn new(
        min_adaptable_fee_per_gas: U256,
        max_total_fee_per_gas: Option<U256>,
        adaptable_fee_increase_factor: f64,
        blocks_until_resubmission: u64,
    ) -> Self {
        Self {
            min_adaptable_fee_per_gas,
            max_total_fee_per_gas: max_total_fee_per_gas.filter(|cap| !cap.is_zero()),
            adaptable_fee_increase_factor,
            blocks_until_resubmission,
        }
    }

    fn increase(&self, value: U256) -> U256 {
        let permille = (self.adaptable_fee_increase_factor * 1000.0).round() as u64;
        std::cmp::max(value * permille / 1000, value + 1)
    }
}

/// Gas price types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPrice {
    Legacy(U256),
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl GasPrice {
    /// Highest fee per gas the transaction may pay
    pub fn total_fee_per_gas(&self) -> U256 {
        match self {
            GasPrice::Legacy(price) => *price,
            GasPrice::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

fn exceeded(cap: U256, required: U256) -> UtilitiesError {
    UtilitiesError::MaxTotalFeePerGasExceeded {
        max_total_fee_per_gas: cap.to_string(),
        required: required.to_string(),
    }
}

/// Fee of the first broadcast.
///
/// EIP-1559 chains get the minimum adaptable fee as priority fee and twice
/// the base fee on top as headroom. Legacy chains pay the node's gas price,
/// but at least the minimum adaptable fee. Fails when the cap cannot cover
/// the lowest fee the chain accepts.
pub fn initial_gas_price(fee_data: &FeeData, policy: &FeePolicy) -> UtilitiesResult<GasPrice> {
    let min_fee = policy.min_adaptable_fee_per_gas;

    let price = match fee_data.base_fee_per_gas {
        Some(base_fee) => {
            let required = base_fee + min_fee;
            let mut max_fee_per_gas = base_fee * 2 + min_fee;

            if let Some(cap) = policy.max_total_fee_per_gas {
                if min_fee > cap || required > cap {
                    return Err(exceeded(cap, required));
                }
                max_fee_per_gas = std::cmp::min(max_fee_per_gas, cap);
            }

            GasPrice::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas: min_fee,
            }
        }
        None => {
            let price = std::cmp::max(fee_data.gas_price, min_fee);
            if let Some(cap) = policy.max_total_fee_per_gas {
                if price > cap {
                    return Err(exceeded(cap, price));
                }
            }
            GasPrice::Legacy(price)
        }
    };

    debug!(?price, "Initial gas price");
    Ok(price)
}

/// Fee of the next resubmission, `None` once the cap leaves no room to grow
pub fn escalate(current: &GasPrice, policy: &FeePolicy) -> Option<GasPrice> {
    let cap = policy.max_total_fee_per_gas;
    let clamp = |value: U256| match cap {
        Some(cap) => std::cmp::min(value, cap),
        None => value,
    };

    match *current {
        GasPrice::Legacy(price) => {
            let next = clamp(policy.increase(price));
            (next > price).then_some(GasPrice::Legacy(next))
        }
        GasPrice::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let next_max = clamp(policy.increase(max_fee_per_gas));
            let next_priority =
                std::cmp::min(policy.increase(max_priority_fee_per_gas), next_max);
            (next_max > max_fee_per_gas).then_some(GasPrice::Eip1559 {
                max_fee_per_gas: next_max,
                max_priority_fee_per_gas: next_priority,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u64 = 1_000_000_000;

    fn policy(cap: Option<u64>) -> FeePolicy {
        FeePolicy::new(GWEI.into(), cap.map(Into::into), 1.101, 2)
    }

    fn eip1559_fees() -> FeeData {
        FeeData {
            base_fee_per_gas: Some(U256::from(10 * GWEI)),
            gas_price: U256::from(11 * GWEI),
        }
    }

    fn escalation_sequence(policy: &FeePolicy, steps: usize) -> Vec<GasPrice> {
        let mut prices = vec![initial_gas_price(&eip1559_fees(), policy).unwrap()];
        for _ in 0..steps {
            match escalate(prices.last().unwrap(), policy) {
                Some(next) => prices.push(next),
                None => break,
            }
        }
        prices
    }

    #[test]
    fn test_initial_eip1559_price() {
        let price = initial_gas_price(&eip1559_fees(), &policy(None)).unwrap();
        assert_eq!(
            price,
            GasPrice::Eip1559 {
                max_fee_per_gas: U256::from(21 * GWEI),
                max_priority_fee_per_gas: U256::from(GWEI),
            }
        );
    }

    #[test]
    fn test_initial_legacy_price_respects_floor() {
        let fees = FeeData {
            base_fee_per_gas: None,
            gas_price: U256::from(GWEI / 2),
        };
        let price = initial_gas_price(&fees, &policy(None)).unwrap();
        assert_eq!(price, GasPrice::Legacy(U256::from(GWEI)));
    }

    #[test]
    fn test_cap_below_required_fee_fails() {
        let result = initial_gas_price(&eip1559_fees(), &policy(Some(5 * GWEI)));
        assert!(matches!(
            result,
            Err(UtilitiesError::MaxTotalFeePerGasExceeded { .. })
        ));
    }

    #[test]
    fn test_escalation_grows_by_factor() {
        let next = escalate(&GasPrice::Legacy(U256::from(1000 * GWEI)), &policy(None)).unwrap();
        assert_eq!(next, GasPrice::Legacy(U256::from(1101 * GWEI)));
    }

    #[test]
    fn test_escalation_stops_at_cap() {
        let capped = policy(Some(25 * GWEI));
        let prices = escalation_sequence(&capped, 50);

        assert!(prices.len() > 1);
        assert!(prices
            .iter()
            .all(|p| p.total_fee_per_gas() <= U256::from(25 * GWEI)));
        assert_eq!(
            prices.last().unwrap().total_fee_per_gas(),
            U256::from(25 * GWEI)
        );
        assert!(escalate(prices.last().unwrap(), &capped).is_none());
    }

    #[test]
    fn test_zero_cap_behaves_as_uncapped() {
        let zero = policy(Some(0));
        let unset = policy(None);

        assert_eq!(zero.max_total_fee_per_gas, None);
        assert_eq!(escalation_sequence(&zero, 20), escalation_sequence(&unset, 20));
        assert_eq!(escalation_sequence(&zero, 20).len(), 21);
    }
}
