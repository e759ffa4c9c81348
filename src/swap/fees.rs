//! Service and network fee arithmetic.
//!
//! The counterparty reports how much it wants to receive (or will send);
//! [`check_amounts`] makes sure the network fee hidden in that difference
//! is in line with our own fee estimates.

use std::collections::HashMap;
use thiserror::Error;

use crate::chain::types::{Currency, Pair};
use crate::counterparty::types::{ChainPair, Percentage, ReversePair, SubmarinePair};
use crate::swap::types::SwapType;

/// Absolute slack on the network fee, in satoshis.
pub const ABSOLUTE_FEE_TOLERANCE_SAT: u64 = 1500;
/// Relative slack on the network fee.
pub const RELATIVE_FEE_TOLERANCE: Percentage = Percentage(25.0);

/// Virtual sizes of the transactions the counterparty pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSizes {
    pub normal_claim: u64,
    pub reverse_lockup: u64,
    pub reverse_claim: u64,
}

pub fn tx_sizes(currency: Currency) -> TxSizes {
    match currency {
        Currency::Btc => TxSizes {
            normal_claim: 151,
            reverse_lockup: 154,
            reverse_claim: 111,
        },
        Currency::Liquid => TxSizes {
            normal_claim: 1337,
            reverse_lockup: 2503,
            reverse_claim: 1309,
        },
    }
}

/// Fee rate per currency, sat/vbyte.
pub type FeeEstimations = HashMap<Currency, f64>;

#[derive(Debug, Error, PartialEq)]
pub enum FeeError {
    #[error("no estimation for currency {0}")]
    MissingEstimation(Currency),

    #[error("onchain fee way above expectation: {actual} > {expected}+{tolerance}")]
    AboveExpectation { actual: u64, expected: u64, tolerance: u64 },

    #[error("{0}")]
    InvalidQuote(&'static str),
}

pub type FeeResult<T> = Result<T, FeeError>;

/// Service percentage and total miner fees of a quoted pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwapFees {
    pub percentage: Percentage,
    pub miner_fees: u64,
}

impl From<&SubmarinePair> for SwapFees {
    fn from(pair: &SubmarinePair) -> Self {
        Self {
            percentage: pair.fees.percentage,
            miner_fees: pair.fees.miner_fees,
        }
    }
}

impl From<&ReversePair> for SwapFees {
    fn from(pair: &ReversePair) -> Self {
        let miner = &pair.fees.miner_fees;
        Self {
            percentage: pair.fees.percentage,
            miner_fees: miner.claim + miner.lockup,
        }
    }
}

impl From<&ChainPair> for SwapFees {
    fn from(pair: &ChainPair) -> Self {
        let miner = &pair.fees.miner_fees;
        Self {
            percentage: pair.fees.percentage,
            miner_fees: miner.server + miner.user.claim + miner.user.lockup,
        }
    }
}

/// Currencies whose fee rate [`check_amounts`] needs.
pub fn required_estimations(swap_type: SwapType, pair: Pair) -> Vec<Currency> {
    match swap_type {
        SwapType::Submarine => vec![pair.from],
        SwapType::Reverse => vec![pair.to],
        SwapType::Chain => vec![pair.from, pair.to],
    }
}

fn rate(estimations: &FeeEstimations, currency: Currency) -> f64 {
    estimations.get(&currency).copied().unwrap_or_default()
}

/// Network fee the counterparty should be charging at current fee rates.
pub fn calc_network_fee(
    swap_type: SwapType,
    pair: Pair,
    estimations: &FeeEstimations,
    include_claim: bool,
) -> u64 {
    match swap_type {
        SwapType::Submarine => {
            let size = tx_sizes(pair.from).normal_claim;
            (size as f64 * rate(estimations, pair.from)).ceil() as u64
        }
        SwapType::Reverse => {
            let sizes = tx_sizes(pair.to);
            let mut size = sizes.reverse_lockup;
            if include_claim {
                size += sizes.reverse_claim;
            }
            (size as f64 * rate(estimations, pair.to)).ceil() as u64
        }
        SwapType::Chain => {
            calc_network_fee(SwapType::Submarine, pair, estimations, include_claim)
                + calc_network_fee(SwapType::Reverse, pair, estimations, include_claim)
        }
    }
}

fn check_tolerance(expected: u64, actual: u64) -> FeeResult<()> {
    let tolerance = ABSOLUTE_FEE_TOLERANCE_SAT.max(RELATIVE_FEE_TOLERANCE.calculate(expected));
    if actual > expected + tolerance {
        return Err(FeeError::AboveExpectation {
            actual,
            expected,
            tolerance,
        });
    }
    Ok(())
}

/// Verify the network fee implied by `send_amount - receive_amount`.
///
/// The service fee is taken on the receive side for submarine swaps and on
/// the send side otherwise.
pub fn check_amounts(
    swap_type: SwapType,
    pair: Pair,
    send_amount: u64,
    receive_amount: u64,
    service_fee: Percentage,
    estimations: &FeeEstimations,
) -> FeeResult<()> {
    let total_fees = send_amount.saturating_sub(receive_amount);
    let service = match swap_type {
        SwapType::Submarine => service_fee.calculate(receive_amount),
        SwapType::Reverse | SwapType::Chain => service_fee.calculate(send_amount),
    };
    let network_fees = total_fees.saturating_sub(service);

    if let Some(missing) = required_estimations(swap_type, pair)
        .into_iter()
        .find(|c| !estimations.contains_key(c))
    {
        return Err(FeeError::MissingEstimation(missing));
    }
    check_tolerance(calc_network_fee(swap_type, pair, estimations, false), network_fees)
}

/// Service plus miner fees for swapping `amount`.
pub fn calculate_fee_estimate(fees: SwapFees, amount: u64) -> u64 {
    fees.percentage.calculate(amount) + fees.miner_fees
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapQuote {
    pub send_amount: u64,
    pub receive_amount: u64,
    pub service_fee: u64,
    pub network_fee: u64,
}

/// Quote from exactly one of `send_amount` and `receive_amount`.
pub fn calculate_swap_quote(
    swap_type: SwapType,
    send_amount: u64,
    receive_amount: u64,
    fees: SwapFees,
) -> FeeResult<SwapQuote> {
    if send_amount > 0 && receive_amount > 0 {
        return Err(FeeError::InvalidQuote("cant have both send and receive amount"));
    }
    if send_amount == 0 && receive_amount == 0 {
        return Err(FeeError::InvalidQuote(
            "either send or receive amount have to be specified",
        ));
    }

    let percentage = fees.percentage;
    let miner = fees.miner_fees;
    let mut quote = SwapQuote {
        network_fee: miner,
        ..Default::default()
    };

    if send_amount > 0 {
        quote.send_amount = send_amount;
        match swap_type {
            SwapType::Submarine => {
                let receive = send_amount.saturating_sub(miner) as f64 / (1.0 + percentage.ratio());
                quote.receive_amount = receive as u64;
                quote.service_fee = percentage.calculate(quote.receive_amount);
            }
            SwapType::Reverse | SwapType::Chain => {
                quote.service_fee = percentage.calculate(send_amount);
                quote.receive_amount = send_amount
                    .saturating_sub(quote.service_fee)
                    .saturating_sub(miner);
            }
        }
    } else {
        quote.receive_amount = receive_amount;
        match swap_type {
            SwapType::Submarine => {
                quote.service_fee = percentage.calculate(receive_amount);
                quote.send_amount = receive_amount + quote.service_fee + miner;
            }
            SwapType::Reverse | SwapType::Chain => {
                let rate = 1.0 - percentage.ratio();
                if rate == 0.0 {
                    return Err(FeeError::InvalidQuote("division by zero"));
                }
                quote.send_amount = ((receive_amount + miner) as f64 / rate).ceil() as u64;
                quote.service_fee = percentage.calculate(quote.send_amount);
            }
        }
    }
    Ok(quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTC: Pair = Pair::new(Currency::Btc, Currency::Btc);

    fn estimations(btc: f64, liquid: f64) -> FeeEstimations {
        HashMap::from([(Currency::Btc, btc), (Currency::Liquid, liquid)])
    }

    #[test]
    fn test_network_fee() {
        let est = estimations(2.0, 0.1);
        assert_eq!(calc_network_fee(SwapType::Submarine, BTC, &est, false), 302);
        let to_liquid = Pair::new(Currency::Btc, Currency::Liquid);
        assert_eq!(calc_network_fee(SwapType::Reverse, to_liquid, &est, false), 251);
        assert_eq!(calc_network_fee(SwapType::Reverse, to_liquid, &est, true), 382);

        let est = estimations(10.0, 0.1);
        assert_eq!(calc_network_fee(SwapType::Chain, to_liquid, &est, false), 1510 + 251);
    }

    #[test]
    fn test_check_amounts_within_tolerance() {
        let est = estimations(2.0, 0.1);
        let fee = Percentage(0.1);
        // 100 service fee, 302 expected network fee, up to 1500 slack
        let receive = 100_000;
        assert!(check_amounts(SwapType::Submarine, BTC, receive + 100 + 302, receive, fee, &est).is_ok());
        assert!(check_amounts(SwapType::Submarine, BTC, receive + 100 + 1802, receive, fee, &est).is_ok());

        let err = check_amounts(SwapType::Submarine, BTC, receive + 100 + 1900, receive, fee, &est).unwrap_err();
        assert_eq!(err.to_string(), "onchain fee way above expectation: 1900 > 302+1500");
    }

    #[test]
    fn test_relative_tolerance_for_large_fees() {
        let est = estimations(100.0, 0.1);
        // 15400 expected, 25% slack is 3850
        let send = 1_000_000;
        let fee = Percentage(0.5);
        let service = fee.calculate(send);
        assert_eq!(service, 5_000);

        let receive = send - service - 15_400 - 3_850;
        assert!(check_amounts(SwapType::Reverse, BTC, send, receive, fee, &est).is_ok());
        let err = check_amounts(SwapType::Reverse, BTC, send, receive - 1, fee, &est).unwrap_err();
        assert_eq!(
            err,
            FeeError::AboveExpectation { actual: 19_251, expected: 15_400, tolerance: 3_850 }
        );
    }

    #[test]
    fn test_receive_above_send_counts_as_zero_fee() {
        let est = estimations(2.0, 0.1);
        assert!(check_amounts(SwapType::Chain, BTC, 1_000, 2_000, Percentage(0.1), &est).is_ok());
    }

    #[test]
    fn test_missing_estimation() {
        let est = HashMap::from([(Currency::Btc, 2.0)]);
        let pair = Pair::new(Currency::Btc, Currency::Liquid);
        assert_eq!(
            check_amounts(SwapType::Chain, pair, 10_000, 9_000, Percentage(0.1), &est),
            Err(FeeError::MissingEstimation(Currency::Liquid))
        );
        assert!(check_amounts(SwapType::Submarine, pair, 10_000, 9_000, Percentage(0.1), &est).is_ok());
    }

    #[test]
    fn test_fee_estimate() {
        let fees = SwapFees { percentage: Percentage(0.1), miner_fees: 500 };
        assert_eq!(calculate_fee_estimate(fees, 100_000), 600);
    }

    #[test]
    fn test_quote_from_send_amount() {
        let fees = SwapFees { percentage: Percentage(0.1), miner_fees: 500 };
        let quote = calculate_swap_quote(SwapType::Submarine, 100_000, 0, fees).unwrap();
        assert_eq!(quote.receive_amount, 99_400);
        assert_eq!(quote.service_fee, 100);
        assert_eq!(quote.network_fee, 500);

        let quote = calculate_swap_quote(SwapType::Reverse, 100_000, 0, fees).unwrap();
        assert_eq!(quote.service_fee, 100);
        assert_eq!(quote.receive_amount, 99_400);
    }

    #[test]
    fn test_quote_from_receive_amount() {
        let fees = SwapFees { percentage: Percentage(0.5), miner_fees: 500 };
        let quote = calculate_swap_quote(SwapType::Chain, 0, 100_000, fees).unwrap();
        assert_eq!(quote.send_amount, 101_006);
        assert_eq!(quote.service_fee, 506);

        let quote = calculate_swap_quote(SwapType::Submarine, 0, 100_000, fees).unwrap();
        assert_eq!(quote.service_fee, 500);
        assert_eq!(quote.send_amount, 101_000);
    }

    #[test]
    fn test_quote_argument_errors() {
        let fees = SwapFees::default();
        assert_eq!(
            calculate_swap_quote(SwapType::Reverse, 1, 1, fees).unwrap_err().to_string(),
            "cant have both send and receive amount"
        );
        assert!(calculate_swap_quote(SwapType::Reverse, 0, 0, fees).is_err());
        let all = SwapFees { percentage: Percentage(100.0), miner_fees: 0 };
        assert_eq!(
            calculate_swap_quote(SwapType::Reverse, 0, 10, all).unwrap_err(),
            FeeError::InvalidQuote("division by zero")
        );
    }
}
