//! Black-Scholes pricing, closed-form delta/gamma and the implied volatility solver.
//!
//! No dividend yield is modelled. Volatility is non-negative; at zero volatility
//! prices collapse to the discounted forward intrinsic value, delta to a step
//! function of forward moneyness and gamma to zero.

use std::f64::consts::{PI, SQRT_2};

use chain_common::{ChainError, ContractType};
use libm::erf;

/// Upper end of the volatility search interval.
pub const MAX_VOL: f64 = 10.0;
/// Lower end of the volatility search interval.
pub const MIN_VOL: f64 = 1e-6;

const PRICE_TOLERANCE: f64 = 1e-8;
const NEWTON_MAX_ITERS: usize = 100;
const BISECTION_MAX_ITERS: usize = 200;

/// Delta and gamma for one contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Greeks {
    /// dV/dS.
    pub delta: f64,
    /// d²V/dS².
    pub gamma: f64,
}

/// Standard normal CDF.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Standard normal PDF.
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Black-Scholes d1 parameter.
pub fn d1(spot: f64, strike: f64, rate: f64, vol: f64, time: f64) -> f64 {
    ((spot / strike).ln() + (rate + 0.5 * vol * vol) * time) / (vol * time.sqrt())
}

/// European option price.
pub fn price(
    contract: ContractType,
    spot: f64,
    strike: f64,
    rate: f64,
    vol: f64,
    time: f64,
) -> f64 {
    let df = (-rate * time).exp();
    if vol <= 0.0 || time <= 0.0 {
        return contract.intrinsic(spot, strike * df);
    }

    let d1 = d1(spot, strike, rate, vol, time);
    let d2 = d1 - vol * time.sqrt();
    match contract {
        ContractType::Call => spot * norm_cdf(d1) - strike * df * norm_cdf(d2),
        ContractType::Put => strike * df * norm_cdf(-d2) - spot * norm_cdf(-d1),
    }
}

/// Vega: dV/dσ (identical for calls and puts).
pub fn vega(spot: f64, strike: f64, rate: f64, vol: f64, time: f64) -> f64 {
    spot * norm_pdf(d1(spot, strike, rate, vol, time)) * time.sqrt()
}

/// Gamma: d²V/dS². Shared by calls and puts; zero at zero volatility.
pub fn gamma(spot: f64, strike: f64, rate: f64, vol: f64, time: f64) -> f64 {
    if vol <= 0.0 {
        return 0.0;
    }
    norm_pdf(d1(spot, strike, rate, vol, time)) / (spot * vol * time.sqrt())
}

/// Delta: dV/dS. Calls in `[0, 1]`, puts in `[-1, 0]`.
pub fn delta(
    contract: ContractType,
    spot: f64,
    strike: f64,
    rate: f64,
    vol: f64,
    time: f64,
) -> f64 {
    let call_delta = if vol <= 0.0 {
        // limit of N(d1) as vol -> 0
        let moneyness = (spot / strike).ln() + rate * time;
        if moneyness > 0.0 {
            1.0
        } else if moneyness < 0.0 {
            0.0
        } else {
            0.5
        }
    } else {
        norm_cdf(d1(spot, strike, rate, vol, time))
    };

    match contract {
        ContractType::Call => call_delta,
        ContractType::Put => call_delta - 1.0,
    }
}

/// Delta and gamma, failing on inputs where the closed forms are undefined.
pub fn greeks(
    contract: ContractType,
    spot: f64,
    strike: f64,
    rate: f64,
    vol: f64,
    time: f64,
) -> Result<Greeks, ChainError> {
    let inputs_valid = [spot, strike, rate, vol, time].iter().all(|v| v.is_finite())
        && spot > 0.0
        && strike > 0.0
        && time > 0.0
        && vol >= 0.0;
    if !inputs_valid {
        return Err(ChainError::Math(format!(
            "degenerate inputs: spot={spot} strike={strike} rate={rate} vol={vol} time={time}"
        )));
    }

    let greeks = Greeks {
        delta: delta(contract, spot, strike, rate, vol, time),
        gamma: gamma(spot, strike, rate, vol, time),
    };
    if !greeks.delta.is_finite() || !greeks.gamma.is_finite() {
        return Err(ChainError::Math(format!(
            "non-finite greeks for {contract} strike {strike}: {greeks:?}"
        )));
    }
    Ok(greeks)
}

/// No-arbitrage price bounds `(lower, upper)`.
///
/// Calls: `max(S - K·e^{-rT}, 0) .. S`. Puts: `max(K·e^{-rT} - S, 0) .. K·e^{-rT}`.
pub fn price_bounds(contract: ContractType, spot: f64, strike: f64, rate: f64, time: f64) -> (f64, f64) {
    let discounted_strike = strike * (-rate * time).exp();
    let lower = contract.intrinsic(spot, discounted_strike);
    let upper = match contract {
        ContractType::Call => spot,
        ContractType::Put => discounted_strike,
    };
    (lower, upper)
}

/// Solve for the volatility that reprices `premium`.
///
/// Returns `None` when the premium is not strictly inside the no-arbitrage bounds
/// or when neither Newton-Raphson nor the bisection fallback converges.
pub fn implied_volatility(
    contract: ContractType,
    premium: f64,
    spot: f64,
    strike: f64,
    rate: f64,
    time: f64,
) -> Option<f64> {
    let finite = [premium, spot, strike, rate, time].iter().all(|v| v.is_finite());
    if !finite || spot <= 0.0 || strike <= 0.0 || time <= 0.0 {
        return None;
    }
    let (lower, upper) = price_bounds(contract, spot, strike, rate, time);
    if premium <= lower || premium >= upper {
        return None;
    }

    // Brenner-Subrahmanyam starting point
    let mut vol = (premium / (0.4 * spot * time.sqrt())).clamp(0.01, 3.0);
    for _ in 0..NEWTON_MAX_ITERS {
        let diff = price(contract, spot, strike, rate, vol, time) - premium;
        if diff.abs() < PRICE_TOLERANCE {
            return Some(vol);
        }
        let vega = vega(spot, strike, rate, vol, time);
        if !vega.is_finite() || vega < 1e-12 {
            break;
        }
        let next = vol - diff / vega;
        if !next.is_finite() || next <= MIN_VOL || next >= MAX_VOL {
            break;
        }
        vol = next;
    }

    bisection(contract, premium, spot, strike, rate, time)
}

fn bisection(
    contract: ContractType,
    premium: f64,
    spot: f64,
    strike: f64,
    rate: f64,
    time: f64,
) -> Option<f64> {
    let mut low = MIN_VOL;
    let mut high = MAX_VOL;
    if price(contract, spot, strike, rate, low, time) > premium
        || price(contract, spot, strike, rate, high, time) < premium
    {
        return None;
    }

    for _ in 0..BISECTION_MAX_ITERS {
        let mid = 0.5 * (low + high);
        let diff = price(contract, spot, strike, rate, mid, time) - premium;
        if diff.abs() < PRICE_TOLERANCE || high - low < 1e-12 {
            return Some(mid);
        }
        if diff > 0.0 {
            high = mid;
        } else {
            low = mid;
        }
    }
    None
}
