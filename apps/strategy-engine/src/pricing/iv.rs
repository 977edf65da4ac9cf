//! Implied volatility solver.
//!
//! Newton-Raphson from a Brenner-Subrahmanyam starting point, with bisection
//! as the fallback when vega collapses (deep ITM/OTM) or Newton fails to
//! converge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::black_scholes::{BsInputs, price, raw_vega};
use crate::chain::OptionRight;

/// Errors from IV computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IvError {
    /// Invalid input parameters.
    #[error("Invalid IV input: {message}")]
    InvalidInput {
        /// Error message.
        message: String,
    },

    /// Price is outside the range any volatility in bounds can produce.
    #[error("No IV solution: {reason}")]
    NoSolution {
        /// Reason no solution exists.
        reason: String,
    },

    /// Solver ran out of iterations.
    #[error("IV solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Iterations attempted.
        iterations: u32,
    },
}

/// IV solver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvSolverConfig {
    /// Maximum iterations per method.
    pub max_iterations: u32,
    /// Absolute price tolerance.
    pub tolerance: f64,
    /// Lower volatility bound.
    pub min_vol: f64,
    /// Upper volatility bound.
    pub max_vol: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
            min_vol: 0.001,
            max_vol: 5.0,
        }
    }
}

/// Implied volatility solver.
#[derive(Debug, Clone, Default)]
pub struct IvSolver {
    config: IvSolverConfig,
}

impl IvSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub const fn new(config: IvSolverConfig) -> Self {
        Self { config }
    }

    /// Solve for the volatility that reproduces `market_price`.
    pub fn solve(
        &self,
        market_price: f64,
        inputs: &BsInputs,
        right: OptionRight,
    ) -> Result<f64, IvError> {
        if !(market_price.is_finite() && market_price > 0.0) {
            return Err(IvError::InvalidInput {
                message: format!("market price must be positive, got {market_price}"),
            });
        }
        if !inputs.is_valid() {
            return Err(IvError::InvalidInput {
                message: format!("spot/strike/time must be positive: {inputs:?}"),
            });
        }

        let floor = price(inputs, self.config.min_vol, right);
        let ceiling = price(inputs, self.config.max_vol, right);
        if market_price < floor - self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!("price {market_price:.4} below minimum model value {floor:.4}"),
            });
        }
        if market_price > ceiling + self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!("price {market_price:.4} above maximum model value {ceiling:.4}"),
            });
        }

        self.newton(market_price, inputs, right)
            .or_else(|_| self.bisection(market_price, inputs, right))
    }

    fn initial_guess(&self, market_price: f64, inputs: &BsInputs) -> f64 {
        let guess = (2.0 * std::f64::consts::PI / inputs.t).sqrt() * market_price / inputs.spot;
        guess.clamp(0.05, 1.5)
    }

    fn newton(
        &self,
        market_price: f64,
        inputs: &BsInputs,
        right: OptionRight,
    ) -> Result<f64, IvError> {
        let mut sigma = self.initial_guess(market_price, inputs);

        for iteration in 0..self.config.max_iterations {
            let error = price(inputs, sigma, right) - market_price;
            if error.abs() < self.config.tolerance {
                return Ok(sigma);
            }
            let vega = raw_vega(inputs, sigma);
            if vega < 1e-10 {
                return Err(IvError::ConvergenceFailed {
                    iterations: iteration,
                });
            }
            sigma = (sigma - error / vega).clamp(self.config.min_vol, self.config.max_vol);
        }

        Err(IvError::ConvergenceFailed {
            iterations: self.config.max_iterations,
        })
    }

    fn bisection(
        &self,
        market_price: f64,
        inputs: &BsInputs,
        right: OptionRight,
    ) -> Result<f64, IvError> {
        let (mut low, mut high) = (self.config.min_vol, self.config.max_vol);

        for _ in 0..self.config.max_iterations {
            let mid = low.midpoint(high);
            let error = price(inputs, mid, right) - market_price;
            if error.abs() < self.config.tolerance || high - low < 1e-10 {
                return Ok(mid);
            }
            if error > 0.0 {
                high = mid;
            } else {
                low = mid;
            }
        }

        Err(IvError::ConvergenceFailed {
            iterations: self.config.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(100.0, 100.0, 1.0, 0.25, OptionRight::Call ; "atm call")]
    #[test_case(100.0, 100.0, 0.5, 0.30, OptionRight::Put ; "atm put")]
    #[test_case(100.0, 130.0, 0.25, 0.35, OptionRight::Call ; "otm call")]
    #[test_case(100.0, 120.0, 0.5, 0.28, OptionRight::Put ; "itm put")]
    #[test_case(50.0, 50.0, 0.1, 1.50, OptionRight::Call ; "high vol")]
    fn recovers_known_volatility(spot: f64, strike: f64, t: f64, true_iv: f64, right: OptionRight) {
        let inputs = BsInputs {
            spot,
            strike,
            t,
            rate: 0.04,
            dividend: 0.0,
        };
        let market_price = price(&inputs, true_iv, right);
        let solved = IvSolver::default()
            .solve(market_price, &inputs, right)
            .unwrap();
        assert!((solved - true_iv).abs() < 0.005, "solved {solved} vs {true_iv}");
    }

    #[test]
    fn rejects_non_positive_price() {
        let inputs = BsInputs {
            spot: 100.0,
            strike: 100.0,
            t: 1.0,
            rate: 0.05,
            dividend: 0.0,
        };
        assert!(matches!(
            IvSolver::default().solve(0.0, &inputs, OptionRight::Call),
            Err(IvError::InvalidInput { .. })
        ));
    }

    #[test]
    fn rejects_price_below_intrinsic() {
        let inputs = BsInputs {
            spot: 120.0,
            strike: 100.0,
            t: 0.5,
            rate: 0.05,
            dividend: 0.0,
        };
        assert!(matches!(
            IvSolver::default().solve(15.0, &inputs, OptionRight::Call),
            Err(IvError::NoSolution { .. })
        ));
    }
}
