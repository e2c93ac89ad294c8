//! Monetary cost of a single generation.

/// Number of decimal places cost values are rounded to. Keeping every
/// per-pair cost on this grid stops float drift from accumulating across
/// the batch-level sums.
const COST_DECIMALS: i32 = 8;

/// Cost of one generation: token counts times per-token prices, rounded
/// to eight decimal places. Pure function.
pub fn completion_cost(
    prompt_tokens: u32,
    completion_tokens: u32,
    prompt_price: f64,
    completion_price: f64,
) -> f64 {
    let raw = f64::from(prompt_tokens) * prompt_price
        + f64::from(completion_tokens) * completion_price;
    round_to_decimals(raw, COST_DECIMALS)
}

/// Round to `places` decimal places, half away from zero.
pub(crate) fn round_to_decimals(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_is_token_weighted_price_sum() {
        // 1000 prompt tokens at $1/M plus 500 completion tokens at $2/M
        let cost = completion_cost(1000, 500, 1e-6, 2e-6);
        assert!((cost - 0.002).abs() < 1e-12);
    }

    #[test]
    fn cost_rounds_to_eight_decimals() {
        let cost = completion_cost(1, 1, 1.23e-9, 1.0e-9);
        assert_eq!(cost, 0.0);

        let cost = completion_cost(7, 0, 3.333_333_33e-7, 0.0);
        assert_eq!(cost, 0.00000233);
    }

    #[test]
    fn cost_is_idempotent() {
        let a = completion_cost(421, 987, 2.5e-7, 1.25e-6);
        let b = completion_cost(421, 987, 2.5e-7, 1.25e-6);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_tokens_cost_nothing() {
        assert_eq!(completion_cost(0, 0, 1e-6, 2e-6), 0.0);
    }
}
