//! Threshold-based escalation policy.
//!
//! A request whose amount exceeds the escalation threshold needs a second
//! (admin) approval after the manager tier. Requests without an amount are
//! treated as below threshold and settle with a single approval.

use bigdecimal::BigDecimal;

/// Decide whether an amount forces the two-tier approval path.
///
/// The comparison is strictly greater-than: a request priced exactly at the
/// threshold stays single-tier.
pub fn requires_admin_approval(amount: Option<&BigDecimal>, threshold: &BigDecimal) -> bool {
    match amount {
        Some(amount) => amount > threshold,
        None => false,
    }
}

/// Effective threshold for a request type: the per-type override when one
/// is configured, otherwise the service-wide default.
pub fn effective_threshold(override_value: Option<BigDecimal>, default: &BigDecimal) -> BigDecimal {
    override_value.unwrap_or_else(|| default.clone())
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::{effective_threshold, requires_admin_approval};

    fn threshold() -> BigDecimal {
        BigDecimal::from(5000)
    }

    #[test]
    fn amount_above_threshold_escalates() {
        let amount = BigDecimal::from(6000);
        assert!(requires_admin_approval(Some(&amount), &threshold()));
    }

    #[test]
    fn amount_at_threshold_stays_single_tier() {
        let amount = BigDecimal::from(5000);
        assert!(!requires_admin_approval(Some(&amount), &threshold()));
    }

    #[test]
    fn amount_below_threshold_stays_single_tier() {
        let amount = BigDecimal::from(1000);
        assert!(!requires_admin_approval(Some(&amount), &threshold()));
    }

    #[test]
    fn missing_amount_never_escalates() {
        assert!(!requires_admin_approval(None, &threshold()));
    }

    #[test]
    fn override_threshold_wins_over_default() {
        let resolved = effective_threshold(Some(BigDecimal::from(250)), &threshold());
        assert_eq!(resolved, BigDecimal::from(250));
    }

    #[test]
    fn default_threshold_applies_without_override() {
        let resolved = effective_threshold(None, &threshold());
        assert_eq!(resolved, BigDecimal::from(5000));
    }
}
