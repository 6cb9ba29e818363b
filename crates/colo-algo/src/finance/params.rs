use std::collections::BTreeMap;

use colo_core::{ColoError, ColoResult, Topology};
use serde::{Deserialize, Serialize};

/// Capex/opex and financing assumptions.
///
/// Every key is optional; omitted keys take the defaults below. The default
/// set describes a flat, unlevered, untaxed project settled at the marginal
/// loss factor typical of its topology. [`FinanceParams::reference_case`]
/// carries the fuller assumption set of a bankable study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinanceParams {
    pub pv_capex_per_mw: f64,
    pub bess_capex_per_mw: f64,
    pub bess_capex_per_mwh: f64,
    /// Capex reduction for hybrids (shared inverter, connection, civil works).
    pub synergy_discount_pct: f64,
    pub fixed_opex_per_mw_year: f64,
    pub variable_opex_per_mwh: f64,
    /// Annual insurance as a share of capex.
    pub insurance_pct: f64,
    pub discount_rate: f64,
    pub horizon_years: u32,
    /// Annual escalation of revenue and opex.
    pub escalation_rate: f64,
    /// Annual output decline of the PV plant.
    pub pv_degradation_pct: f64,
    /// Annual throughput decline of the battery.
    pub bess_degradation_pct: f64,
    /// Marginal loss factor on market settlements; [`default_mlf`] when unset.
    pub mlf: Option<f64>,
    /// Tax on positive taxable income (after depreciation and interest).
    pub tax_rate: f64,
    pub debt_fraction: f64,
    pub debt_interest_rate: f64,
    pub debt_term_years: u32,
}

/// Marginal loss factor of a typical site for each topology: a standalone
/// battery can sit at a strong node, co-located plant inherits the solar
/// site's node, and DC coupling adds inverter losses on top.
pub fn default_mlf(topology: Topology) -> f64 {
    match topology {
        Topology::Standalone => 0.98,
        Topology::AcCoupled => 0.90,
        Topology::DcCoupled => 0.88,
    }
}

impl Default for FinanceParams {
    fn default() -> Self {
        Self {
            pv_capex_per_mw: 1_000_000.0,
            bess_capex_per_mw: 200_000.0,
            bess_capex_per_mwh: 150_000.0,
            synergy_discount_pct: 0.05,
            fixed_opex_per_mw_year: 15_000.0,
            variable_opex_per_mwh: 2.0,
            insurance_pct: 0.0,
            discount_rate: 0.08,
            horizon_years: 15,
            escalation_rate: 0.0,
            pv_degradation_pct: 0.0,
            bess_degradation_pct: 0.0,
            mlf: None,
            tax_rate: 0.0,
            debt_fraction: 0.0,
            debt_interest_rate: 0.065,
            debt_term_years: 15,
        }
    }
}

impl FinanceParams {
    /// Levered, taxed case with degrading assets and inflation.
    pub fn reference_case() -> Self {
        Self {
            insurance_pct: 0.005,
            escalation_rate: 0.025,
            pv_degradation_pct: 0.005,
            bess_degradation_pct: 0.02,
            tax_rate: 0.30,
            debt_fraction: 0.70,
            ..Self::default()
        }
    }

    /// Loss factor applied to a site of `topology`.
    pub fn mlf_for(&self, topology: Topology) -> f64 {
        self.mlf.unwrap_or_else(|| default_mlf(topology))
    }

    /// Build from a `key -> number` option map.
    ///
    /// Unknown keys and non-integral year counts are configuration errors.
    pub fn from_options(options: &BTreeMap<String, f64>) -> ColoResult<Self> {
        let mut map = serde_json::Map::new();
        for (key, value) in options {
            let number = if value.fract() == 0.0 && value.abs() < 1e15 {
                serde_json::Number::from(*value as i64)
            } else {
                serde_json::Number::from_f64(*value).ok_or_else(|| {
                    ColoError::Configuration(format!("finance option {key} is not finite"))
                })?
            };
            map.insert(key.clone(), serde_json::Value::Number(number));
        }
        let params: FinanceParams = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| ColoError::Configuration(format!("finance options: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> ColoResult<()> {
        for (name, v) in [
            ("pv_capex_per_mw", self.pv_capex_per_mw),
            ("bess_capex_per_mw", self.bess_capex_per_mw),
            ("bess_capex_per_mwh", self.bess_capex_per_mwh),
            ("fixed_opex_per_mw_year", self.fixed_opex_per_mw_year),
            ("variable_opex_per_mwh", self.variable_opex_per_mwh),
            ("insurance_pct", self.insurance_pct),
            ("debt_interest_rate", self.debt_interest_rate),
        ] {
            if !(v >= 0.0) || !v.is_finite() {
                return Err(ColoError::Configuration(format!(
                    "{name} must be a finite value >= 0, got {v}"
                )));
            }
        }
        for (name, v) in [
            ("synergy_discount_pct", self.synergy_discount_pct),
            ("pv_degradation_pct", self.pv_degradation_pct),
            ("bess_degradation_pct", self.bess_degradation_pct),
            ("tax_rate", self.tax_rate),
        ] {
            if !(0.0..1.0).contains(&v) {
                return Err(ColoError::Configuration(format!(
                    "{name} must be in [0, 1), got {v}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.debt_fraction) {
            return Err(ColoError::Configuration(format!(
                "debt_fraction must be in [0, 1], got {}",
                self.debt_fraction
            )));
        }
        if !(self.discount_rate > -1.0) || !(self.escalation_rate > -1.0) {
            return Err(ColoError::Configuration(
                "discount_rate and escalation_rate must be > -1".into(),
            ));
        }
        if let Some(mlf) = self.mlf {
            if !(mlf > 0.0) || !mlf.is_finite() {
                return Err(ColoError::Configuration(format!("mlf must be > 0, got {mlf}")));
            }
        }
        if self.horizon_years == 0 {
            return Err(ColoError::Configuration("horizon_years must be >= 1".into()));
        }
        if self.debt_fraction > 0.0 && self.debt_term_years == 0 {
            return Err(ColoError::Configuration(
                "debt_term_years must be >= 1 when debt_fraction > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_keys_use_defaults() {
        let mut options = BTreeMap::new();
        options.insert("discount_rate".to_string(), 0.07);
        options.insert("horizon_years".to_string(), 20.0);
        let params = FinanceParams::from_options(&options).unwrap();
        assert_eq!(params.discount_rate, 0.07);
        assert_eq!(params.horizon_years, 20);
        assert_eq!(params.bess_capex_per_mwh, 150_000.0);
    }

    #[test]
    fn unknown_key_is_configuration_error() {
        let mut options = BTreeMap::new();
        options.insert("wacc".to_string(), 0.07);
        let err = FinanceParams::from_options(&options).unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("wacc"));
    }

    #[test]
    fn tax_insurance_and_degradation_keys_are_recognised() {
        let mut options = BTreeMap::new();
        options.insert("tax_rate".to_string(), 0.3);
        options.insert("insurance_pct".to_string(), 0.005);
        options.insert("pv_degradation_pct".to_string(), 0.005);
        options.insert("bess_degradation_pct".to_string(), 0.02);
        options.insert("mlf".to_string(), 1.0);
        let params = FinanceParams::from_options(&options).unwrap();
        assert_eq!(params.tax_rate, 0.3);
        assert_eq!(params.insurance_pct, 0.005);
        assert_eq!(params.bess_degradation_pct, 0.02);
        assert_eq!(params.mlf_for(Topology::DcCoupled), 1.0);
    }

    #[test]
    fn loss_factor_defaults_follow_topology() {
        let params = FinanceParams::default();
        assert_eq!(params.mlf_for(Topology::Standalone), 0.98);
        assert_eq!(params.mlf_for(Topology::AcCoupled), 0.90);
        assert_eq!(params.mlf_for(Topology::DcCoupled), 0.88);
    }

    #[test]
    fn reference_case_is_levered_and_taxed() {
        let params = FinanceParams::reference_case();
        assert!(params.validate().is_ok());
        assert_eq!(params.tax_rate, 0.30);
        assert_eq!(params.debt_fraction, 0.70);
        assert_eq!(params.horizon_years, 15);
        assert!(params.mlf.is_none());
    }

    #[test]
    fn fractional_horizon_is_rejected() {
        let mut options = BTreeMap::new();
        options.insert("horizon_years".to_string(), 12.5);
        assert!(FinanceParams::from_options(&options).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut options = BTreeMap::new();
        options.insert("synergy_discount_pct".to_string(), 1.5);
        assert!(FinanceParams::from_options(&options).is_err());

        let mut options = BTreeMap::new();
        options.insert("tax_rate".to_string(), 1.0);
        assert!(FinanceParams::from_options(&options).is_err());
    }
}
