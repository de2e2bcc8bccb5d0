//! Coupon catalog: the set of recognized promo codes and their terms.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const BPS_MAX: u16 = 10_000;

/// Trim and upper-case a customer-typed code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// How often one customer may redeem a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsagePolicy {
    Unlimited,
    SingleUsePerCustomer,
}

/// A promotional code with a fixed percentage discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Normalized code (upper-case, trimmed)
    pub code: String,

    /// Discount in basis points (1_000 = 10%)
    pub percent_bps: u16,

    pub policy: UsagePolicy,

    /// Retired codes stay listed for history but no longer validate.
    #[serde(default)]
    pub retired: bool,
}

impl Coupon {
    pub fn new(code: &str, percent_bps: u16, policy: UsagePolicy) -> Self {
        Coupon {
            code: normalize_code(code),
            percent_bps,
            policy,
            retired: false,
        }
    }

    pub fn retired(mut self) -> Self {
        self.retired = true;
        self
    }

    pub fn is_single_use(&self) -> bool {
        self.policy == UsagePolicy::SingleUsePerCustomer
    }

    pub fn validate(&self) -> Result<()> {
        if self.code.is_empty() {
            return Err(Error::ConfigError("Coupon code must not be empty".to_string()));
        }
        if self.code != normalize_code(&self.code) {
            return Err(Error::ConfigError(format!(
                "Coupon code {:?} is not normalized",
                self.code
            )));
        }
        if self.percent_bps > BPS_MAX {
            return Err(Error::ConfigError(format!(
                "Coupon {} discount {} bps exceeds 100%",
                self.code, self.percent_bps
            )));
        }
        Ok(())
    }
}

/// Injectable coupon registry, keyed by normalized code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponCatalog {
    coupons: BTreeMap<String, Coupon>,
}

impl CouponCatalog {
    pub fn new() -> Self {
        CouponCatalog::default()
    }

    /// The codes the site currently ships with.
    pub fn standard() -> Self {
        let mut catalog = CouponCatalog::new();
        catalog.put(Coupon::new("ARTHEMI10", 1_000, UsagePolicy::Unlimited));
        catalog.put(Coupon::new(
            "PRIMEIRACOMPRA",
            1_500,
            UsagePolicy::SingleUsePerCustomer,
        ));
        catalog.put(Coupon::new("TESTE50", 5_000, UsagePolicy::Unlimited).retired());
        catalog
    }

    /// Build from a list, rejecting malformed or duplicate entries.
    pub fn from_coupons(coupons: Vec<Coupon>) -> Result<Self> {
        let mut catalog = CouponCatalog::new();
        for mut coupon in coupons {
            coupon.code = normalize_code(&coupon.code);
            if catalog.coupons.contains_key(&coupon.code) {
                return Err(Error::ConfigError(format!(
                    "Duplicate coupon code {}",
                    coupon.code
                )));
            }
            catalog.insert(coupon)?;
        }
        Ok(catalog)
    }

    /// Load a JSON array of coupons.
    pub fn from_json(json: &str) -> Result<Self> {
        let coupons: Vec<Coupon> = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("Failed to parse coupon catalog: {}", e)))?;
        Self::from_coupons(coupons)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read coupon catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Add or replace a coupon after validating it.
    pub fn insert(&mut self, coupon: Coupon) -> Result<()> {
        coupon.validate()?;
        self.put(coupon);
        Ok(())
    }

    fn put(&mut self, coupon: Coupon) {
        self.coupons.insert(coupon.code.clone(), coupon);
    }

    /// Look up an active coupon. Retired and unknown codes return None.
    pub fn get(&self, code: &str) -> Option<&Coupon> {
        self.coupons
            .get(&normalize_code(code))
            .filter(|c| !c.retired)
    }

    pub fn is_valid_coupon(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// All coupons, retired included, ordered by code.
    pub fn iter(&self) -> impl Iterator<Item = &Coupon> {
        self.coupons.values()
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }
}
