//! `UnitProduct`: an immutable formal monomial over unit (or base
//! dimension) names, e.g. `centimeter^1 * second^-1`. This is the
//! algebraic kernel used by `Quantity`, `Registry` and the expression
//! parser — the same type represents both a quantity's units (keyed by
//! unit spelling) and a dimensionality (keyed by base-dimension name).

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitProduct {
    exponents: BTreeMap<String, f64>,
}

impl UnitProduct {
    /// The empty (dimensionless) product.
    pub fn dimensionless() -> Self {
        Self::default()
    }

    pub fn single(name: impl Into<String>, exponent: f64) -> Self {
        let mut product = Self::default();
        product.set(name, exponent);
        product
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut product = Self::default();
        for (name, exponent) in pairs {
            product.set(name, exponent);
        }
        product
    }

    fn set(&mut self, name: impl Into<String>, exponent: f64) {
        let name = name.into();
        if exponent == 0.0 {
            self.exponents.remove(&name);
        } else {
            self.exponents.insert(name, exponent);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exponents.is_empty()
    }

    pub fn get(&self, name: &str) -> f64 {
        self.exponents.get(name).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.exponents.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.exponents.len()
    }

    /// `∏ self_i * other_i`: sum exponents key-wise, dropping zeros.
    pub fn multiply(&self, other: &UnitProduct) -> UnitProduct {
        let mut result = self.clone();
        for (name, exponent) in other.iter() {
            let combined = result.get(name) + exponent;
            result.set(name, combined);
        }
        result
    }

    /// `self / other`: subtract exponents key-wise, dropping zeros.
    pub fn divide(&self, other: &UnitProduct) -> UnitProduct {
        let mut result = self.clone();
        for (name, exponent) in other.iter() {
            let combined = result.get(name) - exponent;
            result.set(name, combined);
        }
        result
    }

    /// `self ^ n`: multiply every exponent by `n`. `n` may be
    /// non-integer (`meter^2.5`).
    pub fn power(&self, n: f64) -> UnitProduct {
        if n == 0.0 {
            return UnitProduct::dimensionless();
        }
        let mut result = UnitProduct::default();
        for (name, exponent) in self.iter() {
            result.set(name, exponent * n);
        }
        result
    }
}

impl fmt::Display for UnitProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "dimensionless");
        }

        let format_term = |name: &str, exponent: f64| -> String {
            let magnitude = exponent.abs();
            if (magnitude - magnitude.round()).abs() < f64::EPSILON {
                if magnitude == 1.0 {
                    name.to_string()
                } else {
                    format!("{}^{}", name, magnitude as i64)
                }
            } else {
                format!("{}^{}", name, magnitude)
            }
        };

        let mut positive: Vec<String> = self
            .iter()
            .filter(|(_, e)| *e > 0.0)
            .map(|(n, e)| format_term(n, e))
            .collect();
        positive.sort();

        let mut negative: Vec<String> = self
            .iter()
            .filter(|(_, e)| *e < 0.0)
            .map(|(n, e)| format_term(n, e))
            .collect();
        negative.sort();

        if positive.is_empty() && !negative.is_empty() {
            write!(f, "1 / {}", negative.join(" * "))
        } else if negative.is_empty() {
            write!(f, "{}", positive.join(" * "))
        } else {
            write!(f, "{} / {}", positive.join(" * "), negative.join(" * "))
        }
    }
}
