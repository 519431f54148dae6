//! A physical quantity: a magnitude paired with a `UnitProduct`. The
//! magnitude is stored in whatever units it was constructed with, not
//! pre-converted to base units — keeping a `Registry` out of the struct
//! lets conversion stay an explicit, fallible operation (`to`,
//! `to_reference`) instead of an implicit one baked into construction.

use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::errors::UnitsError;
use crate::numeric::MathOps;
use crate::registry::Registry;
use crate::unit_product::UnitProduct;

#[derive(Debug, Clone)]
pub struct Quantity<T: MathOps> {
    magnitude: Option<T>,
    units: UnitProduct,
}

impl<T: MathOps> Quantity<T> {
    pub fn new(magnitude: T, units: UnitProduct) -> Self {
        Self {
            magnitude: Some(magnitude),
            units,
        }
    }

    /// A quantity that carries only dimensional information, no value.
    pub fn without_magnitude(units: UnitProduct) -> Self {
        Self { magnitude: None, units }
    }

    pub fn magnitude(&self) -> Option<T> {
        self.magnitude
    }

    pub fn units(&self) -> &UnitProduct {
        &self.units
    }

    /// True if this quantity reduces to an empty base dimension — e.g. a
    /// `radian` is dimensionless even though it carries its own named unit.
    pub fn is_dimensionless(&self, registry: &Registry) -> Result<bool, UnitsError> {
        Ok(self.dimensionality(registry)?.is_empty())
    }

    /// True if the literal unit product is empty, with no registry lookup.
    /// A `radian` is unitless=false even though it is dimensionless=true.
    pub fn is_unitless(&self) -> bool {
        self.units.is_empty()
    }

    pub fn dimensionality(&self, registry: &Registry) -> Result<UnitProduct, UnitsError> {
        Ok(self.to_base_parts(registry)?.2)
    }

    /// The bare numeric value, only if this quantity reduces to an empty
    /// base dimension; otherwise fails with `Dimensionality`.
    pub fn as_scalar(&self, registry: &Registry) -> Result<T, UnitsError> {
        if self.is_dimensionless(registry)? {
            Ok(self.magnitude.expect("as_scalar called on a magnitude-less quantity"))
        } else {
            Err(UnitsError::dimensionality(self.units.to_string(), "dimensionless"))
        }
    }

    pub fn is_truthy(&self) -> bool {
        self.magnitude.map(|m| !m.is_zero()).unwrap_or(false)
    }

    /// Resolves `self.units` down to `(scale, offset, base dimension
    /// product)`. An offset is only honored when the quantity's units
    /// are a single affine unit raised to the first power; any other
    /// shape involving an affine unit is rejected — `degC * 2` has no
    /// sound meaning ("offset-unit not standalone").
    fn to_base_parts(&self, registry: &Registry) -> Result<(f64, f64, UnitProduct), UnitsError> {
        if self.units.len() == 1 {
            let (name, exponent) = self.units.iter().next().unwrap();
            let canonical = registry.resolve(name)?;
            if let Some(offset) = registry.offset_of(&canonical) {
                if exponent != 1.0 {
                    return Err(UnitsError::OffsetUnitNotStandalone {
                        unit: canonical,
                        units: self.units.to_string(),
                    });
                }
                let (dim, scale) = registry.reduce_unit_to_base(&canonical)?;
                return Ok((scale, offset, dim));
            }
        }

        for (name, _) in self.units.iter() {
            let canonical = registry.resolve(name)?;
            if let Some(_offset) = registry.offset_of(&canonical) {
                return Err(UnitsError::OffsetUnitNotStandalone {
                    unit: canonical,
                    units: self.units.to_string(),
                });
            }
        }

        let (dim, scale) = registry.reduce_product_to_base(&self.units)?;
        Ok((scale, 0.0, dim))
    }

    pub fn to_reference(&self, registry: &Registry) -> Result<Quantity<T>, UnitsError> {
        let (scale, offset, dim) = self.to_base_parts(registry)?;
        let magnitude = self
            .magnitude
            .map(|m| T::from_f64(m.to_f64() * scale + offset));
        Ok(Quantity { magnitude, units: dim })
    }

    pub fn to(&self, registry: &Registry, target: &UnitProduct) -> Result<Quantity<T>, UnitsError> {
        let (self_scale, self_offset, self_dim) = self.to_base_parts(registry)?;
        let target_probe: Quantity<T> = Quantity::without_magnitude(target.clone());
        let (target_scale, target_offset, target_dim) = target_probe.to_base_parts(registry)?;

        if self_dim != target_dim {
            return Err(UnitsError::dimensionality_with_dims(
                self.units.to_string(),
                target.to_string(),
                self_dim.to_string(),
                target_dim.to_string(),
            ));
        }

        let magnitude = self.magnitude.map(|m| {
            let base_value = m.to_f64() * self_scale + self_offset;
            T::from_f64((base_value - target_offset) / target_scale)
        });

        Ok(Quantity {
            magnitude,
            units: target.clone(),
        })
    }

    pub fn to_str(&self, registry: &Registry, target: &str) -> Result<Quantity<T>, UnitsError> {
        let target_quantity = registry.parse(target)?;
        self.to(registry, target_quantity.units())
    }

    pub fn add(&self, other: &Quantity<T>, registry: &Registry) -> Result<Quantity<T>, UnitsError> {
        let converted = other.to(registry, &self.units)?;
        let magnitude = match (self.magnitude, converted.magnitude) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        };
        Ok(Quantity {
            magnitude,
            units: self.units.clone(),
        })
    }

    pub fn sub(&self, other: &Quantity<T>, registry: &Registry) -> Result<Quantity<T>, UnitsError> {
        let converted = other.to(registry, &self.units)?;
        let magnitude = match (self.magnitude, converted.magnitude) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
        Ok(Quantity {
            magnitude,
            units: self.units.clone(),
        })
    }

    /// Combines units and magnitudes algebraically; no registry lookups
    /// are needed since this never crosses between equivalent spellings.
    pub fn mul(&self, other: &Quantity<T>) -> Quantity<T> {
        let magnitude = match (self.magnitude, other.magnitude) {
            (Some(a), Some(b)) => Some(a * b),
            _ => None,
        };
        Quantity {
            magnitude,
            units: self.units.multiply(&other.units),
        }
    }

    pub fn div(&self, other: &Quantity<T>) -> Quantity<T> {
        let magnitude = match (self.magnitude, other.magnitude) {
            (Some(a), Some(b)) => Some(a / b),
            _ => None,
        };
        Quantity {
            magnitude,
            units: self.units.divide(&other.units),
        }
    }

    pub fn floor_div(&self, other: &Quantity<T>) -> Quantity<T> {
        let divided = self.div(other);
        Quantity {
            magnitude: divided.magnitude.map(|m| m.floor()),
            units: divided.units,
        }
    }

    pub fn pow(&self, exponent: f64) -> Quantity<T> {
        Quantity {
            magnitude: self.magnitude.map(|m| m.powf(exponent)),
            units: self.units.power(exponent),
        }
    }

    /// Like `pow`, but rejects affine (offset) units first — raising a
    /// temperature scale to a power has no physical meaning.
    pub fn checked_pow(&self, exponent: f64, registry: &Registry) -> Result<Quantity<T>, UnitsError> {
        for (name, _) in self.units.iter() {
            let canonical = registry.resolve(name)?;
            if let Some(_offset) = registry.offset_of(&canonical) {
                return Err(UnitsError::OffsetUnitNotStandalone {
                    unit: canonical,
                    units: self.units.to_string(),
                });
            }
        }
        Ok(self.pow(exponent))
    }

    pub fn compare(&self, other: &Quantity<T>, registry: &Registry) -> Result<Option<Ordering>, UnitsError> {
        let converted = other.to(registry, &self.units)?;
        Ok(match (self.magnitude, converted.magnitude) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        })
    }
}

/// Dimensional equality, not structural equality: quantities in different
/// but convertible units compare equal (`1 meter == 1000 millimeter`).
/// Goes through `DEFAULT_REGISTRY`, same as the arithmetic operators below.
impl<T: MathOps> PartialEq for Quantity<T> {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other, &crate::DEFAULT_REGISTRY) == Ok(Some(Ordering::Equal))
    }
}

impl<T: MathOps> PartialOrd for Quantity<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other, &crate::DEFAULT_REGISTRY).unwrap_or(None)
    }
}

impl<T: MathOps> Neg for Quantity<T> {
    type Output = Quantity<T>;

    fn neg(self) -> Self::Output {
        Quantity {
            magnitude: self.magnitude.map(|m| -m),
            units: self.units,
        }
    }
}

impl<T: MathOps> Add for Quantity<T> {
    type Output = Quantity<T>;

    fn add(self, other: Quantity<T>) -> Self::Output {
        self.add(&other, &crate::DEFAULT_REGISTRY).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl<T: MathOps> Sub for Quantity<T> {
    type Output = Quantity<T>;

    fn sub(self, other: Quantity<T>) -> Self::Output {
        self.sub(&other, &crate::DEFAULT_REGISTRY).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl<T: MathOps> Mul for Quantity<T> {
    type Output = Quantity<T>;

    fn mul(self, other: Quantity<T>) -> Self::Output {
        Quantity::mul(&self, &other)
    }
}

impl<T: MathOps> Div for Quantity<T> {
    type Output = Quantity<T>;

    fn div(self, other: Quantity<T>) -> Self::Output {
        Quantity::div(&self, &other)
    }
}

impl<T: MathOps> AddAssign for Quantity<T> {
    fn add_assign(&mut self, other: Quantity<T>) {
        *self = self.clone() + other;
    }
}

impl<T: MathOps> SubAssign for Quantity<T> {
    fn sub_assign(&mut self, other: Quantity<T>) {
        *self = self.clone() - other;
    }
}

impl<T: MathOps> MulAssign for Quantity<T> {
    fn mul_assign(&mut self, other: Quantity<T>) {
        *self = self.clone() * other;
    }
}

impl<T: MathOps> DivAssign for Quantity<T> {
    fn div_assign(&mut self, other: Quantity<T>) {
        *self = self.clone() / other;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use super::*;
    use crate::registry::{Registry, UnitDefinition, UnitKind};

    fn length_registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(UnitDefinition {
                name: "meter".into(),
                kind: UnitKind::Base {
                    dimension_tag: "length".into(),
                },
                aliases: Vec::new(),
                offset: None,
            })
            .unwrap();
        registry
            .register(UnitDefinition {
                name: "kilometer".into(),
                kind: UnitKind::Derived {
                    factor: 1000.0,
                    reference: UnitProduct::single("meter", 1.0),
                },
                aliases: Vec::new(),
                offset: None,
            })
            .unwrap();
        registry
    }

    fn temperature_registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(UnitDefinition {
                name: "degK".into(),
                kind: UnitKind::Base {
                    dimension_tag: "temperature".into(),
                },
                aliases: Vec::new(),
                offset: None,
            })
            .unwrap();
        registry
            .register(UnitDefinition {
                name: "degC".into(),
                kind: UnitKind::Derived {
                    factor: 1.0,
                    reference: UnitProduct::single("degK", 1.0),
                },
                aliases: Vec::new(),
                offset: Some(273.15),
            })
            .unwrap();
        registry
    }

    #[test]
    fn converts_between_prefixed_and_base_unit() {
        let r = length_registry();
        let km = Quantity::new(2.0, UnitProduct::single("kilometer", 1.0));
        let m = km.to(&r, &UnitProduct::single("meter", 1.0)).unwrap();
        assert_eq!(m.magnitude(), Some(2000.0));
    }

    #[test]
    fn converts_affine_temperature_scale() {
        let r = temperature_registry();
        let c = Quantity::new(0.0, UnitProduct::single("degC", 1.0));
        let k = c.to(&r, &UnitProduct::single("degK", 1.0)).unwrap();
        assert_abs_diff_eq!(k.magnitude().unwrap(), 273.15, epsilon = 1e-9);
    }

    #[test]
    fn rejects_non_standalone_offset_unit() {
        let r = temperature_registry();
        let c2 = Quantity::new(1.0, UnitProduct::single("degC", 2.0));
        assert!(matches!(
            c2.to_reference(&r),
            Err(UnitsError::OffsetUnitNotStandalone { .. })
        ));
    }

    #[test]
    fn add_converts_before_combining() {
        let r = length_registry();
        let a = Quantity::new(1.0, UnitProduct::single("kilometer", 1.0));
        let b = Quantity::new(500.0, UnitProduct::single("meter", 1.0));
        let sum = a.add(&b, &r).unwrap();
        assert_eq!(sum.magnitude(), Some(1.5));
        assert_eq!(sum.units(), &UnitProduct::single("kilometer", 1.0));
    }

    #[test]
    fn mul_and_div_combine_units_without_a_registry() {
        let meter = Quantity::new(4.0, UnitProduct::single("meter", 1.0));
        let second = Quantity::new(2.0, UnitProduct::single("second", 1.0));
        let speed = meter.div(&second);
        assert_eq!(speed.magnitude(), Some(2.0));
        assert_eq!(speed.units().get("meter"), 1.0);
        assert_eq!(speed.units().get("second"), -1.0);
    }

    #[test]
    fn is_dimensionless_and_as_scalar() {
        let r = length_registry();

        let scalar = Quantity::new(3.0, UnitProduct::dimensionless());
        assert!(scalar.is_dimensionless(&r).unwrap());
        assert!(scalar.is_unitless());
        assert_eq!(scalar.as_scalar(&r), Ok(3.0));

        let meters = Quantity::new(3.0, UnitProduct::single("meter", 1.0));
        assert!(!meters.is_dimensionless(&r).unwrap());
        assert!(!meters.is_unitless());
        assert!(matches!(meters.as_scalar(&r), Err(UnitsError::Dimensionality { .. })));
    }

    #[test]
    fn dimensional_equality_crosses_prefixed_units() {
        let r = length_registry();
        let one_km = Quantity::new(1.0, UnitProduct::single("kilometer", 1.0));
        let thousand_m = Quantity::new(1000.0, UnitProduct::single("meter", 1.0));
        assert_eq!(one_km.compare(&thousand_m, &r).unwrap(), Some(Ordering::Equal));
    }

    #[test]
    fn operator_sugar_panics_on_incompatible_dimensionality() {
        let result = std::panic::catch_unwind(|| {
            let meter = Quantity::<f64>::new(1.0, UnitProduct::single("meter", 1.0));
            let second = Quantity::<f64>::new(1.0, UnitProduct::single("second", 1.0));
            meter + second
        });
        assert!(result.is_err());
    }
}
