//! The unit registry: holds base units, derived units and prefixes, and
//! answers "given this spelling, what canonical unit (with what
//! prefactor)?" Read-heavy after construction; the only write after
//! loading is prefix memoization, made safe for concurrent readers with
//! `RwLock` rather than requiring callers to hold `&mut Registry`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use lazy_static::lazy_static;

use crate::definitions::{read_definitions, DefinitionLine};
use crate::errors::UnitsError;
use crate::quantity::Quantity;
use crate::unit_product::UnitProduct;

const DEFAULT_DEFINITIONS: &str = include_str!("default_units.txt");

lazy_static! {
    /// The process-wide registry loaded from the bundled definitions
    /// file, used by the `u!`/`q!` macros and the operator-sugar
    /// arithmetic on `Quantity`.
    pub static ref DEFAULT_REGISTRY: Registry = {
        let registry = Registry::new();
        registry
            .load_str(DEFAULT_DEFINITIONS, "default_units.txt")
            .expect("bundled default_units.txt is well-formed");
        registry
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    /// Declared with a bracketed dimension tag; the reduction terminus.
    Base { dimension_tag: String },
    /// A scalar multiple of a (possibly affine) expression over other units.
    Derived { factor: f64, reference: UnitProduct },
    /// Memoized prefix + canonical unit, created lazily by `resolve`.
    PrefixedAlias {
        base_canonical: String,
        prefix_factor: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitDefinition {
    pub name: String,
    pub kind: UnitKind,
    pub aliases: Vec<String>,
    /// `Some(offset)` marks this unit affine: zero sits at `value + offset`
    /// in the reference frame (temperature scales).
    pub offset: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct PrefixDefinition {
    name: String,
    factor: f64,
}

#[derive(Default)]
pub struct Registry {
    units: RwLock<HashMap<String, UnitDefinition>>,
    // Every resolvable spelling (canonical names and aliases) -> canonical name.
    name_index: RwLock<HashMap<String, String>>,
    prefixes: RwLock<Vec<PrefixDefinition>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a bundled or embedded definitions file from disk.
    pub fn load_file(&self, path: &Path) -> Result<(), UnitsError> {
        let text = fs::read_to_string(path).map_err(|e| UnitsError::Definition {
            file: path.display().to_string(),
            line: 0,
            message: e.to_string(),
        })?;
        self.load_str(&text, &path.display().to_string())
    }

    /// Parses and registers every line of `text`. A malformed line is
    /// logged and skipped; previously-loaded units remain valid.
    pub fn load_str(&self, text: &str, file_label: &str) -> Result<(), UnitsError> {
        for (line_number, parsed) in read_definitions(text) {
            match parsed {
                Ok(line) => {
                    if let Err(e) = self.register_line(line) {
                        log::warn!("{}:{}: {}", file_label, line_number, e);
                    }
                }
                Err(e) => {
                    log::warn!("{}:{}: {}", file_label, line_number, e);
                }
            }
        }
        Ok(())
    }

    fn register_line(&self, line: DefinitionLine) -> Result<(), UnitsError> {
        match line {
            DefinitionLine::Prefix { name, factor } => {
                self.prefixes.write().unwrap().push(PrefixDefinition { name, factor });
                Ok(())
            }
            DefinitionLine::Base {
                name,
                dimension_tag,
                aliases,
                ..
            } => self.register(UnitDefinition {
                name,
                kind: UnitKind::Base { dimension_tag },
                aliases,
                offset: None,
            }),
            DefinitionLine::Derived {
                name,
                value_expr,
                aliases,
                modifiers,
            } => {
                let (factor, reference) = crate::expr::evaluate_raw(&value_expr)?;
                let offset = modifiers.get("offset").copied();
                self.register(UnitDefinition {
                    name,
                    kind: UnitKind::Derived { factor, reference },
                    aliases,
                    offset,
                })
            }
        }
    }

    /// Registers a fully-formed unit definition directly (no text parsing).
    pub fn register(&self, def: UnitDefinition) -> Result<(), UnitsError> {
        let canonical = def.name.clone();
        {
            let mut index = self.name_index.write().unwrap();
            if index.contains_key(&canonical) {
                return Err(UnitsError::AlreadyRegistered { name: canonical });
            }
            for alias in &def.aliases {
                if index.contains_key(alias) {
                    return Err(UnitsError::AlreadyRegistered { name: alias.clone() });
                }
            }
            index.insert(canonical.clone(), canonical.clone());
            for alias in &def.aliases {
                index.insert(alias.clone(), canonical.clone());
            }
        }
        self.units.write().unwrap().insert(canonical, def);
        Ok(())
    }

    pub fn register_prefix(&self, name: impl Into<String>, factor: f64) {
        self.prefixes
            .write()
            .unwrap()
            .push(PrefixDefinition { name: name.into(), factor });
    }

    pub fn get(&self, canonical: &str) -> Option<UnitDefinition> {
        self.units.read().unwrap().get(canonical).cloned()
    }

    pub fn offset_of(&self, canonical: &str) -> Option<f64> {
        self.get(canonical).and_then(|d| d.offset)
    }

    fn direct_lookup(&self, spelling: &str) -> Option<String> {
        self.name_index.read().unwrap().get(spelling).cloned()
    }

    /// Candidate de-pluralised / re-spelled forms of `s`, tried in order:
    /// strip a plural suffix, or swap the British `-re`/`-er` ending.
    fn plural_candidates(s: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        if let Some(stem) = s.strip_suffix("ies") {
            candidates.push(format!("{}y", stem));
        }
        if let Some(stem) = s.strip_suffix("es") {
            candidates.push(stem.to_string());
        }
        if s.ends_with('s') && !s.ends_with("ss") {
            candidates.push(s[..s.len() - 1].to_string());
        }
        if let Some(stem) = s.strip_suffix("re") {
            candidates.push(format!("{}er", stem));
        }
        if let Some(stem) = s.strip_suffix("er") {
            candidates.push(format!("{}re", stem));
        }
        candidates
    }

    fn resolve_with_plural(&self, spelling: &str) -> Option<String> {
        if let Some(canonical) = self.direct_lookup(spelling) {
            return Some(canonical);
        }
        for candidate in Self::plural_candidates(spelling) {
            if let Some(canonical) = self.direct_lookup(&candidate) {
                return Some(canonical);
            }
        }
        None
    }

    /// Name resolution: canonical/alias lookup, then plural stripping,
    /// then longest-first prefix matching with memoization of the
    /// resulting prefixed canonical unit.
    pub fn resolve(&self, spelling: &str) -> Result<String, UnitsError> {
        if let Some(canonical) = self.resolve_with_plural(spelling) {
            return Ok(canonical);
        }

        let mut prefixes = self.prefixes.read().unwrap().clone();
        // Stable sort: longest prefix wins; ties keep definition order.
        prefixes.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

        for prefix in &prefixes {
            if spelling.len() <= prefix.name.len() || !spelling.starts_with(prefix.name.as_str()) {
                continue;
            }
            let remainder = &spelling[prefix.name.len()..];
            if let Some(base_canonical) = self.resolve_with_plural(remainder) {
                let prefixed_name = format!("{}{}", prefix.name, base_canonical);
                if self.direct_lookup(&prefixed_name).is_none() {
                    log::debug!("memoizing prefixed unit '{}'", prefixed_name);
                    self.name_index
                        .write()
                        .unwrap()
                        .insert(prefixed_name.clone(), prefixed_name.clone());
                    self.units.write().unwrap().insert(
                        prefixed_name.clone(),
                        UnitDefinition {
                            name: prefixed_name.clone(),
                            kind: UnitKind::PrefixedAlias {
                                base_canonical,
                                prefix_factor: prefix.factor,
                            },
                            aliases: Vec::new(),
                            offset: None,
                        },
                    );
                }
                return Ok(prefixed_name);
            }
        }

        Err(UnitsError::undefined(spelling))
    }

    pub fn contains(&self, spelling: &str) -> bool {
        self.resolve_with_plural(spelling).is_some()
    }

    /// Reduces a single canonical unit name to `(base-dimension product,
    /// multiplicative scale)`. The affine offset, if any, is left on the
    /// `UnitDefinition` — this function only ever returns the linear part.
    pub(crate) fn reduce_unit_to_base(&self, canonical: &str) -> Result<(UnitProduct, f64), UnitsError> {
        let def = self
            .get(canonical)
            .ok_or_else(|| UnitsError::undefined(canonical))?;

        match def.kind {
            UnitKind::Base { dimension_tag } => Ok((UnitProduct::single(dimension_tag, 1.0), 1.0)),
            UnitKind::PrefixedAlias {
                base_canonical,
                prefix_factor,
            } => {
                let (dim, scale) = self.reduce_unit_to_base(&base_canonical)?;
                Ok((dim, scale * prefix_factor))
            }
            UnitKind::Derived { factor, reference } => {
                let mut acc_dim = UnitProduct::dimensionless();
                let mut acc_scale = factor;
                for (name, exponent) in reference.iter() {
                    let resolved = self.resolve(name)?;
                    let (dim, scale) = self.reduce_unit_to_base(&resolved)?;
                    acc_dim = acc_dim.multiply(&dim.power(exponent));
                    acc_scale *= scale.powf(exponent);
                }
                Ok((acc_dim, acc_scale))
            }
        }
    }

    /// Reduces a full `UnitProduct` (over unit spellings) to base
    /// dimensions, ignoring any affine offsets — the multiplicative
    /// part only.
    pub(crate) fn reduce_product_to_base(&self, units: &UnitProduct) -> Result<(UnitProduct, f64), UnitsError> {
        let mut acc_dim = UnitProduct::dimensionless();
        let mut acc_scale = 1.0;
        for (name, exponent) in units.iter() {
            let canonical = self.resolve(name)?;
            let (dim, scale) = self.reduce_unit_to_base(&canonical)?;
            acc_dim = acc_dim.multiply(&dim.power(exponent));
            acc_scale *= scale.powf(exponent);
        }
        Ok((acc_dim, acc_scale))
    }

    /// Parses a units expression against this registry.
    pub fn parse(&self, expr: &str) -> Result<Quantity<f64>, UnitsError> {
        crate::expr::evaluate(expr, self)
    }

    /// Convenience: `Quantity(1, name)`.
    pub fn unit(&self, name: &str) -> Result<Quantity<f64>, UnitsError> {
        let canonical = self.resolve(name)?;
        Ok(Quantity::new(1.0, UnitProduct::single(canonical, 1.0)))
    }
}

/// Macro to fetch a unit quantity from a registry (or the default one).
///
/// # Examples
/// `u!(registry, "meter")` or `u!("meter")`.
#[macro_export]
macro_rules! u {
    ($registry:expr, $unit_name:expr) => {
        $registry.unit($unit_name)
    };
    ($unit_name:expr) => {
        $crate::DEFAULT_REGISTRY.unit($unit_name)
    };
}

/// Macro to parse a quantity expression against a registry (or the
/// default one).
#[macro_export]
macro_rules! q {
    ($registry:expr, $expr:expr) => {
        $registry.parse($expr)
    };
    ($expr:expr) => {
        $crate::DEFAULT_REGISTRY.parse($expr)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length_registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(UnitDefinition {
                name: "meter".into(),
                kind: UnitKind::Base {
                    dimension_tag: "length".into(),
                },
                aliases: vec!["metre".into()],
                offset: None,
            })
            .unwrap();
        registry.register_prefix("kilo", 1000.0);
        registry.register_prefix("centi", 0.01);
        registry
            .register(UnitDefinition {
                name: "inch".into(),
                kind: UnitKind::Derived {
                    factor: 0.0254,
                    reference: UnitProduct::single("meter", 1.0),
                },
                aliases: vec!["in".into(), "inches".into()],
                offset: None,
            })
            .unwrap();
        registry
    }

    #[test]
    fn resolves_canonical_and_alias() {
        let r = length_registry();
        assert_eq!(r.resolve("meter").unwrap(), "meter");
        assert_eq!(r.resolve("metre").unwrap(), "meter");
    }

    #[test]
    fn resolves_plural_forms() {
        let r = length_registry();
        assert_eq!(r.resolve("meters").unwrap(), "meter");
        assert_eq!(r.resolve("inches").unwrap(), "inch");
    }

    #[test]
    fn resolves_prefixed_units_and_memoizes() {
        let r = length_registry();
        assert_eq!(r.resolve("kilometer").unwrap(), "kilometer");
        let def = r.get("kilometer").unwrap();
        assert_eq!(
            def.kind,
            UnitKind::PrefixedAlias {
                base_canonical: "meter".into(),
                prefix_factor: 1000.0,
            }
        );
    }

    #[test]
    fn resolves_prefixed_plural_british_spelling() {
        let r = length_registry();
        assert_eq!(r.resolve("kilometres").unwrap(), "kilometer");
    }

    #[test]
    fn undefined_unit_fails() {
        let r = length_registry();
        assert!(matches!(r.resolve("bananas"), Err(UnitsError::UndefinedUnit(_))));
    }

    #[test]
    fn reduce_unit_to_base_applies_derived_scale() {
        let r = length_registry();
        let (dim, scale) = r.reduce_unit_to_base("inch").unwrap();
        assert_eq!(dim, UnitProduct::single("length", 1.0));
        assert!((scale - 0.0254).abs() < 1e-12);
    }

    #[test]
    fn double_registration_fails() {
        let r = Registry::new();
        let def = UnitDefinition {
            name: "meter".into(),
            kind: UnitKind::Base {
                dimension_tag: "length".into(),
            },
            aliases: Vec::new(),
            offset: None,
        };
        assert!(r.register(def.clone()).is_ok());
        assert!(r.register(def).is_err());
    }

    #[test]
    fn load_str_skips_malformed_lines_but_keeps_good_ones() {
        let r = Registry::new();
        r.load_str(
            "meter = [length]\nbad <<< line\ninch = 0.0254 * meter, in, inches\n",
            "<test>",
        )
        .unwrap();
        assert!(r.contains("meter"));
        assert!(r.contains("inch"));
    }

    #[test]
    fn load_str_handles_offset_modifier() {
        let r = Registry::new();
        r.load_str("degK = [temperature]\ndegC = degK, offset: -273.15\n", "<test>")
            .unwrap();
        assert_eq!(r.offset_of("degC"), Some(-273.15));
    }
}
