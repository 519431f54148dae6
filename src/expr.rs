//! Arithmetic-expression parser: numbers, identifiers, `* / **` and
//! parentheses, evaluated either against a live `Registry` (producing a
//! fully-resolved `Quantity<f64>`) or raw (keeping identifier spellings
//! unresolved, for a derived unit's right-hand side before the registry
//! that would resolve them has finished loading).

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::errors::UnitsError;
use crate::quantity::Quantity;
use crate::registry::Registry;
use crate::unit_product::UnitProduct;

#[derive(Parser)]
#[grammar = "expr.pest"]
struct ExprParser;

/// A factor's magnitude/units pair before combination: either a bare
/// number (dimensionless) or a named unit raised to the first power.
#[derive(Debug, Clone)]
struct Term {
    scale: f64,
    units: UnitProduct,
}

impl Term {
    fn scalar(value: f64) -> Self {
        Term {
            scale: value,
            units: UnitProduct::dimensionless(),
        }
    }

    fn unit(name: &str) -> Self {
        Term {
            scale: 1.0,
            units: UnitProduct::single(name, 1.0),
        }
    }

    fn pow(self, exponent: f64) -> Self {
        Term {
            scale: self.scale.powf(exponent),
            units: self.units.power(exponent),
        }
    }

    fn mul(self, other: Term) -> Self {
        Term {
            scale: self.scale * other.scale,
            units: self.units.multiply(&other.units),
        }
    }

    fn div(self, other: Term) -> Self {
        Term {
            scale: self.scale / other.scale,
            units: self.units.divide(&other.units),
        }
    }
}

/// Evaluates `text` against `registry`: identifiers are resolved to
/// their canonical spelling immediately, so the returned quantity's
/// units are always canonical names.
pub fn evaluate(text: &str, registry: &Registry) -> Result<Quantity<f64>, UnitsError> {
    let term = eval_to_term(text, Some(registry))?;
    Ok(Quantity::new(term.scale, term.units))
}

/// Evaluates `text` without a registry: identifiers are kept as their
/// literal spelling in the resulting `UnitProduct`, to be resolved later
/// once the rest of a definitions file has loaded.
pub fn evaluate_raw(text: &str) -> Result<(f64, UnitProduct), UnitsError> {
    let term = eval_to_term(text, None)?;
    Ok((term.scale, term.units))
}

fn eval_to_term(text: &str, registry: Option<&Registry>) -> Result<Term, UnitsError> {
    let mut pairs = ExprParser::parse(Rule::units_expression, text).map_err(|e| UnitsError::Parse {
        message: e.to_string(),
    })?;

    let root = pairs.next().expect("units_expression always produces one pair");
    let expr = root
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .expect("units_expression always wraps an expr");

    eval_expr(expr, registry)
}

/// `expr = term ~ (mul_op? ~ term)*` is a single precedence level, so a
/// left-to-right fold is exact: no need for a full Pratt parser. An
/// omitted operator means implicit multiplication (`2 meter`).
fn eval_expr(expr: Pair<Rule>, registry: Option<&Registry>) -> Result<Term, UnitsError> {
    let mut pairs = expr.into_inner();

    let first = pairs.next().expect("expr always starts with a term");
    let mut acc = eval_term(first, registry)?;

    while let Some(pair) = pairs.next() {
        match pair.as_rule() {
            Rule::mul_op => {
                let op = pair.as_str().to_string();
                let rhs_pair = pairs.next().expect("mul_op is always followed by a term");
                let rhs = eval_term(rhs_pair, registry)?;
                acc = if op == "/" { acc.div(rhs) } else { acc.mul(rhs) };
            }
            Rule::term => {
                let rhs = eval_term(pair, registry)?;
                acc = acc.mul(rhs);
            }
            _ => unreachable!("expr only alternates mul_op and term"),
        }
    }

    Ok(acc)
}

fn eval_term(term: Pair<Rule>, registry: Option<&Registry>) -> Result<Term, UnitsError> {
    let mut inner = term.into_inner();
    let factor = inner.next().expect("term always wraps a factor");
    let base = eval_factor(factor, registry)?;

    match inner.next() {
        Some(exponent_pair) => {
            let exponent: f64 = exponent_pair.as_str().parse().map_err(|_| UnitsError::Parse {
                message: format!("invalid exponent '{}'", exponent_pair.as_str()),
            })?;
            Ok(base.pow(exponent))
        }
        None => Ok(base),
    }
}

fn eval_factor(factor: Pair<Rule>, registry: Option<&Registry>) -> Result<Term, UnitsError> {
    let inner = factor.into_inner().next().expect("factor always wraps one child");
    match inner.as_rule() {
        Rule::number => {
            let value: f64 = inner.as_str().parse().map_err(|_| UnitsError::Parse {
                message: format!("invalid number '{}'", inner.as_str()),
            })?;
            Ok(Term::scalar(value))
        }
        Rule::identifier => match registry {
            Some(r) => {
                let canonical = r.resolve(inner.as_str())?;
                Ok(Term::unit(&canonical))
            }
            None => Ok(Term::unit(inner.as_str())),
        },
        Rule::expr => eval_expr(inner, registry),
        _ => unreachable!("factor only derives number/identifier/expr"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length_registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(crate::registry::UnitDefinition {
                name: "meter".into(),
                kind: crate::registry::UnitKind::Base {
                    dimension_tag: "length".into(),
                },
                aliases: Vec::new(),
                offset: None,
            })
            .unwrap();
        registry.register_prefix("kilo", 1000.0);
        registry
    }

    #[test]
    fn evaluates_bare_number() {
        let r = length_registry();
        let q = evaluate("42", &r).unwrap();
        assert_eq!(q.magnitude(), Some(42.0));
        assert!(q.units().is_empty());
    }

    #[test]
    fn evaluates_unit_with_prefix() {
        let r = length_registry();
        let q = evaluate("kilometer", &r).unwrap();
        assert_eq!(q.magnitude(), Some(1.0));
        assert_eq!(q.units().get("kilometer"), 1.0);
    }

    #[test]
    fn evaluates_product_and_quotient() {
        let r = length_registry();
        let q = evaluate("3 * meter / meter", &r).unwrap();
        assert_eq!(q.magnitude(), Some(3.0));
        assert!(q.units().is_empty());
    }

    #[test]
    fn evaluates_power_and_parentheses() {
        let r = length_registry();
        let q = evaluate("(2 * meter) ** 2", &r).unwrap();
        assert_eq!(q.magnitude(), Some(4.0));
        assert_eq!(q.units().get("meter"), 2.0);
    }

    #[test]
    fn raw_evaluation_keeps_unresolved_identifier_spelling() {
        let (scale, units) = evaluate_raw("0.0254 * meter").unwrap();
        assert_eq!(scale, 0.0254);
        assert_eq!(units.get("meter"), 1.0);
    }

    #[test]
    fn undefined_identifier_fails_when_registry_backed() {
        let r = length_registry();
        assert!(evaluate("furlong", &r).is_err());
    }
}
