//! Component E: the subsumption engine.
//!
//! Wires registry/unfolder (A), universe extraction (B), theory (C), compiler (D),
//! and the witness extractor (F) into the seven-step decision procedure: unfold
//! both schemas, compile `⟦P⟧` and `⟦C⟧` over a shared theory, assert
//! `⟦P⟧(x) ∧ ¬⟦C⟧(x)`, and interpret the solver's verdict.
use std::time::Instant;

use serde_json::Value;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::{Config as Z3Config, Context, Params, SatResult, Solver};

use jsound_registry::{Registry, Unfolder};

use crate::compiler::{self, Budget};
use crate::config::Config;
use crate::error::Error;
use crate::schema::Schema;
use crate::theory::Theory;
use crate::universe::Universe;
use crate::witness;
use crate::{CheckResult, ErrorKind};

/// Runs the full subsumption decision for `producer` against `consumer`.
///
/// Infallible at this boundary: every failure mode (cyclic schema, unsupported
/// keyword, solver timeout, malformed input) is caught and folded into
/// `CheckResult`'s `error_kind`/`error_message` rather than propagated, per the
/// error handling design's propagation policy.
pub(crate) fn check(producer: &Value, consumer: &Value, cfg: &Config) -> CheckResult {
    let span = tracing::info_span!(
        "subsumption_check",
        producer_size = producer.to_string().len(),
        consumer_size = consumer.to_string().len(),
        timeout_s = cfg.timeout_seconds_value(),
        solver_time_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );
    let _enter = span.enter();

    let result = match run(producer, consumer, cfg) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(error = %err, "subsumption check failed");
            CheckResult {
                compatible: false,
                counterexample: None,
                solver_time_ms: 0,
                error_kind: Some(ErrorKind::from(&err)),
                error_message: Some(err.to_string()),
            }
        }
    };

    span.record("solver_time_ms", result.solver_time_ms);
    span.record(
        "outcome",
        if result.error_kind.is_some() {
            "unknown"
        } else if result.compatible {
            "compatible"
        } else {
            "incompatible"
        },
    );
    result
}

fn run(producer: &Value, consumer: &Value, cfg: &Config) -> Result<CheckResult, Error> {
    let producer_unfolded = unfold(producer)?;
    let consumer_unfolded = unfold(consumer)?;

    let producer_schema = Schema::parse(&producer_unfolded)?;
    let consumer_schema = Schema::parse(&consumer_unfolded)?;

    let universe = Universe::gather(&producer_schema, &consumer_schema);
    tracing::debug!(keys = universe.len(), "sealed key universe");

    let z3_cfg = Z3Config::new();
    let ctx = Context::new(&z3_cfg);
    let theory = Theory::new(&ctx, cfg.max_array_length_value());
    let x = theory.fresh("x");

    let mut producer_budget = Budget::new();
    let phi_p = compiler::compile(&producer_schema, &x, &theory, &universe, &mut producer_budget)?;
    let mut consumer_budget = Budget::new();
    let phi_c = compiler::compile(&consumer_schema, &x, &theory, &universe, &mut consumer_budget)?;

    let solver = Solver::new(&ctx);
    let mut params = Params::new(&ctx);
    params.set_u32("timeout", timeout_millis(cfg));
    solver.set_params(&params);

    solver.assert(&recognizer_invariant(&theory, &x));
    solver.assert(&phi_p);
    solver.assert(&phi_c.not());

    let started = Instant::now();
    let verdict = solver.check();
    let solver_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match verdict {
        SatResult::Unsat => Ok(CheckResult {
            compatible: true,
            counterexample: None,
            solver_time_ms,
            error_kind: None,
            error_message: None,
        }),
        SatResult::Sat => {
            let model = solver
                .get_model()
                .ok_or_else(|| Error::internal("solver reported sat but produced no model"))?;
            let counterexample = witness::decode(&model, &x, &theory, &universe);
            Ok(CheckResult {
                compatible: false,
                counterexample: Some(counterexample),
                solver_time_ms,
                error_kind: None,
                error_message: None,
            })
        }
        SatResult::Unknown => {
            let reason = solver.get_reason_unknown().unwrap_or_default();
            Ok(CheckResult {
                compatible: false,
                counterexample: None,
                solver_time_ms,
                error_kind: Some(ErrorKind::SolverTimeout),
                error_message: Some(format!(
                    "solver returned unknown after {solver_time_ms}ms: {reason}"
                )),
            })
        }
    }
}

fn unfold(schema: &Value) -> Result<Value, Error> {
    let registry = Registry::build(schema)?;
    let unfolded = Unfolder::new(&registry, schema).unfold()?;
    Ok(unfolded)
}

fn timeout_millis(cfg: &Config) -> u32 {
    cfg.timeout_seconds_value()
        .saturating_mul(1000)
        .min(u64::from(u32::MAX)) as u32
}

/// `⋀` the datatype's own tag invariant: exactly one of the seven recognizers
/// holds for `x`. Already guaranteed structurally by `Json` being a native Z3
/// datatype sort with disjoint constructors; asserted explicitly anyway so the
/// encoding stays correct if the sort is ever represented a different way.
fn recognizer_invariant<'ctx>(theory: &Theory<'ctx>, x: &Dynamic<'ctx>) -> Bool<'ctx> {
    let ctx = theory.context();
    let recognizers = [
        theory.is_null(x),
        theory.is_bool(x),
        theory.is_int(x),
        theory.is_real(x),
        theory.is_str(x),
        theory.is_arr(x),
        theory.is_obj(x),
    ];
    let ones: Vec<Int> = recognizers
        .iter()
        .map(|r| r.ite(&Int::from_i64(ctx, 1), &Int::from_i64(ctx, 0)))
        .collect();
    let zero = Int::from_i64(ctx, 0);
    let sum = ones.iter().fold(zero, |acc, term| acc + term);
    sum._eq(&Int::from_i64(ctx, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_schema_is_compatible_with_number_schema() {
        let result = check(&json!({"type": "integer"}), &json!({"type": "number"}), &Config::new());
        assert!(result.compatible);
        assert!(result.counterexample.is_none());
        assert!(result.error_kind.is_none());
    }

    #[test]
    fn number_schema_is_not_compatible_with_integer_schema() {
        let result = check(&json!({"type": "number"}), &json!({"type": "integer"}), &Config::new());
        assert!(!result.compatible);
        assert!(result.counterexample.is_some());
        assert!(result.error_kind.is_none());
    }

    #[test]
    fn cyclic_schema_surfaces_as_an_error() {
        let cyclic = json!({
            "$defs": {"Node": {"properties": {"next": {"$ref": "#/$defs/Node"}}}},
            "$ref": "#/$defs/Node"
        });
        let result = check(&cyclic, &json!(true), &Config::new());
        assert!(!result.compatible);
        assert!(matches!(result.error_kind, Some(ErrorKind::CyclicSchema)));
    }

    #[test]
    fn required_property_mismatch_is_incompatible() {
        let producer = json!({"type": "object"});
        let consumer = json!({"type": "object", "required": ["id"]});
        let result = check(&producer, &consumer, &Config::new());
        assert!(!result.compatible);
        assert!(result.counterexample.is_some());
    }
}
