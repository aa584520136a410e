//! Component F: the witness extractor.
//!
//! Decodes a satisfying [`Model`] back into a concrete [`Value`]. Every branch is
//! total: a silent model (one where `model_completion` had to invent a default)
//! degrades into a structural placeholder rather than panicking, since a witness
//! that is merely imprecise is far more useful to a caller than no witness at all.
use serde_json::Value;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::Model;

use crate::theory::Theory;
use crate::universe::Universe;

/// Bounds recursion through degenerate models where an element decodes back to
/// itself; `arr`/`obj` lengths are already clamped to `LMAX`, so this is only a
/// last-resort backstop.
const MAX_DECODE_DEPTH: usize = 64;

/// Decodes the model's interpretation of `term` into a JSON value.
pub(crate) fn decode<'ctx>(
    model: &Model<'ctx>,
    term: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
) -> Value {
    decode_term(model, term, theory, universe, 0)
}

fn decode_term<'ctx>(
    model: &Model<'ctx>,
    term: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    depth: usize,
) -> Value {
    if depth > MAX_DECODE_DEPTH {
        return Value::Null;
    }
    if eval_bool(model, &theory.is_null(term)) {
        return Value::Null;
    }
    if eval_bool(model, &theory.is_bool(term)) {
        let value = model
            .eval(&theory.bool_val(term), true)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        return Value::Bool(value);
    }
    if eval_bool(model, &theory.is_int(term)) {
        let value = model
            .eval(&theory.int_val(term), true)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        return Value::from(value);
    }
    if eval_bool(model, &theory.is_real(term)) {
        let (num, den) = model
            .eval(&theory.real_val(term), true)
            .and_then(|v| v.as_real())
            .unwrap_or((0, 1));
        let value = if den == 0 { 0.0 } else { num as f64 / den as f64 };
        return serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if eval_bool(model, &theory.is_str(term)) {
        let value = model
            .eval(&theory.str_val(term), true)
            .and_then(|v| v.as_string())
            .unwrap_or_default();
        return Value::String(value);
    }
    if eval_bool(model, &theory.is_arr(term)) {
        let len = model
            .eval(&theory.len(term), true)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            .clamp(0, theory.max_array_length() as i64) as usize;
        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            let index = Int::from_i64(theory.context(), i as i64);
            let elem = theory.elem(term, &index);
            items.push(decode_term(model, &elem, theory, universe, depth + 1));
        }
        return Value::Array(items);
    }
    if eval_bool(model, &theory.is_obj(term)) {
        let mut object = serde_json::Map::new();
        for key in universe.keys() {
            let key_term = theory.string_literal(key);
            if eval_bool(model, &theory.has(term, &key_term)) {
                let value_term = theory.prop(term, &key_term);
                object.insert(
                    key.clone(),
                    decode_term(model, &value_term, theory, universe, depth + 1),
                );
            }
        }
        return Value::Object(object);
    }
    // Model completion left every recognizer undetermined; represent that as a
    // bare `null` rather than failing the whole decode.
    Value::Null
}

fn eval_bool<'ctx>(model: &Model<'ctx>, term: &Bool<'ctx>) -> bool {
    model
        .eval(term, true)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::compiler::{self, Budget};
    use serde_json::json;
    use z3::{Config as Z3Config, Context, SatResult, Solver};

    #[test]
    fn decodes_an_integer_witness() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let schema = Schema::parse(&json!({"type": "integer", "minimum": 5})).unwrap();
        let formula = compiler::compile(&schema, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&formula);
        assert_eq!(solver.check(), SatResult::Sat);
        let model = solver.get_model().unwrap();
        let witness = decode(&model, &x, &theory, &universe);
        assert!(witness.as_i64().is_some());
        assert!(witness.as_i64().unwrap() >= 5);
    }

    #[test]
    fn decodes_an_object_witness_over_the_universe() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let schema = Schema::parse(&json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        }))
        .unwrap();
        let universe = Universe::gather(&schema, &Schema::Bool(true));
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let formula = compiler::compile(&schema, &x, &theory, &universe, &mut budget).unwrap();
        let solver = Solver::new(&ctx);
        solver.assert(&formula);
        assert_eq!(solver.check(), SatResult::Sat);
        let model = solver.get_model().unwrap();
        let witness = decode(&model, &x, &theory, &universe);
        assert!(witness.get("id").is_some());
    }
}
