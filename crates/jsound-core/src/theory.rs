//! Component C: the symbolic JSON theory.
//!
//! Every JSON instance is represented as a single opaque term of one Z3 algebraic
//! sort, `Json`, tagged by a constructor per JSON type:
//!
//! ```text
//! Json ::= null
//!        | bool(bool_val: Bool)
//!        | int(int_val: Int)
//!        | real(real_val: Real)
//!        | str(str_val: String)
//!        | arr(arr_len: Int)
//!        | obj(obj_len: Int)
//! ```
//!
//! Arrays and objects are opaque identities: an `arr`/`obj` term only carries a
//! length, and the actual elements/properties live in externalized relations
//! (`arr_elems`, `has`, `val`) rather than as a nested payload. This keeps the
//! datatype finite and first-order, at the cost of needing a bounded unrolling of
//! array quantifiers (`LMAX`, see [`crate::config::Config::max_array_length`]) and a
//! finite key universe for objects (see [`crate::universe::Universe`]).
use std::cell::RefCell;

use ahash::AHashMap;
use serde_json::{Number, Value};
use z3::ast::{Ast, Bool, Dynamic, Int, Real, String as Zstr};
use z3::{Context, DatatypeAccessor, DatatypeBuilder, DatatypeSort, FuncDecl, Sort};

use crate::error::Error;
use crate::universe::Universe;

const NULL: usize = 0;
const BOOL: usize = 1;
const INT: usize = 2;
const REAL: usize = 3;
const STR: usize = 4;
const ARR: usize = 5;
const OBJ: usize = 6;

/// The compiled `Json` sort together with the externalized relations over it.
pub struct Theory<'ctx> {
    ctx: &'ctx Context,
    sort: DatatypeSort<'ctx>,
    arr_elems: FuncDecl<'ctx>,
    has: FuncDecl<'ctx>,
    val: FuncDecl<'ctx>,
    lmax: usize,
    format_predicates: RefCell<AHashMap<String, FuncDecl<'ctx>>>,
}

impl<'ctx> Theory<'ctx> {
    /// Builds the `Json` datatype and its relations in `ctx`, bounding arrays to
    /// `lmax` elements.
    pub fn new(ctx: &'ctx Context, lmax: usize) -> Theory<'ctx> {
        let int_sort = Sort::int(ctx);
        let sort = DatatypeBuilder::new(ctx, "Json")
            .variant("null", vec![])
            .variant(
                "bool",
                vec![("bool_val", DatatypeAccessor::Sort(Sort::bool(ctx)))],
            )
            .variant("int", vec![("int_val", DatatypeAccessor::Sort(int_sort.clone()))])
            .variant(
                "real",
                vec![("real_val", DatatypeAccessor::Sort(Sort::real(ctx)))],
            )
            .variant(
                "str",
                vec![("str_val", DatatypeAccessor::Sort(Sort::string(ctx)))],
            )
            .variant("arr", vec![("arr_len", DatatypeAccessor::Sort(int_sort.clone()))])
            .variant("obj", vec![("obj_len", DatatypeAccessor::Sort(int_sort))])
            .finish();

        let json_sort = sort.sort.clone();
        let arr_elems = FuncDecl::new(
            ctx,
            "arr_elems",
            &[&json_sort, &Sort::int(ctx)],
            &json_sort,
        );
        let has = FuncDecl::new(
            ctx,
            "has",
            &[&json_sort, &Sort::string(ctx)],
            &Sort::bool(ctx),
        );
        let val = FuncDecl::new(
            ctx,
            "val",
            &[&json_sort, &Sort::string(ctx)],
            &json_sort,
        );

        Theory {
            ctx,
            sort,
            arr_elems,
            has,
            val,
            lmax: lmax.max(1),
            format_predicates: RefCell::new(AHashMap::default()),
        }
    }

    /// `format_name(str_val(x))`: an uninterpreted predicate unique to `format_name`.
    ///
    /// The restricted regex translator (see [`crate::compiler::pattern`]) cannot
    /// faithfully express most `format` validators (email, uuid, date-time, ...), so
    /// each format name is instead modeled as an opaque, named predicate over
    /// strings. Two schemas asserting the same format name share the same predicate
    /// (so `format: "email"` is reflexive and a producer/consumer pair requiring the
    /// identical format composes correctly); two different format names are treated
    /// as wholly unrelated, which is always a safe approximation of an unknown
    /// relationship rather than a guess.
    pub fn format_predicate(&self, name: &str, term: &Zstr<'ctx>) -> Bool<'ctx> {
        let mut cache = self.format_predicates.borrow_mut();
        let decl = cache.entry(name.to_string()).or_insert_with(|| {
            FuncDecl::new(
                self.ctx,
                format!("format_{name}"),
                &[&Sort::string(self.ctx)],
                &Sort::bool(self.ctx),
            )
        });
        decl.apply(&[term])
            .as_bool()
            .expect("format predicate always returns Bool")
    }

    #[must_use]
    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    #[must_use]
    pub fn sort(&self) -> &Sort<'ctx> {
        &self.sort.sort
    }

    #[must_use]
    pub fn max_array_length(&self) -> usize {
        self.lmax
    }

    /// Declares a free variable of sort `Json`.
    #[must_use]
    pub fn fresh(&self, name: &str) -> Dynamic<'ctx> {
        Dynamic::new_const(self.ctx, name, &self.sort.sort)
    }

    fn tester(&self, variant: usize, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.sort.variants[variant]
            .tester
            .apply(&[term])
            .as_bool()
            .expect("datatype tester always returns Bool")
    }

    fn accessor(&self, variant: usize, field: usize, term: &Dynamic<'ctx>) -> Dynamic<'ctx> {
        self.sort.variants[variant].accessors[field].apply(&[term])
    }

    pub fn is_null(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.tester(NULL, term)
    }

    pub fn is_bool(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.tester(BOOL, term)
    }

    pub fn is_int(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.tester(INT, term)
    }

    pub fn is_real(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.tester(REAL, term)
    }

    /// True if `term` is an integer or a real: JSON Schema's `"number"` type.
    pub fn is_number(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        Bool::or(self.ctx, &[&self.is_int(term), &self.is_real(term)])
    }

    pub fn is_str(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.tester(STR, term)
    }

    pub fn is_arr(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.tester(ARR, term)
    }

    pub fn is_obj(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.tester(OBJ, term)
    }

    pub fn bool_val(&self, term: &Dynamic<'ctx>) -> Bool<'ctx> {
        self.accessor(BOOL, 0, term)
            .as_bool()
            .expect("bool_val accessor always returns Bool")
    }

    pub fn int_val(&self, term: &Dynamic<'ctx>) -> Int<'ctx> {
        self.accessor(INT, 0, term)
            .as_int()
            .expect("int_val accessor always returns Int")
    }

    pub fn real_val(&self, term: &Dynamic<'ctx>) -> Real<'ctx> {
        self.accessor(REAL, 0, term)
            .as_real()
            .expect("real_val accessor always returns Real")
    }

    /// The numeric value of `term` as a `Real`, coercing `int` to `real` so
    /// numeric-keyword encodings don't need to branch on the concrete numeric
    /// variant.
    pub fn numeric_val(&self, term: &Dynamic<'ctx>) -> Real<'ctx> {
        self.is_int(term)
            .ite(&self.int_val(term).to_real(), &self.real_val(term))
    }

    pub fn str_val(&self, term: &Dynamic<'ctx>) -> Zstr<'ctx> {
        self.accessor(STR, 0, term)
            .as_string()
            .expect("str_val accessor always returns String")
    }

    /// `len(term)`: the declared length of an array or object, or `0` for any other
    /// variant (callers must already know `term` is an array/object before relying
    /// on this).
    pub fn len(&self, term: &Dynamic<'ctx>) -> Int<'ctx> {
        let arr_len = self
            .accessor(ARR, 0, term)
            .as_int()
            .expect("arr_len accessor always returns Int");
        let obj_len = self
            .accessor(OBJ, 0, term)
            .as_int()
            .expect("obj_len accessor always returns Int");
        self.is_arr(term).ite(&arr_len, &obj_len)
    }

    /// `arr_elems(term, index)`: the element at `index` in an array term.
    pub fn elem(&self, term: &Dynamic<'ctx>, index: &Int<'ctx>) -> Dynamic<'ctx> {
        self.arr_elems.apply(&[term, index])
    }

    /// `has(term, key)`: whether `key` is present on an object term.
    pub fn has(&self, term: &Dynamic<'ctx>, key: &Zstr<'ctx>) -> Bool<'ctx> {
        self.has
            .apply(&[term, key])
            .as_bool()
            .expect("has always returns Bool")
    }

    /// `val(term, key)`: the value bound to `key` on an object term. Meaningful
    /// only where `has(term, key)` holds.
    pub fn prop(&self, term: &Dynamic<'ctx>, key: &Zstr<'ctx>) -> Dynamic<'ctx> {
        self.val.apply(&[term, key])
    }

    pub fn string_literal(&self, value: &str) -> Zstr<'ctx> {
        Zstr::from_str(self.ctx, value).expect("JSON property names are valid UTF-8")
    }

    /// Encodes a concrete JSON value as a `Json` term, constrained to equal `term`.
    /// Used to compile `const`/`enum`.
    ///
    /// Object keys outside `universe` cannot be expressed (the `has`/`val` theory
    /// only quantifies over the key universe) and are silently dropped: a schema
    /// whose `const`/`enum` literal introduces a brand-new key nowhere else
    /// mentioned is a pathological case this encoding does not claim to be sound
    /// for.
    pub fn equals_literal(
        &self,
        term: &Dynamic<'ctx>,
        value: &Value,
        universe: &Universe,
    ) -> Result<Bool<'ctx>, Error> {
        match value {
            Value::Null => Ok(self.is_null(term)),
            Value::Bool(b) => Ok(Bool::and(
                self.ctx,
                &[&self.is_bool(term), &self.bool_val(term)._eq(&Bool::from_bool(self.ctx, *b))],
            )),
            Value::Number(n) => self.equals_number(term, n),
            Value::String(s) => Ok(Bool::and(
                self.ctx,
                &[
                    &self.is_str(term),
                    &self.str_val(term)._eq(&self.string_literal(s)),
                ],
            )),
            Value::Array(items) => {
                if items.len() > self.lmax {
                    return Err(Error::unsupported(format!(
                        "const/enum array literal has {} elements, exceeding the configured max_array_length of {}",
                        items.len(),
                        self.lmax
                    )));
                }
                let mut clauses = vec![
                    self.is_arr(term),
                    self.len(term)._eq(&Int::from_i64(self.ctx, items.len() as i64)),
                ];
                for (i, item) in items.iter().enumerate() {
                    let index = Int::from_i64(self.ctx, i as i64);
                    let elem = self.elem(term, &index);
                    clauses.push(self.equals_literal(&elem, item, universe)?);
                }
                let refs: Vec<&Bool> = clauses.iter().collect();
                Ok(Bool::and(self.ctx, &refs))
            }
            Value::Object(map) => {
                let mut clauses = vec![self.is_obj(term)];
                for key in universe.keys() {
                    let key_term = self.string_literal(key);
                    let present = map.contains_key(key);
                    clauses.push(self.has(term, &key_term)._eq(&Bool::from_bool(self.ctx, present)));
                    if let Some(expected) = map.get(key) {
                        let actual = self.prop(term, &key_term);
                        clauses.push(self.equals_literal(&actual, expected, universe)?);
                    }
                }
                let refs: Vec<&Bool> = clauses.iter().collect();
                Ok(Bool::and(self.ctx, &refs))
            }
        }
    }

    fn equals_number(&self, term: &Dynamic<'ctx>, n: &Number) -> Result<Bool<'ctx>, Error> {
        if let Some(i) = n.as_i64() {
            Ok(Bool::and(
                self.ctx,
                &[
                    &self.is_int(term),
                    &self.int_val(term)._eq(&Int::from_i64(self.ctx, i)),
                ],
            ))
        } else if let Some(f) = n.as_f64() {
            let (num, den) = rational_from_f64(f);
            Ok(Bool::and(
                self.ctx,
                &[
                    &self.is_real(term),
                    &self.real_val(term)._eq(&Real::from_real(self.ctx, num, den)),
                ],
            ))
        } else {
            Err(Error::unsupported("number literal out of representable range"))
        }
    }
}

/// A crude but exact decimal-to-rational conversion, good enough for the finite
/// literals that appear in `const`/`enum`/`minimum`-style keywords. Not used for
/// arbitrary-precision arithmetic.
fn rational_from_f64(value: f64) -> (i32, i32) {
    const SCALE: f64 = 1_000_000.0;
    let scaled = (value * SCALE).round();
    (scaled as i32, SCALE as i32)
}

/// Cache of schema-node identity to its compiled `Json` term, used so a schema
/// referenced from multiple places in a formula (e.g. both sides of an `allOf`)
/// only triggers a single `fresh` solver declaration per logical variable.
#[derive(Default)]
pub(crate) struct TermCache<'ctx> {
    terms: AHashMap<String, Dynamic<'ctx>>,
}

impl<'ctx> TermCache<'ctx> {
    pub(crate) fn get_or_insert_with(
        &mut self,
        key: &str,
        make: impl FnOnce() -> Dynamic<'ctx>,
    ) -> Dynamic<'ctx> {
        self.terms
            .entry(key.to_string())
            .or_insert_with(make)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::{Config as Z3Config, Solver};

    fn universe(keys: &[&str]) -> Universe {
        let producer =
            crate::schema::Schema::parse(&serde_json::json!({"properties": keys.iter().map(|k| (k.to_string(), true)).collect::<serde_json::Map<_, _>>()}))
                .unwrap();
        Universe::gather(&producer, &crate::schema::Schema::Bool(true))
    }

    #[test]
    fn null_literal_is_satisfiable_against_itself() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let x = theory.fresh("x");
        let eq = theory
            .equals_literal(&x, &Value::Null, &universe(&[]))
            .unwrap();
        let solver = Solver::new(&ctx);
        solver.assert(&eq);
        assert_eq!(solver.check(), z3::SatResult::Sat);
    }

    #[test]
    fn string_literal_excludes_other_strings() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let x = theory.fresh("x");
        let eq = theory
            .equals_literal(&x, &Value::String("a".into()), &universe(&[]))
            .unwrap();
        let solver = Solver::new(&ctx);
        solver.assert(&eq);
        solver.assert(&theory.str_val(&x)._eq(&theory.string_literal("b")));
        assert_eq!(solver.check(), z3::SatResult::Unsat);
    }

    #[test]
    fn object_literal_pins_has_and_val_over_the_universe() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let x = theory.fresh("x");
        let u = universe(&["a", "b"]);
        let eq = theory
            .equals_literal(&x, &serde_json::json!({"a": 1}), &u)
            .unwrap();
        let solver = Solver::new(&ctx);
        solver.assert(&eq);
        assert_eq!(solver.check(), z3::SatResult::Sat);
        let b_key = theory.string_literal("b");
        solver.assert(&theory.has(&x, &b_key));
        assert_eq!(solver.check(), z3::SatResult::Unsat);
    }
}
