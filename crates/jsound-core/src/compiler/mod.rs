//! Component D: the schema compiler.
//!
//! Translates a [`Schema`] tree into a formula over the [`Theory`], guided by the
//! sealed [`Universe`]. Each keyword compiles independently into its own clause;
//! the node's formula is the conjunction of its keywords' clauses, mirroring the
//! way `jsonschema`'s `keywords/` module gives each keyword its own small,
//! focused compilation function.
pub(crate) mod pattern;

use z3::ast::{Ast, Bool, Dynamic, Int, Real, String as Zstr};

use crate::error::Error;
use crate::primitive_type::PrimitiveType;
use crate::schema::{Keyword, Schema};
use crate::theory::Theory;
use crate::universe::Universe;

const DEFAULT_MAX_DEPTH: usize = 64;
const FIXED_FORMATS: &[&str] = &[
    "email", "uri", "uuid", "date", "date-time", "time", "ipv4", "ipv6",
];

/// Tracks compile-depth so adversarially nested schemas abort with
/// [`Error::UnsupportedFeature`] instead of building an unbounded formula.
pub(crate) struct Budget {
    depth: usize,
    max_depth: usize,
}

impl Budget {
    pub(crate) fn new() -> Self {
        Budget::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub(crate) fn with_max_depth(max_depth: usize) -> Self {
        Budget { depth: 0, max_depth }
    }
}

/// Compiles a schema node into a formula over `x`, recursing through every
/// nested schema reachable from it.
pub(crate) fn compile<'ctx>(
    schema: &Schema,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    budget.depth += 1;
    if budget.depth > budget.max_depth {
        budget.depth -= 1;
        return Err(Error::unsupported(format!(
            "schema nesting exceeds the compile-depth bound of {}",
            budget.max_depth
        )));
    }
    let result = compile_node(schema, x, theory, universe, budget);
    budget.depth -= 1;
    result
}

fn compile_node<'ctx>(
    schema: &Schema,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    match schema {
        Schema::Bool(true) => Ok(Bool::from_bool(ctx, true)),
        Schema::Bool(false) => Ok(Bool::from_bool(ctx, false)),
        Schema::Keywords(map) => {
            let mut clauses = Vec::new();

            let if_ = map.get("if");
            let then_ = map.get("then");
            let else_ = map.get("else");
            if if_.is_some() || then_.is_some() || else_.is_some() {
                clauses.push(compile_conditional(if_, then_, else_, x, theory, universe, budget)?);
            }

            for (name, arg) in map {
                if matches!(name.as_str(), "if" | "then" | "else") {
                    continue;
                }
                tracing::trace!(keyword = name.as_str(), "compiling keyword");
                match name.as_str() {
                    "additionalProperties" => {
                        let declared = declared_keys(schema, universe)?;
                        clauses.push(compile_additional_properties(
                            arg, &declared, x, theory, universe, budget,
                        )?);
                    }
                    "minimum" => {
                        let strict = exclusive_toggle(schema, "exclusiveMinimum");
                        clauses.push(compile_bound_keyword(arg, x, theory, false, strict)?);
                    }
                    "maximum" => {
                        let strict = exclusive_toggle(schema, "exclusiveMaximum");
                        clauses.push(compile_bound_keyword(arg, x, theory, true, strict)?);
                    }
                    _ => {
                        clauses.push(compile_keyword(name, arg, x, theory, universe, budget)?);
                    }
                }
            }

            if clauses.is_empty() {
                return Ok(Bool::from_bool(ctx, true));
            }
            let refs: Vec<&Bool> = clauses.iter().collect();
            Ok(Bool::and(ctx, &refs))
        }
    }
}

fn compile_conditional<'ctx>(
    if_: Option<&Keyword>,
    then_: Option<&Keyword>,
    else_: Option<&Keyword>,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let then_clause = match then_ {
        Some(Keyword::Schema(schema)) => compile(schema, x, theory, universe, budget)?,
        _ => Bool::from_bool(ctx, true),
    };
    let else_clause = match else_ {
        Some(Keyword::Schema(schema)) => compile(schema, x, theory, universe, budget)?,
        _ => Bool::from_bool(ctx, true),
    };

    match if_ {
        Some(Keyword::Schema(condition)) => {
            let cond = compile(condition, x, theory, universe, budget)?;
            Ok(Bool::and(
                ctx,
                &[&cond.implies(&then_clause), &cond.not().implies(&else_clause)],
            ))
        }
        // Per the schema's conditional semantics, `then`/`else` without a
        // sibling `if` apply unconditionally.
        _ => Ok(Bool::and(ctx, &[&then_clause, &else_clause])),
    }
}

fn compile_keyword<'ctx>(
    name: &str,
    arg: &Keyword,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    match (name, arg) {
        ("type", Keyword::Value(value)) => compile_type(value, x, theory),
        ("const", Keyword::Value(value)) => theory.equals_literal(x, value, universe),
        ("enum", Keyword::Value(value)) => {
            let options = value
                .as_array()
                .ok_or_else(|| Error::schema_validation("'enum' must be an array"))?;
            let clauses = options
                .iter()
                .map(|option| theory.equals_literal(x, option, universe))
                .collect::<Result<Vec<_>, _>>()?;
            let refs: Vec<&Bool> = clauses.iter().collect();
            Ok(Bool::or(ctx, &refs))
        }
        ("allOf", Keyword::SchemaList(list)) => {
            let clauses = list
                .iter()
                .map(|s| compile(s, x, theory, universe, budget))
                .collect::<Result<Vec<_>, _>>()?;
            let refs: Vec<&Bool> = clauses.iter().collect();
            Ok(Bool::and(ctx, &refs))
        }
        ("anyOf", Keyword::SchemaList(list)) => {
            let clauses = list
                .iter()
                .map(|s| compile(s, x, theory, universe, budget))
                .collect::<Result<Vec<_>, _>>()?;
            let refs: Vec<&Bool> = clauses.iter().collect();
            Ok(Bool::or(ctx, &refs))
        }
        ("oneOf", Keyword::SchemaList(list)) => {
            let clauses = list
                .iter()
                .map(|s| compile(s, x, theory, universe, budget))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(exactly_one(ctx, &clauses))
        }
        ("not", Keyword::Schema(schema)) => {
            Ok(compile(schema, x, theory, universe, budget)?.not())
        }
        ("minLength", Keyword::Value(value)) => compile_string_length(value, x, theory, false),
        ("maxLength", Keyword::Value(value)) => compile_string_length(value, x, theory, true),
        ("pattern", Keyword::Value(value)) => compile_pattern(value, x, theory),
        ("format", Keyword::Value(value)) => compile_format(value, x, theory),
        ("exclusiveMinimum", Keyword::Value(value)) => {
            compile_exclusive_bound(value, x, theory, false)
        }
        ("exclusiveMaximum", Keyword::Value(value)) => {
            compile_exclusive_bound(value, x, theory, true)
        }
        ("multipleOf", Keyword::Value(value)) => compile_multiple_of(value, x, theory),
        ("required", Keyword::StringList(names)) => Ok(guarded(
            theory.is_obj(x),
            required_clause(names, x, theory),
        )),
        ("properties", Keyword::SchemaMap(map)) => {
            compile_properties(map, x, theory, universe, budget)
        }
        ("patternProperties", Keyword::SchemaMap(map)) => {
            compile_pattern_properties(map, x, theory, universe, budget)
        }
        ("dependentRequired", Keyword::Value(value)) => {
            compile_dependent_required(value, x, theory)
        }
        ("dependentSchemas", Keyword::SchemaMap(map)) => {
            compile_dependent_schemas(map, x, theory, universe, budget)
        }
        ("dependencies", Keyword::Value(value)) => {
            compile_dependencies(value, x, theory, universe, budget)
        }
        ("minItems", Keyword::Value(value)) => compile_items_count(value, x, theory, false),
        ("maxItems", Keyword::Value(value)) => compile_items_count(value, x, theory, true),
        ("uniqueItems", Keyword::Value(value)) => compile_unique_items(value, x, theory),
        ("items", Keyword::Schema(schema)) => compile_items(schema, x, theory, universe, budget),
        ("contains", Keyword::Schema(schema)) => {
            compile_contains(schema, x, theory, universe, budget)
        }
        (other, _) => Err(Error::internal(format!(
            "keyword '{other}' reached the compiler with an unexpected argument shape"
        ))),
    }
}

fn guarded<'ctx>(guard: Bool<'ctx>, clause: Bool<'ctx>) -> Bool<'ctx> {
    guard.implies(&clause)
}

fn exactly_one<'ctx>(ctx: &'ctx z3::Context, clauses: &[Bool<'ctx>]) -> Bool<'ctx> {
    // Pseudo-boolean "exactly one" over a handful of disjuncts: sum the 0/1
    // indicators with ite and compare to 1, which stays linear regardless of how
    // many branches `oneOf` lists.
    let ones: Vec<Int<'ctx>> = clauses
        .iter()
        .map(|c| c.ite(&Int::from_i64(ctx, 1), &Int::from_i64(ctx, 0)))
        .collect();
    let zero = Int::from_i64(ctx, 0);
    let sum = ones.iter().fold(zero, |acc, term| acc + term);
    sum._eq(&Int::from_i64(ctx, 1))
}

fn compile_type<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let names: Vec<&str> = match value {
        serde_json::Value::String(s) => vec![s.as_str()],
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| Error::schema_validation("'type' entries must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(Error::schema_validation("'type' must be a string or array of strings")),
    };
    let mut clauses = Vec::with_capacity(names.len());
    for name in names {
        let primitive = PrimitiveType::try_from(name)
            .map_err(|()| Error::unsupported(format!("unknown type name '{name}'")))?;
        clauses.push(recognizer(primitive, x, theory));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(Bool::or(ctx, &refs))
}

fn recognizer<'ctx>(primitive: PrimitiveType, x: &Dynamic<'ctx>, theory: &Theory<'ctx>) -> Bool<'ctx> {
    match primitive {
        PrimitiveType::Array => theory.is_arr(x),
        PrimitiveType::Boolean => theory.is_bool(x),
        PrimitiveType::Integer => theory.is_int(x),
        PrimitiveType::Null => theory.is_null(x),
        PrimitiveType::Number => theory.is_number(x),
        PrimitiveType::Object => theory.is_obj(x),
        PrimitiveType::String => theory.is_str(x),
    }
}

fn as_length_bound(value: &serde_json::Value, keyword: &str) -> Result<i64, Error> {
    value
        .as_u64()
        .map(|v| v as i64)
        .ok_or_else(|| Error::schema_validation(format!("'{keyword}' must be a non-negative integer")))
}

fn compile_string_length<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    is_max: bool,
) -> Result<Bool<'ctx>, Error> {
    let keyword = if is_max { "maxLength" } else { "minLength" };
    let bound = as_length_bound(value, keyword)?;
    let ctx = theory.context();
    let length = theory.str_val(x).length();
    let bound_term = Int::from_i64(ctx, bound);
    let clause = if is_max {
        length.le(&bound_term)
    } else {
        length.ge(&bound_term)
    };
    Ok(guarded(theory.is_str(x), clause))
}

fn compile_pattern<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
) -> Result<Bool<'ctx>, Error> {
    let raw = value
        .as_str()
        .ok_or_else(|| Error::schema_validation("'pattern' must be a string"))?;
    let restricted = pattern::parse(raw)?;
    let term = theory.str_val(x);
    let clause = pattern::to_constraint(&restricted, &term, theory);
    Ok(guarded(theory.is_str(x), clause))
}

fn compile_format<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
) -> Result<Bool<'ctx>, Error> {
    let name = value
        .as_str()
        .ok_or_else(|| Error::schema_validation("'format' must be a string"))?;
    if !FIXED_FORMATS.contains(&name) {
        tracing::trace!(format = name, "format outside the fixed table, treated as opaque");
    }
    let term = theory.str_val(x);
    let clause = theory.format_predicate(name, &term);
    Ok(guarded(theory.is_str(x), clause))
}

fn compile_numeric_bound<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    is_max: bool,
    strict: bool,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let (num, den) = decimal_to_rational(value)?;
    let bound = Real::from_real(ctx, num, den);
    let actual = theory.numeric_val(x);
    let clause = if is_max {
        if strict {
            actual.lt(&bound)
        } else {
            actual.le(&bound)
        }
    } else if strict {
        actual.gt(&bound)
    } else {
        actual.ge(&bound)
    };
    Ok(guarded(theory.is_number(x), clause))
}

fn compile_bound_keyword<'ctx>(
    arg: &Keyword,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    is_max: bool,
    strict: bool,
) -> Result<Bool<'ctx>, Error> {
    match arg {
        Keyword::Value(value) => compile_numeric_bound(value, x, theory, is_max, strict),
        _ => Err(Error::internal(
            "'minimum'/'maximum' reached the compiler with an unexpected argument shape",
        )),
    }
}

/// Whether the sibling `exclusiveMinimum`/`exclusiveMaximum` on the same schema
/// node is the Draft-7 boolean toggle set to `true`. A numeric sibling is a
/// standalone bound handled by [`compile_exclusive_bound`], not a toggle, so it
/// is ignored here.
fn exclusive_toggle(schema: &Schema, keyword: &str) -> bool {
    matches!(
        schema.get(keyword),
        Some(Keyword::Value(serde_json::Value::Bool(true)))
    )
}

fn compile_exclusive_bound<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    is_max: bool,
) -> Result<Bool<'ctx>, Error> {
    // Disambiguated by JSON type: a boolean toggles the strictness of the
    // sibling `minimum`/`maximum` and is folded into that clause by
    // `compile_node`/`exclusive_toggle`, so it compiles to a vacuous `true`
    // here; a number is a standalone exclusive bound, handled below.
    match value {
        serde_json::Value::Bool(_) => Ok(Bool::from_bool(theory.context(), true)),
        serde_json::Value::Number(_) => compile_numeric_bound(value, x, theory, is_max, true),
        _ => Err(Error::schema_validation(
            "'exclusiveMinimum'/'exclusiveMaximum' must be a boolean or a number",
        )),
    }
}

fn compile_multiple_of<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let divisor = value
        .as_i64()
        .ok_or_else(|| Error::unsupported("'multipleOf' is only supported for integer divisors"))?;
    if divisor == 0 {
        return Err(Error::schema_validation("'multipleOf' must not be zero"));
    }
    let clause = (theory.int_val(x) % Int::from_i64(ctx, divisor))._eq(&Int::from_i64(ctx, 0));
    Ok(guarded(theory.is_int(x), clause))
}

fn required_clause<'ctx>(names: &[String], x: &Dynamic<'ctx>, theory: &Theory<'ctx>) -> Bool<'ctx> {
    let ctx = theory.context();
    if names.is_empty() {
        return Bool::from_bool(ctx, true);
    }
    let clauses: Vec<Bool> = names
        .iter()
        .map(|name| theory.has(x, &theory.string_literal(name)))
        .collect();
    let refs: Vec<&Bool> = clauses.iter().collect();
    Bool::and(ctx, &refs)
}

fn compile_properties<'ctx>(
    map: &ahash::AHashMap<String, Schema>,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let mut clauses = Vec::with_capacity(map.len());
    for (key, schema) in map {
        let key_term = theory.string_literal(key);
        let value_term = theory.prop(x, &key_term);
        let inner = compile(schema, &value_term, theory, universe, budget)?;
        clauses.push(theory.has(x, &key_term).implies(&inner));
    }
    if clauses.is_empty() {
        return Ok(guarded(theory.is_obj(x), Bool::from_bool(ctx, true)));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(guarded(theory.is_obj(x), Bool::and(ctx, &refs)))
}

fn compile_pattern_properties<'ctx>(
    map: &ahash::AHashMap<String, Schema>,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let mut clauses = Vec::new();
    for (raw_pattern, schema) in map {
        let restricted = pattern::parse(raw_pattern)?;
        for key in universe.keys() {
            if !pattern::matches(&restricted, key) {
                continue;
            }
            let key_term = theory.string_literal(key);
            let value_term = theory.prop(x, &key_term);
            let inner = compile(schema, &value_term, theory, universe, budget)?;
            clauses.push(theory.has(x, &key_term).implies(&inner));
        }
    }
    if clauses.is_empty() {
        return Ok(guarded(theory.is_obj(x), Bool::from_bool(ctx, true)));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(guarded(theory.is_obj(x), Bool::and(ctx, &refs)))
}

/// Keys from `properties`/`patternProperties` that a given schema node declares,
/// used to decide which universe keys `additionalProperties` actually governs.
fn declared_keys(schema: &Schema, universe: &Universe) -> Result<ahash::AHashSet<String>, Error> {
    let mut declared = ahash::AHashSet::default();
    if let Some(Keyword::SchemaMap(props)) = schema.get("properties") {
        declared.extend(props.keys().cloned());
    }
    if let Some(Keyword::SchemaMap(pattern_props)) = schema.get("patternProperties") {
        for raw_pattern in pattern_props.keys() {
            let restricted = pattern::parse(raw_pattern)?;
            for key in universe.keys() {
                if pattern::matches(&restricted, key) {
                    declared.insert(key.clone());
                }
            }
        }
    }
    Ok(declared)
}

fn compile_additional_properties<'ctx>(
    arg: &Keyword,
    declared: &ahash::AHashSet<String>,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let governed: Vec<&String> = universe
        .keys()
        .iter()
        .filter(|key| !declared.contains(key.as_str()))
        .collect();
    let clause = match arg {
        Keyword::Value(serde_json::Value::Bool(false)) => {
            let clauses: Vec<Bool> = governed
                .iter()
                .map(|key| theory.has(x, &theory.string_literal(key)).not())
                .collect();
            if clauses.is_empty() {
                Bool::from_bool(ctx, true)
            } else {
                let refs: Vec<&Bool> = clauses.iter().collect();
                Bool::and(ctx, &refs)
            }
        }
        Keyword::Value(serde_json::Value::Bool(true)) => Bool::from_bool(ctx, true),
        Keyword::Schema(schema) => {
            let mut clauses = Vec::new();
            for key in governed {
                let key_term = theory.string_literal(key);
                let value_term = theory.prop(x, &key_term);
                let inner = compile(schema, &value_term, theory, universe, budget)?;
                clauses.push(theory.has(x, &key_term).implies(&inner));
            }
            if clauses.is_empty() {
                Bool::from_bool(ctx, true)
            } else {
                let refs: Vec<&Bool> = clauses.iter().collect();
                Bool::and(ctx, &refs)
            }
        }
        _ => {
            return Err(Error::schema_validation(
                "'additionalProperties' must be a boolean or a schema",
            ))
        }
    };
    Ok(guarded(theory.is_obj(x), clause))
}

fn compile_dependent_required<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
) -> Result<Bool<'ctx>, Error> {
    let map = value
        .as_object()
        .ok_or_else(|| Error::schema_validation("'dependentRequired' must be an object"))?;
    let ctx = theory.context();
    let mut clauses = Vec::with_capacity(map.len());
    for (trigger, deps) in map {
        let deps = deps.as_array().ok_or_else(|| {
            Error::schema_validation("'dependentRequired' entries must be arrays of strings")
        })?;
        let names = deps
            .iter()
            .map(|d| {
                d.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::schema_validation("dependency names must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let trigger_term = theory.has(x, &theory.string_literal(trigger));
        clauses.push(trigger_term.implies(&required_clause(&names, x, theory)));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(guarded(theory.is_obj(x), Bool::and(ctx, &refs)))
}

fn compile_dependent_schemas<'ctx>(
    map: &ahash::AHashMap<String, Schema>,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let mut clauses = Vec::with_capacity(map.len());
    for (trigger, schema) in map {
        let inner = compile(schema, x, theory, universe, budget)?;
        let trigger_term = theory.has(x, &theory.string_literal(trigger));
        clauses.push(trigger_term.implies(&inner));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(guarded(theory.is_obj(x), Bool::and(ctx, &refs)))
}

fn compile_dependencies<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let map = value
        .as_object()
        .ok_or_else(|| Error::schema_validation("'dependencies' must be an object"))?;
    let ctx = theory.context();
    let mut clauses = Vec::with_capacity(map.len());
    for (trigger, target) in map {
        let trigger_term = theory.has(x, &theory.string_literal(trigger));
        let body = match target {
            serde_json::Value::Array(_) => {
                let names = target
                    .as_array()
                    .expect("matched Array above")
                    .iter()
                    .map(|d| {
                        d.as_str().map(str::to_string).ok_or_else(|| {
                            Error::schema_validation("legacy 'dependencies' entries must be strings")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                required_clause(&names, x, theory)
            }
            serde_json::Value::Object(_) | serde_json::Value::Bool(_) => {
                let schema = Schema::parse(target)?;
                compile(&schema, x, theory, universe, budget)?
            }
            _ => {
                return Err(Error::schema_validation(
                    "legacy 'dependencies' entries must be an array of strings or a schema",
                ))
            }
        };
        clauses.push(trigger_term.implies(&body));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(guarded(theory.is_obj(x), Bool::and(ctx, &refs)))
}

fn compile_items_count<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    is_max: bool,
) -> Result<Bool<'ctx>, Error> {
    let keyword = if is_max { "maxItems" } else { "minItems" };
    let bound = as_length_bound(value, keyword)?;
    let ctx = theory.context();
    let length = theory.len(x);
    let bound_term = Int::from_i64(ctx, bound);
    let clause = if is_max {
        length.le(&bound_term)
    } else {
        length.ge(&bound_term)
    };
    Ok(guarded(theory.is_arr(x), clause))
}

fn compile_unique_items<'ctx>(
    value: &serde_json::Value,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
) -> Result<Bool<'ctx>, Error> {
    let required = value
        .as_bool()
        .ok_or_else(|| Error::schema_validation("'uniqueItems' must be a boolean"))?;
    let ctx = theory.context();
    if !required {
        return Ok(Bool::from_bool(ctx, true));
    }
    let lmax = theory.max_array_length();
    let length = theory.len(x);
    let mut clauses = Vec::new();
    for i in 0..lmax {
        for j in (i + 1)..lmax {
            let i_term = Int::from_i64(ctx, i as i64);
            let j_term = Int::from_i64(ctx, j as i64);
            let both_present = Bool::and(
                ctx,
                &[&i_term.lt(&length), &j_term.lt(&length)],
            );
            let distinct = theory.elem(x, &i_term)._eq(&theory.elem(x, &j_term)).not();
            clauses.push(both_present.implies(&distinct));
        }
    }
    if clauses.is_empty() {
        return Ok(guarded(theory.is_arr(x), Bool::from_bool(ctx, true)));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(guarded(theory.is_arr(x), Bool::and(ctx, &refs)))
}

fn compile_items<'ctx>(
    schema: &Schema,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let lmax = theory.max_array_length();
    let length = theory.len(x);
    let mut clauses = Vec::with_capacity(lmax);
    for i in 0..lmax {
        let i_term = Int::from_i64(ctx, i as i64);
        let elem = theory.elem(x, &i_term);
        let inner = compile(schema, &elem, theory, universe, budget)?;
        clauses.push(i_term.lt(&length).implies(&inner));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    Ok(guarded(theory.is_arr(x), Bool::and(ctx, &refs)))
}

fn compile_contains<'ctx>(
    schema: &Schema,
    x: &Dynamic<'ctx>,
    theory: &Theory<'ctx>,
    universe: &Universe,
    budget: &mut Budget,
) -> Result<Bool<'ctx>, Error> {
    let ctx = theory.context();
    let lmax = theory.max_array_length();
    let length = theory.len(x);
    let mut clauses = Vec::with_capacity(lmax);
    for i in 0..lmax {
        let i_term = Int::from_i64(ctx, i as i64);
        let elem = theory.elem(x, &i_term);
        let inner = compile(schema, &elem, theory, universe, budget)?;
        clauses.push(Bool::and(ctx, &[&i_term.lt(&length), &inner]));
    }
    let refs: Vec<&Bool> = clauses.iter().collect();
    let any_match = Bool::or(ctx, &refs);
    // Empty arrays trivially satisfy `contains`.
    let clause = Bool::or(ctx, &[&length._eq(&Int::from_i64(ctx, 0)), &any_match]);
    Ok(guarded(theory.is_arr(x), clause))
}

fn decimal_to_rational(value: &serde_json::Value) -> Result<(i32, i32), Error> {
    let n = value
        .as_f64()
        .ok_or_else(|| Error::schema_validation("expected a JSON number"))?;
    const SCALE: f64 = 1_000_000.0;
    let scaled = (n * SCALE).round();
    if !scaled.is_finite() || scaled.abs() > i32::MAX as f64 {
        return Err(Error::unsupported("numeric bound out of representable range"));
    }
    Ok((scaled as i32, SCALE as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;
    use z3::{Config as Z3Config, Context, SatResult, Solver};

    #[test]
    fn integer_is_subset_of_number() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let producer = Schema::parse(&json!({"type": "integer"})).unwrap();
        let consumer = Schema::parse(&json!({"type": "number"})).unwrap();

        let p = compile(&producer, &x, &theory, &universe, &mut budget).unwrap();
        let c = compile(&consumer, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&p);
        solver.assert(&c.not());
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn number_is_not_subset_of_integer() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let producer = Schema::parse(&json!({"type": "number"})).unwrap();
        let consumer = Schema::parse(&json!({"type": "integer"})).unwrap();

        let p = compile(&producer, &x, &theory, &universe, &mut budget).unwrap();
        let c = compile(&consumer, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&p);
        solver.assert(&c.not());
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn one_of_rejects_overlap_that_any_of_accepts() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let consumer = Schema::parse(&json!({
            "oneOf": [{"type": "string"}, {"type": "integer"}]
        }))
        .unwrap();
        let c = compile(&consumer, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&c);
        solver.assert(&theory.is_int(&x));
        solver.assert(&theory.is_number(&x));
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn array_keywords_never_fire_on_non_arrays() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let schema = Schema::parse(&json!({"minItems": 2})).unwrap();
        let formula = compile(&schema, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&formula);
        solver.assert(&theory.is_str(&x));
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn required_properties_subset_is_detected() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let producer = Schema::parse(&json!({"type": "object"})).unwrap();
        let consumer = Schema::parse(&json!({"type": "object", "required": ["id"]})).unwrap();
        let universe = Universe::gather(&producer, &consumer);
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let p = compile(&producer, &x, &theory, &universe, &mut budget).unwrap();
        let c = compile(&consumer, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&p);
        solver.assert(&c.not());
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn additional_properties_false_ignores_sibling_declared_keys() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let schema = Schema::parse(&json!({
            "properties": {"a": true},
            "additionalProperties": false
        }))
        .unwrap();
        let universe = Universe::gather(&schema, &Schema::Bool(true));
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let formula = compile(&schema, &x, &theory, &universe, &mut budget).unwrap();
        let solver = Solver::new(&ctx);
        solver.assert(&formula);
        solver.assert(&theory.is_obj(&x));
        solver.assert(&theory.has(&x, &theory.string_literal("a")));
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn boolean_exclusive_minimum_excludes_the_boundary_value() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let schema = Schema::parse(&json!({"minimum": 5, "exclusiveMinimum": true})).unwrap();
        let formula = compile(&schema, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&formula);
        solver.assert(&theory.equals_literal(&x, &json!(5), &universe).unwrap());
        assert_eq!(
            solver.check(),
            SatResult::Unsat,
            "exclusiveMinimum: true must reject the boundary value itself"
        );
    }

    #[test]
    fn minimum_without_the_boolean_toggle_still_allows_the_boundary_value() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let schema = Schema::parse(&json!({"minimum": 5})).unwrap();
        let formula = compile(&schema, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&formula);
        solver.assert(&theory.equals_literal(&x, &json!(5), &universe).unwrap());
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn boolean_exclusive_minimum_false_behaves_like_plain_minimum() {
        let cfg = Z3Config::new();
        let ctx = Context::new(&cfg);
        let theory = Theory::new(&ctx, 8);
        let universe = Universe::default();
        let mut budget = Budget::new();
        let x = theory.fresh("x");

        let schema = Schema::parse(&json!({"minimum": 5, "exclusiveMinimum": false})).unwrap();
        let formula = compile(&schema, &x, &theory, &universe, &mut budget).unwrap();

        let solver = Solver::new(&ctx);
        solver.assert(&formula);
        solver.assert(&theory.equals_literal(&x, &json!(5), &universe).unwrap());
        assert_eq!(solver.check(), SatResult::Sat);
    }
}
