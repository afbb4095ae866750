//! Builtin Functions
//!
//! Aggregates, rounding, string helpers, stateful sequence helpers, date
//! helpers and distribution sampling. `all`/`some`/`none` and `previous`
//! are special forms handled directly by the evaluator because they receive
//! unevaluated arguments.
//!
//! String helpers are null-safe: a Null argument behaves as the empty
//! string (`length` returns 0) rather than raising a runtime error.
//!
//! `today`/`now` and the relative date helpers resolve against the
//! configured reference date, never the wall clock, so a fixed seed keeps
//! producing byte-identical output no matter when it runs.

use super::EvalState;
use crate::error::{CompileResult, VagueError};
use crate::value::Value;
use chrono::{Datelike, NaiveDate};

/// Whether `name` is a builtin callable (including the evaluator-handled
/// special forms).
pub fn is_builtin(name: &str) -> bool {
    builtin_arity(name).is_some()
}

/// Argument count bounds `(min, max)` for every builtin, used by the
/// binder's arity check.
pub fn builtin_arity(name: &str) -> Option<(usize, usize)> {
    let arity = match name {
        // Aggregates
        "sum" | "avg" | "min" | "max" | "median" | "product" | "count" | "first" | "last" => {
            (1, 1)
        }
        // Collection predicates (special forms)
        "all" | "some" | "none" => (2, 2),
        // Rounding
        "round" | "floor" | "ceil" => (1, 2),
        // Strings
        "upper" | "lower" | "capitalize" | "kebab" | "snake" | "camel" | "trim" | "length" => {
            (1, 1)
        }
        "concat" => (1, usize::MAX),
        "substring" => (2, 3),
        "replace" => (3, 3),
        // Sequential (previous is a special form)
        "sequence" | "sequence_int" => (1, 2),
        "previous" => (1, 1),
        // Dates
        "today" | "now" => (0, 0),
        "days_ago" | "days_from_now" => (1, 1),
        "datetime" | "date_between" => (2, 2),
        // Distributions
        "gaussian" => (2, 4),
        "exponential" => (1, 3),
        "poisson" => (1, 1),
        "beta" => (2, 2),
        "uniform" => (2, 2),
        "lognormal" => (2, 4),
        _ => return None,
    };
    Some(arity)
}

/// Dispatch a builtin call with already-evaluated arguments. `today` is
/// the compile's configured reference date.
pub fn call_builtin(
    name: &str,
    args: &[Value],
    today: NaiveDate,
    state: &mut EvalState<'_>,
) -> CompileResult<Value> {
    match name {
        "sum" => aggregate_numeric(name, args, |xs| xs.iter().sum()),
        "product" => aggregate_numeric(name, args, |xs| xs.iter().product()),
        "avg" => {
            let xs = numeric_list(name, args)?;
            if xs.is_empty() {
                return Ok(Value::Null);
            }
            Ok(Value::Decimal(xs.iter().sum::<f64>() / xs.len() as f64))
        }
        "median" => {
            let mut xs = numeric_list(name, args)?;
            if xs.is_empty() {
                return Ok(Value::Null);
            }
            xs.sort_by(|a, b| a.total_cmp(b));
            let mid = xs.len() / 2;
            let median = if xs.len() % 2 == 1 {
                xs[mid]
            } else {
                (xs[mid - 1] + xs[mid]) / 2.0
            };
            Ok(Value::Decimal(median))
        }
        "min" => extremum(name, args, std::cmp::Ordering::Less),
        "max" => extremum(name, args, std::cmp::Ordering::Greater),
        "count" => match args.first() {
            Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
            Some(Value::Null) | None => Ok(Value::Int(0)),
            Some(other) => Err(VagueError::runtime(format!(
                "count() expects a list, found {}",
                other.type_name()
            ))),
        },
        "first" => match args.first() {
            Some(Value::List(items)) => Ok(items.first().cloned().unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        },
        "last" => match args.first() {
            Some(Value::List(items)) => Ok(items.last().cloned().unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        },

        "round" => rounded(name, args, f64::round),
        "floor" => rounded(name, args, f64::floor),
        "ceil" => rounded(name, args, f64::ceil),

        "upper" => Ok(Value::string(string_arg(args, 0).to_uppercase())),
        "lower" => Ok(Value::string(string_arg(args, 0).to_lowercase())),
        "capitalize" => {
            let s = string_arg(args, 0);
            let mut chars = s.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            };
            Ok(Value::string(capitalized))
        }
        "kebab" => Ok(Value::string(join_words(&string_arg(args, 0), "-", Case::Lower))),
        "snake" => Ok(Value::string(join_words(&string_arg(args, 0), "_", Case::Lower))),
        "camel" => {
            let words = split_words(&string_arg(args, 0));
            let mut out = String::new();
            for (i, word) in words.iter().enumerate() {
                if i == 0 {
                    out.push_str(&word.to_lowercase());
                } else {
                    let mut chars = word.chars();
                    if let Some(first) = chars.next() {
                        out.extend(first.to_uppercase());
                        out.push_str(&chars.as_str().to_lowercase());
                    }
                }
            }
            Ok(Value::string(out))
        }
        "trim" => Ok(Value::string(string_arg(args, 0).trim().to_string())),
        "concat" => {
            let mut out = String::new();
            for arg in args {
                out.push_str(&stringify(arg));
            }
            Ok(Value::string(out))
        }
        "substring" => {
            let s = string_arg(args, 0);
            let chars: Vec<char> = s.chars().collect();
            let start = int_arg(name, args, 1)?.max(0) as usize;
            let end = match args.get(2) {
                Some(_) => int_arg(name, args, 2)?.max(0) as usize,
                None => chars.len(),
            };
            let start = start.min(chars.len());
            let end = end.clamp(start, chars.len());
            Ok(Value::string(chars[start..end].iter().collect::<String>()))
        }
        "replace" => {
            let s = string_arg(args, 0);
            let from = string_arg(args, 1);
            let to = string_arg(args, 2);
            Ok(Value::string(s.replace(&from, &to)))
        }
        "length" => match args.first() {
            Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
            _ => Ok(Value::Int(string_arg(args, 0).chars().count() as i64)),
        },

        "sequence" => {
            let prefix = string_arg(args, 0);
            let start = match args.get(1) {
                Some(_) => int_arg(name, args, 1)?,
                None => 0,
            };
            let n = start + state.seq.record_index as i64;
            Ok(Value::string(format!("{prefix}{n}")))
        }
        "sequence_int" => {
            let key = string_arg(args, 0);
            let start = match args.get(1) {
                Some(_) => int_arg(name, args, 1)?,
                None => 0,
            };
            Ok(Value::Int(state.seq.counter_next(&key, start)))
        }

        "today" | "now" => Ok(Value::Date(today)),
        "days_ago" => {
            let n = int_arg(name, args, 0)?;
            Ok(Value::Date(today - chrono::Duration::days(n)))
        }
        "days_from_now" => {
            let n = int_arg(name, args, 0)?;
            Ok(Value::Date(today + chrono::Duration::days(n)))
        }
        "datetime" => {
            let y1 = int_arg(name, args, 0)? as i32;
            let y2 = int_arg(name, args, 1)? as i32;
            let lo = NaiveDate::from_ymd_opt(y1.min(y2), 1, 1)
                .ok_or_else(|| VagueError::runtime(format!("invalid year {y1}")))?;
            let hi = NaiveDate::from_ymd_opt(y1.max(y2), 12, 31)
                .ok_or_else(|| VagueError::runtime(format!("invalid year {y2}")))?;
            random_date(lo, hi, state)
        }
        "date_between" => {
            let lo = date_arg(name, args, 0)?;
            let hi = date_arg(name, args, 1)?;
            if hi < lo {
                return Err(VagueError::runtime(format!(
                    "date_between: '{lo}' is after '{hi}'"
                )));
            }
            random_date(lo, hi, state)
        }

        "gaussian" => {
            let mean = num_arg(name, args, 0)?;
            let stddev = num_arg(name, args, 1)?;
            if stddev < 0.0 {
                return Err(VagueError::runtime("gaussian: negative standard deviation"));
            }
            let lo = opt_num_arg(name, args, 2)?.unwrap_or(f64::NEG_INFINITY);
            let hi = opt_num_arg(name, args, 3)?.unwrap_or(f64::INFINITY);
            Ok(Value::Decimal(state.prng.gaussian(mean, stddev, lo, hi)))
        }
        "exponential" => {
            let lambda = num_arg(name, args, 0)?;
            if lambda <= 0.0 {
                return Err(VagueError::runtime("exponential: rate must be positive"));
            }
            let lo = opt_num_arg(name, args, 1)?.unwrap_or(0.0);
            let hi = opt_num_arg(name, args, 2)?.unwrap_or(f64::INFINITY);
            Ok(Value::Decimal(state.prng.exponential(lambda, lo, hi)))
        }
        "poisson" => {
            let lambda = num_arg(name, args, 0)?;
            if lambda <= 0.0 {
                return Err(VagueError::runtime("poisson: mean must be positive"));
            }
            Ok(Value::Int(state.prng.poisson(lambda)))
        }
        "beta" => {
            let a = num_arg(name, args, 0)?;
            let b = num_arg(name, args, 1)?;
            if a <= 0.0 || b <= 0.0 {
                return Err(VagueError::runtime("beta: shape parameters must be positive"));
            }
            Ok(Value::Decimal(state.prng.beta(a, b)))
        }
        "uniform" => {
            let lo = num_arg(name, args, 0)?;
            let hi = num_arg(name, args, 1)?;
            Ok(Value::Decimal(state.prng.range_float(lo, hi)))
        }
        "lognormal" => {
            let mu = num_arg(name, args, 0)?;
            let sigma = num_arg(name, args, 1)?;
            if sigma < 0.0 {
                return Err(VagueError::runtime("lognormal: negative sigma"));
            }
            let lo = opt_num_arg(name, args, 2)?.unwrap_or(0.0);
            let hi = opt_num_arg(name, args, 3)?.unwrap_or(f64::INFINITY);
            Ok(Value::Decimal(state.prng.lognormal(mu, sigma, lo, hi)))
        }

        other => Err(VagueError::runtime(format!("unknown generator '{other}'"))),
    }
}

// ----------------------------------------------------------------------
// Argument helpers
// ----------------------------------------------------------------------

fn num_arg(name: &str, args: &[Value], idx: usize) -> CompileResult<f64> {
    args.get(idx)
        .and_then(Value::as_number)
        .ok_or_else(|| VagueError::runtime(format!("{name}(): argument {} must be a number", idx + 1)))
}

fn opt_num_arg(name: &str, args: &[Value], idx: usize) -> CompileResult<Option<f64>> {
    match args.get(idx) {
        None => Ok(None),
        Some(_) => num_arg(name, args, idx).map(Some),
    }
}

fn int_arg(name: &str, args: &[Value], idx: usize) -> CompileResult<i64> {
    match args.get(idx) {
        Some(Value::Int(v)) => Ok(*v),
        Some(Value::Decimal(v)) if v.fract() == 0.0 => Ok(*v as i64),
        _ => Err(VagueError::runtime(format!(
            "{name}(): argument {} must be an integer",
            idx + 1
        ))),
    }
}

/// Null-safe string view: Null reads as the empty string.
fn string_arg(args: &[Value], idx: usize) -> String {
    match args.get(idx) {
        Some(value) => stringify(value),
        None => String::new(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Int(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        other => other.to_string(),
    }
}

fn date_arg(name: &str, args: &[Value], idx: usize) -> CompileResult<NaiveDate> {
    match args.get(idx) {
        Some(Value::Date(d)) => Ok(*d),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            VagueError::runtime(format!("{name}(): '{s}' is not an ISO date (YYYY-MM-DD)"))
        }),
        _ => Err(VagueError::runtime(format!(
            "{name}(): argument {} must be a date",
            idx + 1
        ))),
    }
}

fn random_date(lo: NaiveDate, hi: NaiveDate, state: &mut EvalState<'_>) -> CompileResult<Value> {
    let lo_days = i64::from(lo.num_days_from_ce());
    let hi_days = i64::from(hi.num_days_from_ce());
    let picked = state.prng.range_int(lo_days, hi_days);
    NaiveDate::from_num_days_from_ce_opt(picked as i32)
        .map(Value::Date)
        .ok_or_else(|| VagueError::runtime("generated date out of range"))
}

// ----------------------------------------------------------------------
// Aggregate helpers
// ----------------------------------------------------------------------

/// Flatten the single list argument into numbers, skipping Nulls (absent
/// optional fields aggregate as if missing).
fn numeric_list(name: &str, args: &[Value]) -> CompileResult<Vec<f64>> {
    let items = match args.first() {
        Some(Value::List(items)) => items.as_slice(),
        Some(Value::Null) | None => &[],
        Some(single) => std::slice::from_ref(single),
    };
    let mut xs = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Null => {}
            other => match other.as_number() {
                Some(x) => xs.push(x),
                None => {
                    return Err(VagueError::runtime(format!(
                        "{name}() expects numbers, found {}",
                        other.type_name()
                    )));
                }
            },
        }
    }
    Ok(xs)
}

fn aggregate_numeric(
    name: &str,
    args: &[Value],
    fold: impl Fn(&[f64]) -> f64,
) -> CompileResult<Value> {
    // Keep integer results integral: sums and products of ints stay ints.
    let all_int = matches!(args.first(), Some(Value::List(items))
        if items.iter().all(|v| matches!(v, Value::Int(_))));
    let xs = numeric_list(name, args)?;
    if xs.is_empty() {
        return Ok(Value::Int(if name == "product" { 1 } else { 0 }));
    }
    let result = fold(&xs);
    if all_int && result.fract() == 0.0 {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Decimal(result))
    }
}

/// min/max over arbitrary comparable values (numbers, strings, dates).
fn extremum(name: &str, args: &[Value], keep: std::cmp::Ordering) -> CompileResult<Value> {
    let items = match args.first() {
        Some(Value::List(items)) => items.as_slice(),
        Some(Value::Null) | None => &[],
        Some(single) => std::slice::from_ref(single),
    };
    let mut best: Option<&Value> = None;
    for item in items {
        if item.is_null() {
            continue;
        }
        match best {
            None => best = Some(item),
            Some(current) => {
                if item.try_cmp(current).map_err(|_| {
                    VagueError::runtime(format!("{name}() over mixed value types"))
                })? == keep
                {
                    best = Some(item);
                }
            }
        }
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn rounded(name: &str, args: &[Value], apply: fn(f64) -> f64) -> CompileResult<Value> {
    let x = num_arg(name, args, 0)?;
    let digits = match args.get(1) {
        Some(_) => int_arg(name, args, 1)?,
        None => 0,
    };
    let factor = 10f64.powi(digits as i32);
    let result = apply(x * factor) / factor;
    match args.first() {
        Some(Value::Int(_)) => Ok(Value::Int(result as i64)),
        _ => Ok(Value::Decimal(result)),
    }
}

// ----------------------------------------------------------------------
// Word splitting for case helpers
// ----------------------------------------------------------------------

enum Case {
    Lower,
}

fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        // camelCase boundary: lower followed by upper
        if c.is_uppercase() && i > 0 && chars[i - 1].is_lowercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn join_words(s: &str, separator: &str, case: Case) -> String {
    let words = split_words(s);
    let converted: Vec<String> = words
        .iter()
        .map(|w| match case {
            Case::Lower => w.to_lowercase(),
        })
        .collect();
    converted.join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Arena, SequenceState};
    use crate::rng::Prng;
    use crate::warnings::WarningCollector;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
    }

    /// `call_builtin` with the test anchor date.
    fn call(name: &str, args: &[Value], state: &mut EvalState<'_>) -> CompileResult<Value> {
        call_builtin(name, args, anchor(), state)
    }

    fn with_state<T>(f: impl FnOnce(&mut EvalState<'_>) -> T) -> T {
        let arena = Arena::new();
        let mut seq = SequenceState::new();
        let mut prng = Prng::seeded(1234);
        let mut warnings = WarningCollector::new();
        let mut state = EvalState {
            prng: &mut prng,
            warnings: &mut warnings,
            arena: &arena,
            seq: &mut seq,
        };
        f(&mut state)
    }

    fn ints(xs: &[i64]) -> Value {
        Value::List(xs.iter().map(|x| Value::Int(*x)).collect())
    }

    #[test]
    fn aggregates() {
        with_state(|state| {
            assert_eq!(
                call("sum", &[ints(&[1, 2, 3])], state).expect("sum"),
                Value::Int(6)
            );
            assert_eq!(
                call("avg", &[ints(&[1, 2, 3])], state).expect("avg"),
                Value::Decimal(2.0)
            );
            assert_eq!(
                call("median", &[ints(&[5, 1, 3])], state).expect("median"),
                Value::Decimal(3.0)
            );
            assert_eq!(
                call("median", &[ints(&[4, 1, 3, 2])], state).expect("median"),
                Value::Decimal(2.5)
            );
            assert_eq!(
                call("product", &[ints(&[2, 3, 4])], state).expect("product"),
                Value::Int(24)
            );
            assert_eq!(
                call("count", &[ints(&[9, 9])], state).expect("count"),
                Value::Int(2)
            );
            assert_eq!(
                call("min", &[ints(&[5, 1, 3])], state).expect("min"),
                Value::Int(1)
            );
            assert_eq!(
                call("max", &[ints(&[5, 1, 3])], state).expect("max"),
                Value::Int(5)
            );
            assert_eq!(
                call("first", &[ints(&[7, 8])], state).expect("first"),
                Value::Int(7)
            );
            assert_eq!(
                call("last", &[ints(&[7, 8])], state).expect("last"),
                Value::Int(8)
            );
        });
    }

    #[test]
    fn aggregates_skip_nulls() {
        with_state(|state| {
            let list = Value::List(vec![Value::Int(1), Value::Null, Value::Int(3)]);
            assert_eq!(
                call("sum", &[list.clone()], state).expect("sum"),
                Value::Decimal(4.0)
            );
            assert_eq!(
                call("min", &[list], state).expect("min"),
                Value::Int(1)
            );
        });
    }

    #[test]
    fn empty_aggregates() {
        with_state(|state| {
            let empty = Value::List(vec![]);
            assert_eq!(
                call("sum", &[empty.clone()], state).expect("sum"),
                Value::Int(0)
            );
            assert_eq!(
                call("avg", &[empty.clone()], state).expect("avg"),
                Value::Null
            );
            assert_eq!(
                call("max", &[empty], state).expect("max"),
                Value::Null
            );
        });
    }

    #[test]
    fn rounding_with_digits() {
        with_state(|state| {
            assert_eq!(
                call("round", &[Value::Decimal(3.14159), Value::Int(2)], state)
                    .expect("round"),
                Value::Decimal(3.14)
            );
            assert_eq!(
                call("floor", &[Value::Decimal(3.9)], state).expect("floor"),
                Value::Decimal(3.0)
            );
            assert_eq!(
                call("ceil", &[Value::Decimal(3.1)], state).expect("ceil"),
                Value::Decimal(4.0)
            );
        });
    }

    #[test]
    fn string_helpers() {
        with_state(|state| {
            assert_eq!(
                call("upper", &[Value::string("abc")], state).expect("upper"),
                Value::string("ABC")
            );
            assert_eq!(
                call("capitalize", &[Value::string("hello world")], state)
                    .expect("capitalize"),
                Value::string("Hello world")
            );
            assert_eq!(
                call("kebab", &[Value::string("Hello Big World")], state)
                    .expect("kebab"),
                Value::string("hello-big-world")
            );
            assert_eq!(
                call("snake", &[Value::string("helloWorld")], state).expect("snake"),
                Value::string("hello_world")
            );
            assert_eq!(
                call("camel", &[Value::string("hello_big_world")], state)
                    .expect("camel"),
                Value::string("helloBigWorld")
            );
            assert_eq!(
                call(
                    "concat",
                    &[Value::string("a"), Value::Int(1), Value::Null],
                    state
                )
                .expect("concat"),
                Value::string("a1")
            );
            assert_eq!(
                call(
                    "substring",
                    &[Value::string("abcdef"), Value::Int(1), Value::Int(4)],
                    state
                )
                .expect("substring"),
                Value::string("bcd")
            );
            assert_eq!(
                call(
                    "replace",
                    &[Value::string("a-b-c"), Value::string("-"), Value::string(".")],
                    state
                )
                .expect("replace"),
                Value::string("a.b.c")
            );
        });
    }

    #[test]
    fn string_helpers_are_null_safe() {
        with_state(|state| {
            assert_eq!(
                call("upper", &[Value::Null], state).expect("upper"),
                Value::string("")
            );
            assert_eq!(
                call("length", &[Value::Null], state).expect("length"),
                Value::Int(0)
            );
        });
    }

    #[test]
    fn sequence_helpers() {
        with_state(|state| {
            assert_eq!(
                call(
                    "sequence",
                    &[Value::string("INV-"), Value::Int(100)],
                    state
                )
                .expect("sequence"),
                Value::string("INV-100")
            );
            state.seq.record_index = 3;
            assert_eq!(
                call(
                    "sequence",
                    &[Value::string("INV-"), Value::Int(100)],
                    state
                )
                .expect("sequence"),
                Value::string("INV-103")
            );

            assert_eq!(
                call("sequence_int", &[Value::string("k"), Value::Int(5)], state)
                    .expect("sequence_int"),
                Value::Int(5)
            );
            assert_eq!(
                call("sequence_int", &[Value::string("k"), Value::Int(5)], state)
                    .expect("sequence_int"),
                Value::Int(6)
            );
        });
    }

    #[test]
    fn clock_builtins_resolve_against_the_anchor() {
        with_state(|state| {
            assert_eq!(
                call("today", &[], state).expect("today"),
                Value::Date(anchor())
            );
            assert_eq!(
                call("now", &[], state).expect("now"),
                Value::Date(anchor())
            );
            assert_eq!(
                call("days_ago", &[Value::Int(7)], state).expect("days_ago"),
                Value::Date(anchor() - chrono::Duration::days(7))
            );
            assert_eq!(
                call("days_from_now", &[Value::Int(30)], state).expect("days_from_now"),
                Value::Date(anchor() + chrono::Duration::days(30))
            );
        });
    }

    #[test]
    fn date_between_is_inclusive_and_seeded() {
        with_state(|state| {
            for _ in 0..50 {
                let value = call(
                    "date_between",
                    &[Value::string("2024-01-01"), Value::string("2024-01-31")],
                    state,
                )
                .expect("date_between");
                let Value::Date(d) = value else {
                    panic!("expected a date");
                };
                assert_eq!(d.year(), 2024);
                assert_eq!(d.month(), 1);
            }
        });
    }

    #[test]
    fn datetime_spans_years() {
        with_state(|state| {
            for _ in 0..50 {
                let Value::Date(d) =
                    call("datetime", &[Value::Int(2020), Value::Int(2022)], state)
                        .expect("datetime")
                else {
                    panic!("expected a date");
                };
                assert!((2020..=2022).contains(&d.year()));
            }
        });
    }

    #[test]
    fn distributions_respect_bounds() {
        with_state(|state| {
            for _ in 0..100 {
                let Value::Decimal(x) = call(
                    "gaussian",
                    &[
                        Value::Int(50),
                        Value::Int(30),
                        Value::Int(0),
                        Value::Int(100),
                    ],
                    state,
                )
                .expect("gaussian") else {
                    panic!("expected a decimal");
                };
                assert!((0.0..=100.0).contains(&x));

                let Value::Decimal(u) =
                    call("uniform", &[Value::Int(5), Value::Int(6)], state)
                        .expect("uniform")
                else {
                    panic!("expected a decimal");
                };
                assert!((5.0..6.0).contains(&u));

                let Value::Int(p) =
                    call("poisson", &[Value::Decimal(4.0)], state).expect("poisson")
                else {
                    panic!("expected an int");
                };
                assert!(p >= 0);
            }
        });
    }

    #[test]
    fn invalid_distribution_params_error() {
        with_state(|state| {
            assert!(call(
                "gaussian",
                &[Value::Int(0), Value::Int(-1)],
                state
            )
            .is_err());
            assert!(call("poisson", &[Value::Int(0)], state).is_err());
            assert!(call("beta", &[Value::Int(0), Value::Int(1)], state).is_err());
        });
    }
}
