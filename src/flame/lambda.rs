//! Closure model.
//!
//! A `Lambda` is one user closure tagged with its signature. `Operator::bind`
//! pairs it with an operation and rejects every mismatched combination, so the
//! executor only ever sees well-typed operators.

use super::types::{Operation, Pair};
use crate::error::{FlameError, FlameResult};
use crate::kvs::Row;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type StringIter = Box<dyn Iterator<Item = String> + Send>;

pub type StringToIterable = Arc<dyn Fn(&str) -> Option<Vec<String>> + Send + Sync>;
pub type StringToPair = Arc<dyn Fn(&str) -> Option<Pair> + Send + Sync>;
pub type StringToPairIterable = Arc<dyn Fn(&str) -> Option<Vec<Pair>> + Send + Sync>;
pub type PairToStringIterable = Arc<dyn Fn(&Pair) -> Option<Vec<String>> + Send + Sync>;
pub type PairToPairIterable = Arc<dyn Fn(&Pair) -> Option<Vec<Pair>> + Send + Sync>;
pub type TwoStringsToString = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;
pub type StringToString = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
pub type RowToString = Arc<dyn Fn(&Row) -> Option<String> + Send + Sync>;
pub type StringToBoolean = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type IteratorToIterator = Arc<dyn Fn(StringIter) -> StringIter + Send + Sync>;

/// Signature tag of a registered closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LambdaKind {
    StringToIterable,
    StringToPair,
    StringToPairIterable,
    PairToStringIterable,
    PairToPairIterable,
    TwoStringsToString,
    StringToString,
    RowToString,
    StringToBoolean,
    IteratorToIterator,
}

/// How a request names its closure on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LambdaRef {
    /// A closure from the job's code package.
    Named { kind: LambdaKind, name: String },
    /// Sampling probability.
    Fraction(f64),
    /// The second table of a binary operator.
    Table(String),
}

#[derive(Clone)]
pub enum Lambda {
    StringToIterable(StringToIterable),
    StringToPair(StringToPair),
    StringToPairIterable(StringToPairIterable),
    PairToStringIterable(PairToStringIterable),
    PairToPairIterable(PairToPairIterable),
    TwoStringsToString(TwoStringsToString),
    StringToString(StringToString),
    RowToString(RowToString),
    StringToBoolean(StringToBoolean),
    IteratorToIterator(IteratorToIterator),
    Fraction(f64),
    Table(String),
}

impl Lambda {
    pub fn string_to_iterable<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        Lambda::StringToIterable(Arc::new(f))
    }

    pub fn string_to_pair<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<Pair> + Send + Sync + 'static,
    {
        Lambda::StringToPair(Arc::new(f))
    }

    pub fn string_to_pair_iterable<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<Vec<Pair>> + Send + Sync + 'static,
    {
        Lambda::StringToPairIterable(Arc::new(f))
    }

    pub fn pair_to_string_iterable<F>(f: F) -> Self
    where
        F: Fn(&Pair) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        Lambda::PairToStringIterable(Arc::new(f))
    }

    pub fn pair_to_pair_iterable<F>(f: F) -> Self
    where
        F: Fn(&Pair) -> Option<Vec<Pair>> + Send + Sync + 'static,
    {
        Lambda::PairToPairIterable(Arc::new(f))
    }

    pub fn two_strings_to_string<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    {
        Lambda::TwoStringsToString(Arc::new(f))
    }

    pub fn string_to_string<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Lambda::StringToString(Arc::new(f))
    }

    pub fn row_to_string<F>(f: F) -> Self
    where
        F: Fn(&Row) -> Option<String> + Send + Sync + 'static,
    {
        Lambda::RowToString(Arc::new(f))
    }

    pub fn string_to_boolean<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Lambda::StringToBoolean(Arc::new(f))
    }

    pub fn iterator_to_iterator<F>(f: F) -> Self
    where
        F: Fn(StringIter) -> StringIter + Send + Sync + 'static,
    {
        Lambda::IteratorToIterator(Arc::new(f))
    }

    /// Signature tag; `None` for the non-closure parameters.
    pub fn kind(&self) -> Option<LambdaKind> {
        match self {
            Lambda::StringToIterable(_) => Some(LambdaKind::StringToIterable),
            Lambda::StringToPair(_) => Some(LambdaKind::StringToPair),
            Lambda::StringToPairIterable(_) => Some(LambdaKind::StringToPairIterable),
            Lambda::PairToStringIterable(_) => Some(LambdaKind::PairToStringIterable),
            Lambda::PairToPairIterable(_) => Some(LambdaKind::PairToPairIterable),
            Lambda::TwoStringsToString(_) => Some(LambdaKind::TwoStringsToString),
            Lambda::StringToString(_) => Some(LambdaKind::StringToString),
            Lambda::RowToString(_) => Some(LambdaKind::RowToString),
            Lambda::StringToBoolean(_) => Some(LambdaKind::StringToBoolean),
            Lambda::IteratorToIterator(_) => Some(LambdaKind::IteratorToIterator),
            Lambda::Fraction(_) | Lambda::Table(_) => None,
        }
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lambda::Fraction(p) => write!(f, "Fraction({})", p),
            Lambda::Table(t) => write!(f, "Table({})", t),
            other => match other.kind() {
                Some(kind) => write!(f, "Closure({:?})", kind),
                None => write!(f, "Closure"),
            },
        }
    }
}

/// An operation bound to a closure of the matching signature.
#[derive(Clone, Debug)]
pub enum Operator {
    FlatMap(StringToIterableFn),
    MapToPair(StringToPairFn),
    FlatMapToPair(StringToPairIterableFn),
    PairFlatMap(PairToStringIterableFn),
    PairFlatMapToPair(PairToPairIterableFn),
    FoldByKey { op: TwoStringsToStringFn, zero: String },
    Fold { op: TwoStringsToStringFn, zero: String },
    GroupBy(StringToStringFn),
    Sample(f64),
    Intersection(String),
    Distinct,
    FromTable(RowToStringFn),
    Join(String),
    Cogroup(String),
    Filter(StringToBooleanFn),
    MapPartitions(IteratorToIteratorFn),
}

macro_rules! debug_closure {
    ($($name:ident => $inner:ty),* $(,)?) => {
        $(
            /// Closure handle that prints as its type name.
            #[derive(Clone)]
            pub struct $name(pub $inner);

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(stringify!($name))
                }
            }
        )*
    };
}

debug_closure! {
    StringToIterableFn => StringToIterable,
    StringToPairFn => StringToPair,
    StringToPairIterableFn => StringToPairIterable,
    PairToStringIterableFn => PairToStringIterable,
    PairToPairIterableFn => PairToPairIterable,
    TwoStringsToStringFn => TwoStringsToString,
    StringToStringFn => StringToString,
    RowToStringFn => RowToString,
    StringToBooleanFn => StringToBoolean,
    IteratorToIteratorFn => IteratorToIterator,
}

impl Operator {
    /// Pairs `operation` with its closure and zero element.
    pub fn bind(
        operation: Operation,
        lambda: Option<Lambda>,
        zero: Option<String>,
    ) -> FlameResult<Operator> {
        if operation.requires_zero() && zero.is_none() {
            return Err(FlameError::BadRequest(format!(
                "{:?} requires a zero element",
                operation
            )));
        }

        let described = format!("{:?}", lambda);
        let operator = match (operation, lambda, zero) {
            (Operation::FlatMap, Some(Lambda::StringToIterable(f)), _) => {
                Operator::FlatMap(StringToIterableFn(f))
            }
            (Operation::MapToPair, Some(Lambda::StringToPair(f)), _) => {
                Operator::MapToPair(StringToPairFn(f))
            }
            (Operation::FlatMapToPair, Some(Lambda::StringToPairIterable(f)), _) => {
                Operator::FlatMapToPair(StringToPairIterableFn(f))
            }
            (Operation::PairFlatMap, Some(Lambda::PairToStringIterable(f)), _) => {
                Operator::PairFlatMap(PairToStringIterableFn(f))
            }
            (Operation::PairFlatMapToPair, Some(Lambda::PairToPairIterable(f)), _) => {
                Operator::PairFlatMapToPair(PairToPairIterableFn(f))
            }
            (Operation::FoldByKey, Some(Lambda::TwoStringsToString(f)), Some(zero)) => {
                Operator::FoldByKey {
                    op: TwoStringsToStringFn(f),
                    zero,
                }
            }
            (Operation::Fold, Some(Lambda::TwoStringsToString(f)), Some(zero)) => Operator::Fold {
                op: TwoStringsToStringFn(f),
                zero,
            },
            (Operation::GroupBy, Some(Lambda::StringToString(f)), _) => {
                Operator::GroupBy(StringToStringFn(f))
            }
            (Operation::Sample, Some(Lambda::Fraction(p)), _) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(FlameError::BadRequest(format!(
                        "sample fraction {} outside [0, 1]",
                        p
                    )));
                }
                Operator::Sample(p)
            }
            (Operation::Intersection, Some(Lambda::Table(t)), _) => Operator::Intersection(t),
            (Operation::Distinct, None, _) => Operator::Distinct,
            (Operation::FromTable, Some(Lambda::RowToString(f)), _) => {
                Operator::FromTable(RowToStringFn(f))
            }
            (Operation::Join, Some(Lambda::Table(t)), _) => Operator::Join(t),
            (Operation::Cogroup, Some(Lambda::Table(t)), _) => Operator::Cogroup(t),
            (Operation::Filter, Some(Lambda::StringToBoolean(f)), _) => {
                Operator::Filter(StringToBooleanFn(f))
            }
            (Operation::MapPartitions, Some(Lambda::IteratorToIterator(f)), _) => {
                Operator::MapPartitions(IteratorToIteratorFn(f))
            }
            (operation, _, _) => {
                return Err(FlameError::BadRequest(format!(
                    "{:?} cannot run with {}",
                    operation, described
                )));
            }
        };

        Ok(operator)
    }
}
