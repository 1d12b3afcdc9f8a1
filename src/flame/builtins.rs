//! Closures compiled into the stock Flame worker.
//!
//! Jobs that need other logic embed this crate and register their own
//! closures next to (or instead of) these.

use super::lambda::Lambda;
use super::registry::ClosureRegistry;
use super::types::Pair;

use regex::Regex;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9]+").expect("word pattern is valid"));

/// Lowercase alphanumeric words of `text`, in order, duplicates kept.
pub fn words(text: &str) -> Vec<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn register_builtins(registry: &ClosureRegistry) {
    registry.register("split_words", Lambda::string_to_iterable(|s| Some(words(s))));
    registry.register("word_pair", Lambda::string_to_pair(|s| Some(Pair::new(s, "1"))));
    registry.register(
        "split_word_pairs",
        Lambda::string_to_pair_iterable(|s| {
            Some(words(s).into_iter().map(|w| Pair::new(w, "1")).collect())
        }),
    );
    registry.register("pair_words", Lambda::pair_to_string_iterable(|p| Some(words(&p.value))));
    registry.register(
        "swap",
        Lambda::pair_to_pair_iterable(|p| Some(vec![Pair::new(p.value.clone(), p.key.clone())])),
    );
    registry.register("sum", Lambda::two_strings_to_string(sum));
    registry.register("concat", Lambda::two_strings_to_string(concat));
    registry.register("identity", Lambda::string_to_string(|s| Some(s.to_string())));
    registry.register(
        "first_letter",
        Lambda::string_to_string(|s| s.chars().next().map(|c| c.to_lowercase().to_string())),
    );
    registry.register(
        "first_column",
        Lambda::row_to_string(|row| row.values().next().map(|(_, v)| v)),
    );
    registry.register("non_empty", Lambda::string_to_boolean(|s| !s.trim().is_empty()));
    registry.register(
        "sorted",
        Lambda::iterator_to_iterator(|values| {
            let mut values: Vec<String> = values.collect();
            values.sort();
            Box::new(values.into_iter())
        }),
    );
}

/// Integer addition; any non-integer operand yields nothing.
fn sum(acc: &str, value: &str) -> Option<String> {
    let acc: i64 = acc.trim().parse().ok()?;
    let value: i64 = value.trim().parse().ok()?;
    Some(acc.checked_add(value)?.to_string())
}

/// Comma-joins values, treating an empty accumulator as the start.
fn concat(acc: &str, value: &str) -> Option<String> {
    if acc.is_empty() {
        Some(value.to_string())
    } else {
        Some(format!("{},{}", acc, value))
    }
}
