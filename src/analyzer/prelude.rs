//! Constructor functions for the combinators, so grammar code reads as
//! `map(tuple2(a, b), f)` instead of nested `::new` calls.

use super::combinators::*;
use super::core::Parser;

// -- single tokens

/// Matches one token equal to `expected` and discards it; failures read as `label`.
pub fn exact<I, L>(expected: I, label: L) -> WithContext<AsUnit<Equal<I>, I>, L>
where
    I: Clone + PartialEq,
    L: ToString,
{
    WithContext::new(AsUnit::new(Equal::new(expected)), label)
}

/// Matches one token for which `classify` returns a value.
pub fn satisfy<I, O, F>(classify: F) -> Satisfy<I, O, F>
where
    F: Fn(&I) -> Option<O>,
{
    Satisfy::new(classify)
}

// -- sequencing

pub fn tuple2<A, B, I, OA, OB>(first: A, second: B) -> Tuple2<A, B, I, OA, OB>
where
    A: Parser<I, OA>,
    B: Parser<I, OB>,
{
    Tuple2::new(first, second)
}

pub fn tuple3<A, B, C, I, OA, OB, OC>(first: A, second: B, third: C) -> Tuple3<A, B, C, I, OA, OB, OC>
where
    A: Parser<I, OA>,
    B: Parser<I, OB>,
    C: Parser<I, OC>,
{
    Tuple3::new(first, second, third)
}

/// Runs `prefix`, then keeps the output of `body`.
pub fn preceded<A, B, I, O>(prefix: A, body: B) -> Preceded<A, B, I, O>
where
    A: Parser<I, ()>,
    B: Parser<I, O>,
{
    Preceded::new(prefix, body)
}

/// `open body close`, keeping the body.
pub fn delimited<L, P, R, I, O>(open: L, body: P, close: R) -> Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    Delimited::new(open, body, close)
}

// -- alternatives and repetition

/// First alternative that succeeds; on total failure, the error that got furthest.
pub fn choice<I, O>(alternatives: Vec<Box<dyn Parser<I, O>>>) -> Choice<I, O> {
    Choice::new(alternatives)
}

pub fn optional<P, I, O>(parser: P) -> Optional<P, I, O>
where
    P: Parser<I, O>,
{
    Optional::new(parser)
}

pub fn many<P, I, O>(parser: P) -> Many<P, I, O>
where
    P: Parser<I, O>,
{
    Many::new(parser)
}

/// Zero or more `item`s separated by `separator`.
pub fn separated_list<P, S, I, O>(item: P, separator: S) -> SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    SeparatedList::new(item, separator)
}

// -- transformation

pub fn map<P, F, A, B, I>(parser: P, transform: F) -> Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    Map::new(parser, transform)
}

/// Names the grammar rule in error messages.
pub fn with_context<P, I, O, C>(parser: P, rule: C) -> WithContext<P, C>
where
    P: Parser<I, O>,
    C: ToString,
{
    WithContext::new(parser, rule)
}

/// Defers building `make`'s parser until it runs, for recursive rules.
pub fn lazy<I, O, F, P>(make: F) -> Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    Lazy::new(make)
}
