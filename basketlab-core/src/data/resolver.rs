//! Ordered fallback lookups.
//!
//! Instead of nesting "try this, then that", callers list their strategies in
//! order and [`resolve_first`] returns the first hit along with the name of the
//! strategy that produced it.

/// One named lookup step.
pub struct LookupStrategy<'a, I: ?Sized, T> {
    pub name: &'static str,
    lookup: Box<dyn Fn(&I) -> Option<T> + 'a>,
}

impl<'a, I: ?Sized, T> LookupStrategy<'a, I, T> {
    pub fn new(name: &'static str, lookup: impl Fn(&I) -> Option<T> + 'a) -> Self {
        Self {
            name,
            lookup: Box::new(lookup),
        }
    }

    pub fn try_lookup(&self, input: &I) -> Option<T> {
        (self.lookup)(input)
    }
}

/// A hit and the strategy that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub strategy: &'static str,
    pub value: T,
}

/// Run `strategies` in order and return the first hit.
pub fn resolve_first<I: ?Sized, T>(
    strategies: &[LookupStrategy<'_, I, T>],
    input: &I,
) -> Option<Resolution<T>> {
    strategies.iter().find_map(|s| {
        s.try_lookup(input).map(|value| Resolution {
            strategy: s.name,
            value,
        })
    })
}
