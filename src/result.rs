//! Combinators over [`std::result::Result`] used at the fetch and translation
//! boundaries.
//!
//! Rust's `Result` already covers construction, `map` and `map_err`; this
//! module adds the two-sided and merging operations the sync code leans on.

/// Extension methods for `Result`.
pub trait ResultExt<T, E> {
    /// Returns the `Ok` value, or the handler's answer for the `Err` value.
    fn unwrap_or_handle<F>(self, handler: F) -> T
    where
        F: FnOnce(E) -> T;

    /// Applies exactly one of the two functions, depending on the variant.
    fn map_both<U, G, FO, FE>(self, on_ok: FO, on_err: FE) -> Result<U, G>
    where
        FO: FnOnce(T) -> U,
        FE: FnOnce(E) -> G;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn unwrap_or_handle<F>(self, handler: F) -> T
    where
        F: FnOnce(E) -> T,
    {
        match self {
            Ok(value) => value,
            Err(e) => handler(e),
        }
    }

    fn map_both<U, G, FO, FE>(self, on_ok: FO, on_err: FE) -> Result<U, G>
    where
        FO: FnOnce(T) -> U,
        FE: FnOnce(E) -> G,
    {
        match self {
            Ok(value) => Ok(on_ok(value)),
            Err(e) => Err(on_err(e)),
        }
    }
}

/// Combines two results. Left-biased: when `a` is an error it is returned
/// as-is and `b` is never looked at.
///
/// A panic in `merge` is not caught; use [`try_merge_results`] when the
/// combiner can fail.
pub fn merge_results<A, B, C, E, F>(a: Result<A, E>, b: Result<B, E>, merge: F) -> Result<C, E>
where
    F: FnOnce(A, B) -> C,
{
    let a = a?;
    let b = b?;
    Ok(merge(a, b))
}

/// Like [`merge_results`] for a fallible merge; its error lands in the same
/// channel rather than escaping.
pub fn try_merge_results<A, B, C, E, F>(a: Result<A, E>, b: Result<B, E>, merge: F) -> Result<C, E>
where
    F: FnOnce(A, B) -> Result<C, E>,
{
    let a = a?;
    let b = b?;
    merge(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn unwrap_or_handle_uses_handler_only_for_err() {
        let ok: Result<i32, &str> = Ok(1);
        let err: Result<i32, &str> = Err("bad");

        assert_eq!(ok.unwrap_or_handle(|_| panic!("handler called on Ok")), 1);
        assert_eq!(err.unwrap_or_handle(|e| e.len() as i32), 3);
    }

    #[test]
    fn map_both_only_evaluates_one_side() {
        let err_calls = Cell::new(0);
        let ok: Result<i32, String> = Ok(2);
        let mapped = ok.map_both(
            |v| v * 10,
            |e| {
                err_calls.set(err_calls.get() + 1);
                e
            },
        );
        assert_eq!(mapped, Ok(20));
        assert_eq!(err_calls.get(), 0);

        let ok_calls = Cell::new(0);
        let err: Result<i32, String> = Err("x".into());
        let mapped = err.map_both(
            |v| {
                ok_calls.set(ok_calls.get() + 1);
                v
            },
            |e| format!("{e}!"),
        );
        assert_eq!(mapped, Err("x!".to_string()));
        assert_eq!(ok_calls.get(), 0);
    }

    #[test]
    fn merge_results_combines_two_oks() {
        let merged = merge_results::<_, _, _, String, _>(Ok(2), Ok(3), |a, b| a + b);
        assert_eq!(merged, Ok(5));
    }

    #[test]
    fn merge_results_returns_left_error_without_calling_merge() {
        let called = Cell::new(false);
        let merged: Result<i32, &str> = merge_results(Err("left"), Err("right"), |a: i32, b: i32| {
            called.set(true);
            a + b
        });
        assert_eq!(merged, Err("left"));
        assert!(!called.get());

        let merged: Result<i32, &str> = merge_results(Err("left"), Ok(1), |a: i32, b: i32| a + b);
        assert_eq!(merged, Err("left"));
    }

    #[test]
    fn merge_results_returns_right_error() {
        let merged: Result<i32, &str> = merge_results(Ok(1), Err("right"), |a: i32, b: i32| a + b);
        assert_eq!(merged, Err("right"));
    }

    #[test]
    fn try_merge_results_wraps_merge_failure() {
        let merged: Result<i32, String> =
            try_merge_results(Ok(1), Ok(0), |a: i32, b: i32| a.checked_div(b).ok_or_else(|| "divide by zero".to_string()));
        assert_eq!(merged, Err("divide by zero".to_string()));
    }
}
