//! Utility macros used across the crate.

/// Returns early with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns `Err($error)` instead of
/// panicking. The error is not converted, so it must already have the type the
/// enclosing function returns (call `.into()` where needed).
///
/// ```ignore
/// ensure!(self.size <= self.max_size, ParseError::too_large_initial(self.size, self.max_size));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
