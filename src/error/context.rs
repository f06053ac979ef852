//! Context attachment for `Result` chains.

use super::{Error, Result};

/// Extension trait adding context to `Result<T>` values.
///
/// # Example
///
/// ```rust
/// use courier_core::error::{ContextExt, Error, Result};
///
/// fn send() -> Result<()> {
///     Err(Error::network("connection reset"))
/// }
///
/// let err = send().context("dispatching GET /books").unwrap_err();
/// assert!(err.to_string().contains("dispatching GET /books"));
/// ```
pub trait ContextExt<T> {
    /// Wraps the error with a static context message.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wraps the error with a lazily-built context message.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ContextExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_context_is_lazy() {
        let ok: Result<u8> = Ok(1);
        let ok = ok.with_context(|| -> String { unreachable!("not called on Ok") });
        assert_eq!(ok.unwrap(), 1);

        let err: Result<u8> = Err(Error::network("down"));
        let err = err.with_context(|| format!("attempt {}", 2)).unwrap_err();
        assert!(err.to_string().contains("attempt 2"));
    }
}
