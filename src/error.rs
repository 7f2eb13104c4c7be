pub use crate::types::WpFinderError;

pub type Result<T> = std::result::Result<T, WpFinderError>;

/// Attaches a message to foreign errors while converting them into the
/// startup-time error kinds. Both kinds abort the run before it starts.
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    fn input_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| WpFinderError::ConfigError(format!("{}: {}", f(), e)))
    }

    fn input_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| WpFinderError::InputError(format!("{}: {}", f(), e)))
    }
}
