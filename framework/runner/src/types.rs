/// Result type used across the runner. Compatible with `?` on any error type.
pub type RegressResult<T> = anyhow::Result<T>;
