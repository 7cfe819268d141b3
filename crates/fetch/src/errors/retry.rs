/// Classification for retry policy.
///
/// Used by [`RequestExecutor`](crate::RequestExecutor) to decide whether a
/// failed call is worth re-issuing.
///
/// | Class | Retried? |
/// |-------|----------|
/// | `Retry` | Yes, with exponential backoff, up to the configured attempts |
/// | `Never` | No, the error propagates immediately |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient transport failure - timeout, connection reset, redirect
    /// loop, or a generic request error. Another attempt may succeed.
    Retry,

    /// Terminal failure. Retrying cannot help: the attempts are already
    /// exhausted or the error is not a network condition at all.
    Never,
}
