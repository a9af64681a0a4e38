/// A state that controls the flow of a polling loop.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub enum State<T, E> {
    /// The control flow should exit with a value.
    Success(T),
    /// The control flow should try again after the interval if possible.
    ///
    /// See: [`poll`](super::poll())
    Retry,
    /// The control flow should exit immediately with an error.
    Stop(E),
}

impl<T, E> State<T, E> {
    /// Maps the value if [`self`] is [`State::Success`].
    pub fn map<F, R>(self, f: F) -> State<R, E>
    where
        F: FnOnce(T) -> R,
    {
        match self {
            Self::Success(value) => State::Success(f(value)),
            Self::Retry => State::Retry,
            Self::Stop(err) => State::Stop(err),
        }
    }
}

impl<T> State<T, crate::Error> {
    /// Turns a fallible result into a [`State`], retrying only on transient errors.
    pub fn from_result(result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if err.is_transient() => {
                tracing::warn!("transient failure: {err}");
                Self::Retry
            }
            Err(err) => Self::Stop(err),
        }
    }
}
