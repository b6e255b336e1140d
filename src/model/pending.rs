use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{ModelError, ModelResult};

/// Deferred outcome of a write.
///
/// The write itself has already run (and committed or rolled back) by the
/// time a `Pending` is handed out; awaiting it yields that outcome. After-hooks
/// are not part of it.
#[must_use = "a Pending carries the outcome of a write and should be awaited"]
#[derive(Debug)]
pub struct Pending<T> {
    outcome: Option<ModelResult<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn resolved(value: T) -> Self {
        Self { outcome: Some(Ok(value)) }
    }

    pub(crate) fn rejected(error: impl Into<ModelError>) -> Self {
        Self { outcome: Some(Err(error.into())) }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, Some(Err(_)))
    }

    /// Take the outcome without awaiting
    pub fn into_result(mut self) -> ModelResult<T> {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => panic!("Pending result already taken"),
        }
    }
}

impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = ModelResult<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut().outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => panic!("Pending polled after completion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_and_rejects() {
        assert_eq!(Pending::resolved(3usize).await.unwrap(), 3);

        let pending: Pending<()> = Pending::rejected(ModelError::NotImplemented("upsert"));
        assert!(pending.is_rejected());
        assert!(matches!(pending.await, Err(ModelError::NotImplemented("upsert"))));
    }
}
