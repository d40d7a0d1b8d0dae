use async_trait::async_trait;

/// What to do after inspecting a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<I, R> {
    /// Issue another request with this input
    Continue(I),
    /// Finish with this result
    Stop(R),
}

/// What to do with a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorAction<R> {
    /// The error is an expected signal; finish with this result
    Stop(R),
    /// Propagate the error to the caller
    Rethrow,
}

#[async_trait]
pub trait Continuation: Send {
    type Input: Send;
    type Response: Send;
    type Output: Send;
    type Error: Send;

    async fn request(&mut self, input: Self::Input) -> Result<Self::Response, Self::Error>;

    async fn on_response(
        &mut self,
        response: Self::Response,
    ) -> Result<Step<Self::Input, Self::Output>, Self::Error>;

    /// Only consulted for errors returned by [`Continuation::request`];
    /// errors from `on_response` always propagate.
    fn on_error(&mut self, _error: &Self::Error) -> ErrorAction<Self::Output> {
        ErrorAction::Rethrow
    }
}

/// Run `continuation` from `initial` until it produces a terminal result.
///
/// Pagination of stream descriptions and the pull/acknowledge cycle both
/// issue a request, look at the response, then either issue the next request
/// or finish with a result. The loop ends exactly when the handler returns
/// [`Step::Stop`], when a request error is swallowed by
/// [`Continuation::on_error`], or when any other error propagates.
pub async fn drive<C>(continuation: &mut C, initial: C::Input) -> Result<C::Output, C::Error>
where
    C: Continuation + ?Sized,
{
    let mut input = initial;

    loop {
        let response = match continuation.request(input).await {
            Ok(response) => response,
            Err(error) => {
                return match continuation.on_error(&error) {
                    ErrorAction::Stop(output) => Ok(output),
                    ErrorAction::Rethrow => Err(error),
                };
            }
        };

        match continuation.on_response(response).await? {
            Step::Continue(next) => input = next,
            Step::Stop(output) => return Ok(output),
        }
    }
}
