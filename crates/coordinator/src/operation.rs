//! Operation model supplied by callers
//!
//! The coordinator knows nothing about what is fetched or how it is stored.
//! Both sides live behind [`OperationModel`], which is shared by reference
//! across all worker threads and therefore must be `Sync`.

use std::fmt::Debug;

use crate::reliability::AbortReason;

/// Business logic driven by the [`FetchWriteCoordinator`](crate::FetchWriteCoordinator)
///
/// Fetch errors are expected to be encoded in [`Self::Response`] and judged by
/// [`Self::response_succeeded`]. A panic escaping any method aborts the whole
/// run.
///
/// # Example
///
/// ```
/// use fetchwrite_coordinator::OperationModel;
///
/// struct Squares;
///
/// impl OperationModel for Squares {
///     type RequestArg = u64;
///     type Response = Result<u64, String>;
///
///     fn initial_operation(&self) -> Vec<u64> {
///         (1..=3).collect()
///     }
///
///     fn fetch_from_api(&self, arg: &u64) -> Self::Response {
///         Ok(arg * arg)
///     }
///
///     fn response_succeeded(&self, response: &Self::Response) -> bool {
///         response.is_ok()
///     }
///
///     fn write_fetched_data(&self, arg: u64, response: Self::Response) {
///         println!("{arg}: {response:?}");
///     }
/// }
/// ```
pub trait OperationModel: Sync {
    /// Argument identifying one request
    type RequestArg: Debug + Send;

    /// Result of one API call, successful or not
    type Response: Debug + Send;

    /// Produce the request arguments
    ///
    /// Called once before any worker starts. Can also be used to check that
    /// the API is reachable.
    fn initial_operation(&self) -> Vec<Self::RequestArg>;

    /// Perform one remote call
    fn fetch_from_api(&self, request_argument: &Self::RequestArg) -> Self::Response;

    /// Judge whether a response is usable
    fn response_succeeded(&self, response: &Self::Response) -> bool;

    /// Persist a successful response
    fn write_fetched_data(&self, request_argument: Self::RequestArg, response: Self::Response);

    /// Called once for a request that used all its attempts without success
    fn upon_definitive_request_failure(
        &self,
        request_argument: Self::RequestArg,
        response: Self::Response,
    ) {
        let _ = (request_argument, response);
    }

    /// Called once for a request dropped because the circuit breaker tripped
    fn upon_request_abortion(&self, request_argument: Self::RequestArg, reason: AbortReason) {
        let _ = (request_argument, reason);
    }
}
