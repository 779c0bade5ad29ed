//! Sequential failover across candidate locations
//!
//! A failover chain tries the candidates one at a time in preference order:
//!
//! ```text
//! dispatch A
//!   - A failed  -> log (A -> B), dispatch B
//!   - B failed  -> log (B -> C), dispatch C
//!   - ...
//! return the first success, or the last failure once every candidate failed
//! ```
//!
//! Only one dispatch of a chain is ever outstanding, and nothing is
//! dispatched after the first success.

use std::sync::Arc;

use crate::aggregate::PendingResult;
use crate::error::{Error, Result};
use crate::metrics;
use crate::resolver::{EndpointResolver, Location};

use super::dispatch::Dispatcher;
use super::template::RequestTemplate;

/// Client that issues requests with sequential fallback between locations
#[derive(Clone)]
pub struct FailoverClient {
    dispatcher: Arc<dyn Dispatcher>,
    resolver: Arc<dyn EndpointResolver>,
}

impl FailoverClient {
    /// Create a client over a dispatcher and a resolver
    pub fn new(dispatcher: Arc<dyn Dispatcher>, resolver: Arc<dyn EndpointResolver>) -> Self {
        Self {
            dispatcher,
            resolver,
        }
    }

    /// The resolver this client looks services up in
    pub fn resolver(&self) -> &dyn EndpointResolver {
        self.resolver.as_ref()
    }

    /// Start a failover chain for `template` over `locations`.
    ///
    /// An empty `locations` slice is rejected before anything is dispatched.
    pub fn request_with_failover(
        &self,
        template: &RequestTemplate,
        locations: &[Location],
    ) -> Result<PendingResult<String>> {
        if locations.is_empty() {
            return Err(Error::invalid_argument(
                "cannot fail over across an empty location list",
            ));
        }

        let dispatcher = self.dispatcher.clone();
        let template = template.clone();
        let locations = locations.to_vec();

        Ok(PendingResult::spawn(async move {
            run_chain(dispatcher.as_ref(), &template, &locations).await
        }))
    }

    /// Resolve `service` and start a failover chain over its locations
    pub fn request_service(
        &self,
        template: &RequestTemplate,
        service: &str,
    ) -> Result<PendingResult<String>> {
        let locations = self.resolver.locations(service)?;
        self.request_with_failover(template, &locations)
    }
}

impl std::fmt::Debug for FailoverClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverClient").finish_non_exhaustive()
    }
}

/// Fold a request over `locations`, stopping at the first success.
///
/// With a single location the dispatch failure is returned unchanged; with
/// more, exhaustion is reported as [`Error::AllEndpointsExhausted`] naming
/// the last candidate tried.
pub async fn run_chain(
    dispatcher: &dyn Dispatcher,
    template: &RequestTemplate,
    locations: &[Location],
) -> Result<String> {
    let Some((first, rest)) = locations.split_first() else {
        return Err(Error::invalid_argument(
            "cannot fail over across an empty location list",
        ));
    };

    let mut previous = first;
    let mut outcome = attempt(dispatcher, template, first).await;

    for next in rest {
        let error = match outcome {
            Ok(body) => return Ok(body),
            Err(error) => error,
        };

        tracing::info!(
            previous = %previous,
            next = %next,
            error = %error,
            "Endpoint request failed, trying next location"
        );
        metrics::record_failover();

        outcome = attempt(dispatcher, template, next).await;
        previous = next;
    }

    outcome.map_err(|source| {
        if locations.len() == 1 {
            return source;
        }

        tracing::warn!(
            attempts = locations.len(),
            last = %previous,
            error = %source,
            "All endpoints exhausted"
        );
        metrics::record_exhausted();

        Error::AllEndpointsExhausted {
            attempts: locations.len(),
            last: previous.clone(),
            source: Box::new(source),
        }
    })
}

async fn attempt(
    dispatcher: &dyn Dispatcher,
    template: &RequestTemplate,
    location: &Location,
) -> Result<String> {
    let request = template.bind(location)?;
    dispatcher.dispatch(request).await
}
