//! Orchestration handler behind the HTTP routes
//!
//! [`Orchestrator`] turns the three route operations into work on the
//! failover client, the fan-in aggregator and the context scheduler:
//!
//! - `echo` answers synchronously
//! - `delay` schedules a computation on the scheduler
//! - `fanout` issues `count + 1` failover chains at once and joins them

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::aggregate::{self, PendingResult};
use crate::client::{FailoverClient, HttpDispatcher, RequestTemplate};
use crate::config::{Config, HandlerConfig};
use crate::error::{Error, Result};
use crate::metrics;
use crate::resolver::StaticResolver;
use crate::scheduler::ContextScheduler;

/// Request orchestration over the backend replicas
pub struct Orchestrator {
    client: FailoverClient,
    scheduler: Arc<ContextScheduler>,
    config: HandlerConfig,
}

impl Orchestrator {
    /// Assemble an orchestrator from its parts
    pub fn new(
        client: FailoverClient,
        scheduler: Arc<ContextScheduler>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            client,
            scheduler,
            config,
        }
    }

    /// Build the production orchestrator: reqwest dispatcher, static
    /// resolver over `services`, and a fresh scheduler
    pub fn from_config(config: &Config) -> Result<Self> {
        let dispatcher = Arc::new(HttpDispatcher::new(&config.client)?);
        let resolver = Arc::new(StaticResolver::from_table(&config.services)?);
        let scheduler = Arc::new(ContextScheduler::new()?);

        tracing::debug!(
            services = ?resolver.services(),
            backend = %config.handler.backend_service,
            "Orchestrator initialized"
        );

        Ok(Self::new(
            FailoverClient::new(dispatcher, resolver),
            scheduler,
            config.handler.clone(),
        ))
    }

    /// Repeat `text` three times, comma separated
    pub fn echo(&self, text: &str) -> String {
        [text, text, text].join(", ")
    }

    /// Answer after `seconds` seconds, computed on the scheduler worker
    pub fn delay(&self, seconds: i64) -> Result<PendingResult<String>> {
        let secs = u64::try_from(seconds).map_err(|_| {
            Error::invalid_argument(format!("delay must not be negative, got {seconds}"))
        })?;

        tracing::debug!(delay_secs = secs, "Scheduling delayed response");

        let scheduled = self.scheduler.schedule(Duration::from_secs(secs), move || {
            format!("Your request was delayed by {secs} seconds")
        });

        Ok(PendingResult::spawn(async move { Ok(scheduled.await?) }))
    }

    /// Echo `0..count` and one long delay through the backend service,
    /// joined with newlines in request order
    pub fn fanout(&self, count: i64) -> Result<PendingResult<String>> {
        let max = self.config.max_fanout;
        let count = usize::try_from(count)
            .ok()
            .filter(|c| *c <= max)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "fan-out count must be between 0 and {max}, got {count}"
                ))
            })?;

        let service = self.config.backend_service.as_str();
        let locations = self.client.resolver().locations(service)?;

        let mut templates = (0..count)
            .map(|i| RequestTemplate::for_service(service, &format!("/echo/{i}")))
            .collect::<Result<Vec<_>>>()?;
        templates.push(RequestTemplate::for_service(
            service,
            &format!("/delay/{}", self.config.long_delay_secs),
        )?);

        tracing::info!(
            service,
            members = templates.len(),
            primary = %locations.primary(),
            "Fanning out requests"
        );

        let started = Instant::now();
        let members = templates
            .iter()
            .map(|template| self.client.request_with_failover(template, &locations))
            .collect::<Result<Vec<_>>>()?;
        let total = members.len();
        let joined = aggregate::join_all(members);

        Ok(PendingResult::spawn(async move {
            let joined = joined.await;
            let outcome = if joined.is_ok() { "success" } else { "failure" };
            metrics::record_fanout(outcome, total, started.elapsed());
            Ok(joined?.join("\n"))
        }))
    }

    /// Timeout the HTTP layer should request before awaiting async work
    pub fn suspend_timeout(&self) -> Duration {
        self.config.suspend_timeout()
    }

    pub fn scheduler(&self) -> &ContextScheduler {
        &self.scheduler
    }

    /// Stop the scheduler without waiting for in-flight tasks
    pub fn shutdown(&self) {
        tracing::info!("Shutting down orchestrator");
        self.scheduler.shutdown_now();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
