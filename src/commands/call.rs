use anyhow::{Context, Result};
use std::sync::Arc;

use fanrelay::client::{FailoverClient, HttpDispatcher, RequestTemplate};
use fanrelay::config::Config;
use fanrelay::resolver::{EndpointResolver, StaticResolver};
use fanrelay::trace::TraceContext;

/// Send one request to `service` with failover and print the body
pub async fn call(config: Config, service: String, path: String) -> Result<()> {
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };

    let dispatcher = Arc::new(HttpDispatcher::new(&config.client)?);
    let resolver = Arc::new(StaticResolver::from_table(&config.services)?);
    let client = FailoverClient::new(dispatcher, resolver);
    let template = RequestTemplate::for_service(&service, &path)?;

    let context = TraceContext::new_root();
    println!("Trace: {context}");

    let body = context
        .scope(async { client.request_service(&template, &service)?.await })
        .await
        .with_context(|| format!("Request to {service}{path} failed"))?;

    println!("{body}");
    Ok(())
}

/// Print the failover order of `service`
pub fn locations(config: Config, service: String) -> Result<()> {
    let resolver = StaticResolver::from_table(&config.services)?;
    let locations = resolver
        .locations(&service)
        .with_context(|| format!("Known services: {}", resolver.services().join(", ")))?;

    println!("Service {service}:");
    for (i, location) in locations.iter().enumerate() {
        let role = if i == 0 { "primary" } else { "fallback" };
        println!("  {}. {location} ({role})", i + 1);
    }
    Ok(())
}
