//! Request templates and their binding to concrete locations

use reqwest::Method;
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};
use crate::resolver::Location;

/// Placeholder substituted with `host:port` when a template is bound
pub const HOST_AND_PORT: &str = "{hostAndPort}";

/// An outbound request that is not yet bound to a location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    method: Method,
    template: Arc<str>,
}

impl RequestTemplate {
    /// Create a template. The URL template must contain `{hostAndPort}`.
    pub fn new(method: Method, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(HOST_AND_PORT) {
            return Err(Error::invalid_argument(format!(
                "request template '{template}' has no {HOST_AND_PORT} placeholder"
            )));
        }
        Ok(Self {
            method,
            template: template.into(),
        })
    }

    /// GET template
    pub fn get(template: impl Into<String>) -> Result<Self> {
        Self::new(Method::GET, template)
    }

    /// GET `http://{hostAndPort}/<service><path>`
    pub fn for_service(service: &str, path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(Error::invalid_argument(format!(
                "path '{path}' must start with '/'"
            )));
        }
        Self::get(format!("http://{HOST_AND_PORT}/{service}{path}"))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute `location` into the template
    pub fn bind(&self, location: &Location) -> Result<ResolvedRequest> {
        let raw = self.template.replace(HOST_AND_PORT, &location.to_string());
        let url = Url::parse(&raw).map_err(|e| {
            Error::invalid_argument(format!("template bound to {location} is not a URL: {e}"))
        })?;

        Ok(ResolvedRequest {
            method: self.method.clone(),
            url,
            location: location.clone(),
        })
    }
}

/// A template bound to one location, ready to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub method: Method,
    pub url: Url,
    pub location: Location,
}
