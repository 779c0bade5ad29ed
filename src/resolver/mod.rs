//! Endpoint resolution for logical services
//!
//! Maps a logical service name to the ordered list of replica locations
//! that the failover client walks through. Resolution is a pure lookup in
//! configuration; no network I/O happens here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

// ============================================================================
// Location
// ============================================================================

/// One replica of a logical service, identified by host and port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    host: String,
    port: u16,
}

impl Location {
    /// Create a new location
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::invalid_argument(format!("Location '{s}' is not host:port")))?;

        if host.is_empty() {
            return Err(Error::invalid_argument(format!(
                "Location '{s}' has an empty host"
            )));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| Error::invalid_argument(format!("Location '{s}' has an invalid port")))?;

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for Location {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.to_string()
    }
}

// ============================================================================
// Location List
// ============================================================================

/// Ordered, non-empty list of candidate locations (first = primary)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationList(Arc<[Location]>);

impl LocationList {
    /// Build a list, rejecting an empty sequence
    pub fn new(locations: Vec<Location>) -> Result<Self> {
        if locations.is_empty() {
            return Err(Error::invalid_argument("location list must not be empty"));
        }
        Ok(Self(locations.into()))
    }

    /// The preferred candidate
    pub fn primary(&self) -> &Location {
        &self.0[0]
    }
}

impl Deref for LocationList {
    type Target = [Location];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Supplies the candidate locations for a logical service
pub trait EndpointResolver: Send + Sync {
    /// Ordered candidate list for `service`
    fn locations(&self, service: &str) -> Result<LocationList>;
}

/// Resolver backed by a fixed service table
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    services: HashMap<String, LocationList>,
}

impl StaticResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the locations of a service, replacing any previous entry
    pub fn with_service(mut self, service: impl Into<String>, locations: LocationList) -> Self {
        self.services.insert(service.into(), locations);
        self
    }

    /// Build from a configuration table of `service -> [host:port, ...]`
    pub fn from_table(table: &HashMap<String, Vec<Location>>) -> Result<Self> {
        let mut resolver = Self::new();
        for (service, locations) in table {
            let list = LocationList::new(locations.clone()).map_err(|_| {
                Error::invalid_argument(format!("service '{service}' has no locations"))
            })?;
            resolver = resolver.with_service(service.clone(), list);
        }
        Ok(resolver)
    }

    /// Known service names, sorted
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl EndpointResolver for StaticResolver {
    fn locations(&self, service: &str) -> Result<LocationList> {
        self.services
            .get(service)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                service: service.to_string(),
            })
    }
}
