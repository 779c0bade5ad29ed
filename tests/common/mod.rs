//! Common test utilities

use async_trait::async_trait;
use fanrelay::client::{Dispatcher, ResolvedRequest};
use fanrelay::error::{Error, Result};
use fanrelay::resolver::Location;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Dispatcher that answers from a script instead of the network.
///
/// Locations whose port is listed as healthy answer with the request path,
/// every other location fails. Every dispatch is recorded in order.
#[derive(Default)]
pub struct ScriptedDispatcher {
    healthy: HashSet<u16>,
    calls: Mutex<Vec<(u16, String)>>,
}

#[allow(dead_code)]
impl ScriptedDispatcher {
    pub fn healthy(ports: &[u16]) -> Arc<Self> {
        Arc::new(Self {
            healthy: ports.iter().copied().collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Ports dispatched to, in order
    pub fn ports(&self) -> Vec<u16> {
        self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    /// Paths dispatched, in order
    pub fn paths(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn dispatch(&self, request: ResolvedRequest) -> Result<String> {
        let port = request.location.port();
        let path = request.url.path().to_string();
        self.calls.lock().unwrap().push((port, path.clone()));

        if self.healthy.contains(&port) {
            Ok(path)
        } else {
            Err(Error::endpoint_unavailable(&request.location, "scripted failure"))
        }
    }
}

/// Localhost locations for `ports`
#[allow(dead_code)]
pub fn locations(ports: &[u16]) -> Vec<Location> {
    ports.iter().map(|p| Location::new("127.0.0.1", *p)).collect()
}

/// A port nothing listens on
#[allow(dead_code)]
pub const DEAD_PORT: u16 = 1;
