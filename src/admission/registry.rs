use super::controller::{AdmissionController, AdmissionSettings, HealthSnapshot};
use crate::url::authority_of;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Lazily populated map of host authority to its admission controller
///
/// One registry lives for one crawl run. Page and image jobs targeting the
/// same host share the same controller, hence the same pacing.
pub struct AdmissionRegistry {
    client: Client,
    settings: AdmissionSettings,
    controllers: Mutex<HashMap<String, Arc<AdmissionController>>>,
}

impl AdmissionRegistry {
    pub fn new(client: Client, settings: AdmissionSettings) -> Self {
        Self {
            client,
            settings,
            controllers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the controller for a host authority, creating it on first use
    pub fn get(&self, authority: &str) -> Arc<AdmissionController> {
        let mut controllers = self
            .controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        controllers
            .entry(authority.to_string())
            .or_insert_with(|| {
                Arc::new(AdmissionController::new(
                    authority,
                    self.client.clone(),
                    &self.settings,
                ))
            })
            .clone()
    }

    /// Returns the controller for the URL's host, `None` for host-less URLs
    pub fn for_url(&self, url: &Url) -> Option<Arc<AdmissionController>> {
        authority_of(url).map(|authority| self.get(&authority))
    }

    /// Health of every known host, sorted by host
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        let controllers: Vec<Arc<AdmissionController>> = self
            .controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut snapshots: Vec<HealthSnapshot> = controllers.iter().map(|c| c.health()).collect();
        snapshots.sort_by(|a, b| a.host.cmp(&b.host));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry() -> AdmissionRegistry {
        AdmissionRegistry::new(
            Client::new(),
            AdmissionSettings {
                user_agent: "harvest-crawler/1.0".to_string(),
                default_delay: Duration::from_millis(500),
                robots_timeout: Duration::from_secs(1),
            },
        )
    }

    #[test]
    fn test_same_host_shares_controller() {
        let registry = registry();
        let a = registry.get("example.com");
        let b = registry.get("example.com");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ports_are_separate_hosts() {
        let registry = registry();
        let a = registry
            .for_url(&Url::parse("http://127.0.0.1:4000/a").unwrap())
            .unwrap();
        let b = registry
            .for_url(&Url::parse("http://127.0.0.1:5000/a").unwrap())
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.host(), "127.0.0.1:4000");
    }

    #[test]
    fn test_snapshots_sorted() {
        let registry = registry();
        assert!(registry.is_empty());
        registry.get("b.example");
        registry.get("a.example");

        let hosts: Vec<String> = registry.snapshots().into_iter().map(|s| s.host).collect();
        assert_eq!(hosts, vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_new_controller_uses_default_delay() {
        let registry = registry();
        assert_eq!(
            registry.get("example.com").current_delay(),
            Duration::from_millis(500)
        );
    }
}
