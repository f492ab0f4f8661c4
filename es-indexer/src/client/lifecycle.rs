//! Index, alias, template and policy lifecycle

use tracing::{info, warn};

use super::response::check_response;
use super::transport::{Method, Request};
use super::ElasticClient;
use crate::core::error::ElasticError;

const POLICIES_PATH: &str = "/_opendistro/_ism/policies";

impl ElasticClient {
    /// HEAD request: 200 means present, anything else is treated as absent
    fn exists(&self, path: &str) -> bool {
        let request = Request::new(Method::Head, path).with_topic("_exists");
        match self.transport.send(&request) {
            Ok(response) if response.status == 200 => true,
            Ok(response) if response.status == 404 => false,
            Ok(response) => {
                warn!(
                    target: "es_indexer::client",
                    "unexpected status {} while checking {}",
                    response.status,
                    path
                );
                false
            }
            Err(err) => {
                warn!(target: "es_indexer::client", "cannot check {}: {}", path, err);
                false
            }
        }
    }

    fn create(&self, path: String, body: Option<&[u8]>) -> Result<(), ElasticError> {
        let request = match body {
            Some(body) => Request::json(Method::Put, path, body.to_vec()),
            None => Request::new(Method::Put, path),
        }
        .with_topic("_lifecycle");

        let response = self.transport.send(&request)?;
        check_response(&request.path, response.status, &response.body)
    }

    pub fn check_and_create_index(&self, index: &str) -> Result<(), ElasticError> {
        let path = format!("/{}", index);
        if self.exists(&path) {
            return Ok(());
        }

        info!(target: "es_indexer::client", "creating index {}", index);
        self.create(path, None)
    }

    pub fn check_and_create_alias(&self, alias: &str, index: &str) -> Result<(), ElasticError> {
        if self.exists(&format!("/_alias/{}", alias)) {
            return Ok(());
        }

        info!(target: "es_indexer::client", "creating alias {} for {}", alias, index);
        self.create(format!("/{}/_alias/{}", index, alias), None)
    }

    pub fn check_and_create_template(&self, name: &str, template: &[u8]) -> Result<(), ElasticError> {
        let path = format!("/_template/{}", name);
        if self.exists(&path) {
            return Ok(());
        }

        info!(target: "es_indexer::client", "creating template {}", name);
        self.create(path, Some(template))
    }

    /// Policies are checked with GET, the policy API does not answer HEAD
    pub fn check_and_create_policy(&self, name: &str, policy: &[u8]) -> Result<(), ElasticError> {
        let path = format!("{}/{}", POLICIES_PATH, name);
        let lookup = Request::new(Method::Get, path.clone()).with_topic("_lifecycle");
        match self.transport.send(&lookup) {
            Ok(response) if response.status == 200 => return Ok(()),
            Ok(_) => {}
            Err(err) => warn!(target: "es_indexer::client", "cannot check policy {}: {}", name, err),
        }

        info!(target: "es_indexer::client", "creating policy {}", name);
        self.create(path, Some(policy))
    }
}
