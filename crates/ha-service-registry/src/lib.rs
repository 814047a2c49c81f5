//! Service registry with async handlers
//!
//! Services are addressed as `domain.service`. A handler receives the
//! [`ServiceCall`] and may hand back a JSON response, which is only passed
//! on when the caller asked for one and the service supports it.

use dashmap::DashMap;
use futures::future::BoxFuture;
use ha_core::{Context, ServiceCall, SupportsResponse};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub type ServiceResult = Result<Option<serde_json::Value>, ServiceError>;

pub type ServiceHandler =
    Arc<dyn Fn(ServiceCall) -> BoxFuture<'static, ServiceResult> + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("service call failed: {0}")]
    CallFailed(String),

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service does not support responses")]
    ResponseNotSupported,
}

/// Metadata about a registered service
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    pub domain: String,
    pub service: String,
    /// Human-readable name
    pub name: Option<String>,
    pub description: Option<String>,
    /// Field descriptions, informational only
    pub fields: Option<serde_json::Value>,
    pub supports_response: SupportsResponse,
}

impl ServiceDescription {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            name: None,
            description: None,
            fields: None,
            supports_response: SupportsResponse::None,
        }
    }

    fn key(&self) -> String {
        service_key(&self.domain, &self.service)
    }
}

fn service_key(domain: &str, service: &str) -> String {
    format!("{}.{}", domain, service)
}

struct RegisteredService {
    handler: ServiceHandler,
    description: ServiceDescription,
}

pub struct ServiceRegistry {
    /// Services keyed by `domain.service`
    services: DashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register a service, replacing any previous handler under the same name
    #[instrument(skip(self, description, handler), fields(domain = %description.domain, service = %description.service))]
    pub fn register<F, Fut>(&self, description: ServiceDescription, handler: F)
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        debug!("Registering service");

        let handler: ServiceHandler = Arc::new(move |call: ServiceCall| {
            Box::pin(handler(call)) as BoxFuture<'static, ServiceResult>
        });
        self.services.insert(
            description.key(),
            RegisteredService {
                handler,
                description,
            },
        );
    }

    /// Call a service
    ///
    /// With `return_response` set, services registered with
    /// `SupportsResponse::None` are rejected before their handler runs.
    #[instrument(skip(self, service_data, context))]
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        context: Context,
        return_response: bool,
    ) -> ServiceResult {
        let handler = {
            let registered = self.services.get(&service_key(domain, service)).ok_or_else(|| {
                warn!("Service not found");
                ServiceError::NotFound {
                    domain: domain.to_string(),
                    service: service.to_string(),
                }
            })?;

            if return_response && registered.description.supports_response == SupportsResponse::None
            {
                return Err(ServiceError::ResponseNotSupported);
            }
            // the map guard must not be held across the handler's await
            registered.handler.clone()
        };

        debug!("Calling service");
        let response = handler(ServiceCall::new(domain, service, service_data, context)).await?;

        Ok(if return_response { response } else { None })
    }

    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services.contains_key(&service_key(domain, service))
    }

    pub fn domain_services(&self, domain: &str) -> Vec<ServiceDescription> {
        let mut services: Vec<_> = self
            .services
            .iter()
            .filter(|s| s.description.domain == domain)
            .map(|s| s.description.clone())
            .collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));
        services
    }

    /// Remove every service of a domain, returning how many were removed
    #[instrument(skip(self))]
    pub fn unregister_domain(&self, domain: &str) -> usize {
        let before = self.services.len();
        self.services.retain(|_, s| s.description.domain != domain);
        let count = before - self.services.len();

        debug!(count, "Unregistered domain services");
        count
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedServiceRegistry = Arc<ServiceRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_description(supports_response: SupportsResponse) -> ServiceDescription {
        ServiceDescription {
            supports_response,
            ..ServiceDescription::new("test", "echo")
        }
    }

    #[tokio::test]
    async fn test_register_and_call_with_response() {
        let registry = ServiceRegistry::new();
        registry.register(
            echo_description(SupportsResponse::Optional),
            |call: ServiceCall| async move { Ok(Some(call.service_data)) },
        );

        let result = registry
            .call("test", "echo", json!({"msg": "hello"}), Context::new(), true)
            .await
            .unwrap();
        assert_eq!(result, Some(json!({"msg": "hello"})));

        // without asking, the response is dropped
        let result = registry
            .call("test", "echo", json!({"msg": "hello"}), Context::new(), false)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_service_not_found() {
        let registry = ServiceRegistry::new();
        let result = registry
            .call("missing", "service", json!({}), Context::new(), false)
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_response_not_supported() {
        let registry = ServiceRegistry::new();
        registry.register(
            echo_description(SupportsResponse::None),
            |_: ServiceCall| async { Ok(None) },
        );

        let result = registry
            .call("test", "echo", json!({}), Context::new(), true)
            .await;
        assert!(matches!(result, Err(ServiceError::ResponseNotSupported)));
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceDescription::new("test", "fail"), |_: ServiceCall| async {
            Err(ServiceError::CallFailed("intentional failure".to_string()))
        });

        let result = registry
            .call("test", "fail", json!({}), Context::new(), false)
            .await;
        assert!(matches!(result, Err(ServiceError::CallFailed(_))));
    }

    #[test]
    fn test_unregister_domain() {
        let registry = ServiceRegistry::new();
        for (domain, service) in [
            ("ai_assistant", "reset"),
            ("ai_assistant", "ask_question"),
            ("light", "toggle"),
        ] {
            registry.register(
                ServiceDescription::new(domain, service),
                |_: ServiceCall| async { Ok(None) },
            );
        }

        let names: Vec<_> = registry
            .domain_services("ai_assistant")
            .into_iter()
            .map(|s| s.service)
            .collect();
        assert_eq!(names, vec!["ask_question", "reset"]);

        assert_eq!(registry.unregister_domain("ai_assistant"), 2);
        assert!(!registry.has_service("ai_assistant", "reset"));
        assert!(registry.has_service("light", "toggle"));
    }
}
