//! Request/response hooks run by the proxy for every intercepted exchange

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::models::{InterceptedRequest, InterceptedResponse};

/// Hook trait for request/response processing
///
/// `on_request` runs once per request before it is forwarded and may
/// mutate any part of it. `on_response` runs once the upstream has
/// answered and sees the request as it was actually sent.
#[async_trait]
pub trait Addon: Send + Sync {
    fn name(&self) -> &str;

    async fn on_request(&self, _request: &mut InterceptedRequest) {}

    async fn on_response(&self, _request: &InterceptedRequest, _response: &InterceptedResponse) {}
}

/// Addons in registration order
#[derive(Clone, Default)]
pub struct AddonChain {
    addons: Vec<Arc<dyn Addon>>,
}

impl AddonChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, addon: Arc<dyn Addon>) -> Self {
        self.push(addon);
        self
    }

    pub fn push(&mut self, addon: Arc<dyn Addon>) {
        debug!("Registered addon '{}'", addon.name());
        self.addons.push(addon);
    }

    pub fn len(&self) -> usize {
        self.addons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.addons.iter().map(|a| a.name()).collect()
    }

    pub async fn on_request(&self, request: &mut InterceptedRequest) {
        for addon in &self.addons {
            addon.on_request(request).await;
        }
    }

    pub async fn on_response(&self, request: &InterceptedRequest, response: &InterceptedResponse) {
        for addon in &self.addons {
            addon.on_response(request, response).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scheme;
    use std::sync::Mutex;

    struct Tagger {
        tag: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Addon for Tagger {
        fn name(&self) -> &str {
            self.tag
        }

        async fn on_request(&self, request: &mut InterceptedRequest) {
            request.headers.append("X-Seen", self.tag);
        }

        async fn on_response(&self, _request: &InterceptedRequest, response: &InterceptedResponse) {
            self.seen.lock().unwrap().push(format!("{}:{}", self.tag, response.status));
        }
    }

    struct Silent;

    #[async_trait]
    impl Addon for Silent {
        fn name(&self) -> &str {
            "silent"
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = AddonChain::new()
            .with(Arc::new(Tagger { tag: "a", seen: seen.clone() }))
            .with(Arc::new(Silent))
            .with(Arc::new(Tagger { tag: "b", seen: seen.clone() }));

        let mut req = InterceptedRequest::new("GET", Scheme::Http, "example.com", "/");
        chain.on_request(&mut req).await;
        chain.on_response(&req, &InterceptedResponse::new(200)).await;

        assert_eq!(req.headers.get_all("x-seen").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(*seen.lock().unwrap(), vec!["a:200", "b:200"]);
        assert_eq!(chain.names(), vec!["a", "silent", "b"]);
    }

    #[tokio::test]
    async fn test_empty_chain_is_noop() {
        let chain = AddonChain::new();
        let mut req = InterceptedRequest::new("GET", Scheme::Http, "example.com", "/x");
        chain.on_request(&mut req).await;
        assert!(chain.is_empty());
        assert_eq!(req.path, "/x");
    }
}
