use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use http::Request;
use std::sync::Arc;
use tower::Layer;
use tower::Service;

use crate::config::{ClientConfig, DEFAULT_REFRESH_THRESHOLD_SECONDS};

/// Source of a bearer token that is valid for at least a given time
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Current token, refreshed first if it expires within `threshold_seconds`.
    /// `None` when there is no session or the refresh failed.
    async fn fresh_token(&self, threshold_seconds: u64) -> Option<String>;
}

/// What the authenticator did to an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Destination is the identity provider or an excluded URL
    Excluded,
    /// No usable credential; forwarded as-is for the backend to reject
    NoCredential,
    /// Bearer credential attached
    Attached,
}

/// Attaches a fresh bearer credential to outbound requests
pub struct RequestAuthenticator<C> {
    source: Arc<C>,
    excluded_prefixes: Arc<Vec<String>>,
    threshold_seconds: u64,
}

impl<C> Clone for RequestAuthenticator<C> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            excluded_prefixes: Arc::clone(&self.excluded_prefixes),
            threshold_seconds: self.threshold_seconds,
        }
    }
}

impl<C: CredentialSource> RequestAuthenticator<C> {
    /// Create an authenticator that never sends credentials to `identity_provider_prefix`
    pub fn new(source: Arc<C>, identity_provider_prefix: impl Into<String>) -> Self {
        Self {
            source,
            excluded_prefixes: Arc::new(vec![identity_provider_prefix.into()]),
            threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECONDS,
        }
    }

    /// Build from configuration: the identity server plus `bearer_excluded_urls`
    pub fn from_config(source: Arc<C>, config: &ClientConfig) -> Self {
        Self {
            source,
            excluded_prefixes: Arc::new(config.excluded_prefixes()),
            threshold_seconds: config.session.refresh_threshold_seconds,
        }
    }

    pub fn with_excluded_prefix(mut self, prefix: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.excluded_prefixes).push(prefix.into());
        self
    }

    pub fn with_threshold(mut self, threshold_seconds: u64) -> Self {
        self.threshold_seconds = threshold_seconds;
        self
    }

    pub fn threshold_seconds(&self) -> u64 {
        self.threshold_seconds
    }

    /// Whether `destination` must never carry a credential
    pub fn is_excluded(&self, destination: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && destination.starts_with(prefix.as_str()))
    }

    /// Add an `Authorization: Bearer` header for `destination` when appropriate
    pub async fn authorize_headers(&self, destination: &str, headers: &mut HeaderMap) -> Attachment {
        if self.is_excluded(destination) {
            tracing::debug!("Not attaching credentials to excluded destination {}", destination);
            return Attachment::Excluded;
        }

        let Some(token) = self.source.fresh_token(self.threshold_seconds).await else {
            tracing::debug!("No fresh credential for {}, forwarding unauthenticated", destination);
            return Attachment::NoCredential;
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                Attachment::Attached
            }
            Err(e) => {
                tracing::warn!("Access token is not a valid header value: {}", e);
                Attachment::NoCredential
            }
        }
    }

    /// Return `request` with a credential attached when appropriate
    pub async fn authenticate<B>(&self, mut request: Request<B>) -> Request<B> {
        let destination = request.uri().to_string();
        self.authorize_headers(&destination, request.headers_mut()).await;
        request
    }

    /// Tower layer running this authenticator in front of a transport
    pub fn layer(&self) -> AuthenticateLayer<C> {
        AuthenticateLayer {
            authenticator: self.clone(),
        }
    }
}

/// Middleware layer that attaches bearer credentials to outbound requests
pub struct AuthenticateLayer<C> {
    authenticator: RequestAuthenticator<C>,
}

impl<C> Clone for AuthenticateLayer<C> {
    fn clone(&self) -> Self {
        Self {
            authenticator: self.authenticator.clone(),
        }
    }
}

impl<C> AuthenticateLayer<C> {
    pub fn new(authenticator: RequestAuthenticator<C>) -> Self {
        Self { authenticator }
    }
}

impl<S, C> Layer<S> for AuthenticateLayer<C> {
    type Service = AuthenticateService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticateService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

pub struct AuthenticateService<S, C> {
    inner: S,
    authenticator: RequestAuthenticator<C>,
}

impl<S: Clone, C> Clone for AuthenticateService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            authenticator: self.authenticator.clone(),
        }
    }
}

impl<S, C, B> Service<Request<B>> for AuthenticateService<S, C>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    C: CredentialSource + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // The clone has not been polled ready; keep it and send this request
        // through the one that was.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let request = authenticator.authenticate(request).await;
            inner.call(request).await
        })
    }
}
