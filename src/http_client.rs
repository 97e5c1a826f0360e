//! reqwest integration
//!
//! [`AuthenticatedClient`] wraps a `reqwest::Client` and runs every request
//! through a [`RequestAuthenticator`] before sending it.
//!
//! # Example
//!
//! ```rust,ignore
//! use pep_session::http_client::AuthenticatedClient;
//!
//! let client = AuthenticatedClient::new(RequestAuthenticator::from_config(manager, &config));
//! let users = client.get("https://api.example.com/users").await?;
//! ```

use reqwest::{Method, RequestBuilder, Response};

use crate::auth::middleware::{Attachment, CredentialSource, RequestAuthenticator};
use crate::error::Result;

/// HTTP client whose requests carry the session's bearer credential
pub struct AuthenticatedClient<C> {
    http: reqwest::Client,
    authenticator: RequestAuthenticator<C>,
}

impl<C> Clone for AuthenticatedClient<C> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            authenticator: self.authenticator.clone(),
        }
    }
}

impl<C: CredentialSource> AuthenticatedClient<C> {
    pub fn new(authenticator: RequestAuthenticator<C>) -> Self {
        Self::with_client(reqwest::Client::new(), authenticator)
    }

    pub fn with_client(http: reqwest::Client, authenticator: RequestAuthenticator<C>) -> Self {
        Self { http, authenticator }
    }

    /// Start building a request; send it with [`AuthenticatedClient::execute`]
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Attach credentials to `request` as the authenticator sees fit
    pub async fn prepare(&self, mut request: reqwest::Request) -> (reqwest::Request, Attachment) {
        let destination = request.url().to_string();
        let attachment = self
            .authenticator
            .authorize_headers(&destination, request.headers_mut())
            .await;
        (request, attachment)
    }

    /// Authenticate and send a request
    pub async fn execute(&self, request: reqwest::Request) -> Result<Response> {
        let (request, _) = self.prepare(request).await;
        Ok(self.http.execute(request).await?)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        let request = self.http.get(url).build()?;
        self.execute(request).await
    }
}
