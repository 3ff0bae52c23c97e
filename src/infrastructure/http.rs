// src/infrastructure/http.rs
// Shared HTTPS client with a per-request timeout

use hyper::client::HttpConnector;
use hyper::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use hyper::{Body, Client, Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tower::timeout::error::Elapsed;
use tower::timeout::Timeout;
use tower::{BoxError, Service, ServiceExt};

use crate::domain::errors::{ExchangeError, ExchangeResult};

/// One pooled connection context shared by every venue client.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: hyper::body::Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> ExchangeResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ExchangeError::Parse(format!("{} (status {})", e, self.status)))
    }
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());
        Self { client, timeout }
    }

    pub fn get(&self, uri: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, uri)
    }

    pub fn post(&self, uri: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, uri)
    }

    async fn send(&self, request: Request<Body>) -> ExchangeResult<HttpResponse> {
        let uri = request.uri().to_string();
        let mut service = Timeout::new(self.client.clone(), self.timeout);

        let response = service
            .ready()
            .await
            .map_err(|e| transport_error(&uri, e))?
            .call(request)
            .await
            .map_err(|e| transport_error(&uri, e))?;

        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| ExchangeError::Connection(format!("{}: {}", uri, e)))?;

        log::trace!("{} -> {} ({} bytes)", uri, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

fn transport_error(uri: &str, error: BoxError) -> ExchangeError {
    if error.is::<Elapsed>() {
        ExchangeError::Timeout(uri.to_string())
    } else {
        ExchangeError::Connection(format!("{}: {}", uri, error))
    }
}

pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    builder: hyper::http::request::Builder,
    body: Body,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a HttpClient, method: Method, uri: &str) -> Self {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            client,
            builder,
            body: Body::empty(),
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {}", token))
    }

    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> ExchangeResult<Self> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| ExchangeError::Parse(format!("failed to encode request: {}", e)))?;
        self.builder = self
            .builder
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Body::from(bytes);
        Ok(self)
    }

    pub async fn send(self) -> ExchangeResult<HttpResponse> {
        let request = self
            .builder
            .body(self.body)
            .map_err(|e| ExchangeError::Api(format!("invalid request: {}", e)))?;
        self.client.send(request).await
    }
}
