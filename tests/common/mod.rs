//! Shared helpers for integration tests: a capturing code sender and a server
//! spawned on an ephemeral port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{json, Value};
use staffgate::{
    api::{self, handlers::auth::{AuthConfig, AuthState}},
    email::{CodeMessage, CodeSender},
    otp::{Environment, OtpConfig, OtpService, SystemClock},
    store::{MemoryStore, Store},
};
use tokio::net::TcpListener;

/// Code sender that captures every message instead of delivering it.
#[derive(Default, Clone)]
pub struct MockCodeSender {
    pub sent: Arc<RwLock<Vec<CodeMessage>>>,
    failing: Arc<AtomicBool>,
}

impl MockCodeSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Last code sent to an email.
    pub fn get_code(&self, email: &str) -> Option<String> {
        self.sent
            .read()
            .ok()?
            .iter()
            .rev()
            .find(|message| message.to == email)
            .map(|message| message.code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.read().map(|sent| sent.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CodeSender for MockCodeSender {
    async fn send(&self, message: &CodeMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mock mailer is down"));
        }
        self.sent
            .write()
            .map_err(|_| anyhow!("mock sender lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub sender: MockCodeSender,
    pub store: Arc<dyn Store>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<reqwest::Response> {
        Ok(self.client.post(self.url(path)).json(&body).send().await?)
    }

    /// Register and verify an account, returning its bearer token.
    pub async fn verified_account(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post(
                "/v1/auth/register",
                json!({ "name": "Test Employee", "email": email, "password": password }),
            )
            .await?;
        if response.status() != reqwest::StatusCode::CREATED {
            return Err(anyhow!("register failed: {}", response.status()));
        }

        let code = self
            .sender
            .get_code(email)
            .ok_or_else(|| anyhow!("no verification code sent"))?;
        let body: Value = self
            .post("/v1/auth/verify-email", json!({ "email": email, "code": code }))
            .await?
            .json()
            .await?;

        body["token"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("verify-email returned no token: {body}"))
    }
}

/// Serve the application on 127.0.0.1 with an OS-assigned port.
pub async fn spawn_server(environment: Environment) -> Result<TestServer> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let sender = MockCodeSender::new();

    let otp = OtpService::new(
        store.clone(),
        Arc::new(sender.clone()),
        Arc::new(SystemClock),
        OtpConfig::new(environment),
    );
    let auth_state = Arc::new(AuthState::new(
        AuthConfig::new("http://localhost:3000".to_string()).with_bcrypt_cost(10),
        otp,
        &SecretString::from("integration-secret".to_string()),
    ));
    let app = api::app(auth_state, store.clone())?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });

    Ok(TestServer {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        sender,
        store,
    })
}
