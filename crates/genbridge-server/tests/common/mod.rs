#![allow(dead_code)]

use async_trait::async_trait;
use genbridge_gateway::{
    AiGateway, Coordinates, GatewayError, LocationContext, MapLink, TaskAnalysis,
};
use genbridge_server::config::Config;
use genbridge_server::{app, AppState};
use genbridge_types::{Task, TaskCategory};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Scripted gateway: answers are fixed up front and every call is counted.
#[derive(Default)]
pub struct StubGateway {
    pub analysis: Option<TaskAnalysis>,
    pub location_title: Option<String>,
    pub summary: Option<String>,
    /// How long classification takes before answering.
    pub classify_delay: Duration,
    pub classify_calls: AtomicUsize,
    pub location_queries: Mutex<Vec<String>>,
    pub summary_calls: AtomicUsize,
}

impl StubGateway {
    /// Classifies everything as a tech task at "Maple Street Library".
    pub fn working() -> Self {
        Self {
            analysis: Some(TaskAnalysis {
                title: "Phone Setup".to_string(),
                category: TaskCategory::Tech,
                refined_description: "Help setting up a new phone.".to_string(),
                suggested_credits: 40,
            }),
            location_title: Some("Maple Street Library".to_string()),
            summary: Some("Neighbors helped neighbors.".to_string()),
            ..Self::default()
        }
    }

    /// Fails every call.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn location_queries(&self) -> Vec<String> {
        self.location_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiGateway for StubGateway {
    async fn classify_task(&self, _text: &str) -> Result<TaskAnalysis, GatewayError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        if !self.classify_delay.is_zero() {
            tokio::time::sleep(self.classify_delay).await;
        }
        self.analysis
            .clone()
            .ok_or_else(|| GatewayError::InvalidResponse("unclassifiable".to_string()))
    }

    async fn location_context(
        &self,
        query: &str,
        _near: Option<Coordinates>,
    ) -> Result<LocationContext, GatewayError> {
        self.location_queries.lock().unwrap().push(query.to_string());
        match &self.location_title {
            Some(title) => Ok(LocationContext {
                text: format!("{} is a public library.", title),
                links: vec![MapLink {
                    uri: "https://maps.example/library".to_string(),
                    title: title.clone(),
                }],
            }),
            None => Err(GatewayError::NotConfigured),
        }
    }

    async fn impact_summary(&self, _tasks: &[Task]) -> Result<String, GatewayError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.summary.clone().ok_or(GatewayError::NotConfigured)
    }
}

pub fn state_with(config: &Config, gateway: Arc<StubGateway>) -> AppState {
    AppState::new(config, gateway)
}

pub fn state(gateway: Arc<StubGateway>) -> AppState {
    state_with(&Config::default(), gateway)
}

/// Serves the app on an ephemeral port and returns its address.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let app = app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
