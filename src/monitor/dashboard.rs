//! Round monitoring API
//!
//! Provides HTTP endpoints for watching the current round without going
//! through the chat. Nothing here mutates state.

use crate::round::{RoundEngine, RoundSnapshot};
use crate::types::WinnerSet;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

// ============ HTTP API Handlers ============

/// Health check
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
    })
}

/// Current settings, tally and participation counts
async fn get_round(
    State(engine): State<Arc<RoundEngine>>,
) -> Result<Json<RoundSnapshot>, StatusCode> {
    engine.snapshot().await.map(Json).map_err(|e| {
        tracing::error!("Dashboard round snapshot failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Winners of the latest declaration
async fn get_winners(
    State(engine): State<Arc<RoundEngine>>,
) -> Result<Json<WinnerSet>, StatusCode> {
    engine.winners().await.map(Json).map_err(|e| {
        tracing::error!("Dashboard winners lookup failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Create dashboard router
pub fn create_router(engine: Arc<RoundEngine>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/round", get(get_round))
        .route("/winners", get(get_winners))
        .with_state(engine)
}

/// Start dashboard server
pub async fn start_dashboard(engine: Arc<RoundEngine>, port: u16) -> crate::error::Result<()> {
    let app = create_router(engine);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Dashboard server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| crate::error::BotError::Internal(format!("bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::BotError::Internal(format!("dashboard: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::RecordingMessenger;
    use crate::types::{Caller, Side};

    const OPERATOR: i64 = 1;

    fn engine() -> Arc<RoundEngine> {
        Arc::new(RoundEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingMessenger::new()),
            OPERATOR,
            10,
        ))
    }

    #[tokio::test]
    async fn test_health() {
        let Json(health) = health_check().await;
        assert_eq!(health.status, "OK");
    }

    #[tokio::test]
    async fn test_round_snapshot() {
        let engine = engine();
        let operator = Caller::private(OPERATOR, "op");
        engine.open_betting(&operator).await.unwrap();
        let bettor = Caller::private(2, "two");
        engine.register(&bettor).await.unwrap();
        engine.place_bet(&bettor, Side::Heads).await.unwrap();

        let Json(snapshot) = get_round(State(engine)).await.unwrap();

        assert!(snapshot.settings.betting_open);
        assert_eq!(snapshot.settings.total_slots, 10);
        assert_eq!(snapshot.registered_users, 1);
        assert_eq!(snapshot.bets_placed, 1);

        let body = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(body["settings"]["available_slots"], 10);
    }

    #[tokio::test]
    async fn test_winners_after_declare() {
        let engine = engine();
        let Json(empty) = get_winners(State(engine.clone())).await.unwrap();
        assert!(empty.is_empty());

        let operator = Caller::private(OPERATOR, "op");
        engine.declare(&operator, "tails").await.unwrap();
        let Json(winners) = get_winners(State(engine)).await.unwrap();
        assert_eq!(winners.declared_side, Some(Side::Tails));
    }

    #[test]
    fn test_router_builds() {
        let _router = create_router(engine());
    }
}
