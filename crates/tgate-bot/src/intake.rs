//! HTTP intake and observability surface.
//!
//! The socket clients feeding the engine POST their payloads here; the
//! reset inputs and the read-only state snapshots live on the same
//! router. Malformed bodies answer 400 and never reach a reducer.

use crate::app::ControlMsg;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use tgate_feed::{parse_price, parse_tick, parse_webhook, EventBus};
use tgate_fsm::FsmMap;
use tgate_signals::{FilterMode, ModeState};
use tgate_trade::TradeState;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Shared state for the intake router.
#[derive(Clone)]
pub struct IntakeState {
    bus: EventBus,
    control_tx: mpsc::Sender<ControlMsg>,
    fsm_rx: watch::Receiver<FsmMap>,
    trade_rx: watch::Receiver<TradeState>,
    signal_rx: HashMap<String, watch::Receiver<ModeState>>,
}

impl IntakeState {
    pub fn new(
        bus: EventBus,
        control_tx: mpsc::Sender<ControlMsg>,
        fsm_rx: watch::Receiver<FsmMap>,
        trade_rx: watch::Receiver<TradeState>,
        signal_rx: HashMap<String, watch::Receiver<ModeState>>,
    ) -> Self {
        Self {
            bus,
            control_tx,
            fsm_rx,
            trade_rx,
            signal_rx,
        }
    }
}

/// Build the intake router.
pub fn router(state: IntakeState) -> Router {
    Router::new()
        .route("/webhook", post(post_webhook))
        .route("/tick", post(post_tick))
        .route("/price", post(post_price))
        .route("/reset/crypto", post(post_reset_crypto))
        .route("/signals/{mode}/clear", post(post_clear_signals))
        .route("/fsm", get(get_fsm))
        .route("/trades", get(get_trades))
        .route("/signals/{mode}", get(get_signals))
        .with_state(state)
}

fn bad_request(reason: String) -> Response {
    debug!(reason = %reason, "Rejected intake payload");
    (StatusCode::BAD_REQUEST, reason).into_response()
}

async fn post_webhook(State(state): State<IntakeState>, Json(body): Json<Value>) -> Response {
    match parse_webhook(&body) {
        Ok(event) => match state.bus.publish_webhook(event).await {
            Ok(()) => StatusCode::ACCEPTED.into_response(),
            Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        },
        Err(e) => bad_request(e.to_string()),
    }
}

async fn post_tick(State(state): State<IntakeState>, Json(body): Json<Value>) -> Response {
    match parse_tick(&body) {
        Ok(event) => match state.bus.publish_tick(event).await {
            Ok(()) => StatusCode::ACCEPTED.into_response(),
            Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        },
        Err(e) => bad_request(e.to_string()),
    }
}

async fn post_price(State(state): State<IntakeState>, Json(body): Json<Value>) -> Response {
    match parse_price(&body) {
        Ok(event) => match state.bus.publish_price(event).await {
            Ok(()) => StatusCode::ACCEPTED.into_response(),
            Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        },
        Err(e) => bad_request(e.to_string()),
    }
}

async fn post_reset_crypto(State(state): State<IntakeState>) -> StatusCode {
    match state.control_tx.send(ControlMsg::ResetCrypto).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn post_clear_signals(
    State(state): State<IntakeState>,
    Path(mode): Path<String>,
) -> Response {
    let Ok(mode) = FilterMode::from_name(&mode) else {
        return bad_request(format!("unknown mode: {mode}"));
    };
    match state.control_tx.send(ControlMsg::ClearSignals(mode)).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn get_fsm(State(state): State<IntakeState>) -> Json<FsmMap> {
    Json(state.fsm_rx.borrow().clone())
}

async fn get_trades(State(state): State<IntakeState>) -> Json<TradeState> {
    Json(state.trade_rx.borrow().clone())
}

async fn get_signals(State(state): State<IntakeState>, Path(mode): Path<String>) -> Response {
    match state.signal_rx.get(&mode) {
        Some(rx) => Json(rx.borrow().clone()).into_response(),
        None => bad_request(format!("unknown mode: {mode}")),
    }
}
