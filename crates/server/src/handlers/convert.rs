use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use cid_prober::{
    AffiliateLink as CatalogLink, Conversion, Identifier, PriceTier as RankTier, ProbeResult,
};
use cid_protocol::{
    AffiliateLink, ConvertRequest, ConvertResponse, PriceTier, PricedEntry, ProgressEvent,
    SessionAck, SessionConvertRequest, UNKNOWN_HOTEL,
};
use tracing::{info, warn};

use crate::{sse::SessionProgress, AppState, Result};

pub async fn convert_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>> {
    let Json(request) = payload?;
    let identifiers = state.draw_identifiers()?;
    let conversion = state.converter.convert(&request.url, &identifiers, None).await?;

    Ok(Json(conversion_response(conversion, &state.catalog.affiliates)))
}

/// Accepts the job and answers at once; the outcome goes to the session's stream.
pub async fn session_convert_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SessionConvertRequest>, JsonRejection>,
) -> (StatusCode, Json<SessionAck>) {
    let rejected = |status: StatusCode, message: String| (status, Json(SessionAck::rejected(message)));

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return rejected(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    if let Err(e) = request.validate() {
        return rejected(StatusCode::BAD_REQUEST, e.to_string());
    }
    if let Err(rejection) = state.converter.validator().validate(Some(&request.url)) {
        return rejected(StatusCode::BAD_REQUEST, format!("Invalid hotel URL: {rejection}"));
    }

    let identifiers = match state.draw_identifiers() {
        Ok(identifiers) => identifiers,
        Err(e) => return rejected(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    if !state.sessions.open(&request.session_id) {
        return rejected(
            StatusCode::CONFLICT,
            format!("Session {} is already in use", request.session_id),
        );
    }

    info!(session = %request.session_id, identifiers = identifiers.len(), "Conversion accepted");
    tokio::spawn(run_session(state, request, identifiers));

    (StatusCode::OK, Json(SessionAck::accepted()))
}

async fn run_session(state: AppState, request: SessionConvertRequest, identifiers: Vec<Identifier>) {
    let progress = SessionProgress::new(state.sessions.clone(), request.session_id.clone());

    let event = match state
        .converter
        .convert(&request.url, &identifiers, Some(&progress))
        .await
    {
        Ok(conversion) => ProgressEvent::Complete {
            result: Box::new(conversion_response(conversion, &state.catalog.affiliates)),
        },
        Err(e) => {
            warn!(session = %request.session_id, error = %e, "Conversion failed");
            ProgressEvent::Error {
                message: e.to_string(),
            }
        }
    };

    state.sessions.finish(&request.session_id, event);
}

pub fn conversion_response(conversion: Conversion, affiliates: &[CatalogLink]) -> ConvertResponse {
    let cheapest = conversion.cheapest.as_ref().map(|result| priced_entry(result, Some(PriceTier::Low)));

    let priced = conversion
        .priced
        .iter()
        .zip(conversion.tiers.iter().copied())
        .map(|(result, tier)| priced_entry(result, Some(price_tier(tier))))
        .collect();

    ConvertResponse {
        hotel: conversion.hotel_name.unwrap_or_else(|| UNKNOWN_HOTEL.to_string()),
        initial_price: conversion.initial_price,
        priced,
        cheapest,
        total_probed: conversion.total_probed,
        found_count: conversion.found_count,
        sold_out_count: conversion.sold_out_count,
        failed_count: conversion.failed_count,
        affiliate_links: affiliates
            .iter()
            .map(|link| AffiliateLink {
                label: link.label.clone(),
                url: link.url.clone(),
            })
            .collect(),
    }
}

fn priced_entry(result: &ProbeResult, tier: Option<PriceTier>) -> PricedEntry {
    PricedEntry {
        label: result.label().to_string(),
        cid: result.cid(),
        url: result.url().to_string(),
        hotel_name: result.hotel_name().map(str::to_string),
        price: result.price(),
        sold_out: result.sold_out(),
        failed: result.failed(),
        tier,
    }
}

fn price_tier(tier: RankTier) -> PriceTier {
    match tier {
        RankTier::Low => PriceTier::Low,
        RankTier::Mid => PriceTier::Mid,
        RankTier::High => PriceTier::High,
    }
}
