use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::current_actor, response},
    app_error::AppResult,
    use_cases::plan_catalog::{PlanInput, UpdatePlanInput},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route(
            "/{plan_id}",
            get(get_plan).patch(update_plan).delete(delete_plan),
        )
        .route("/{plan_id}/deactivate", post(deactivate_plan))
        .route("/{plan_id}/activate", post(reactivate_plan))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListPlansQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreatePlanPayload {
    name: String,
    price_cents: i64,
    duration_months: i32,
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdatePlanPayload {
    name: Option<String>,
    price_cents: Option<i64>,
    duration_months: Option<i32>,
    features: Option<Vec<String>>,
}

async fn list_plans(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ListPlansQuery>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let plans = app_state
        .plan_use_cases
        .list_plans(&actor, query.include_inactive)
        .await?;
    Ok(response::ok("Plans retrieved", plans))
}

async fn get_plan(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let plan = app_state.plan_use_cases.get_plan(&actor, plan_id).await?;
    Ok(response::ok("Plan retrieved", plan))
}

async fn create_plan(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CreatePlanPayload>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let plan = app_state
        .plan_use_cases
        .create_plan(
            &actor,
            PlanInput {
                name: payload.name,
                price_cents: payload.price_cents,
                duration_months: payload.duration_months,
                features: payload.features,
            },
        )
        .await?;
    Ok(response::created("Plan created", plan))
}

async fn update_plan(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<UpdatePlanPayload>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let plan = app_state
        .plan_use_cases
        .update_plan(
            &actor,
            plan_id,
            UpdatePlanInput {
                name: payload.name,
                price_cents: payload.price_cents,
                duration_months: payload.duration_months,
                features: payload.features,
            },
        )
        .await?;
    Ok(response::ok("Plan updated", plan))
}

async fn deactivate_plan(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let plan = app_state
        .plan_use_cases
        .deactivate_plan(&actor, plan_id)
        .await?;
    Ok(response::ok("Plan deactivated", plan))
}

async fn reactivate_plan(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let plan = app_state
        .plan_use_cases
        .reactivate_plan(&actor, plan_id)
        .await?;
    Ok(response::ok("Plan reactivated", plan))
}

async fn delete_plan(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    app_state.plan_use_cases.delete_plan(&actor, plan_id).await?;
    Ok(response::ok("Plan deleted", serde_json::Value::Null))
}
