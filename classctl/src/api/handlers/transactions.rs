//! HTTP handlers for balances, top-ups and ledger history.

use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination},
        transactions::{BalanceResponse, TopUpCreate, TopUpResponse, TransactionResponse},
        users::CurrentUser,
    },
    auth::permissions,
    db::{
        handlers::{Ledger, Repository, Users},
        models::ledger::{LedgerEntryCreateDBRequest, LedgerEntryType},
    },
    errors::{Error, Result},
    scheduling::notify::Notifier,
    types::{Operation, UserId, abbrev_uuid},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;

/// Credit a user's balance
#[utoipa::path(
    post,
    path = "/users/{user_id}/balance/top-ups",
    tag = "transactions",
    summary = "Top up a balance",
    description = "Managers only. Posts a credit transaction and notifies the user.",
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    request_body = TopUpCreate,
    responses(
        (status = 201, description = "Top-up posted", body = TopUpResponse),
        (status = 400, description = "Amount must be positive"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Managers only"),
        (status = 404, description = "User not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_top_up(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
    Json(data): Json<TopUpCreate>,
) -> Result<(StatusCode, Json<TopUpResponse>)> {
    permissions::require_staff(&current_user, Operation::Create, "top-ups")?;

    if data.amount <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Amount must be greater than zero".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Serialize with settlements touching the same balance
    Users::new(&mut tx).lock_for_update(user_id).await?;

    let posted = Ledger::new(&mut tx)
        .post(&LedgerEntryCreateDBRequest {
            user_id,
            entry_type: LedgerEntryType::Credit,
            amount: data.amount,
            lesson_id: None,
            description: data.description.unwrap_or_else(|| "Balance top-up".to_string()),
            created_by_id: current_user.id,
        })
        .await?;

    Notifier::new(&mut tx)
        .balance_top_up(user_id, data.amount, posted.balance_after)
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(user_id = %abbrev_uuid(&user_id), amount = %data.amount, balance = %posted.balance_after, "Balance topped up");

    Ok((
        StatusCode::CREATED,
        Json(TopUpResponse {
            transaction: TransactionResponse::from(posted.entry),
            balance: posted.balance_after,
        }),
    ))
}

/// Current balance
#[utoipa::path(
    get,
    path = "/users/{user_id}/balance",
    tag = "transactions",
    summary = "Get a balance",
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Cannot read another user's balance"),
        (status = 404, description = "User not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<BalanceResponse>> {
    permissions::require_self_or_staff(&current_user, user_id, Operation::Read, "balance")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn).get_by_id(user_id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: user_id.to_string(),
    })?;

    Ok(Json(BalanceResponse {
        user_id,
        balance: user.balance,
    }))
}

/// Ledger rows, newest first
#[utoipa::path(
    get,
    path = "/users/{user_id}/transactions",
    tag = "transactions",
    summary = "List transactions",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID"),
        Pagination
    ),
    responses(
        (status = 200, description = "Paginated transactions", body = PaginatedResponse<TransactionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Cannot read another user's transactions"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<TransactionResponse>>> {
    permissions::require_self_or_staff(&current_user, user_id, Operation::Read, "transactions")?;
    let (skip, limit) = pagination.params();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Ledger::new(&mut pool_conn);
    let rows = repo.list_user_transactions(user_id, skip, limit).await?;
    let total_count = repo.count_user_transactions(user_id).await?;

    Ok(Json(PaginatedResponse::new(
        rows.into_iter().map(TransactionResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}
