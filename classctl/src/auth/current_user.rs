use crate::{
    AppState,
    api::models::users::CurrentUser,
    db::{errors::DbError, handlers::Users},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use tracing::{debug, instrument, trace};

/// Extract user from proxy header if present and valid
/// Returns:
/// - None: No proxy header present
/// - Some(Ok(user)): Valid proxy header found and user exists
/// - Some(Err(error)): Proxy header present but the user is unknown or the lookup failed
#[instrument(skip(parts, config, db))]
async fn try_proxy_header_auth(parts: &Parts, config: &crate::config::Config, db: &PgPool) -> Option<Result<CurrentUser>> {
    let user_email = parts
        .headers
        .get(&config.auth.proxy_header.header_name)
        .and_then(|h| h.to_str().ok())?;

    let mut conn = match db.acquire().await {
        Ok(conn) => conn,
        Err(e) => return Some(Err(DbError::from(e).into())),
    };

    match Users::new(&mut conn).get_user_by_email(user_email).await {
        Ok(Some(user)) => Some(Ok(CurrentUser::from(user))),
        Ok(None) => Some(Err(Error::Unauthenticated {
            message: Some("Unknown user".to_string()),
        })),
        Err(e) => Some(Err(Error::Database(e))),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_proxy_header_auth(parts, &state.config, &state.db).await {
            Some(Ok(user)) => {
                debug!("Found proxy header authenticated user: {}", user.id);
                Ok(user)
            }
            Some(Err(e)) => {
                trace!("Proxy header authentication failed: {:?}", e);
                Err(e)
            }
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        AppState,
        api::models::users::CurrentUser,
        db::models::users::Role,
        test_utils::{create_test_config, create_test_user},
    };
    use axum::{extract::FromRequestParts as _, http::request::Parts};
    use sqlx::PgPool;

    fn create_test_parts_with_header(header_name: &str, header_value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(header_name, header_value)
            .body(())
            .unwrap();

        let (parts, _body) = request.into_parts();
        parts
    }

    #[sqlx::test]
    async fn test_existing_user_extraction(pool: PgPool) {
        let state = AppState::builder().db(pool.clone()).config(create_test_config()).build();
        let teacher = create_test_user(&pool, Role::Teacher).await;

        let mut parts = create_test_parts_with_header("x-classctl-user", &teacher.email);
        let current_user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(current_user.id, teacher.id);
        assert_eq!(current_user.username, teacher.username);
        assert_eq!(current_user.role, Role::Teacher);
    }

    #[sqlx::test]
    async fn test_unknown_email_is_unauthenticated(pool: PgPool) {
        let state = AppState::builder().db(pool.clone()).config(create_test_config()).build();

        let mut parts = create_test_parts_with_header("x-classctl-user", "nobody@example.com");
        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();

        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_missing_header_returns_unauthorized(pool: PgPool) {
        let state = AppState::builder().db(pool.clone()).config(create_test_config()).build();

        let request = axum::http::Request::builder().uri("http://localhost/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
