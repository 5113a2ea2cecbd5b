//! Helpers for database-backed and HTTP tests.

use crate::config::{Config, DatabaseConfig, PoolSettings, ProxyHeaderAuthConfig};
use crate::db::{
    handlers::{Groups, Ledger, LessonTypes, Lessons, Repository, Users},
    models::{
        groups::{GroupCreateDBRequest, GroupDBResponse},
        ledger::{LedgerEntryCreateDBRequest, LedgerEntryType},
        lesson_types::{LessonTypeCreateDBRequest, LessonTypeDBResponse},
        lessons::{LessonCreateDBRequest, LessonDBResponse},
        users::{Role, UserCreateDBRequest, UserDBResponse},
    },
};
use crate::types::{LessonTypeId, UserId};
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        database_url: None,
        database: DatabaseConfig {
            // Will get overriden by the pool handed in by sqlx::test
            url: "Something".to_string(),
            pool: PoolSettings {
                max_connections: 2,
                min_connections: 0,
                ..Default::default()
            },
        },
        host: "127.0.0.1".to_string(),
        port: 0,
        auth: crate::config::AuthConfig {
            proxy_header: ProxyHeaderAuthConfig::default(),
        },
        scheduling: crate::config::SchedulingConfig::default(),
        enable_metrics: false,
        enable_otel_export: false,
    }
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let username = format!("{}_{}", format!("{role:?}").to_lowercase(), Uuid::new_v4().simple());
    let email = format!("{username}@example.com");

    let user_create = UserCreateDBRequest {
        username,
        email,
        display_name: None,
        role,
        level_id: None,
    };

    users_repo.create(&user_create).await.expect("Failed to create test user")
}

pub fn add_auth_headers(user: &UserDBResponse) -> Vec<(String, String)> {
    let config = ProxyHeaderAuthConfig::default();
    vec![(config.header_name, user.email.clone())]
}

pub async fn create_test_lesson_type(pool: &PgPool, price: Decimal) -> LessonTypeDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    LessonTypes::new(&mut conn)
        .create(&LessonTypeCreateDBRequest {
            name: format!("lesson_type_{}", Uuid::new_v4().simple()),
            price,
        })
        .await
        .expect("Failed to create test lesson type")
}

/// Inserts a one-hour scheduled lesson directly, skipping conflict checks and teacher links.
pub async fn create_test_lesson(
    pool: &PgPool,
    teacher_id: UserId,
    lesson_type_id: LessonTypeId,
    student_ids: &[UserId],
    scheduled_at: DateTime<Utc>,
) -> LessonDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Lessons::new(&mut conn)
        .create(&LessonCreateDBRequest {
            teacher_id,
            group_id: None,
            lesson_type_id,
            scheduled_at,
            duration_minutes: 60,
            meeting_url: None,
            student_ids: student_ids.to_vec(),
            created_by: teacher_id,
        })
        .await
        .expect("Failed to create test lesson")
}

pub async fn create_test_group(pool: &PgPool, teacher_id: Option<UserId>, members: &[UserId]) -> GroupDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut groups = Groups::new(&mut conn);
    let group = groups
        .create(&GroupCreateDBRequest {
            name: format!("group_{}", Uuid::new_v4().simple()),
            teacher_id,
        })
        .await
        .expect("Failed to create test group");
    for member in members {
        groups.add_member(group.id, *member).await.expect("Failed to add group member");
    }
    group
}

/// Credits `amount` to the user, posted by the user themselves.
pub async fn grant_balance(pool: &PgPool, user_id: UserId, amount: Decimal) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Ledger::new(&mut conn)
        .post(&LedgerEntryCreateDBRequest {
            user_id,
            entry_type: LedgerEntryType::Credit,
            amount,
            lesson_id: None,
            description: "Test top-up".to_string(),
            created_by_id: user_id,
        })
        .await
        .expect("Failed to grant test balance");
}

pub async fn get_balance(pool: &PgPool, user_id: UserId) -> Decimal {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Ledger::new(&mut conn).balance(user_id).await.expect("Failed to read balance")
}
