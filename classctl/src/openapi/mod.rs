//! OpenAPI documentation for the scheduling and billing API at `/api/v1/*`.
//!
//! The document is served at `/api-docs/openapi.json` and rendered by RapiDoc at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;
use crate::db::models;

/// Requests are authenticated by a trusted proxy that forwards the caller's email.
struct ProxyHeaderSecurityAddon;

impl Modify for ProxyHeaderSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-Classctl-User".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-classctl-user",
                    "Email of the authenticated user, set by the fronting auth proxy. The header name is configurable via `auth.proxy_header.header_name`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Scheduling and billing API")
    ),
    modifiers(&ProxyHeaderSecurityAddon),
    paths(
        api::handlers::lessons::create_lesson,
        api::handlers::lessons::get_lesson,
        api::handlers::lessons::list_lessons,
        api::handlers::lessons::update_lesson,
        api::handlers::lessons::delete_lesson,
        api::handlers::lessons::cancel_lesson,
        api::handlers::lessons::create_recurring_lessons,
        api::handlers::attendance::set_attendance,
        api::handlers::attendance::set_attendance_bulk,
        api::handlers::transactions::create_top_up,
        api::handlers::transactions::get_balance,
        api::handlers::transactions::list_transactions,
        api::handlers::notifications::list_notifications,
        api::handlers::notifications::mark_notification_read,
    ),
    components(
        schemas(
            api::models::lessons::LessonCreate,
            api::models::lessons::LessonUpdate,
            api::models::lessons::LessonCancel,
            api::models::lessons::RecurringLessonCreate,
            api::models::lessons::LessonResponse,
            api::models::lessons::LessonStudentResponse,
            api::models::lessons::BatchResponse,
            api::models::lessons::ConflictResponse,
            api::models::attendance::AttendanceUpdate,
            api::models::attendance::AttendanceMark,
            api::models::attendance::BulkAttendanceUpdate,
            api::models::attendance::AttendanceResponse,
            api::models::attendance::SettlementResponse,
            api::models::transactions::TopUpCreate,
            api::models::transactions::TopUpResponse,
            api::models::transactions::TransactionResponse,
            api::models::transactions::BalanceResponse,
            api::models::notifications::NotificationResponse,
            models::lessons::LessonStatus,
            models::lessons::AttendanceStatus,
            models::ledger::LedgerEntryType,
            models::notifications::NotificationKind,
            crate::scheduling::batch::BatchConflict,
            crate::scheduling::lifecycle::CancellationReason,
            crate::scheduling::settlement::SettlementOutcome,
            crate::errors::ScheduleConflict,
        )
    ),
    tags(
        (name = "lessons", description = "Book, edit, cancel and list lessons. Bookings are checked for teacher and student double-booking."),
        (name = "attendance", description = "Mark attendance. Each mark settles the student's charge and the teacher's payment."),
        (name = "transactions", description = "Balances, top-ups and the transaction ledger."),
        (name = "notifications", description = "Per-user inbox of billing and scheduling notices."),
    ),
    info(
        title = "classctl API",
        description = "Lesson scheduling and attendance billing for a language school.",
    )
)]
pub struct ApiDoc;
