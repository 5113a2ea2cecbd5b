//! Authentication and authorization.
//!
//! classctl sits behind an authenticating proxy. The proxy sets a trusted header
//! (`auth.proxy_header.header_name`, `x-classctl-user` by default) carrying the caller's email,
//! and the [`current_user`] extractor resolves it to a user row. There are no sessions or
//! passwords in this service.
//!
//! Authorization is role based (see [`permissions`]):
//!
//! - **Managers and admins** may act on any lesson, ledger or inbox
//! - **Teachers** may create, update, cancel and mark attendance on their own lessons
//! - **Students** may read their own lessons, ledger and notifications
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use classctl::api::models::users::CurrentUser;
//!
//! async fn handler(current_user: CurrentUser, State(state): State<AppState>) -> Result<Json<...>> {
//!     permissions::require_staff(&current_user, Operation::Create, "top-ups")?;
//!     ...
//! }
//! ```

pub mod current_user;
pub mod permissions;
