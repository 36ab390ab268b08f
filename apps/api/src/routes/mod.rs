pub mod health;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::admin;
use crate::api_keys;
use crate::auth;
use crate::documents;
use crate::generation;
use crate::history;
use crate::projects;
use crate::ratelimit;
use crate::requirements;
use crate::state::AppState;

/// Assembles the full application router.
///
/// Layer order per route group, outermost first: rate limiter → session
/// guard → role guard (admin routes only) → handler. `/check_session` is
/// exempt from rate limiting; `/health` is exempt from everything.
pub fn build_router(state: AppState) -> Router {
    // Session-free endpoints, general quota.
    let public = Router::new()
        .route("/login", post(auth::handlers::login))
        .route("/register", post(auth::handlers::register))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), ratelimit::DEFAULT),
            ratelimit::rate_limit,
        ));

    let session_probe = Router::new().route("/check_session", get(auth::handlers::check_session));

    let default_class = Router::new()
        .route("/logout", post(auth::handlers::logout))
        .route(
            "/projects",
            get(projects::handlers::list_projects).post(projects::handlers::create_project),
        )
        .route(
            "/projects/:project_id",
            get(projects::handlers::get_project)
                .put(projects::handlers::update_project)
                .delete(projects::handlers::delete_project),
        )
        .route(
            "/projects/:project_id/collaborators",
            get(projects::handlers::list_collaborators).post(projects::handlers::add_collaborator),
        )
        .route(
            "/projects/:project_id/collaborators/:username",
            delete(projects::handlers::remove_collaborator),
        )
        .route(
            "/projects/:project_id/requirements",
            get(requirements::handlers::list_requirements)
                .post(requirements::handlers::create_requirement),
        )
        .route(
            "/requirements/:requirement_id",
            get(requirements::handlers::get_requirement)
                .put(requirements::handlers::update_requirement)
                .delete(requirements::handlers::delete_requirement),
        )
        .route(
            "/api_keys",
            get(api_keys::handlers::list_api_keys).post(api_keys::handlers::save_api_key),
        )
        .route("/api_keys/:key_id", delete(api_keys::handlers::delete_api_key))
        .route("/history", get(history::handlers::list_history))
        .route(
            "/history/:history_id",
            get(history::handlers::get_history_item).delete(history::handlers::delete_history_item),
        )
        .route("/upload", post(documents::handlers::upload))
        .route("/download_pdf", post(documents::handlers::download_pdf))
        .route("/download_docx", post(documents::handlers::download_docx))
        .nest("/admin", admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), ratelimit::DEFAULT),
            ratelimit::rate_limit,
        ));

    let generation_class = Router::new()
        .route(
            "/generate_test_cases_stream",
            post(generation::handlers::generate_test_cases_stream),
        )
        .route(
            "/generate_test_cases_for_requirement",
            post(generation::handlers::generate_test_cases_for_requirement),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), ratelimit::GENERATION),
            ratelimit::rate_limit,
        ));

    let chat_class = Router::new()
        .route(
            "/chat_with_assistant",
            post(generation::handlers::chat_with_assistant),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), ratelimit::CHAT),
            ratelimit::rate_limit,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(public)
        .merge(session_probe)
        .merge(default_class)
        .merge(generation_class)
        .merge(chat_class)
        .with_state(state)
}

fn admin_routes() -> Router<AppState> {
    let admin_only = Router::new()
        .route(
            "/users",
            get(admin::users::list_users).post(admin::users::create_user),
        )
        .route(
            "/users/:user_id",
            get(admin::users::get_user)
                .put(admin::users::update_user)
                .delete(admin::users::delete_user),
        )
        .route("/projects", get(admin::projects::list_projects))
        .route(
            "/projects/:project_id",
            get(admin::projects::get_project)
                .put(admin::projects::update_project)
                .delete(admin::projects::delete_project),
        )
        .route("/dashboard", get(admin::reports::dashboard))
        .route_layer(middleware::from_fn(auth::require_admin));

    let manager_or_admin = Router::new()
        .route("/managed-projects", get(admin::reports::managed_projects))
        .route("/assignable-users", get(admin::reports::assignable_users))
        .route("/manager-dashboard", get(admin::reports::manager_dashboard))
        .route("/manager-users", get(admin::reports::manager_users))
        .route_layer(middleware::from_fn(auth::require_manager_or_admin));

    admin_only.merge(manager_or_admin)
}
