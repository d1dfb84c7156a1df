pub mod health;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::audit::handlers as audit;
use crate::auth::handlers as auth;
use crate::export::handlers as export;
use crate::intelligence::handlers as ai;
use crate::portfolio::handlers as portfolio;
use crate::staffing::documents::MAX_UPLOAD_BYTES;
use crate::staffing::handlers as staffing;
use crate::state::AppState;
use crate::tenancy::handlers as tenancy;

/// Room for multipart boundaries and headers on top of the file itself.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

/// Credentialed CORS for the configured browser origins only.
pub fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{o}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route(
            "/api/auth/session",
            post(auth::handle_create_session).get(auth::handle_get_session),
        )
        .route("/api/auth/logout", post(auth::handle_logout))
        // Company, team and invitations
        .route("/api/v1/companies", post(tenancy::handle_create_company))
        .route(
            "/api/v1/company",
            get(tenancy::handle_get_company).put(tenancy::handle_update_company),
        )
        .route("/api/v1/team", get(tenancy::handle_list_team))
        .route("/api/v1/team/:id", delete(tenancy::handle_remove_member))
        .route("/api/v1/team/:id/role", put(tenancy::handle_update_member_role))
        .route("/api/v1/team/:id/status", put(tenancy::handle_update_member_status))
        .route(
            "/api/v1/invitations",
            get(tenancy::handle_list_invitations).post(tenancy::handle_create_invitation),
        )
        .route("/api/v1/invitations/lookup", get(tenancy::handle_lookup_invitation))
        .route("/api/v1/invitations/accept", post(tenancy::handle_accept_invitation))
        .route(
            "/api/v1/invitations/:id",
            delete(tenancy::handle_revoke_invitation),
        )
        // Employees
        .route(
            "/api/v1/employees",
            get(staffing::handle_list_employees).post(staffing::handle_create_employee),
        )
        .route(
            "/api/v1/employees/:id",
            get(staffing::handle_get_employee)
                .put(staffing::handle_update_employee)
                .delete(staffing::handle_delete_employee),
        )
        .route(
            "/api/v1/employees/:id/documents",
            post(staffing::handle_upload_employee_document)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/v1/employees/:id/documents/:doc_id",
            get(staffing::handle_download_employee_document)
                .delete(staffing::handle_delete_employee_document),
        )
        // Resources
        .route(
            "/api/v1/resources",
            get(staffing::handle_list_resources).post(staffing::handle_create_resource),
        )
        .route(
            "/api/v1/resources/:id",
            get(staffing::handle_get_resource)
                .put(staffing::handle_update_resource)
                .delete(staffing::handle_delete_resource),
        )
        .route(
            "/api/v1/resources/:id/allocations",
            get(staffing::handle_list_resource_allocations),
        )
        .route(
            "/api/v1/resources/:id/documents",
            post(staffing::handle_upload_resource_document)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/v1/resources/:id/documents/:doc_id",
            get(staffing::handle_download_resource_document)
                .delete(staffing::handle_delete_resource_document),
        )
        .route(
            "/api/v1/resources/:id/extract-skills",
            post(ai::handle_extract_resource_skills),
        )
        // Clients and projects
        .route(
            "/api/v1/clients",
            get(portfolio::handle_list_clients).post(portfolio::handle_create_client),
        )
        .route(
            "/api/v1/clients/:id",
            get(portfolio::handle_get_client)
                .put(portfolio::handle_update_client)
                .delete(portfolio::handle_delete_client),
        )
        .route(
            "/api/v1/clients/:id/projects",
            get(portfolio::handle_list_client_projects),
        )
        .route(
            "/api/v1/projects",
            get(portfolio::handle_list_projects).post(portfolio::handle_create_project),
        )
        .route(
            "/api/v1/projects/:id",
            get(portfolio::handle_get_project)
                .put(portfolio::handle_update_project)
                .delete(portfolio::handle_delete_project),
        )
        .route("/api/v1/projects/:id/team", put(portfolio::handle_set_project_team))
        .route(
            "/api/v1/projects/:id/allocations",
            get(portfolio::handle_list_project_allocations),
        )
        // Allocations
        .route(
            "/api/v1/allocations",
            get(staffing::handle_list_allocations).post(staffing::handle_create_allocation),
        )
        .route(
            "/api/v1/allocations/:id",
            put(staffing::handle_update_allocation).delete(staffing::handle_delete_allocation),
        )
        .route("/api/v1/utilization", get(staffing::handle_utilization))
        // AI
        .route("/api/v1/ai/extract-skills", post(ai::handle_extract_skills))
        .route("/api/v1/ai/match-candidates", post(ai::handle_match_candidates))
        .route("/api/v1/ai/skill-gap", post(ai::handle_skill_gap))
        // Export
        .route(
            "/api/v1/export/projects/:id/pdf",
            get(export::handle_export_project_pdf),
        )
        .route(
            "/api/v1/export/resources/:id/pdf",
            get(export::handle_export_resource_pdf),
        )
        // Audit
        .route("/api/v1/audit-logs", get(audit::handle_list_audit_logs))
        .with_state(state)
}
