//! Token-gated email approval.
//!
//! Managers act on a request straight from an email link, without a web
//! session. The link carries a SHA-256 token over
//! `request_id:manager_email:secret`. GET only ever renders confirmation
//! forms so that link-preview bots cannot trigger a state change; the
//! mutation happens exclusively on POST.

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::models::outbox::RequestEvent;
use crate::db::models::requests::{Request, RequestStatus};
use crate::db::queries::requests::{
    escalation_threshold_for, finalize_transition, get_request_by_id,
};
use crate::utils::mailer::Mailer;
use crate::workflow::lifecycle::{self, TransitionError};
use crate::workflow::token;

pub fn email_approval_routes() -> Router<PgPool> {
    // Any verb other than GET/POST gets a 405 from the router.
    Router::new().route("/email/approval", get(render_approval_page).post(process_approval))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalLinkParams {
    pub request_id: Option<i32>,
    pub action: Option<String>,
    pub manager_email: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalFormPayload {
    pub request_id: Option<i32>,
    pub action: Option<String>,
    pub manager_email: Option<String>,
    pub token: Option<String>,
    pub reason: Option<String>,
}

type PageResult = (StatusCode, Html<String>);

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>{title}</title></head>\
         <body style=\"font-family: sans-serif; max-width: 40em; margin: 2em auto;\">\
         <h2>{title}</h2>{body}</body></html>"
    )
}

fn error_page(status: StatusCode, title: &str, detail: &str) -> PageResult {
    (status, Html(page(title, &format!("<p>{detail}</p>"))))
}

fn already_processed_page(request: &Request) -> PageResult {
    // The link was valid, just stale. Informational, not an error.
    (
        StatusCode::OK,
        Html(page(
            "Already processed",
            &format!(
                "<p>Request {} has already been processed (status: {}).</p>\
                 <p>No further action is possible from this link.</p>",
                request.request_number.as_deref().unwrap_or("-"),
                request.status
            ),
        )),
    )
}

struct ValidatedLink {
    request: Request,
    manager_id: i32,
    manager_role: String,
    manager_email: String,
    action: String,
    token: String,
}

/// Shared validation for both verbs: parameter presence, token match,
/// request and manager lookup. Mutating checks stay in the POST handler.
async fn validate_link(
    pool: &PgPool,
    request_id: Option<i32>,
    action: Option<&str>,
    manager_email: Option<&str>,
    presented_token: Option<&str>,
) -> Result<ValidatedLink, PageResult> {
    let (Some(request_id), Some(action), Some(manager_email), Some(presented_token)) =
        (request_id, action, manager_email, presented_token)
    else {
        return Err(error_page(
            StatusCode::BAD_REQUEST,
            "Missing parameters",
            "The link is missing required parameters.",
        ));
    };

    if action != "approve" && action != "decline" {
        return Err(error_page(
            StatusCode::BAD_REQUEST,
            "Invalid action",
            "The link action must be approve or decline.",
        ));
    }

    let secret = &Config::get().approval_link_secret;
    if !token::verify_token(request_id, manager_email, secret, presented_token) {
        warn!(
            "Rejected approval link with bad token for request {} ({})",
            request_id, manager_email
        );
        return Err(error_page(
            StatusCode::UNAUTHORIZED,
            "Not authorized",
            "This approval link is not valid.",
        ));
    }

    let request = match get_request_by_id(pool, request_id).await {
        Ok(request) => request,
        Err(_) => {
            return Err(error_page(
                StatusCode::NOT_FOUND,
                "Request not found",
                "The request referenced by this link does not exist.",
            ))
        }
    };

    let manager: Option<(i32, String)> = sqlx::query_as(
        r#"
        SELECT id, role FROM users
        WHERE email = $1 AND role IN ('manager', 'admin') AND account_locked = FALSE
        "#,
    )
    .bind(manager_email)
    .fetch_optional(pool)
    .await
    .map_err(|_| {
        error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong",
            "Please try again later.",
        )
    })?;

    let Some((manager_id, manager_role)) = manager else {
        return Err(error_page(
            StatusCode::NOT_FOUND,
            "Unknown approver",
            "This email address is not a registered manager.",
        ));
    };

    Ok(ValidatedLink {
        request,
        manager_id,
        manager_role,
        manager_email: manager_email.to_string(),
        action: action.to_string(),
        token: presented_token.to_string(),
    })
}

/// GET: render the confirmation (approve) or reason (decline) form.
/// Never mutates, no matter which parameters are supplied.
pub async fn render_approval_page(
    State(pool): State<PgPool>,
    Query(params): Query<ApprovalLinkParams>,
) -> PageResult {
    let link = match validate_link(
        &pool,
        params.request_id,
        params.action.as_deref(),
        params.manager_email.as_deref(),
        params.token.as_deref(),
    )
    .await
    {
        Ok(link) => link,
        Err(response) => return response,
    };

    if link.request.status.is_terminal() {
        return already_processed_page(&link.request);
    }

    let request = &link.request;
    let number = request.request_number.as_deref().unwrap_or("-");
    let hidden_fields = format!(
        "<input type=\"hidden\" name=\"request_id\" value=\"{}\">\
         <input type=\"hidden\" name=\"action\" value=\"{}\">\
         <input type=\"hidden\" name=\"manager_email\" value=\"{}\">\
         <input type=\"hidden\" name=\"token\" value=\"{}\">",
        request.id, link.action, link.manager_email, link.token
    );

    let body = if link.action == "approve" {
        format!(
            "<p>You are about to approve request <strong>{number}</strong>: {title}.</p>\
             <form method=\"post\" action=\"/email/approval\">{hidden_fields}\
             <button type=\"submit\">Confirm approval</button></form>",
            title = request.title,
        )
    } else {
        format!(
            "<p>You are about to decline request <strong>{number}</strong>: {title}.</p>\
             <form method=\"post\" action=\"/email/approval\">{hidden_fields}\
             <p><label>Reason:<br><textarea name=\"reason\" rows=\"4\" cols=\"40\"></textarea></label></p>\
             <button type=\"submit\">Confirm decline</button></form>",
            title = request.title,
        )
    };

    (
        StatusCode::OK,
        Html(page(
            if link.action == "approve" {
                "Confirm approval"
            } else {
                "Confirm decline"
            },
            &body,
        )),
    )
}

/// POST: perform the transition. Decline requires a non-empty reason.
pub async fn process_approval(
    State(pool): State<PgPool>,
    Extension(mailer): Extension<Mailer>,
    Form(form): Form<ApprovalFormPayload>,
) -> PageResult {
    let link = match validate_link(
        &pool,
        form.request_id,
        form.action.as_deref(),
        form.manager_email.as_deref(),
        form.token.as_deref(),
    )
    .await
    {
        Ok(link) => link,
        Err(response) => return response,
    };

    let request = link.request;

    if request.status.is_terminal() {
        return already_processed_page(&request);
    }

    let outcome = if link.action == "approve" {
        // The admin tier needs an admin actor even on the email path.
        if request.status == RequestStatus::PendingAdminApproval && link.manager_role != "admin" {
            return error_page(
                StatusCode::UNAUTHORIZED,
                "Not authorized",
                "This request has been escalated and needs an admin decision.",
            );
        }
        let threshold = match escalation_threshold_for(&pool, request.request_type).await {
            Ok(threshold) => threshold,
            Err(_) => {
                return error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    "Please try again later.",
                )
            }
        };
        lifecycle::approve(request.status, request.amount.as_ref(), &threshold).map(|transition| {
            let event_notes = match transition.next {
                RequestStatus::PendingAdminApproval => Some("escalated for admin approval"),
                _ => None,
            };
            (transition, RequestEvent::Approved, None, event_notes)
        })
    } else {
        let reason = form.reason.as_deref().unwrap_or("");
        lifecycle::decline(request.status, reason)
            .map(|transition| (transition, RequestEvent::Declined, Some(reason), Some(reason)))
    };

    let (transition, event, decline_reason, event_notes) = match outcome {
        Ok(parts) => parts,
        Err(TransitionError::AlreadyProcessed(_)) => {
            return already_processed_page(&request);
        }
        Err(TransitionError::EmptyDeclineReason) => {
            return error_page(
                StatusCode::BAD_REQUEST,
                "Reason required",
                "A decline needs a non-empty reason.",
            );
        }
        Err(TransitionError::InvalidTransition { from, .. }) => {
            return error_page(
                StatusCode::BAD_REQUEST,
                "Not possible",
                &format!("The request cannot be {}d while it is {from}.", link.action),
            );
        }
    };

    let decline_reason = decline_reason.map(|reason| reason.trim().to_string());
    let result = finalize_transition(
        &pool,
        &mailer,
        &request,
        transition.next,
        transition.tier,
        link.manager_id,
        None,
        decline_reason.as_deref(),
        event,
        event_notes.map(str::trim),
    )
    .await;

    let updated = match result {
        Ok(updated) => updated,
        Err(response) if response.status_code == StatusCode::CONFLICT.as_u16() => {
            // Raced with another approver; for the link holder this is the
            // same stale-link situation.
            return already_processed_page(&request);
        }
        Err(_) => {
            return error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The decision could not be recorded. Please try again later.",
            );
        }
    };

    info!(
        "Email approval: request {} {}d by {} -> {}",
        updated.id, link.action, link.manager_email, updated.status
    );

    let message = match (link.action.as_str(), updated.status) {
        ("approve", RequestStatus::PendingAdminApproval) => format!(
            "Request {} is approved at the manager tier and now awaits admin approval.",
            updated.request_number.as_deref().unwrap_or("-")
        ),
        ("approve", _) => format!(
            "Request {} has been approved.",
            updated.request_number.as_deref().unwrap_or("-")
        ),
        _ => format!(
            "Request {} has been declined.",
            updated.request_number.as_deref().unwrap_or("-")
        ),
    };

    (
        StatusCode::OK,
        Html(page("Decision recorded", &format!("<p>{message}</p>"))),
    )
}
