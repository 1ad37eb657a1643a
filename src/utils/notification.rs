use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info};

use crate::config::Config;
use crate::db::models::notification::{NotificationScope, NotificationTargetInput};
use crate::db::models::outbox::{OutboxStatus, RequestEvent};
use crate::db::models::requests::Request;
use crate::utils::mailer::Mailer;
use crate::workflow::token;

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid target provided: {0}")]
    InvalidTarget(String),

    #[error("Failed to serialize notification data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Notification builder for creating in-app notifications
pub struct NotificationBuilder {
    title: String,
    body: Option<String>,
    notification_type: String,
    targets: Vec<NotificationTargetInput>,
    action_type: Option<String>,
    action_data: Option<Value>,
    dismissible: bool,
    expires_in_days: Option<i64>,
}

impl NotificationBuilder {
    /// Create a new notification builder with required fields
    pub fn new(title: impl Into<String>, notification_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            notification_type: notification_type.into(),
            targets: Vec::new(),
            action_type: None,
            action_data: None,
            dismissible: true,
            expires_in_days: Some(14), // Default to 14 days
        }
    }

    /// Set notification body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a target user to the notification
    pub fn target_user(mut self, user_id: i32) -> Self {
        self.targets.push(NotificationTargetInput {
            scope: NotificationScope::User,
            target_id: user_id,
        });
        self
    }

    /// Add multiple target users to the notification
    pub fn target_users(mut self, user_ids: Vec<i32>) -> Self {
        for user_id in user_ids {
            self.targets.push(NotificationTargetInput {
                scope: NotificationScope::User,
                target_id: user_id,
            });
        }
        self
    }

    /// Add a target team to the notification
    pub fn target_team(mut self, team_id: i32) -> Self {
        self.targets.push(NotificationTargetInput {
            scope: NotificationScope::Team,
            target_id: team_id,
        });
        self
    }

    /// Add a target team's leads to the notification
    pub fn target_team_leads(mut self, team_id: i32) -> Self {
        self.targets.push(NotificationTargetInput {
            scope: NotificationScope::TeamLeads,
            target_id: team_id,
        });
        self
    }

    /// Set the action type and data for when notification is clicked
    pub fn action(mut self, action_type: impl Into<String>, action_data: Value) -> Self {
        self.action_type = Some(action_type.into());
        self.action_data = Some(action_data);
        self
    }

    /// Set whether the notification can be dismissed
    pub fn dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    /// Set expiration time in days (None means no expiration)
    pub fn expires_in_days(mut self, days: Option<i64>) -> Self {
        self.expires_in_days = days;
        self
    }

    /// Build and send the notification
    pub async fn send(self, pool: &PgPool) -> NotificationResult<i32> {
        // Validate required fields
        if self.targets.is_empty() {
            return Err(NotificationError::InvalidTarget(
                "At least one target is required".to_string(),
            ));
        }

        // Calculate expiration date if provided
        let expires_at = self
            .expires_in_days
            .map(|days| (Utc::now() + chrono::Duration::days(days)).naive_utc());

        // Start a transaction
        let mut tx = pool.begin().await?;

        // Insert notification
        let notification_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (
                title, body, type, action_type, action_data,
                global, dismissible, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&self.title)
        .bind(&self.body)
        .bind(&self.notification_type)
        .bind(&self.action_type)
        .bind(&self.action_data)
        .bind(false) // Never global for system notifications
        .bind(self.dismissible)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        // Insert targets
        for target in &self.targets {
            let scope_str = match target.scope {
                NotificationScope::User => "user",
                NotificationScope::Team => "team",
                NotificationScope::TeamLeads => "team_leads",
            };

            sqlx::query(
                "INSERT INTO notification_targets (notification_id, scope, target_id) VALUES ($1, $2, $3)"
            )
            .bind(notification_id)
            .bind(scope_str)
            .bind(target.target_id)
            .execute(&mut *tx)
            .await?;
        }

        // Commit transaction
        tx.commit().await?;

        Ok(notification_id)
    }
}

/// Common notification types for system usage
pub mod notification_types {
    pub const REQUEST_SUBMITTED: &str = "request_submitted";
    pub const REQUEST_ASSIGNED: &str = "request_assigned";
    pub const REQUEST_APPROVED: &str = "request_approved";
    pub const REQUEST_DECLINED: &str = "request_declined";
    pub const ROUTING_ESCALATION: &str = "routing_escalation";
}

/// Queue an outbound email inside the caller's transaction so the row
/// commits (or rolls back) together with the status transition that
/// produced it. Delivery happens after commit via `dispatch_outbox_entry`.
pub async fn enqueue_request_email(
    tx: &mut Transaction<'_, Postgres>,
    request_id: i32,
    event: RequestEvent,
    recipient_id: i32,
    subject: &str,
    body: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO email_outbox (request_id, event, recipient_id, subject, body)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(request_id)
    .bind(event.as_str())
    .bind(recipient_id)
    .bind(subject)
    .bind(body)
    .fetch_one(&mut **tx)
    .await
}

/// Deliver one outbox row. Failure marks the row `failed` and is logged;
/// the business transition that queued it is already committed and stays
/// untouched.
pub async fn dispatch_outbox_entry(pool: &PgPool, mailer: &Mailer, outbox_id: i32) {
    let row: Option<(i32, String, String, Option<String>)> = match sqlx::query_as(
        r#"
        SELECT o.id, o.subject, o.body, u.email
        FROM email_outbox o
        JOIN users u ON u.id = o.recipient_id
        WHERE o.id = $1
        "#,
    )
    .bind(outbox_id)
    .fetch_optional(pool)
    .await
    {
        Ok(row) => row,
        Err(e) => {
            error!("Failed to load outbox entry {outbox_id}: {e}");
            return;
        }
    };

    let Some((id, subject, body, email)) = row else {
        error!("Outbox entry {outbox_id} not found");
        return;
    };

    let outcome = match email {
        Some(email) => mailer.send(&email, &subject, &body).await,
        None => {
            mark_outbox(pool, id, OutboxStatus::Failed, Some("recipient has no email")).await;
            error!("Outbox entry {id} has a recipient without an email address");
            return;
        }
    };

    match outcome {
        Ok(()) => {
            mark_outbox(pool, id, OutboxStatus::Sent, None).await;
            info!("Outbox entry {id} delivered");
        }
        Err(e) => {
            mark_outbox(pool, id, OutboxStatus::Failed, Some(&e.to_string())).await;
            error!("Outbox entry {id} delivery failed: {e}");
        }
    }
}

async fn mark_outbox(pool: &PgPool, outbox_id: i32, status: OutboxStatus, last_error: Option<&str>) {
    let result = sqlx::query(
        r#"
        UPDATE email_outbox
        SET status = $1,
            attempts = attempts + 1,
            last_error = $2,
            sent_at = CASE WHEN $1 = 'sent'::outbox_status THEN NOW() ELSE sent_at END
        WHERE id = $3
        "#,
    )
    .bind(status)
    .bind(last_error)
    .bind(outbox_id)
    .execute(pool)
    .await;

    if let Err(e) = result {
        error!("Failed to update outbox entry {outbox_id}: {e}");
    }
}

/// In-app notification to the assignee picked by routing.
pub async fn notify_assignment(
    pool: &PgPool,
    request: &Request,
    assignee_id: i32,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Request assigned: {}", request.title),
        notification_types::REQUEST_ASSIGNED,
    )
    .body(format!(
        "Request {} ({}) is waiting for your review",
        request.request_number.as_deref().unwrap_or("-"),
        request.request_type
    ))
    .target_user(assignee_id)
    .action("view_request", json!({ "request_id": request.id }))
    .dismissible(false)
    .send(pool)
    .await
}

/// Fallback fan-out when no routing rule resolved: every manager/admin in
/// scope gets the notification.
pub async fn notify_routing_escalation(
    pool: &PgPool,
    request: &Request,
    approver_ids: Vec<i32>,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Unrouted request: {}", request.title),
        notification_types::ROUTING_ESCALATION,
    )
    .body(format!(
        "No routing rule matched request {}; manual triage needed",
        request.request_number.as_deref().unwrap_or("-")
    ))
    .target_users(approver_ids)
    .action("view_request", json!({ "request_id": request.id }))
    .send(pool)
    .await
}

/// In-app notification to the submitter after a terminal or tier-change
/// transition.
pub async fn notify_request_outcome(
    pool: &PgPool,
    request: &Request,
    event: RequestEvent,
    notes: Option<&str>,
) -> NotificationResult<i32> {
    let (title, notification_type) = match event {
        RequestEvent::Approved => ("Request approved", notification_types::REQUEST_APPROVED),
        RequestEvent::Declined => ("Request declined", notification_types::REQUEST_DECLINED),
        RequestEvent::Submitted => ("Request submitted", notification_types::REQUEST_SUBMITTED),
    };

    let mut body = format!(
        "Request {} ({}) is now {}",
        request.request_number.as_deref().unwrap_or("-"),
        request.title,
        event.as_str()
    );
    if let Some(notes) = notes {
        body.push_str(&format!(": {notes}"));
    }

    NotificationBuilder::new(title, notification_type)
        .body(body)
        .target_user(request.submitted_by)
        .action("view_request", json!({ "request_id": request.id }))
        .send(pool)
        .await
}

/// HTML body for the approval email sent to an assignee, with tokenized
/// approve/decline links.
pub fn approval_email_body(request: &Request, manager_email: &str) -> String {
    let config = Config::get();
    let token = token::approval_token(request.id, manager_email, &config.approval_link_secret);
    let approve_url = format!(
        "{}/email/approval?request_id={}&action=approve&manager_email={}&token={}",
        config.public_base_url, request.id, manager_email, token
    );
    let decline_url = format!(
        "{}/email/approval?request_id={}&action=decline&manager_email={}&token={}",
        config.public_base_url, request.id, manager_email, token
    );

    format!(
        "<html><body>\
         <h2>Approval needed: {title}</h2>\
         <p>Request {number} ({kind}) was submitted and is waiting for your decision.</p>\
         <p>\
           <a href=\"{approve_url}\">Approve</a> | \
           <a href=\"{decline_url}\">Decline</a>\
         </p>\
         </body></html>",
        title = request.title,
        number = request.request_number.as_deref().unwrap_or("-"),
        kind = request.request_type,
    )
}

/// Plain outcome email for the submitter.
pub fn outcome_email_body(request: &Request, event: RequestEvent, notes: Option<&str>) -> String {
    let detail = notes
        .map(|notes| format!("<p>{notes}</p>"))
        .unwrap_or_default();
    format!(
        "<html><body>\
         <h2>Request {number} {event}</h2>\
         <p>{title}</p>\
         {detail}\
         </body></html>",
        number = request.request_number.as_deref().unwrap_or("-"),
        event = event.as_str(),
        title = request.title,
    )
}
