pub mod api_response;
pub mod mailer;
pub mod notification;
