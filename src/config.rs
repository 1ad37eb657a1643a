use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// ✅ Global Config stored in `OnceLock`
static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub auth_disabled: bool,
    /// Secret mixed into email-approval link tokens.
    pub approval_link_secret: String,
    /// Default escalation threshold; per-type overrides live in `approval_policies`.
    pub escalation_threshold: BigDecimal,
    /// Base URL embedded in approval links sent by email.
    pub public_base_url: String,
    pub mail_gateway_url: Option<String>,
    pub request_number_prefix: String,
}

impl Config {
    /// ✅ Load environment variables and set defaults
    pub fn from_env() -> Self {
        dotenv().ok(); // Load .env only once

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            auth_disabled: env::var("AUTH_DISABLED").unwrap_or_else(|_| "false".to_string())
                == "true",
            approval_link_secret: env::var("APPROVAL_LINK_SECRET")
                .expect("APPROVAL_LINK_SECRET must be set"),
            escalation_threshold: env::var("APPROVAL_ESCALATION_THRESHOLD")
                .ok()
                .and_then(|raw| BigDecimal::from_str(&raw).ok())
                .unwrap_or_else(|| BigDecimal::from(5000)),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mail_gateway_url: env::var("MAIL_GATEWAY_URL").ok(),
            request_number_prefix: env::var("REQUEST_NUMBER_PREFIX")
                .unwrap_or_else(|_| "REQ".to_string()),
        }
    }

    /// ✅ Initialize the global config
    pub fn init() {
        CONFIG
            .set(Arc::new(Self::from_env()))
            .expect("Config already initialized");
    }

    /// ✅ Safe access to Config
    pub fn get() -> Arc<Config> {
        CONFIG.get().expect("Config not initialized").clone()
    }

    /// ✅ Check if authentication is disabled
    pub fn auth_disabled() -> bool {
        Config::get().auth_disabled
    }
}
