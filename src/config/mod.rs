use std::env;

/// Runtime configuration for the HubLib API
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JWT signing secret (default: "secret", override in production)
    pub jwt_secret: String,

    /// Lifetime of issued tokens in hours (default: 24)
    pub jwt_ttl_hours: i64,

    /// Allowed CORS origins (comma separated, "*" for any)
    pub allowed_origins: Vec<String>,

    /// Usernames that receive the admin role when they register
    pub admin_usernames: Vec<String>,

    /// Page size used when a listing does not ask for one (default: 20)
    pub default_page_size: u64,

    /// Upper bound for requested page sizes (default: 100)
    pub max_page_size: u64,

    /// Time-to-live of cached listings in seconds (default: 60)
    pub cache_ttl_secs: u64,

    /// Re-read attempts when a vote races with another vote (default: 3)
    pub vote_retry_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            jwt_ttl_hours: 24,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
            admin_usernames: Vec::new(),
            default_page_size: 20,
            max_page_size: 100,
            cache_ttl_secs: 60,
            vote_retry_attempts: 3,
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            jwt_ttl_hours: env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.jwt_ttl_hours),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or(default.allowed_origins),

            admin_usernames: env::var("ADMIN_USERNAMES")
                .map(|v| parse_list(&v))
                .unwrap_or(default.admin_usernames),

            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.default_page_size),

            max_page_size: env::var("MAX_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_page_size),

            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.cache_ttl_secs),

            vote_retry_attempts: env::var("VOTE_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(default.vote_retry_attempts),
        }
    }

    /// Create config for development and tests (fixed secret, "admin" is an admin)
    pub fn development() -> Self {
        Self {
            jwt_secret: "development_secret".to_string(),
            allowed_origins: vec!["*".to_string()],
            admin_usernames: vec!["admin".to_string()],
            ..Self::default()
        }
    }

    pub fn is_admin_username(&self, username: &str) -> bool {
        self.admin_usernames.iter().any(|u| u == username)
    }

    /// Clamp a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}
