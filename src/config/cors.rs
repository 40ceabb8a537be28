use crate::cors::AllowList;

/// Origin used when `FRONTEND_URLS` is not set
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:5173";

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Browser origins allowed to make credentialed cross-origin requests
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Split a comma-separated origin list, trimming each entry.
    pub fn parse_origins(raw: Option<&str>) -> Vec<String> {
        let origins: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if origins.is_empty() {
            vec![DEFAULT_FRONTEND_ORIGIN.to_string()]
        } else {
            origins
        }
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.allowed_origins.clone())
    }

    /// Validate CORS configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Err(
                "FRONTEND_URLS cannot contain '*' when credentials are allowed".to_string(),
            );
        }

        Ok(())
    }
}
