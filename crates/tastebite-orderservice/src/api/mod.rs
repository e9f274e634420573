pub mod sessions;

pub struct ApiUrls;

impl ApiUrls {
    pub fn get_session_service_url() -> String {
        std::env::var("SESSION_SERVICE_URL")
            .unwrap_or("http://localhost:3000/session-service".to_string())
    }
}
