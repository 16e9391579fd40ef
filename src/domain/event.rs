/// Per-event settings: where its routes live, how tickets look, which sheet
/// holds its registrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventConfig {
    /// Short identifier, also the CSV file stem for file-backed rows.
    pub slug: String,
    /// Human readable name used in emails.
    pub title: String,
    pub ticket_prefix: String,
    /// Route prefix, e.g. `/api` or `/api/evolve`.
    pub mount_path: String,
    pub sheet_id: Option<String>,
}

impl EventConfig {
    pub fn callback_url(&self, backend_url: &str) -> String {
        format!("{}{}/payment-callback", backend_url.trim_end_matches('/'), self.mount_path)
    }

    pub fn redirect_url(&self, backend_url: &str) -> String {
        format!("{}{}/verify", backend_url.trim_end_matches('/'), self.mount_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_follow_mount_path() {
        let event = EventConfig {
            slug: "evolve".to_string(),
            title: "Evolve".to_string(),
            ticket_prefix: "EVOLVE".to_string(),
            mount_path: "/api/evolve".to_string(),
            sheet_id: None,
        };
        assert_eq!(
            event.callback_url("https://api.example.com/"),
            "https://api.example.com/api/evolve/payment-callback"
        );
        assert_eq!(
            event.redirect_url("https://api.example.com"),
            "https://api.example.com/api/evolve/verify"
        );
    }
}
