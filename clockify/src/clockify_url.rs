const DEFAULT_BASE_URL: &str = "https://api.clockify.me/api/v1";

#[derive(Debug, Clone)]
pub struct ClockifyUrl(String);

impl AsRef<str> for ClockifyUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ClockifyUrl {
    /// Creates a URL pointing at the public Clockify REST API.
    pub fn new() -> Self {
        Self(DEFAULT_BASE_URL.to_string())
    }

    /// Creates a URL with a custom base, e.g. a mock server in tests.
    pub fn with_base(base: impl Into<String>) -> Self {
        Self(base.into().trim_end_matches('/').to_string())
    }

    /// Append the given path to the URL.
    pub fn append_path(&self, path: &str) -> Self {
        let trimmed_url = self.0.trim_end_matches('/');
        let trimmed_path = path.trim_start_matches('/');
        Self(format!("{}/{}", trimmed_url, trimmed_path))
    }

    /// Append a query parameter, percent-encoding the value.
    pub fn with_param(&self, key: &str, value: &str) -> Self {
        let encoded: String = value
            .bytes()
            .flat_map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    vec![b as char]
                }
                _ => format!("%{:02X}", b).chars().collect(),
            })
            .collect();

        if self.0.contains('?') {
            Self(format!("{}&{}={}", self.0, key, encoded))
        } else {
            Self(format!("{}?{}={}", self.0, key, encoded))
        }
    }
}

impl Default for ClockifyUrl {
    fn default() -> Self {
        Self::new()
    }
}
