//! Settings for building S3 clients.

use aws_sdk_s3::Client;

const DEFAULT_REGION: &str = "us-east-1";

/// Configuration for creating an S3 client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Region override; falls back to the AWS config chain, then us-east-1
    pub region: Option<String>,
    /// Static access key; used only together with `secret_key`
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Optional custom endpoint URL
    pub endpoint_url: Option<String>,
    /// Whether to use path-style addressing (required for some S3-compatible services)
    pub force_path_style: bool,
    /// Whether to skip credentials (for anonymous/public access)
    pub anonymous: bool,
}

impl Settings {
    /// Start from default settings
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Read settings from `S3FS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| {
            lookup(name)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Settings {
            region: non_empty("S3FS_REGION"),
            access_key: non_empty("S3FS_ACCESS_KEY"),
            secret_key: non_empty("S3FS_SECRET_KEY"),
            endpoint_url: non_empty("S3FS_ENDPOINT_URL"),
            force_path_style: flag("S3FS_FORCE_PATH_STYLE"),
            anonymous: flag("S3FS_ANONYMOUS"),
        }
    }

    /// Static credentials, when both halves are configured
    fn static_credentials(&self) -> Option<aws_sdk_s3::config::Credentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some(aws_sdk_s3::config::Credentials::new(
                access,
                secret,
                None,
                None,
                "s3fs-static-credentials",
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Set the AWS region
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.settings.region = Some(region.into());
        self
    }

    /// Use static credentials instead of the default provider chain
    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.settings.access_key = Some(access_key.into());
        self.settings.secret_key = Some(secret_key.into());
        self
    }

    /// Point the client at a custom endpoint such as LocalStack or MinIO
    pub fn endpoint_url(mut self, endpoint: impl Into<String>) -> Self {
        self.settings.endpoint_url = Some(endpoint.into());
        self
    }

    /// Address buckets as `endpoint/bucket` rather than `bucket.endpoint`
    pub fn force_path_style(mut self, enabled: bool) -> Self {
        self.settings.force_path_style = enabled;
        self
    }

    /// Send unsigned requests, for public buckets
    pub fn anonymous(mut self, enabled: bool) -> Self {
        self.settings.anonymous = enabled;
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

/// Build an SDK client from settings
pub async fn create_s3_client(settings: &Settings) -> Client {
    let mut sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if settings.anonymous {
        sdk_config = sdk_config.no_credentials();
    } else if let Some(credentials) = settings.static_credentials() {
        sdk_config = sdk_config.credentials_provider(credentials);
    }

    let base_config = sdk_config.load().await;

    let region = settings
        .region
        .clone()
        .or_else(|| base_config.region().map(|r| r.as_ref().to_string()))
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&base_config)
        .region(aws_sdk_s3::config::Region::new(region));

    if let Some(endpoint) = &settings.endpoint_url {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }

    if settings.force_path_style {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    Client::from_conf(s3_config_builder.build())
}
