//! Domain error types.

/// Order execution failure taxonomy.
///
/// `Timeout`, `Connection`, HTTP 429 and HTTP 5xx are retryable. Other HTTP
/// 4xx statuses mean bad parameters and `Business` means the broker accepted
/// the call but rejected the order terms; neither is ever retried.
/// `Validation` is raised before any network call is made.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error("order request timed out")]
    Timeout,

    #[error("connection failure: {reason}")]
    Connection { reason: String },

    #[error("broker returned HTTP {status}")]
    Http { status: u16 },

    #[error("broker rejected order ({code}): {message}")]
    Business { code: String, message: String },

    #[error("invalid order parameters: {reason}")]
    Validation { reason: String },
}

impl ExecError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecError::Timeout | ExecError::Connection { .. } => true,
            ExecError::Http { status } => *status == 429 || *status >= 500,
            ExecError::Business { .. } | ExecError::Validation { .. } => false,
        }
    }
}

/// Top-level error type for helmtrader.
#[derive(Debug, thiserror::Error)]
pub enum HelmtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data error for {asset_id}: {reason}")]
    MarketData { asset_id: String, reason: String },

    #[error("insufficient data for {asset_id}: have {candles} candles, need {minimum}")]
    InsufficientData {
        asset_id: String,
        candles: usize,
        minimum: usize,
    },

    #[error("journal error at {path}: {reason}")]
    Journal { path: String, reason: String },

    #[error(transparent)]
    Execution(#[from] ExecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&HelmtraderError> for std::process::ExitCode {
    fn from(err: &HelmtraderError) -> Self {
        let code: u8 = match err {
            HelmtraderError::Io(_) => 1,
            HelmtraderError::ConfigParse { .. }
            | HelmtraderError::ConfigMissing { .. }
            | HelmtraderError::ConfigInvalid { .. } => 2,
            HelmtraderError::Journal { .. } => 3,
            HelmtraderError::Execution(_) => 4,
            HelmtraderError::MarketData { .. } | HelmtraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
