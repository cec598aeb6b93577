use webpa_core::Encoding;

pub const DEVICE_NAME_HEADER: &str = "x-webpa-device-name";
pub const CONVEY_HEADER: &str = "x-webpa-convey";

/// Server-level configuration for the fact pipeline.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unique identifier for this server node, recorded on every request span.
    pub node_id: String,
    /// Header carrying the device name.
    pub device_name_header: String,
    /// Header carrying the base64-encoded convey payload.
    pub convey_header: String,
    /// Base64 alphabet of the convey header.
    pub convey_encoding: Encoding,
    /// Reject requests without an `Authorization` header.
    pub require_token: bool,
    /// Accepted `Basic` credentials (base64 `user:password`). Empty accepts
    /// any well-formed token.
    pub basic_auth: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            device_name_header: DEVICE_NAME_HEADER.to_string(),
            convey_header: CONVEY_HEADER.to_string(),
            convey_encoding: Encoding::Standard,
            require_token: false,
            basic_auth: Vec::new(),
        }
    }
}
