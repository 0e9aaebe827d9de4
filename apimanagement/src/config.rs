//! Compile-time constants: API version, endpoints, service custom property
//! keys, default timeouts and portal placeholders

use tfplug::Timeouts;

pub const API_VERSION: &str = "2024-05-01";

pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

pub const ENV_SUBSCRIPTION_ID: &str = "ARM_SUBSCRIPTION_ID";
pub const ENV_TENANT_ID: &str = "ARM_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "ARM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ARM_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "ARM_ACCESS_TOKEN";
pub const ENV_RESOURCE_MANAGER_ENDPOINT: &str = "ARM_RESOURCE_MANAGER_ENDPOINT";
pub const ENV_AUTHORITY_HOST: &str = "ARM_AUTHORITY_HOST";

pub const SERVICE_TIMEOUTS: Timeouts = Timeouts::minutes(180, 5, 180, 180);
pub const CHILD_RESOURCE_TIMEOUTS: Timeouts = Timeouts::minutes(30, 5, 30, 30);
pub const DATA_SOURCE_READ_TIMEOUT_MINUTES: u64 = 5;

/// The API rejects an empty delegation validation key or URL even when
/// delegation is disabled.
pub const DELEGATION_VALIDATION_KEY_PLACEHOLDER: &str = "cGxhY2Vob2xkZXIxCg==";
pub const DELEGATION_URL_PLACEHOLDER: &str = "https://www.placeholder.com";

pub const HTTP2_PROTOCOL: &str = "Microsoft.WindowsAzure.ApiManagement.Gateway.Protocols.Server.Http2";

/// A `security` flag and the service custom property backing it.
#[derive(Debug, Clone, Copy)]
pub struct SecurityProperty {
    pub attribute: &'static str,
    pub key: &'static str,
    pub allowed_on_consumption: bool,
}

const fn security(
    attribute: &'static str,
    key: &'static str,
    allowed_on_consumption: bool,
) -> SecurityProperty {
    SecurityProperty {
        attribute,
        key,
        allowed_on_consumption,
    }
}

pub const SECURITY_PROPERTIES: [SecurityProperty; 17] = [
    security(
        "backend_ssl30_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Backend.Protocols.Ssl30",
        true,
    ),
    security(
        "backend_tls10_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Backend.Protocols.Tls10",
        true,
    ),
    security(
        "backend_tls11_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Backend.Protocols.Tls11",
        true,
    ),
    security(
        "frontend_tls10_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Protocols.Tls10",
        true,
    ),
    security(
        "frontend_tls11_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Protocols.Tls11",
        true,
    ),
    security(
        "frontend_ssl30_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Protocols.Ssl30",
        false,
    ),
    security(
        "triple_des_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TripleDes168",
        false,
    ),
    security(
        "tls_ecdhe_ecdsa_with_aes256_cbc_sha_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        false,
    ),
    security(
        "tls_ecdhe_ecdsa_with_aes128_cbc_sha_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        false,
    ),
    security(
        "tls_ecdhe_rsa_with_aes256_cbc_sha_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        false,
    ),
    security(
        "tls_ecdhe_rsa_with_aes128_cbc_sha_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        false,
    ),
    security(
        "tls_rsa_with_aes128_gcm_sha256_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_RSA_WITH_AES_128_GCM_SHA256",
        false,
    ),
    security(
        "tls_rsa_with_aes256_gcm_sha384_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_RSA_WITH_AES_256_GCM_SHA384",
        false,
    ),
    security(
        "tls_rsa_with_aes256_cbc_sha256_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_RSA_WITH_AES_256_CBC_SHA256",
        false,
    ),
    security(
        "tls_rsa_with_aes128_cbc_sha256_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_RSA_WITH_AES_128_CBC_SHA256",
        false,
    ),
    security(
        "tls_rsa_with_aes256_cbc_sha_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_RSA_WITH_AES_256_CBC_SHA",
        false,
    ),
    security(
        "tls_rsa_with_aes128_cbc_sha_ciphers_enabled",
        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Ciphers.TLS_RSA_WITH_AES_128_CBC_SHA",
        false,
    ),
];

/// `features { api_management { ... } }`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiManagementFeatures {
    pub purge_soft_delete_on_destroy: bool,
    pub recover_soft_deleted: bool,
}

impl Default for ApiManagementFeatures {
    fn default() -> Self {
        Self {
            purge_soft_delete_on_destroy: true,
            recover_soft_deleted: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn security_attributes_and_keys_are_unique() {
        let attributes: HashSet<_> = SECURITY_PROPERTIES.iter().map(|p| p.attribute).collect();
        let keys: HashSet<_> = SECURITY_PROPERTIES.iter().map(|p| p.key).collect();
        assert_eq!(attributes.len(), SECURITY_PROPERTIES.len());
        assert_eq!(keys.len(), SECURITY_PROPERTIES.len());
    }

    #[test]
    fn consumption_only_allows_protocol_toggles() {
        let allowed: Vec<_> = SECURITY_PROPERTIES
            .iter()
            .filter(|p| p.allowed_on_consumption)
            .map(|p| p.attribute)
            .collect();
        assert_eq!(
            allowed,
            vec![
                "backend_ssl30_enabled",
                "backend_tls10_enabled",
                "backend_tls11_enabled",
                "frontend_tls10_enabled",
                "frontend_tls11_enabled"
            ]
        );
    }

    #[test]
    fn feature_defaults() {
        let features = ApiManagementFeatures::default();
        assert!(features.purge_soft_delete_on_destroy);
        assert!(features.recover_soft_deleted);
        assert_eq!(SERVICE_TIMEOUTS.create.as_secs(), 3 * 60 * 60);
        assert_eq!(CHILD_RESOURCE_TIMEOUTS.read.as_secs(), 5 * 60);
    }
}
