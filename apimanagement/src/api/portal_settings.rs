//! Developer portal settings: sign-in, sign-up, delegation and tenant access

use super::client::Client;
use super::common::ArmResource;
use super::error::ApiError;
use super::ids::ServiceId;
use serde::{Deserialize, Serialize};

pub type SignInSettings = ArmResource<SignInProperties>;
pub type SignUpSettings = ArmResource<SignUpProperties>;
pub type DelegationSettings = ArmResource<DelegationProperties>;
pub type TenantAccess = ArmResource<TenantAccessProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignInProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignUpProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<TermsOfService>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TermsOfService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DelegationProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<DelegationToggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_registration: Option<DelegationToggle>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegationToggle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DelegationSecrets {
    pub validation_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantAccessProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TenantAccessUpdate {
    pub properties: TenantAccessUpdateProperties,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TenantAccessUpdateProperties {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantAccessSecrets {
    pub id: Option<String>,
    pub principal_id: Option<String>,
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
    pub enabled: Option<bool>,
}

pub struct PortalSettingsApi<'a> {
    client: &'a Client,
}

impl<'a> PortalSettingsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn settings_path(service: &ServiceId, name: &str) -> String {
        format!("{}/portalsettings/{}", service, name)
    }

    fn tenant_access_path(service: &ServiceId) -> String {
        format!("{}/tenant/access", service)
    }

    pub async fn get_sign_in(&self, service: &ServiceId) -> Result<SignInSettings, ApiError> {
        self.client
            .get(&Self::settings_path(service, "signin"))
            .await
    }

    pub async fn put_sign_in(
        &self,
        service: &ServiceId,
        settings: &SignInSettings,
    ) -> Result<Option<SignInSettings>, ApiError> {
        self.client
            .put_with_if_match(&Self::settings_path(service, "signin"), settings, "*")
            .await
    }

    pub async fn get_sign_up(&self, service: &ServiceId) -> Result<SignUpSettings, ApiError> {
        self.client
            .get(&Self::settings_path(service, "signup"))
            .await
    }

    pub async fn put_sign_up(
        &self,
        service: &ServiceId,
        settings: &SignUpSettings,
    ) -> Result<Option<SignUpSettings>, ApiError> {
        self.client
            .put_with_if_match(&Self::settings_path(service, "signup"), settings, "*")
            .await
    }

    pub async fn get_delegation(
        &self,
        service: &ServiceId,
    ) -> Result<DelegationSettings, ApiError> {
        self.client
            .get(&Self::settings_path(service, "delegation"))
            .await
    }

    pub async fn put_delegation(
        &self,
        service: &ServiceId,
        settings: &DelegationSettings,
    ) -> Result<Option<DelegationSettings>, ApiError> {
        self.client
            .put_with_if_match(&Self::settings_path(service, "delegation"), settings, "*")
            .await
    }

    /// The validation key is write-only on GET and only returned here.
    pub async fn list_delegation_secrets(
        &self,
        service: &ServiceId,
    ) -> Result<DelegationSecrets, ApiError> {
        let path = format!("{}/listSecrets", Self::settings_path(service, "delegation"));
        self.client.post_action(&path).await
    }

    pub async fn get_tenant_access(&self, service: &ServiceId) -> Result<TenantAccess, ApiError> {
        self.client.get(&Self::tenant_access_path(service)).await
    }

    pub async fn update_tenant_access(
        &self,
        service: &ServiceId,
        enabled: bool,
    ) -> Result<Option<TenantAccess>, ApiError> {
        let body = TenantAccessUpdate {
            properties: TenantAccessUpdateProperties { enabled },
        };
        self.client
            .patch_with_if_match(&Self::tenant_access_path(service), &body, "*")
            .await
    }

    pub async fn list_tenant_access_secrets(
        &self,
        service: &ServiceId,
    ) -> Result<TenantAccessSecrets, ApiError> {
        let path = format!("{}/listSecrets", Self::tenant_access_path(service));
        self.client.post_action(&path).await
    }
}
