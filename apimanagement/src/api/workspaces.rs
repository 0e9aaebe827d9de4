//! Workspaces

use super::client::Client;
use super::common::{ArmResource, QueryParams};
use super::error::ApiError;
use super::ids::WorkspaceId;
use serde::{Deserialize, Serialize};

pub type WorkspaceContract = ArmResource<WorkspaceProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceProperties {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct WorkspacesApi<'a> {
    client: &'a Client,
}

impl<'a> WorkspacesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &WorkspaceId) -> Result<WorkspaceContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn create_or_update(
        &self,
        id: &WorkspaceId,
        workspace: &WorkspaceContract,
    ) -> Result<Option<WorkspaceContract>, ApiError> {
        self.client.put(&id.to_string(), workspace).await
    }

    pub async fn delete(&self, id: &WorkspaceId) -> Result<(), ApiError> {
        self.client
            .delete_with_if_match(&id.to_string(), &QueryParams::new(), "*")
            .await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn delete_missing_workspace_reports_not_found() {
        let mut server = Server::new_async().await;
        let id = WorkspaceId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "ws1");
        let _m = server
            .mock("DELETE", id.to_string().as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"Workspace not found."}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.workspaces().delete(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
