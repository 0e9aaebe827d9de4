//! Calls the protocol 6 service the way Terraform core does: msgpack
//! payloads in, diagnostics and msgpack states out.

#![allow(clippy::disallowed_methods)]

use apimanagement::ApiManagementProvider;
use mockito::{Matcher, Server};
use tfplug::grpc::GrpcProviderServer;
use tfplug::proto::{self, ProviderService};
use tfplug::types::{AttributePath, Dynamic};
use tfplug::ObjectBuilder;
use tonic::{Code, Request};

const SUBSCRIPTION: &str = "11111111-1111-1111-1111-111111111111";

fn named_value_path() -> String {
    format!(
        "/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1/namedValues/nv1",
        SUBSCRIPTION
    )
}

fn service() -> GrpcProviderServer<ApiManagementProvider> {
    GrpcProviderServer::new(ApiManagementProvider::new())
}

async fn configure(service: &GrpcProviderServer<ApiManagementProvider>, endpoint: String) {
    let config = ObjectBuilder::new()
        .string("subscription_id", SUBSCRIPTION)
        .string("access_token", "test-token")
        .string("resource_manager_endpoint", endpoint)
        .into_value();
    let response = service
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: Some(proto::encode_value(&config).unwrap()),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
}

fn named_value_config() -> proto::DynamicValue {
    let config = ObjectBuilder::new()
        .string("name", "nv1")
        .string("resource_group_name", "rg1")
        .string("api_management_name", "apim1")
        .string("display_name", "My-Value")
        .string("value", "plain")
        .into_value();
    proto::encode_value(&config).unwrap()
}

#[tokio::test]
async fn metadata_and_schema_list_every_type() {
    let service = service();

    let metadata = service
        .get_metadata(Request::new(proto::get_metadata::Request {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(metadata.resources.len(), 13);
    assert_eq!(metadata.data_sources.len(), 3);
    assert!(metadata
        .resources
        .iter()
        .any(|r| r.type_name == "azurerm_api_management_named_value"));

    let schema = service
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();
    let block = schema.resource_schemas["azurerm_api_management"]
        .block
        .as_ref()
        .unwrap();
    let sku = block.attributes.iter().find(|a| a.name == "sku_name").unwrap();
    assert!(sku.required);
    assert_eq!(sku.r#type, br#""string""#.to_vec());

    let provider = schema.provider.unwrap().block.unwrap();
    assert!(provider.block_types.iter().any(|b| b.type_name == "features"));
}

#[tokio::test]
async fn plan_marks_computed_id_unknown() {
    let service = service();

    let response = service
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "azurerm_api_management_named_value".to_string(),
            prior_state: None,
            proposed_new_state: Some(named_value_config()),
            config: Some(named_value_config()),
            prior_private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let planned = proto::decode_value(response.planned_state.as_ref()).unwrap();
    assert!(matches!(planned.get(&AttributePath::new("id")), Some(Dynamic::Unknown)));
    assert_eq!(planned.get_string(&AttributePath::new("value")).unwrap(), "plain");
}

#[tokio::test(flavor = "multi_thread")]
async fn read_resource_round_trips_msgpack_state() {
    let mut server = Server::new_async().await;
    let service = service();
    configure(&service, server.url()).await;

    let _get = server
        .mock("GET", named_value_path().as_str())
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_body(r#"{"properties":{"displayName":"My-Value","value":"rotated","secret":false}}"#)
        .create_async()
        .await;

    let state = ObjectBuilder::new().string("id", named_value_path()).into_value();
    let response = service
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "azurerm_api_management_named_value".to_string(),
            current_state: Some(proto::encode_value(&state).unwrap()),
            private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let new_state = proto::decode_value(response.new_state.as_ref()).unwrap();
    assert_eq!(new_state.get_string(&AttributePath::new("value")).unwrap(), "rotated");
    assert_eq!(new_state.get_string(&AttributePath::new("name")).unwrap(), "nv1");
}

#[tokio::test]
async fn import_of_wrong_id_returns_error_diagnostic() {
    let service = service();

    let response = service
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "azurerm_api_management_named_value".to_string(),
            id: "/subscriptions/x/resourceGroups/rg1".to_string(),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.imported_resources.is_empty());
    assert_eq!(
        response.diagnostics[0].severity,
        proto::diagnostic::Severity::Error as i32
    );
}

#[tokio::test]
async fn upgrade_drops_attributes_no_longer_in_schema() {
    let service = service();
    let raw = format!(
        r#"{{"id":"{}","name":"nv1","legacy_flag":true}}"#,
        named_value_path()
    );

    let response = service
        .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
            type_name: "azurerm_api_management_named_value".to_string(),
            version: 0,
            raw_state: Some(proto::RawState {
                json: raw.into_bytes(),
                flatmap: Default::default(),
            }),
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let upgraded = proto::decode_value(response.upgraded_state.as_ref()).unwrap();
    assert_eq!(upgraded.get_string(&AttributePath::new("name")).unwrap(), "nv1");
    assert!(upgraded.get(&AttributePath::new("legacy_flag")).is_none());
}

#[tokio::test]
async fn undecodable_payload_is_invalid_argument() {
    let service = service();

    let status = service
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "azurerm_api_management_named_value".to_string(),
            config: Some(proto::DynamicValue {
                msgpack: vec![0xc1],
                json: vec![],
            }),
            client_capabilities: None,
        }))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("config"));
}

#[tokio::test]
async fn stop_reports_no_error() {
    let response = service()
        .stop_provider(Request::new(proto::stop_provider::Request {}))
        .await
        .unwrap()
        .into_inner();
    assert!(response.error.is_empty());
}
