//! Tencent Cloud CVM client
//!
//! Implements `CloudProvider` with `DescribeRegions` and a paginated
//! `DescribeInstances`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use cloudsync_core::{CloudCredential, CloudInstance, CloudProvider, Region};

use crate::error::{Error, Result};
use crate::signing::{self, SigningRequest, CONTENT_TYPE};

/// API version of the CVM service
pub const CVM_API_VERSION: &str = "2017-03-12";

/// Page size for `DescribeInstances`
pub const PAGE_LIMIT: usize = 100;

const SERVICE: &str = "cvm";

/// Client configuration
#[derive(Debug, Clone)]
pub struct TencentConfig {
    /// API endpoint
    pub endpoint: String,
    /// Region sent with `DescribeRegions`
    pub bootstrap_region: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for TencentConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cvm.tencentcloudapi.com".to_string(),
            bootstrap_region: "ap-guangzhou".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TencentConfig {
    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the bootstrap region
    pub fn with_bootstrap_region(mut self, region: impl Into<String>) -> Self {
        self.bootstrap_region = region.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegionSet {
    region_set: Vec<RegionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegionInfo {
    region: String,
    #[serde(default)]
    region_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstancePage {
    total_count: usize,
    #[serde(default)]
    instance_set: Vec<InstanceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInfo {
    instance_id: String,
    #[serde(default)]
    os_name: String,
    private_ip_addresses: Option<Vec<String>>,
    public_ip_addresses: Option<Vec<String>>,
}

impl From<InstanceInfo> for CloudInstance {
    fn from(info: InstanceInfo) -> Self {
        Self {
            instance_id: info.instance_id,
            os_name: info.os_name,
            private_ips: info.private_ip_addresses.unwrap_or_default(),
            public_ips: info.public_ip_addresses.unwrap_or_default(),
        }
    }
}

/// Unwrap `{"Response": {...}}`, mapping the error envelope to `Error::Api`
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let mut value: Value = serde_json::from_str(body)
        .map_err(|e| Error::InvalidResponse(format!("not JSON: {}", e)))?;
    let response = value
        .get_mut("Response")
        .map(Value::take)
        .ok_or_else(|| Error::InvalidResponse("missing Response".to_string()))?;

    if let Some(error) = response.get("Error") {
        let error: ApiError = serde_json::from_value(error.clone())
            .map_err(|e| Error::InvalidResponse(format!("malformed Error: {}", e)))?;
        return Err(Error::Api {
            code: error.code,
            message: error.message,
        });
    }

    serde_json::from_value(response).map_err(|e| Error::InvalidResponse(e.to_string()))
}

/// CVM API client
pub struct TencentCvmClient {
    client: Client,
    config: TencentConfig,
    url: Url,
    host: String,
}

impl TencentCvmClient {
    /// Create a new client
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a URL with a host or the HTTP
    /// client cannot be created.
    pub fn new(config: TencentConfig) -> Result<Self> {
        let url = Url::parse(&config.endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {}: {}", config.endpoint, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("endpoint has no host: {}", config.endpoint)))?
            .to_string();
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            url,
            host,
        })
    }

    #[instrument(skip(self, credential, payload))]
    async fn call<T: DeserializeOwned>(
        &self,
        credential: &CloudCredential,
        action: &str,
        region: &str,
        payload: &Value,
    ) -> Result<T> {
        let body = payload.to_string();
        let now = Utc::now();
        let authorization = signing::authorization(&SigningRequest {
            secret_id: &credential.secret_id,
            secret_key: credential.secret_key.expose_secret(),
            service: SERVICE,
            host: &self.host,
            payload: &body,
            timestamp: now,
        })?;

        let response = self
            .client
            .post(self.url.clone())
            .header("Authorization", authorization)
            .header("Content-Type", CONTENT_TYPE)
            .header("Host", &self.host)
            .header("X-TC-Action", action)
            .header("X-TC-Timestamp", now.timestamp().to_string())
            .header("X-TC-Version", CVM_API_VERSION)
            .header("X-TC-Region", region)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(action, status = status.as_u16(), "Tencent API response");
        parse_response(&text)
    }

    async fn describe_instances(
        &self,
        credential: &CloudCredential,
        region: &str,
    ) -> Result<Vec<CloudInstance>> {
        let mut instances = Vec::new();
        let mut offset = 0;

        loop {
            let page: InstancePage = self
                .call(
                    credential,
                    "DescribeInstances",
                    region,
                    &json!({ "Offset": offset, "Limit": PAGE_LIMIT }),
                )
                .await?;
            let fetched = page.instance_set.len();
            instances.extend(page.instance_set.into_iter().map(CloudInstance::from));
            offset += fetched;

            if fetched == 0 || offset >= page.total_count {
                break;
            }
        }

        Ok(instances)
    }

    /// Configuration in use
    pub fn config(&self) -> &TencentConfig {
        &self.config
    }
}

#[async_trait]
impl CloudProvider for TencentCvmClient {
    async fn list_regions(
        &self,
        credential: &CloudCredential,
    ) -> cloudsync_core::Result<Vec<Region>> {
        let set: RegionSet = self
            .call(
                credential,
                "DescribeRegions",
                &self.config.bootstrap_region,
                &json!({}),
            )
            .await?;
        Ok(set
            .region_set
            .into_iter()
            .map(|r| Region {
                region: r.region,
                region_name: r.region_name,
            })
            .collect())
    }

    async fn list_instances(
        &self,
        credential: &CloudCredential,
        region: &str,
    ) -> cloudsync_core::Result<Vec<CloudInstance>> {
        Ok(self.describe_instances(credential, region).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regions() {
        let set: RegionSet = parse_response(
            r#"{"Response": {"TotalCount": 2, "RegionSet": [
                {"Region": "ap-guangzhou", "RegionName": "South China(Guangzhou)", "RegionState": "AVAILABLE"},
                {"Region": "ap-shanghai", "RegionName": "East China(Shanghai)", "RegionState": "AVAILABLE"}
            ], "RequestId": "r-1"}}"#,
        )
        .unwrap();

        assert_eq!(set.region_set.len(), 2);
        assert_eq!(set.region_set[1].region, "ap-shanghai");
    }

    #[test]
    fn test_parse_instances_with_null_public_ips() {
        let page: InstancePage = parse_response(
            r#"{"Response": {"TotalCount": 1, "InstanceSet": [{
                "InstanceId": "ins-abc",
                "OsName": "CentOS 7.6 64bit",
                "PrivateIpAddresses": ["10.0.0.5"],
                "PublicIpAddresses": null
            }], "RequestId": "r-2"}}"#,
        )
        .unwrap();

        let instance: CloudInstance = page.instance_set.into_iter().next().unwrap().into();
        assert_eq!(instance.instance_id, "ins-abc");
        assert_eq!(instance.private_ips, vec!["10.0.0.5"]);
        assert!(instance.public_ips.is_empty());
        assert_eq!(page.total_count, 1);
    }

    #[test]
    fn test_parse_error_envelope() {
        let err = parse_response::<RegionSet>(
            r#"{"Response": {"Error": {"Code": "AuthFailure.SecretIdNotFound", "Message": "The SecretId is not found"}, "RequestId": "r-3"}}"#,
        )
        .unwrap_err();

        match err {
            Error::Api { code, .. } => assert_eq!(code, "AuthFailure.SecretIdNotFound"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed_bodies() {
        assert!(matches!(
            parse_response::<RegionSet>("<html>"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response::<RegionSet>(r#"{"data": {}}"#),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_client_rejects_bad_endpoint() {
        let err = TencentCvmClient::new(TencentConfig::default().with_endpoint("not a url"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        let client = TencentCvmClient::new(TencentConfig::default()).unwrap();
        assert_eq!(client.host, "cvm.tencentcloudapi.com");
    }

    #[test]
    fn test_error_maps_to_core_cloud_error() {
        let core: cloudsync_core::Error = Error::Api {
            code: "LimitExceeded".to_string(),
            message: "too many requests".to_string(),
        }
        .into();
        assert!(matches!(core, cloudsync_core::Error::Cloud(msg) if msg.contains("LimitExceeded")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = TencentCvmClient::new(
            TencentConfig::default()
                .with_endpoint("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let err = client
            .list_regions(&CloudCredential::new("id", "key"))
            .await
            .unwrap_err();
        assert!(matches!(err, cloudsync_core::Error::Cloud(_)));
    }
}
