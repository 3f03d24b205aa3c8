//! Cloud provider interface
//!
//! A provider lists regions and the instances in each region for a given
//! credential. `collect_cloud_hosts` flattens that into host descriptors.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::host::CloudHost;
use crate::task::CloudCredential;

/// A cloud region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Region code (e.g. `ap-guangzhou`)
    pub region: String,
    /// Display name
    pub region_name: String,
}

impl Region {
    /// Create a region with its code as display name
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            region_name: region.clone(),
            region,
        }
    }
}

/// A compute instance as listed by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudInstance {
    /// Provider instance id
    pub instance_id: String,
    /// Operating system name
    pub os_name: String,
    /// Private addresses, primary first
    pub private_ips: Vec<String>,
    /// Public addresses, primary first
    pub public_ips: Vec<String>,
}

/// Credential-scoped inventory listing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Regions visible to the credential
    async fn list_regions(&self, credential: &CloudCredential) -> Result<Vec<Region>>;

    /// Instances in one region
    async fn list_instances(
        &self,
        credential: &CloudCredential,
        region: &str,
    ) -> Result<Vec<CloudInstance>>;
}

/// Every instance with a private address, as host descriptors.
///
/// The first private address becomes the inner IP, the first public address
/// the outer IP. Any listing failure aborts the whole collection.
pub async fn collect_cloud_hosts(
    provider: &dyn CloudProvider,
    credential: &CloudCredential,
) -> Result<Vec<CloudHost>> {
    let regions = provider.list_regions(credential).await?;
    let mut hosts = Vec::new();

    for region in regions {
        let instances = provider.list_instances(credential, &region.region).await?;
        debug!(region = %region.region, count = instances.len(), "Listed cloud instances");

        for instance in instances {
            let Some(inner_ip) = instance.private_ips.first() else {
                debug!(instance = %instance.instance_id, "Skipping instance without private address");
                continue;
            };
            hosts.push(CloudHost::new(
                inner_ip.clone(),
                instance.public_ips.first().cloned().unwrap_or_default(),
                instance.os_name.clone(),
                region.region.clone(),
            ));
        }
    }

    Ok(hosts)
}

/// Provider serving a fixed inventory, keyed by region
#[derive(Default)]
pub struct InMemoryCloud {
    regions: RwLock<BTreeMap<String, Vec<CloudInstance>>>,
    unavailable: RwLock<bool>,
}

impl InMemoryCloud {
    /// Create an empty cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the instances of a region
    pub async fn set_region(&self, region: &str, instances: Vec<CloudInstance>) {
        self.regions
            .write()
            .await
            .insert(region.to_string(), instances);
    }

    /// Make every listing fail
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }
}

#[async_trait]
impl CloudProvider for InMemoryCloud {
    async fn list_regions(&self, _credential: &CloudCredential) -> Result<Vec<Region>> {
        if *self.unavailable.read().await {
            return Err(Error::Cloud("provider unavailable".to_string()));
        }
        Ok(self.regions.read().await.keys().map(Region::new).collect())
    }

    async fn list_instances(
        &self,
        _credential: &CloudCredential,
        region: &str,
    ) -> Result<Vec<CloudInstance>> {
        if *self.unavailable.read().await {
            return Err(Error::Cloud("provider unavailable".to_string()));
        }
        Ok(self
            .regions
            .read()
            .await
            .get(region)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, os: &str, private: &[&str], public: &[&str]) -> CloudInstance {
        CloudInstance {
            instance_id: id.to_string(),
            os_name: os.to_string(),
            private_ips: private.iter().map(|s| s.to_string()).collect(),
            public_ips: public.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_collect_one_host_per_instance() {
        let cloud = InMemoryCloud::new();
        cloud
            .set_region(
                "ap-guangzhou",
                vec![
                    instance("ins-1", "centos", &["10.0.0.1", "10.0.0.9"], &["1.1.1.1"]),
                    instance("ins-2", "ubuntu", &["10.0.0.2"], &[]),
                ],
            )
            .await;
        cloud
            .set_region("ap-shanghai", vec![instance("ins-3", "windows", &[], &["3.3.3.3"])])
            .await;

        let hosts = collect_cloud_hosts(&cloud, &CloudCredential::default())
            .await
            .unwrap();

        assert_eq!(
            hosts,
            vec![
                CloudHost::new("10.0.0.1", "1.1.1.1", "centos", "ap-guangzhou"),
                CloudHost::new("10.0.0.2", "", "ubuntu", "ap-guangzhou"),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_aborts_on_region_failure() {
        let mut provider = MockCloudProvider::new();
        provider
            .expect_list_regions()
            .returning(|_| Ok(vec![Region::new("ap-guangzhou"), Region::new("ap-beijing")]));
        provider
            .expect_list_instances()
            .returning(|_, region| {
                if region == "ap-beijing" {
                    Err(Error::Cloud("AuthFailure".to_string()))
                } else {
                    Ok(vec![])
                }
            });

        let err = collect_cloud_hosts(&provider, &CloudCredential::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cloud(_)));
    }
}
