//! Kubernetes access for the Sentry controller
//!
//! Every cluster read and write the reconciler performs goes through
//! [`SentryKubeClient`], so the reconciliation logic can be exercised against
//! mocks and in-memory stores without an API server.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

use crate::crd::{Sentry, SentryStatus};
use crate::{Error, Result};

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "sentry-controller";

/// Result of a create call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object was created by this call
    Created,
    /// An object with the same name already existed
    AlreadyExists,
}

/// Trait abstracting Kubernetes client operations for Sentry
///
/// Lookups return `Ok(None)` when the object does not exist. Creates report
/// a name collision as [`CreateOutcome::AlreadyExists`] rather than an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SentryKubeClient: Send + Sync {
    /// Get a Sentry by name and namespace
    async fn get_sentry(&self, name: &str, namespace: &str) -> Result<Option<Sentry>>;

    /// Get a Secret by name and namespace
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>>;

    /// Get a Job by name and namespace
    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>>;

    /// Create a Job
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<CreateOutcome>;

    /// Get a Deployment by name and namespace
    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>>;

    /// Create a Deployment
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<CreateOutcome>;

    /// Replace a Deployment wholesale
    ///
    /// The deployment must carry the `resourceVersion` it was read at. A
    /// stale version fails with [`Error::Conflict`].
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<()>;

    /// Get a Service by name and namespace
    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>>;

    /// Create a Service
    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<CreateOutcome>;

    /// Patch the status of a Sentry
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &SentryStatus,
    ) -> Result<()>;
}

/// Real Kubernetes client implementation
pub struct SentryKubeClientImpl {
    client: Client,
}

impl SentryKubeClientImpl {
    /// Create a new SentryKubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

async fn create_tolerating_conflict<K>(api: &Api<K>, object: &K) -> Result<CreateOutcome>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    match api.create(&PostParams::default(), object).await {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(CreateOutcome::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl SentryKubeClient for SentryKubeClientImpl {
    async fn get_sentry(&self, name: &str, namespace: &str) -> Result<Option<Sentry>> {
        Ok(self.api::<Sentry>(namespace).get_opt(name).await?)
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>> {
        Ok(self.api::<Secret>(namespace).get_opt(name).await?)
    }

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>> {
        Ok(self.api::<Job>(namespace).get_opt(name).await?)
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<CreateOutcome> {
        create_tolerating_conflict(&self.api::<Job>(namespace), job).await
    }

    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>> {
        Ok(self.api::<Deployment>(namespace).get_opt(name).await?)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<CreateOutcome> {
        create_tolerating_conflict(&self.api::<Deployment>(namespace), deployment).await
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<()> {
        let name = deployment.name_any();
        match self
            .api::<Deployment>(namespace)
            .replace(&name, &PostParams::default(), deployment)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                Err(Error::conflict("Deployment", name, namespace))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_service(&self, name: &str, namespace: &str) -> Result<Option<Service>> {
        Ok(self.api::<Service>(namespace).get_opt(name).await?)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<CreateOutcome> {
        create_tolerating_conflict(&self.api::<Service>(namespace), service).await
    }

    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &SentryStatus,
    ) -> Result<()> {
        let status_patch = serde_json::json!({
            "status": status
        });

        self.api::<Sentry>(namespace)
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch),
            )
            .await?;

        Ok(())
    }
}
