use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{SelfSubjectRulesReview, SelfSubjectRulesReviewSpec};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use kube::api::{Api, ListParams, PostParams};

use crate::error::ApiError;
use crate::permissions::{BindingRef, ClusterIntrospection, SecretSummary};

/// Introspection through the Kubernetes authorization, RBAC and core APIs.
#[derive(Clone)]
pub struct KubeIntrospection {
    client: kube::Client,
}

impl KubeIntrospection {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterIntrospection for KubeIntrospection {
    async fn self_rules(&self, namespace: &str) -> Result<serde_json::Value, ApiError> {
        let review = SelfSubjectRulesReview {
            spec: SelfSubjectRulesReviewSpec {
                namespace: Some(namespace.to_string()),
            },
            ..Default::default()
        };
        let api: Api<SelfSubjectRulesReview> = Api::all(self.client.clone());
        let review = api.create(&PostParams::default(), &review).await?;
        serde_json::to_value(review.status).map_err(|e| ApiError::Transport(e.to_string()))
    }

    async fn role_bindings(&self) -> Result<Vec<BindingRef>, ApiError> {
        let api: Api<RoleBinding> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|rb| BindingRef {
                kind: rb.role_ref.kind,
                name: rb.role_ref.name,
            })
            .collect())
    }

    async fn cluster_role_bindings(&self) -> Result<Vec<BindingRef>, ApiError> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|crb| BindingRef {
                kind: crb.role_ref.kind,
                name: crb.role_ref.name,
            })
            .collect())
    }

    async fn secrets(&self) -> Result<Vec<SecretSummary>, ApiError> {
        let api: Api<Secret> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|s| SecretSummary {
                namespace: s.metadata.namespace.unwrap_or_default(),
                name: s.metadata.name.unwrap_or_default(),
                type_: s.type_.unwrap_or_default(),
                keys: s.data.map(|d| d.len()).unwrap_or(0),
            })
            .collect())
    }
}
