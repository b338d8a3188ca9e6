use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    AppState,
    api::models::deployments::{BusinessIdInput, DeploymentCreate, DeploymentResponse, DeploymentUpdate, RowsAffected},
    errors::Error,
    rpc::RpcContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    Health,
    SessionGet,
    DeploymentList,
    DeploymentByBusinessId,
    DeploymentCreate,
    DeploymentUpdate,
    DeploymentDelete,
}

const PROCEDURES: &[(&str, Procedure)] = &[
    ("health", Procedure::Health),
    ("session.get", Procedure::SessionGet),
    ("deployment.list", Procedure::DeploymentList),
    ("deployment.byBusinessId", Procedure::DeploymentByBusinessId),
    ("deployment.create", Procedure::DeploymentCreate),
    ("deployment.update", Procedure::DeploymentUpdate),
    ("deployment.delete", Procedure::DeploymentDelete),
];

impl Procedure {
    pub fn from_path(path: &str) -> Option<Self> {
        PROCEDURES.iter().find(|(name, _)| *name == path).map(|(_, p)| *p)
    }

    pub fn kind(&self) -> ProcedureKind {
        match self {
            Procedure::Health | Procedure::SessionGet | Procedure::DeploymentList | Procedure::DeploymentByBusinessId => {
                ProcedureKind::Query
            }
            Procedure::DeploymentCreate | Procedure::DeploymentUpdate | Procedure::DeploymentDelete => ProcedureKind::Mutation,
        }
    }

    pub async fn call(self, state: &AppState, ctx: &RpcContext, input: Value) -> Result<Value, Error> {
        match self {
            Procedure::Health => Ok(json!({ "status": "ok", "database": state.db.ping().await })),
            Procedure::SessionGet => to_value(&ctx.session),
            Procedure::DeploymentList => {
                ctx.require_session()?;
                let deployments = state.deployments.list_all().await?;
                to_value(deployments.into_iter().map(DeploymentResponse::from).collect::<Vec<_>>())
            }
            Procedure::DeploymentByBusinessId => {
                ctx.require_session()?;
                let BusinessIdInput { business_id } = parse_input(input)?;
                let deployment = state.deployments.get_by_business_id(business_id).await?;
                to_value(deployment.map(DeploymentResponse::from))
            }
            Procedure::DeploymentCreate => {
                ctx.require_session()?;
                let create: DeploymentCreate = parse_input(input)?;
                if create.name.trim().is_empty() {
                    return Err(Error::BadRequest {
                        message: "Deployment name must not be empty".to_string(),
                    });
                }
                require_object_metadata(&create.metadata)?;
                let deployment = state.deployments.create(&create.into()).await?;
                to_value(DeploymentResponse::from(deployment))
            }
            Procedure::DeploymentUpdate => {
                ctx.require_session()?;
                let update: DeploymentUpdate = parse_input(input)?;
                if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                    return Err(Error::BadRequest {
                        message: "Deployment name must not be empty".to_string(),
                    });
                }
                if let Some(metadata) = &update.metadata {
                    require_object_metadata(metadata)?;
                }
                let (business_id, request) = update.into_parts();
                let rows_affected = state.deployments.update(business_id, &request).await?;
                to_value(RowsAffected { rows_affected })
            }
            Procedure::DeploymentDelete => {
                ctx.require_session()?;
                let BusinessIdInput { business_id } = parse_input(input)?;
                let rows_affected = state.deployments.delete(business_id).await?;
                to_value(RowsAffected { rows_affected })
            }
        }
    }
}

fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, Error> {
    serde_json::from_value(input).map_err(|e| Error::BadRequest {
        message: format!("Invalid input: {e}"),
    })
}

fn require_object_metadata(metadata: &Value) -> Result<(), Error> {
    if metadata.is_object() {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "Deployment metadata must be a JSON object".to_string(),
        })
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::Other(e.into()))
}
