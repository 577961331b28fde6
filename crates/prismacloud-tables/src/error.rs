//! Typed errors for table scans.
//!
//! Every variant renders as `<table>.<operation>: <kind>: <detail>` so a failed
//! query names the component and the kind of failure.

use datafusion::error::DataFusionError;
use prismacloud_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    /// Invalid connection settings or query arguments; raised before any remote call.
    #[error("{operation}: configuration_error: {message}")]
    Configuration { operation: String, message: String },
    /// The client handle could not be built.
    #[error("{operation}: connection_error: {source}")]
    Connection {
        operation: String,
        #[source]
        source: ClientError,
    },
    /// The first page (or a single-shot call) failed.
    #[error("{operation}: api_error: {source}")]
    Upstream {
        operation: String,
        #[source]
        source: ClientError,
    },
    /// A continuation page failed after earlier pages succeeded.
    #[error("{operation}: paging_error: {source}")]
    UpstreamPaging {
        operation: String,
        #[source]
        source: ClientError,
    },
    /// A response item does not fit the declared column schema.
    #[error("{operation}: projection_error: column '{column}': {message}")]
    Projection {
        operation: String,
        column: String,
        message: String,
    },
    #[error("{operation}: missing required key column '{column}'")]
    MissingKeyColumn { operation: String, column: String },
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl TableError {
    /// Classify a pool/connect failure: bad settings versus a failed handshake.
    pub fn connect(operation: impl Into<String>, source: ClientError) -> Self {
        let operation = operation.into();
        match source {
            ClientError::Configuration(message) => TableError::Configuration { operation, message },
            source => TableError::Connection { operation, source },
        }
    }

    pub fn upstream(operation: impl Into<String>, source: ClientError) -> Self {
        TableError::Upstream {
            operation: operation.into(),
            source,
        }
    }

    pub fn paging(operation: impl Into<String>, source: ClientError) -> Self {
        TableError::UpstreamPaging {
            operation: operation.into(),
            source,
        }
    }

    pub fn configuration(operation: impl Into<String>, message: impl Into<String>) -> Self {
        TableError::Configuration {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<TableError> for DataFusionError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::Configuration { .. } | TableError::MissingKeyColumn { .. } => {
                DataFusionError::Plan(e.to_string())
            }
            other => DataFusionError::External(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_operation_and_kind() {
        let err = TableError::paging(
            "prismacloud_alert.list",
            ClientError::Api {
                status: 500,
                body: "boom".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "prismacloud_alert.list: paging_error: api error (500): boom"
        );

        let err = TableError::upstream("prismacloud_policy.list", ClientError::Decode("x".into()));
        assert!(err.to_string().starts_with("prismacloud_policy.list: api_error: "));
    }

    #[test]
    fn test_connect_classifies_configuration() {
        let err = TableError::connect(
            "prismacloud_policy.connect",
            ClientError::Configuration("missing credentials".to_string()),
        );
        assert!(matches!(err, TableError::Configuration { .. }));
        assert_eq!(
            err.to_string(),
            "prismacloud_policy.connect: configuration_error: missing credentials"
        );

        let err = TableError::connect(
            "prismacloud_policy.connect",
            ClientError::Connection("login rejected (401)".to_string()),
        );
        assert!(err.to_string().contains("connection_error"));
    }

    #[test]
    fn test_configuration_becomes_plan_error() {
        let df: DataFusionError = TableError::configuration("t.scan", "bad").into();
        assert!(matches!(df, DataFusionError::Plan(_)));

        let df: DataFusionError =
            TableError::upstream("t.list", ClientError::NotFound("x".into())).into();
        assert!(matches!(df, DataFusionError::External(_)));
    }
}
