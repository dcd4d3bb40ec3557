//! Analytics-dashboard deployment pipeline.
//!
//! Provisions a data source, a dataset over an upstream table, and a
//! dashboard instantiated from a template, then grants a designated
//! principal permissions on all three. Creations are idempotent replaces:
//! a stale resource from a previous run is deleted and its removal
//! confirmed before the new one is created under the same logical name.

use serde_json::{json, Map, Value};

use crate::engine::{
    replace, replace_with_mutate, run_with_retry, wait_until_settled, EngineError, Pipeline,
    PollPolicy, RetryPolicy, StatusClassifier, StepKind,
};
use crate::plane::{ControlPlaneClient, PlaneError};

pub const TABLES: &str = "tables";
pub const DATA_SOURCES: &str = "data-sources";
pub const DATA_SETS: &str = "data-sets";
pub const DASHBOARDS: &str = "dashboards";
pub const DATA_SOURCE_GRANTS: &str = "data-source-permissions";
pub const DATA_SET_GRANTS: &str = "data-set-permissions";
pub const DASHBOARD_GRANTS: &str = "dashboard-permissions";

const CREATING: &[&str] = &["CREATION_IN_PROGRESS"];
const CREATED: &[&str] = &["CREATION_SUCCESSFUL"];

const GRANT_ACTIONS: &[&str] = &["describe", "update", "delete", "updatePermissions"];

/// Everything a dashboard deployment needs beyond the client and policies.
#[derive(Debug, Clone)]
pub struct DashboardSpec {
    /// Logical name prefix; resources are named `{prefix}DataSource`,
    /// `{prefix}Dataset`, `{prefix}Dashboard`.
    pub prefix: String,
    pub catalog: String,
    pub database: String,
    pub table: String,
    /// Template the dashboard is instantiated from.
    pub template: String,
    /// Dataset placeholder name inside the template.
    pub placeholder: String,
    /// Principal granted permissions on each created resource.
    pub principal: String,
}

impl DashboardSpec {
    fn table_ref(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.database, self.table)
    }

    fn data_source_name(&self) -> String {
        format!("{}DataSource", self.prefix)
    }

    fn dataset_name(&self) -> String {
        format!("{}Dataset", self.prefix)
    }

    fn dashboard_name(&self) -> String {
        format!("{}Dashboard", self.prefix)
    }
}

/// Deploy the dashboard family end to end; returns the grant summary.
pub fn deploy(
    client: &dyn ControlPlaneClient,
    spec: &DashboardSpec,
    retry: &RetryPolicy,
    poll: &PollPolicy,
) -> Result<Value, EngineError> {
    let table_ref = spec.table_ref();
    let data_source_name = spec.data_source_name();
    let dataset_name = spec.dataset_name();
    let dashboard_name = spec.dashboard_name();

    let mut pipeline = Pipeline::new();

    pipeline.step("describe-table", StepKind::Action, {
        let table_ref = table_ref.clone();
        move |_context| Ok(client.describe(TABLES, &table_ref)?.body)
    });

    pipeline.step("create-data-source", StepKind::Replace, {
        let name = data_source_name.clone();
        move |_context| {
            let payload = json!({"type": "query-engine", "workgroup": "primary"});
            replace(client, DATA_SOURCES, &name, poll, || {
                run_with_retry(retry, || client.mutate(DATA_SOURCES, &name, &payload))
            })
        }
    });

    pipeline.step("await-data-source", StepKind::Poll, move |context| {
        let id = context.string("create-data-source", "/id")?;
        let settled = wait_until_settled(
            poll,
            &StatusClassifier::settling(CREATING, CREATED),
            || client.describe(DATA_SOURCES, &id),
        )?;
        Ok(settled.into_body())
    });

    pipeline.step("create-data-set", StepKind::Replace, {
        let name = dataset_name.clone();
        let spec = spec.clone();
        move |context| {
            let data_source_id = context.string("await-data-source", "/id")?;
            let table = context.output("describe-table")?;
            let payload = dataset_payload(&spec, &data_source_id, table)?;
            replace_with_mutate(client, DATA_SETS, &name, poll, &payload)
        }
    });

    pipeline.step("await-data-set", StepKind::Poll, move |context| {
        let id = context.string("create-data-set", "/id")?;
        let settled = wait_until_settled(
            poll,
            &StatusClassifier::settling(CREATING, CREATED),
            || client.describe(DATA_SETS, &id),
        )?;
        Ok(settled.into_body())
    });

    pipeline.step("create-dashboard", StepKind::Replace, {
        let name = dashboard_name.clone();
        let template = spec.template.clone();
        let placeholder = spec.placeholder.clone();
        move |context| {
            let dataset_id = context.string("await-data-set", "/id")?;
            let payload = json!({
                "templateId": template,
                "dataSetReferences": [
                    {"placeholder": placeholder, "dataSetId": dataset_id}
                ],
            });
            replace_with_mutate(client, DASHBOARDS, &name, poll, &payload)
        }
    });

    pipeline.step("await-dashboard", StepKind::Poll, move |context| {
        let id = context.string("create-dashboard", "/id")?;
        let settled = wait_until_settled(
            poll,
            &StatusClassifier::settling(CREATING, CREATED),
            || client.describe(DASHBOARDS, &id),
        )?;
        Ok(settled.into_body())
    });

    pipeline.step("grant-permissions", StepKind::Action, {
        let principal = spec.principal.clone();
        move |context| {
            let grants = [
                (DATA_SOURCE_GRANTS, context.string("await-data-source", "/id")?),
                (DATA_SET_GRANTS, context.string("await-data-set", "/id")?),
                (DASHBOARD_GRANTS, context.string("await-dashboard", "/id")?),
            ];
            let payload = json!({"principal": principal, "actions": GRANT_ACTIONS});
            let mut granted = Vec::new();
            for (kind, id) in grants {
                run_with_retry(retry, || client.mutate(kind, &id, &payload))?;
                granted.push(json!({"kind": kind, "id": id}));
            }
            Ok(json!({"principal": principal, "granted": granted}))
        }
    });

    pipeline.run()
}

/// Build the dataset payload from the upstream table's columns: storage
/// types map onto analysis types, and geographic roles are tagged from
/// column names.
fn dataset_payload(
    spec: &DashboardSpec,
    data_source_id: &str,
    table: &Value,
) -> Result<Value, EngineError> {
    let columns = table
        .pointer("/columns")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            PlaneError::Other(anyhow::anyhow!(
                "table {} reported no columns",
                spec.table_ref()
            ))
        })?;

    let mut mapped = Vec::new();
    let mut transforms = Vec::new();
    for column in columns {
        let column_name = column
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let storage_type = column
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        if column_name.is_empty() {
            continue;
        }
        let mut entry = Map::new();
        entry.insert("name".into(), Value::String(column_name.clone()));
        entry.insert(
            "type".into(),
            Value::String(map_column_type(&spec.table_ref(), &storage_type)?),
        );
        mapped.push(Value::Object(entry));

        if let Some(role) = geographic_role(&column_name) {
            transforms.push(json!({
                "tagColumn": {"name": column_name, "geographicRole": role}
            }));
        }
    }

    Ok(json!({
        "importMode": "DIRECT_QUERY",
        "source": {
            "dataSourceId": data_source_id,
            "catalog": spec.catalog,
            "database": spec.database,
            "table": spec.table,
            "columns": mapped,
        },
        "transforms": transforms,
    }))
}

fn map_column_type(table_ref: &str, storage_type: &str) -> Result<String, EngineError> {
    let mapped = match storage_type {
        "string" | "char" | "varchar" => "STRING",
        "boolean" => "BOOLEAN",
        "tinyint" | "smallint" | "int" | "integer" | "bigint" => "INTEGER",
        "double" | "float" | "decimal" => "DECIMAL",
        "date" | "timestamp" => "DATETIME",
        other => {
            return Err(PlaneError::Other(anyhow::anyhow!(
                "table {table_ref} has a column of unsupported type {other}"
            ))
            .into())
        }
    };
    Ok(mapped.to_string())
}

/// City is checked last so combined names like `city_state` tag as STATE.
fn geographic_role(column_name: &str) -> Option<&'static str> {
    if column_name.contains("latitude") {
        Some("LATITUDE")
    } else if column_name.contains("longitude") {
        Some("LONGITUDE")
    } else if column_name.contains("state") {
        Some("STATE")
    } else if column_name.contains("city") {
        Some("CITY")
    } else {
        None
    }
}
