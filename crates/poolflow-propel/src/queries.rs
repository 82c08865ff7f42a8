//! GraphQL documents
//!
//! Selections mirror the entity types in `poolflow_cloud::resources`.

/// Selection set for one entity type
pub struct EntityDoc {
    /// Root query field, also the entity field of mutation responses
    pub field: &'static str,
    pub response: &'static str,
    pub fragment_name: &'static str,
    pub fragment: &'static str,
}

pub const DATA_SOURCE: EntityDoc = EntityDoc {
    field: "dataSource",
    response: "DataSourceResponse",
    fragment_name: "DataSourceFields",
    fragment: r#"fragment DataSourceFields on DataSource {
  id
  uniqueName
  description
  type
  status
  error { message }
  dataPools { id }
  connectionSettings {
    __typename
    ... on SnowflakeConnectionSettings { account database warehouse schema role username }
    ... on S3ConnectionSettings { bucket awsAccessKeyId tables { name path columns { columnName type isNullable jsonProperty } } }
    ... on HttpConnectionSettings { basicAuth { username } tables { name columns { columnName type isNullable jsonProperty } } }
    ... on KafkaConnectionSettings { bootstrapServers auth user tls }
    ... on WebhookConnectionSettings { basicAuth { username } columns { columnName type isNullable jsonProperty } timestamp tenant uniqueId webhookUrl }
    ... on ClickHouseConnectionSettings { url database user readonly }
  }
}"#,
};

pub const DATA_POOL: EntityDoc = EntityDoc {
    field: "dataPool",
    response: "DataPoolResponse",
    fragment_name: "DataPoolFields",
    fragment: r#"fragment DataPoolFields on DataPool {
  id
  uniqueName
  description
  status
  error { message }
  dataSource { id }
  table
  timestamp { columnName }
  tenant { columnName }
  uniqueId { columnName }
  columns { nodes { columnName type isNullable jsonProperty } }
  dataRetentionInDays
  tableSettings {
    engine {
      type
      ... on ReplacingMergeTreeTableEngine { ver }
      ... on SummingMergeTreeTableEngine { columns }
    }
    partitionBy
    primaryKey
    orderBy
  }
}"#,
};

pub const MATERIALIZED_VIEW: EntityDoc = EntityDoc {
    field: "materializedView",
    response: "MaterializedViewResponse",
    fragment_name: "MaterializedViewFields",
    fragment: r#"fragment MaterializedViewFields on MaterializedView {
  id
  uniqueName
  description
  sql
  destination { id }
  source { id }
}"#,
};

pub const METRIC: EntityDoc = EntityDoc {
    field: "metric",
    response: "MetricResponse",
    fragment_name: "MetricFields",
    fragment: r#"fragment MetricFields on Metric {
  id
  uniqueName
  description
  type
  dataPool { id }
  dimensions { columnName }
  accessControlEnabled
  settings {
    ... on CountMetricSettings { filters { column operator value } }
    ... on SumMetricSettings { measure { columnName } filters { column operator value } }
    ... on CountDistinctMetricSettings { dimension { columnName } filters { column operator value } }
    ... on AverageMetricSettings { measure { columnName } filters { column operator value } }
    ... on MinMetricSettings { measure { columnName } filters { column operator value } }
    ... on MaxMetricSettings { measure { columnName } filters { column operator value } }
    ... on CustomMetricSettings { expression filters { column operator value } }
  }
}"#,
};

pub const POLICY: EntityDoc = EntityDoc {
    field: "policy",
    response: "PolicyResponse",
    fragment_name: "PolicyFields",
    fragment: r#"fragment PolicyFields on Policy {
  id
  uniqueName
  description
  dataPool { id }
  columns
  rows { column operator value }
  applications { nodes { id } }
}"#,
};

pub const JOB_FIELDS: &str = "id status error { message }";

/// `result: <field>(id: $id) { ... }`
pub fn get(doc: &EntityDoc) -> String {
    format!(
        "query Get($id: ID!) {{ result: {}(id: $id) {{ ...{} }} }}\n{}",
        doc.field, doc.fragment_name, doc.fragment
    )
}

/// Mutation answering with the entity or a failure response
pub fn mutation(name: &str, input_type: &str, doc: &EntityDoc) -> String {
    format!(
        "mutation {name}($input: {input_type}!) {{ result: {name}(input: $input) {{ \
         __typename \
         ... on {response} {{ entity: {field} {{ ...{fragment_name} }} }} \
         ... on FailureResponse {{ error {{ code message }} }} }} }}\n{fragment}",
        response = doc.response,
        field = doc.field,
        fragment_name = doc.fragment_name,
        fragment = doc.fragment,
    )
}

/// Mutation taking an ID and answering with a scalar
pub fn by_id(name: &str) -> String {
    format!("mutation {name}($id: ID!) {{ result: {name}(id: $id) }}")
}

pub fn assign_policy(name: &str) -> String {
    format!(
        "mutation {name}($policy: ID!, $application: ID!) \
         {{ result: {name}(policy: $policy, application: $application) }}"
    )
}

pub fn create_add_column_job() -> String {
    format!(
        "mutation createAddColumnToDataPoolJob($input: CreateAddColumnToDataPoolJobInput!) \
         {{ result: createAddColumnToDataPoolJob(input: $input) {{ {JOB_FIELDS} }} }}"
    )
}

pub fn get_add_column_job() -> String {
    format!(
        "query Get($id: ID!) {{ result: addColumnToDataPoolJob(id: $id) {{ {JOB_FIELDS} }} }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_document() {
        let query = get(&DATA_POOL);
        assert!(query.starts_with("query Get($id: ID!) { result: dataPool(id: $id) { ...DataPoolFields } }"));
        assert!(query.contains("fragment DataPoolFields on DataPool"));
    }

    #[test]
    fn test_mutation_document() {
        let query = mutation("createSnowflakeDataSource", "CreateSnowflakeDataSourceInput", &DATA_SOURCE);
        assert!(query.contains("mutation createSnowflakeDataSource($input: CreateSnowflakeDataSourceInput!)"));
        assert!(query.contains("result: createSnowflakeDataSource(input: $input)"));
        assert!(query.contains("... on DataSourceResponse { entity: dataSource { ...DataSourceFields } }"));
        assert!(query.contains("... on FailureResponse { error { code message } }"));
    }

    #[test]
    fn test_fragments_select_columns_uniformly() {
        for doc in [&DATA_SOURCE, &DATA_POOL] {
            assert!(doc.fragment.contains("columnName type isNullable jsonProperty"));
        }
    }
}
