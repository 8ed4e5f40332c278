//! Built-in monitoring queries.
//!
//! The catalog is a fixed table addressed by 1-based index; index 0 selects
//! every query. Each query reads the audit-log table through
//! `read_parquet(S3_PRESIGNED_URL)` and is written in the DataFusion SQL
//! dialect.

/// A canned monitoring query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Errors from selecting catalog entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid query index {index}: choose 0 for all or 1..={len}, or use --list")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Every built-in monitoring query, in listing order.
pub static MONITOR_QUERIES: &[MonitorQuery] = &[
    MonitorQuery {
        name: "repeated_unauthorized_uc_data_requests",
        description: "Detect repeated unauthorized UC data requests.",
        sql: "WITH failed_data_access AS (\
              SELECT date_trunc('hour', event_time) AS window_start, \
              date_trunc('hour', event_time) + INTERVAL '1 hour' AS window_end, \
              user_identity.email AS email, \
              request_params['metastore_id'] AS metastore_id, \
              COALESCE(request_params['workspace_id'], CAST(workspace_id AS VARCHAR)) AS workspace_id, \
              action_name, \
              COALESCE(request_params['table_full_name'], request_params['volume_full_name'], \
              request_params['name'], request_params['url'], request_params['table_url'], \
              request_params['table_id'], request_params['volume_id']) AS securable, \
              response.error_message AS error_message \
              FROM read_parquet(S3_PRESIGNED_URL) \
              WHERE action_name IN ('generateTemporaryTableCredential', 'generateTemporaryPathCredential', \
              'generateTemporaryVolumeCredential', 'deltaSharingQueryTable', 'deltaSharingQueryTableChanges') \
              AND response.status_code IN (401, 403) \
              AND event_time >= now() - INTERVAL '24 hours'), \
              failed_data_access_agg AS (\
              SELECT window_start, window_end, email, metastore_id, \
              string_agg(workspace_id, ',') AS workspace_ids, \
              string_agg(action_name, ',') AS action_names, \
              string_agg(securable, ',') AS securables, \
              string_agg(error_message, ',') AS errors, \
              COUNT(*) AS total \
              FROM failed_data_access GROUP BY 1, 2, 3, 4) \
              SELECT * FROM failed_data_access_agg WHERE total > 15 ORDER BY total DESC",
    },
    MonitorQuery {
        name: "destructive_activities_last_90_days",
        description: "Monitor destructive activities over the last 90 days.",
        sql: "SELECT event_date, user_identity.email AS email, \
              COALESCE(request_params['workspace_id'], CAST(workspace_id AS VARCHAR)) AS workspace_id, \
              service_name, action_name, COUNT(*) AS num_destructive_activities \
              FROM read_parquet(S3_PRESIGNED_URL) \
              WHERE event_date >= current_date() - INTERVAL '90 days' \
              AND user_identity.email NOT IN ('System-User') \
              AND (starts_with(action_name, 'delete') \
              OR strpos(lower(action_name), 'delete') > 0 \
              OR strpos(lower(action_name), 'trash') > 0) \
              GROUP BY 1, 2, 3, 4, 5 ORDER BY event_date DESC",
    },
    MonitorQuery {
        name: "changes_to_workspace_configuration",
        description: "Detect changes to workspace configuration in the last 24 hours.",
        sql: "SELECT event_time, user_identity.email AS email, workspace_id, \
              request_params['workspaceConfKeys'] AS workspace_conf_keys, \
              request_params['workspaceConfValues'] AS workspace_conf_values, \
              COUNT(*) AS total \
              FROM read_parquet(S3_PRESIGNED_URL) \
              WHERE action_name = 'workspaceConfEdit' \
              AND event_time >= now() - INTERVAL '24 hours' \
              GROUP BY 1, 2, 3, 4, 5 ORDER BY event_time DESC",
    },
];

/// Resolves a monitor index against `catalog`.
///
/// `0` selects every entry in order; `n` selects the `n`-th entry.
///
/// # Errors
///
/// Returns [`CatalogError::IndexOutOfRange`] when `index` exceeds the
/// catalog size.
pub fn select(catalog: &[MonitorQuery], index: usize) -> Result<Vec<MonitorQuery>, CatalogError> {
    match index {
        0 => Ok(catalog.to_vec()),
        n if n <= catalog.len() => Ok(vec![catalog[n - 1]]),
        _ => Err(CatalogError::IndexOutOfRange {
            index,
            len: catalog.len(),
        }),
    }
}

/// Listing lines in the form `[i] name - description`.
#[must_use]
pub fn listing(catalog: &[MonitorQuery]) -> Vec<String> {
    catalog
        .iter()
        .enumerate()
        .map(|(i, q)| format!("[{}] {} - {}", i + 1, q.name, q.description))
        .collect()
}
