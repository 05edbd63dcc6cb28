use axum::{
    extract::{RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde_json::Value;
use tracing::{error, warn};

use crate::database::{InstanceSource, LookupQuery};
use crate::error::RequestError;
use crate::state::AppState;

pub const MODEL_ID_PARAM: &str = "modelID";
pub const INSTANCE_ID_PARAM: &str = "instanceID";

/// GET / - every stored instance document matching ?modelID=&instanceID=
pub async fn instance_lookup(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, RequestError> {
    let query = parse_lookup_query(raw_query.as_deref())?;
    let instances = collect_instances(state.instances.as_ref(), &query).await?;
    Ok(write_instances(&instances, &query))
}

/// Pull both identifiers from the raw query string. Presence of the key is
/// what counts, so `?modelID=&instanceID=` is accepted. The first occurrence
/// of a repeated key wins.
pub fn parse_lookup_query(raw_query: Option<&str>) -> Result<LookupQuery, RequestError> {
    let mut model_id = None;
    let mut instance_id = None;

    for (key, value) in url::form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            MODEL_ID_PARAM if model_id.is_none() => model_id = Some(value.into_owned()),
            INSTANCE_ID_PARAM if instance_id.is_none() => instance_id = Some(value.into_owned()),
            _ => {}
        }
    }

    match (model_id, instance_id) {
        (Some(model_id), Some(instance_id)) => Ok(LookupQuery { model_id, instance_id }),
        (model_id, instance_id) => {
            warn!(
                title = "InstanceLookup",
                model_id_set = model_id.is_some(),
                instance_id_set = instance_id.is_some(),
                "incoming request did not contain the needed query parameters"
            );
            Err(RequestError::MissingQueryParameter)
        }
    }
}

/// Run the lookup and decode every row, aborting on the first bad one.
///
/// Extraction and decoding are checked separately for each row so both
/// failures show up in the logs; either one fails the whole request.
pub async fn collect_instances(
    source: &dyn InstanceSource,
    query: &LookupQuery,
) -> Result<Vec<Value>, RequestError> {
    let mut rows = source.query_instances(query).await.map_err(|e| {
        error!(
            title = "InstanceLookup",
            model_id = %query.model_id,
            instance_id = %query.instance_id,
            error = %e,
            "An error occurred while querying the database for the bim model information"
        );
        RequestError::DatabaseQueryError
    })?;

    let mut instances = Vec::new();
    while let Some(fetched) = rows.next().await {
        let row = fetched.map_err(|e| {
            error!(
                title = "InstanceLookup",
                model_id = %query.model_id,
                instance_id = %query.instance_id,
                error = %e,
                "unable to fetch the next row due to an error"
            );
            RequestError::DatabaseQueryError
        })?;

        let scanned = row.payload();
        let decoded = serde_json::from_slice::<Value>(scanned.unwrap_or_default());

        if let Err(e) = &decoded {
            error!(
                title = "InstanceLookup",
                model_id = %query.model_id,
                instance_id = %query.instance_id,
                error = %e,
                "unable to convert the returned rows due to an error"
            );
        }
        if let Err(e) = &scanned {
            error!(
                title = "InstanceLookup",
                model_id = %query.model_id,
                instance_id = %query.instance_id,
                error = %e,
                "unable to scan the returned rows due to an error"
            );
        }

        match (scanned, decoded) {
            (Ok(_), Ok(instance)) => instances.push(instance),
            _ => return Err(RequestError::DatabaseQueryError),
        }
    }

    Ok(instances)
}

/// Serialize the collected instances as a JSON array. Once we get here the
/// response is committed as a success, so a serialization failure is only logged.
fn write_instances(instances: &[Value], query: &LookupQuery) -> Response {
    let content_type = [(header::CONTENT_TYPE, "application/json")];
    match serde_json::to_vec(instances) {
        Ok(body) => (content_type, body).into_response(),
        Err(e) => {
            error!(
                title = "InstanceLookup",
                model_id = %query.model_id,
                instance_id = %query.instance_id,
                error = %e,
                "an error occurred while sending back the response"
            );
            content_type.into_response()
        }
    }
}
