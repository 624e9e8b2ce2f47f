//! Body and query extractors that report payload problems as field errors
//!
//! axum's own `Json`/`Query` rejections are plain text. These wrappers turn
//! deserialization failures into `Error::Validation` naming the offending
//! field, so they share the 422 envelope with workflow validation.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use confrarias_common::error::FieldErrors;
use confrarias_common::Error;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

const JSON_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";
const QUERY_PREFIX: &str = "Failed to deserialize query string: ";

/// Text between the backticks that follow `marker`
fn backticked_after(detail: &str, marker: &str) -> Option<String> {
    let rest = &detail[detail.find(marker)? + marker.len()..];
    rest.split('`').next().map(str::to_string)
}

/// Field error from a serde failure rendered as `[path: ]detail`
///
/// `fallback_field` is used when the message carries no path, which is the
/// case for query strings.
pub fn describe_serde_error(text: &str, fallback_field: &str) -> FieldErrors {
    let detail = text
        .strip_prefix(JSON_PREFIX)
        .or_else(|| text.strip_prefix(QUERY_PREFIX))
        .unwrap_or(text);

    let (path, detail) = match detail.split_once(": ") {
        Some((path, rest)) if !path.is_empty() && !path.contains(' ') => (Some(path), rest),
        _ => (None, detail),
    };
    let missing = backticked_after(detail, "missing field `");

    let field = match (path, &missing) {
        (Some(path), Some(missing)) => format!("{}.{}", path, missing),
        (Some(path), None) => path.to_string(),
        (None, Some(missing)) => missing.clone(),
        (None, None) => fallback_field.to_string(),
    };

    let message = if missing.is_some() {
        "Campo obrigatório."
    } else if detail.starts_with("unknown variant") {
        "Valor não permitido."
    } else if detail.starts_with("unknown field") {
        "Campo desconhecido."
    } else {
        "Valor inválido."
    };

    FieldErrors::single(&field, message)
}

/// JSON body whose deserialization errors become `Error::Validation`
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(JsonRejection::JsonDataError(err)) => {
                Err(Error::Validation(describe_serde_error(&err.body_text(), "body")).into())
            }
            Err(JsonRejection::JsonSyntaxError(_)) => {
                Err(Error::validation("body", "O corpo do pedido não é JSON válido.").into())
            }
            Err(other) => Err(ApiError::Rejected {
                status: other.status(),
                message: other.body_text(),
            }),
        }
    }
}

/// Query string whose deserialization errors become `Error::Validation`
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(QueryRejection::FailedToDeserializeQueryString(err)) => {
                Err(Error::Validation(describe_serde_error(&err.body_text(), "query")).into())
            }
            Err(other) => Err(ApiError::Rejected {
                status: other.status(),
                message: other.body_text(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(errors: FieldErrors) -> (String, String) {
        assert_eq!(errors.0.len(), 1);
        let e = &errors.0[0];
        (e.field.clone(), e.message.clone())
    }

    #[test]
    fn test_unknown_variant_names_path() {
        let text = format!(
            "{}region: unknown variant `Marte`, expected one of `Norte`, `Centro` at line 1 column 20",
            JSON_PREFIX
        );
        assert_eq!(only(describe_serde_error(&text, "body")), ("region".into(), "Valor não permitido.".into()));
    }

    #[test]
    fn test_missing_field_at_root() {
        let text = format!("{}missing field `editorial` at line 1 column 80", JSON_PREFIX);
        assert_eq!(only(describe_serde_error(&text, "body")).0, "editorial");
    }

    #[test]
    fn test_missing_field_in_nested_item() {
        let text = format!("{}images[0]: missing field `image_url` at line 1 column 9", JSON_PREFIX);
        assert_eq!(only(describe_serde_error(&text, "body")).0, "images[0].image_url");
    }

    #[test]
    fn test_invalid_type_keeps_path() {
        let text = format!("{}type_id: invalid type: string \"x\", expected i64", JSON_PREFIX);
        assert_eq!(only(describe_serde_error(&text, "body")), ("type_id".into(), "Valor inválido.".into()));
    }

    #[test]
    fn test_query_without_path_uses_fallback() {
        let text = format!("{}invalid digit found in string", QUERY_PREFIX);
        assert_eq!(only(describe_serde_error(&text, "query")).0, "query");
    }
}
