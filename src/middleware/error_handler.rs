use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result, dev::ServiceResponse};
use serde_json::json;

/// Default error handler: gives bare framework error responses (payload too
/// large, deserialization failures inside extractors, etc.) the same JSON
/// envelope the application errors use. Responses produced from a
/// `CustomError` already have the envelope and pass through untouched.
pub fn handle_error<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    if res.response().error().is_some() {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let status_code = res.response().status();
    let new_response = HttpResponse::build(status_code).json(json!({
        "success": false,
        "message": status_code.canonical_reason().unwrap_or("Unknown error"),
        "httpStatusCode": status_code.as_u16(),
        "error": "REQUEST_ERROR",
        "service": std::env::var("SERVICE_NAME").unwrap_or_else(|_| "inkpost-backend".to_string()),
    }));

    let (req, _) = res.into_parts();
    let res = ServiceResponse::new(req, new_response.map_into_right_body());

    Ok(ErrorHandlerResponse::Response(res))
}
