use actix_web::HttpRequest;

use crate::errors::ServerError;

/// The header the upstream auth proxy stamps onto every authenticated request. Identity issuance itself lives in
/// front of this service; by the time a request lands here the proxy has already verified the session and
/// replaced whatever the client sent in this header.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user on the request, or `MissingIdentity` if the header is absent or malformed.
pub fn authenticated_user(req: &HttpRequest) -> Result<i64, ServerError> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or(ServerError::MissingIdentity)
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn reads_the_identity_header() {
        let req = TestRequest::default().insert_header((USER_ID_HEADER, "42")).to_http_request();
        assert_eq!(authenticated_user(&req).unwrap(), 42);
    }

    #[test]
    fn missing_or_malformed_identity_is_rejected() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(authenticated_user(&req), Err(ServerError::MissingIdentity)));
        let req = TestRequest::default().insert_header((USER_ID_HEADER, "not-a-number")).to_http_request();
        assert!(matches!(authenticated_user(&req), Err(ServerError::MissingIdentity)));
    }
}
