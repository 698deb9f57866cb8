use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

/// Form/query parameter carrying the token when no header is sent.
pub const SIGNED_REQUEST_PARAM: &str = "signed_request";

/// The parts of an inbound HTTP request that can carry a signed token.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    headers: &'a HeaderMap,
    query: Option<&'a str>,
    form: Option<&'a str>,
}

impl<'a> SignedRequest<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self {
            headers,
            query: None,
            form: None,
        }
    }

    /// Raw (still percent-encoded) query string.
    pub fn with_query(mut self, query: Option<&'a str>) -> Self {
        self.query = query;
        self
    }

    /// Raw `application/x-www-form-urlencoded` body.
    pub fn with_form(mut self, form: Option<&'a str>) -> Self {
        self.form = form;
        self
    }

    /// Token from, in order: `Authorization: Bearer`, `Authorization: JWT`,
    /// then a `signed_request` query or form parameter.
    pub fn token(&self) -> Option<String> {
        if let Some(token) = self
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(token_from_authorization)
        {
            return Some(token.to_string());
        }

        [self.query, self.form]
            .into_iter()
            .flatten()
            .find_map(|encoded| {
                url::form_urlencoded::parse(encoded.as_bytes())
                    .find(|(key, value)| key == SIGNED_REQUEST_PARAM && !value.trim().is_empty())
                    .map(|(_, value)| value.trim().to_string())
            })
    }
}

fn token_from_authorization(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, rest) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") && !scheme.eq_ignore_ascii_case("jwt") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_authorization(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn bearer_and_jwt_schemes_are_case_insensitive() {
        for value in ["Bearer aaa", "bearer aaa", "BEARER aaa", "JWT aaa", "jwt aaa"] {
            let headers = with_authorization(value);
            assert_eq!(SignedRequest::new(&headers).token().as_deref(), Some("aaa"));
        }
    }

    #[test]
    fn header_wins_over_signed_request_param() {
        let headers = with_authorization("JWT from-header");
        let request = SignedRequest::new(&headers).with_query(Some("signed_request=from-query"));
        assert_eq!(request.token().as_deref(), Some("from-header"));
    }

    #[test]
    fn unknown_scheme_falls_back_to_query_then_form() {
        let headers = with_authorization("Basic dXNlcjpwYXNz");
        let request = SignedRequest::new(&headers)
            .with_query(Some("xdm_e=1"))
            .with_form(Some("signed_request=from-form"));
        assert_eq!(request.token().as_deref(), Some("from-form"));
    }

    #[test]
    fn missing_everything_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(SignedRequest::new(&headers).token(), None);
        let headers = with_authorization("Bearer   ");
        assert_eq!(SignedRequest::new(&headers).token(), None);
    }
}
