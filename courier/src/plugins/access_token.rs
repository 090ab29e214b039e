use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use courier_core::{Plugin, Request};
use http::header::{AUTHORIZATION, HeaderValue};
use tracing::warn;

/// The scheme of an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationType {
    Basic,
    Bearer,
    /// Any other scheme, e.g. `Token`.
    Custom(String),
}

impl AuthorizationType {
    pub fn value(&self) -> &str {
        match self {
            AuthorizationType::Basic => "Basic",
            AuthorizationType::Bearer => "Bearer",
            AuthorizationType::Custom(scheme) => scheme,
        }
    }
}

impl fmt::Display for AuthorizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Targets that declare how they are authorized.
pub trait AccessTokenAuthorizable {
    /// `None` leaves the request unauthorized.
    fn authorization_type(&self) -> Option<AuthorizationType>;
}

/// Encodes `username:password` for [`AuthorizationType::Basic`].
pub fn basic_token(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}

type TokenClosure<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Adds `Authorization: <scheme> <token>` to requests for authorizable targets.
///
/// The token is fetched for every request, so it may rotate between calls.
pub struct AccessTokenPlugin<T: ?Sized> {
    token_closure: TokenClosure<T>,
}

impl<T: ?Sized> AccessTokenPlugin<T> {
    pub fn new<F>(token_closure: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            token_closure: Box::new(token_closure),
        }
    }
}

impl<T> Plugin<T> for AccessTokenPlugin<T>
where
    T: AccessTokenAuthorizable + ?Sized,
{
    fn prepare(&self, mut request: Request, target: &T) -> Request {
        let Some(authorization_type) = target.authorization_type() else {
            return request;
        };
        let value = format!("{} {}", authorization_type, (self.token_closure)(target));
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                request.headers_mut().append(AUTHORIZATION, value);
            }
            Err(error) => warn!(
                %error,
                "access token is not a valid header value, request left unauthorized"
            ),
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use courier_core::{Method, Url};

    use super::*;

    enum Api {
        Public,
        Private,
        Legacy,
    }

    impl AccessTokenAuthorizable for Api {
        fn authorization_type(&self) -> Option<AuthorizationType> {
            match self {
                Api::Public => None,
                Api::Private => Some(AuthorizationType::Bearer),
                Api::Legacy => Some(AuthorizationType::Custom("Token".into())),
            }
        }
    }

    fn request() -> Request {
        Request::new(Method::GET, Url::parse("https://api.example.com").unwrap())
    }

    #[test]
    fn adds_scheme_and_token() {
        let plugin = AccessTokenPlugin::new(|_: &Api| "secret".to_owned());
        let prepared = plugin.prepare(request(), &Api::Private);
        assert_eq!(prepared.headers()[AUTHORIZATION], "Bearer secret");

        let prepared = plugin.prepare(request(), &Api::Legacy);
        assert_eq!(prepared.headers()[AUTHORIZATION], "Token secret");
    }

    #[test]
    fn leaves_public_targets_alone() {
        let plugin = AccessTokenPlugin::new(|_: &Api| "secret".to_owned());
        let prepared = plugin.prepare(request(), &Api::Public);
        assert!(prepared.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn invalid_tokens_are_skipped() {
        let plugin = AccessTokenPlugin::new(|_: &Api| "bad\ntoken".to_owned());
        let prepared = plugin.prepare(request(), &Api::Private);
        assert!(prepared.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn basic_token_is_base64() {
        assert_eq!(basic_token("aladdin", "opensesame"), "YWxhZGRpbjpvcGVuc2VzYW1l");
    }
}
