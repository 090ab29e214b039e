//! Declarative descriptions of API operations.

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::task::Task;

/// Which status codes count as valid responses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationType {
    /// No validation.
    #[default]
    None,
    /// 2xx only.
    SuccessCodes,
    /// 2xx and 3xx.
    SuccessAndRedirectCodes,
    /// Exactly the given codes.
    CustomCodes(Vec<u16>),
}

impl ValidationType {
    /// The accepted status codes. Empty means "accept everything".
    pub fn status_codes(&self) -> Vec<u16> {
        match self {
            ValidationType::None => Vec::new(),
            ValidationType::SuccessCodes => (200..300).collect(),
            ValidationType::SuccessAndRedirectCodes => (200..400).collect(),
            ValidationType::CustomCodes(codes) => codes.clone(),
        }
    }

    /// Whether `status_code` passes this validation.
    pub fn accepts(&self, status_code: u16) -> bool {
        match self {
            ValidationType::None => true,
            ValidationType::SuccessCodes => (200..300).contains(&status_code),
            ValidationType::SuccessAndRedirectCodes => (200..400).contains(&status_code),
            ValidationType::CustomCodes(codes) => codes.is_empty() || codes.contains(&status_code),
        }
    }
}

/// Describes one API operation.
///
/// Targets are usually enums with one variant per endpoint. They are plain
/// data: a provider reads them, never mutates them, and may reuse them across
/// requests.
///
/// ```
/// use courier_core::{Method, Target, Task};
///
/// enum GitHub {
///     Zen,
///     User(String),
/// }
///
/// impl Target for GitHub {
///     fn base_url(&self) -> &str {
///         "https://api.github.com"
///     }
///
///     fn path(&self) -> String {
///         match self {
///             GitHub::Zen => "/zen".to_owned(),
///             GitHub::User(name) => format!("/users/{name}"),
///         }
///     }
///
///     fn method(&self) -> Method {
///         Method::GET
///     }
///
///     fn task(&self) -> Task {
///         Task::RequestPlain
///     }
/// }
///
/// assert_eq!(courier_core::target_url(&GitHub::Zen), "https://api.github.com/zen");
/// ```
pub trait Target: Send + Sync + 'static {
    /// The base URL, e.g. `https://api.example.com`.
    fn base_url(&self) -> &str;

    /// The path appended to [`base_url`](Target::base_url).
    fn path(&self) -> String;

    fn method(&self) -> Method;

    /// Canned body used when the request is stubbed.
    fn sample_data(&self) -> Bytes {
        Bytes::new()
    }

    fn task(&self) -> Task;

    fn validation_type(&self) -> ValidationType {
        ValidationType::None
    }

    /// Extra headers for this operation.
    fn headers(&self) -> Option<HeaderMap> {
        None
    }
}

/// Joins a target's base URL and path.
///
/// An empty path yields the base URL untouched, so no trailing slash is
/// introduced.
pub fn target_url<T: Target + ?Sized>(target: &T) -> String {
    let base = target.base_url();
    let path = target.path();
    if path.is_empty() {
        return base.to_owned();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// A target that erases the concrete target type.
///
/// Lets one provider serve targets from several enums.
pub struct MultiTarget(Box<dyn Target>);

impl MultiTarget {
    pub fn new<T: Target>(target: T) -> Self {
        MultiTarget(Box::new(target))
    }

    /// The wrapped target.
    pub fn target(&self) -> &dyn Target {
        self.0.as_ref()
    }
}

impl Target for MultiTarget {
    fn base_url(&self) -> &str {
        self.0.base_url()
    }

    fn path(&self) -> String {
        self.0.path()
    }

    fn method(&self) -> Method {
        self.0.method()
    }

    fn sample_data(&self) -> Bytes {
        self.0.sample_data()
    }

    fn task(&self) -> Task {
        self.0.task()
    }

    fn validation_type(&self) -> ValidationType {
        self.0.validation_type()
    }

    fn headers(&self) -> Option<HeaderMap> {
        self.0.headers()
    }
}
