use courier_core::{Plugin, RequestResult, RequestType};

/// Direction of a network activity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkActivityChangeType {
    Began,
    Ended,
}

type ActivityClosure<T> = Box<dyn Fn(NetworkActivityChangeType, &T) + Send + Sync>;

/// Reports when requests start and finish, e.g. to drive an activity
/// indicator.
pub struct NetworkActivityPlugin<T: ?Sized> {
    closure: ActivityClosure<T>,
}

impl<T: ?Sized> NetworkActivityPlugin<T> {
    pub fn new<F>(closure: F) -> Self
    where
        F: Fn(NetworkActivityChangeType, &T) + Send + Sync + 'static,
    {
        Self {
            closure: Box::new(closure),
        }
    }
}

impl<T: ?Sized> Plugin<T> for NetworkActivityPlugin<T> {
    fn will_send(&self, _request: &dyn RequestType, target: &T) {
        (self.closure)(NetworkActivityChangeType::Began, target);
    }

    fn did_receive(&self, _result: &RequestResult, target: &T) {
        (self.closure)(NetworkActivityChangeType::Ended, target);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use courier_core::{Error, Method, PreparedRequest, Request, Url};

    use super::*;

    #[test]
    fn reports_began_then_ended() {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        let plugin = NetworkActivityPlugin::new(move |change, target: &str| {
            sink.lock().unwrap().push((change, target.to_owned()))
        });

        let request = PreparedRequest::new(Request::new(
            Method::GET,
            Url::parse("https://api.example.com").unwrap(),
        ));
        plugin.will_send(&request, "zen");
        plugin.did_receive(&Err(Error::cancelled()), "zen");

        assert_eq!(
            *changes.lock().unwrap(),
            vec![
                (NetworkActivityChangeType::Began, "zen".to_owned()),
                (NetworkActivityChangeType::Ended, "zen".to_owned()),
            ]
        );
    }
}
