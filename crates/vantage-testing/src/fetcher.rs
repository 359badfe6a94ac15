//! Manually settled image fetcher.

use std::cell::RefCell;
use std::rc::Rc;

use vantage_core::{ImageFetchError, ImageFetcher};

struct PendingFetch {
    url: String,
    on_done: Option<Box<dyn FnOnce(Result<(), ImageFetchError>)>>,
}

/// An [`ImageFetcher`] whose requests stay pending until the test settles
/// them with [`resolve`](ScriptedFetcher::resolve) or
/// [`fail`](ScriptedFetcher::fail). Unsettled requests simply stay pending,
/// matching the engine's no-timeout contract.
#[derive(Clone)]
pub struct ScriptedFetcher {
    inner: Rc<RefCell<Vec<PendingFetch>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// URLs of all fetches still pending, in request order.
    pub fn pending(&self) -> Vec<String> {
        self.inner
            .borrow()
            .iter()
            .filter(|fetch| fetch.on_done.is_some())
            .map(|fetch| fetch.url.clone())
            .collect()
    }

    /// Completes the first pending fetch for `url` successfully.
    pub fn resolve(&self, url: &str) {
        self.settle(url, Ok(()));
    }

    /// Fails the first pending fetch for `url`.
    pub fn fail(&self, url: &str) {
        self.settle(url, Err(ImageFetchError::Network("scripted failure".into())));
    }

    /// Completes every pending fetch successfully, in request order.
    pub fn resolve_all(&self) {
        loop {
            let on_done = self
                .inner
                .borrow_mut()
                .iter_mut()
                .find_map(|fetch| fetch.on_done.take());
            match on_done {
                Some(on_done) => on_done(Ok(())),
                None => break,
            }
        }
    }

    fn settle(&self, url: &str, result: Result<(), ImageFetchError>) {
        let on_done = self
            .inner
            .borrow_mut()
            .iter_mut()
            .find(|fetch| fetch.url == url && fetch.on_done.is_some())
            .and_then(|fetch| fetch.on_done.take());
        if let Some(on_done) = on_done {
            on_done(result);
        }
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFetcher for ScriptedFetcher {
    fn fetch(&self, url: &str, on_done: Box<dyn FnOnce(Result<(), ImageFetchError>)>) {
        self.inner.borrow_mut().push(PendingFetch {
            url: url.to_owned(),
            on_done: Some(on_done),
        });
    }
}
