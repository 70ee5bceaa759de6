//! Request model mappers applied before dispatch

use crate::errors::MapperError;
use crate::request::RequestModel;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pure transformation of a request model.
///
/// Implementations must not touch shared state: the client runs the same
/// chain concurrently for every in-flight request.
pub trait RequestModelMapper: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this mapper applies to the request at all
    fn should_handle(&self, _request: &RequestModel) -> bool {
        true
    }

    fn map(&self, request: RequestModel) -> Result<RequestModel, MapperError>;
}

/// Ordered, immutable list of mappers.
#[derive(Clone, Default)]
pub struct MapperChain {
    mappers: Vec<Arc<dyn RequestModelMapper>>,
}

impl MapperChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, mapper: impl RequestModelMapper + 'static) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    pub fn with_arc(mut self, mapper: Arc<dyn RequestModelMapper>) -> Self {
        self.mappers.push(mapper);
        self
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Run every applicable mapper in registration order, stopping at the first failure
    pub fn apply(&self, request: RequestModel) -> Result<RequestModel, MapperError> {
        self.mappers.iter().try_fold(request, |current, mapper| {
            if mapper.should_handle(&current) {
                mapper.map(current)
            } else {
                Ok(current)
            }
        })
    }
}

impl fmt::Debug for MapperChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.mappers.iter().map(|m| m.name()))
            .finish()
    }
}

/// Adds a fixed set of headers to every request.
#[derive(Debug, Clone)]
pub struct HeaderMapper {
    headers: HashMap<String, String>,
}

impl HeaderMapper {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(HashMap::from([(name.into(), value.into())]))
    }
}

impl RequestModelMapper for HeaderMapper {
    fn name(&self) -> &str {
        "header"
    }

    fn map(&self, request: RequestModel) -> Result<RequestModel, MapperError> {
        Ok(request.with_headers(self.headers.clone()))
    }
}

/// Rewrites endpoints starting with `from` so they start with `to`.
#[derive(Debug, Clone)]
pub struct EndpointRewriteMapper {
    from: String,
    to: String,
}

impl EndpointRewriteMapper {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl RequestModelMapper for EndpointRewriteMapper {
    fn name(&self) -> &str {
        "endpoint_rewrite"
    }

    fn should_handle(&self, request: &RequestModel) -> bool {
        request.url().starts_with(&self.from)
    }

    fn map(&self, request: RequestModel) -> Result<RequestModel, MapperError> {
        let rewritten = format!("{}{}", self.to, &request.url()[self.from.len()..]);
        if rewritten.is_empty() {
            return Err(MapperError::new(self.name(), "rewrite produced an empty endpoint"));
        }
        Ok(request.with_url(rewritten))
    }
}

/// Adapts a closure into a mapper.
pub struct FnMapper<F> {
    name: String,
    f: F,
}

impl<F> FnMapper<F>
where
    F: Fn(RequestModel) -> Result<RequestModel, MapperError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> RequestModelMapper for FnMapper<F>
where
    F: Fn(RequestModel) -> Result<RequestModel, MapperError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn map(&self, request: RequestModel) -> Result<RequestModel, MapperError> {
        (self.f)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(url: &str) -> RequestModel {
        RequestModel::builder(url).build().unwrap()
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = MapperChain::new()
            .with(HeaderMapper::single("X-Trace", "abc"))
            .with(EndpointRewriteMapper::new("/a", "/b"));

        let mapped = chain.apply(request("/a")).unwrap();
        assert_eq!(mapped.url(), "/b");
        assert_eq!(mapped.header("X-Trace"), Some("abc"));
    }

    #[test]
    fn test_later_mapper_sees_earlier_output() {
        let chain = MapperChain::new()
            .with(EndpointRewriteMapper::new("/a", "/b"))
            .with(EndpointRewriteMapper::new("/b", "/c"));

        assert_eq!(chain.apply(request("/a/items")).unwrap().url(), "/c/items");
    }

    #[test]
    fn test_inapplicable_mapper_is_skipped() {
        let chain = MapperChain::new().with(EndpointRewriteMapper::new("/v1", "/v2"));
        assert_eq!(chain.apply(request("/a")).unwrap().url(), "/a");
    }

    #[test]
    fn test_failure_short_circuits() {
        let chain = MapperChain::new()
            .with(FnMapper::new("reject", |_| Err(MapperError::new("reject", "denied"))))
            .with(FnMapper::new("unreachable", |_| panic!("must not run")));

        let err = chain.apply(request("/a")).unwrap_err();
        assert_eq!(err.mapper, "reject");
    }

    #[test]
    fn test_debug_lists_mapper_names() {
        let chain = MapperChain::new()
            .with(HeaderMapper::single("X-A", "1"))
            .with(EndpointRewriteMapper::new("/a", "/b"));
        assert_eq!(format!("{:?}", chain), r#"["header", "endpoint_rewrite"]"#);
    }

    fn suffix_mapper(index: usize) -> FnMapper<impl Fn(RequestModel) -> Result<RequestModel, MapperError> + Send + Sync> {
        FnMapper::new(format!("suffix-{}", index), move |request: RequestModel| {
            let url = format!("{}/{}", request.url(), index);
            let step = request.headers().len().to_string();
            Ok(request.with_url(url).with_header(format!("X-Step-{}", index), step))
        })
    }

    proptest! {
        #[test]
        fn prop_chain_equals_sequential_application(count in 0usize..8, base in "/[a-z]{1,8}") {
            let mut chain = MapperChain::new();
            for index in 0..count {
                chain = chain.with(suffix_mapper(index));
            }

            let start = request(&base);
            let chained = chain.apply(start.clone()).unwrap();

            let mut sequential = start;
            for index in 0..count {
                sequential = suffix_mapper(index).map(sequential).unwrap();
            }

            prop_assert_eq!(chained, sequential);
        }
    }
}
