use crate::converter::Converter;
use crate::error::{ConversionError, EvaluationError, UnboundVariable};
use crate::eval::{quad_pattern, Bindings};
use crate::fetch::{LocalFetcher, ResourceFetcher};
use crate::overlay::{FilteredSink, TripleFilter};
use crate::registry::ConverterRegistry;
use crate::resolver::{resolve, ResolveError, ResolvedRequest, ServiceRequest};
use crate::resource::Resource;
use dashmap::DashMap;
use facadex_common::QuadPattern;
use facadex_model::{Dataset, Variable};
use facadex_storage::stream::{StreamLog, StreamReader, WorkerPool};
use facadex_storage::{DiskStore, MemStore, QuadSink};
use spargebra::algebra::GraphPattern;
use std::sync::Arc;

/// What a request evaluates to, per input solution.
pub enum Outcome {
    /// The graph was materialized; the caller continues the sub-pattern
    /// against it.
    Materialized {
        dataset: Arc<Dataset>,
        pattern: GraphPattern,
    },
    /// The graph is being produced by a background worker; the reader
    /// follows the narrowest index for the request's target pattern, and
    /// further readers can be opened on the log.
    Streamed {
        log: StreamLog,
        reader: StreamReader,
        pattern: GraphPattern,
    },
    /// The configuration depends on a not-yet-bound variable.
    Deferred(Postponement),
    /// No converter applies; the result is empty.
    Empty,
}

/// How a deferred request should be retried.
#[derive(Debug, Clone)]
pub enum Postponement {
    /// Re-run the request after this operator has produced bindings for the
    /// variable.
    After {
        variable: Variable,
        producer: GraphPattern,
    },
    /// No producer is visible; probe for the variable and retry once the
    /// evaluator binds it.
    Presence { variable: Variable },
}

/// The per-solution execution engine.
///
/// Holds the converter registry, the resource fetcher, the streaming worker
/// pool and the triplification cache. One `execute` call serves one input
/// solution; identical (configuration, sub-pattern) requests within the
/// executor's lifetime hit the cache instead of re-triplifying.
pub struct Executor {
    registry: Arc<ConverterRegistry>,
    fetcher: Arc<dyn ResourceFetcher>,
    pool: WorkerPool,
    cache: DashMap<String, Arc<Dataset>>,
}

impl Executor {
    /// Creates an executor over `registry` with the local fetcher.
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self::with_fetcher(registry, Arc::new(LocalFetcher))
    }

    /// Creates an executor with a custom resource fetcher.
    pub fn with_fetcher(
        registry: Arc<ConverterRegistry>,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            pool: WorkerPool::with_default_capacity(),
            cache: DashMap::new(),
        }
    }

    /// Evaluates one request against one input solution.
    pub fn execute(
        &self,
        request: &ServiceRequest,
        solution: &Bindings,
    ) -> Result<Outcome, EvaluationError> {
        let resolved = match resolve(request, solution) {
            Ok(resolved) => resolved,
            Err(ResolveError::Unbound(unbound)) => {
                return Ok(Outcome::Deferred(postpone(request, unbound)));
            }
            Err(ResolveError::Configuration(error)) => return Err(error.into()),
        };

        let Some(converter) = self.registry.select(&resolved.resource) else {
            tracing::debug!("no converter applies; yielding an empty result");
            return Ok(Outcome::Empty);
        };

        let silent = request.silent || resolved.resource.configuration().silent();
        let filter = TripleFilter::from_pattern(&resolved.pattern);
        if resolved.resource.configuration().slice() && converter.supports_slicing() {
            self.stream(resolved, converter, filter, silent, solution)
        } else {
            self.materialize(resolved, converter, filter, silent)
        }
    }

    fn materialize(
        &self,
        resolved: ResolvedRequest,
        converter: Arc<dyn Converter>,
        filter: TripleFilter,
        silent: bool,
    ) -> Result<Outcome, EvaluationError> {
        let ResolvedRequest { resource, pattern } = resolved;
        let use_cache = !resource.configuration().no_cache();
        let key = cache_key(&resource, &pattern);
        if use_cache {
            if let Some(hit) = self.cache.get(&key) {
                tracing::debug!("triplification cache hit");
                return Ok(Outcome::Materialized {
                    dataset: Arc::clone(hit.value()),
                    pattern,
                });
            }
        }

        let built = self.build(&resource, converter.as_ref(), &filter);
        let dataset = match built {
            Ok(dataset) => dataset,
            Err(error) if silent => {
                tracing::warn!("conversion failed silently: {error}");
                Dataset::new()
            }
            Err(error) => return Err(error.into()),
        };

        let dataset = Arc::new(dataset);
        if use_cache {
            self.cache.insert(key, Arc::clone(&dataset));
        }
        Ok(Outcome::Materialized { dataset, pattern })
    }

    /// Materializes through the store selected by the configuration.
    fn build(
        &self,
        resource: &Resource,
        converter: &dyn Converter,
        filter: &TripleFilter,
    ) -> Result<Dataset, ConversionError> {
        match resource.configuration().ondisk() {
            Some(dir) => {
                let reuse = resource.configuration().ondisk_reuse();
                let mut store = DiskStore::open(dir, reuse)?;
                run_converter(
                    resource,
                    converter,
                    self.fetcher.as_ref(),
                    filter,
                    &mut store,
                )?;
                Ok(store.into_dataset())
            }
            None => {
                let mut store = MemStore::new();
                run_converter(
                    resource,
                    converter,
                    self.fetcher.as_ref(),
                    filter,
                    &mut store,
                )?;
                Ok(store.into_dataset())
            }
        }
    }

    /// Spawns the streaming pipeline: one worker per request, emitting
    /// through the overlay into a fresh log.
    fn stream(
        &self,
        resolved: ResolvedRequest,
        converter: Arc<dyn Converter>,
        filter: TripleFilter,
        silent: bool,
        solution: &Bindings,
    ) -> Result<Outcome, EvaluationError> {
        let ResolvedRequest { resource, pattern } = resolved;
        let log = StreamLog::new();
        let reader = log.reader(initial_target(&pattern, solution));

        let worker_log = log.clone();
        let fetcher = Arc::clone(&self.fetcher);
        self.pool.spawn("facadex-stream", move || {
            let mut sink = worker_log.clone();
            let result = run_converter(
                &resource,
                converter.as_ref(),
                fetcher.as_ref(),
                &filter,
                &mut sink,
            );
            match result {
                // `run_converter` completes the log through the sink.
                Ok(()) => {}
                Err(error) if error.is_cancellation() || worker_log.is_cancelled() => {
                    tracing::debug!("streaming build cancelled: {error}");
                    worker_log.complete();
                }
                Err(error) if silent => {
                    tracing::warn!("streaming conversion failed silently: {error}");
                    worker_log.complete();
                }
                Err(error) => worker_log.fail(error.to_string()),
            }
        })?;

        Ok(Outcome::Streamed {
            log,
            reader,
            pattern,
        })
    }
}

/// Runs a converter end to end against `sink`: triplify through the
/// filtering overlay, flush the builder, then finish the sink.
fn run_converter(
    resource: &Resource,
    converter: &dyn Converter,
    fetcher: &dyn ResourceFetcher,
    filter: &TripleFilter,
    sink: &mut dyn QuadSink,
) -> Result<(), ConversionError> {
    let mut filtered = FilteredSink::new(filter.clone(), sink);
    let mut builder = crate::builder::FacadeBuilder::new(resource, &mut filtered);
    converter.triplify(resource, fetcher, &mut builder)?;
    builder.finish()?;
    drop(builder);
    filtered.finish()?;
    Ok(())
}

/// The structural cache key: the canonical configuration serialization plus
/// a stable rendering of the sub-pattern. Equivalent requests that differ
/// only in pattern spelling are treated as distinct, matching the observable
/// behavior of a textual key.
#[allow(clippy::use_debug, reason = "the Debug rendering of the algebra is the structural key")]
fn cache_key(resource: &Resource, pattern: &GraphPattern) -> String {
    format!("{}\n{pattern:?}", resource.configuration().cache_key())
}

/// The reader target: a single-triple sub-pattern narrows the scan to its
/// components, anything wider scans the full log.
fn initial_target(pattern: &GraphPattern, solution: &Bindings) -> QuadPattern {
    if let GraphPattern::Bgp { patterns } = pattern {
        if let [triple] = patterns.as_slice() {
            return quad_pattern(triple, None, solution);
        }
    }
    QuadPattern::any()
}

/// Decides how to retry after an unbound configuration variable: behind the
/// operator that will produce it when one is visible in the surrounding
/// pattern, behind a bare variable-presence probe otherwise.
fn postpone(request: &ServiceRequest, unbound: UnboundVariable) -> Postponement {
    let producer = request
        .scope
        .as_ref()
        .and_then(|scope| find_producer(scope, &unbound.variable));
    match producer {
        Some(producer) => Postponement::After {
            variable: unbound.variable,
            producer,
        },
        None => Postponement::Presence {
            variable: unbound.variable,
        },
    }
}

/// Finds a `VALUES` table or an extend/bind operator producing `variable`.
fn find_producer(pattern: &GraphPattern, variable: &Variable) -> Option<GraphPattern> {
    match pattern {
        GraphPattern::Values { variables, .. } if variables.contains(variable) => {
            Some(pattern.clone())
        }
        GraphPattern::Extend {
            variable: bound, ..
        } if bound == variable => Some(pattern.clone()),
        GraphPattern::Join { left, right }
        | GraphPattern::Union { left, right }
        | GraphPattern::LeftJoin { left, right, .. }
        | GraphPattern::Minus { left, right } => {
            find_producer(left, variable).or_else(|| find_producer(right, variable))
        }
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::Graph { inner, .. }
        | GraphPattern::Project { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Group { inner, .. } => find_producer(inner, variable),
        _ => None,
    }
}
