//! Bounded parallel execution of units of work.
//!
//! Each job pairs a data source with its input and output streams. Jobs
//! are independent: they share only the registry, the method and the
//! catalog, all read-only. Results come back in job order.

use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use deid_model::{DataSource, MethodConfig, UnitOfWork};
use deid_types::TypeRegistry;

use crate::catalog::DerivedTableCatalog;
use crate::context::RunOptions;
use crate::error::Result;
use crate::handler::{MethodHandler, RunSummary};

/// One unit of work queued for a batch.
pub struct TransformJob {
    /// Disambiguates derived tables of the same (method, data source).
    pub run_index: usize,
    pub data_source: DataSource,
    pub input: Box<dyn Read + Send>,
    pub output: Box<dyn Write + Send>,
    pub unit: Arc<UnitOfWork>,
}

impl TransformJob {
    pub fn new<R, W>(
        run_index: usize,
        data_source: DataSource,
        input: R,
        output: W,
        unit: Arc<UnitOfWork>,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            run_index,
            data_source,
            input: Box::new(input),
            output: Box::new(output),
            unit,
        }
    }
}

/// Runs one method over many data sources on a bounded worker pool.
pub struct BatchRunner<'a> {
    registry: &'a TypeRegistry,
    method: &'a MethodConfig,
    catalog: &'a dyn DerivedTableCatalog,
    options: RunOptions,
    workers: usize,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        method: &'a MethodConfig,
        catalog: &'a dyn DerivedTableCatalog,
    ) -> Self {
        Self {
            registry,
            method,
            catalog,
            options: RunOptions::default(),
            workers: default_workers(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Cap the pool size; zero means the available parallelism.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            default_workers()
        } else {
            workers
        };
        self
    }

    /// Run every job; the outer error is only raised when the pool cannot
    /// start.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DeidError::WorkerPool`] when the thread pool fails to
    /// build.
    pub fn run(&self, jobs: Vec<TransformJob>) -> Result<Vec<Result<RunSummary>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("deid-worker-{index}"))
            .build()?;
        info!(
            method = %self.method.id,
            jobs = jobs.len(),
            workers = self.workers,
            "starting batch"
        );

        let results: Vec<Result<RunSummary>> = pool.install(|| {
            jobs.into_par_iter()
                .map(|job| self.run_job(job))
                .collect()
        });

        let failed = results.iter().filter(|result| result.is_err()).count();
        info!(
            method = %self.method.id,
            succeeded = results.len() - failed,
            failed,
            "batch finished"
        );
        Ok(results)
    }

    fn run_job(&self, job: TransformJob) -> Result<RunSummary> {
        let TransformJob {
            run_index,
            data_source,
            input,
            output,
            unit,
        } = job;
        MethodHandler::new(self.registry, &data_source, self.method, run_index)
            .with_options(self.options)
            .run(input, output, unit.as_ref(), self.catalog)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
