//! `Specter` Client — signed-location broker, DataFusion executor, result sink,
//! and the `specter` command line.

pub mod broker;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod pipeline;
pub mod repl;
pub mod sink;

pub use broker::{LocationBroker, SharingBroker};
pub use config::{ClientConfig, TimeoutConfig};
pub use error::{BrokerError, ExecutionError, ExportError, PipelineError, ValidationError};
pub use executor::{DataFusionExecutor, QueryExecutor};
pub use pipeline::Pipeline;
pub use sink::{ResultSink, SinkOutcome};
