use thiserror::Error;

use crate::experiment::ExperimentParams;
use crate::optimization::ModelConstructionError;
use crate::quantum_network::ConfigurationError;

#[derive(Error,Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    ModelConstruction(#[from] ModelConstructionError),
    // carries the configuration that broke the sweep
    #[error("sweep point {value} ({params}) failed")]
    SweepPoint{value:f64,params:ExperimentParams,#[source] source:ModelConstructionError},
    #[error("cannot write result table")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T,Error>;
